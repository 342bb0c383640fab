//! Command-line interface: log format flag and administrative subcommands.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;

use crate::app::{connect_pool, load_config};
use crate::config::Config;
use crate::data::models::{RunKind, RunStatus};
use crate::data::{health, users};
use crate::fetch::Fetcher;
use crate::mailer::Mailer;
use crate::scrape::pipeline::Pipeline;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TracingFormat {
    Pretty,
    Json,
}

#[derive(Parser)]
#[command(name = "causelist", version, about = "Court of Appeal daily cause list archiver")]
pub struct Args {
    /// Log output format
    #[arg(long, value_enum, default_value_t = TracingFormat::Pretty)]
    pub tracing: TracingFormat,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Manage user accounts
    Users {
        #[command(subcommand)]
        action: UsersAction,
    },
    /// Database maintenance
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
    /// Scraper operations
    Scraper {
        #[command(subcommand)]
        action: ScraperAction,
    },
    /// Inspect the system
    System {
        #[command(subcommand)]
        action: SystemAction,
    },
}

#[derive(Subcommand)]
pub enum UsersAction {
    /// Create a user account in pending status
    Create {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        password: String,
    },
    /// List all user accounts
    List,
    /// Show one user with roles and status history
    Show { email: String },
    /// Approve a pending user
    Approve {
        email: String,
        #[arg(long, default_value = "approved via CLI")]
        notes: String,
    },
    /// Deactivate a user
    Deactivate {
        email: String,
        #[arg(long, default_value = "deactivated via CLI")]
        notes: String,
    },
}

#[derive(Subcommand)]
pub enum DbAction {
    /// Apply pending database migrations
    Migrate,
}

#[derive(Subcommand)]
pub enum ScraperAction {
    /// Run the ingestion pipeline once
    Run,
}

#[derive(Subcommand)]
pub enum SystemAction {
    /// Print version, configuration, and database connectivity
    Info,
}

/// Execute an administrative command and convert the result to an exit code.
pub async fn execute(command: Command, config: Config) -> ExitCode {
    match run_command(command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run_command(command: Command, config: Config) -> anyhow::Result<()> {
    match command {
        Command::Users { action } => run_users(action, &config).await,
        Command::Db {
            action: DbAction::Migrate,
        } => run_migrate(&config).await,
        Command::Scraper {
            action: ScraperAction::Run,
        } => run_scraper(config).await,
        Command::System {
            action: SystemAction::Info,
        } => run_system_info(&config).await,
    }
}

async fn run_users(action: UsersAction, config: &Config) -> anyhow::Result<()> {
    let pool = connect_pool(config).await?;

    match action {
        UsersAction::Create {
            email,
            name,
            password,
        } => {
            let user = users::create(&pool, &email, &name, &password).await?;
            println!("created user {} ({}) with status {}", user.email, user.id, user.status);
        }
        UsersAction::List => {
            let all = users::list(&pool).await?;
            for user in &all {
                let deleted = if user.deleted_at.is_some() { " [deleted]" } else { "" };
                println!(
                    "{:>6}  {:<32} {:<12} {}{deleted}",
                    user.id,
                    user.email,
                    user.status,
                    user.created_at.format("%Y-%m-%d")
                );
            }
            println!("{} users", all.len());
        }
        UsersAction::Show { email } => {
            let user = users::find_by_email(&pool, &email)
                .await?
                .with_context(|| format!("no user with email {email}"))?;
            let roles = users::roles_for(&pool, user.id).await?;
            let capabilities = users::capabilities_for(&pool, user.id).await?;
            let history = users::status_history(&pool, user.id).await?;

            println!("id:            {}", user.id);
            println!("email:         {}", user.email);
            println!("name:          {}", user.display_name);
            println!("status:        {}", user.status);
            println!("notifications: {}", user.email_notifications);
            println!("roles:         {}", roles.join(", "));
            println!("capabilities:  {}", capabilities.join(", "));
            println!("history:");
            for entry in history {
                println!(
                    "  {} -> {} ({})",
                    entry.changed_at.format("%Y-%m-%d %H:%M"),
                    entry.status,
                    entry.notes
                );
            }
            println!("ok");
        }
        UsersAction::Approve { email, notes } => {
            transition(&pool, &email, "active", &notes).await?;
            println!("approved {email}");
        }
        UsersAction::Deactivate { email, notes } => {
            transition(&pool, &email, "deactivated", &notes).await?;
            println!("deactivated {email}");
        }
    }
    Ok(())
}

async fn transition(
    pool: &sqlx::PgPool,
    email: &str,
    status: &str,
    notes: &str,
) -> anyhow::Result<()> {
    let user = users::find_by_email(pool, email)
        .await?
        .with_context(|| format!("no user with email {email}"))?;
    if !users::transition_status(pool, user.id, status, None, notes).await? {
        bail!("could not move {email} to {status}");
    }
    Ok(())
}

async fn run_migrate(config: &Config) -> anyhow::Result<()> {
    let pool = connect_pool(config).await?;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("migration failed")?;
    println!("migrations applied");
    Ok(())
}

async fn run_scraper(config: Config) -> anyhow::Result<()> {
    let pool = connect_pool(&config).await?;
    let config = Arc::new(config);
    let mailer = Arc::new(Mailer::from_config(&config));
    let fetcher = Fetcher::new(&config.user_agent, config.request_timeout())?;
    let pipeline = Pipeline::new(pool, fetcher, mailer, config);

    let outcome = pipeline.run(RunKind::Manual, &CancellationToken::new()).await?;
    match outcome.status {
        RunStatus::Success => {
            println!(
                "run {} succeeded: {} links, +{} ~{} -{}",
                outcome.run_id,
                outcome.stats.links_processed,
                outcome.stats.records_added,
                outcome.stats.records_updated,
                outcome.stats.records_deleted
            );
            Ok(())
        }
        RunStatus::Failed => {
            for failure in &outcome.failures {
                eprintln!("{}: {} ({})", failure.stage, failure.message, failure.url);
            }
            bail!("run {} failed", outcome.run_id)
        }
    }
}

async fn run_system_info(config: &Config) -> anyhow::Result<()> {
    println!("causelist {}", env!("CARGO_PKG_VERSION"));
    println!("commit:          {}", env!("GIT_COMMIT_SHORT"));
    println!("summary page:    {}", config.summary_page_url);
    println!("division:        {}", config.division.name());
    println!("interval:        {}m", config.scrape_interval_minutes);
    println!(
        "scrape window:   {}",
        if config.scrape_window_enabled {
            format!(
                "{:02}:00-{:02}:00 London",
                config.scrape_window_start_hour, config.scrape_window_end_hour
            )
        } else {
            "disabled".to_string()
        }
    );
    println!("instance:        {}", config.app_instance);

    let pool = connect_pool(config).await?;
    match health::check(&pool).await {
        Ok(store) => {
            println!("database:        ok ({} hearings archived)", store.hearing_count);
            match store.last_successful_run {
                Some(ts) => println!("last good run:   {}", ts.format("%Y-%m-%d %H:%M UTC")),
                None => println!("last good run:   never"),
            }
        }
        Err(e) => {
            println!("database:        unreachable");
            return Err(e);
        }
    }
    println!("ok");
    Ok(())
}
