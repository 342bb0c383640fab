use causelist::app::App;
use causelist::cli::Args;
use causelist::logging::setup_logging;
use clap::Parser;
use std::process::ExitCode;
use tracing::info;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let args = Args::parse();

    // Load config and setup logging before App::new() so startup logs are never silently dropped
    let early_config = {
        use figment::providers::Env;
        figment::Figment::new()
            .merge(Env::raw())
            .extract::<causelist::config::Config>()
            .expect("Failed to load config for logging setup")
    };
    setup_logging(&early_config, args.tracing);

    // Administrative subcommands run to completion and exit
    if let Some(command) = args.command {
        return causelist::cli::execute(command, early_config).await;
    }

    // Create and initialize the application
    let mut app = App::new().await.expect("Failed to initialize application");

    // Log application startup context
    info!(
        version = env!("CARGO_PKG_VERSION"),
        commit = env!("GIT_COMMIT_SHORT"),
        environment = if cfg!(debug_assertions) {
            "development"
        } else {
            "production"
        },
        "starting causelist"
    );

    // Setup services (web, scraper)
    app.setup_services().expect("Failed to setup services");

    // Start all services and run the application
    app.start_services();
    app.run().await
}
