use crate::cli::TracingFormat;
use crate::config::Config;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Configure and initialize logging for the application
pub fn setup_logging(config: &Config, tracing_format: TracingFormat) {
    // Noisy third-party targets stay at warn unless overridden via RUST_LOG.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let base_level = &config.log_level;
        EnvFilter::new(format!(
            "warn,causelist={base_level},sqlx=warn,hyper=warn,reqwest=warn"
        ))
    });

    let subscriber: Box<dyn tracing::Subscriber + Send + Sync> = match tracing_format {
        TracingFormat::Pretty => Box::new(
            FmtSubscriber::builder()
                .with_target(true)
                .with_env_filter(filter)
                .finish(),
        ),
        TracingFormat::Json => Box::new(
            FmtSubscriber::builder()
                .with_target(true)
                .json()
                .with_env_filter(filter)
                .finish(),
        ),
    };

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}
