//! `scanbatch` -- upload scanned images for batch processing.
//!
//! Configuration comes from the environment (see
//! [`ClientConfig::from_env`](scanbatch::config::ClientConfig::from_env)),
//! optionally loaded from a `.env` file.
//!
//! On Unix, `SIGUSR1` pauses status polling and `SIGUSR2` resumes it.
//! Ctrl-C abandons the session.

use std::process::ExitCode;

use clap::Parser;
use scanbatch::args::Cli;
use scanbatch::config::ClientConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scanbatch=info,scanbatch_session=info,scanbatch_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    match scanbatch::run(cli, config).await {
        Ok(outcome) if outcome.is_success() => ExitCode::SUCCESS,
        Ok(outcome) => {
            tracing::info!(?outcome, "Finished without a result");
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!(error = %e, "Run failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
