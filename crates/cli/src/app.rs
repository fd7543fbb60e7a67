//! One upload from the command line, start to finish.

use std::path::PathBuf;
use std::sync::Arc;

use scanbatch_client::api::{ApiError, BatchApi};
use scanbatch_client::form::{FormError, UploadForm};
use scanbatch_core::types::JobId;
use scanbatch_session::controller::{LifecycleController, LifecyclePhase, SessionCommand};
use tokio::sync::mpsc;

use crate::args::Cli;
use crate::config::{ClientConfig, ConfigError};
use crate::signals;
use crate::terminal::TerminalUi;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid upload: {0}")]
    Form(#[from] FormError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The job completed; `archive` is set unless downloading was skipped.
    Completed { job_id: JobId, url: String, archive: Option<PathBuf> },
    Failed,
    Reset,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Default file name for a downloaded archive.
pub fn default_archive_name(job_id: &JobId) -> PathBuf {
    PathBuf::from(format!("processed_images_{job_id}.zip"))
}

/// Submit the files named on the command line and track the job.
///
/// Signal handlers are installed before anything is uploaded. Failures of
/// the job itself are shown to the user by the session and reported as
/// [`Outcome::Failed`]; only problems before submission or while
/// downloading are returned as errors.
pub async fn run(cli: Cli, config: ClientConfig) -> Result<Outcome, CliError> {
    let (tx, mut commands) = mpsc::channel(8);
    let forwarder = signals::forward(tx);
    let outcome = run_with_commands(cli, config, &mut commands).await;
    if let Some(forwarder) = forwarder {
        forwarder.abort();
    }
    outcome
}

/// [`run`] with session commands taken from `commands`.
///
/// Commands received while the files are uploading do not reach a
/// session yet: `Reset` abandons the upload, and the last visibility
/// change is applied as soon as tracking starts.
pub async fn run_with_commands(
    cli: Cli,
    config: ClientConfig,
    commands: &mut mpsc::Receiver<SessionCommand>,
) -> Result<Outcome, CliError> {
    let base_url = cli.url.clone().unwrap_or(config.base_url);
    let api = Arc::new(BatchApi::with_timeout(base_url, config.request_timeout)?);
    tracing::info!(base_url = api.base_url(), files = cli.files.len(), "Preparing upload");

    let form = UploadForm::from_paths(&cli.files, cli.upload_options(), cli.turnstile_token.clone()).await?;

    let ui = Arc::new(TerminalUi::new());
    let mut controller = LifecycleController::new(Arc::clone(&api), ui, config.poll, api.base_url());

    let mut pending_visibility = None;
    let submitted = {
        let submit = controller.submit(&form);
        tokio::pin!(submit);
        let mut commands_open = true;
        loop {
            tokio::select! {
                result = &mut submit => break Some(result),
                command = commands.recv(), if commands_open => match command {
                    Some(SessionCommand::Visibility(visibility)) => pending_visibility = Some(visibility),
                    Some(SessionCommand::Reset) => break None,
                    None => commands_open = false,
                },
            }
        }
    };

    match submitted {
        None => {
            tracing::info!("Upload abandoned");
            controller.reset();
            return Ok(Outcome::Reset);
        }
        Some(Err(_)) => return Ok(Outcome::Failed),
        Some(Ok(_)) => {}
    }
    if let Some(visibility) = pending_visibility {
        controller.handle_visibility(visibility);
    }

    let phase = controller.track(commands).await;

    match phase {
        LifecyclePhase::Completed => {}
        LifecyclePhase::Idle => return Ok(Outcome::Reset),
        _ => return Ok(Outcome::Failed),
    }

    let Some(link) = controller.download_link().cloned() else {
        return Ok(Outcome::Failed);
    };

    let archive = if cli.no_download {
        None
    } else {
        let dest = cli.output.clone().unwrap_or_else(|| default_archive_name(&link.job_id));
        let bytes = api.download(&link.job_id, &dest).await?;
        println!("Saved {} ({bytes} bytes)", dest.display());
        Some(dest)
    };

    Ok(Outcome::Completed {
        job_id: link.job_id,
        url: link.url,
        archive,
    })
}
