//! Session orchestration: submit, track, finish.
//!
//! [`LifecycleController`] owns at most one active session. A session is
//! created by a successful [`submit`](LifecycleController::submit) and
//! ends on completion, failure, or [`reset`](LifecycleController::reset).
//! Every ending stops the poller and releases the wake lock exactly once.

use std::fmt;
use std::sync::Arc;

use scanbatch_client::api::{job_url, ApiError};
use scanbatch_client::backend::{StatusFetcher, SubmissionBackend};
use scanbatch_client::form::UploadForm;
use scanbatch_client::submit::{JobSubmitter, SubmitError, SubmitStage};
use scanbatch_core::types::{Job, JobId};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::collaborators::{Collaborators, WakeLockGuard};
use crate::events::{PollEvent, PollEventKind};
use crate::poller::{PollConfig, PollState, PollerState, StatusPoller};

/// User-facing phase of the upload workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    Idle,
    Verifying,
    Uploading,
    Processing,
    Completed,
    Failed,
}

impl LifecyclePhase {
    /// Label of the main action button in this phase.
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle | Self::Failed => "Upload and Process",
            Self::Verifying => "Verifying",
            Self::Uploading => "Uploading",
            Self::Processing => "Processing",
            Self::Completed => "Download Images",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<SubmitStage> for LifecyclePhase {
    fn from(stage: SubmitStage) -> Self {
        match stage {
            SubmitStage::Verifying => Self::Verifying,
            SubmitStage::Uploading => Self::Uploading,
        }
    }
}

/// Where the processed archive of a completed job can be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadLink {
    pub job_id: JobId,
    pub url: String,
}

impl DownloadLink {
    /// `{base_url}/download/{job_id}`, with the id percent-encoded.
    pub fn new(base_url: &str, job_id: JobId) -> Result<Self, ApiError> {
        let url = job_url(base_url, &["download"], &job_id)?.into();
        Ok(Self { job_id, url })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Hidden,
    Visible,
}

/// External input while a session is being tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    Visibility(Visibility),
    /// Abandon the session and return to the editable form.
    Reset,
}

struct ActiveSession<B, U: Collaborators> {
    job: Job,
    poller: StatusPoller<B>,
    events: mpsc::UnboundedReceiver<PollEvent>,
    wake_lock: WakeLockGuard<U>,
}

impl<B, U: Collaborators> ActiveSession<B, U> {
    fn end(self) {
        // Stop first so no further events are produced after the lock is gone.
        drop(self.poller);
        self.wake_lock.release();
    }
}

enum Next {
    Event(Option<PollEvent>),
    Command(Option<SessionCommand>),
}

pub struct LifecycleController<B, U: Collaborators> {
    backend: Arc<B>,
    ui: Arc<U>,
    config: PollConfig,
    base_url: String,
    phase: LifecyclePhase,
    session: Option<ActiveSession<B, U>>,
    download: Option<DownloadLink>,
}

impl<B, U> LifecycleController<B, U>
where
    B: SubmissionBackend + StatusFetcher + 'static,
    U: Collaborators,
{
    /// `base_url` is used to build the download link of a completed job.
    pub fn new(backend: Arc<B>, ui: Arc<U>, config: PollConfig, base_url: impl Into<String>) -> Self {
        Self {
            backend,
            ui,
            config,
            base_url: base_url.into(),
            phase: LifecyclePhase::Idle,
            session: None,
            download: None,
        }
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.phase
    }

    pub fn download_link(&self) -> Option<&DownloadLink> {
        self.download.as_ref()
    }

    pub fn active_job(&self) -> Option<&Job> {
        self.session.as_ref().map(|s| &s.job)
    }

    pub fn poller_state(&self) -> Option<PollerState> {
        self.session.as_ref().map(|s| s.poller.state())
    }

    pub fn poll_state(&self) -> Option<PollState> {
        self.session.as_ref().map(|s| s.poller.poll_state())
    }

    /// Submit `form` and start tracking the resulting job.
    ///
    /// Any existing session is discarded first. On rejection the error has
    /// already been shown and the form reset when this returns.
    pub async fn submit(&mut self, form: &UploadForm) -> Result<JobId, SubmitError> {
        if let Some(old) = self.session.take() {
            tracing::info!(job_id = %old.job.id, "Discarding previous session");
            old.end();
        }
        self.download = None;

        self.ui.disable_inputs();
        let wake_lock = WakeLockGuard::acquire(Arc::clone(&self.ui));

        let submitter = JobSubmitter::new(Arc::clone(&self.backend));
        let ui = &self.ui;
        let phase = &mut self.phase;
        let submitted = submitter
            .submit_observed(form, |stage| {
                *phase = stage.into();
                ui.render_phase(*phase);
            })
            .await;

        let job = match submitted {
            Ok(job) => job,
            Err(error) => {
                wake_lock.release();
                self.fail(&error.to_string());
                return Err(error);
            }
        };

        let (poller, events) = StatusPoller::new(Arc::clone(&self.backend), self.config);
        poller.start(job.id.clone());
        self.set_phase(LifecyclePhase::Processing);
        tracing::info!(job_id = %job.id, "Tracking job");

        let job_id = job.id.clone();
        self.session = Some(ActiveSession {
            job,
            poller,
            events,
            wake_lock,
        });
        Ok(job_id)
    }

    /// Wait for the next poller event of the active session.
    ///
    /// Returns `None` when there is no session.
    pub async fn next_event(&mut self) -> Option<PollEvent> {
        self.session.as_mut()?.events.recv().await
    }

    pub fn handle_poll_event(&mut self, event: PollEvent) {
        let Some(session) = &self.session else {
            return;
        };
        if session.job.id != event.job_id {
            tracing::debug!(job_id = %event.job_id, "Ignoring event for another job");
            return;
        }

        match event.kind {
            PollEventKind::Progress(snapshot) => self.ui.render_progress(&snapshot),
            PollEventKind::Completed(snapshot) => {
                self.ui.render_progress(&snapshot);
                let link = match DownloadLink::new(&self.base_url, event.job_id) {
                    Ok(link) => link,
                    Err(e) => return self.fail(&e.to_string()),
                };
                self.ui.show_download_ready(&link);
                tracing::info!(job_id = %link.job_id, url = %link.url, "Download ready");
                self.download = Some(link);

                self.end_session();
                self.ui.enable_inputs();
                self.set_phase(LifecyclePhase::Completed);
            }
            PollEventKind::Failed(failure) => self.fail(&failure.to_string()),
        }
    }

    /// Pause polling while hidden; resume on visible if a job is active.
    pub fn handle_visibility(&mut self, visibility: Visibility) {
        let Some(session) = &self.session else {
            return;
        };
        match visibility {
            Visibility::Hidden => session.poller.pause(),
            Visibility::Visible => {
                if session.poller.state() == PollerState::Paused {
                    session.poller.resume();
                }
            }
        }
    }

    /// Start over: drop any session and download link and unlock the form.
    pub fn reset(&mut self) {
        self.end_session();
        self.download = None;
        self.ui.enable_inputs();
        self.set_phase(LifecyclePhase::Idle);
        tracing::info!("Session reset");
    }

    /// Drive the active session until it finishes or is reset.
    ///
    /// Returns the phase the controller ended in. If `commands` closes,
    /// tracking continues on poller events alone.
    pub async fn track(&mut self, commands: &mut mpsc::Receiver<SessionCommand>) -> LifecyclePhase {
        let mut commands_open = true;
        loop {
            let next = {
                let Some(session) = self.session.as_mut() else {
                    return self.phase;
                };
                tokio::select! {
                    event = session.events.recv() => Next::Event(event),
                    command = commands.recv(), if commands_open => Next::Command(command),
                }
            };

            match next {
                Next::Event(Some(event)) => self.handle_poll_event(event),
                Next::Event(None) => self.fail("Status updates stopped unexpectedly"),
                Next::Command(Some(SessionCommand::Visibility(visibility))) => {
                    self.handle_visibility(visibility)
                }
                Next::Command(Some(SessionCommand::Reset)) => {
                    self.reset();
                    return self.phase;
                }
                Next::Command(None) => {
                    commands_open = false;
                    // Nothing can send `Visible` any more; a paused session
                    // would never finish.
                    if self.poller_state() == Some(PollerState::Paused) {
                        tracing::info!("Command source closed while paused, resuming");
                        self.handle_visibility(Visibility::Visible);
                    }
                }
            }
        }
    }

    fn fail(&mut self, message: &str) {
        tracing::error!(error = message, "Session failed");
        self.end_session();
        self.ui.render_error(message);
        self.ui.enable_inputs();
        self.set_phase(LifecyclePhase::Failed);
    }

    fn end_session(&mut self) {
        if let Some(session) = self.session.take() {
            session.end();
        }
    }

    fn set_phase(&mut self, phase: LifecyclePhase) {
        self.phase = phase;
        self.ui.render_phase(phase);
    }
}
