//! End-to-end lifecycle tests for `LifecycleController`.
//!
//! A scripted backend stands in for the HTTP API and a recording
//! collaborator captures every UI call, so each terminal path can be
//! checked for exactly one error message and exactly one wake lock
//! release.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use scanbatch_client::api::ApiError;
use scanbatch_client::backend::{StatusFetcher, SubmissionBackend};
use scanbatch_client::form::{UploadFile, UploadForm};
use scanbatch_client::messages::{RemoteStatus, StartUploadResponse, StatusResponse};
use scanbatch_client::submit::{SubmitError, VerificationError};
use scanbatch_core::progress::ProgressSnapshot;
use scanbatch_core::types::JobId;
use scanbatch_core::upload::UploadOptions;
use scanbatch_session::collaborators::{Collaborators, WakeLockError};
use scanbatch_session::controller::{
    DownloadLink, LifecycleController, LifecyclePhase, SessionCommand, Visibility,
};
use scanbatch_session::poller::{PollConfig, PollerState};
use tokio::sync::mpsc;
use tokio::time::sleep;

const BASE_URL: &str = "http://scan.test";

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

struct Backend {
    verify_status: Option<u16>,
    statuses: Mutex<VecDeque<Result<StatusResponse, ApiError>>>,
    fallback: RemoteStatus,
    fetches: AtomicUsize,
}

impl Backend {
    fn new(statuses: Vec<Result<StatusResponse, ApiError>>) -> Arc<Self> {
        Arc::new(Self {
            verify_status: None,
            statuses: Mutex::new(statuses.into()),
            fallback: RemoteStatus::Processing,
            fetches: AtomicUsize::new(0),
        })
    }

    fn rejecting(status: u16) -> Arc<Self> {
        Arc::new(Self {
            verify_status: Some(status),
            statuses: Mutex::new(VecDeque::new()),
            fallback: RemoteStatus::Processing,
            fetches: AtomicUsize::new(0),
        })
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SubmissionBackend for Backend {
    async fn verify(&self, _form: &UploadForm) -> Result<(), ApiError> {
        match self.verify_status {
            None => Ok(()),
            Some(status) => Err(ApiError::Status {
                status,
                body: String::new(),
            }),
        }
    }

    async fn start_upload(&self, _form: &UploadForm) -> Result<StartUploadResponse, ApiError> {
        Ok(StartUploadResponse {
            job_id: Some("job-1".to_string()),
            error: None,
        })
    }
}

#[async_trait]
impl StatusFetcher for Backend {
    async fn fetch_status(&self, _job_id: &JobId) -> Result<StatusResponse, ApiError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let fallback = self.fallback;
        self.statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| status(fallback, 0, 10))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Disable,
    Enable,
    Phase(LifecyclePhase),
    Progress(u32, u32),
    Error(String),
    DownloadReady(String),
    Acquire,
    Release,
}

#[derive(Default)]
struct Recorder {
    deny_wake_lock: bool,
    calls: Mutex<Vec<Call>>,
}

impl Recorder {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, wanted: &Call) -> usize {
        self.calls().iter().filter(|c| *c == wanted).count()
    }

    fn errors(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Error(message) => Some(message),
                _ => None,
            })
            .collect()
    }
}

impl Collaborators for Recorder {
    fn disable_inputs(&self) {
        self.record(Call::Disable);
    }

    fn enable_inputs(&self) {
        self.record(Call::Enable);
    }

    fn render_phase(&self, phase: LifecyclePhase) {
        self.record(Call::Phase(phase));
    }

    fn render_progress(&self, snapshot: &ProgressSnapshot) {
        self.record(Call::Progress(snapshot.processed_count, snapshot.total_count));
    }

    fn render_error(&self, message: &str) {
        self.record(Call::Error(message.to_string()));
    }

    fn show_download_ready(&self, link: &DownloadLink) {
        self.record(Call::DownloadReady(link.url.clone()));
    }

    fn acquire_wake_lock(&self) -> Result<(), WakeLockError> {
        if self.deny_wake_lock {
            return Err(WakeLockError::Unsupported);
        }
        self.record(Call::Acquire);
        Ok(())
    }

    fn release_wake_lock(&self) {
        self.record(Call::Release);
    }
}

fn status(status: RemoteStatus, current: i64, total: i64) -> Result<StatusResponse, ApiError> {
    Ok(StatusResponse {
        status,
        current_image_num: current,
        num_images: total,
    })
}

fn form() -> UploadForm {
    UploadForm::new(
        vec![UploadFile::new("receipt.jpeg", vec![7; 32])],
        UploadOptions::default(),
        Some("token".to_string()),
    )
    .unwrap()
}

fn controller(backend: Arc<Backend>, ui: Arc<Recorder>) -> LifecycleController<Backend, Recorder> {
    LifecycleController::new(backend, ui, PollConfig::default(), BASE_URL)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn completed_job_offers_download() {
    let backend = Backend::new(vec![
        status(RemoteStatus::Processing, 1, 10),
        status(RemoteStatus::Processing, 5, 10),
        status(RemoteStatus::Completed, 10, 10),
    ]);
    let ui = Recorder::new();
    let mut controller = controller(backend, Arc::clone(&ui));
    let (_tx, mut commands) = mpsc::channel(4);

    let job_id = controller.submit(&form()).await.unwrap();
    assert_eq!(controller.phase(), LifecyclePhase::Processing);
    let phase = controller.track(&mut commands).await;

    assert_eq!(phase, LifecyclePhase::Completed);
    assert_eq!(job_id.as_str(), "job-1");
    assert_eq!(
        controller.download_link().map(|l| l.url.as_str()),
        Some("http://scan.test/download/job-1")
    );
    assert!(controller.active_job().is_none());

    assert_eq!(
        ui.calls(),
        vec![
            Call::Disable,
            Call::Acquire,
            Call::Phase(LifecyclePhase::Verifying),
            Call::Phase(LifecyclePhase::Uploading),
            Call::Phase(LifecyclePhase::Processing),
            Call::Progress(1, 10),
            Call::Progress(5, 10),
            Call::Progress(10, 10),
            Call::DownloadReady("http://scan.test/download/job-1".to_string()),
            Call::Release,
            Call::Enable,
            Call::Phase(LifecyclePhase::Completed),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn rejected_verification_resets_form() {
    let ui = Recorder::new();
    let mut controller = controller(Backend::rejecting(403), Arc::clone(&ui));

    let error = controller.submit(&form()).await.unwrap_err();

    assert_matches!(
        error,
        SubmitError::Verification(VerificationError::HumanCheckRejected)
    );
    assert_eq!(
        ui.errors(),
        ["Human verification failed. Please reload and try again."]
    );
    assert_eq!(ui.count(&Call::Release), 1);
    assert_eq!(ui.count(&Call::Enable), 1);
    assert_eq!(controller.phase(), LifecyclePhase::Failed);
    assert!(controller.active_job().is_none());
}

#[tokio::test(start_paused = true)]
async fn backend_failure_is_reported_once() {
    let backend = Backend::new(vec![
        status(RemoteStatus::Processing, 1, 3),
        status(RemoteStatus::Failed, 1, 3),
    ]);
    let ui = Recorder::new();
    let mut controller = controller(backend, Arc::clone(&ui));
    let (_tx, mut commands) = mpsc::channel(4);

    controller.submit(&form()).await.unwrap();
    let phase = controller.track(&mut commands).await;

    assert_eq!(phase, LifecyclePhase::Failed);
    assert_eq!(ui.errors(), ["Failed to process images"]);
    assert_eq!(ui.count(&Call::Release), 1);
    assert!(controller.download_link().is_none());
}

#[tokio::test(start_paused = true)]
async fn exhausted_polling_is_reported_once() {
    let unavailable = || {
        Err(ApiError::Status {
            status: 502,
            body: String::new(),
        })
    };
    let backend = Backend::new((0..6).map(|_| unavailable()).collect());
    let ui = Recorder::new();
    let mut controller = controller(Arc::clone(&backend), Arc::clone(&ui));
    let (_tx, mut commands) = mpsc::channel(4);

    controller.submit(&form()).await.unwrap();
    let phase = controller.track(&mut commands).await;

    assert_eq!(phase, LifecyclePhase::Failed);
    assert_eq!(
        ui.errors(),
        ["Failed to fetch status after multiple retries"]
    );
    assert_eq!(ui.count(&Call::Release), 1);
    assert_eq!(backend.fetches(), 6);
}

#[tokio::test(start_paused = true)]
async fn reset_while_processing_stops_polling() {
    let backend = Backend::new(vec![]);
    let ui = Recorder::new();
    let mut controller = controller(Arc::clone(&backend), Arc::clone(&ui));
    let (tx, mut commands) = mpsc::channel(4);

    controller.submit(&form()).await.unwrap();
    tokio::spawn(async move {
        sleep(Duration::from_millis(2_600)).await;
        tx.send(SessionCommand::Reset).await.unwrap();
    });
    let phase = controller.track(&mut commands).await;

    assert_eq!(phase, LifecyclePhase::Idle);
    assert_eq!(ui.count(&Call::Release), 1);
    assert!(ui.errors().is_empty());
    // Checks at 1000 ms and 2500 ms only.
    let fetched = backend.fetches();
    assert_eq!(fetched, 2);

    sleep(Duration::from_secs(60)).await;
    assert_eq!(backend.fetches(), fetched);
}

#[tokio::test(start_paused = true)]
async fn hidden_page_pauses_and_visible_resumes() {
    let backend = Backend::new(vec![status(RemoteStatus::Completed, 4, 4)]);
    let ui = Recorder::new();
    let mut controller = controller(Arc::clone(&backend), Arc::clone(&ui));

    controller.submit(&form()).await.unwrap();
    controller.handle_visibility(Visibility::Hidden);

    assert_eq!(controller.poller_state(), Some(PollerState::Paused));
    assert_eq!(controller.poll_state().map(|s| s.pending_check), Some(false));
    sleep(Duration::from_secs(30)).await;
    assert_eq!(backend.fetches(), 0);

    // Hiding again or showing twice changes nothing.
    controller.handle_visibility(Visibility::Hidden);
    controller.handle_visibility(Visibility::Visible);
    controller.handle_visibility(Visibility::Visible);
    assert_eq!(controller.poller_state(), Some(PollerState::Active));
    assert_eq!(
        controller.poll_state().map(|s| s.attempt_interval),
        Some(Duration::from_millis(1_000))
    );

    let event = controller.next_event().await.unwrap();
    controller.handle_poll_event(event);

    assert_eq!(controller.phase(), LifecyclePhase::Completed);
    assert_eq!(backend.fetches(), 1);
    assert_eq!(ui.count(&Call::Release), 1);
}

#[tokio::test(start_paused = true)]
async fn visibility_commands_are_applied_while_tracking() {
    let backend = Backend::new(vec![status(RemoteStatus::Completed, 2, 2)]);
    let ui = Recorder::new();
    let mut controller = controller(Arc::clone(&backend), Arc::clone(&ui));
    let (tx, mut commands) = mpsc::channel(4);

    controller.submit(&form()).await.unwrap();
    tx.send(SessionCommand::Visibility(Visibility::Hidden))
        .await
        .unwrap();
    let visible = tx.clone();
    tokio::spawn(async move {
        sleep(Duration::from_secs(20)).await;
        visible
            .send(SessionCommand::Visibility(Visibility::Visible))
            .await
            .unwrap();
    });
    drop(tx);

    let phase = controller.track(&mut commands).await;

    assert_eq!(phase, LifecyclePhase::Completed);
    assert_eq!(backend.fetches(), 1);
}

#[tokio::test(start_paused = true)]
async fn closed_commands_while_paused_resume_polling() {
    let backend = Backend::new(vec![status(RemoteStatus::Completed, 3, 3)]);
    let ui = Recorder::new();
    let mut controller = controller(Arc::clone(&backend), Arc::clone(&ui));
    let (tx, mut commands) = mpsc::channel(4);

    controller.submit(&form()).await.unwrap();
    tx.send(SessionCommand::Visibility(Visibility::Hidden))
        .await
        .unwrap();
    drop(tx);

    let phase = tokio::time::timeout(Duration::from_secs(600), controller.track(&mut commands))
        .await
        .expect("tracking must not hang once commands close");

    assert_eq!(phase, LifecyclePhase::Completed);
    assert_eq!(backend.fetches(), 1);
    assert_eq!(ui.count(&Call::Release), 1);
}

#[tokio::test(start_paused = true)]
async fn reset_after_completion_clears_download() {
    let backend = Backend::new(vec![status(RemoteStatus::Completed, 1, 1)]);
    let ui = Recorder::new();
    let mut controller = controller(backend, Arc::clone(&ui));
    let (_tx, mut commands) = mpsc::channel(4);

    controller.submit(&form()).await.unwrap();
    controller.track(&mut commands).await;
    assert!(controller.download_link().is_some());

    controller.reset();

    assert_eq!(controller.phase(), LifecyclePhase::Idle);
    assert!(controller.download_link().is_none());
    assert_eq!(ui.count(&Call::Release), 1);
}

#[tokio::test(start_paused = true)]
async fn resubmitting_discards_previous_session() {
    let backend = Backend::new(vec![]);
    let ui = Recorder::new();
    let mut controller = controller(Arc::clone(&backend), Arc::clone(&ui));

    controller.submit(&form()).await.unwrap();
    controller.submit(&form()).await.unwrap();

    assert_eq!(ui.count(&Call::Acquire), 2);
    assert_eq!(ui.count(&Call::Release), 1);

    sleep(Duration::from_millis(1_200)).await;
    assert_eq!(backend.fetches(), 1);

    controller.reset();
    assert_eq!(ui.count(&Call::Release), 2);
}

#[tokio::test(start_paused = true)]
async fn missing_wake_lock_does_not_block_job() {
    let backend = Backend::new(vec![status(RemoteStatus::Completed, 1, 1)]);
    let ui = Arc::new(Recorder {
        deny_wake_lock: true,
        ..Default::default()
    });
    let mut controller = controller(backend, Arc::clone(&ui));
    let (_tx, mut commands) = mpsc::channel(4);

    controller.submit(&form()).await.unwrap();
    let phase = controller.track(&mut commands).await;

    assert_eq!(phase, LifecyclePhase::Completed);
    assert_eq!(ui.count(&Call::Release), 0);
}
