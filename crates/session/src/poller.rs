//! Adaptive status polling for a running job.
//!
//! [`StatusPoller`] checks the job's status on a timer. Successful checks
//! stretch the interval gently and failed ones back off harder, both
//! bounded by [`BackoffConfig`]. After more than
//! [`PollConfig::max_retries`] consecutive failures the session ends with
//! [`PollFailure::Exhausted`].
//!
//! There is never more than one scheduled check. Each check is a spawned
//! task holding a unique id and a [`CancellationToken`]; scheduling a new
//! check cancels the previous one. A fetch that is already in flight is not
//! cancelled, but when it returns its result is applied only if that check
//! is still the pending one and the poller is still active. Anything else is
//! a stale response and is dropped.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use scanbatch_client::api::ApiError;
use scanbatch_client::backend::StatusFetcher;
use scanbatch_client::messages::StatusResponse;
use scanbatch_core::backoff::{BackoffConfig, PollOutcome};
use scanbatch_core::progress::Phase;
use scanbatch_core::types::JobId;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::events::{PollEvent, PollEventKind, PollFailure};

/// Consecutive failed checks tolerated before the session fails.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollConfig {
    pub backoff: BackoffConfig,
    pub max_retries: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffConfig::default(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// Lifecycle of a poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Active,
    Paused,
    Completed,
    Failed,
    Stopped,
}

impl PollerState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Stopped)
    }
}

/// Point-in-time view of the poller's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollState {
    /// Delay used for the next scheduled check.
    pub attempt_interval: Duration,
    pub consecutive_failures: u32,
    pub is_active: bool,
    /// Whether a check is currently scheduled or running.
    pub pending_check: bool,
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

struct PendingCheck {
    check_id: u64,
    cancel: CancellationToken,
    // Dropping the handle detaches the task; cancellation goes through
    // `cancel`.
    _handle: JoinHandle<()>,
}

struct PollerInner {
    state: PollerState,
    job_id: Option<JobId>,
    interval: Duration,
    consecutive_failures: u32,
    next_check_id: u64,
    pending: Option<PendingCheck>,
}

impl PollerInner {
    fn cancel_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.cancel.cancel();
        }
    }
}

struct Shared<F: ?Sized> {
    fetcher: Arc<F>,
    config: PollConfig,
    events: mpsc::UnboundedSender<PollEvent>,
    inner: Mutex<PollerInner>,
}

impl<F: ?Sized> Shared<F> {
    /// The lock is never held across an await, so a poisoned lock only
    /// means a panic elsewhere; the state itself is still consistent.
    fn lock(&self) -> MutexGuard<'_, PollerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, job_id: JobId, kind: PollEventKind) {
        // A closed receiver means nobody is listening any more.
        let _ = self.events.send(PollEvent { job_id, kind });
    }

    fn stop(&self) {
        let mut inner = self.lock();
        if inner.state == PollerState::Stopped {
            return;
        }
        inner.cancel_pending();
        inner.state = PollerState::Stopped;
        if let Some(job_id) = inner.job_id.take() {
            tracing::info!(job_id = %job_id, "Status polling stopped");
        }
    }
}

impl<F> Shared<F>
where
    F: StatusFetcher + ?Sized + 'static,
{
    /// Replace the pending check with a new one firing after `delay`.
    fn schedule(self: &Arc<Self>, inner: &mut PollerInner, job_id: JobId, delay: Duration) {
        inner.cancel_pending();
        inner.next_check_id += 1;
        let check_id = inner.next_check_id;
        let cancel = CancellationToken::new();

        tracing::debug!(
            job_id = %job_id,
            check_id,
            delay_ms = delay.as_millis() as u64,
            "Scheduling status check",
        );

        let handle = tokio::spawn(Arc::clone(self).run_check(check_id, job_id, delay, cancel.clone()));
        inner.pending = Some(PendingCheck {
            check_id,
            cancel,
            _handle: handle,
        });
    }

    async fn run_check(self: Arc<Self>, check_id: u64, job_id: JobId, delay: Duration, cancel: CancellationToken) {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }

        tracing::debug!(job_id = %job_id, check_id, "Checking job status");
        let result = self.fetcher.fetch_status(&job_id).await;
        self.apply(check_id, job_id, result);
    }

    fn apply(self: &Arc<Self>, check_id: u64, job_id: JobId, result: Result<StatusResponse, ApiError>) {
        let mut inner = self.lock();

        let is_current = inner.pending.as_ref().is_some_and(|p| p.check_id == check_id);
        if !is_current || inner.state != PollerState::Active {
            tracing::debug!(job_id = %job_id, check_id, "Discarding stale status response");
            return;
        }
        // This task is the pending check; it is done once the result lands.
        inner.pending = None;

        let response = match result {
            Ok(response) => response,
            Err(error) => {
                inner.consecutive_failures += 1;
                let attempts = inner.consecutive_failures;

                if attempts > self.config.max_retries {
                    inner.state = PollerState::Failed;
                    tracing::error!(
                        job_id = %job_id,
                        attempts,
                        error = %error,
                        "Status polling gave up",
                    );
                    self.emit(
                        job_id,
                        PollEventKind::Failed(PollFailure::Exhausted {
                            attempts,
                            last_error: error.to_string(),
                        }),
                    );
                    return;
                }

                inner.interval = self.config.backoff.next(inner.interval, PollOutcome::Failure);
                let delay = inner.interval;
                tracing::warn!(
                    job_id = %job_id,
                    attempt = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Status check failed, retrying",
                );
                self.schedule(&mut inner, job_id, delay);
                return;
            }
        };

        inner.consecutive_failures = 0;
        let snapshot = response.snapshot();

        match snapshot.phase {
            Phase::Completed => {
                inner.state = PollerState::Completed;
                tracing::info!(
                    job_id = %job_id,
                    processed = snapshot.processed_count,
                    total = snapshot.total_count,
                    "Job completed",
                );
                self.emit(job_id, PollEventKind::Completed(snapshot));
            }
            Phase::Failed => {
                inner.state = PollerState::Failed;
                tracing::error!(job_id = %job_id, "Backend reported job failure");
                self.emit(job_id, PollEventKind::Failed(PollFailure::JobFailed { snapshot }));
            }
            _ => {
                tracing::debug!(
                    job_id = %job_id,
                    processed = snapshot.processed_count,
                    total = snapshot.total_count,
                    "Job in progress",
                );
                self.emit(job_id.clone(), PollEventKind::Progress(snapshot));
                inner.interval = self.config.backoff.next(inner.interval, PollOutcome::Success);
                let delay = inner.interval;
                self.schedule(&mut inner, job_id, delay);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// StatusPoller
// ---------------------------------------------------------------------------

/// Polls one job's status until it completes, fails, or is stopped.
///
/// Requires a Tokio runtime; checks run on spawned tasks. Dropping the
/// poller stops it.
pub struct StatusPoller<F: ?Sized> {
    shared: Arc<Shared<F>>,
}

impl<F> StatusPoller<F>
where
    F: StatusFetcher + ?Sized + 'static,
{
    /// Create an idle poller and the receiver its events are delivered on.
    pub fn new(fetcher: Arc<F>, config: PollConfig) -> (Self, mpsc::UnboundedReceiver<PollEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            fetcher,
            config,
            events,
            inner: Mutex::new(PollerInner {
                state: PollerState::Idle,
                job_id: None,
                interval: config.backoff.base_interval,
                consecutive_failures: 0,
                next_check_id: 0,
                pending: None,
            }),
        });
        (Self { shared }, rx)
    }

    /// Begin polling `job_id`, replacing any previous session.
    ///
    /// The first check runs after the base interval.
    pub fn start(&self, job_id: JobId) {
        let mut inner = self.shared.lock();
        tracing::info!(job_id = %job_id, "Status polling started");
        self.activate(&mut inner, job_id);
    }

    /// Stop polling from any state. Further calls are no-ops.
    pub fn stop(&self) {
        self.shared.stop();
    }

    /// Suspend an active session, keeping its job id.
    pub fn pause(&self) {
        let mut inner = self.shared.lock();
        if inner.state != PollerState::Active {
            return;
        }
        inner.cancel_pending();
        inner.state = PollerState::Paused;
        if let Some(job_id) = &inner.job_id {
            tracing::info!(job_id = %job_id, "Status polling paused");
        }
    }

    /// Continue a paused session from the base interval.
    ///
    /// Does nothing unless the poller is paused; in particular calling it
    /// while active does not restart the session.
    pub fn resume(&self) {
        let mut inner = self.shared.lock();
        if inner.state != PollerState::Paused {
            return;
        }
        let Some(job_id) = inner.job_id.clone() else {
            return;
        };
        tracing::info!(job_id = %job_id, "Status polling resumed");
        self.activate(&mut inner, job_id);
    }

    pub fn state(&self) -> PollerState {
        self.shared.lock().state
    }

    pub fn poll_state(&self) -> PollState {
        let inner = self.shared.lock();
        PollState {
            attempt_interval: inner.interval,
            consecutive_failures: inner.consecutive_failures,
            is_active: inner.state == PollerState::Active,
            pending_check: inner.pending.is_some(),
        }
    }

    pub fn job_id(&self) -> Option<JobId> {
        self.shared.lock().job_id.clone()
    }

    fn activate(&self, inner: &mut PollerInner, job_id: JobId) {
        let base = self.shared.config.backoff.base_interval;
        inner.state = PollerState::Active;
        inner.job_id = Some(job_id.clone());
        inner.interval = base;
        inner.consecutive_failures = 0;
        self.shared.schedule(inner, job_id, base);
    }
}

impl<F: ?Sized> Drop for StatusPoller<F> {
    fn drop(&mut self) {
        self.shared.stop();
    }
}
