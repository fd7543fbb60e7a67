//! Events emitted by the status poller.
//!
//! Every successful, non-terminal status check produces one
//! [`PollEvent::Progress`]. A session ends with exactly one terminal event,
//! [`PollEvent::Completed`] or [`PollEvent::Failed`], unless it is stopped
//! or paused first.

use scanbatch_core::progress::ProgressSnapshot;
use scanbatch_core::types::JobId;
use serde::Serialize;

/// Why a polling session ended without completing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
pub enum PollFailure {
    /// The backend reported the batch as failed.
    #[error("Failed to process images")]
    JobFailed { snapshot: ProgressSnapshot },

    /// Too many consecutive status fetches failed.
    #[error("Failed to fetch status after multiple retries")]
    Exhausted {
        /// Number of consecutive failed fetches, including the last one.
        attempts: u32,
        /// Description of the final fetch error.
        last_error: String,
    },
}

/// A status update for one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollEvent {
    pub job_id: JobId,
    pub kind: PollEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PollEventKind {
    /// The job is still running.
    Progress(ProgressSnapshot),

    /// The job finished; carries the final snapshot.
    Completed(ProgressSnapshot),

    /// The session ended in failure.
    Failed(PollFailure),
}

impl PollEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self.kind, PollEventKind::Progress(_))
    }
}
