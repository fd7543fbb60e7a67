//! UI capabilities driven by a session.
//!
//! The session never renders anything itself. It calls into a
//! [`Collaborators`] implementation to lock and unlock inputs, show
//! progress, surface errors, and hold the keep-awake resource.

use std::sync::Arc;

use scanbatch_core::progress::ProgressSnapshot;

use crate::controller::{DownloadLink, LifecyclePhase};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WakeLockError {
    #[error("Wake lock is not supported")]
    Unsupported,

    #[error("Wake lock request denied: {0}")]
    Denied(String),
}

/// Everything a session needs from its surroundings.
pub trait Collaborators: Send + Sync + 'static {
    /// Lock the form while a job is being submitted or processed.
    fn disable_inputs(&self);

    /// Make the form editable again.
    fn enable_inputs(&self);

    /// Show the current lifecycle phase, usually as the action label.
    fn render_phase(&self, phase: LifecyclePhase);

    fn render_progress(&self, snapshot: &ProgressSnapshot);

    /// Show a single user-facing error message.
    fn render_error(&self, message: &str);

    fn show_download_ready(&self, link: &DownloadLink);

    fn acquire_wake_lock(&self) -> Result<(), WakeLockError>;

    fn release_wake_lock(&self);
}

/// Scoped ownership of the wake lock.
///
/// Released exactly once: by [`release`](Self::release) or on drop,
/// whichever comes first. If acquisition failed there is nothing to
/// release.
pub struct WakeLockGuard<U: Collaborators + ?Sized> {
    ui: Arc<U>,
    held: bool,
}

impl<U: Collaborators + ?Sized> WakeLockGuard<U> {
    /// Try to take the wake lock. Failure is logged and otherwise ignored;
    /// the job runs either way.
    pub fn acquire(ui: Arc<U>) -> Self {
        let held = match ui.acquire_wake_lock() {
            Ok(()) => {
                tracing::debug!("Wake lock acquired");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not acquire wake lock");
                false
            }
        };
        Self { ui, held }
    }

    pub fn is_held(&self) -> bool {
        self.held
    }

    pub fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if std::mem::take(&mut self.held) {
            self.ui.release_wake_lock();
            tracing::debug!("Wake lock released");
        }
    }
}

impl<U: Collaborators + ?Sized> Drop for WakeLockGuard<U> {
    fn drop(&mut self) {
        self.release_once();
    }
}
