//! Terminal rendering of a session.

use scanbatch_core::progress::ProgressSnapshot;
use scanbatch_session::collaborators::{Collaborators, WakeLockError};
use scanbatch_session::controller::{DownloadLink, LifecyclePhase};

/// Prints session progress to stdout and errors to stderr.
///
/// There are no inputs to lock and no screen to keep awake in a terminal;
/// those calls are only logged.
#[derive(Debug, Default)]
pub struct TerminalUi;

impl TerminalUi {
    pub fn new() -> Self {
        Self
    }
}

/// One progress line, e.g. `Processed 3 of 10 images... (30%)`.
pub fn progress_line(snapshot: &ProgressSnapshot) -> String {
    match snapshot.percent() {
        Some(percent) => format!("{} ({percent}%)", snapshot.summary()),
        None => "Waiting for the server to count images...".to_string(),
    }
}

impl Collaborators for TerminalUi {
    fn disable_inputs(&self) {
        tracing::debug!("Inputs locked");
    }

    fn enable_inputs(&self) {
        tracing::debug!("Inputs unlocked");
    }

    fn render_phase(&self, phase: LifecyclePhase) {
        match phase {
            LifecyclePhase::Idle | LifecyclePhase::Failed => {}
            LifecyclePhase::Completed => println!("Done."),
            _ => println!("{phase}..."),
        }
    }

    fn render_progress(&self, snapshot: &ProgressSnapshot) {
        println!("{}", progress_line(snapshot));
    }

    fn render_error(&self, message: &str) {
        eprintln!("error: {message}");
    }

    fn show_download_ready(&self, link: &DownloadLink) {
        println!("Download ready: {}", link.url);
    }

    fn acquire_wake_lock(&self) -> Result<(), WakeLockError> {
        tracing::debug!("Keeping session awake");
        Ok(())
    }

    fn release_wake_lock(&self) {
        tracing::debug!("Session no longer needs to stay awake");
    }
}

#[cfg(test)]
mod tests {
    use scanbatch_core::progress::Phase;

    use super::*;

    #[test]
    fn progress_line_includes_percent() {
        let snapshot = ProgressSnapshot::new(3, 10, Phase::Processing);
        assert_eq!(progress_line(&snapshot), "Processed 3 of 10 images... (30%)");
    }

    #[test]
    fn progress_line_without_total() {
        let snapshot = ProgressSnapshot::new(0, 0, Phase::Processing);
        assert_eq!(
            progress_line(&snapshot),
            "Waiting for the server to count images..."
        );
    }
}
