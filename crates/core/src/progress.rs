//! Progress snapshots reported while a batch moves through the backend.

use serde::Serialize;

/// Where a batch currently is, from the client's point of view.
///
/// `Verifying` and `Uploading` are client-side phases of the submission
/// handshake; the remaining phases mirror the backend's status field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Verifying,
    Uploading,
    Processing,
    Completed,
    Failed,
}

impl Phase {
    /// `true` for phases after which no further status checks happen.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// One progress observation, delivered per successful status check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    /// Number of images the backend has finished.
    pub processed_count: u32,
    /// Number of images in the batch; zero until the backend has counted them.
    pub total_count: u32,
    pub phase: Phase,
}

impl ProgressSnapshot {
    pub fn new(processed_count: u32, total_count: u32, phase: Phase) -> Self {
        Self {
            processed_count,
            total_count,
            phase,
        }
    }

    /// Completion percentage (0-100), or `None` while the total is unknown.
    ///
    /// Rounded to the nearest integer and capped at 100 so an over-reporting
    /// backend cannot push a progress bar past full.
    pub fn percent(&self) -> Option<u8> {
        if self.total_count == 0 {
            return None;
        }
        let ratio = self.processed_count as f64 / self.total_count as f64;
        Some((ratio * 100.0).round().min(100.0) as u8)
    }

    /// Human-readable progress line, empty while the total is unknown.
    pub fn summary(&self) -> String {
        if self.total_count == 0 {
            return String::new();
        }
        format!(
            "Processed {} of {} images...",
            self.processed_count, self.total_count
        )
    }
}
