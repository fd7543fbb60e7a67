//! JSON bodies exchanged with the processing backend.
//!
//! The backend answers `/start-upload` with either a batch identifier or
//! an error message, and `/api/status/{job_id}` with a status string plus
//! image counters. This module deserializes both into typed values and
//! converts them into core domain types.

use scanbatch_core::progress::{Phase, ProgressSnapshot};
use scanbatch_core::types::JobId;
use serde::Deserialize;

// ---------------------------------------------------------------------------
// Upload start
// ---------------------------------------------------------------------------

/// Body returned by `POST /start-upload`.
///
/// Exactly one of the fields is expected; an `error` wins when both are
/// present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartUploadResponse {
    /// Identifier of the batch that was queued. Older deployments send it
    /// as `batchId`.
    #[serde(default, rename = "jobId", alias = "batchId")]
    pub job_id: Option<String>,

    /// Human-readable reason the upload was refused.
    #[serde(default)]
    pub error: Option<String>,
}

/// Why a start-upload body did not yield a job.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StartUploadRejection {
    /// The backend reported an error message.
    #[error("{0}")]
    Server(String),

    /// The body carried neither a job id nor an error.
    #[error("Upload start response did not include a job id")]
    MissingJobId,

    /// The job id was present but unusable.
    #[error("Upload start response carried an invalid job id: {0}")]
    InvalidJobId(String),
}

impl StartUploadResponse {
    /// Resolve the body into the issued job id.
    pub fn into_job_id(self) -> Result<JobId, StartUploadRejection> {
        if let Some(error) = self.error.filter(|e| !e.trim().is_empty()) {
            return Err(StartUploadRejection::Server(error));
        }
        let raw = self.job_id.ok_or(StartUploadRejection::MissingJobId)?;
        JobId::new(raw).map_err(|e| StartUploadRejection::InvalidJobId(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Status string reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteStatus {
    Processing,
    Completed,
    Failed,
    /// Any status this client does not know. Treated as still running.
    #[serde(other)]
    Unknown,
}

/// Body returned by `GET /api/status/{job_id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    pub status: RemoteStatus,
    #[serde(default)]
    pub current_image_num: i64,
    #[serde(default)]
    pub num_images: i64,
}

impl StatusResponse {
    /// Convert into a progress snapshot, clamping counters into `u32`.
    pub fn snapshot(&self) -> ProgressSnapshot {
        let phase = match self.status {
            RemoteStatus::Completed => Phase::Completed,
            RemoteStatus::Failed => Phase::Failed,
            RemoteStatus::Processing | RemoteStatus::Unknown => Phase::Processing,
        };
        ProgressSnapshot::new(
            clamp_count("current_image_num", self.current_image_num),
            clamp_count("num_images", self.num_images),
            phase,
        )
    }
}

fn clamp_count(field: &'static str, value: i64) -> u32 {
    if value < 0 {
        tracing::warn!(field, value, "Backend reported a negative image count");
        return 0;
    }
    u32::try_from(value).unwrap_or(u32::MAX)
}
