use std::fmt;

use serde::Serialize;

use crate::error::CoreError;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Opaque batch identifier issued by the backend when an upload starts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Wrap a backend-issued identifier. Surrounding whitespace is trimmed.
    pub fn new(raw: impl Into<String>) -> Result<Self, CoreError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CoreError::Validation(
                "Job id must not be empty".to_string(),
            ));
        }
        if trimmed.contains('/') {
            return Err(CoreError::Validation(format!(
                "Job id must not contain '/', got: '{trimmed}'"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One server-side processing batch, owned by the lifecycle controller
/// for the duration of a single submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: JobId,
    pub created_at: Timestamp,
}

impl Job {
    pub fn new(id: JobId) -> Self {
        Self {
            id,
            created_at: chrono::Utc::now(),
        }
    }
}
