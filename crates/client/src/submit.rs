//! Two-phase job submission.
//!
//! A job starts with human verification and only then posts the files to
//! the upload-start endpoint. Either step failing aborts the whole
//! submission; nothing is retained, so the caller either receives a
//! [`Job`] or an error.

use std::sync::Arc;

use scanbatch_core::types::Job;

use crate::api::ApiError;
use crate::backend::SubmissionBackend;
use crate::form::UploadForm;
use crate::messages::StartUploadRejection;

/// Status code the verification endpoint uses for a rejected human check.
const HUMAN_CHECK_REJECTED: u16 = 403;

/// Submission step that is about to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitStage {
    Verifying,
    Uploading,
}

/// Failure of the verification step.
#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    /// The backend rejected the human-verification token.
    #[error("Human verification failed. Please reload and try again.")]
    HumanCheckRejected,

    /// The verification endpoint answered with another error status.
    #[error("Verification failed: {status}")]
    Endpoint { status: u16 },

    /// The verification request never got an answer.
    #[error("Verification request failed: {0}")]
    Transport(String),
}

/// Failure of the upload-start step.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    /// The backend refused the upload with a message, or sent no job id.
    #[error(transparent)]
    Rejected(#[from] StartUploadRejection),

    /// The upload-start endpoint answered with an error status.
    #[error("Upload start failed: {status}")]
    Endpoint { status: u16 },

    /// The upload-start request never got a usable answer.
    #[error("Upload start request failed: {0}")]
    Transport(String),
}

/// Any failure of the submission handshake. Always terminal.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error(transparent)]
    Submission(#[from] SubmissionError),
}

impl From<ApiError> for VerificationError {
    fn from(error: ApiError) -> Self {
        match error {
            ApiError::Status { status, .. } if status == HUMAN_CHECK_REJECTED => {
                Self::HumanCheckRejected
            }
            ApiError::Status { status, .. } => Self::Endpoint { status },
            other => Self::Transport(other.to_string()),
        }
    }
}

impl From<ApiError> for SubmissionError {
    fn from(error: ApiError) -> Self {
        match error {
            ApiError::Status { status, .. } => Self::Endpoint { status },
            other => Self::Transport(other.to_string()),
        }
    }
}

/// Runs the verification + upload-start handshake against a backend.
pub struct JobSubmitter<B: ?Sized> {
    backend: Arc<B>,
}

impl<B: SubmissionBackend + ?Sized> JobSubmitter<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Submit `form` and return the job the backend created.
    pub async fn submit(&self, form: &UploadForm) -> Result<Job, SubmitError> {
        self.submit_observed(form, |_| {}).await
    }

    /// Like [`submit`](Self::submit), reporting each stage to `on_stage`
    /// before it runs.
    pub async fn submit_observed<F>(&self, form: &UploadForm, mut on_stage: F) -> Result<Job, SubmitError>
    where
        F: FnMut(SubmitStage) + Send,
    {
        on_stage(SubmitStage::Verifying);
        tracing::info!(
            files = form.files().len(),
            bytes = form.total_bytes(),
            "Verifying upload",
        );
        self.backend.verify(form).await.map_err(|e| {
            let error = VerificationError::from(e);
            tracing::error!(error = %error, "Verification failed");
            error
        })?;

        on_stage(SubmitStage::Uploading);
        tracing::info!("Starting upload");
        let body = self.backend.start_upload(form).await.map_err(|e| {
            let error = SubmissionError::from(e);
            tracing::error!(error = %error, "Upload start failed");
            error
        })?;

        let job_id = body.into_job_id().map_err(|rejection| {
            tracing::error!(error = %rejection, "Upload start rejected");
            SubmissionError::Rejected(rejection)
        })?;

        tracing::info!(job_id = %job_id, "Upload accepted");
        Ok(Job::new(job_id))
    }
}
