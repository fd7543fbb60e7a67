//! Backend seams used by submission and polling.
//!
//! The session layer only needs two capabilities from the backend: run the
//! submission handshake and fetch a job's status. Keeping them behind
//! traits lets tests script the backend without a network.

use async_trait::async_trait;
use scanbatch_core::types::JobId;

use crate::api::{ApiError, BatchApi};
use crate::form::UploadForm;
use crate::messages::{StartUploadResponse, StatusResponse};

/// The two endpoints involved in starting a job.
#[async_trait]
pub trait SubmissionBackend: Send + Sync {
    /// Human verification for the form.
    async fn verify(&self, form: &UploadForm) -> Result<(), ApiError>;

    /// Start processing the form's files.
    async fn start_upload(&self, form: &UploadForm) -> Result<StartUploadResponse, ApiError>;
}

/// The status endpoint polled while a job runs.
#[async_trait]
pub trait StatusFetcher: Send + Sync {
    async fn fetch_status(&self, job_id: &JobId) -> Result<StatusResponse, ApiError>;
}

#[async_trait]
impl SubmissionBackend for BatchApi {
    async fn verify(&self, form: &UploadForm) -> Result<(), ApiError> {
        self.verify_turnstile(form).await
    }

    async fn start_upload(&self, form: &UploadForm) -> Result<StartUploadResponse, ApiError> {
        BatchApi::start_upload(self, form).await
    }
}

#[async_trait]
impl StatusFetcher for BatchApi {
    async fn fetch_status(&self, job_id: &JobId) -> Result<StatusResponse, ApiError> {
        self.get_status(job_id).await
    }
}
