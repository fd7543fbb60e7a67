//! REST API client for the processing backend.
//!
//! Wraps the four backend endpoints (human verification, upload start,
//! status, archive download) using [`reqwest`].

use std::path::Path;
use std::time::Duration;

use reqwest::Url;
use scanbatch_core::types::JobId;

use crate::form::{FormError, UploadForm};
use crate::messages::{StartUploadResponse, StatusResponse};

/// HTTP client for one backend deployment.
#[derive(Debug, Clone)]
pub struct BatchApi {
    client: reqwest::Client,
    base_url: String,
}

/// Errors from the backend REST layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, decoding, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend returned a non-2xx status code.
    #[error("Backend API error ({status}): {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The upload form could not be encoded.
    #[error(transparent)]
    Form(#[from] FormError),

    /// The base URL cannot carry a job path.
    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),

    /// Writing a downloaded archive failed.
    #[error("Failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ApiError {
    /// HTTP status code, when the backend answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Request(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Build `{base_url}/{route...}/{job_id}`.
///
/// The job id is always a single, percent-encoded path segment, so ids
/// containing `?`, `#` or `%` address the same job on the server.
pub fn job_url(base_url: &str, route: &[&str], job_id: &JobId) -> Result<Url, ApiError> {
    let mut url = Url::parse(base_url).map_err(|e| ApiError::InvalidUrl(format!("{base_url}: {e}")))?;
    url.path_segments_mut()
        .map_err(|()| ApiError::InvalidUrl(base_url.to_string()))?
        .pop_if_empty()
        .extend(route)
        .push(job_id.as_str());
    Ok(url)
}

impl BatchApi {
    /// Create a new API client.
    ///
    /// * `base_url` - Backend origin, e.g. `http://host:8888`. A trailing
    ///   slash is ignored.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create an API client with a per-request timeout.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL the finished archive for `job_id` is served from.
    pub fn download_url(&self, job_id: &JobId) -> Result<Url, ApiError> {
        job_url(&self.base_url, &["download"], job_id)
    }

    /// Submit the form for human verification.
    ///
    /// Sends `POST /verify-turnstile`. A 403 is reported as
    /// [`ApiError::Status`] like any other non-2xx answer; the submission
    /// layer decides what it means.
    pub async fn verify_turnstile(&self, form: &UploadForm) -> Result<(), ApiError> {
        let response = self
            .client
            .post(format!("{}/verify-turnstile", self.base_url))
            .multipart(form.to_multipart()?)
            .send()
            .await?;

        Self::check_status(response).await
    }

    /// Start processing the uploaded files.
    ///
    /// Sends `POST /start-upload` with the same form that passed
    /// verification. The returned body carries either a job id or an
    /// error message.
    pub async fn start_upload(&self, form: &UploadForm) -> Result<StartUploadResponse, ApiError> {
        let response = self
            .client
            .post(format!("{}/start-upload", self.base_url))
            .multipart(form.to_multipart()?)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Fetch the processing status of a batch.
    ///
    /// Sends `GET /api/status/{job_id}`.
    pub async fn get_status(&self, job_id: &JobId) -> Result<StatusResponse, ApiError> {
        let response = self
            .client
            .get(job_url(&self.base_url, &["api", "status"], job_id)?)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Download the finished archive for a batch to `dest`.
    ///
    /// Returns the number of bytes written.
    pub async fn download(&self, job_id: &JobId, dest: &Path) -> Result<u64, ApiError> {
        let response = self.client.get(self.download_url(job_id)?).send().await?;
        let response = Self::ensure_success(response).await?;
        let bytes = response.bytes().await?;

        tokio::fs::write(dest, &bytes)
            .await
            .map_err(|source| ApiError::Io {
                path: dest.display().to_string(),
                source,
            })?;

        tracing::info!(
            job_id = %job_id,
            bytes = bytes.len(),
            dest = %dest.display(),
            "Downloaded processed archive",
        );
        Ok(bytes.len() as u64)
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or an [`ApiError::Status`]
    /// containing the status and body text on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), ApiError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}
