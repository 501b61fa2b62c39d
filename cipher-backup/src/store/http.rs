//! Backup server destination.
//!
//! Posts the archive to the server's upload route in a single request,
//! identifying the job and object through `x-*` headers.

use super::{validate_key, ObjectStore, StoreError};
use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

pub struct HttpStore {
    client: reqwest::Client,
    base_url: String,
    job_id: String,
    token: Option<String>,
}

impl HttpStore {
    pub fn new(url: &str, job_id: &str, token: Option<String>) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("cipher-backup/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StoreError::Request(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
            job_id: job_id.to_string(),
            token,
        })
    }
}

#[async_trait]
impl ObjectStore for HttpStore {
    async fn put_object(&self, name: &str, data: Bytes) -> Result<(), StoreError> {
        validate_key(name)?;
        let upload_url = format!("{}/api/files/upload", self.base_url);
        debug!("Posting {} bytes to {} as {}", data.len(), upload_url, name);

        let mut request = self
            .client
            .post(&upload_url)
            .header("x-job-id", &self.job_id)
            .header("x-relative-path", name)
            .header("x-total-size", data.len().to_string())
            .header("content-type", "application/octet-stream")
            .body(data);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| StoreError::Request(format!("POST {}: {}", upload_url, e)))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        let body = resp.text().await.unwrap_or_default();
        let message = error_message(&body).unwrap_or_else(|| {
            if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("unknown error").to_string()
            } else {
                body.trim().to_string()
            }
        });

        Err(StoreError::Rejected {
            status: status.as_u16(),
            message,
        })
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }
}

/// Extracts `error` from a `{"error": "..."}` response body
fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value.get("error")?.as_str().map(str::to_string)
}
