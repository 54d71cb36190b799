//! Client side of the mapping server protocol.
//!
//! The server hands out the complete mapping as flat rows and accepts one
//! [`ChangeSet`] per commit. After a successful commit the caller re-reads the rows;
//! the server's response body is not used for reconciliation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use tracing::{debug, warn};

use crate::errors::{StageError, StageResult};
use crate::payload::{ChangeSet, MappingRow};

#[async_trait]
pub trait MappingServer: Send + Sync {
    /// The full authoritative row-set
    async fn fetch_rows(&self) -> StageResult<Vec<MappingRow>>;

    /// Apply one commit payload. Any error means nothing is known to have landed.
    async fn apply_changes(&self, changes: &ChangeSet) -> StageResult<()>;
}

/// `MappingServer` over JSON/HTTP
///
/// `GET {base}/mappings` returns the rows, `POST {base}/mappings/commit` takes the
/// change-set.
#[derive(Clone, Debug)]
pub struct HttpMappingServer {
    client: Client,
    base_url: String,
}

impl HttpMappingServer {
    pub fn new(base_url: &str, timeout: Duration) -> StageResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StageError::Remote(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[async_trait]
impl MappingServer for HttpMappingServer {
    async fn fetch_rows(&self) -> StageResult<Vec<MappingRow>> {
        let url = self.endpoint("mappings");
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| StageError::Remote(format!("GET {} failed: {}", url, e)))?;
        let response = ensure_success(response).await?;

        let rows: Vec<MappingRow> = response
            .json()
            .await
            .map_err(|e| StageError::Remote(format!("Invalid row-set from {}: {}", url, e)))?;
        debug!("Fetched {} rows", rows.len());
        Ok(rows)
    }

    async fn apply_changes(&self, changes: &ChangeSet) -> StageResult<()> {
        let url = self.endpoint("mappings/commit");
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .json(changes)
            .send()
            .await
            .map_err(|e| StageError::Remote(format!("POST {} failed: {}", url, e)))?;
        ensure_success(response).await?;
        Ok(())
    }
}

async fn ensure_success(response: Response) -> StageResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    warn!("Mapping server answered {}: {}", status, body);
    Err(StageError::Remote(format!(
        "Server responded with status {}: {}",
        status, body
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_ignore_trailing_slash() {
        let server = HttpMappingServer::new("http://localhost:8080/api/", Duration::from_secs(5)).unwrap();
        assert_eq!(server.base_url(), "http://localhost:8080/api");
        assert_eq!(server.endpoint("mappings"), "http://localhost:8080/api/mappings");
        assert_eq!(
            server.endpoint("mappings/commit"),
            "http://localhost:8080/api/mappings/commit"
        );
    }

    #[tokio::test]
    async fn unreachable_server_is_a_remote_error() {
        let server = HttpMappingServer::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = server.fetch_rows().await.unwrap_err();
        assert!(matches!(err, StageError::Remote(_)));
    }
}
