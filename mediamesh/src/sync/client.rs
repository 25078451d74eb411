//! HTTP client for a satellite talking to its master.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{SyncError, SyncResult};
use crate::catalog::{CatalogEntry, CatalogListing};
use crate::SECRET_HEADER;

/// Timeout for a single push or pull request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Body of `POST /sync`: the full catalog of one owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPush {
    pub owner: String,
    /// Base URL other nodes use to reach this owner.
    pub url: String,
    #[serde(default)]
    pub files: Vec<CatalogEntry>,
}

/// Pushes to and pulls from a master node.
#[derive(Debug, Clone)]
pub struct MasterClient {
    client: Client,
    master_url: String,
    secret: String,
}

impl MasterClient {
    pub fn new(master_url: impl Into<String>, secret: impl Into<String>) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SyncError::Remote(e.to_string()))?;
        Ok(Self::with_client(client, master_url, secret))
    }

    pub fn with_client(
        client: Client,
        master_url: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            client,
            master_url: master_url.into().trim_end_matches('/').to_string(),
            secret: secret.into(),
        }
    }

    pub fn master_url(&self) -> &str {
        &self.master_url
    }

    /// Send the full local catalog to the master.
    pub async fn push(&self, body: &SyncPush) -> SyncResult<()> {
        let url = format!("{}/sync", self.master_url);
        let response = self
            .authorized(self.client.post(&url))
            .json(body)
            .send()
            .await
            .map_err(|e| SyncError::Remote(format!("push to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Remote(format!(
                "push to {} answered HTTP {}",
                url,
                status.as_u16()
            )));
        }
        debug!(url = %url, files = body.files.len(), "Catalog pushed");
        Ok(())
    }

    /// Fetch the master's merged catalog and node list.
    pub async fn pull(&self) -> SyncResult<CatalogListing> {
        let url = format!("{}/files", self.master_url);
        let response = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .map_err(|e| SyncError::Remote(format!("pull from {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Remote(format!(
                "pull from {} answered HTTP {}",
                url,
                status.as_u16()
            )));
        }

        let listing: CatalogListing = response
            .json()
            .await
            .map_err(|e| SyncError::Remote(format!("invalid catalog from {}: {}", url, e)))?;
        debug!(
            url = %url,
            files = listing.files.len(),
            nodes = listing.nodes.len(),
            "Catalog pulled"
        );
        Ok(listing)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.secret.is_empty() {
            builder
        } else {
            builder.header(SECRET_HEADER, &self.secret)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_master_url_trailing_slash_trimmed() {
        let client = MasterClient::new("http://master:4242/", "").unwrap();
        assert_eq!(client.master_url(), "http://master:4242");
    }

    #[test]
    fn test_sync_push_wire_format() {
        let push = SyncPush {
            owner: "Josh".to_string(),
            url: "http://josh:4242".to_string(),
            files: vec![CatalogEntry::new("Josh", "Movies/Heat.mkv", "Heat.mkv", 7)],
        };

        let value = serde_json::to_value(&push).unwrap();
        assert_eq!(value["owner"], "Josh");
        assert_eq!(value["files"][0]["sizeBytes"], 7);
        assert_eq!(value["files"][0]["id"], "JoshMovies/Heat.mkv");
    }

    #[tokio::test]
    async fn test_pull_unreachable_master() {
        let client = MasterClient::new("http://127.0.0.1:9", "").unwrap();
        let err = client.pull().await.unwrap_err();
        assert!(matches!(err, SyncError::Remote(_)));
    }
}
