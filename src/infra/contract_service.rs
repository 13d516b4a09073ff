use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::app::ports::ContractDirectoryPort;
use crate::contracts::{parse_directory_payload, ContractDirectory};
use crate::error::{AlertError, Result};

/// Contract directory served over HTTP as a JSON document
pub struct HttpContractDirectory {
    url: Option<String>,
    client: reqwest::Client,
}

impl HttpContractDirectory {
    pub fn new(url: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { url, client })
    }
}

#[async_trait]
impl ContractDirectoryPort for HttpContractDirectory {
    async fn fetch(&self) -> Result<ContractDirectory> {
        let url = self
            .url
            .as_deref()
            .ok_or_else(|| AlertError::DirectoryFetch("no directory URL configured".to_string()))?;
        debug!(url, "Fetching contract directory");

        let resp = self
            .client
            .get(url)
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| AlertError::DirectoryFetch(format!("request failed: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AlertError::DirectoryFetch(format!(
                "service responded {} ({})",
                status.canonical_reason().unwrap_or("unknown"),
                status.as_u16()
            )));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| AlertError::DirectoryFetch(format!("failed to read body: {e}")))?;

        let directory = parse_directory_payload(&bytes)?;
        info!(entries = directory.len(), "Loaded contract directory");
        Ok(directory)
    }
}
