//! HTTP client for a chain indexer exposing address-usage queries.
//!
//! The wire protocol is a small JSON envelope: every response carries a
//! `type` and `message` pair, and `type` must be `"success"` regardless of
//! the HTTP status.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::IndexerConfig;
use crate::error::WalletError;
use crate::oracle::{AddressOracle, AddressUsage};

const SUCCESS: &str = "success";

#[derive(Debug, Serialize)]
struct UsedAddressesRequest<'a> {
    addresses: &'a [String],
}

#[derive(Debug, Deserialize)]
struct UsedAddressesResponse {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    addresses: Vec<AddressUsage>,
}

#[derive(Debug, Deserialize)]
struct BlockResponse {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    message: String,
    block: BlockTip,
}

#[derive(Debug, Deserialize)]
struct BlockTip {
    height: u64,
}

/// Client for the indexer's REST API.
pub struct IndexerClient {
    base_url: String,
    client: Client,
}

impl IndexerClient {
    pub fn new(config: &IndexerConfig) -> Result<Self, WalletError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| WalletError::Oracle(format!("unable to build http client: {}", e)))?;
        Ok(IndexerClient {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Current chain tip height, mostly useful as a connectivity check.
    pub async fn block_height(&self) -> Result<u64, WalletError> {
        let url = format!("{}/explorer/blocks", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| WalletError::Oracle(format!("request failed: {}", e)))?;

        let status = response.status();
        let body: BlockResponse = response
            .json()
            .await
            .map_err(|e| WalletError::Oracle(format!("unable to parse response: {}", e)))?;

        if !status.is_success() || body.kind != SUCCESS {
            return Err(WalletError::Oracle(body.message));
        }
        Ok(body.block.height)
    }
}

#[async_trait]
impl AddressOracle for IndexerClient {
    async fn find_used(&self, addresses: &[String]) -> Result<Vec<AddressUsage>, WalletError> {
        let url = format!("{}/wallet/addresses/used", self.base_url);
        debug!("querying {} for {} addresses", url, addresses.len());

        let response = self
            .client
            .post(&url)
            .json(&UsedAddressesRequest { addresses })
            .send()
            .await
            .map_err(|e| WalletError::Oracle(format!("request failed: {}", e)))?;

        let status = response.status();
        let body: UsedAddressesResponse = response
            .json()
            .await
            .map_err(|e| WalletError::Oracle(format!("unable to parse response: {}", e)))?;

        if !status.is_success() || body.kind != SUCCESS {
            return Err(WalletError::Oracle(body.message));
        }
        Ok(body.addresses)
    }
}
