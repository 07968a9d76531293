//! Blockchain index oracle.
//!
//! The oracle answers one question in bulk: which of these addresses have
//! ever appeared on chain, and did they last send or receive. The concrete
//! HTTP client lives in [`crate::client`]; scans only see this trait so
//! tests can substitute stubs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::WalletError;

/// How an address was last used on chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageType {
    Sent,
    Received,
    #[serde(other)]
    Unknown,
}

/// A single used address reported by the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressUsage {
    pub address: String,
    pub usage_type: UsageType,
}

/// Batch "address used?" capability backed by a blockchain index. Must be
/// safe to call concurrently from multiple scan workers. Only used
/// addresses are returned, in no particular order.
#[async_trait]
pub trait AddressOracle: Send + Sync {
    async fn find_used(&self, addresses: &[String]) -> Result<Vec<AddressUsage>, WalletError>;
}
