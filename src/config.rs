use serde::{Deserialize, Serialize};
use tracing::warn;

/// Tuning for the recovery scanner.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ScanConfig {
    /// Concurrent oracle workers.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Addresses derived and queried per oracle call.
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,
    /// Consecutive unused indices tolerated past the highest used index
    /// before the scan stops.
    #[serde(default = "default_lookahead")]
    pub lookahead: u64,
}

fn default_workers() -> usize {
    5
}

fn default_batch_size() -> u64 {
    500
}

fn default_lookahead() -> u64 {
    25_000
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            workers: default_workers(),
            batch_size: default_batch_size(),
            lookahead: default_lookahead(),
        }
    }
}

/// Connection settings for the blockchain index API.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IndexerConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.siacentral.com/v2".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for IndexerConfig {
    fn default() -> Self {
        IndexerConfig {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct SextantConfig {
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub indexer: IndexerConfig,
}

impl SextantConfig {
    /// Loads the config from a toml file, falling back to defaults when the
    /// file is missing or unparseable.
    pub fn load_or_default(path: &str) -> Self {
        match std::fs::read_to_string(path) {
            Ok(s) => match toml::from_str(&s) {
                Ok(c) => c,
                Err(e) => {
                    warn!("error parsing config {}: {}. Using defaults", path, e);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }
}
