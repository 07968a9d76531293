use thiserror::Error;

/// Errors surfaced by the wallet core. Mnemonic errors are returned
/// synchronously and name what the user needs to fix to recover a single
/// mistyped word; oracle errors carry the transport message unmodified.
#[derive(Error, Debug)]
pub enum WalletError {
    #[error("phrase is not valid: {0}")]
    MalformedPhrase(String),
    #[error("word \"{0}\" not found in dictionary")]
    UnknownWord(String),
    #[error("expected {expected} bytes, got {actual}: invalid length")]
    InvalidSeedLength { expected: usize, actual: usize },
    #[error("invalid checksum: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },
    #[error("address is not valid: {0}")]
    InvalidAddress(String),
    #[error("oracle request failed: {0}")]
    Oracle(String),
}
