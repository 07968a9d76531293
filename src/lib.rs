pub mod error;
pub mod baseconv;
pub mod dictionary;
pub mod mnemonic;
pub mod keys;
pub mod address;
pub mod oracle;
pub mod client;
pub mod scanner;
pub mod wallet;
pub mod config;

pub use error::WalletError;
pub use wallet::SeedWallet;
