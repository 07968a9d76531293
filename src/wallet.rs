//! Stateless seed wallet facade.
//!
//! A `SeedWallet` is nothing but a seed; every key and address is recomputed
//! on demand. Nothing is persisted.

use crate::dictionary::Dictionary;
use crate::error::WalletError;
use crate::keys::{spendable_key, SpendableKey};
use crate::mnemonic::{seed_from_phrase, seed_to_phrase, Seed};

#[derive(Clone)]
pub struct SeedWallet {
    seed: Seed,
}

impl SeedWallet {
    /// Creates a wallet with a fresh random seed.
    pub fn generate() -> Self {
        SeedWallet {
            seed: Seed::generate(),
        }
    }

    pub fn from_seed(seed: Seed) -> Self {
        SeedWallet { seed }
    }

    /// Recovers a wallet from a 28/29 word phrase.
    pub fn from_phrase(phrase: &str, dict: &Dictionary) -> Result<Self, WalletError> {
        Ok(SeedWallet {
            seed: seed_from_phrase(phrase, dict)?,
        })
    }

    /// The checksummed recovery phrase for this wallet's seed.
    pub fn recovery_phrase(&self, dict: &Dictionary) -> String {
        seed_to_phrase(&self.seed, dict)
    }

    pub fn seed(&self) -> &Seed {
        &self.seed
    }

    /// The spendable key at `index`.
    pub fn key_at(&self, index: u64) -> SpendableKey {
        spendable_key(&self.seed, index)
    }

    /// The spendable keys for `count` consecutive indices starting at
    /// `start`.
    pub fn keys(&self, start: u64, count: u64) -> Vec<SpendableKey> {
        (0..count)
            .map(|n| spendable_key(&self.seed, start + n))
            .collect()
    }
}
