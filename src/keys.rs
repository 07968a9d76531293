//! Deterministic key derivation.
//!
//! `key_from_seed(seed, index)` is a pure function: the ed25519 keypair is
//! generated from `blake2b256(seed || index_le)`, so the same (seed, index)
//! pair yields the same keypair on every platform. Address recovery with
//! other wallet software depends on this exact construction.

use blake2::digest::Digest;
use ed25519_dalek::{Signature, Signer, SigningKey};
use zeroize::Zeroize;

use crate::address::{Address, TaggedPublicKey, UnlockConditions};
use crate::mnemonic::{Blake2b256, Seed};

/// Derives the ed25519 signing key at `index`.
pub fn key_from_seed(seed: &Seed, index: u64) -> SigningKey {
    let mut buf = [0u8; 40];
    buf[..32].copy_from_slice(seed.as_bytes());
    buf[32..].copy_from_slice(&index.to_le_bytes());
    let mut digest: [u8; 32] = Blake2b256::digest(buf).into();
    buf.zeroize();
    let key = SigningKey::from_bytes(&digest);
    digest.zeroize();
    key
}

/// A derived secret key together with the unlock conditions that guard the
/// matching address.
pub struct SpendableKey {
    pub signing_key: SigningKey,
    pub unlock_conditions: UnlockConditions,
}

impl SpendableKey {
    pub fn address(&self) -> Address {
        self.unlock_conditions.unlock_hash()
    }

    pub fn public_key(&self) -> TaggedPublicKey {
        TaggedPublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Signs a 32-byte hash. Transaction construction itself lives with the
    /// caller; only the signature primitive is exposed here.
    pub fn sign_hash(&self, hash: &[u8; 32]) -> Signature {
        self.signing_key.sign(hash)
    }
}

/// Derives the spendable key at `index` with the standard single-signature
/// unlock policy.
pub fn spendable_key(seed: &Seed, index: u64) -> SpendableKey {
    let signing_key = key_from_seed(seed, index);
    let public = TaggedPublicKey(signing_key.verifying_key().to_bytes());
    SpendableKey {
        signing_key,
        unlock_conditions: UnlockConditions::standard(public),
    }
}
