//! Unlock conditions and address encoding.
//!
//! An address is the Merkle root of its unlock conditions (blake2b-256,
//! leaf prefix 0x00, node prefix 0x01) rendered as hex with a 6-byte
//! checksum suffix. The standard wallet shape is a single ed25519 key,
//! one required signature and no timelock.

use blake2::digest::Digest;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::WalletError;
use crate::mnemonic::Blake2b256;

const LEAF_PREFIX: u8 = 0x00;
const NODE_PREFIX: u8 = 0x01;

/// 16-byte algorithm specifier for ed25519 keys, zero padded.
const ED25519_SPECIFIER: [u8; 16] = *b"ed25519\0\0\0\0\0\0\0\0\0";

const ADDRESS_CHECKSUM_BYTES: usize = 6;

/// An ed25519 public key tagged with its algorithm, rendered as
/// `ed25519:<hex>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaggedPublicKey(pub [u8; 32]);

impl std::fmt::Display for TaggedPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ed25519:{}", hex::encode(self.0))
    }
}

impl Serialize for TaggedPublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TaggedPublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let hex_part = s
            .strip_prefix("ed25519:")
            .ok_or_else(|| D::Error::custom("expected ed25519 public key"))?;
        let bytes = hex::decode(hex_part).map_err(D::Error::custom)?;
        let key: [u8; 32] = bytes
            .try_into()
            .map_err(|_| D::Error::custom("expected 32 byte key"))?;
        Ok(TaggedPublicKey(key))
    }
}

/// Conditions that must be met to spend outputs sent to an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockConditions {
    pub timelock: u64,
    #[serde(rename = "publickeys")]
    pub public_keys: Vec<TaggedPublicKey>,
    #[serde(rename = "signaturesrequired")]
    pub signatures_required: u64,
}

impl UnlockConditions {
    /// The single-signature policy used for every wallet address: one
    /// ed25519 key, one required signature, no timelock.
    pub fn standard(key: TaggedPublicKey) -> Self {
        UnlockConditions {
            timelock: 0,
            public_keys: vec![key],
            signatures_required: 1,
        }
    }

    /// Computes the Merkle root of the encoded unlock conditions. Leaves
    /// are the timelock, each public key and the signature count, in that
    /// order.
    pub fn unlock_hash(&self) -> Address {
        let mut acc = MerkleAccumulator::new();
        acc.push_leaf(&self.timelock.to_le_bytes());
        for key in &self.public_keys {
            let mut buf = Vec::with_capacity(16 + 8 + 32);
            buf.extend_from_slice(&ED25519_SPECIFIER);
            buf.extend_from_slice(&(key.0.len() as u64).to_le_bytes());
            buf.extend_from_slice(&key.0);
            acc.push_leaf(&buf);
        }
        acc.push_leaf(&self.signatures_required.to_le_bytes());
        Address(acc.root())
    }
}

/// Streaming Merkle root accumulator. Subtrees of equal height are joined
/// as leaves arrive; the final root joins any remaining subtrees smallest
/// first.
struct MerkleAccumulator {
    // (height, hash), highest first
    stack: Vec<(u32, [u8; 32])>,
}

impl MerkleAccumulator {
    fn new() -> Self {
        MerkleAccumulator { stack: Vec::new() }
    }

    fn leaf_hash(data: &[u8]) -> [u8; 32] {
        let mut hasher = Blake2b256::new();
        hasher.update([LEAF_PREFIX]);
        hasher.update(data);
        hasher.finalize().into()
    }

    fn node_hash(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
        let mut hasher = Blake2b256::new();
        hasher.update([NODE_PREFIX]);
        hasher.update(left);
        hasher.update(right);
        hasher.finalize().into()
    }

    fn push_leaf(&mut self, data: &[u8]) {
        let mut height = 0u32;
        let mut hash = Self::leaf_hash(data);
        while let Some(&(top_height, top_hash)) = self.stack.last() {
            if top_height != height {
                break;
            }
            self.stack.pop();
            hash = Self::node_hash(&top_hash, &hash);
            height += 1;
        }
        self.stack.push((height, hash));
    }

    fn root(mut self) -> [u8; 32] {
        let (_, mut hash) = self.stack.pop().expect("at least one leaf");
        while let Some((_, left)) = self.stack.pop() {
            hash = Self::node_hash(&left, &hash);
        }
        hash
    }
}

/// A 32-byte unlock hash. Displays as 76 hex characters: the hash followed
/// by the first 6 bytes of its blake2b digest as a transcription checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address(pub [u8; 32]);

impl Address {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Parses and checksum-verifies the hex form produced by `Display`.
    pub fn parse(s: &str) -> Result<Self, WalletError> {
        let bytes =
            hex::decode(s).map_err(|e| WalletError::InvalidAddress(e.to_string()))?;
        if bytes.len() != 32 + ADDRESS_CHECKSUM_BYTES {
            return Err(WalletError::InvalidAddress(format!(
                "expected {} bytes, got {}",
                32 + ADDRESS_CHECKSUM_BYTES,
                bytes.len()
            )));
        }
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes[..32]);
        let digest = Blake2b256::digest(hash);
        if digest[..ADDRESS_CHECKSUM_BYTES] != bytes[32..] {
            return Err(WalletError::ChecksumMismatch {
                expected: hex::encode(&digest[..ADDRESS_CHECKSUM_BYTES]),
                actual: hex::encode(&bytes[32..]),
            });
        }
        Ok(Address(hash))
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let digest = Blake2b256::digest(self.0);
        write!(
            f,
            "{}{}",
            hex::encode(self.0),
            hex::encode(&digest[..ADDRESS_CHECKSUM_BYTES])
        )
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
