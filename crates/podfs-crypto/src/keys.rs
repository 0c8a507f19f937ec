//! Deterministic account keys.
//!
//! Every account (the user account and one per pod) has its own Ed25519
//! keypair derived from a single 32-byte root secret. Re-deriving the same
//! [`AccountIndex`] always yields the same keypair, so feeds written in one
//! session can be found and extended in the next.

use std::fmt;

use podfs_types::OwnerAddress;
use rand::RngCore;

use crate::signer::{Signature, SigningKey, VerifyingKey};

const DERIVE_CONTEXT: &str = "podfs 2024-01-01 account signing key v1";

/// Secret all account keys are derived from.
#[derive(Clone)]
pub struct RootSecret([u8; 32]);

impl RootSecret {
    /// Generate a fresh random root secret.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for RootSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RootSecret(<redacted>)")
    }
}

/// Which account of a root secret to derive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AccountIndex {
    /// The user account; owns the pod-record feed.
    User,
    /// The account owning pod number `n`.
    Pod(u32),
}

impl AccountIndex {
    fn to_bytes(self) -> [u8; 5] {
        let mut out = [0u8; 5];
        match self {
            Self::User => {}
            Self::Pod(n) => {
                out[0] = 1;
                out[1..].copy_from_slice(&n.to_be_bytes());
            }
        }
        out
    }
}

/// Keypair and address of one derived account.
pub struct AccountKeys {
    index: AccountIndex,
    signing: SigningKey,
    verifying: VerifyingKey,
    address: OwnerAddress,
}

impl AccountKeys {
    /// Derive the keys for `index` from `root`.
    pub fn derive(root: &RootSecret, index: AccountIndex) -> Self {
        let mut hasher = blake3::Hasher::new_derive_key(DERIVE_CONTEXT);
        hasher.update(root.as_bytes());
        hasher.update(&index.to_bytes());
        Self::from_signing_key(index, SigningKey::from_seed(*hasher.finalize().as_bytes()))
    }

    /// Wrap an existing signing key.
    pub fn from_signing_key(index: AccountIndex, signing: SigningKey) -> Self {
        let verifying = signing.public();
        let address = verifying.owner();
        Self {
            index,
            signing,
            verifying,
            address,
        }
    }

    pub fn index(&self) -> AccountIndex {
        self.index
    }

    pub fn address(&self) -> OwnerAddress {
        self.address
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.verifying
    }

    pub fn sign(&self, digest: &[u8; 32]) -> Signature {
        self.signing.sign_digest(digest)
    }
}

impl fmt::Debug for AccountKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountKeys")
            .field("index", &self.index)
            .field("address", &self.address)
            .finish()
    }
}
