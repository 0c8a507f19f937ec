//! Cryptographic primitives for podfs.
//!
//! Provides domain-separated BLAKE3 hashing, Ed25519 signing/verification,
//! and deterministic derivation of per-account keypairs from a root secret.
//!
//! All crypto operations wrap established libraries; nothing here is custom
//! cryptography.

pub mod hasher;
pub mod keys;
pub mod signer;

pub use hasher::{owner_address, topic_for_path, topic_for_str, ContentHasher};
pub use keys::{AccountIndex, AccountKeys, RootSecret};
pub use signer::{Signature, SignatureError, SigningKey, VerifyingKey, SIGNATURE_LEN};
