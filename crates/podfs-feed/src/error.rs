//! Error types for feed operations.

use podfs_crypto::SignatureError;
use podfs_store::StoreError;
use podfs_types::{OwnerAddress, Topic};
use thiserror::Error;

/// Errors that can occur during feed operations.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The payload does not fit in a single feed update.
    #[error("payload of {len} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { len: usize, max: usize },

    /// The topic is not exactly 32 bytes.
    #[error("invalid topic length: expected {expected}, got {actual}")]
    InvalidTopic { expected: usize, actual: usize },

    /// No update has ever been published for this (owner, topic).
    #[error("no feed updates found for topic {topic} of owner {owner}")]
    NotFound { owner: OwnerAddress, topic: Topic },

    /// A fetched update failed verification.
    #[error("invalid feed update at index {index}: {reason}")]
    InvalidUpdate { index: u64, reason: String },

    /// Signature verification failed.
    #[error("signature error: {0}")]
    Signature(#[from] SignatureError),

    /// Encoding or decoding of the update envelope failed.
    #[error("codec error: {0}")]
    Codec(String),

    /// The object store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl FeedError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Convenience type alias for feed operations.
pub type FeedResult<T> = std::result::Result<T, FeedError>;
