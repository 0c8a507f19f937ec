use podfs_types::Address;

/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Nothing is stored at the address. Covers both chunks and blobs.
    #[error("object not found: {0}")]
    NotFound(Address),

    /// A chunk exceeded the size the store accepts.
    #[error("chunk of {len} bytes exceeds the {max} byte limit")]
    ChunkTooLarge { len: usize, max: usize },

    /// A different chunk is already stored at this address.
    #[error("address already holds different content: {0}")]
    AddressInUse(Address),

    /// Downloaded bytes do not hash to the requested address.
    #[error("hash mismatch for {0}")]
    HashMismatch(Address),

    /// The backend rejected or failed the request.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
