use podfs_store::StoreError;
use podfs_types::TypeError;
use thiserror::Error;

/// Errors from file operations.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("file not found: {path}")]
    NotFound { path: String },

    #[error("block size {size} is outside 1..={max}")]
    InvalidBlockSize { size: u32, max: u32 },

    /// The stream did not contain exactly the declared number of bytes.
    #[error("length mismatch: declared {expected} bytes, stream had {actual}")]
    LengthMismatch { expected: u64, actual: u64 },

    /// A downloaded block does not have the size recorded in the inode.
    #[error("block {name} is {actual} bytes, inode records {expected}")]
    CorruptBlock {
        name: String,
        expected: u64,
        actual: u64,
    },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("invalid path: {0}")]
    Path(#[from] TypeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for FileError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

pub type FileResult<T> = Result<T, FileError>;
