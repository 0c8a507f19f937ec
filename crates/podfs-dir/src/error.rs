use podfs_feed::FeedError;
use podfs_file::FileError;
use podfs_store::StoreError;
use podfs_types::TypeError;
use thiserror::Error;

/// Errors from directory operations.
#[derive(Debug, Error)]
pub enum DirError {
    #[error("directory not found: {path}")]
    NotFound { path: String },

    /// A feed held an inode for a different path than the one requested.
    #[error("inode path mismatch: expected {expected}, found {found}")]
    PathMismatch { expected: String, found: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("file error: {0}")]
    File(#[from] FileError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("invalid path: {0}")]
    Path(#[from] TypeError),
}

impl DirError {
    /// True when the directory or its feed simply does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Feed(e) => e.is_not_found(),
            Self::Store(e) => matches!(e, StoreError::NotFound(_)),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for DirError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

pub type DirResult<T> = Result<T, DirError>;
