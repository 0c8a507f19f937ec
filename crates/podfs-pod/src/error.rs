use podfs_dir::DirError;
use podfs_feed::FeedError;
use podfs_file::FileError;
use podfs_store::StoreError;
use podfs_types::TypeError;
use thiserror::Error;

/// Errors surfaced by the pod engine.
///
/// Every "not found" from a lower layer (feed, blob, directory or file) is
/// folded into [`PodError::NotFound`].
#[derive(Debug, Error)]
pub enum PodError {
    #[error("not logged in")]
    NotLoggedIn,

    #[error("pod not open: {0}")]
    PodNotOpen(String),

    #[error("invalid name: {0:?}")]
    InvalidName(String),

    #[error("name too long: {name:?} exceeds {max} bytes")]
    NameTooLong { name: String, max: usize },

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("pod already exists: {0}")]
    PodAlreadyExists(String),

    #[error("pod not found: {0}")]
    PodNotFound(String),

    /// A directory or file already exists at the target path.
    #[error("already present: {0}")]
    AlreadyPresent(String),

    #[error("all {max} pod slots are in use")]
    PodsExhausted { max: usize },

    #[error("not found: {what}")]
    NotFound { what: String },

    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// The pod record table could not be parsed.
    #[error("corrupt pod record: {line:?}")]
    CorruptRecords { line: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("feed error: {0}")]
    Feed(FeedError),

    #[error("directory error: {0}")]
    Dir(DirError),

    #[error("file error: {0}")]
    File(FileError),

    #[error("store error: {0}")]
    Store(StoreError),
}

impl PodError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::PodNotFound(_)
        )
    }
}

impl From<TypeError> for PodError {
    fn from(e: TypeError) -> Self {
        Self::InvalidPath(e.to_string())
    }
}

impl From<StoreError> for PodError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(address) => Self::NotFound {
                what: format!("object {}", address.short_hex()),
            },
            other => Self::Store(other),
        }
    }
}

impl From<FeedError> for PodError {
    fn from(e: FeedError) -> Self {
        match e {
            FeedError::NotFound { topic, .. } => Self::NotFound {
                what: format!("feed {}", topic.short_hex()),
            },
            FeedError::Store(inner) => inner.into(),
            other => Self::Feed(other),
        }
    }
}

impl From<FileError> for PodError {
    fn from(e: FileError) -> Self {
        match e {
            FileError::NotFound { path } => Self::NotFound { what: path },
            FileError::Store(inner) => inner.into(),
            FileError::Path(inner) => inner.into(),
            FileError::Io(inner) => Self::Io(inner),
            other => Self::File(other),
        }
    }
}

impl From<DirError> for PodError {
    fn from(e: DirError) -> Self {
        match e {
            DirError::NotFound { path } => Self::NotFound { what: path },
            DirError::Feed(inner) => inner.into(),
            DirError::File(inner) => inner.into(),
            DirError::Store(inner) => inner.into(),
            DirError::Path(inner) => inner.into(),
            other => Self::Dir(other),
        }
    }
}

pub type PodResult<T> = Result<T, PodError>;
