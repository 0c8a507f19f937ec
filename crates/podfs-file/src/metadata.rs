use podfs_types::{Address, PodPath, TypeError};
use serde::{Deserialize, Serialize};

use crate::error::FileResult;

pub const FILE_METADATA_VERSION: u8 = 1;

/// Descriptor of an uploaded file. Immutable once published.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub version: u8,
    /// Full path of the containing directory.
    pub path: String,
    pub name: String,
    pub size: u64,
    pub block_size: u32,
    pub content_type: String,
    pub creation_time: i64,
    pub access_time: i64,
    pub modification_time: i64,
    /// Blob address of the [`FileInode`].
    pub inode_address: Address,
}

impl FileMetadata {
    /// Path of the file itself.
    pub fn file_path(&self) -> Result<PodPath, TypeError> {
        PodPath::parse(&self.path)?.join(&self.name)
    }

    /// Number of blocks a file of this size is split into.
    pub fn block_count(&self) -> u64 {
        if self.block_size == 0 {
            return 0;
        }
        self.size.div_ceil(u64::from(self.block_size))
    }

    pub fn to_bytes(&self) -> FileResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> FileResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// One stored block of a file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileBlock {
    pub name: String,
    pub size: u32,
    pub address: Address,
}

/// Ordered list of a file's blocks.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInode {
    pub blocks: Vec<FileBlock>,
}

impl FileInode {
    pub fn to_bytes(&self) -> FileResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> FileResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Sum of all block sizes.
    pub fn total_size(&self) -> u64 {
        self.blocks.iter().map(|b| u64::from(b.size)).sum()
    }
}

/// Name of the `index`-th block: `block-00000`, `block-00001`, ...
pub fn block_name(index: usize) -> String {
    format!("block-{index:05}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FileMetadata {
        FileMetadata {
            version: FILE_METADATA_VERSION,
            path: "/alice/docs".into(),
            name: "note.txt".into(),
            size: 540,
            block_size: 100,
            content_type: "text/plain".into(),
            creation_time: 1,
            access_time: 1,
            modification_time: 1,
            inode_address: Address::from_hash([5u8; 32]),
        }
    }

    #[test]
    fn block_names_are_zero_padded() {
        assert_eq!(block_name(0), "block-00000");
        assert_eq!(block_name(42), "block-00042");
    }

    #[test]
    fn block_count_rounds_up() {
        assert_eq!(sample().block_count(), 6);
        let mut exact = sample();
        exact.size = 500;
        assert_eq!(exact.block_count(), 5);
        exact.size = 0;
        assert_eq!(exact.block_count(), 0);
    }

    #[test]
    fn file_path_joins_directory_and_name() {
        assert_eq!(
            sample().file_path().unwrap(),
            PodPath::parse("/alice/docs/note.txt").unwrap()
        );
    }

    #[test]
    fn metadata_is_json() {
        let bytes = sample().to_bytes().unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.contains("\"name\":\"note.txt\""));
        assert_eq!(FileMetadata::from_bytes(&bytes).unwrap(), sample());
    }

    #[test]
    fn garbage_is_a_serialization_error() {
        assert!(FileMetadata::from_bytes(b"{").is_err());
        assert!(FileInode::from_bytes(b"[]").is_err());
    }
}
