//! Immutable, block-structured files for podfs.
//!
//! A file is stored as fixed-size blocks (content-addressed blobs, so equal
//! blocks deduplicate), a [`FileInode`] listing those blocks, and a
//! [`FileMetadata`] blob pointing at the inode. The metadata's blob address is
//! what a directory keeps as its reference to the file.

pub mod error;
pub mod metadata;
pub mod reader;
pub mod store;

pub use error::{FileError, FileResult};
pub use metadata::{block_name, FileBlock, FileInode, FileMetadata};
pub use reader::FileReader;
pub use store::{FileEntry, FileStat, FileStore, DEFAULT_MAX_BLOCK_SIZE};
