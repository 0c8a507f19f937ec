//! Directory inodes for podfs.
//!
//! Every directory is a feed whose topic is the hash of its full path and
//! whose latest payload is a JSON [`DirInode`]: metadata plus an ordered list
//! of child references. Files are referenced by the blob address of their
//! metadata. A [`DirectoryTree`] publishes and resolves inodes for one pod
//! account and keeps a local path cache of the directories it has seen.

pub mod error;
pub mod inode;
pub mod tree;

pub use error::{DirError, DirResult};
pub use inode::{DirInode, DirectoryMeta, DIR_INODE_VERSION};
pub use tree::{DirEntry, DirStat, DirectoryTree, LoadStats};
