use std::io::{self, Read};
use std::sync::Arc;

use dashmap::DashMap;
use podfs_store::{ObjectStore, UploadOptions};
use podfs_types::{Address, PodPath};
use tracing::debug;

use crate::error::{FileError, FileResult};
use crate::metadata::{block_name, FileBlock, FileInode, FileMetadata, FILE_METADATA_VERSION};
use crate::reader::FileReader;

/// A file known to the local cache: its metadata and the blob address the
/// metadata is stored at. The address is what a directory references.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileEntry {
    pub address: Address,
    pub metadata: FileMetadata,
}

/// Full description of a stored file, blocks included.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileStat {
    pub path: PodPath,
    pub address: Address,
    pub metadata: FileMetadata,
    pub blocks: Vec<FileBlock>,
}

/// Largest block size accepted unless configured otherwise.
pub const DEFAULT_MAX_BLOCK_SIZE: u32 = 16 * 1024 * 1024;

/// Block-structured immutable files for one pod, with a local path cache.
pub struct FileStore {
    store: Arc<dyn ObjectStore>,
    files: DashMap<PodPath, FileEntry>,
    max_block_size: u32,
}

impl FileStore {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            files: DashMap::new(),
            max_block_size: DEFAULT_MAX_BLOCK_SIZE,
        }
    }

    pub fn with_max_block_size(mut self, max_block_size: u32) -> Self {
        self.max_block_size = max_block_size;
        self
    }

    /// Split `reader` into `block_size` blocks, store them with an inode and
    /// metadata, and cache the result under `dir/name`.
    ///
    /// The stream must hold exactly `size` bytes. Blocks already uploaded
    /// when a mismatch is detected stay in the store unreferenced.
    pub fn upload<R: Read>(
        &self,
        mut reader: R,
        name: &str,
        size: u64,
        block_size: u32,
        dir: &PodPath,
    ) -> FileResult<FileEntry> {
        if block_size == 0 || block_size > self.max_block_size {
            return Err(FileError::InvalidBlockSize {
                size: block_size,
                max: self.max_block_size,
            });
        }
        let path = dir.join(name)?;
        let mut inode = FileInode::default();
        let mut buf = vec![0u8; size.min(u64::from(block_size)) as usize];
        let mut consumed = 0u64;

        while consumed < size {
            let want = (size - consumed).min(u64::from(block_size)) as usize;
            let got = read_full(&mut reader, &mut buf[..want])?;
            if got < want {
                return Err(FileError::LengthMismatch {
                    expected: size,
                    actual: consumed + got as u64,
                });
            }
            let address = self
                .store
                .upload_blob(&buf[..want], UploadOptions::pinned())?;
            inode.blocks.push(FileBlock {
                name: block_name(inode.blocks.len()),
                size: want as u32,
                address,
            });
            consumed += want as u64;
        }

        let trailing = io::copy(&mut reader, &mut io::sink())?;
        if trailing > 0 {
            return Err(FileError::LengthMismatch {
                expected: size,
                actual: size + trailing,
            });
        }

        let inode_address = self
            .store
            .upload_blob(&inode.to_bytes()?, UploadOptions::pinned())?;
        let now = chrono::Utc::now().timestamp();
        let metadata = FileMetadata {
            version: FILE_METADATA_VERSION,
            path: dir.to_string(),
            name: name.to_string(),
            size,
            block_size,
            content_type: mime_guess::from_path(name)
                .first_or_octet_stream()
                .to_string(),
            creation_time: now,
            access_time: now,
            modification_time: now,
            inode_address,
        };
        let address = self
            .store
            .upload_blob(&metadata.to_bytes()?, UploadOptions::pinned())?;
        debug!(
            path = %path,
            size,
            blocks = inode.blocks.len(),
            address = %address.short_hex(),
            "uploaded file"
        );

        let entry = FileEntry { address, metadata };
        self.files.insert(path, entry.clone());
        Ok(entry)
    }

    /// Open a lazy reader over the file at `path`.
    pub fn download(&self, path: &PodPath) -> FileResult<FileReader> {
        let entry = self.entry(path)?;
        let inode = self.load_inode(&entry.metadata.inode_address)?;
        Ok(FileReader::new(Arc::clone(&self.store), &entry.metadata, inode))
    }

    /// Forget the file at `path` locally. The stored blocks are untouched.
    pub fn delete(&self, path: &PodPath) -> Option<FileEntry> {
        self.files.remove(path).map(|(_, entry)| entry)
    }

    pub fn stat(&self, path: &PodPath) -> FileResult<FileStat> {
        let entry = self.entry(path)?;
        let inode = self.load_inode(&entry.metadata.inode_address)?;
        Ok(FileStat {
            path: path.clone(),
            address: entry.address,
            metadata: entry.metadata,
            blocks: inode.blocks,
        })
    }

    /// Fetch and decode file metadata from its blob address.
    pub fn load_metadata(&self, address: &Address) -> FileResult<FileMetadata> {
        let bytes = self.store.download_blob(address)?;
        FileMetadata::from_bytes(&bytes)
    }

    pub fn load_inode(&self, address: &Address) -> FileResult<FileInode> {
        let bytes = self.store.download_blob(address)?;
        FileInode::from_bytes(&bytes)
    }

    // ---- Path cache ----

    pub fn insert(&self, path: PodPath, entry: FileEntry) {
        self.files.insert(path, entry);
    }

    pub fn get(&self, path: &PodPath) -> Option<FileEntry> {
        self.files.get(path).map(|e| e.value().clone())
    }

    pub fn contains(&self, path: &PodPath) -> bool {
        self.files.contains_key(path)
    }

    /// Drop every cached file at or below `prefix`.
    pub fn purge_prefix(&self, prefix: &PodPath) -> usize {
        let before = self.files.len();
        self.files.retain(|path, _| !path.starts_with(prefix));
        before - self.files.len()
    }

    /// All cached file paths, sorted.
    pub fn paths(&self) -> Vec<PodPath> {
        let mut paths: Vec<PodPath> = self.files.iter().map(|e| e.key().clone()).collect();
        paths.sort();
        paths
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn clear(&self) {
        self.files.clear();
    }

    fn entry(&self, path: &PodPath) -> FileResult<FileEntry> {
        self.get(path).ok_or_else(|| FileError::NotFound {
            path: path.to_string(),
        })
    }
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("files", &self.files.len())
            .finish()
    }
}

/// Read until `buf` is full or the stream ends; returns the bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
