use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use podfs_crypto::ContentHasher;
use podfs_types::{Address, MAX_CHUNK_LEN};

use crate::error::{StoreError, StoreResult};
use crate::traits::{ObjectStore, UploadOptions};

/// In-memory object store.
///
/// Intended for tests and embedding. Chunks, blobs and pins are held behind
/// `RwLock`s for safe concurrent access. The `encrypt` upload flag is
/// accepted and ignored.
pub struct InMemoryObjectStore {
    chunks: RwLock<HashMap<Address, Vec<u8>>>,
    blobs: RwLock<HashMap<Address, Vec<u8>>>,
    pins: RwLock<HashSet<Address>>,
}

impl InMemoryObjectStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            chunks: RwLock::new(HashMap::new()),
            blobs: RwLock::new(HashMap::new()),
            pins: RwLock::new(HashSet::new()),
        }
    }

    /// Number of chunks currently stored.
    pub fn chunk_count(&self) -> usize {
        self.chunks.read().len()
    }

    /// Number of blobs currently stored.
    pub fn blob_count(&self) -> usize {
        self.blobs.read().len()
    }

    /// Returns `true` if neither chunks nor blobs are stored.
    pub fn is_empty(&self) -> bool {
        self.chunks.read().is_empty() && self.blobs.read().is_empty()
    }

    /// Total bytes across all stored chunks and blobs.
    pub fn total_bytes(&self) -> u64 {
        let chunks: usize = self.chunks.read().values().map(Vec::len).sum();
        let blobs: usize = self.blobs.read().values().map(Vec::len).sum();
        (chunks + blobs) as u64
    }

    pub fn is_pinned(&self, address: &Address) -> bool {
        self.pins.read().contains(address)
    }

    /// Remove everything from the store.
    pub fn clear(&self) {
        self.chunks.write().clear();
        self.blobs.write().clear();
        self.pins.write().clear();
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn upload_chunk(&self, address: &Address, data: &[u8]) -> StoreResult<()> {
        if data.len() > MAX_CHUNK_LEN {
            return Err(StoreError::ChunkTooLarge {
                len: data.len(),
                max: MAX_CHUNK_LEN,
            });
        }
        let mut chunks = self.chunks.write();
        match chunks.get(address) {
            Some(existing) if existing.as_slice() == data => Ok(()),
            Some(_) => Err(StoreError::AddressInUse(*address)),
            None => {
                chunks.insert(*address, data.to_vec());
                Ok(())
            }
        }
    }

    fn download_chunk(&self, address: &Address) -> StoreResult<Vec<u8>> {
        self.chunks
            .read()
            .get(address)
            .cloned()
            .ok_or(StoreError::NotFound(*address))
    }

    fn upload_blob(&self, data: &[u8], options: UploadOptions) -> StoreResult<Address> {
        let address = ContentHasher::BLOB.address(data);
        // Content addressing makes re-upload idempotent.
        self.blobs
            .write()
            .entry(address)
            .or_insert_with(|| data.to_vec());
        if options.pin {
            self.pins.write().insert(address);
        }
        Ok(address)
    }

    fn download_blob(&self, address: &Address) -> StoreResult<Vec<u8>> {
        self.blobs
            .read()
            .get(address)
            .cloned()
            .ok_or(StoreError::NotFound(*address))
    }

    fn unpin(&self, address: &Address) -> StoreResult<()> {
        if !self.blobs.read().contains_key(address) {
            return Err(StoreError::NotFound(*address));
        }
        self.pins.write().remove(address);
        Ok(())
    }

    fn has_chunk(&self, address: &Address) -> StoreResult<bool> {
        Ok(self.chunks.read().contains_key(address))
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("chunk_count", &self.chunk_count())
            .field("blob_count", &self.blob_count())
            .finish()
    }
}
