use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use podfs_types::Address;
use tracing::trace;

use crate::error::StoreResult;
use crate::traits::{ObjectStore, UploadOptions};

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
enum Space {
    Chunk,
    Blob,
}

struct Entries {
    map: HashMap<(Space, Address), Vec<u8>>,
    order: VecDeque<(Space, Address)>,
}

/// Read-through, write-through cache in front of another store.
///
/// Holds at most `capacity` objects and evicts the oldest first. Everything
/// it caches is immutable (blobs by content addressing, chunks by write-once
/// addresses), so entries never need invalidating.
pub struct CachingStore<S> {
    inner: S,
    capacity: usize,
    entries: Mutex<Entries>,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Hit and miss counters of a [`CachingStore`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl<S: ObjectStore> CachingStore<S> {
    pub fn new(inner: S, capacity: usize) -> Self {
        Self {
            inner,
            capacity,
            entries: Mutex::new(Entries {
                map: HashMap::new(),
                order: VecDeque::new(),
            }),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.lock().map.len(),
        }
    }

    fn lookup(&self, key: (Space, Address)) -> Option<Vec<u8>> {
        let hit = self.entries.lock().map.get(&key).cloned();
        match hit {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        hit
    }

    fn remember(&self, key: (Space, Address), data: &[u8]) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.lock();
        if entries.map.contains_key(&key) {
            return;
        }
        while entries.map.len() >= self.capacity {
            match entries.order.pop_front() {
                Some(oldest) => {
                    entries.map.remove(&oldest);
                    trace!(address = %oldest.1, "evicted cached object");
                }
                None => break,
            }
        }
        entries.map.insert(key, data.to_vec());
        entries.order.push_back(key);
    }

    fn read_through(
        &self,
        key: (Space, Address),
        fetch: impl FnOnce() -> StoreResult<Vec<u8>>,
    ) -> StoreResult<Vec<u8>> {
        if let Some(data) = self.lookup(key) {
            return Ok(data);
        }
        let data = fetch()?;
        self.remember(key, &data);
        Ok(data)
    }
}

impl<S: ObjectStore> ObjectStore for CachingStore<S> {
    fn upload_chunk(&self, address: &Address, data: &[u8]) -> StoreResult<()> {
        self.inner.upload_chunk(address, data)?;
        self.remember((Space::Chunk, *address), data);
        Ok(())
    }

    fn download_chunk(&self, address: &Address) -> StoreResult<Vec<u8>> {
        self.read_through((Space::Chunk, *address), || {
            self.inner.download_chunk(address)
        })
    }

    fn upload_blob(&self, data: &[u8], options: UploadOptions) -> StoreResult<Address> {
        let address = self.inner.upload_blob(data, options)?;
        self.remember((Space::Blob, address), data);
        Ok(address)
    }

    fn download_blob(&self, address: &Address) -> StoreResult<Vec<u8>> {
        self.read_through((Space::Blob, *address), || self.inner.download_blob(address))
    }

    fn unpin(&self, address: &Address) -> StoreResult<()> {
        self.inner.unpin(address)
    }

    fn has_chunk(&self, address: &Address) -> StoreResult<bool> {
        if self.entries.lock().map.contains_key(&(Space::Chunk, *address)) {
            return Ok(true);
        }
        self.inner.has_chunk(address)
    }
}

impl<S> std::fmt::Debug for CachingStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachingStore")
            .field("capacity", &self.capacity)
            .field("hits", &self.hits.load(Ordering::Relaxed))
            .field("misses", &self.misses.load(Ordering::Relaxed))
            .finish()
    }
}
