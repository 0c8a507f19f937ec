//! Content-addressed object storage for podfs.
//!
//! Everything podfs persists lives in an object store: file blocks, file
//! inodes and metadata as content-addressed blobs, and signed feed updates as
//! small chunks at self-certifying addresses. This crate defines the
//! [`ObjectStore`] seam and ships two implementations:
//!
//! - [`InMemoryObjectStore`] -- `HashMap`-based store for tests and embedding
//! - [`CachingStore`] -- bounded read/write-through cache over any store
//!
//! # Design Rules
//!
//! 1. Stored objects are immutable: blobs by content addressing, chunks by
//!    write-once addresses.
//! 2. "Not found" is an error value ([`StoreError::NotFound`]), never a
//!    status code the caller has to remember to check.
//! 3. Errors are propagated, never retried here.

pub mod cache;
pub mod error;
pub mod memory;
pub mod traits;

pub use cache::{CacheStats, CachingStore};
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryObjectStore;
pub use traits::{ObjectStore, UploadOptions};
