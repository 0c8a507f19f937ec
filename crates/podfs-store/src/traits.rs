use podfs_types::Address;

use crate::error::StoreResult;

/// Flags attached to a blob upload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UploadOptions {
    /// Keep the blob alive until explicitly unpinned.
    pub pin: bool,
    /// Ask the backend to encrypt the blob at rest.
    pub encrypt: bool,
}

impl UploadOptions {
    pub fn pinned() -> Self {
        Self {
            pin: true,
            encrypt: false,
        }
    }
}

/// Remote content-addressed object store.
///
/// Two address spaces live behind this trait:
/// - **Chunks** are small payloads (at most [`podfs_types::MAX_CHUNK_LEN`]
///   bytes) stored at an address chosen by the caller. Feeds use them for
///   self-certifying update addresses. A chunk address is write-once.
/// - **Blobs** are arbitrary-length payloads stored at the hash of their
///   content. Uploading the same bytes twice yields the same address.
///
/// A missing object is always reported as [`crate::StoreError::NotFound`].
/// Implementations never retry; that is up to the caller.
pub trait ObjectStore: Send + Sync {
    /// Store a chunk at `address`. Re-uploading identical bytes is a no-op.
    fn upload_chunk(&self, address: &Address, data: &[u8]) -> StoreResult<()>;

    /// Fetch the chunk stored at `address`.
    fn download_chunk(&self, address: &Address) -> StoreResult<Vec<u8>>;

    /// Store a blob and return its content address.
    fn upload_blob(&self, data: &[u8], options: UploadOptions) -> StoreResult<Address>;

    /// Fetch the blob stored at `address`.
    fn download_blob(&self, address: &Address) -> StoreResult<Vec<u8>>;

    /// Release a pin taken by an earlier upload.
    fn unpin(&self, address: &Address) -> StoreResult<()>;

    /// Whether a chunk exists at `address`.
    ///
    /// Default implementation downloads the chunk. Backends may override with
    /// a cheaper existence check.
    fn has_chunk(&self, address: &Address) -> StoreResult<bool> {
        match self.download_chunk(address) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

impl<T: ObjectStore + ?Sized> ObjectStore for std::sync::Arc<T> {
    fn upload_chunk(&self, address: &Address, data: &[u8]) -> StoreResult<()> {
        (**self).upload_chunk(address, data)
    }

    fn download_chunk(&self, address: &Address) -> StoreResult<Vec<u8>> {
        (**self).download_chunk(address)
    }

    fn upload_blob(&self, data: &[u8], options: UploadOptions) -> StoreResult<Address> {
        (**self).upload_blob(data, options)
    }

    fn download_blob(&self, address: &Address) -> StoreResult<Vec<u8>> {
        (**self).download_blob(address)
    }

    fn unpin(&self, address: &Address) -> StoreResult<()> {
        (**self).unpin(address)
    }

    fn has_chunk(&self, address: &Address) -> StoreResult<bool> {
        (**self).has_chunk(address)
    }
}
