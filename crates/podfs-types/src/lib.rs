//! Foundation types for podfs.
//!
//! Every other podfs crate depends on `podfs-types`. The types here carry no
//! I/O and no cryptography; hashing lives in `podfs-crypto`.
//!
//! # Key Types
//!
//! - [`Address`]: content address of a chunk or blob in the object store
//! - [`OwnerAddress`]: account address derived from a public key
//! - [`Topic`]: fixed-length feed topic, usually derived from a directory path
//! - [`Reference`]: typed pointer from a directory to a child directory or file
//! - [`PodPath`]: absolute path inside a pod as a sequence of segments

pub mod address;
pub mod error;
pub mod path;
pub mod reference;

pub use address::{Address, OwnerAddress, Topic};
pub use error::TypeError;
pub use path::PodPath;
pub use reference::{Reference, ReferenceKind};

/// Length in bytes of every topic, address and owner address.
pub const HASH_LEN: usize = 32;

/// Length in bytes of a feed topic.
pub const TOPIC_LEN: usize = HASH_LEN;

/// Largest payload a single feed update may carry.
pub const MAX_PAYLOAD_LEN: usize = 4096;

/// Largest chunk the object store accepts: one feed payload plus its signed
/// envelope.
pub const MAX_CHUNK_LEN: usize = MAX_PAYLOAD_LEN + 512;
