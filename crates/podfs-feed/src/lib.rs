//! Feeds: signed, single-writer, versioned pointers for podfs.
//!
//! The object store is immutable, so anything that changes over time (a
//! directory's children, the table of pods) is published as a sequence of
//! signed updates under a fixed (owner, topic) identity. Readers always see
//! the latest update and verify it against the owner address themselves.
//!
//! # Key Types
//!
//! - [`FeedRegister`] -- create, update and look up feeds
//! - [`FeedEntry`] -- the latest payload of a feed and where it was found
//! - [`Epoch`] -- sequence index and time marker of an update

pub mod error;
pub mod register;
pub mod update;

pub use error::{FeedError, FeedResult};
pub use register::{FeedEntry, FeedRegister};
pub use update::{chunk_address, update_id, Epoch};
