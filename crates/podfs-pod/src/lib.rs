//! Pod engine for podfs.
//!
//! A pod is an isolated tree of directories and files owned by one account.
//! [`PodEngine`] manages the session and the pod record table; [`Pod`] is the
//! handle for working inside one open pod. Every structural change is
//! propagated up to the pod root so that the whole tree stays reachable from
//! the root's feed, which is what [`Pod::sync`] walks to rebuild the local
//! caches after a reopen.

pub mod config;
pub mod engine;
pub mod error;
pub mod names;
pub mod pod;
pub mod records;
pub mod sync;

pub use config::EngineConfig;
pub use engine::{PodEngine, PodStat, PodState};
pub use error::{PodError, PodResult};
pub use names::{validate_name, validate_pod_name};
pub use pod::Pod;
pub use records::PodRecords;
pub use sync::SyncReport;
