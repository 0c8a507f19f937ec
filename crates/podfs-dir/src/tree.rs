use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use podfs_crypto::topic_for_path;
use podfs_feed::FeedRegister;
use podfs_file::{FileEntry, FileMetadata};
use podfs_types::{Address, PodPath, Reference, ReferenceKind, Topic};
use tracing::{debug, warn};

use crate::error::{DirError, DirResult};
use crate::inode::{DirInode, DirectoryMeta};

/// One resolved child of a directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DirEntry {
    Directory {
        path: PodPath,
        reference: Reference,
        inode: DirInode,
    },
    File {
        path: PodPath,
        address: Address,
        metadata: FileMetadata,
    },
}

impl DirEntry {
    pub fn path(&self) -> &PodPath {
        match self {
            Self::Directory { path, .. } | Self::File { path, .. } => path,
        }
    }

    pub fn name(&self) -> &str {
        self.path().name()
    }

    pub fn kind(&self) -> ReferenceKind {
        match self {
            Self::Directory { .. } => ReferenceKind::Directory,
            Self::File { .. } => ReferenceKind::File,
        }
    }
}

/// Summary of a directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirStat {
    pub path: PodPath,
    pub meta: DirectoryMeta,
    pub directories: usize,
    pub files: usize,
}

/// Counts produced by [`DirectoryTree::load_subtree`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub directories: usize,
    pub files: usize,
    pub skipped: usize,
}

impl LoadStats {
    pub fn merge(&mut self, other: LoadStats) {
        self.directories += other.directories;
        self.files += other.files;
        self.skipped += other.skipped;
    }
}

/// Directory inodes of one pod, published as feeds keyed by
/// `hash(full path)` and cached locally by path.
///
/// Mutations of a single directory are serialized through
/// [`DirectoryTree::lock`]; the cache itself is a concurrent map, so
/// unrelated directories never contend.
pub struct DirectoryTree {
    feed: FeedRegister,
    dirs: DashMap<PodPath, DirInode>,
    locks: DashMap<PodPath, Arc<Mutex<()>>>,
}

impl DirectoryTree {
    pub fn new(feed: FeedRegister) -> Self {
        Self {
            feed,
            dirs: DashMap::new(),
            locks: DashMap::new(),
        }
    }

    pub fn feed(&self) -> &FeedRegister {
        &self.feed
    }

    // ---- Publishing ----

    /// Create an empty directory `name` under `parent` and publish it.
    ///
    /// The parent is not modified; linking the new directory into it is the
    /// caller's job.
    pub fn create_directory(
        &self,
        parent: &DirInode,
        name: &str,
    ) -> DirResult<(DirInode, Reference)> {
        let path = parent.full_path()?.join(name)?;
        self.publish_new(path)
    }

    /// Create and publish the root directory of pod `pod_name`.
    pub fn create_pod_root(&self, pod_name: &str) -> DirResult<(DirInode, Reference)> {
        self.publish_new(PodPath::root(pod_name)?)
    }

    /// Bump the modification time of `inode`, republish it and refresh the
    /// cache. Returns the directory's reference.
    pub fn update_directory(&self, inode: &mut DirInode) -> DirResult<Reference> {
        inode.touch(now());
        let path = inode.full_path()?;
        let topic = topic_for_path(&path);
        self.feed.update(topic.as_bytes(), &inode.to_bytes()?)?;
        debug!(path = %path, children = inode.children.len(), "updated directory");
        self.dirs.insert(path, inode.clone());
        Ok(Reference::Directory(topic))
    }

    fn publish_new(&self, path: PodPath) -> DirResult<(DirInode, Reference)> {
        let inode = DirInode::new(&path, now());
        let topic = topic_for_path(&path);
        self.feed.create(topic.as_bytes(), &inode.to_bytes()?)?;
        debug!(path = %path, "created directory");
        self.dirs.insert(path, inode.clone());
        Ok((inode, Reference::Directory(topic)))
    }

    // ---- Resolution ----

    /// The inode at `path`, from the cache if present, otherwise from its
    /// feed. A feed lookup does not populate the cache.
    pub fn resolve(&self, path: &PodPath) -> DirResult<DirInode> {
        if let Some(inode) = self.get(path) {
            return Ok(inode);
        }
        let topic = topic_for_path(path);
        match self.fetch_inode(&topic) {
            Ok((found, inode)) if found == *path => Ok(inode),
            Ok((found, _)) => Err(DirError::PathMismatch {
                expected: path.to_string(),
                found: found.to_string(),
            }),
            Err(DirError::Feed(e)) if e.is_not_found() => Err(DirError::NotFound {
                path: path.to_string(),
            }),
            Err(e) => Err(e),
        }
    }

    /// Resolve one child reference to a directory or file.
    ///
    /// Typed references go straight to the feed or blob store. Untyped ones
    /// are checked: a published feed means a directory, otherwise the bytes
    /// are taken as a file metadata address.
    pub fn resolve_reference(&self, reference: &Reference) -> DirResult<DirEntry> {
        match reference {
            Reference::Directory(topic) => self.directory_entry(topic, *reference),
            Reference::File(address) => self.file_entry(address),
            Reference::Untyped(bytes) => {
                let topic = Topic::from_hash(*bytes);
                match self.directory_entry(&topic, *reference) {
                    Err(DirError::Feed(e)) if e.is_not_found() => {
                        self.file_entry(&Address::from_hash(*bytes))
                    }
                    other => other,
                }
            }
        }
    }

    /// Resolve every child of the directory at `path`.
    pub fn list(&self, path: &PodPath) -> DirResult<Vec<DirEntry>> {
        let inode = self.resolve(path)?;
        inode
            .children
            .iter()
            .map(|child| self.resolve_reference(child))
            .collect()
    }

    pub fn stat(&self, path: &PodPath) -> DirResult<DirStat> {
        let inode = self.resolve(path)?;
        let mut stat = DirStat {
            path: path.clone(),
            meta: inode.meta.clone(),
            directories: 0,
            files: 0,
        };
        for child in &inode.children {
            let kind = match child.kind() {
                Some(kind) => kind,
                None => self.resolve_reference(child)?.kind(),
            };
            match kind {
                ReferenceKind::Directory => stat.directories += 1,
                ReferenceKind::File => stat.files += 1,
            }
        }
        Ok(stat)
    }

    /// Resolve `reference` and everything below it, caching directories and
    /// handing files to `on_file`.
    ///
    /// Failure to resolve `reference` itself is returned. Failures further
    /// down are logged and counted as skipped so one bad child does not hide
    /// its siblings.
    pub fn load_subtree(
        &self,
        reference: &Reference,
        on_file: &mut dyn FnMut(PodPath, FileEntry),
    ) -> DirResult<LoadStats> {
        let mut stats = LoadStats::default();
        match self.resolve_reference(reference)? {
            DirEntry::File {
                path,
                address,
                metadata,
            } => {
                on_file(path, FileEntry { address, metadata });
                stats.files += 1;
            }
            DirEntry::Directory { path, inode, .. } => {
                self.dirs.insert(path.clone(), inode.clone());
                stats.directories += 1;
                for child in &inode.children {
                    match self.load_subtree(child, on_file) {
                        Ok(child_stats) => stats.merge(child_stats),
                        Err(e) => {
                            warn!(
                                parent = %path,
                                reference = %child,
                                error = %e,
                                "skipping unresolvable reference"
                            );
                            stats.skipped += 1;
                        }
                    }
                }
            }
        }
        Ok(stats)
    }

    fn fetch_inode(&self, topic: &Topic) -> DirResult<(PodPath, DirInode)> {
        let entry = self.feed.get(topic.as_bytes())?;
        let inode = DirInode::from_bytes(&entry.payload)?;
        Ok((inode.full_path()?, inode))
    }

    fn directory_entry(&self, topic: &Topic, reference: Reference) -> DirResult<DirEntry> {
        let (path, inode) = self.fetch_inode(topic)?;
        if topic_for_path(&path) != *topic {
            return Err(DirError::PathMismatch {
                expected: topic.to_hex(),
                found: path.to_string(),
            });
        }
        Ok(DirEntry::Directory {
            path,
            reference,
            inode,
        })
    }

    fn file_entry(&self, address: &Address) -> DirResult<DirEntry> {
        let bytes = self.feed.store().download_blob(address)?;
        let metadata = FileMetadata::from_bytes(&bytes)?;
        Ok(DirEntry::File {
            path: metadata.file_path()?,
            address: *address,
            metadata,
        })
    }

    // ---- Path cache ----

    /// Lock serializing mutations of the directory at `path`.
    pub fn lock(&self, path: &PodPath) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.entry(path.clone()).or_default().value())
    }

    pub fn get(&self, path: &PodPath) -> Option<DirInode> {
        self.dirs.get(path).map(|e| e.value().clone())
    }

    /// Cache `inode` under its own full path.
    pub fn insert(&self, inode: DirInode) -> DirResult<()> {
        let path = inode.full_path()?;
        self.dirs.insert(path, inode);
        Ok(())
    }

    pub fn remove(&self, path: &PodPath) -> Option<DirInode> {
        self.dirs.remove(path).map(|(_, inode)| inode)
    }

    /// Evict `prefix` and every cached directory below it. The feeds are
    /// left as they are.
    pub fn purge_prefix(&self, prefix: &PodPath) -> usize {
        let before = self.dirs.len();
        self.dirs.retain(|path, _| !path.starts_with(prefix));
        self.locks
            .retain(|path, lock| !path.starts_with(prefix) || Arc::strong_count(lock) > 1);
        before - self.dirs.len()
    }

    pub fn contains(&self, path: &PodPath) -> bool {
        self.dirs.contains_key(path)
    }

    /// All cached directory paths, sorted.
    pub fn paths(&self) -> Vec<PodPath> {
        let mut paths: Vec<PodPath> = self.dirs.iter().map(|e| e.key().clone()).collect();
        paths.sort();
        paths
    }

    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }

    /// Empty the cache. Locks that are currently handed out survive so
    /// their holders still exclude later callers.
    pub fn clear(&self) {
        self.dirs.clear();
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}

impl std::fmt::Debug for DirectoryTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryTree")
            .field("owner", &self.feed.owner())
            .field("directories", &self.dirs.len())
            .finish()
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
