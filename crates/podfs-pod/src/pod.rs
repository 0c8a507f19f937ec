use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use podfs_crypto::{topic_for_path, AccountKeys};
use podfs_dir::{DirEntry, DirStat, DirectoryTree};
use podfs_feed::FeedRegister;
use podfs_file::{FileEntry, FileReader, FileStat, FileStore};
use podfs_store::ObjectStore;
use podfs_types::{Address, PodPath, Reference, ReferenceKind};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::{PodError, PodResult};
use crate::names::validate_name;
use crate::sync::{sync_pod, SyncReport};

/// State of one open pod: its account, both caches and the working
/// directory.
pub(crate) struct PodContext {
    name: String,
    index: u32,
    root: PodPath,
    tree: DirectoryTree,
    files: FileStore,
    cwd: RwLock<PodPath>,
    open: AtomicBool,
    config: EngineConfig,
}

impl PodContext {
    pub(crate) fn new(
        name: &str,
        index: u32,
        keys: Arc<AccountKeys>,
        store: Arc<dyn ObjectStore>,
        config: EngineConfig,
    ) -> PodResult<Self> {
        let root = PodPath::root(name)?;
        Ok(Self {
            name: name.to_string(),
            index,
            tree: DirectoryTree::new(FeedRegister::new(Arc::clone(&store), keys)),
            files: FileStore::new(store).with_max_block_size(config.max_block_size),
            cwd: RwLock::new(root.clone()),
            root,
            open: AtomicBool::new(true),
            config,
        })
    }
}

/// Handle to an open pod.
///
/// Handles are cheap to clone and all clones share one pod. Once the pod is
/// closed every operation on a handle fails with [`PodError::PodNotOpen`].
/// Paths given to operations are resolved against the working directory;
/// a leading `/` starts at the pod root.
#[derive(Clone)]
pub struct Pod {
    ctx: Arc<PodContext>,
}

impl Pod {
    pub(crate) fn new(ctx: PodContext) -> Self {
        Self { ctx: Arc::new(ctx) }
    }

    pub fn name(&self) -> &str {
        &self.ctx.name
    }

    /// Slot in the account's pod table.
    pub fn index(&self) -> u32 {
        self.ctx.index
    }

    pub fn is_open(&self) -> bool {
        self.ctx.open.load(Ordering::Acquire)
    }

    /// Reference of the pod root directory.
    pub fn root_reference(&self) -> Reference {
        Reference::Directory(topic_for_path(&self.ctx.root))
    }

    /// Current working directory.
    pub fn pwd(&self) -> PodResult<PodPath> {
        let ctx = self.context()?;
        Ok(ctx.cwd.read().clone())
    }

    // ---- Directories ----

    /// Create the directory at `path` and any missing ancestors.
    pub fn mkdir(&self, path: &str) -> PodResult<PodPath> {
        let ctx = self.context()?;
        let target = self.resolve_input(path)?;
        if target.is_root() || ctx.tree.contains(&target) {
            return Err(PodError::AlreadyPresent(target.to_string()));
        }
        for segment in &target.segments()[1..] {
            validate_name(segment, ctx.config.max_name_len)?;
        }
        for ancestor in target.lineage() {
            if ctx.files.contains(&ancestor) {
                return Err(if ancestor == target {
                    PodError::AlreadyPresent(target.to_string())
                } else {
                    PodError::NotADirectory(ancestor.to_string())
                });
            }
        }

        // Every missing level is checked, created and linked while its
        // parent's lock is held, so concurrent calls sharing an ancestor
        // agree on who creates it. The new directory's own lock is held too,
        // so nothing links into it before it is published.
        let mut topmost: Option<PodPath> = None;
        let mut outcome: PodResult<()> = Ok(());
        for dir in target.lineage().into_iter().skip(1) {
            let Some(parent) = dir.parent() else {
                continue;
            };
            let parent_lock = ctx.tree.lock(&parent);
            let _parent_guard = parent_lock.lock();
            if ctx.tree.contains(&dir) {
                if dir == target {
                    outcome = Err(PodError::AlreadyPresent(target.to_string()));
                    break;
                }
                continue;
            }
            let mut parent_inode = ctx.tree.resolve(&parent)?;
            let reference = Reference::Directory(topic_for_path(&dir));
            if parent_inode.contains(&reference) && self.load_linked(&reference)? {
                if dir == target {
                    outcome = Err(PodError::AlreadyPresent(target.to_string()));
                    break;
                }
                continue;
            }
            let dir_lock = ctx.tree.lock(&dir);
            let _dir_guard = dir_lock.lock();
            ctx.tree.create_directory(&parent_inode, dir.name())?;
            parent_inode.add_child(reference);
            ctx.tree.update_directory(&mut parent_inode)?;
            topmost.get_or_insert(parent);
        }
        if let Some(parent) = topmost {
            if let Some(grandparent) = parent.parent() {
                let reference = Reference::Directory(topic_for_path(&parent));
                self.update_till_the_pod(&grandparent, reference, true)?;
            }
        }
        outcome?;
        debug!(pod = %ctx.name, path = %target, "mkdir");
        Ok(target)
    }

    /// Unlink the directory at `path` from its parent and forget it and
    /// everything below it locally. Published feeds are left in place.
    pub fn rmdir(&self, path: &str) -> PodResult<()> {
        let ctx = self.context()?;
        let target = self.resolve_input(path)?;
        let parent = target
            .parent()
            .ok_or_else(|| PodError::InvalidPath("cannot remove the pod root".into()))?;
        self.require_directory(&target)?;

        let reference = Reference::Directory(topic_for_path(&target));
        self.update_till_the_pod(&parent, reference, false)?;
        let dirs = ctx.tree.purge_prefix(&target);
        let files = ctx.files.purge_prefix(&target);
        if ctx.cwd.read().starts_with(&target) {
            *ctx.cwd.write() = parent;
        }
        debug!(pod = %ctx.name, path = %target, dirs, files, "rmdir");
        Ok(())
    }

    /// Change the working directory. `""` and `"/"` go to the pod root and
    /// `".."` to the parent.
    pub fn cd(&self, path: &str) -> PodResult<PodPath> {
        let ctx = self.context()?;
        let current = ctx.cwd.read().clone();
        let target = match path {
            "" | "/" => ctx.root.clone(),
            ".." => current.parent().unwrap_or(current),
            other => current.resolve(other)?,
        };
        self.require_directory(&target)?;
        *ctx.cwd.write() = target.clone();
        Ok(target)
    }

    /// Resolve every child of the directory at `path`.
    pub fn ls(&self, path: &str) -> PodResult<Vec<DirEntry>> {
        let ctx = self.context()?;
        let target = self.resolve_input(path)?;
        self.require_directory(&target)?;
        Ok(ctx.tree.list(&target)?)
    }

    pub fn dir_stat(&self, path: &str) -> PodResult<DirStat> {
        let ctx = self.context()?;
        let target = self.resolve_input(path)?;
        self.require_directory(&target)?;
        Ok(ctx.tree.stat(&target)?)
    }

    // ---- Files ----

    /// Upload `size` bytes from `reader` as `name` in directory `dir`.
    ///
    /// `block_size` defaults to the configured one.
    pub fn upload<R: Read>(
        &self,
        reader: R,
        dir: &str,
        name: &str,
        size: u64,
        block_size: Option<u32>,
    ) -> PodResult<FileEntry> {
        let ctx = self.context()?;
        validate_name(name, ctx.config.max_name_len)?;
        let dir = self.resolve_input(dir)?;
        self.require_directory(&dir)?;
        let target = dir.join(name)?;
        if ctx.tree.contains(&target) || ctx.files.contains(&target) {
            return Err(PodError::AlreadyPresent(target.to_string()));
        }

        let block_size = block_size.unwrap_or(ctx.config.default_block_size);
        let entry = ctx.files.upload(reader, name, size, block_size, &dir)?;
        if let Err(e) = self.update_till_the_pod(&dir, Reference::File(entry.address), true) {
            ctx.files.delete(&target);
            return Err(e);
        }
        info!(pod = %ctx.name, path = %target, size, "uploaded file");
        Ok(entry)
    }

    /// Open a lazy reader over the file at `path`.
    pub fn download(&self, path: &str) -> PodResult<FileReader> {
        let ctx = self.context()?;
        let target = self.resolve_input(path)?;
        self.require_file(&target)?;
        Ok(ctx.files.download(&target)?)
    }

    /// Unlink the file at `path` from its directory. Its blocks stay in the
    /// store.
    pub fn rm(&self, path: &str) -> PodResult<()> {
        let ctx = self.context()?;
        let target = self.resolve_input(path)?;
        if ctx.tree.contains(&target) {
            return Err(PodError::InvalidPath(format!("{target} is a directory")));
        }
        let parent = target
            .parent()
            .ok_or_else(|| PodError::InvalidPath(target.to_string()))?;
        self.require_directory(&parent)?;

        let address = match ctx.files.get(&target) {
            Some(entry) => entry.address,
            None => self.find_file(&parent, target.name())?,
        };
        self.update_till_the_pod(&parent, Reference::File(address), false)?;
        ctx.files.delete(&target);
        debug!(pod = %ctx.name, path = %target, "rm");
        Ok(())
    }

    pub fn file_stat(&self, path: &str) -> PodResult<FileStat> {
        let ctx = self.context()?;
        let target = self.resolve_input(path)?;
        self.require_file(&target)?;
        Ok(ctx.files.stat(&target)?)
    }

    // ---- Tree maintenance ----

    /// Propagate a child change from `start` up to the pod root.
    ///
    /// At `start`, `reference` is added (or replaced) when `is_add`, removed
    /// otherwise. Every ancestor then gets the reference of the directory
    /// below it added or refreshed, and is republished. A directory never
    /// gets its own reference as a child. Each level holds only its own
    /// directory lock. Returns the pod root's reference.
    pub fn update_till_the_pod(
        &self,
        start: &PodPath,
        reference: Reference,
        is_add: bool,
    ) -> PodResult<Reference> {
        let ctx = self.context()?;
        let mut path = start.clone();
        let mut child = reference;
        let mut first = true;
        loop {
            let lock = ctx.tree.lock(&path);
            let guard = lock.lock();
            let mut inode = ctx.tree.resolve(&path)?;
            let own = Reference::Directory(topic_for_path(&path));
            if first && !is_add {
                inode.remove_child(&child);
            } else if !own.same_target(&child) {
                inode.add_child(child);
            }
            child = ctx.tree.update_directory(&mut inode)?;
            drop(guard);
            first = false;
            match path.parent() {
                Some(parent) => path = parent,
                None => return Ok(child),
            }
        }
    }

    /// Rebuild both caches from the published tree.
    pub fn sync(&self) -> PodResult<SyncReport> {
        let ctx = self.context()?;
        sync_pod(&ctx.tree, &ctx.files, &ctx.root, ctx.config.sync_workers)
    }

    /// Cached directory paths, sorted.
    pub fn directory_paths(&self) -> PodResult<Vec<PodPath>> {
        Ok(self.context()?.tree.paths())
    }

    /// Cached file paths, sorted.
    pub fn file_paths(&self) -> PodResult<Vec<PodPath>> {
        Ok(self.context()?.files.paths())
    }

    // ---- Internals ----

    /// Publish the empty root directory of a new pod.
    pub(crate) fn create_root(&self) -> PodResult<()> {
        let ctx = self.context()?;
        ctx.tree.create_pod_root(&ctx.name)?;
        Ok(())
    }

    pub(crate) fn close(&self) {
        self.ctx.open.store(false, Ordering::Release);
        self.ctx.tree.clear();
        self.ctx.files.clear();
    }

    fn context(&self) -> PodResult<&PodContext> {
        if self.is_open() {
            Ok(&self.ctx)
        } else {
            Err(PodError::PodNotOpen(self.ctx.name.clone()))
        }
    }

    fn resolve_input(&self, input: &str) -> PodResult<PodPath> {
        let ctx = self.context()?;
        let cwd = ctx.cwd.read().clone();
        Ok(cwd.resolve(input)?)
    }

    fn require_directory(&self, path: &PodPath) -> PodResult<()> {
        let ctx = self.context()?;
        if ctx.tree.contains(path) {
            Ok(())
        } else if ctx.files.contains(path) {
            Err(PodError::NotADirectory(path.to_string()))
        } else {
            Err(PodError::NotFound {
                what: path.to_string(),
            })
        }
    }

    fn require_file(&self, path: &PodPath) -> PodResult<()> {
        let ctx = self.context()?;
        if ctx.files.contains(path) {
            Ok(())
        } else if ctx.tree.contains(path) {
            Err(PodError::InvalidPath(format!("{path} is a directory")))
        } else {
            Err(PodError::NotFound {
                what: path.to_string(),
            })
        }
    }

    /// Load a directory that its parent links but the cache lacks, with
    /// everything below it. Returns `false` if the link is dangling.
    fn load_linked(&self, reference: &Reference) -> PodResult<bool> {
        let ctx = self.context()?;
        let loaded = ctx
            .tree
            .load_subtree(reference, &mut |path, entry| ctx.files.insert(path, entry));
        match loaded {
            Ok(stats) => {
                debug!(
                    pod = %ctx.name,
                    reference = %reference,
                    directories = stats.directories,
                    files = stats.files,
                    "loaded uncached directory"
                );
                Ok(true)
            }
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Find a file child of `dir` by name by reading each candidate's
    /// metadata.
    fn find_file(&self, dir: &PodPath, name: &str) -> PodResult<Address> {
        let ctx = self.context()?;
        let inode = ctx.tree.resolve(dir)?;
        for child in &inode.children {
            if child.kind() == Some(ReferenceKind::Directory) {
                continue;
            }
            let address = Address::from_hash(*child.target());
            match ctx.files.load_metadata(&address) {
                Ok(metadata) if metadata.name == name => return Ok(address),
                _ => continue,
            }
        }
        Err(PodError::NotFound {
            what: dir.join(name)?.to_string(),
        })
    }
}

impl std::fmt::Debug for Pod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pod")
            .field("name", &self.ctx.name)
            .field("index", &self.ctx.index)
            .field("open", &self.is_open())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use podfs_crypto::{AccountIndex, RootSecret};
    use podfs_file::FileError;
    use podfs_store::InMemoryObjectStore;
    use std::io::{Cursor, Read, Seek, SeekFrom};
    use std::sync::Barrier;
    use std::thread;

    fn new_pod(name: &str) -> Pod {
        let store: Arc<dyn ObjectStore> = Arc::new(InMemoryObjectStore::new());
        let keys = Arc::new(AccountKeys::derive(
            &RootSecret::from_bytes([6u8; 32]),
            AccountIndex::Pod(0),
        ));
        let ctx = PodContext::new(name, 0, keys, store, EngineConfig::default()).unwrap();
        let pod = Pod::new(ctx);
        pod.create_root().unwrap();
        pod
    }

    fn p(s: &str) -> PodPath {
        PodPath::parse(s).unwrap()
    }

    fn upload_str(pod: &Pod, dir: &str, name: &str, data: &[u8], block: u32) -> FileEntry {
        pod.upload(Cursor::new(data.to_vec()), dir, name, data.len() as u64, Some(block))
            .unwrap()
    }

    // -----------------------------------------------------------------------
    // mkdir / propagation
    // -----------------------------------------------------------------------

    #[test]
    fn mkdir_chain_is_reachable_from_root() {
        let pod = new_pod("pod");
        pod.mkdir("a/b/c").unwrap();

        let tree = &pod.ctx.tree;
        let root = tree.resolve(&p("/pod")).unwrap();
        let a_ref = Reference::Directory(topic_for_path(&p("/pod/a")));
        let b_ref = Reference::Directory(topic_for_path(&p("/pod/a/b")));
        let c_ref = Reference::Directory(topic_for_path(&p("/pod/a/b/c")));

        // Follow references only, without the cache.
        tree.clear();
        assert_eq!(root.children, vec![a_ref]);
        let DirEntry::Directory { inode: a, .. } = tree.resolve_reference(&a_ref).unwrap() else {
            panic!("a is not a directory");
        };
        assert_eq!(a.children, vec![b_ref]);
        let DirEntry::Directory { inode: b, .. } = tree.resolve_reference(&b_ref).unwrap() else {
            panic!("b is not a directory");
        };
        assert_eq!(b.children, vec![c_ref]);
    }

    #[test]
    fn mkdir_under_existing_parent_links_once() {
        let pod = new_pod("pod");
        pod.mkdir("/a").unwrap();
        pod.mkdir("/a/b").unwrap();
        pod.mkdir("/a/c").unwrap();
        let a = pod.ctx.tree.resolve(&p("/pod/a")).unwrap();
        assert_eq!(a.children.len(), 2);
        let root = pod.ctx.tree.resolve(&p("/pod")).unwrap();
        assert_eq!(root.children.len(), 1);
    }

    #[test]
    fn mkdir_existing_is_already_present() {
        let pod = new_pod("pod");
        pod.mkdir("a").unwrap();
        assert!(matches!(pod.mkdir("a"), Err(PodError::AlreadyPresent(_))));
        assert!(matches!(pod.mkdir("/"), Err(PodError::AlreadyPresent(_))));
    }

    #[test]
    fn mkdir_validates_names_before_publishing() {
        let pod = new_pod("pod");
        let long = "x".repeat(26);
        assert!(matches!(
            pod.mkdir(&format!("a/{long}")),
            Err(PodError::NameTooLong { .. })
        ));
        assert!(!pod.ctx.tree.contains(&p("/pod/a")));
    }

    #[test]
    fn mkdir_over_uncached_subtree_keeps_it() {
        let pod = new_pod("pod");
        pod.mkdir("a/b").unwrap();
        upload_str(&pod, "a/b", "f", b"x", 4);
        // What a sync that skipped `a` leaves behind.
        pod.ctx.tree.purge_prefix(&p("/pod/a"));
        pod.ctx.files.purge_prefix(&p("/pod/a"));

        assert!(matches!(pod.mkdir("a"), Err(PodError::AlreadyPresent(_))));
        assert!(pod.ctx.tree.contains(&p("/pod/a/b")));
        assert!(pod.ctx.files.contains(&p("/pod/a/b/f")));
        pod.sync().unwrap();
        assert_eq!(
            pod.directory_paths().unwrap(),
            vec![p("/pod"), p("/pod/a"), p("/pod/a/b")]
        );
    }

    #[test]
    fn mkdir_below_uncached_directory_extends_it() {
        let pod = new_pod("pod");
        pod.mkdir("a/b").unwrap();
        pod.ctx.tree.purge_prefix(&p("/pod/a"));
        pod.mkdir("a/c").unwrap();
        pod.sync().unwrap();
        assert_eq!(
            pod.directory_paths().unwrap(),
            vec![p("/pod"), p("/pod/a"), p("/pod/a/b"), p("/pod/a/c")]
        );
    }

    #[test]
    fn mkdir_replaces_dangling_link() {
        let pod = new_pod("pod");
        let ghost = Reference::Directory(topic_for_path(&p("/pod/ghost")));
        pod.update_till_the_pod(&p("/pod"), ghost, true).unwrap();
        pod.mkdir("ghost").unwrap();
        let root = pod.ctx.tree.resolve(&p("/pod")).unwrap();
        assert_eq!(root.children, vec![ghost]);
        assert!(pod.ctx.tree.contains(&p("/pod/ghost")));
    }

    #[test]
    fn concurrent_mkdirs_share_a_new_parent() {
        for _ in 0..50 {
            let pod = new_pod("pod");
            let barrier = Barrier::new(2);
            let results: Vec<PodResult<PodPath>> = thread::scope(|s| {
                let handles: Vec<_> = ["a/x", "a/y"]
                    .into_iter()
                    .map(|path| {
                        let (pod, barrier) = (&pod, &barrier);
                        s.spawn(move || {
                            barrier.wait();
                            pod.mkdir(path)
                        })
                    })
                    .collect();
                handles.into_iter().map(|h| h.join().unwrap()).collect()
            });
            for result in &results {
                assert!(result.is_ok(), "{result:?}");
            }
            pod.sync().unwrap();
            assert_eq!(
                pod.directory_paths().unwrap(),
                vec![p("/pod"), p("/pod/a"), p("/pod/a/x"), p("/pod/a/y")]
            );
        }
    }

    #[test]
    fn concurrent_mkdir_of_one_path_creates_it_once() {
        for _ in 0..50 {
            let pod = new_pod("pod");
            let barrier = Barrier::new(2);
            let results: Vec<PodResult<PodPath>> = thread::scope(|s| {
                let handles: Vec<_> = (0..2)
                    .map(|_| {
                        let (pod, barrier) = (&pod, &barrier);
                        s.spawn(move || {
                            barrier.wait();
                            pod.mkdir("a/b")
                        })
                    })
                    .collect();
                handles.into_iter().map(|h| h.join().unwrap()).collect()
            });
            let created = results.iter().filter(|r| r.is_ok()).count();
            assert_eq!(created, 1, "{results:?}");
            assert!(results
                .iter()
                .any(|r| matches!(r, Err(PodError::AlreadyPresent(_)))));
            pod.sync().unwrap();
            assert_eq!(pod.directory_paths().unwrap().len(), 3);
        }
    }

    #[test]
    fn concurrent_uploads_into_one_directory_all_link() {
        let pod = new_pod("pod");
        pod.mkdir("docs").unwrap();
        let barrier = Barrier::new(8);
        thread::scope(|s| {
            for i in 0..8u8 {
                let (pod, barrier) = (&pod, &barrier);
                s.spawn(move || {
                    barrier.wait();
                    upload_str(pod, "docs", &format!("f{i}"), &[i; 3], 2);
                });
            }
        });
        pod.sync().unwrap();
        assert_eq!(pod.file_paths().unwrap().len(), 8);
        assert_eq!(pod.ctx.tree.resolve(&p("/pod/docs")).unwrap().children.len(), 8);
    }

    #[test]
    fn propagation_never_adds_self() {
        let pod = new_pod("pod");
        pod.mkdir("a").unwrap();
        let a = p("/pod/a");
        let own = Reference::Directory(topic_for_path(&a));
        pod.update_till_the_pod(&a, own, true).unwrap();
        assert!(pod.ctx.tree.resolve(&a).unwrap().children.is_empty());
    }

    #[test]
    fn propagation_bumps_every_ancestor() {
        let pod = new_pod("pod");
        pod.mkdir("a/b").unwrap();
        let before = pod.ctx.tree.feed().get(topic_for_path(&p("/pod")).as_bytes()).unwrap();
        upload_str(&pod, "a/b", "f", b"x", 4);
        let after = pod.ctx.tree.feed().get(topic_for_path(&p("/pod")).as_bytes()).unwrap();
        assert!(after.epoch.index > before.epoch.index);
    }

    // -----------------------------------------------------------------------
    // rmdir / rm
    // -----------------------------------------------------------------------

    #[test]
    fn rmdir_unlinks_and_purges_subtree() {
        let pod = new_pod("pod");
        pod.mkdir("a/b/c").unwrap();
        upload_str(&pod, "a/b", "f.txt", b"data", 2);
        pod.rmdir("a/b").unwrap();

        assert!(pod.ctx.tree.contains(&p("/pod/a")));
        assert_eq!(pod.directory_paths().unwrap(), vec![p("/pod"), p("/pod/a")]);
        assert!(pod.file_paths().unwrap().is_empty());
        let a = pod.ctx.tree.resolve(&p("/pod/a")).unwrap();
        assert!(a.children.is_empty());
    }

    #[test]
    fn rmdir_then_mkdir_same_name() {
        let pod = new_pod("pod");
        pod.mkdir("a/b").unwrap();
        pod.rmdir("a").unwrap();
        pod.mkdir("a").unwrap();
        assert!(pod.ctx.tree.resolve(&p("/pod/a")).unwrap().children.is_empty());
        assert_eq!(pod.sync().unwrap().directories, 2);
        assert!(!pod.ctx.tree.contains(&p("/pod/a/b")));
    }

    #[test]
    fn rmdir_rejects_root_files_and_missing() {
        let pod = new_pod("pod");
        upload_str(&pod, "/", "f", b"x", 4);
        assert!(matches!(pod.rmdir("/"), Err(PodError::InvalidPath(_))));
        assert!(matches!(pod.rmdir("f"), Err(PodError::NotADirectory(_))));
        assert!(pod.rmdir("ghost").unwrap_err().is_not_found());
    }

    #[test]
    fn rmdir_moves_cwd_out_of_removed_subtree() {
        let pod = new_pod("pod");
        pod.mkdir("a/b").unwrap();
        pod.cd("a/b").unwrap();
        pod.rmdir("/a").unwrap();
        assert_eq!(pod.pwd().unwrap(), p("/pod"));
    }

    #[test]
    fn rm_unlinks_file() {
        let pod = new_pod("pod");
        pod.mkdir("docs").unwrap();
        let entry = upload_str(&pod, "docs", "a.txt", b"aaaa", 2);
        upload_str(&pod, "docs", "b.txt", b"bb", 2);
        pod.rm("docs/a.txt").unwrap();

        let docs = pod.ctx.tree.resolve(&p("/pod/docs")).unwrap();
        assert!(!docs.contains(&Reference::File(entry.address)));
        assert_eq!(docs.children.len(), 1);
        assert!(pod.rm("docs/a.txt").unwrap_err().is_not_found());
    }

    #[test]
    fn rm_finds_uncached_file_by_name() {
        let pod = new_pod("pod");
        upload_str(&pod, "/", "x.bin", b"xyz", 2);
        pod.ctx.files.clear();
        // Not cached, so not visible to rm's fast path.
        pod.rm("x.bin").unwrap();
        assert!(pod.ctx.tree.resolve(&p("/pod")).unwrap().children.is_empty());
    }

    #[test]
    fn rm_of_directory_is_rejected() {
        let pod = new_pod("pod");
        pod.mkdir("d").unwrap();
        assert!(matches!(pod.rm("d"), Err(PodError::InvalidPath(_))));
    }

    // -----------------------------------------------------------------------
    // cd / ls
    // -----------------------------------------------------------------------

    #[test]
    fn cd_special_forms() {
        let pod = new_pod("pod");
        pod.mkdir("a/b").unwrap();
        assert_eq!(pod.cd("a").unwrap(), p("/pod/a"));
        assert_eq!(pod.cd("b").unwrap(), p("/pod/a/b"));
        assert_eq!(pod.cd("..").unwrap(), p("/pod/a"));
        assert_eq!(pod.cd("/").unwrap(), p("/pod"));
        assert_eq!(pod.cd("..").unwrap(), p("/pod"));
        pod.cd("/a/b").unwrap();
        assert_eq!(pod.cd("").unwrap(), p("/pod"));
    }

    #[test]
    fn cd_errors() {
        let pod = new_pod("pod");
        upload_str(&pod, "/", "f", b"x", 4);
        assert!(pod.cd("nope").unwrap_err().is_not_found());
        assert!(matches!(pod.cd("f"), Err(PodError::NotADirectory(_))));
        assert_eq!(pod.pwd().unwrap(), p("/pod"));
    }

    #[test]
    fn relative_paths_follow_cwd() {
        let pod = new_pod("pod");
        pod.mkdir("a").unwrap();
        pod.cd("a").unwrap();
        pod.mkdir("b").unwrap();
        upload_str(&pod, ".", "f", b"x", 4);
        assert!(pod.ctx.tree.contains(&p("/pod/a/b")));
        assert!(pod.ctx.files.contains(&p("/pod/a/f")));
        let names: Vec<String> = pod
            .ls(".")
            .unwrap()
            .iter()
            .map(|e| e.name().to_string())
            .collect();
        assert_eq!(names, vec!["b", "f"]);
    }

    #[test]
    fn dir_stat_counts_children() {
        let pod = new_pod("pod");
        pod.mkdir("a").unwrap();
        pod.mkdir("b").unwrap();
        upload_str(&pod, "/", "f", b"x", 4);
        let stat = pod.dir_stat("/").unwrap();
        assert_eq!((stat.directories, stat.files), (2, 1));
    }

    // -----------------------------------------------------------------------
    // upload / download
    // -----------------------------------------------------------------------

    #[test]
    fn upload_download_roundtrip_with_seek() {
        let pod = new_pod("pod");
        pod.mkdir("docs").unwrap();
        let data: Vec<u8> = (0..540u32).map(|i| (i % 251) as u8).collect();
        let entry = upload_str(&pod, "docs", "note.txt", &data, 100);
        assert_eq!(entry.metadata.block_count(), 6);

        let stat = pod.file_stat("docs/note.txt").unwrap();
        assert_eq!(stat.blocks.len(), 6);
        assert_eq!(stat.blocks[5].size, 40);

        let mut reader = pod.download("/docs/note.txt").unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, data);

        reader.seek(SeekFrom::Start(250)).unwrap();
        let mut buf = [0u8; 10];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(&buf[..], &data[250..260]);
    }

    #[test]
    fn upload_conflicts() {
        let pod = new_pod("pod");
        pod.mkdir("d").unwrap();
        upload_str(&pod, "/", "f", b"x", 4);
        let again = pod.upload(Cursor::new(b"y".to_vec()), "/", "f", 1, None);
        assert!(matches!(again, Err(PodError::AlreadyPresent(_))));
        let over_dir = pod.upload(Cursor::new(b"y".to_vec()), "/", "d", 1, None);
        assert!(matches!(over_dir, Err(PodError::AlreadyPresent(_))));
        let missing = pod.upload(Cursor::new(b"y".to_vec()), "/nope", "g", 1, None);
        assert!(missing.unwrap_err().is_not_found());
    }

    #[test]
    fn upload_with_wrong_size_is_not_linked() {
        let pod = new_pod("pod");
        let err = pod
            .upload(Cursor::new(b"short".to_vec()), "/", "f", 10, Some(4))
            .unwrap_err();
        assert!(matches!(err, PodError::File(FileError::LengthMismatch { .. })));
        assert!(pod.file_paths().unwrap().is_empty());
        assert!(pod.ctx.tree.resolve(&p("/pod")).unwrap().children.is_empty());
    }

    #[test]
    fn wide_directory_survives_sync() {
        let pod = new_pod("pod");
        for i in 0..80 {
            upload_str(&pod, "/", &format!("f{i:02}"), b"x", 4);
        }
        pod.sync().unwrap();
        assert_eq!(pod.file_paths().unwrap().len(), 80);
    }

    #[test]
    fn oversized_block_is_rejected_before_upload() {
        let pod = new_pod("pod");
        let err = pod
            .upload(Cursor::new(b"data".to_vec()), "/", "f", 4, Some(u32::MAX))
            .unwrap_err();
        assert!(matches!(
            err,
            PodError::File(FileError::InvalidBlockSize { size: u32::MAX, .. })
        ));
        assert!(pod.ctx.tree.resolve(&p("/pod")).unwrap().children.is_empty());
    }

    #[test]
    fn closed_handle_is_rejected() {
        let pod = new_pod("pod");
        let other = pod.clone();
        pod.close();
        assert!(matches!(other.mkdir("a"), Err(PodError::PodNotOpen(_))));
        assert!(matches!(other.pwd(), Err(PodError::PodNotOpen(_))));
    }
}
