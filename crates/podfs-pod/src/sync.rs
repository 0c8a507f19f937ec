use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use podfs_dir::{DirectoryTree, LoadStats};
use podfs_file::{FileEntry, FileStore};
use podfs_types::PodPath;
use tracing::{info, warn};

use crate::error::PodResult;

/// Outcome of synchronizing one pod.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Directories loaded, the pod root included.
    pub directories: usize,
    pub files: usize,
    /// References that could not be resolved and were left out.
    pub skipped: usize,
}

impl From<LoadStats> for SyncReport {
    fn from(stats: LoadStats) -> Self {
        Self {
            directories: stats.directories,
            files: stats.files,
            skipped: stats.skipped,
        }
    }
}

/// Rebuild the local caches of a pod from its published root.
///
/// Both caches are emptied first. The root's children are then loaded by at
/// most `workers` scoped threads pulling from a shared cursor; each child's
/// whole subtree is loaded by the worker that picked it. A child that fails
/// to resolve is logged and skipped. Only failure to resolve the root itself
/// is an error.
pub(crate) fn sync_pod(
    tree: &DirectoryTree,
    files: &FileStore,
    root: &PodPath,
    workers: usize,
) -> PodResult<SyncReport> {
    tree.clear();
    files.clear();

    let root_inode = tree.resolve(root)?;
    tree.insert(root_inode.clone())?;
    let children = &root_inode.children;

    let cursor = &AtomicUsize::new(0);
    let workers = workers.clamp(1, children.len().max(1));

    let mut total = LoadStats {
        directories: 1,
        ..LoadStats::default()
    };
    thread::scope(|s| {
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                s.spawn(move || {
                    let mut stats = LoadStats::default();
                    let mut on_file = |path: PodPath, entry: FileEntry| files.insert(path, entry);
                    loop {
                        let i = cursor.fetch_add(1, Ordering::Relaxed);
                        let Some(child) = children.get(i) else {
                            break;
                        };
                        match tree.load_subtree(child, &mut on_file) {
                            Ok(loaded) => stats.merge(loaded),
                            Err(e) => {
                                warn!(
                                    pod = %root,
                                    reference = %child,
                                    error = %e,
                                    "skipping reference during sync"
                                );
                                stats.skipped += 1;
                            }
                        }
                    }
                    stats
                })
            })
            .collect();
        for handle in handles {
            match handle.join() {
                Ok(stats) => total.merge(stats),
                Err(panic) => std::panic::resume_unwind(panic),
            }
        }
    });

    let report = SyncReport::from(total);
    info!(
        pod = %root,
        directories = report.directories,
        files = report.files,
        skipped = report.skipped,
        "synchronized pod"
    );
    Ok(report)
}
