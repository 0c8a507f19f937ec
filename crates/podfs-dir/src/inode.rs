use podfs_types::{PodPath, Reference, TypeError};
use serde::{Deserialize, Serialize};

use crate::error::DirResult;

pub const DIR_INODE_VERSION: u8 = 1;

/// Directory metadata. `path` is the parent's full path (`/` for a pod
/// root), so `path` joined with `name` is the directory's own full path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryMeta {
    pub version: u8,
    pub path: String,
    pub name: String,
    pub creation_time: i64,
    pub access_time: i64,
    pub modification_time: i64,
}

/// A directory as published in its feed: metadata plus ordered child
/// references.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirInode {
    pub meta: DirectoryMeta,
    #[serde(default)]
    pub children: Vec<Reference>,
}

impl DirInode {
    /// A fresh, empty directory at `path`.
    pub fn new(path: &PodPath, now: i64) -> Self {
        Self {
            meta: DirectoryMeta {
                version: DIR_INODE_VERSION,
                path: path.parent_string(),
                name: path.name().to_string(),
                creation_time: now,
                access_time: now,
                modification_time: now,
            },
            children: Vec::new(),
        }
    }

    /// The directory's own full path.
    pub fn full_path(&self) -> Result<PodPath, TypeError> {
        PodPath::from_parts(&self.meta.path, &self.meta.name)
    }

    /// Add `child`, or replace the existing reference to the same target.
    /// Returns `true` if the child was not present before.
    pub fn add_child(&mut self, child: Reference) -> bool {
        match self.children.iter_mut().find(|r| r.same_target(&child)) {
            Some(existing) => {
                *existing = child;
                false
            }
            None => {
                self.children.push(child);
                true
            }
        }
    }

    /// Remove every reference to the same target as `child`. Returns `true`
    /// if anything was removed.
    pub fn remove_child(&mut self, child: &Reference) -> bool {
        let before = self.children.len();
        self.children.retain(|r| !r.same_target(child));
        self.children.len() != before
    }

    pub fn contains(&self, child: &Reference) -> bool {
        self.children.iter().any(|r| r.same_target(child))
    }

    pub fn touch(&mut self, now: i64) {
        self.meta.modification_time = now;
        self.meta.access_time = now;
    }

    pub fn to_bytes(&self) -> DirResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> DirResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
