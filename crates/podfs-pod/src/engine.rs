use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::RwLock;
use podfs_crypto::{topic_for_path, AccountIndex, AccountKeys, RootSecret};
use podfs_dir::{DirInode, DirectoryMeta};
use podfs_feed::FeedRegister;
use podfs_store::ObjectStore;
use podfs_types::{OwnerAddress, PodPath, Reference};
use tracing::info;

use crate::config::EngineConfig;
use crate::error::{PodError, PodResult};
use crate::names::validate_pod_name;
use crate::pod::{Pod, PodContext};
use crate::records::{load_records, save_records, PodRecords};
use crate::sync::SyncReport;

/// Lifecycle state of a pod within the current session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PodState {
    /// Recorded in the account but not opened this session.
    NotLoaded,
    Open,
    /// Opened earlier this session, then closed.
    Closed,
}

/// Summary of one pod.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PodStat {
    pub name: String,
    pub index: u32,
    pub owner: OwnerAddress,
    pub state: PodState,
    pub root: Reference,
    pub root_meta: DirectoryMeta,
    /// Children of the pod root.
    pub children: usize,
}

struct Session {
    root: RootSecret,
    user: FeedRegister,
    records: PodRecords,
    open: BTreeMap<String, Pod>,
    closed: BTreeSet<String>,
}

impl Session {
    fn pod_keys(&self, index: u32) -> Arc<AccountKeys> {
        Arc::new(AccountKeys::derive(&self.root, AccountIndex::Pod(index)))
    }

    fn index_of(&self, name: &str) -> PodResult<u32> {
        self.records
            .index_of(name)
            .ok_or_else(|| PodError::PodNotFound(name.to_string()))
    }
}

/// Entry point: a logged-in account and the pods it has open.
///
/// All remote state goes through the injected [`ObjectStore`]. Each pod is
/// written with its own account keys, derived from the session's root secret
/// and the pod's slot in the record table.
pub struct PodEngine {
    store: Arc<dyn ObjectStore>,
    config: EngineConfig,
    session: RwLock<Option<Session>>,
}

impl PodEngine {
    pub fn new(store: Arc<dyn ObjectStore>, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            session: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    // ---- Session ----

    /// Start a session for the account of `root`, ending any previous one.
    pub fn login(&self, root: RootSecret) -> PodResult<OwnerAddress> {
        self.logout();
        let keys = Arc::new(AccountKeys::derive(&root, AccountIndex::User));
        let user = FeedRegister::new(Arc::clone(&self.store), keys);
        let records = load_records(&user)?;
        let owner = user.owner();
        info!(user = %owner.short_hex(), pods = records.len(), "logged in");
        *self.session.write() = Some(Session {
            root,
            user,
            records,
            open: BTreeMap::new(),
            closed: BTreeSet::new(),
        });
        Ok(owner)
    }

    /// End the session, closing every open pod.
    pub fn logout(&self) {
        if let Some(session) = self.session.write().take() {
            for pod in session.open.values() {
                pod.close();
            }
            info!(user = %session.user.owner().short_hex(), "logged out");
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.session.read().is_some()
    }

    // ---- Pod lifecycle ----

    /// Create a pod with an empty root directory and open it.
    pub fn create_pod(&self, name: &str) -> PodResult<Pod> {
        validate_pod_name(name, self.config.max_name_len)?;
        let mut guard = self.session.write();
        let session = guard.as_mut().ok_or(PodError::NotLoggedIn)?;

        let mut records = session.records.clone();
        let index = records.insert(name, self.config.max_pods)?;
        let ctx = PodContext::new(
            name,
            index,
            session.pod_keys(index),
            Arc::clone(&self.store),
            self.config.clone(),
        )?;
        let pod = Pod::new(ctx);
        pod.create_root()?;
        save_records(&session.user, &records)?;
        session.records = records;

        session.closed.remove(name);
        session.open.insert(name.to_string(), pod.clone());
        info!(pod = name, index, "created pod");
        Ok(pod)
    }

    /// Open a recorded pod and synchronize its caches. Opening an open pod
    /// returns its existing handle.
    pub fn open_pod(&self, name: &str) -> PodResult<Pod> {
        let mut guard = self.session.write();
        let session = guard.as_mut().ok_or(PodError::NotLoggedIn)?;
        if let Some(pod) = session.open.get(name) {
            return Ok(pod.clone());
        }
        let index = session.index_of(name)?;
        let ctx = PodContext::new(
            name,
            index,
            session.pod_keys(index),
            Arc::clone(&self.store),
            self.config.clone(),
        )?;
        let pod = Pod::new(ctx);
        pod.sync()?;

        session.closed.remove(name);
        session.open.insert(name.to_string(), pod.clone());
        info!(pod = name, index, "opened pod");
        Ok(pod)
    }

    /// Close an open pod and drop its caches. The published tree is not
    /// touched.
    pub fn close_pod(&self, name: &str) -> PodResult<()> {
        let mut guard = self.session.write();
        let session = guard.as_mut().ok_or(PodError::NotLoggedIn)?;
        let pod = session
            .open
            .remove(name)
            .ok_or_else(|| PodError::PodNotOpen(name.to_string()))?;
        pod.close();
        session.closed.insert(name.to_string());
        info!(pod = name, "closed pod");
        Ok(())
    }

    /// Remove a pod from the record table, closing it if open. Its slot
    /// becomes free; published feeds stay in the store.
    pub fn delete_pod(&self, name: &str) -> PodResult<()> {
        let mut guard = self.session.write();
        let session = guard.as_mut().ok_or(PodError::NotLoggedIn)?;
        let mut records = session.records.clone();
        let index = records
            .remove(name)
            .ok_or_else(|| PodError::PodNotFound(name.to_string()))?;
        save_records(&session.user, &records)?;
        session.records = records;

        if let Some(pod) = session.open.remove(name) {
            pod.close();
        }
        session.closed.remove(name);
        info!(pod = name, index, "deleted pod");
        Ok(())
    }

    /// Resynchronize an open pod from its published root.
    pub fn sync_pod(&self, name: &str) -> PodResult<SyncReport> {
        self.pod(name)?.sync()
    }

    /// Handle to an open pod.
    pub fn pod(&self, name: &str) -> PodResult<Pod> {
        let guard = self.session.read();
        let session = guard.as_ref().ok_or(PodError::NotLoggedIn)?;
        match session.open.get(name) {
            Some(pod) => Ok(pod.clone()),
            None if session.records.contains(name) => Err(PodError::PodNotOpen(name.to_string())),
            None => Err(PodError::PodNotFound(name.to_string())),
        }
    }

    /// Names of all pods of the account, sorted.
    pub fn list_pods(&self) -> PodResult<Vec<String>> {
        let guard = self.session.read();
        let session = guard.as_ref().ok_or(PodError::NotLoggedIn)?;
        Ok(session.records.names())
    }

    pub fn pod_state(&self, name: &str) -> PodResult<PodState> {
        let guard = self.session.read();
        let session = guard.as_ref().ok_or(PodError::NotLoggedIn)?;
        session.index_of(name)?;
        Ok(if session.open.contains_key(name) {
            PodState::Open
        } else if session.closed.contains(name) {
            PodState::Closed
        } else {
            PodState::NotLoaded
        })
    }

    /// Describe a pod from its published root. Works whether or not the pod
    /// is open.
    pub fn pod_stat(&self, name: &str) -> PodResult<PodStat> {
        let state = self.pod_state(name)?;
        let guard = self.session.read();
        let session = guard.as_ref().ok_or(PodError::NotLoggedIn)?;
        let index = session.index_of(name)?;
        let feed = FeedRegister::new(Arc::clone(&self.store), session.pod_keys(index));
        let topic = topic_for_path(&PodPath::root(name)?);
        let root = DirInode::from_bytes(&feed.get(topic.as_bytes())?.payload)?;
        Ok(PodStat {
            name: name.to_string(),
            index,
            owner: feed.owner(),
            state,
            root: Reference::Directory(topic),
            children: root.children.len(),
            root_meta: root.meta,
        })
    }
}

impl std::fmt::Debug for PodEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let guard = self.session.read();
        f.debug_struct("PodEngine")
            .field("logged_in", &guard.is_some())
            .field("open_pods", &guard.as_ref().map(|s| s.open.len()).unwrap_or(0))
            .finish()
    }
}
