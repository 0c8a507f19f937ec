use std::collections::BTreeMap;

use podfs_crypto::topic_for_str;
use podfs_feed::FeedRegister;
use podfs_types::Topic;

use crate::error::{PodError, PodResult};

/// The account's pod table: slot index to pod name.
///
/// Persisted as `name,index\n` lines in the payload of the user account's
/// record feed. The slot index selects the pod's account keys.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PodRecords {
    by_index: BTreeMap<u32, String>,
}

impl PodRecords {
    pub fn parse(payload: &[u8]) -> PodResult<Self> {
        let text = std::str::from_utf8(payload).map_err(|_| PodError::CorruptRecords {
            line: String::from_utf8_lossy(payload).into_owned(),
        })?;
        let mut by_index = BTreeMap::new();
        for line in text.lines().filter(|l| !l.is_empty()) {
            let corrupt = || PodError::CorruptRecords {
                line: line.to_string(),
            };
            let (name, index) = line.rsplit_once(',').ok_or_else(corrupt)?;
            let index: u32 = index.parse().map_err(|_| corrupt())?;
            if name.is_empty() || by_index.insert(index, name.to_string()).is_some() {
                return Err(corrupt());
            }
        }
        Ok(Self { by_index })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = String::new();
        for (index, name) in &self.by_index {
            out.push_str(name);
            out.push(',');
            out.push_str(&index.to_string());
            out.push('\n');
        }
        out.into_bytes()
    }

    /// Assign `name` the lowest free slot below `max_pods`.
    pub fn insert(&mut self, name: &str, max_pods: usize) -> PodResult<u32> {
        if self.contains(name) {
            return Err(PodError::PodAlreadyExists(name.to_string()));
        }
        let free = (0..max_pods)
            .filter_map(|i| u32::try_from(i).ok())
            .find(|i| !self.by_index.contains_key(i))
            .ok_or(PodError::PodsExhausted { max: max_pods })?;
        self.by_index.insert(free, name.to_string());
        Ok(free)
    }

    pub fn remove(&mut self, name: &str) -> Option<u32> {
        let index = self.index_of(name)?;
        self.by_index.remove(&index);
        Some(index)
    }

    pub fn index_of(&self, name: &str) -> Option<u32> {
        self.by_index
            .iter()
            .find_map(|(index, n)| (n == name).then_some(*index))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    /// Pod names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.by_index.values().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.by_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_index.is_empty()
    }
}

/// Feed topic holding the record table of the account `feed` writes as.
pub fn records_topic(feed: &FeedRegister) -> Topic {
    topic_for_str(&feed.owner().to_hex())
}

/// Load the record table; an account that never created a pod has none.
pub fn load_records(feed: &FeedRegister) -> PodResult<PodRecords> {
    match feed.get(records_topic(feed).as_bytes()) {
        Ok(entry) => PodRecords::parse(&entry.payload),
        Err(e) if e.is_not_found() => Ok(PodRecords::default()),
        Err(e) => Err(e.into()),
    }
}

pub fn save_records(feed: &FeedRegister, records: &PodRecords) -> PodResult<()> {
    // Creating an existing feed continues its sequence.
    feed.create(records_topic(feed).as_bytes(), &records.encode())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use podfs_crypto::{AccountIndex, AccountKeys, RootSecret};
    use podfs_store::{InMemoryObjectStore, ObjectStore};
    use std::sync::Arc;

    #[test]
    fn parse_and_encode() {
        let records = PodRecords::parse(b"alice,0\nbob,3\n").unwrap();
        assert_eq!(records.index_of("bob"), Some(3));
        assert_eq!(records.names(), vec!["alice", "bob"]);
        assert_eq!(records.encode(), b"alice,0\nbob,3\n");
        assert!(PodRecords::parse(b"").unwrap().is_empty());
    }

    #[test]
    fn corrupt_lines_are_rejected() {
        for bad in ["alice", "alice,x\n", ",1\n", "a,1\nb,1\n"] {
            assert!(matches!(
                PodRecords::parse(bad.as_bytes()),
                Err(PodError::CorruptRecords { .. })
            ));
        }
    }

    #[test]
    fn insert_takes_lowest_free_slot() {
        let mut records = PodRecords::default();
        assert_eq!(records.insert("a", 4).unwrap(), 0);
        assert_eq!(records.insert("b", 4).unwrap(), 1);
        assert_eq!(records.insert("c", 4).unwrap(), 2);
        records.remove("b");
        assert_eq!(records.insert("d", 4).unwrap(), 1);
    }

    #[test]
    fn insert_reports_duplicates_and_exhaustion() {
        let mut records = PodRecords::default();
        records.insert("a", 2).unwrap();
        assert!(matches!(
            records.insert("a", 2),
            Err(PodError::PodAlreadyExists(_))
        ));
        records.insert("b", 2).unwrap();
        assert!(matches!(
            records.insert("c", 2),
            Err(PodError::PodsExhausted { max: 2 })
        ));
    }

    #[test]
    fn records_persist_in_the_user_feed() {
        let store: Arc<dyn ObjectStore> = Arc::new(InMemoryObjectStore::new());
        let keys = Arc::new(AccountKeys::derive(
            &RootSecret::from_bytes([3u8; 32]),
            AccountIndex::User,
        ));
        let feed = FeedRegister::new(store, keys);
        assert!(load_records(&feed).unwrap().is_empty());

        let mut records = PodRecords::default();
        records.insert("alice", 8).unwrap();
        save_records(&feed, &records).unwrap();
        records.insert("bob", 8).unwrap();
        save_records(&feed, &records).unwrap();

        assert_eq!(load_records(&feed).unwrap(), records);
    }
}
