use std::sync::Arc;

use podfs_crypto::AccountKeys;
use podfs_store::ObjectStore;
use podfs_types::{Address, OwnerAddress, Topic, MAX_PAYLOAD_LEN, TOPIC_LEN};
use tracing::debug;

use crate::error::{FeedError, FeedResult};
use crate::update::{chunk_address, Epoch, SignedUpdate};

/// The latest state of one feed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeedEntry {
    /// Chunk address of the update this entry was read from.
    pub address: Address,
    pub owner: OwnerAddress,
    pub topic: Topic,
    pub epoch: Epoch,
    pub payload: Vec<u8>,
}

/// Single-writer versioned pointers over an [`ObjectStore`].
///
/// A feed is identified by (owner, topic). Update `n` of a feed is a signed
/// envelope stored as a chunk at `hash(owner, hash(topic, n))`, so anyone who
/// knows the owner and topic can find and verify it without trusting the
/// store. Updates are numbered without gaps, which lets the latest one be
/// found with an exponential then binary search over indices.
///
/// A register writes with the account keys it was built with and reads
/// feeds of any owner.
pub struct FeedRegister {
    store: Arc<dyn ObjectStore>,
    keys: Arc<AccountKeys>,
}

impl FeedRegister {
    pub fn new(store: Arc<dyn ObjectStore>, keys: Arc<AccountKeys>) -> Self {
        Self { store, keys }
    }

    /// Address of the account this register writes as.
    pub fn owner(&self) -> OwnerAddress {
        self.keys.address()
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Publish the first update of a feed.
    ///
    /// If the feed already has updates (a directory re-created at a path that
    /// was removed earlier), the new payload continues that sequence and
    /// becomes the latest update.
    pub fn create(&self, topic: &[u8], payload: &[u8]) -> FeedResult<FeedEntry> {
        let topic = validate(topic, payload)?;
        let owner = self.owner();
        let epoch = match self.latest_index(&owner, &topic)? {
            Some(index) => {
                let previous = self.fetch(&owner, &topic, index)?;
                previous.epoch.next(now())
            }
            None => Epoch::first(now()),
        };
        self.publish(topic, epoch, payload)
    }

    /// Publish the next update of an existing feed.
    pub fn update(&self, topic: &[u8], payload: &[u8]) -> FeedResult<FeedEntry> {
        let topic = validate(topic, payload)?;
        let latest = self.lookup_topic(&self.owner(), &topic)?;
        self.publish(topic, latest.epoch.next(now()), payload)
    }

    /// Latest update of one of this register's own feeds.
    pub fn get(&self, topic: &[u8]) -> FeedResult<FeedEntry> {
        self.lookup(&self.owner(), topic)
    }

    /// Latest update of any owner's feed.
    pub fn lookup(&self, owner: &OwnerAddress, topic: &[u8]) -> FeedResult<FeedEntry> {
        let topic = parse_topic(topic)?;
        self.lookup_topic(owner, &topic)
    }

    /// Whether one of this register's own feeds has been published.
    pub fn exists(&self, topic: &[u8]) -> FeedResult<bool> {
        let topic = parse_topic(topic)?;
        Ok(self.latest_index(&self.owner(), &topic)?.is_some())
    }

    fn lookup_topic(&self, owner: &OwnerAddress, topic: &Topic) -> FeedResult<FeedEntry> {
        match self.latest_index(owner, topic)? {
            Some(index) => self.fetch(owner, topic, index),
            None => Err(FeedError::NotFound {
                owner: *owner,
                topic: *topic,
            }),
        }
    }

    fn publish(&self, topic: Topic, epoch: Epoch, payload: &[u8]) -> FeedResult<FeedEntry> {
        let owner = self.owner();
        let update = SignedUpdate::sign(&self.keys, topic, epoch, payload);
        let address = chunk_address(&owner, &topic, epoch.index);
        self.store.upload_chunk(&address, &update.encode()?)?;
        debug!(
            topic = %topic.short_hex(),
            index = epoch.index,
            len = payload.len(),
            "published feed update"
        );
        Ok(FeedEntry {
            address,
            owner,
            topic,
            epoch,
            payload: payload.to_vec(),
        })
    }

    fn has_update(&self, owner: &OwnerAddress, topic: &Topic, index: u64) -> FeedResult<bool> {
        Ok(self.store.has_chunk(&chunk_address(owner, topic, index))?)
    }

    /// Index of the latest update, or `None` if the feed was never published.
    fn latest_index(&self, owner: &OwnerAddress, topic: &Topic) -> FeedResult<Option<u64>> {
        if !self.has_update(owner, topic, 0)? {
            return Ok(None);
        }
        // Grow the window until it brackets the end of the sequence.
        let mut present = 0u64;
        let mut absent = 1u64;
        while self.has_update(owner, topic, absent)? {
            present = absent;
            absent = match absent.checked_mul(2) {
                Some(next) => next,
                None => return Ok(Some(present)),
            };
        }
        while absent - present > 1 {
            let mid = present + (absent - present) / 2;
            if self.has_update(owner, topic, mid)? {
                present = mid;
            } else {
                absent = mid;
            }
        }
        Ok(Some(present))
    }

    fn fetch(&self, owner: &OwnerAddress, topic: &Topic, index: u64) -> FeedResult<FeedEntry> {
        let address = chunk_address(owner, topic, index);
        let bytes = self.store.download_chunk(&address)?;
        let update = SignedUpdate::decode(&bytes)?;
        update.verify(owner, topic, index)?;
        Ok(FeedEntry {
            address,
            owner: *owner,
            topic: *topic,
            epoch: update.epoch,
            payload: update.payload,
        })
    }
}

impl std::fmt::Debug for FeedRegister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedRegister")
            .field("owner", &self.owner())
            .finish()
    }
}

fn parse_topic(topic: &[u8]) -> FeedResult<Topic> {
    Topic::from_slice(topic).map_err(|_| FeedError::InvalidTopic {
        expected: TOPIC_LEN,
        actual: topic.len(),
    })
}

fn validate(topic: &[u8], payload: &[u8]) -> FeedResult<Topic> {
    let topic = parse_topic(topic)?;
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(FeedError::PayloadTooLarge {
            len: payload.len(),
            max: MAX_PAYLOAD_LEN,
        });
    }
    Ok(topic)
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
