//! The signed envelope stored for every feed update, and the addressing
//! scheme that makes update chunks self-certifying.

use podfs_crypto::{owner_address, AccountKeys, ContentHasher, Signature, VerifyingKey};
use podfs_types::{Address, OwnerAddress, Topic};
use serde::{Deserialize, Serialize};

use crate::error::{FeedError, FeedResult};

/// Position of an update within its feed.
///
/// `index` counts updates from zero with no gaps; `time` is the unix time
/// (seconds) at which the update was signed and never decreases along a feed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Epoch {
    pub index: u64,
    pub time: i64,
}

impl Epoch {
    pub fn first(time: i64) -> Self {
        Self { index: 0, time }
    }

    /// The epoch following `self`, with the time marker clamped so it never
    /// runs backwards.
    pub fn next(&self, now: i64) -> Self {
        Self {
            index: self.index + 1,
            time: now.max(self.time),
        }
    }
}

/// Identifier of update `index` of `topic`: `hash(topic, index)`.
pub fn update_id(topic: &Topic, index: u64) -> [u8; 32] {
    ContentHasher::FEED.hash_parts(&[topic.as_bytes().as_slice(), &index.to_be_bytes()])
}

/// Chunk address holding update `index` of (`owner`, `topic`).
pub fn chunk_address(owner: &OwnerAddress, topic: &Topic, index: u64) -> Address {
    let id = update_id(topic, index);
    let parts = [owner.as_bytes().as_slice(), id.as_slice()];
    Address::from_hash(ContentHasher::CHUNK.hash_parts(&parts))
}

fn signing_digest(id: &[u8; 32], payload: &[u8]) -> [u8; 32] {
    let payload_address = ContentHasher::BLOB.hash(payload);
    ContentHasher::FEED.hash_parts(&[b"sign".as_slice(), id.as_slice(), payload_address.as_slice()])
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct SignedUpdate {
    pub(crate) public_key: [u8; 32],
    pub(crate) topic: Topic,
    pub(crate) epoch: Epoch,
    pub(crate) payload: Vec<u8>,
    pub(crate) signature: Signature,
}

impl SignedUpdate {
    pub(crate) fn sign(keys: &AccountKeys, topic: Topic, epoch: Epoch, payload: &[u8]) -> Self {
        let digest = signing_digest(&update_id(&topic, epoch.index), payload);
        Self {
            public_key: keys.verifying_key().to_bytes(),
            topic,
            epoch,
            payload: payload.to_vec(),
            signature: keys.sign(&digest),
        }
    }

    pub(crate) fn encode(&self) -> FeedResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| FeedError::Codec(e.to_string()))
    }

    pub(crate) fn decode(bytes: &[u8]) -> FeedResult<Self> {
        bincode::deserialize(bytes).map_err(|e| FeedError::Codec(e.to_string()))
    }

    /// Check that this envelope is update `index` of (`owner`, `topic`) and
    /// was signed by the owner's key.
    pub(crate) fn verify(&self, owner: &OwnerAddress, topic: &Topic, index: u64) -> FeedResult<()> {
        let invalid = |reason: &str| FeedError::InvalidUpdate {
            index,
            reason: reason.to_string(),
        };
        if owner_address(&self.public_key) != *owner {
            return Err(invalid("public key does not belong to the feed owner"));
        }
        if self.topic != *topic {
            return Err(invalid("topic mismatch"));
        }
        if self.epoch.index != index {
            return Err(invalid("sequence index mismatch"));
        }
        let key = VerifyingKey::from_bytes(self.public_key)?;
        let digest = signing_digest(&update_id(topic, index), &self.payload);
        key.verify_digest(&digest, &self.signature)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use podfs_crypto::{AccountIndex, RootSecret};

    fn keys(seed: u8) -> AccountKeys {
        AccountKeys::derive(&RootSecret::from_bytes([seed; 32]), AccountIndex::Pod(0))
    }

    #[test]
    fn epoch_time_never_runs_backwards() {
        let e = Epoch { index: 4, time: 100 };
        assert_eq!(e.next(50), Epoch { index: 5, time: 100 });
        assert_eq!(e.next(150), Epoch { index: 5, time: 150 });
    }

    #[test]
    fn chunk_address_depends_on_every_coordinate() {
        let topic = Topic::from_hash([1u8; 32]);
        let owner = keys(1).address();
        let base = chunk_address(&owner, &topic, 0);
        assert_ne!(base, chunk_address(&owner, &topic, 1));
        assert_ne!(base, chunk_address(&keys(2).address(), &topic, 0));
        assert_ne!(base, chunk_address(&owner, &Topic::from_hash([2u8; 32]), 0));
    }

    #[test]
    fn signed_update_verifies_after_roundtrip() {
        let k = keys(1);
        let topic = Topic::from_hash([3u8; 32]);
        let update = SignedUpdate::sign(&k, topic, Epoch::first(10), b"payload");
        let decoded = SignedUpdate::decode(&update.encode().unwrap()).unwrap();
        decoded.verify(&k.address(), &topic, 0).unwrap();
        assert_eq!(decoded.payload, b"payload");
    }

    #[test]
    fn tampered_payload_fails_verification() {
        let k = keys(1);
        let topic = Topic::from_hash([3u8; 32]);
        let mut update = SignedUpdate::sign(&k, topic, Epoch::first(10), b"payload");
        update.payload = b"forged".to_vec();
        assert!(matches!(
            update.verify(&k.address(), &topic, 0),
            Err(FeedError::Signature(_))
        ));
    }

    #[test]
    fn wrong_owner_or_index_fails_verification() {
        let k = keys(1);
        let topic = Topic::from_hash([3u8; 32]);
        let update = SignedUpdate::sign(&k, topic, Epoch::first(10), b"payload");
        assert!(matches!(
            update.verify(&keys(2).address(), &topic, 0),
            Err(FeedError::InvalidUpdate { .. })
        ));
        assert!(matches!(
            update.verify(&k.address(), &topic, 1),
            Err(FeedError::InvalidUpdate { .. })
        ));
    }

    #[test]
    fn garbage_does_not_decode() {
        assert!(matches!(
            SignedUpdate::decode(b"not an envelope"),
            Err(FeedError::Codec(_))
        ));
    }
}
