use podfs_types::{Address, OwnerAddress, PodPath, Topic};

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag (e.g., `"podfs-blob-v1"`) that is
/// prepended to every hash computation, so a blob and a topic derived from
/// identical bytes never collide.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for blob content addresses.
    pub const BLOB: Self = Self {
        domain: "podfs-blob-v1",
    };
    /// Hasher for feed chunk addresses.
    pub const CHUNK: Self = Self {
        domain: "podfs-chunk-v1",
    };
    /// Hasher for feed update identifiers and signing digests.
    pub const FEED: Self = Self {
        domain: "podfs-feed-v1",
    };
    /// Hasher for feed topics.
    pub const TOPIC: Self = Self {
        domain: "podfs-topic-v1",
    };
    /// Hasher for owner addresses.
    pub const OWNER: Self = Self {
        domain: "podfs-owner-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> [u8; 32] {
        self.hash_parts(&[data])
    }

    /// Hash several fields with domain separation. Every field is length
    /// prefixed, so `["ab", "c"]` and `["a", "bc"]` differ.
    pub fn hash_parts(&self, parts: &[&[u8]]) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        for part in parts {
            hasher.update(&(part.len() as u64).to_le_bytes());
            hasher.update(part);
        }
        *hasher.finalize().as_bytes()
    }

    /// Hash raw bytes into a content address.
    pub fn address(&self, data: &[u8]) -> Address {
        Address::from_hash(self.hash(data))
    }

    /// Verify that data produces the expected address.
    pub fn verify(&self, data: &[u8], expected: &Address) -> bool {
        self.address(data) == *expected
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}

/// Topic of the directory feed at `path`.
pub fn topic_for_path(path: &PodPath) -> Topic {
    topic_for_str(&path.to_string())
}

/// Topic derived from an arbitrary string.
pub fn topic_for_str(s: &str) -> Topic {
    Topic::from_hash(ContentHasher::TOPIC.hash(s.as_bytes()))
}

/// Owner address of an Ed25519 public key.
pub fn owner_address(public_key: &[u8; 32]) -> OwnerAddress {
    OwnerAddress::from_hash(ContentHasher::OWNER.hash(public_key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let data = b"hello world";
        assert_eq!(ContentHasher::BLOB.hash(data), ContentHasher::BLOB.hash(data));
    }

    #[test]
    fn different_domains_produce_different_hashes() {
        let data = b"same content";
        let blob = ContentHasher::BLOB.hash(data);
        let chunk = ContentHasher::CHUNK.hash(data);
        let topic = ContentHasher::TOPIC.hash(data);
        assert_ne!(blob, chunk);
        assert_ne!(blob, topic);
        assert_ne!(chunk, topic);
    }

    #[test]
    fn parts_are_length_prefixed() {
        let a = ContentHasher::FEED.hash_parts(&[b"ab".as_slice(), b"c".as_slice()]);
        let b = ContentHasher::FEED.hash_parts(&[b"a".as_slice(), b"bc".as_slice()]);
        assert_ne!(a, b);
    }

    #[test]
    fn verify_detects_tampering() {
        let addr = ContentHasher::BLOB.address(b"original");
        assert!(ContentHasher::BLOB.verify(b"original", &addr));
        assert!(!ContentHasher::BLOB.verify(b"tampered", &addr));
    }

    #[test]
    fn topic_depends_on_full_path() {
        let a = PodPath::parse("/alice/docs").unwrap();
        let b = PodPath::parse("/bob/docs").unwrap();
        assert_ne!(topic_for_path(&a), topic_for_path(&b));
        assert_eq!(topic_for_path(&a), topic_for_str("/alice/docs"));
    }

    #[test]
    fn custom_domain() {
        let hasher = ContentHasher::new("my-custom-domain-v1");
        assert_eq!(hasher.domain(), "my-custom-domain-v1");
        assert_ne!(hasher.hash(b"data"), ContentHasher::BLOB.hash(b"data"));
    }
}
