//! Typed absolute paths inside a pod.
//!
//! A [`PodPath`] is the pod name followed by zero or more directory or file
//! names. Its canonical text form is `/<pod>/<seg>/...`; the pod root is
//! `/<pod>`. Directory inodes store their *parent* path as text, which is `/`
//! for the pod root.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Separator between path segments.
pub const SEPARATOR: char = '/';

#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PodPath {
    segments: Vec<String>,
}

fn check_segment(path: &str, segment: &str) -> Result<(), TypeError> {
    let reason = if segment.is_empty() {
        "empty segment"
    } else if segment == "." || segment == ".." {
        "relative segment"
    } else if segment.contains(SEPARATOR) {
        "segment contains a separator"
    } else {
        return Ok(());
    };
    Err(TypeError::InvalidPath {
        path: path.to_string(),
        reason: reason.into(),
    })
}

impl PodPath {
    /// The root directory of the named pod.
    pub fn root(pod: &str) -> Result<Self, TypeError> {
        check_segment(pod, pod)?;
        Ok(Self {
            segments: vec![pod.to_string()],
        })
    }

    /// Parse a canonical absolute path such as `/alice/docs`.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let rest = s.strip_prefix(SEPARATOR).ok_or_else(|| TypeError::InvalidPath {
            path: s.to_string(),
            reason: "must start with '/'".into(),
        })?;
        let rest = rest.strip_suffix(SEPARATOR).unwrap_or(rest);
        let segments: Vec<String> = rest.split(SEPARATOR).map(str::to_string).collect();
        for segment in &segments {
            check_segment(s, segment)?;
        }
        Ok(Self { segments })
    }

    /// Name of the pod this path belongs to.
    pub fn pod_name(&self) -> &str {
        &self.segments[0]
    }

    /// Last segment; the pod name for the root.
    pub fn name(&self) -> &str {
        &self.segments[self.segments.len() - 1]
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments below the pod root.
    pub fn depth(&self) -> usize {
        self.segments.len() - 1
    }

    pub fn is_root(&self) -> bool {
        self.segments.len() == 1
    }

    /// The pod root this path lives under.
    pub fn pod_root(&self) -> Self {
        Self {
            segments: vec![self.segments[0].clone()],
        }
    }

    /// The containing directory, or `None` at the pod root.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Append one segment.
    pub fn join(&self, segment: &str) -> Result<Self, TypeError> {
        check_segment(&format!("{self}/{segment}"), segment)?;
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Ok(Self { segments })
    }

    /// Text of the parent path as stored in inode metadata: `/` for the pod
    /// root, the parent's canonical form otherwise.
    pub fn parent_string(&self) -> String {
        match self.parent() {
            Some(parent) => parent.to_string(),
            None => SEPARATOR.to_string(),
        }
    }

    /// Rebuild a path from an inode's stored parent path and name.
    pub fn from_parts(parent: &str, name: &str) -> Result<Self, TypeError> {
        if parent == "/" {
            Self::root(name)
        } else {
            Self::parse(parent)?.join(name)
        }
    }

    /// Segment-aware prefix test: `/p/a` is a prefix of `/p/a/b` but not of
    /// `/p/ab`.
    pub fn starts_with(&self, prefix: &PodPath) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments[..]
    }

    /// Every path from the pod root down to `self`, inclusive.
    pub fn lineage(&self) -> Vec<Self> {
        (1..=self.segments.len())
            .map(|n| Self {
                segments: self.segments[..n].to_vec(),
            })
            .collect()
    }

    /// Resolve user input against `self` as the current directory.
    ///
    /// A leading `/` restarts from the pod root. `.` and empty segments are
    /// ignored and `..` climbs one level, stopping at the pod root.
    pub fn resolve(&self, input: &str) -> Result<Self, TypeError> {
        let (mut current, rest) = match input.strip_prefix(SEPARATOR) {
            Some(rest) => (self.pod_root(), rest),
            None => (self.clone(), input),
        };
        for segment in rest.split(SEPARATOR) {
            match segment {
                "" | "." => {}
                ".." => {
                    if let Some(parent) = current.parent() {
                        current = parent;
                    }
                }
                name => current = current.join(name)?,
            }
        }
        Ok(current)
    }
}

impl fmt::Display for PodPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "{SEPARATOR}{segment}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for PodPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PodPath({self})")
    }
}

impl FromStr for PodPath {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for PodPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PodPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn p(s: &str) -> PodPath {
        PodPath::parse(s).unwrap()
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    #[test]
    fn root_has_no_parent() {
        let root = PodPath::root("alice").unwrap();
        assert!(root.is_root());
        assert_eq!(root.parent(), None);
        assert_eq!(root.to_string(), "/alice");
        assert_eq!(root.parent_string(), "/");
        assert_eq!(root.depth(), 0);
    }

    #[test]
    fn parse_and_display_agree() {
        let path = p("/alice/docs/notes");
        assert_eq!(path.to_string(), "/alice/docs/notes");
        assert_eq!(path.pod_name(), "alice");
        assert_eq!(path.name(), "notes");
        assert_eq!(path.depth(), 2);
        assert_eq!(p("/alice/docs/"), p("/alice/docs"));
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(PodPath::parse("alice").is_err());
        assert!(PodPath::parse("/").is_err());
        assert!(PodPath::parse("/alice//docs").is_err());
        assert!(PodPath::parse("/alice/../docs").is_err());
    }

    #[test]
    fn join_and_parent_are_inverse() {
        let docs = p("/alice/docs");
        let note = docs.join("note.txt").unwrap();
        assert_eq!(note.parent(), Some(docs.clone()));
        assert_eq!(note.parent_string(), "/alice/docs");
        assert!(docs.join("a/b").is_err());
        assert!(docs.join("..").is_err());
    }

    #[test]
    fn from_parts_handles_pod_root() {
        assert_eq!(PodPath::from_parts("/", "alice").unwrap(), p("/alice"));
        assert_eq!(PodPath::from_parts("/alice", "docs").unwrap(), p("/alice/docs"));
    }

    // -----------------------------------------------------------------------
    // Prefixes
    // -----------------------------------------------------------------------

    #[test]
    fn starts_with_is_segment_aware() {
        assert!(p("/p/a/b").starts_with(&p("/p/a")));
        assert!(p("/p/a").starts_with(&p("/p/a")));
        assert!(!p("/p/ab").starts_with(&p("/p/a")));
        assert!(!p("/p").starts_with(&p("/p/a")));
    }

    #[test]
    fn lineage_walks_from_root() {
        let chain = p("/p/a/b").lineage();
        assert_eq!(chain, vec![p("/p"), p("/p/a"), p("/p/a/b")]);
    }

    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    #[test]
    fn resolve_relative_and_absolute() {
        let cwd = p("/alice/docs");
        assert_eq!(cwd.resolve("notes").unwrap(), p("/alice/docs/notes"));
        assert_eq!(cwd.resolve("/music").unwrap(), p("/alice/music"));
        assert_eq!(cwd.resolve("..").unwrap(), p("/alice"));
        assert_eq!(cwd.resolve("../../..").unwrap(), p("/alice"));
        assert_eq!(cwd.resolve("./a/../b").unwrap(), p("/alice/docs/b"));
        assert_eq!(cwd.resolve("").unwrap(), cwd);
        assert_eq!(cwd.resolve("/").unwrap(), p("/alice"));
    }

    #[test]
    fn serde_roundtrip_as_string() {
        let path = p("/alice/docs");
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, "\"/alice/docs\"");
        let parsed: PodPath = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, path);
    }

    proptest! {
        #[test]
        fn display_parse_roundtrip(segs in proptest::collection::vec("[a-z0-9_]{1,8}", 1..6)) {
            let text = format!("/{}", segs.join("/"));
            let path = PodPath::parse(&text).unwrap();
            prop_assert_eq!(path.to_string(), text);
            prop_assert_eq!(path.depth(), segs.len() - 1);
        }

        #[test]
        fn parent_is_always_a_prefix(segs in proptest::collection::vec("[a-z]{1,5}", 2..6)) {
            let path = PodPath::parse(&format!("/{}", segs.join("/"))).unwrap();
            let parent = path.parent().unwrap();
            prop_assert!(path.starts_with(&parent));
            prop_assert!(!parent.starts_with(&path));
        }
    }
}
