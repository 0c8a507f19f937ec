use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::address::{Address, Topic};
use crate::error::TypeError;
use crate::HASH_LEN;

const DIRECTORY_TAG: u8 = b'd';
const FILE_TAG: u8 = b'f';

/// What a [`Reference`] points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    Directory,
    File,
}

/// A directory's pointer to one of its children.
///
/// Directory children are addressed by the feed topic of their full path, file
/// children by the blob address of their metadata. Each reference carries a
/// one-byte discriminant so listing never has to guess. `Untyped` exists for
/// inodes written without the discriminant; resolving one means probing the
/// feed first and the blob store second.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reference {
    Directory(Topic),
    File(Address),
    Untyped([u8; HASH_LEN]),
}

impl Reference {
    /// The kind of child, if known without probing.
    pub fn kind(&self) -> Option<ReferenceKind> {
        match self {
            Self::Directory(_) => Some(ReferenceKind::Directory),
            Self::File(_) => Some(ReferenceKind::File),
            Self::Untyped(_) => None,
        }
    }

    /// The 32 bytes the reference points at, without the discriminant.
    pub fn target(&self) -> &[u8; HASH_LEN] {
        match self {
            Self::Directory(topic) => topic.as_bytes(),
            Self::File(address) => address.as_bytes(),
            Self::Untyped(bytes) => bytes,
        }
    }

    /// Two references are the same child when their target bytes are equal,
    /// regardless of whether either carries a discriminant.
    pub fn same_target(&self, other: &Reference) -> bool {
        self.target() == other.target()
    }

    /// Binary form: discriminant byte followed by the target, or the bare
    /// target for untyped references.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HASH_LEN + 1);
        match self {
            Self::Directory(_) => out.push(DIRECTORY_TAG),
            Self::File(_) => out.push(FILE_TAG),
            Self::Untyped(_) => {}
        }
        out.extend_from_slice(self.target());
        out
    }

    /// Parse the binary form produced by [`Reference::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypeError> {
        match bytes.len() {
            HASH_LEN => {
                let mut arr = [0u8; HASH_LEN];
                arr.copy_from_slice(bytes);
                Ok(Self::Untyped(arr))
            }
            len if len == HASH_LEN + 1 => match bytes[0] {
                DIRECTORY_TAG => Ok(Self::Directory(Topic::from_slice(&bytes[1..])?)),
                FILE_TAG => Ok(Self::File(Address::from_slice(&bytes[1..])?)),
                tag => Err(TypeError::InvalidReference(format!(
                    "unknown discriminant {tag:#04x}"
                ))),
            },
            len => Err(TypeError::InvalidLength {
                expected: HASH_LEN + 1,
                actual: len,
            }),
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Directory(topic) => write!(f, "d:{topic}"),
            Self::File(address) => write!(f, "f:{address}"),
            Self::Untyped(bytes) => write!(f, "{}", hex::encode(bytes)),
        }
    }
}

impl fmt::Debug for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = hex::encode(&self.target()[..4]);
        match self {
            Self::Directory(_) => write!(f, "Reference::Directory({short})"),
            Self::File(_) => write!(f, "Reference::File({short})"),
            Self::Untyped(_) => write!(f, "Reference::Untyped({short})"),
        }
    }
}

impl FromStr for Reference {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some(("d", hex)) => Ok(Self::Directory(Topic::from_hex(hex)?)),
            Some(("f", hex)) => Ok(Self::File(Address::from_hex(hex)?)),
            Some((tag, _)) => Err(TypeError::InvalidReference(format!(
                "unknown discriminant {tag:?}"
            ))),
            None => {
                let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
                match Self::from_bytes(&bytes)? {
                    Self::Untyped(arr) => Ok(Self::Untyped(arr)),
                    _ => Err(TypeError::InvalidReference(
                        "typed references use the \"d:\" or \"f:\" prefix".into(),
                    )),
                }
            }
        }
    }
}

/// Inodes store references as base64 of [`Reference::to_bytes`], 44
/// characters per child. The `d:`/`f:` hex text form is still accepted on
/// read.
impl Serialize for Reference {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(self.to_bytes()))
    }
}

impl<'de> Deserialize<'de> for Reference {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let parsed = if s.contains(':') || s.len() == 2 * HASH_LEN {
            s.parse()
        } else {
            STANDARD
                .decode(&s)
                .map_err(|e| TypeError::InvalidReference(e.to_string()))
                .and_then(|bytes| Self::from_bytes(&bytes))
        };
        parsed.map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dir_ref() -> Reference {
        Reference::Directory(Topic::from_hash([1u8; 32]))
    }

    fn file_ref() -> Reference {
        Reference::File(Address::from_hash([2u8; 32]))
    }

    #[test]
    fn kind_reflects_discriminant() {
        assert_eq!(dir_ref().kind(), Some(ReferenceKind::Directory));
        assert_eq!(file_ref().kind(), Some(ReferenceKind::File));
        assert_eq!(Reference::Untyped([3u8; 32]).kind(), None);
    }

    #[test]
    fn binary_form_carries_one_byte_tag() {
        assert_eq!(dir_ref().to_bytes().len(), 33);
        assert_eq!(dir_ref().to_bytes()[0], b'd');
        assert_eq!(Reference::Untyped([3u8; 32]).to_bytes().len(), 32);
        assert_eq!(Reference::from_bytes(&file_ref().to_bytes()).unwrap(), file_ref());
    }

    #[test]
    fn bare_32_bytes_decode_as_untyped() {
        let r = Reference::from_bytes(&[9u8; 32]).unwrap();
        assert_eq!(r, Reference::Untyped([9u8; 32]));
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let mut bytes = vec![b'x'];
        bytes.extend_from_slice(&[0u8; 32]);
        assert!(matches!(
            Reference::from_bytes(&bytes),
            Err(TypeError::InvalidReference(_))
        ));
        assert!(Reference::from_bytes(&[0u8; 10]).is_err());
    }

    #[test]
    fn same_target_ignores_discriminant() {
        let typed = Reference::Directory(Topic::from_hash([5u8; 32]));
        let legacy = Reference::Untyped([5u8; 32]);
        assert!(typed.same_target(&legacy));
        assert_ne!(typed, legacy);
        assert!(!typed.same_target(&file_ref()));
    }

    #[test]
    fn text_form_parses_back() {
        for r in [dir_ref(), file_ref(), Reference::Untyped([4u8; 32])] {
            let parsed: Reference = r.to_string().parse().unwrap();
            assert_eq!(parsed, r);
        }
        assert!(dir_ref().to_string().starts_with("d:"));
        assert!("q:00".parse::<Reference>().is_err());
    }

    #[test]
    fn json_form_is_compact_base64() {
        let json = serde_json::to_string(&dir_ref()).unwrap();
        // 44 base64 characters plus quotes
        assert_eq!(json.len(), 46);
        assert_eq!(serde_json::from_str::<Reference>(&json).unwrap(), dir_ref());
        let untyped = Reference::Untyped([4u8; 32]);
        let json = serde_json::to_string(&untyped).unwrap();
        assert_eq!(serde_json::from_str::<Reference>(&json).unwrap(), untyped);
    }

    #[test]
    fn json_accepts_text_form() {
        let json = format!("[\"{}\",\"{}\"]", dir_ref(), "ab".repeat(32));
        let parsed: Vec<Reference> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, vec![dir_ref(), Reference::Untyped([0xab; 32])]);
    }

    #[test]
    fn json_rejects_garbage() {
        assert!(serde_json::from_str::<Reference>("\"not base64!\"").is_err());
        assert!(serde_json::from_str::<Reference>("\"AAAA\"").is_err());
    }
}
