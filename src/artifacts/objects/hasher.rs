//! Content hashing
//!
//! Every object is identified by a digest of its envelope form:
//! `"<kind> <length>\0" ++ content`. The kind tag in the header keeps
//! the hash namespaces of the three object kinds disjoint: a blob whose
//! bytes happen to look like a tree encoding can never collide in
//! meaning with an actual tree.

use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use bytes::Bytes;
use sha1::{Digest, Sha1};
use sha2::Sha256;

/// Digest algorithm a store is built on.
///
/// One store uses exactly one digest; the choice is made when the store
/// is created and determines the width of every [`ObjectId`] in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DigestKind {
    #[default]
    Sha1,
    Sha256,
}

impl DigestKind {
    /// Raw digest width in bytes (20 or 32).
    pub const fn raw_len(self) -> usize {
        match self {
            DigestKind::Sha1 => 20,
            DigestKind::Sha256 => 32,
        }
    }

    /// Hex digest width in characters (40 or 64).
    pub const fn hex_len(self) -> usize {
        self.raw_len() * 2
    }

    /// Hash an object's canonical content, header included.
    ///
    /// Deterministic: identical `(kind, content)` always produces the
    /// same identifier. No side effects.
    pub fn hash(self, object_type: ObjectType, content: &[u8]) -> ObjectId {
        let header = envelope_header(object_type, content.len());

        let hex = match self {
            DigestKind::Sha1 => {
                let mut hasher = Sha1::new();
                hasher.update(&header);
                hasher.update(content);
                hex::encode(hasher.finalize())
            }
            DigestKind::Sha256 => {
                let mut hasher = Sha256::new();
                hasher.update(&header);
                hasher.update(content);
                hex::encode(hasher.finalize())
            }
        };

        // A freshly computed digest is always a valid id literal.
        ObjectId::try_parse(hex).expect("digest output is valid hex")
    }
}

/// The ASCII envelope header `"<kind> <length>\0"`.
pub fn envelope_header(object_type: ObjectType, content_len: usize) -> Vec<u8> {
    format!("{} {}\0", object_type.as_str(), content_len).into_bytes()
}

/// Full envelope form: header followed by content. This is the byte
/// sequence that gets hashed and persisted.
pub fn envelope(object_type: ObjectType, content: &[u8]) -> Bytes {
    let mut bytes = envelope_header(object_type, content.len());
    bytes.extend_from_slice(content);
    Bytes::from(bytes)
}
