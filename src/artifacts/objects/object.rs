use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::hasher::DigestKind;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tree::Tree;
use crate::errors::Result;
use bytes::Bytes;
use std::io::BufRead;

/// Canonical serialization of an object's logical content, without the
/// envelope header. Must be a pure deterministic function of the content.
pub trait Packable {
    fn serialize(&self) -> Result<Bytes>;
}

/// Inverse of [`Packable`]: parse canonical content back into an object.
/// The digest kind is needed where raw hash bytes are embedded (trees).
pub trait Unpackable {
    fn deserialize(reader: impl BufRead, digest: DigestKind) -> Result<Self>
    where
        Self: Sized;
}

pub trait Object: Packable {
    fn object_type(&self) -> ObjectType;

    /// Compute this object's identity under the given digest.
    ///
    /// The id is a function of the canonical content only, so two
    /// logically equal objects always share an id.
    fn object_id(&self, digest: DigestKind) -> Result<ObjectId> {
        let content = self.serialize()?;
        Ok(digest.hash(self.object_type(), &content))
    }
}

/// A decoded object of any kind. The closed tagged union callers match
/// on when the kind is not known up front.
#[derive(Debug, Clone)]
pub enum ObjectBox {
    Blob(Blob),
    Tree(Tree),
    Commit(Commit),
}

impl ObjectBox {
    pub fn object_type(&self) -> ObjectType {
        match self {
            ObjectBox::Blob(_) => ObjectType::Blob,
            ObjectBox::Tree(_) => ObjectType::Tree,
            ObjectBox::Commit(_) => ObjectType::Commit,
        }
    }

    pub fn serialize(&self) -> Result<Bytes> {
        match self {
            ObjectBox::Blob(blob) => blob.serialize(),
            ObjectBox::Tree(tree) => tree.serialize(),
            ObjectBox::Commit(commit) => commit.serialize(),
        }
    }

    pub fn as_tree(&self) -> Option<&Tree> {
        match self {
            ObjectBox::Tree(tree) => Some(tree),
            _ => None,
        }
    }

    pub fn as_commit(&self) -> Option<&Commit> {
        match self {
            ObjectBox::Commit(commit) => Some(commit),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&Blob> {
        match self {
            ObjectBox::Blob(blob) => Some(blob),
            _ => None,
        }
    }
}
