//! Commit object
//!
//! Commits are snapshots of history: a tree hash, an ordered parent
//! list, authorship, and a message. The canonical encoding includes the
//! parent hashes, which is what makes history tamper-evident — changing
//! any ancestor changes every descendant's hash.
//!
//! ## Format
//!
//! On disk:
//! ```text
//! commit <size>\0
//! tree <tree-hash>
//! parent <parent-hash>
//! author <name> <email> <timestamp> <timezone>
//!
//! <commit message>
//! ```
//!
//! Zero parent lines denote a root commit; multiple denote a merge, and
//! parent order is preserved exactly as supplied — the first parent is
//! the mainline.

use crate::artifacts::objects::hasher::DigestKind;
use crate::artifacts::objects::object::{Object, Packable, Unpackable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::{GritError, Result};
use bytes::Bytes;
use chrono::{DateTime, FixedOffset};
use std::io::BufRead;

/// Authorship: name, email, and a caller-supplied timestamp.
///
/// The engine never reads a clock; the timestamp always arrives from
/// the caller, so commit hashing stays deterministic.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Author {
    name: String,
    email: String,
    timestamp: DateTime<FixedOffset>,
}

impl Author {
    pub fn new(name: String, email: String, timestamp: DateTime<FixedOffset>) -> Self {
        Author {
            name,
            email,
            timestamp,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn timestamp(&self) -> DateTime<FixedOffset> {
        self.timestamp
    }

    /// Canonical line form: `name <email> epoch-secs ±HHMM`.
    pub fn display(&self) -> String {
        format!(
            "{} <{}> {} {}",
            self.name,
            self.email,
            self.timestamp.timestamp(),
            self.timestamp.format("%z")
        )
    }
}

impl TryFrom<&str> for Author {
    type Error = GritError;

    fn try_from(value: &str) -> Result<Self> {
        // Format: "name <email> timestamp timezone"
        // Split from the right so names may contain spaces
        let parts: Vec<&str> = value.rsplitn(3, ' ').collect();
        if parts.len() < 3 {
            return Err(GritError::InvalidObject(format!(
                "invalid author line: {value}"
            )));
        }

        let offset = parse_offset(parts[0])?;
        let epoch = parts[1]
            .parse::<i64>()
            .map_err(|_| GritError::InvalidObject(format!("invalid author timestamp: {value}")))?;
        let name_email = parts[2];

        let email_start = name_email.find('<').ok_or_else(|| {
            GritError::InvalidObject(format!("author line missing '<': {value}"))
        })?;
        let email_end = name_email.find('>').ok_or_else(|| {
            GritError::InvalidObject(format!("author line missing '>': {value}"))
        })?;

        let name = name_email[..email_start].trim().to_string();
        let email = name_email[email_start + 1..email_end].to_string();

        let timestamp = DateTime::from_timestamp(epoch, 0)
            .ok_or_else(|| GritError::InvalidObject(format!("author timestamp out of range: {epoch}")))?
            .with_timezone(&offset);

        Ok(Author {
            name,
            email,
            timestamp,
        })
    }
}

/// Parse a `±HHMM` timezone offset.
fn parse_offset(text: &str) -> Result<FixedOffset> {
    let invalid = || GritError::InvalidObject(format!("invalid timezone offset: {text}"));

    let (sign, digits) = match text.split_at_checked(1) {
        Some(("+", digits)) => (1, digits),
        Some(("-", digits)) => (-1, digits),
        _ => return Err(invalid()),
    };
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    let hours: i32 = digits[..2].parse().map_err(|_| invalid())?;
    let minutes: i32 = digits[2..].parse().map_err(|_| invalid())?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

/// Slim representation of a commit: just what the graph walkers need.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SlimCommit {
    pub oid: ObjectId,
    pub parents: Vec<ObjectId>,
    /// Commit timestamp (drives traversal ordering)
    pub timestamp: DateTime<FixedOffset>,
}

impl PartialOrd for SlimCommit {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SlimCommit {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| self.oid.cmp(&other.oid))
    }
}

/// A snapshot of history with metadata.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Commit {
    /// Parent commit ids (empty for a root commit, several for a merge)
    parents: Vec<ObjectId>,
    tree_oid: ObjectId,
    author: Author,
    message: String,
}

impl Commit {
    pub fn new(parents: Vec<ObjectId>, tree_oid: ObjectId, author: Author, message: String) -> Self {
        Commit {
            parents,
            tree_oid,
            author,
            message,
        }
    }

    pub fn tree_oid(&self) -> &ObjectId {
        &self.tree_oid
    }

    pub fn parents(&self) -> &[ObjectId] {
        &self.parents
    }

    /// The first (mainline) parent, if any.
    pub fn parent(&self) -> Option<&ObjectId> {
        self.parents.first()
    }

    pub fn author(&self) -> &Author {
        &self.author
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// First line of the message, for short-form display.
    pub fn short_message(&self) -> String {
        self.message.lines().next().unwrap_or("").to_string()
    }

    pub fn timestamp(&self) -> DateTime<FixedOffset> {
        self.author.timestamp()
    }

    pub fn to_slim(&self, oid: ObjectId) -> SlimCommit {
        SlimCommit {
            oid,
            parents: self.parents.clone(),
            timestamp: self.timestamp(),
        }
    }
}

impl Packable for Commit {
    fn serialize(&self) -> Result<Bytes> {
        let mut lines = vec![format!("tree {}", self.tree_oid.as_ref())];
        for parent in &self.parents {
            lines.push(format!("parent {}", parent.as_ref()));
        }
        lines.push(format!("author {}", self.author.display()));
        lines.push(String::new());
        lines.push(self.message.to_string());

        Ok(Bytes::from(lines.join("\n").into_bytes()))
    }
}

impl Unpackable for Commit {
    fn deserialize(mut reader: impl BufRead, _digest: DigestKind) -> Result<Self> {
        let mut content = Vec::new();
        reader.read_to_end(&mut content)?;
        let content = String::from_utf8(content)
            .map_err(|_| GritError::InvalidObject("non-utf8 commit content".to_string()))?;
        let mut lines = content.lines();

        let missing = |what: &str| GritError::InvalidObject(format!("commit missing {what} line"));

        let tree_line = lines.next().ok_or_else(|| missing("tree"))?;
        let tree_oid = tree_line
            .strip_prefix("tree ")
            .ok_or_else(|| missing("tree"))?;
        let tree_oid = ObjectId::try_parse(tree_oid)?;

        // Zero, one, or many parent lines
        let mut parents = Vec::new();
        let mut next_line = lines.next().ok_or_else(|| missing("author"))?;
        while let Some(parent_oid) = next_line.strip_prefix("parent ") {
            parents.push(ObjectId::try_parse(parent_oid)?);
            next_line = lines.next().ok_or_else(|| missing("author"))?;
        }

        let author = next_line
            .strip_prefix("author ")
            .ok_or_else(|| missing("author"))?;
        let author = Author::try_from(author)?;

        // skip the blank separator line
        lines.next();

        let message = lines.collect::<Vec<&str>>().join("\n");
        Ok(Self::new(parents, tree_oid, author, message))
    }
}

impl Object for Commit {
    fn object_type(&self) -> ObjectType {
        ObjectType::Commit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn oid(fill: char) -> ObjectId {
        ObjectId::try_parse(fill.to_string().repeat(40)).unwrap()
    }

    fn author_at(epoch: i64) -> Author {
        let timestamp = FixedOffset::east_opt(3600)
            .unwrap()
            .timestamp_opt(epoch, 0)
            .unwrap();
        Author::new("Ada Lovelace".to_string(), "ada@example.com".to_string(), timestamp)
    }

    #[test]
    fn round_trip_root_commit() {
        let commit = Commit::new(vec![], oid('a'), author_at(1_700_000_000), "init\n\nbody".into());
        let bytes = commit.serialize().unwrap();
        let back = Commit::deserialize(&bytes[..], DigestKind::Sha1).unwrap();
        assert_eq!(back, commit);
    }

    #[test]
    fn round_trip_merge_preserves_parent_order() {
        let commit = Commit::new(
            vec![oid('b'), oid('a'), oid('c')],
            oid('d'),
            author_at(1_700_000_000),
            "merge".into(),
        );
        let bytes = commit.serialize().unwrap();
        let back = Commit::deserialize(&bytes[..], DigestKind::Sha1).unwrap();
        assert_eq!(back.parents(), commit.parents());

        // Reordered parents are a different object with a different id
        let swapped = Commit::new(
            vec![oid('a'), oid('b'), oid('c')],
            oid('d'),
            author_at(1_700_000_000),
            "merge".into(),
        );
        assert_ne!(
            commit.object_id(DigestKind::Sha1).unwrap(),
            swapped.object_id(DigestKind::Sha1).unwrap()
        );
    }

    #[test]
    fn author_line_round_trips_offset() {
        let author = author_at(1_650_000_000);
        let parsed = Author::try_from(author.display().as_str()).unwrap();
        assert_eq!(parsed, author);
        assert_eq!(parsed.timestamp().offset(), author.timestamp().offset());
    }

    #[test]
    fn rejects_malformed_author_line() {
        assert!(Author::try_from("no email here 12345 +0000").is_err());
        assert!(Author::try_from("A <a@b.c> notanumber +0000").is_err());
        assert!(Author::try_from("A <a@b.c> 12345 nowhere").is_err());
    }

    #[test]
    fn changing_any_field_changes_id() {
        let base = Commit::new(vec![oid('a')], oid('b'), author_at(1_700_000_000), "msg".into());
        let other_parent = Commit::new(vec![oid('c')], oid('b'), author_at(1_700_000_000), "msg".into());
        let other_msg = Commit::new(vec![oid('a')], oid('b'), author_at(1_700_000_000), "msg2".into());

        let id = |c: &Commit| c.object_id(DigestKind::Sha1).unwrap();
        assert_ne!(id(&base), id(&other_parent));
        assert_ne!(id(&base), id(&other_msg));
    }
}
