#![allow(dead_code)]

use chrono::{DateTime, FixedOffset, TimeZone};
use grit::{Author, DigestKind, EntryMode, ObjectId, Repository, TreeEntry};
use rstest::fixture;

/// 2022-01-01T00:00:00Z; commit timestamps count hours from here.
pub const EPOCH: i64 = 1_640_995_200;

pub fn timestamp_at(hours: i64) -> DateTime<FixedOffset> {
    FixedOffset::east_opt(0)
        .unwrap()
        .timestamp_opt(EPOCH + hours * 3600, 0)
        .unwrap()
}

pub fn author_at(hours: i64) -> Author {
    Author::new(
        "Ada Lovelace".to_string(),
        "ada@example.com".to_string(),
        timestamp_at(hours),
    )
}

#[fixture]
pub fn repository() -> Repository {
    Repository::in_memory(DigestKind::Sha1)
}

/// Store a one-level tree of regular files.
pub fn store_flat_tree(repository: &Repository, files: &[(&str, &str)]) -> ObjectId {
    let entries: Vec<(String, TreeEntry)> = files
        .iter()
        .map(|(name, content)| {
            let oid = repository.store_blob(content.as_bytes()).unwrap();
            (name.to_string(), TreeEntry::new(EntryMode::Regular, oid))
        })
        .collect();
    repository.store_tree(entries).unwrap()
}

/// Commit a flat snapshot at `hours` past the fixture epoch.
pub fn commit_files(
    repository: &Repository,
    hours: i64,
    parents: Vec<ObjectId>,
    files: &[(&str, &str)],
    message: &str,
) -> ObjectId {
    let tree = store_flat_tree(repository, files);
    repository
        .store_commit(tree, parents, author_at(hours), message)
        .unwrap()
}
