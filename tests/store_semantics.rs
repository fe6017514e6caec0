mod common;

use assert_fs::TempDir;
use assert_fs::prelude::*;
use common::{author_at, commit_files, repository, store_flat_tree};
use grit::{DigestKind, EntryMode, GritError, ObjectBox, ObjectId, Repository, TreeEntry};
use predicates::prelude::*;
use pretty_assertions::assert_eq;
use rstest::rstest;

#[rstest]
fn storing_identical_content_twice_yields_one_object(repository: Repository) {
    let first = repository.store_blob(b"the same bytes").unwrap();
    let second = repository.store_blob(b"the same bytes").unwrap();
    assert_eq!(first, second);

    let stored: Vec<ObjectId> = repository
        .database()
        .enumerate()
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(stored.len(), 1);
}

#[rstest]
fn loaded_objects_equal_what_was_stored(repository: Repository) {
    let blob_oid = repository.store_blob(b"file body").unwrap();
    let tree_oid = store_flat_tree(&repository, &[("file", "file body")]);
    let commit_oid = repository
        .store_commit(tree_oid.clone(), vec![], author_at(0), "message")
        .unwrap();

    match repository.load_object(&blob_oid).unwrap() {
        ObjectBox::Blob(blob) => assert_eq!(&blob.content()[..], b"file body"),
        other => panic!("expected blob, got {}", other.object_type()),
    }
    match repository.load_object(&tree_oid).unwrap() {
        ObjectBox::Tree(tree) => {
            assert_eq!(tree.len(), 1);
            assert_eq!(tree.get("file").unwrap().oid, blob_oid);
        }
        other => panic!("expected tree, got {}", other.object_type()),
    }
    match repository.load_object(&commit_oid).unwrap() {
        ObjectBox::Commit(commit) => {
            assert_eq!(commit.tree_oid(), &tree_oid);
            assert_eq!(commit.message(), "message");
            assert_eq!(commit.author().name(), "Ada Lovelace");
        }
        other => panic!("expected commit, got {}", other.object_type()),
    }
}

#[rstest]
fn tree_hash_ignores_insertion_order(repository: Repository) {
    let blob = repository.store_blob(b"x").unwrap();
    let entry = || TreeEntry::new(EntryMode::Regular, blob.clone());

    let forward = repository
        .store_tree([
            ("alpha".to_string(), entry()),
            ("beta".to_string(), entry()),
            ("gamma".to_string(), entry()),
        ])
        .unwrap();
    let shuffled = repository
        .store_tree([
            ("gamma".to_string(), entry()),
            ("alpha".to_string(), entry()),
            ("beta".to_string(), entry()),
        ])
        .unwrap();

    assert_eq!(forward, shuffled);
}

#[rstest]
fn unknown_hash_is_not_found(repository: Repository) {
    let ghost = ObjectId::try_parse("0".repeat(40)).unwrap();
    assert!(matches!(
        repository.load_object(&ghost),
        Err(GritError::NotFound(_))
    ));
}

#[test]
fn disk_and_memory_repositories_agree_on_ids() {
    let dir = TempDir::new().unwrap();
    let on_disk = Repository::open(dir.path(), DigestKind::Sha1).unwrap();
    let in_memory = Repository::in_memory(DigestKind::Sha1);

    let disk_commit = commit_files(&on_disk, 0, vec![], &[("a", "1"), ("b", "2")], "c");
    let memory_commit = commit_files(&in_memory, 0, vec![], &[("a", "1"), ("b", "2")], "c");

    assert_eq!(disk_commit, memory_commit);
}

#[test]
fn disk_repository_persists_across_reopen() -> anyhow::Result<()> {
    let dir = TempDir::new()?;

    let commit = {
        let repository = Repository::open(dir.path(), DigestKind::Sha1)?;
        let commit = commit_files(&repository, 0, vec![], &[("f", "contents")], "persisted");
        repository.set_ref("refs/heads/main", &commit)?;
        commit
    };
    dir.child("objects").assert(predicate::path::is_dir());
    dir.child("refs/refs/heads/main").assert(predicate::path::is_file());

    let reopened = Repository::open(dir.path(), DigestKind::Sha1)?;
    assert_eq!(reopened.resolve_ref("refs/heads/main")?, commit);
    assert!(reopened.load_object(&commit).is_ok());

    Ok(())
}

#[test]
fn sha256_store_produces_wider_ids() {
    let repository = Repository::in_memory(DigestKind::Sha256);
    let oid = repository.store_blob(b"content").unwrap();
    assert_eq!(oid.as_ref().len(), 64);

    let narrow = Repository::in_memory(DigestKind::Sha1)
        .store_blob(b"content")
        .unwrap();
    assert_eq!(narrow.as_ref().len(), 40);
}

#[rstest]
fn prefix_resolution_finds_unambiguous_match(repository: Repository) {
    let oid = repository.store_blob(b"unique content").unwrap();
    let matches = repository.find_by_prefix(&oid.to_short_oid()).unwrap();
    assert_eq!(matches, vec![oid]);
}

#[rstest]
fn unreachable_objects_are_enumerable(repository: Repository) {
    let kept = commit_files(&repository, 0, vec![], &[("f", "keep me")], "kept");
    repository.set_ref("refs/heads/main", &kept).unwrap();

    let orphan = repository.store_blob(b"nobody points here").unwrap();

    assert_eq!(repository.unreachable_objects().unwrap(), vec![orphan]);
}

#[rstest]
fn tree_diff_reports_changed_paths(repository: Repository) {
    let old = store_flat_tree(&repository, &[("kept", "same"), ("edited", "v1")]);
    let new = store_flat_tree(
        &repository,
        &[("kept", "same"), ("edited", "v2"), ("fresh", "new")],
    );

    let changes = repository.tree_diff(Some(&old), Some(&new)).unwrap();
    let paths: Vec<String> = changes
        .keys()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();
    assert_eq!(paths, vec!["edited".to_string(), "fresh".to_string()]);
}
