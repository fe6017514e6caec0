mod common;

use assert_fs::TempDir;
use common::{commit_files, store_flat_tree};
use flate2::Compression;
use flate2::write::ZlibEncoder;
use grit::{DigestKind, Finding, ObjectId, Repository};
use pretty_assertions::assert_eq;
use std::io::Write;
use std::path::{Path, PathBuf};

fn object_file(root: &Path, oid: &ObjectId) -> PathBuf {
    root.join("objects").join(oid.to_path())
}

/// Overwrite a stored object file with a zlib-compressed envelope of
/// our choosing, simulating on-disk corruption.
fn overwrite_object(root: &Path, oid: &ObjectId, envelope: &[u8]) {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(envelope).unwrap();
    let compressed = encoder.finish().unwrap();
    std::fs::write(object_file(root, oid), compressed).unwrap();
}

#[test]
fn intact_repository_verifies_clean() {
    let dir = TempDir::new().unwrap();
    let repository = Repository::open(dir.path(), DigestKind::Sha1).unwrap();

    let c1 = commit_files(&repository, 0, vec![], &[("a", "1"), ("b", "2")], "one");
    let c2 = commit_files(&repository, 1, vec![c1], &[("a", "1"), ("b", "3")], "two");
    repository.set_ref("refs/heads/main", &c2).unwrap();

    let report = repository.verify_from_refs().unwrap();
    assert!(report.is_intact());
    assert!(report.scanned >= 6); // 2 commits, 2 trees, blobs
}

#[test]
fn flipping_stored_blob_bytes_is_detected_from_the_root() {
    let dir = TempDir::new().unwrap();
    let repository = Repository::open(dir.path(), DigestKind::Sha1).unwrap();

    let blob_oid = repository.store_blob(b"honest content").unwrap();
    let tree = store_flat_tree(&repository, &[("f", "honest content")]);
    let commit = repository
        .store_commit(tree, vec![], common::author_at(0), "c")
        .unwrap();

    // Same length, different bytes: the envelope still parses, the
    // digest no longer matches the key
    overwrite_object(dir.path(), &blob_oid, b"blob 14\0hacked content");

    let report = repository.verify(&[commit]).unwrap();
    assert_eq!(report.findings.len(), 1);
    match &report.findings[0] {
        Finding::Corruption { oid, .. } => assert_eq!(oid, &blob_oid),
        other => panic!("expected corruption finding, got {other:?}"),
    }
}

#[test]
fn deleting_a_stored_object_is_reported_missing() {
    let dir = TempDir::new().unwrap();
    let repository = Repository::open(dir.path(), DigestKind::Sha1).unwrap();

    let blob_oid = repository.store_blob(b"to be removed").unwrap();
    let tree = store_flat_tree(&repository, &[("f", "to be removed")]);
    let commit = repository
        .store_commit(tree.clone(), vec![], common::author_at(0), "c")
        .unwrap();

    std::fs::remove_file(object_file(dir.path(), &blob_oid)).unwrap();

    let report = repository.verify(&[commit]).unwrap();
    assert_eq!(report.findings.len(), 1);
    match &report.findings[0] {
        Finding::Missing { oid, referenced_by } => {
            assert_eq!(oid, &blob_oid);
            assert_eq!(referenced_by.as_ref(), Some(&tree));
        }
        other => panic!("expected missing finding, got {other:?}"),
    }
}

#[test]
fn garbled_envelope_is_a_corruption_finding() {
    let dir = TempDir::new().unwrap();
    let repository = Repository::open(dir.path(), DigestKind::Sha1).unwrap();

    let blob_oid = repository.store_blob(b"fine").unwrap();
    overwrite_object(dir.path(), &blob_oid, b"gibberish without a header");

    let report = repository.verify(&[blob_oid.clone()]).unwrap();
    assert!(
        report
            .findings
            .iter()
            .any(|f| matches!(f, Finding::Corruption { oid, .. } if oid == &blob_oid))
    );
}

#[test]
fn one_corrupt_object_does_not_hide_another() {
    let dir = TempDir::new().unwrap();
    let repository = Repository::open(dir.path(), DigestKind::Sha1).unwrap();

    let blob_a = repository.store_blob(b"first").unwrap();
    let blob_b = repository.store_blob(b"second").unwrap();
    let tree = store_flat_tree(&repository, &[("a", "first"), ("b", "second")]);

    overwrite_object(dir.path(), &blob_a, b"blob 5\0wrong");
    overwrite_object(dir.path(), &blob_b, b"blob 6\0wrong2");

    let report = repository.verify(&[tree]).unwrap();
    assert_eq!(report.findings.len(), 2);
}
