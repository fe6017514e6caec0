mod common;

use common::{commit_files, repository};
use grit::{GritError, Repository};
use pretty_assertions::assert_eq;
use rstest::rstest;

#[rstest]
fn branch_pointers_must_target_commits(repository: Repository) {
    let blob = repository.store_blob(b"not a commit").unwrap();
    assert!(matches!(
        repository.set_ref("refs/heads/main", &blob),
        Err(GritError::CorruptGraph { .. })
    ));

    let commit = commit_files(&repository, 0, vec![], &[("f", "1")], "c");
    repository.set_ref("refs/heads/main", &commit).unwrap();
    assert_eq!(repository.resolve_ref("refs/heads/main").unwrap(), commit);
}

#[rstest]
fn head_follows_the_branch_it_points_at(repository: Repository) {
    let c1 = commit_files(&repository, 0, vec![], &[("f", "1")], "one");
    let c2 = commit_files(&repository, 1, vec![c1.clone()], &[("f", "2")], "two");

    repository.set_ref("refs/heads/main", &c1).unwrap();
    repository.set_symbolic_ref("HEAD", "refs/heads/main").unwrap();
    assert_eq!(repository.resolve_ref("HEAD").unwrap(), c1);

    // Advancing through HEAD moves the branch, not HEAD itself
    repository
        .compare_and_set_ref("HEAD", Some(&c1), &c2)
        .unwrap();
    assert_eq!(repository.resolve_ref("refs/heads/main").unwrap(), c2);
    assert_eq!(repository.resolve_ref("HEAD").unwrap(), c2);
}

#[rstest]
fn stale_compare_and_set_fails_and_changes_nothing(repository: Repository) {
    let c1 = commit_files(&repository, 0, vec![], &[("f", "1")], "one");
    let c2 = commit_files(&repository, 1, vec![c1.clone()], &[("f", "2")], "two");
    let c3 = commit_files(&repository, 2, vec![c2.clone()], &[("f", "3")], "three");

    repository.set_ref("refs/heads/main", &c2).unwrap();

    // A competing writer already advanced the branch past c1
    let result = repository.compare_and_set_ref("refs/heads/main", Some(&c1), &c3);
    match result {
        Err(GritError::ReferenceChanged { actual, .. }) => {
            assert_eq!(actual, Some(c2.clone()));
        }
        other => panic!("expected ReferenceChanged, got {other:?}"),
    }
    assert_eq!(repository.resolve_ref("refs/heads/main").unwrap(), c2);

    // Retry with the fresh value succeeds
    repository
        .compare_and_set_ref("refs/heads/main", Some(&c2), &c3)
        .unwrap();
    assert_eq!(repository.resolve_ref("refs/heads/main").unwrap(), c3);
}

#[rstest]
fn listing_and_deleting_references(repository: Repository) {
    let commit = commit_files(&repository, 0, vec![], &[("f", "1")], "c");
    repository.set_ref("refs/heads/main", &commit).unwrap();
    repository.set_ref("refs/tags/v1", &commit).unwrap();

    assert_eq!(
        repository.list_refs().unwrap(),
        vec!["refs/heads/main".to_string(), "refs/tags/v1".to_string()]
    );

    let reverse = repository.reverse_refs().unwrap();
    let mut names = reverse.get(&commit).unwrap().clone();
    names.sort();
    assert_eq!(names, vec!["refs/heads/main", "refs/tags/v1"]);

    repository.delete_ref("refs/tags/v1").unwrap();
    assert_eq!(repository.list_refs().unwrap(), vec!["refs/heads/main".to_string()]);
    assert!(matches!(
        repository.resolve_ref("refs/tags/v1"),
        Err(GritError::RefNotFound(_))
    ));
}

#[rstest]
fn symbolic_cycles_are_rejected(repository: Repository) {
    repository.set_symbolic_ref("one", "two").unwrap();
    repository.set_symbolic_ref("two", "three").unwrap();
    assert!(matches!(
        repository.set_symbolic_ref("three", "one"),
        Err(GritError::CyclicReference(_))
    ));
}

#[rstest]
fn invalid_reference_names_are_rejected(repository: Repository) {
    let commit = commit_files(&repository, 0, vec![], &[("f", "1")], "c");

    for name in [".hidden", "branch.lock", "a..b", "has space", "refs//double"] {
        assert!(
            matches!(
                repository.set_ref(name, &commit),
                Err(GritError::InvalidRefName(_))
            ),
            "{name} should be rejected"
        );
    }
}
