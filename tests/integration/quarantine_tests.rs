use refdupe::actions::QuarantineAction;
use refdupe::duplicates::{DuplicateFinder, RunSummary};
use refdupe::index::DiskIndex;
use refdupe::output::{MemorySink, ScanEvent};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn quarantine(reference: &Path, candidates: &Path, root: &Path) -> (RunSummary, MemorySink) {
    let finder = DuplicateFinder::with_defaults();
    let mut index = DiskIndex::create().unwrap();
    let mut action = QuarantineAction::new(root);
    let mut sink = MemorySink::new();
    let summary = finder
        .find_duplicates(reference, candidates, &mut index, &mut action, &mut sink)
        .unwrap();
    (summary, sink)
}

#[test]
fn test_duplicate_is_moved_and_original_untouched() {
    let dir = tempdir().unwrap();
    let (reference, candidates, q) = (
        dir.path().join("ref"),
        dir.path().join("cand"),
        dir.path().join("q"),
    );
    fs::create_dir_all(&reference).unwrap();
    fs::create_dir_all(&candidates).unwrap();
    fs::write(reference.join("a.txt"), "x").unwrap();
    fs::write(candidates.join("b.txt"), "x").unwrap();
    fs::write(candidates.join("keep.txt"), "y").unwrap();

    let (summary, sink) = quarantine(&reference, &candidates, &q);

    assert_eq!(fs::read_to_string(q.join("b.txt")).unwrap(), "x");
    assert!(!candidates.join("b.txt").exists());
    assert!(candidates.join("keep.txt").exists());
    assert_eq!(fs::read_to_string(reference.join("a.txt")).unwrap(), "x");
    assert_eq!(summary.files_moved, 1);
    assert_eq!(
        sink.events,
        vec![
            ScanEvent::Duplicate {
                original: reference.join("a.txt"),
                candidate: candidates.join("b.txt"),
            },
            ScanEvent::Moved {
                candidate: candidates.join("b.txt"),
                destination: q.join("b.txt"),
            },
        ]
    );
}

#[test]
fn test_relative_layout_is_preserved() {
    let dir = tempdir().unwrap();
    let (reference, candidates, q) = (
        dir.path().join("ref"),
        dir.path().join("cand"),
        dir.path().join("q"),
    );
    fs::create_dir_all(&reference).unwrap();
    fs::create_dir_all(candidates.join("2023").join("june")).unwrap();
    fs::create_dir_all(candidates.join("2024")).unwrap();
    fs::write(reference.join("img.jpg"), "pixels").unwrap();
    fs::write(candidates.join("2023").join("june").join("img.jpg"), "pixels").unwrap();
    fs::write(candidates.join("2024").join("img.jpg"), "pixels").unwrap();

    let (summary, sink) = quarantine(&reference, &candidates, &q);

    assert_eq!(summary.files_moved, 2);
    assert!(q.join("2023").join("june").join("img.jpg").is_file());
    assert!(q.join("2024").join("img.jpg").is_file());
    assert!(sink.errors().is_empty());
}

#[test]
fn test_existing_target_is_not_overwritten() {
    let dir = tempdir().unwrap();
    let (reference, candidates, q) = (
        dir.path().join("ref"),
        dir.path().join("cand"),
        dir.path().join("q"),
    );
    fs::create_dir_all(&reference).unwrap();
    fs::create_dir_all(&candidates).unwrap();
    fs::create_dir_all(&q).unwrap();
    fs::write(reference.join("a.txt"), "x").unwrap();
    fs::write(candidates.join("b.txt"), "x").unwrap();
    fs::write(candidates.join("c.txt"), "x").unwrap();
    fs::write(q.join("b.txt"), "earlier run").unwrap();

    let (summary, sink) = quarantine(&reference, &candidates, &q);

    // b.txt stays put; the run continues with c.txt.
    assert_eq!(fs::read_to_string(q.join("b.txt")).unwrap(), "earlier run");
    assert!(candidates.join("b.txt").exists());
    assert!(q.join("c.txt").is_file());
    assert_eq!(summary.duplicates_found, 2);
    assert_eq!(summary.files_moved, 1);
    assert_eq!(summary.move_failures, 1);
    assert!(matches!(
        sink.errors().as_slice(),
        [ScanEvent::MoveFailed { .. }]
    ));
}

#[test]
fn test_multi_match_moves_once() {
    let dir = tempdir().unwrap();
    let (reference, candidates, q) = (
        dir.path().join("ref"),
        dir.path().join("cand"),
        dir.path().join("q"),
    );
    fs::create_dir_all(&reference).unwrap();
    fs::create_dir_all(&candidates).unwrap();
    fs::write(reference.join("a1"), "x").unwrap();
    fs::write(reference.join("a2"), "x").unwrap();
    fs::write(candidates.join("b"), "x").unwrap();

    let (summary, sink) = quarantine(&reference, &candidates, &q);

    assert_eq!(summary.duplicates_found, 2);
    assert_eq!(summary.files_moved, 1);
    assert_eq!(summary.move_failures, 0);
    assert_eq!(sink.duplicates().len(), 2);
    assert!(q.join("b").is_file());
}

#[test]
fn test_same_tree_quarantine_keeps_one_copy() {
    let dir = tempdir().unwrap();
    let tree = dir.path().join("tree");
    let q = dir.path().join("q");
    fs::create_dir_all(&tree).unwrap();
    for name in ["a", "b", "c"] {
        fs::write(tree.join(name), "x").unwrap();
    }

    let (summary, _) = quarantine(&tree, &tree, &q);

    assert_eq!(summary.files_moved, 2);
    let left: Vec<_> = fs::read_dir(&tree).unwrap().collect();
    assert_eq!(left.len(), 1);
    assert!(tree.join("c").exists());
    assert!(q.join("a").is_file());
    assert!(q.join("b").is_file());
}

#[cfg(unix)]
#[test]
fn test_symlinked_candidate_root_never_moves_the_only_copy() {
    let dir = tempdir().unwrap();
    let tree = dir.path().join("tree");
    let alias = dir.path().join("alias");
    let q = dir.path().join("q");
    fs::create_dir_all(&tree).unwrap();
    std::os::unix::fs::symlink(&tree, &alias).unwrap();
    fs::write(tree.join("only.txt"), "unique").unwrap();

    let (summary, _) = quarantine(&tree, &alias, &q);

    assert!(summary.same_tree);
    assert_eq!(summary.files_moved, 0);
    assert!(tree.join("only.txt").is_file());
    assert!(!q.exists());
}
