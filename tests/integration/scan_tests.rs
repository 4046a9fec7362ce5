use refdupe::actions::ReportAction;
use refdupe::duplicates::{DuplicateFinder, FinderConfig, RunSummary};
use refdupe::index::{DiskIndex, MemoryIndex};
use refdupe::output::{MemorySink, OutputFormat, WriterSink};
use refdupe::scanner::{HashAlgorithm, WalkerConfig};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

fn trees() -> (TempDir, PathBuf, PathBuf) {
    let dir = tempdir().unwrap();
    let reference = dir.path().join("ref");
    let candidates = dir.path().join("cand");
    fs::create_dir_all(&reference).unwrap();
    fs::create_dir_all(&candidates).unwrap();
    (dir, reference, candidates)
}

fn run(config: FinderConfig, reference: &Path, candidates: &Path) -> (RunSummary, MemorySink) {
    let finder = DuplicateFinder::new(config);
    let scratch = tempdir().unwrap();
    let mut index = DiskIndex::create_in(scratch.path()).unwrap();
    let mut sink = MemorySink::new();
    let summary = finder
        .find_duplicates(reference, candidates, &mut index, &mut ReportAction, &mut sink)
        .unwrap();
    (summary, sink)
}

#[test]
fn test_identical_file_is_reported() {
    let (_dir, reference, candidates) = trees();
    fs::write(reference.join("a.txt"), "x").unwrap();
    fs::write(candidates.join("b.txt"), "x").unwrap();

    let (summary, sink) = run(FinderConfig::default(), &reference, &candidates);

    assert_eq!(
        sink.duplicates(),
        vec![(reference.join("a.txt"), candidates.join("b.txt"))]
    );
    assert_eq!(summary.reference_files, 1);
    assert_eq!(summary.candidate_files, 1);
    assert_eq!(summary.duplicates_found, 1);
    assert!(!summary.same_tree);
}

#[test]
fn test_text_line_names_both_files() {
    let (_dir, reference, candidates) = trees();
    fs::write(reference.join("a.txt"), "x").unwrap();
    fs::write(candidates.join("b.txt"), "x").unwrap();

    let finder = DuplicateFinder::with_defaults();
    let mut index = MemoryIndex::new();
    let mut sink = WriterSink::new(Vec::new(), OutputFormat::Text);
    finder
        .find_duplicates(&reference, &candidates, &mut index, &mut ReportAction, &mut sink)
        .unwrap();

    let log = String::from_utf8(sink.into_inner()).unwrap();
    assert_eq!(
        log,
        format!(
            "{} is duplicate of {}\n",
            candidates.join("b.txt").display(),
            reference.join("a.txt").display()
        )
    );
}

#[test]
fn test_json_lines_are_tagged() {
    let (_dir, reference, candidates) = trees();
    fs::write(reference.join("a.txt"), "x").unwrap();
    fs::write(candidates.join("b.txt"), "x").unwrap();

    let finder = DuplicateFinder::with_defaults();
    let mut index = MemoryIndex::new();
    let mut sink = WriterSink::new(Vec::new(), OutputFormat::Json);
    finder
        .find_duplicates(&reference, &candidates, &mut index, &mut ReportAction, &mut sink)
        .unwrap();

    let log = String::from_utf8(sink.into_inner()).unwrap();
    let value: serde_json::Value = serde_json::from_str(log.trim()).unwrap();
    assert_eq!(value["event"], "duplicate");
    assert_eq!(
        value["candidate"],
        candidates.join("b.txt").to_string_lossy().as_ref()
    );
}

#[test]
fn test_different_content_is_not_reported() {
    let (_dir, reference, candidates) = trees();
    fs::write(reference.join("a.txt"), "x").unwrap();
    fs::write(candidates.join("b.txt"), "y").unwrap();

    let (summary, sink) = run(FinderConfig::default(), &reference, &candidates);

    assert!(sink.events.is_empty());
    assert_eq!(summary.duplicates_found, 0);
    assert_eq!(summary.candidate_files, 1);
}

#[test]
fn test_every_matching_reference_is_reported() {
    let (_dir, reference, candidates) = trees();
    fs::create_dir_all(reference.join("2024")).unwrap();
    fs::write(reference.join("one.jpg"), "photo").unwrap();
    fs::write(reference.join("2024").join("two.jpg"), "photo").unwrap();
    fs::write(reference.join("three.jpg"), "photo").unwrap();
    fs::write(reference.join("other.jpg"), "other").unwrap();
    fs::write(candidates.join("import.jpg"), "photo").unwrap();

    let (summary, sink) = run(FinderConfig::default(), &reference, &candidates);

    // Index order is the sorted walk order of the reference tree.
    let originals: Vec<_> = sink.duplicates().into_iter().map(|(o, _)| o).collect();
    assert_eq!(
        originals,
        vec![
            reference.join("2024").join("two.jpg"),
            reference.join("one.jpg"),
            reference.join("three.jpg"),
        ]
    );
    assert_eq!(summary.duplicates_found, 3);
}

#[test]
fn test_empty_files_match_each_other() {
    let (_dir, reference, candidates) = trees();
    fs::write(reference.join("empty"), "").unwrap();
    fs::write(candidates.join("also-empty"), "").unwrap();

    let (summary, _) = run(FinderConfig::default(), &reference, &candidates);
    assert_eq!(summary.duplicates_found, 1);
}

#[test]
fn test_min_size_excludes_small_files() {
    let (_dir, reference, candidates) = trees();
    fs::write(reference.join("small"), "x").unwrap();
    fs::write(candidates.join("small"), "x").unwrap();
    fs::write(reference.join("big"), "x".repeat(100)).unwrap();
    fs::write(candidates.join("big"), "x".repeat(100)).unwrap();

    let config =
        FinderConfig::default().with_walker_config(WalkerConfig::new(false, false, Some(10)));
    let (summary, sink) = run(config, &reference, &candidates);

    assert_eq!(summary.reference_files, 1);
    assert_eq!(
        sink.duplicates(),
        vec![(reference.join("big"), candidates.join("big"))]
    );
}

#[test]
fn test_nested_candidate_root_never_matches_itself() {
    let dir = tempdir().unwrap();
    let reference = dir.path().to_path_buf();
    let candidates = reference.join("inbox");
    fs::create_dir_all(&candidates).unwrap();
    fs::write(reference.join("keep.txt"), "same").unwrap();
    fs::write(candidates.join("copy.txt"), "same").unwrap();

    let (summary, sink) = run(FinderConfig::default(), &reference, &candidates);

    // The candidate is also indexed as a reference file but is skipped by path.
    assert!(!summary.same_tree);
    assert_eq!(
        sink.duplicates(),
        vec![(reference.join("keep.txt"), candidates.join("copy.txt"))]
    );
}

#[test]
fn test_detection_is_repeatable() {
    let (_dir, reference, candidates) = trees();
    for i in 0..5 {
        fs::write(reference.join(format!("r{i}")), format!("{}", i % 3)).unwrap();
        fs::write(candidates.join(format!("c{i}")), format!("{}", i % 2)).unwrap();
    }

    let (first, first_sink) = run(FinderConfig::default(), &reference, &candidates);
    let (second, second_sink) = run(FinderConfig::default(), &reference, &candidates);

    assert_eq!(first_sink.duplicates(), second_sink.duplicates());
    assert_eq!(first.duplicates_found, second.duplicates_found);
}

#[test]
fn test_prefilter_does_not_change_results() {
    let (_dir, reference, candidates) = trees();
    for i in 0..50 {
        fs::write(reference.join(format!("r{i:02}")), format!("{}", i % 7)).unwrap();
        fs::write(candidates.join(format!("c{i:02}")), format!("{}", i % 11)).unwrap();
    }

    let (with, with_sink) = run(FinderConfig::default(), &reference, &candidates);
    let (without, without_sink) = run(
        FinderConfig::default().with_prefilter(false),
        &reference,
        &candidates,
    );

    assert_eq!(with_sink.duplicates(), without_sink.duplicates());
    assert_eq!(with.duplicates_found, without.duplicates_found);
    assert!(with.prefilter_rejections > 0);
    assert_eq!(without.prefilter_rejections, 0);
}

#[test]
fn test_sha256_finds_the_same_pairs() {
    let (_dir, reference, candidates) = trees();
    fs::write(reference.join("a"), "alpha").unwrap();
    fs::write(candidates.join("b"), "alpha").unwrap();
    fs::write(candidates.join("c"), "gamma").unwrap();

    let (blake, blake_sink) = run(FinderConfig::default(), &reference, &candidates);
    let (sha, sha_sink) = run(
        FinderConfig::default().with_algorithm(HashAlgorithm::Sha256),
        &reference,
        &candidates,
    );

    assert_eq!(blake_sink.duplicates(), sha_sink.duplicates());
    assert_eq!(blake.bytes_hashed, sha.bytes_hashed);
}

#[test]
fn test_empty_trees() {
    let (_dir, reference, candidates) = trees();
    let (summary, sink) = run(FinderConfig::default(), &reference, &candidates);

    assert!(sink.events.is_empty());
    assert_eq!(summary.reference_files, 0);
    assert_eq!(summary.candidate_files, 0);
}
