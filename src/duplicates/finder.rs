//! Reference-versus-candidate duplicate finder.
//!
//! # Overview
//!
//! A run has two strictly sequential phases:
//! 1. **Indexing**: walk the reference tree once, hash every file and append
//!    one [`FileRecord`] per file to a [`RecordIndex`].
//! 2. **Matching**: walk the candidate tree once. For each candidate, hash it
//!    and rescan the whole index from the start, acting on every record with
//!    the same digest and a different path.
//!
//! When both roots are the same directory (same-tree mode), each candidate
//! acts on at most one match, and a record whose file has already been acted
//! upon as a candidate is no longer eligible. Without this a tree of `n`
//! identical files would report every file as a duplicate of every other.
//!
//! An optional Bloom filter over the reference digests lets candidates whose
//! digest is certainly absent skip the index scan. It has no false negatives,
//! so it never changes which pairs are found.
//!
//! # Example
//!
//! ```no_run
//! use refdupe::actions::ReportAction;
//! use refdupe::duplicates::DuplicateFinder;
//! use refdupe::index::DiskIndex;
//! use refdupe::output::MemorySink;
//! use std::path::Path;
//!
//! let finder = DuplicateFinder::with_defaults();
//! let mut index = DiskIndex::create().unwrap();
//! let mut sink = MemorySink::new();
//!
//! let summary = finder
//!     .find_duplicates(
//!         Path::new("/photos/originals"),
//!         Path::new("/photos/imports"),
//!         &mut index,
//!         &mut ReportAction,
//!         &mut sink,
//!     )
//!     .unwrap();
//! println!("{} duplicates", summary.duplicates_found);
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use growable_bloom_filter::GrowableBloom;

use crate::actions::{ActionOutcome, DuplicateAction};
use crate::index::{FileRecord, IndexError, RecordIndex};
use crate::output::{EventSink, ScanEvent};
use crate::progress::{ProgressCallback, PHASE_INDEXING, PHASE_MATCHING};
use crate::scanner::{
    ContentHasher, HashAlgorithm, ScanError, WalkedFile, Walker, WalkerConfig,
};

/// Expected number of reference files used to size the first Bloom segment.
const PREFILTER_INITIAL_CAPACITY: usize = 10_000;

/// Configuration for a run.
#[derive(Clone)]
pub struct FinderConfig {
    /// Directory walking options, applied to both trees.
    pub walker_config: WalkerConfig,
    /// Digest algorithm.
    pub algorithm: HashAlgorithm,
    /// Skip the index scan for candidates whose digest is certainly absent.
    pub prefilter: bool,
    /// False positive rate of the prefilter.
    pub bloom_fp_rate: f64,
    /// Optional shutdown flag for graceful termination.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for FinderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinderConfig")
            .field("walker_config", &self.walker_config)
            .field("algorithm", &self.algorithm)
            .field("prefilter", &self.prefilter)
            .field("bloom_fp_rate", &self.bloom_fp_rate)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            walker_config: WalkerConfig::default(),
            algorithm: HashAlgorithm::default(),
            prefilter: true,
            bloom_fp_rate: 0.01,
            shutdown_flag: None,
            progress_callback: None,
        }
    }
}

impl FinderConfig {
    /// Set the walker configuration.
    #[must_use]
    pub fn with_walker_config(mut self, config: WalkerConfig) -> Self {
        self.walker_config = config;
        self
    }

    /// Set the digest algorithm.
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Enable or disable the digest prefilter.
    #[must_use]
    pub fn with_prefilter(mut self, enabled: bool) -> Self {
        self.prefilter = enabled;
        self
    }

    /// Set the prefilter false positive rate.
    #[must_use]
    pub fn with_bloom_fp_rate(mut self, rate: f64) -> Self {
        self.bloom_fp_rate = rate.clamp(0.0001, 0.1);
        self
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

/// Statistics from a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Whether both roots were the same directory
    pub same_tree: bool,
    /// Reference files written to the index
    pub reference_files: usize,
    /// Candidate files hashed and matched
    pub candidate_files: usize,
    /// Files (either tree) that could not be hashed
    pub unhashable_files: usize,
    /// Entries or subtrees skipped during traversal
    pub skipped_entries: usize,
    /// Reference records that could not be written
    pub index_write_failures: usize,
    /// Distinct index lines that failed to decode
    pub skipped_records: usize,
    /// Candidates that skipped the index scan thanks to the prefilter
    pub prefilter_rejections: usize,
    /// Duplicate pairs acted upon
    pub duplicates_found: usize,
    /// Candidates moved into quarantine
    pub files_moved: usize,
    /// Quarantine moves that failed
    pub move_failures: usize,
    /// Total bytes hashed across both trees
    pub bytes_hashed: u64,
    /// Wall-clock duration of the run
    pub duration: Duration,
}

impl RunSummary {
    /// Number of per-file problems reported during the run.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.unhashable_files
            + self.skipped_entries
            + self.index_write_failures
            + self.skipped_records
            + self.move_failures
    }

    /// Bytes hashed as a human-readable string.
    #[must_use]
    pub fn bytes_hashed_display(&self) -> String {
        bytesize::ByteSize(self.bytes_hashed).to_string()
    }

    fn record_outcome(&mut self, outcome: &ActionOutcome) {
        self.duplicates_found += 1;
        match outcome {
            ActionOutcome::Reported => {}
            ActionOutcome::Moved(_) => self.files_moved += 1,
            ActionOutcome::MoveFailed => self.move_failures += 1,
        }
    }
}

/// What happened to one candidate file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateOutcome {
    /// The file could not be hashed; it was not matched.
    Unhashable,
    /// The index was scanned to the end without a match.
    Exhausted,
    /// This many matches were acted upon.
    Matched(usize),
    /// The index could not be read; matching stopped early.
    IndexUnreadable,
}

/// Run-scoped matching state.
///
/// Holds the same-tree flag and the set of candidate paths already acted
/// upon, which in same-tree mode are no longer eligible as originals.
#[derive(Debug, Default)]
pub struct MatchState {
    same_tree: bool,
    matched: HashSet<PathBuf>,
    reported_lines: HashSet<usize>,
}

impl MatchState {
    /// Create state for a run.
    #[must_use]
    pub fn new(same_tree: bool) -> Self {
        Self {
            same_tree,
            ..Default::default()
        }
    }

    /// Whether `path` has already been acted upon as a candidate.
    #[must_use]
    pub fn is_matched(&self, path: &Path) -> bool {
        self.matched.contains(path)
    }

    /// Number of candidates marked as matched.
    #[must_use]
    pub fn matched_count(&self) -> usize {
        self.matched.len()
    }
}

/// Match one hashed candidate against the whole index.
///
/// Records are visited in insertion order. A record is skipped when it is the
/// candidate itself, when its digest differs, or (same-tree mode) when its
/// file was already acted upon as a candidate. Every other record is a match
/// and is handed to `action`. In same-tree mode the first match ends the scan
/// and marks the candidate; otherwise scanning continues to the end.
pub fn match_candidate<I>(
    candidate: &FileRecord,
    index: &mut I,
    state: &mut MatchState,
    action: &mut dyn DuplicateAction,
    sink: &mut dyn EventSink,
    summary: &mut RunSummary,
) -> CandidateOutcome
where
    I: RecordIndex + ?Sized,
{
    let records = match index.scan_all() {
        Ok(records) => records,
        Err(e) => {
            log::warn!("Unable to rewind index: {}", e);
            sink.emit(ScanEvent::IndexUnreadable {
                candidate: candidate.path.clone(),
                reason: e.to_string(),
            });
            return CandidateOutcome::IndexUnreadable;
        }
    };

    let mut matches = 0;
    for item in records {
        let original = match item {
            Ok(record) => record,
            Err(IndexError::Decode { line, source }) => {
                log::debug!("Skipping index line {}: {}", line, source);
                if state.reported_lines.insert(line) {
                    summary.skipped_records += 1;
                    sink.emit(ScanEvent::RecordSkipped {
                        line,
                        reason: source.to_string(),
                    });
                }
                continue;
            }
            Err(e) => {
                log::warn!("Unable to scan index: {}", e);
                sink.emit(ScanEvent::IndexUnreadable {
                    candidate: candidate.path.clone(),
                    reason: e.to_string(),
                });
                return CandidateOutcome::IndexUnreadable;
            }
        };

        if original.path == candidate.path {
            continue;
        }
        if original.digest != candidate.digest {
            continue;
        }
        if state.same_tree && state.is_matched(&original.path) {
            continue;
        }

        matches += 1;
        let outcome = action.apply(&original, candidate, sink);
        summary.record_outcome(&outcome);

        if state.same_tree {
            state.matched.insert(candidate.path.clone());
            break;
        }
    }

    if matches == 0 {
        CandidateOutcome::Exhausted
    } else {
        CandidateOutcome::Matched(matches)
    }
}

/// Errors that stop a run.
#[derive(thiserror::Error, Debug)]
pub enum FinderError {
    /// The run was interrupted by user (Ctrl+C or shutdown signal).
    #[error("Scan interrupted by user")]
    Interrupted,

    /// A root path could not be resolved.
    #[error("Invalid root {path}: {source}")]
    InvalidRoot {
        /// The root as given
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A root could not be enumerated at all.
    #[error(transparent)]
    Scan(#[from] ScanError),
}

/// Orchestrates the indexing and matching phases.
pub struct DuplicateFinder {
    config: FinderConfig,
    hasher: Box<dyn ContentHasher>,
}

impl DuplicateFinder {
    /// Create a finder with the configured digest algorithm.
    #[must_use]
    pub fn new(config: FinderConfig) -> Self {
        let hasher = config.algorithm.hasher();
        Self { config, hasher }
    }

    /// Create a finder with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(FinderConfig::default())
    }

    /// Create a finder with a custom digest function.
    #[must_use]
    pub fn with_hasher(config: FinderConfig, hasher: Box<dyn ContentHasher>) -> Self {
        Self { config, hasher }
    }

    /// Find files under `candidate_root` that duplicate files under
    /// `reference_root`, acting on each pair with `action`.
    ///
    /// `index` must be empty; it is filled from the reference tree and then
    /// scanned once per candidate file.
    ///
    /// # Errors
    ///
    /// Returns [`FinderError`] if a root cannot be resolved or enumerated, or
    /// if the run is interrupted. Per-file problems are reported to `sink`
    /// and counted in the summary instead.
    pub fn find_duplicates<I>(
        &self,
        reference_root: &Path,
        candidate_root: &Path,
        index: &mut I,
        action: &mut dyn DuplicateAction,
        sink: &mut dyn EventSink,
    ) -> Result<RunSummary, FinderError>
    where
        I: RecordIndex + ?Sized,
    {
        let start_time = Instant::now();
        let reference_root = canonical_root(reference_root)?;
        let candidate_root = canonical_root(candidate_root)?;
        let same_tree = reference_root == candidate_root;

        let mut summary = RunSummary {
            same_tree,
            ..Default::default()
        };

        if same_tree {
            log::info!(
                "Comparing {} with itself (same-tree mode)",
                reference_root.display()
            );
        } else {
            log::info!(
                "Comparing {} against reference {}",
                candidate_root.display(),
                reference_root.display()
            );
        }

        let prefilter = self.build_index(&reference_root, index, sink, &mut summary)?;

        let mut state = MatchState::new(same_tree);
        self.match_tree(
            &candidate_root,
            index,
            prefilter.as_ref(),
            &mut state,
            action,
            sink,
            &mut summary,
        )?;

        summary.duration = start_time.elapsed();
        log::info!(
            "Indexed {} reference files, matched {} candidates: {} duplicates ({} moved, {} failed moves), {} hashed in {:.2?}",
            summary.reference_files,
            summary.candidate_files,
            summary.duplicates_found,
            summary.files_moved,
            summary.move_failures,
            summary.bytes_hashed_display(),
            summary.duration,
        );
        if summary.error_count() > 0 {
            log::warn!("{} per-file problems were reported", summary.error_count());
        }

        Ok(summary)
    }

    /// Phase 1: walk the reference tree and fill the index.
    fn build_index<I>(
        &self,
        root: &Path,
        index: &mut I,
        sink: &mut dyn EventSink,
        summary: &mut RunSummary,
    ) -> Result<Option<GrowableBloom>, FinderError>
    where
        I: RecordIndex + ?Sized,
    {
        let mut prefilter = self
            .config
            .prefilter
            .then(|| GrowableBloom::new(self.config.bloom_fp_rate, PREFILTER_INITIAL_CAPACITY));

        self.for_each_hashed(root, PHASE_INDEXING, sink, summary, |record, sink, summary| {
            if let Err(e) = index.append(&record) {
                log::debug!("Unable to write index record for {}: {}", record.path.display(), e);
                summary.index_write_failures += 1;
                sink.emit(ScanEvent::IndexWriteFailed {
                    path: record.path,
                    reason: e.to_string(),
                });
                return;
            }
            if let Some(ref mut bloom) = prefilter {
                bloom.insert(record.digest.as_str());
            }
            summary.reference_files += 1;
        })?;

        log::debug!("Index built with {} records", index.len());
        Ok(prefilter)
    }

    /// Phase 2: walk the candidate tree and match every file.
    #[allow(clippy::too_many_arguments)]
    fn match_tree<I>(
        &self,
        root: &Path,
        index: &mut I,
        prefilter: Option<&GrowableBloom>,
        state: &mut MatchState,
        action: &mut dyn DuplicateAction,
        sink: &mut dyn EventSink,
        summary: &mut RunSummary,
    ) -> Result<(), FinderError>
    where
        I: RecordIndex + ?Sized,
    {
        self.for_each_hashed(root, PHASE_MATCHING, sink, summary, |candidate, sink, summary| {
            summary.candidate_files += 1;

            if prefilter.is_some_and(|bloom| !bloom.contains(candidate.digest.as_str())) {
                summary.prefilter_rejections += 1;
                log::trace!("Prefilter rejected {}", candidate.path.display());
                return;
            }

            let outcome = match_candidate(
                &candidate,
                &mut *index,
                &mut *state,
                &mut *action,
                sink,
                summary,
            );
            log::trace!("{}: {:?}", candidate.path.display(), outcome);
        })
    }

    /// Walk `root`, hash each file and hand the record to `visit`.
    ///
    /// Traversal and hashing problems are reported and skipped; an unreadable
    /// root or a shutdown request ends the walk with an error.
    fn for_each_hashed<F>(
        &self,
        root: &Path,
        phase: &str,
        sink: &mut dyn EventSink,
        summary: &mut RunSummary,
        mut visit: F,
    ) -> Result<(), FinderError>
    where
        F: FnMut(FileRecord, &mut dyn EventSink, &mut RunSummary),
    {
        let mut walker = Walker::new(root, self.config.walker_config.clone());
        if let Some(ref flag) = self.config.shutdown_flag {
            walker = walker.with_shutdown_flag(flag.clone());
        }

        let progress = self.config.progress_callback.as_deref();
        if let Some(callback) = progress {
            callback.on_phase_start(phase, 0);
        }

        let mut processed = 0;
        for result in walker.walk() {
            let file = match result {
                Ok(file) => file,
                Err(e) if e.is_fatal() => {
                    if let Some(callback) = progress {
                        callback.on_phase_end(phase);
                    }
                    return Err(FinderError::Scan(e));
                }
                Err(e) => {
                    summary.skipped_entries += 1;
                    sink.emit(ScanEvent::SubtreeSkipped {
                        path: e.path().to_path_buf(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            processed += 1;
            if let Some(callback) = progress {
                callback.on_progress(processed, &file.path.to_string_lossy());
            }

            if let Some(record) = self.hash_file(file, sink, summary) {
                visit(record, &mut *sink, &mut *summary);
            }

            if self.config.is_shutdown_requested() {
                break;
            }
        }

        if let Some(callback) = progress {
            callback.on_phase_end(phase);
        }

        if self.config.is_shutdown_requested() {
            log::debug!("Shutdown requested during {} phase", phase);
            return Err(FinderError::Interrupted);
        }

        Ok(())
    }

    /// Hash a walked file into a record, reporting failures.
    fn hash_file(
        &self,
        file: WalkedFile,
        sink: &mut dyn EventSink,
        summary: &mut RunSummary,
    ) -> Option<FileRecord> {
        match self.hasher.hash_file(&file.path) {
            Ok(digest) => {
                summary.bytes_hashed += digest.bytes;
                if let Some(ref callback) = self.config.progress_callback {
                    callback.on_item_completed(digest.bytes);
                }
                Some(FileRecord {
                    digest: digest.hex,
                    path: file.path,
                    name: file.name,
                })
            }
            Err(e) => {
                log::debug!("Unable to hash {}: {}", file.path.display(), e);
                summary.unhashable_files += 1;
                sink.emit(ScanEvent::HashFailed {
                    path: file.path,
                    reason: e.to_string(),
                });
                None
            }
        }
    }
}

/// Resolve a root to its canonical path, so that every spelling of the same
/// directory (`..` components, symlinks) yields the same record paths.
fn canonical_root(root: &Path) -> Result<PathBuf, FinderError> {
    std::fs::canonicalize(root).map_err(|source| FinderError::InvalidRoot {
        path: root.to_path_buf(),
        source,
    })
}
