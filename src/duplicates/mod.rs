//! Duplicate matching.
//!
//! This module provides:
//! - Building the reference index (phase 1)
//! - Matching every candidate against it (phase 2)
//! - Same-tree self-exclusion and at-most-once matching

pub mod finder;

pub use finder::{
    match_candidate, CandidateOutcome, DuplicateFinder, FinderConfig, FinderError, MatchState,
    RunSummary,
};
