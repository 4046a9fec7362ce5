//! Command-line interface definitions.
//!
//! ```bash
//! # Report files under ~/imports that already exist under ~/photos
//! refdupe --f1 ~/photos --f2 ~/imports
//!
//! # Move them into a quarantine directory, logging to a file
//! refdupe --f1 ~/photos --f2 ~/imports --move ~/dupes --output moved.log
//!
//! # Deduplicate a single tree against itself, as JSON lines
//! refdupe --f1 ~/photos --f2 ~/photos --format json
//! ```

use std::path::PathBuf;

use clap::Parser;

use crate::output::{OutputFormat, OutputTarget};
use crate::scanner::HashAlgorithm;

/// Find files in one directory tree that duplicate files in a reference tree.
///
/// Every file under the candidate tree (--f2) whose contents match a file
/// under the reference tree (--f1) is reported, or moved into a quarantine
/// directory with --move. Reference files are never modified.
#[derive(Debug, Parser)]
#[command(name = "refdupe")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Reference tree: the files to keep
    #[arg(long = "f1", visible_alias = "reference", value_name = "PATH")]
    pub reference: PathBuf,

    /// Candidate tree: the files to check for duplicates
    #[arg(long = "f2", visible_alias = "candidate", value_name = "PATH")]
    pub candidate: PathBuf,

    /// Move duplicates into this directory instead of only reporting them
    ///
    /// Each duplicate keeps its path relative to the candidate root.
    /// Existing files in the quarantine directory are never overwritten.
    #[arg(long = "move", value_name = "DIR")]
    pub quarantine: Option<PathBuf>,

    /// Output log destination: stdout (default), stderr, null, or a file path
    #[arg(long, value_name = "DEST")]
    pub output: Option<OutputTarget>,

    /// Output log line format
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Content digest algorithm
    #[arg(long, value_enum)]
    pub algorithm: Option<HashAlgorithm>,

    /// Directory for the temporary index file (default: system temp dir)
    #[arg(long, value_name = "DIR")]
    pub temp_dir: Option<PathBuf>,

    /// Skip files smaller than this size (e.g., 1KB, 4KiB, 1MB)
    ///
    /// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub min_size: Option<u64>,

    /// Skip hidden files and directories (starting with .)
    #[arg(long)]
    pub skip_hidden: bool,

    /// Follow symbolic links
    ///
    /// Symlink cycles are detected and skipped.
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Disable the digest prefilter and scan the index for every candidate
    #[arg(long)]
    pub no_prefilter: bool,

    /// Show a progress spinner on stderr
    #[arg(long)]
    pub progress: bool,

    /// Configuration file (default: config.toml in the platform config dir)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print fatal errors as JSON on stderr
    #[arg(long)]
    pub json_errors: bool,

    /// Increase diagnostic verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only print diagnostic errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Parse a human-readable size like `1KB`, `4KiB` or `1.5MB` into bytes.
///
/// Decimal suffixes (KB, MB, ...) are powers of 1000, binary suffixes (KiB,
/// MiB, ...) powers of 1024. Suffixes are case-insensitive.
///
/// # Errors
///
/// Returns a message suitable for clap if the number or suffix is invalid.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }

    let split = s
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(s.len());
    let (number, suffix) = (&s[..split], s[split..].trim().to_ascii_uppercase());

    let value: f64 = number
        .parse()
        .map_err(|_| format!("Invalid number: '{number}'"))?;

    let multiplier: u64 = match suffix.as_str() {
        "" | "B" => 1,
        "KB" | "K" => 1_000,
        "KIB" => 1 << 10,
        "MB" | "M" => 1_000_000,
        "MIB" => 1 << 20,
        "GB" | "G" => 1_000_000_000,
        "GIB" => 1 << 30,
        "TB" | "T" => 1_000_000_000_000,
        "TIB" => 1 << 40,
        _ => return Err(format!("Unknown size suffix: '{suffix}'")),
    };

    Ok((value * multiplier as f64) as u64)
}
