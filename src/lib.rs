//! refdupe - reference-based duplicate file finder
//!
//! Finds files in a candidate directory tree whose contents duplicate files in
//! a reference tree, and reports them or moves them into a quarantine
//! directory. The reference tree is indexed once into a temporary file, so
//! memory use does not grow with the number of reference files.

pub mod actions;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod index;
pub mod logging;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod signal;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::actions::{DuplicateAction, QuarantineAction, ReportAction};
use crate::cli::Cli;
use crate::config::{Config, ScanConfig};
use crate::duplicates::DuplicateFinder;
use crate::error::ExitCode;
use crate::index::DiskIndex;
use crate::output::{open_sink, EventSink};
use crate::progress::Progress;

/// Run the application for parsed arguments.
///
/// # Errors
///
/// Returns an error for invalid configuration, resources that cannot be set
/// up, an unreadable root, or an interrupt
/// ([`FinderError::Interrupted`](duplicates::FinderError::Interrupted)).
/// Per-file problems only go to the output log.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);

    let config = Config::load(cli.config.as_deref())?;
    let scan = ScanConfig::resolve(&cli, config)?;
    scan.check()?;
    log::debug!("Resolved configuration: {:?}", scan);

    let shutdown = signal::install_handler();

    let mut sink = open_sink(&scan.output, scan.format)?;
    let mut index = match scan.temp_dir {
        Some(ref dir) => DiskIndex::create_in(dir),
        None => DiskIndex::create(),
    }
    .context("unable to create the temporary index")?;

    let mut finder_config = scan.finder_config().with_shutdown_flag(shutdown.flag());
    if scan.progress {
        finder_config = finder_config.with_progress_callback(Arc::new(Progress::new(false)));
    }
    let finder = DuplicateFinder::new(finder_config);

    let mut action: Box<dyn DuplicateAction> = match scan.quarantine_root {
        Some(ref root) => {
            log::info!("Duplicates will be moved to {}", root.display());
            Box::new(QuarantineAction::new(root))
        }
        None => Box::new(ReportAction),
    };

    let result = finder.find_duplicates(
        &scan.reference_root,
        &scan.candidate_root,
        &mut index,
        action.as_mut(),
        &mut sink,
    );

    // Flush whatever was logged, including on failure.
    let flushed = sink.flush();
    let summary = result?;
    flushed.context("unable to flush the output log")?;

    log::debug!("Run summary: {:?}", summary);
    Ok(ExitCode::Success)
}
