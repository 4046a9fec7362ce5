//! Directory walker implementation using walkdir for sequential traversal.
//!
//! # Overview
//!
//! This module provides the [`Walker`] struct, a lazy enumerator of every
//! regular file under a root. Entries are produced in a deterministic order
//! (directory entries sorted by file name), one at a time, so a tree of any
//! size can be walked without collecting it first.
//!
//! # Features
//!
//! - Sorted, single-threaded traversal
//! - Configurable symlink following with loop detection
//! - Size filtering and hidden file filtering
//! - Unreadable subtrees are reported and skipped; an unreadable root is fatal
//! - Graceful shutdown via atomic flag
//!
//! # Example
//!
//! ```no_run
//! use refdupe::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("/home/user/Downloads"), WalkerConfig::default());
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(file) => println!("{}: {} bytes", file.path.display(), file.size),
//!         Err(e) if e.is_fatal() => break,
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use walkdir::{DirEntry, WalkDir};

use super::{ScanError, WalkedFile, WalkerConfig};

/// Sequential directory walker.
#[derive(Debug)]
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
    /// Walker configuration
    config: WalkerConfig,
    /// Optional shutdown flag for graceful termination
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Walker {
    /// Create a new walker for the given path.
    ///
    /// Paths yielded by [`Walker::walk`] are `root` joined with the relative
    /// path of each file, so an absolute root produces absolute paths.
    #[must_use]
    pub fn new(path: &Path, config: WalkerConfig) -> Self {
        Self {
            root: path.to_path_buf(),
            config,
            shutdown_flag: None,
        }
    }

    /// Set the shutdown flag for graceful termination.
    ///
    /// When the flag is set to `true`, the walker stops yielding entries.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Walk the directory tree, yielding regular files.
    ///
    /// Errors are yielded as [`ScanError`] values rather than stopping
    /// iteration. An error for which [`ScanError::is_fatal`] is true means
    /// the root itself could not be read; any other error covers a single
    /// entry or subtree, which walkdir does not descend into.
    pub fn walk(&self) -> impl Iterator<Item = Result<WalkedFile, ScanError>> + '_ {
        let skip_hidden = self.config.skip_hidden;

        WalkDir::new(&self.root)
            .follow_links(self.config.follow_symlinks)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| !(skip_hidden && entry.depth() > 0 && is_hidden(entry)))
            .take_while(move |_| {
                if self.is_shutdown_requested() {
                    log::debug!("Walker: Shutdown requested, stopping iteration");
                    return false;
                }
                true
            })
            .filter_map(move |entry_result| match entry_result {
                Ok(entry) => self.process_entry(&entry),
                Err(e) => Some(Err(self.handle_walk_error(e))),
            })
    }

    /// Turn a directory entry into a [`WalkedFile`] if it passes the filters.
    fn process_entry(&self, entry: &DirEntry) -> Option<Result<WalkedFile, ScanError>> {
        let file_type = entry.file_type();
        let path = entry.path();

        if file_type.is_dir() {
            return None;
        }

        // With follow_links the file type is already that of the target.
        if file_type.is_symlink() {
            log::trace!("Skipping symlink: {}", path.display());
            return None;
        }

        if !file_type.is_file() {
            log::trace!("Skipping special file: {}", path.display());
            return None;
        }

        let size = match entry.metadata() {
            Ok(metadata) => metadata.len(),
            Err(e) => return Some(Err(self.handle_walk_error(e))),
        };

        if let Some(min) = self.config.min_size {
            if size < min {
                log::trace!(
                    "Skipping file due to size filter ({}): {}",
                    size,
                    path.display()
                );
                return None;
            }
        }

        let name = path
            .strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| PathBuf::from(entry.file_name()));

        Some(Ok(WalkedFile {
            path: path.to_path_buf(),
            name,
            size,
        }))
    }

    /// Convert a walkdir error, deciding whether it is fatal.
    fn handle_walk_error(&self, error: walkdir::Error) -> ScanError {
        let depth = error.depth();
        let path = error
            .path()
            .map_or_else(|| self.root.clone(), Path::to_path_buf);

        if let Some(ancestor) = error.loop_ancestor() {
            log::warn!(
                "Symlink loop at {} (points back to {})",
                path.display(),
                ancestor.display()
            );
            return ScanError::SymlinkLoop(path);
        }

        let source = error
            .into_io_error()
            .unwrap_or_else(|| io::Error::other("directory walk failed"));

        if depth == 0 {
            log::error!("Cannot read root {}: {}", path.display(), source);
            return ScanError::RootUnreadable { path, source };
        }

        log::debug!("Walker error for {}: {}", path.display(), source);
        ScanError::from_io(&path, source)
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}
