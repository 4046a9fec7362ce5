//! Ctrl+C handling.
//!
//! An interrupt sets a shared flag. The walker stops yielding entries, the
//! finder notices the flag between files and returns
//! [`FinderError::Interrupted`](crate::duplicates::FinderError::Interrupted),
//! and the process exits with [`EXIT_CODE_INTERRUPTED`]. The index backing
//! file is anonymous, so nothing is left behind on disk.
//!
//! ```rust,no_run
//! use refdupe::duplicates::FinderConfig;
//! use refdupe::signal::install_handler;
//!
//! let handler = install_handler();
//! let config = FinderConfig::default().with_shutdown_flag(handler.flag());
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Exit code after an interrupt (128 + SIGINT).
pub const EXIT_CODE_INTERRUPTED: i32 = 130;

static INSTALLED: OnceLock<ShutdownHandler> = OnceLock::new();

/// Shared shutdown flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandler {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandler {
    /// Create a handler that no signal is wired to.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a shutdown has been requested.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Request a shutdown, as an interrupt would.
    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Clear a previous request.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    /// The flag to hand to the finder and walker.
    #[must_use]
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }
}

/// Error type for signal handler installation.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// The Ctrl+C hook could not be registered.
    #[error("Failed to install signal handler: {0}")]
    InstallFailed(#[from] ctrlc::Error),
}

/// Register the Ctrl+C hook for this process.
///
/// # Errors
///
/// Returns [`SignalError`] if the hook cannot be registered, typically because
/// another hook is already in place.
pub fn try_install() -> Result<ShutdownHandler, SignalError> {
    let handler = ShutdownHandler::new();
    let flag = handler.flag();

    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
        let mut stderr = std::io::stderr();
        let _ = writeln!(stderr, "\nInterrupted, stopping after the current file...");
        let _ = stderr.flush();
        log::info!("Shutdown signal received");
    })?;

    Ok(handler)
}

/// Return the process-wide handler, registering the Ctrl+C hook on first use.
///
/// Later calls return the same handler with its flag cleared, so repeated
/// runs in one process (tests driving `run_app`) share one hook. If the hook
/// cannot be registered the returned handler still works for
/// [`ShutdownHandler::request_shutdown`].
pub fn install_handler() -> ShutdownHandler {
    let handler = INSTALLED.get_or_init(|| match try_install() {
        Ok(handler) => handler,
        Err(e) => {
            log::debug!("{}; continuing without Ctrl+C handling", e);
            ShutdownHandler::new()
        }
    });
    handler.reset();
    handler.clone()
}
