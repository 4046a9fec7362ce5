//! Configuration management.
//!
//! Settings are layered, lowest priority first:
//!
//! 1. Built-in defaults
//! 2. TOML file (`--config`, or `config.toml` in the platform config directory)
//! 3. `REFDUPE_*` environment variables (`REFDUPE_MIN_SIZE=4096`)
//! 4. Command-line flags
//!
//! The roots and the quarantine directory only come from the command line.
//! [`ScanConfig`] is the fully resolved result for one run.
//!
//! ```toml
//! output = "/var/log/refdupe.log"
//! format = "json"
//! algorithm = "sha256"
//! skip_hidden = true
//! min_size = 1024
//! ```

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cli::Cli;
use crate::duplicates::FinderConfig;
use crate::output::{OutputFormat, OutputTarget};
use crate::scanner::{HashAlgorithm, WalkerConfig};

/// Prefix of the environment variables read into [`Config`].
pub const ENV_PREFIX: &str = "REFDUPE_";

/// Error type for configuration problems. All of them stop the run before
/// any file is read.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration sources could not be read or merged.
    #[error("invalid configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    /// An explicit config file does not exist.
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    /// A root was given as an empty path.
    #[error("{0} root must not be empty")]
    MissingRoot(&'static str),

    /// A root does not exist.
    #[error("{which} root does not exist: {path}")]
    RootNotFound {
        /// "reference" or "candidate"
        which: &'static str,
        /// The root as given
        path: PathBuf,
    },

    /// A root is not a directory.
    #[error("{which} root is not a directory: {path}")]
    RootNotADirectory {
        /// "reference" or "candidate"
        which: &'static str,
        /// The root as given
        path: PathBuf,
    },

    /// The quarantine directory lies inside the candidate tree, so moved
    /// files would be visited again.
    #[error("quarantine directory {quarantine} is inside the candidate root {candidate}")]
    QuarantineInsideCandidate {
        /// Quarantine root
        quarantine: PathBuf,
        /// Candidate root
        candidate: PathBuf,
    },

    /// The output destination is not usable.
    #[error("invalid output destination: {0}")]
    InvalidOutput(String),

    /// The prefilter false positive rate is outside (0, 1).
    #[error("bloom_fp_rate must be between 0 and 1, got {0}")]
    InvalidFpRate(f64),

    /// A path could not be made absolute.
    #[error("cannot resolve {path}: {source}")]
    Resolve {
        /// The path as given
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Persistent settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Output log destination (`stdout`, `stderr`, `null`, or a file path).
    pub output: String,
    /// Output log line format.
    pub format: OutputFormat,
    /// Digest algorithm.
    pub algorithm: HashAlgorithm,
    /// Directory for the index backing file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_dir: Option<PathBuf>,
    /// Skip files smaller than this many bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_size: Option<u64>,
    /// Skip dot files and dot directories.
    pub skip_hidden: bool,
    /// Follow symbolic links.
    pub follow_symlinks: bool,
    /// Use the Bloom prefilter.
    pub prefilter: bool,
    /// Prefilter false positive rate.
    pub bloom_fp_rate: f64,
    /// Show a progress spinner on stderr.
    pub progress: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output: "stdout".to_string(),
            format: OutputFormat::Text,
            algorithm: HashAlgorithm::default(),
            temp_dir: None,
            min_size: None,
            skip_hidden: false,
            follow_symlinks: false,
            prefilter: true,
            bloom_fp_rate: 0.01,
            progress: false,
        }
    }
}

impl Config {
    /// Load from defaults, a config file and the environment.
    ///
    /// `path` names an explicit config file, which must exist. Without it the
    /// platform default is used if present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the explicit file is missing or any source
    /// fails to parse.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) if !path.is_file() => {
                return Err(ConfigError::FileNotFound(path.to_path_buf()));
            }
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_path().filter(|p| p.is_file()),
        };

        if let Some(ref file) = file {
            log::debug!("Loading configuration from {}", file.display());
        }
        Self::figment(file.as_deref())
            .extract()
            .map_err(|e| ConfigError::Load(Box::new(e)))
    }

    /// The layered figment, without the command line.
    #[must_use]
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(file) = file {
            figment = figment.merge(Toml::file(file));
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    /// Platform config file location, e.g. `~/.config/refdupe/config.toml`.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "refdupe").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Overlay command-line flags. Flags that were not given leave the
    /// loaded value alone.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(ref output) = cli.output {
            self.output = output.to_string();
        }
        if let Some(format) = cli.format {
            self.format = format;
        }
        if let Some(algorithm) = cli.algorithm {
            self.algorithm = algorithm;
        }
        if let Some(ref dir) = cli.temp_dir {
            self.temp_dir = Some(dir.clone());
        }
        if cli.min_size.is_some() {
            self.min_size = cli.min_size;
        }
        self.skip_hidden |= cli.skip_hidden;
        self.follow_symlinks |= cli.follow_symlinks;
        self.prefilter &= !cli.no_prefilter;
        self.progress |= cli.progress;
    }
}

/// Resolved settings of one run.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Root of the reference tree
    pub reference_root: PathBuf,
    /// Root of the candidate tree
    pub candidate_root: PathBuf,
    /// Quarantine root; duplicates are only reported when unset
    pub quarantine_root: Option<PathBuf>,
    /// Output log destination
    pub output: OutputTarget,
    /// Output log line format
    pub format: OutputFormat,
    /// Digest algorithm
    pub algorithm: HashAlgorithm,
    /// Directory for the index backing file
    pub temp_dir: Option<PathBuf>,
    /// Walk options for both trees
    pub walker: WalkerConfig,
    /// Use the Bloom prefilter
    pub prefilter: bool,
    /// Prefilter false positive rate
    pub bloom_fp_rate: f64,
    /// Show a progress spinner
    pub progress: bool,
}

impl ScanConfig {
    /// Combine loaded settings with the command line.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOutput`] if the output destination
    /// cannot be parsed.
    pub fn resolve(cli: &Cli, mut config: Config) -> Result<Self, ConfigError> {
        config.apply_cli(cli);
        let output = config
            .output
            .parse::<OutputTarget>()
            .map_err(ConfigError::InvalidOutput)?;

        Ok(Self {
            reference_root: cli.reference.clone(),
            candidate_root: cli.candidate.clone(),
            quarantine_root: cli.quarantine.clone(),
            output,
            format: config.format,
            algorithm: config.algorithm,
            temp_dir: config.temp_dir,
            walker: WalkerConfig::new(config.follow_symlinks, config.skip_hidden, config.min_size),
            prefilter: config.prefilter,
            bloom_fp_rate: config.bloom_fp_rate,
            progress: config.progress && !cli.quiet,
        })
    }

    /// Validate the run before any work begins.
    ///
    /// Both roots must be existing directories. They may be the same
    /// directory. The quarantine root must not be inside the candidate root.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn check(&self) -> Result<(), ConfigError> {
        check_root("reference", &self.reference_root)?;
        check_root("candidate", &self.candidate_root)?;

        if !(self.bloom_fp_rate > 0.0 && self.bloom_fp_rate < 1.0) {
            return Err(ConfigError::InvalidFpRate(self.bloom_fp_rate));
        }

        if let Some(ref quarantine) = self.quarantine_root {
            let quarantine = canonical(quarantine)?;
            let candidate = canonical(&self.candidate_root)?;
            if quarantine.starts_with(&candidate) {
                return Err(ConfigError::QuarantineInsideCandidate {
                    quarantine,
                    candidate,
                });
            }
        }

        Ok(())
    }

    /// Engine configuration for this run.
    #[must_use]
    pub fn finder_config(&self) -> FinderConfig {
        FinderConfig::default()
            .with_walker_config(self.walker.clone())
            .with_algorithm(self.algorithm)
            .with_prefilter(self.prefilter)
            .with_bloom_fp_rate(self.bloom_fp_rate)
    }
}

fn check_root(which: &'static str, path: &Path) -> Result<(), ConfigError> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::MissingRoot(which));
    }
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(ConfigError::RootNotADirectory {
            which,
            path: path.to_path_buf(),
        }),
        Err(_) => Err(ConfigError::RootNotFound {
            which,
            path: path.to_path_buf(),
        }),
    }
}

/// Canonical form of `path`. A path that does not exist yet is resolved
/// through its deepest existing ancestor.
fn canonical(path: &Path) -> Result<PathBuf, ConfigError> {
    let resolve_error = |source| ConfigError::Resolve {
        path: path.to_path_buf(),
        source,
    };
    let absolute = std::path::absolute(path).map_err(resolve_error)?;

    let mut existing = absolute.as_path();
    let mut missing = Vec::new();
    loop {
        match std::fs::canonicalize(existing) {
            Ok(resolved) => {
                return Ok(missing
                    .iter()
                    .rev()
                    .fold(resolved, |acc, name| acc.join(name)));
            }
            Err(source) => match (existing.parent(), existing.file_name()) {
                (Some(parent), Some(name)) => {
                    missing.push(name.to_os_string());
                    existing = parent;
                }
                _ => return Err(resolve_error(source)),
            },
        }
    }
}
