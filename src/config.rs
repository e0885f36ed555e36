//! Merge configuration (`miz-merge.toml`).
//!
//! Defines which missions are offered, which groups are copied, where the
//! result goes, and how fresh ids are drawn. Every field has a default, so a
//! missing file is the same as an empty one.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::document::DocumentOptions;
use crate::ids::{AllocationPolicy, AllocationStrategy};
use crate::merge::{DEFAULT_SUFFIXES, NameVariants};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level merge configuration.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Only `.miz` files whose name contains this are offered
    /// (default: `"VGAF"`).
    #[serde(default = "default_name_filter")]
    pub name_filter: String,

    /// Base names of the groups to copy from donors.
    #[serde(default = "default_group_copy_filter")]
    pub group_copy_filter: Vec<String>,

    /// Suffixes appended to each base name; every variant is its own group.
    #[serde(default = "default_name_suffixes")]
    pub name_suffixes: Vec<String>,

    /// File name of the merged mission, written next to the base.
    #[serde(default = "default_output_name")]
    pub output_name: String,

    /// Directory searched for missions. Defaults to the simulator's saved
    /// missions folder under the home directory.
    #[serde(default)]
    pub missions_dir: Option<PathBuf>,

    #[serde(default)]
    pub scan: ScanConfig,

    #[serde(default)]
    pub ids: IdConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name_filter: default_name_filter(),
            group_copy_filter: default_group_copy_filter(),
            name_suffixes: default_name_suffixes(),
            output_name: default_output_name(),
            missions_dir: None,
            scan: ScanConfig::default(),
            ids: IdConfig::default(),
        }
    }
}

fn default_name_filter() -> String {
    "VGAF".to_owned()
}

fn default_group_copy_filter() -> Vec<String> {
    vec!["Stingray".to_owned(), "Carver".to_owned()]
}

fn default_name_suffixes() -> Vec<String> {
    DEFAULT_SUFFIXES.map(str::to_owned).to_vec()
}

fn default_output_name() -> String {
    "VGAF_Campaign_02_sharkbite.miz".to_owned()
}

// ---------------------------------------------------------------------------
// ScanConfig
// ---------------------------------------------------------------------------

/// What the initial scan walks and indexes.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScanConfig {
    /// Side whose plane groups are copied (default: `"blue"`).
    #[serde(default = "default_coalition")]
    pub coalition: String,

    /// Group categories scanned for ids and parking.
    #[serde(default = "default_categories")]
    pub categories: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            coalition: default_coalition(),
            categories: default_categories(),
        }
    }
}

fn default_coalition() -> String {
    "blue".to_owned()
}

fn default_categories() -> Vec<String> {
    vec!["vehicle".to_owned(), "plane".to_owned(), "static".to_owned()]
}

// ---------------------------------------------------------------------------
// IdConfig
// ---------------------------------------------------------------------------

/// Range and strategy for fresh group and unit ids.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdConfig {
    #[serde(default = "default_min")]
    pub min: i64,

    #[serde(default = "default_max")]
    pub max: i64,

    /// Random draws before giving up (default: 30).
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    #[serde(default)]
    pub strategy: AllocationStrategy,

    /// Fixed seed for reproducible random allocation.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for IdConfig {
    fn default() -> Self {
        Self {
            min: default_min(),
            max: default_max(),
            attempts: default_attempts(),
            strategy: AllocationStrategy::default(),
            seed: None,
        }
    }
}

const fn default_min() -> i64 {
    800
}

const fn default_max() -> i64 {
    999
}

const fn default_attempts() -> u32 {
    30
}

impl fmt::Display for IdConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={} ({}", self.min, self.max, self.strategy)?;
        if self.strategy == AllocationStrategy::Random {
            write!(f, ", {} attempts", self.attempts)?;
        }
        write!(f, ")")
    }
}

// ---------------------------------------------------------------------------
// Derived settings
// ---------------------------------------------------------------------------

impl Config {
    /// Options every document of a run is loaded with.
    #[must_use]
    pub fn document_options(&self) -> DocumentOptions {
        DocumentOptions {
            coalition: self.scan.coalition.clone(),
            categories: self.scan.categories.clone(),
            ids: AllocationPolicy {
                min: self.ids.min,
                max: self.ids.max,
                attempts: self.ids.attempts,
                strategy: self.ids.strategy,
            },
            seed: self.ids.seed,
        }
    }

    /// Group names looked up in every donor.
    #[must_use]
    pub fn name_variants(&self) -> NameVariants {
        NameVariants {
            names: self.group_copy_filter.clone(),
            suffixes: self.name_suffixes.clone(),
        }
    }

    /// The configured missions directory, or `<home>/Saved Games/DCS/Missions`.
    #[must_use]
    pub fn resolved_missions_dir(&self) -> Option<PathBuf> {
        self.missions_dir.clone().or_else(|| {
            std::env::var_os("USERPROFILE")
                .or_else(|| std::env::var_os("HOME"))
                .map(|home| PathBuf::from(home).join("Saved Games").join("DCS").join("Missions"))
        })
    }

    /// Reject settings that parse but cannot work.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] naming the first offending setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |message: String| {
            Err(ConfigError {
                path: None,
                message,
            })
        };
        if self.ids.min > self.ids.max {
            return fail(format!(
                "ids.min ({}) is greater than ids.max ({})",
                self.ids.min, self.ids.max
            ));
        }
        if self.ids.strategy == AllocationStrategy::Random && self.ids.attempts == 0 {
            return fail("ids.attempts must be at least 1 for the random strategy".to_owned());
        }
        if self.name_suffixes.is_empty() {
            return fail("name_suffixes must not be empty; use [\"\"] for exact names".to_owned());
        }
        if self.scan.coalition.is_empty() {
            return fail("scan.coalition must not be empty".to_owned());
        }
        if !self.output_name.ends_with(".miz") || self.output_name.contains(['/', '\\']) {
            return fail(format!(
                "output_name {:?} must be a plain file name ending in .miz",
                self.output_name
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Error loading a configuration file.
#[derive(Debug)]
pub struct ConfigError {
    /// The path that was being loaded (if available).
    pub path: Option<PathBuf>,
    /// Human-readable message with line-level detail when possible.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(p) = &self.path {
            write!(f, "{}: {}", p.display(), self.message)
        } else {
            write!(f, "config error: {}", self.message)
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Load and validate configuration from a TOML file.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    /// Returns `ConfigError` on I/O errors (other than not-found), parse
    /// errors, or settings rejected by [`Config::validate`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let with_path = |mut e: ConfigError| {
            e.path = Some(path.to_owned());
            e
        };
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file; using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError {
                    path: Some(path.to_owned()),
                    message: format!("could not read file: {e}"),
                });
            }
        };
        let config = Self::parse(&contents).map_err(with_path)?;
        config.validate().map_err(with_path)?;
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `ConfigError` on invalid TOML or unknown fields.
    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| {
            let mut message = e.message().to_owned();
            if let Some(span) = e.span() {
                let line = toml_str[..span.start]
                    .chars()
                    .filter(|&c| c == '\n')
                    .count()
                    + 1;
                message = format!("line {line}: {message}");
            }
            ConfigError {
                path: None,
                message,
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
