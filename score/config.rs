//! # Run Configuration
//!
//! A scoring run is described by a small TOML file:
//!
//! ```toml
//! categories = ["IHD", "CM", "ARR"]
//! parallel = false
//! top_n = 10
//!
//! [input]
//! category_publications = "data/textcube_category2pmid.json"
//! publication_mentions = "data/pmid2entity2count.json"
//!
//! [output]
//! directory = "result"
//! ```
//!
//! Relative paths are resolved against the directory containing the file, so a
//! configuration can be moved together with its data.

use crate::types::ExecutionMode;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_TOP_N: usize = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse configuration file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("The configuration lists no categories.")]
    NoCategories,
    #[error("Category '{0}' is listed more than once in the configuration.")]
    DuplicateCategory(String),
    #[error("'top_n' must be at least 1.")]
    ZeroTopN,
}

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Ordered category names; defines the column order of every output table.
    pub categories: Vec<String>,
    /// Spread per-category work over all cores.
    #[serde(default)]
    pub parallel: bool,
    /// How many top-ranked entities per category go into the run summary.
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    pub input: InputConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputConfig {
    /// JSON object mapping each category to its publication identifiers.
    pub category_publications: PathBuf,
    /// Nested JSON (`publication -> entity -> count`) or long-format TSV.
    pub publication_mentions: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    pub directory: PathBuf,
}

impl RunConfig {
    /// Reads, validates and path-resolves a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;

        let base = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        config.resolve_relative_to(base);
        log::debug!("Loaded run configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.categories.is_empty() {
            return Err(ConfigError::NoCategories);
        }
        let mut seen = HashSet::with_capacity(self.categories.len());
        for name in &self.categories {
            if !seen.insert(name.as_str()) {
                return Err(ConfigError::DuplicateCategory(name.clone()));
            }
        }
        if self.top_n == 0 {
            return Err(ConfigError::ZeroTopN);
        }
        Ok(())
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        if self.parallel {
            ExecutionMode::Parallel
        } else {
            ExecutionMode::Sequential
        }
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        for path in [
            &mut self.input.category_publications,
            &mut self.input.publication_mentions,
            &mut self.output.directory,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}
