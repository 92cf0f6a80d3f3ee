//! `nile.toml` configuration for the `nile` binary.
//!
//! # Example
//!
//! ```toml
//! [storage]
//! backend = "sqlite"      # or "document"
//! path = "nile_crm.db"    # database file, or directory for "document"
//!
//! [logging]
//! level = "info"
//! ```
//!
//! Every key is optional. `--backend` and `--data` override the file.

use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "nile.toml";

/// Which record store implementation to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Single SQLite database file.
    Sqlite,
    /// Directory of JSON documents, one per collection.
    Document,
}

impl Backend {
    fn default_path(&self) -> PathBuf {
        match self {
            Backend::Sqlite => PathBuf::from("nile_crm.db"),
            Backend::Document => PathBuf::from("nile_crm_data"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NileConfig {
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// `[storage]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub backend: Backend,
    /// Defaults per backend when absent.
    pub path: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Sqlite,
            path: None,
        }
    }
}

impl StorageConfig {
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| self.backend.default_path())
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

/// Read and parse a config file.
pub fn read_config(path: &Path) -> Result<NileConfig, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("could not read '{}': {}", path.display(), e))?;
    toml::from_str(&content).map_err(|e| format!("could not parse '{}': {}", path.display(), e))
}

/// Load the config at `explicit` (which must exist) or the default file in
/// the working directory (which may be absent).
pub fn load(explicit: Option<&Path>) -> Result<NileConfig, String> {
    match explicit {
        Some(path) => read_config(path),
        None => {
            let path = Path::new(DEFAULT_CONFIG_FILE);
            if path.exists() {
                read_config(path)
            } else {
                Ok(NileConfig::default())
            }
        }
    }
}
