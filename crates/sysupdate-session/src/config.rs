//! Session configuration.
//!
//! The flags select between the pane variants: with or without download
//! size queries, fine or coarse install progress, and per-file detail
//! text. Every key is optional.
//!
//! ```toml
//! installable_suffix = "activity"
//! size_check = true
//! download_progress = true
//! detail_text = true
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use sysupdate_core::ReducerOptions;
use sysupdate_protocol::{Normalizer, DEFAULT_INSTALLABLE_SUFFIX};

/// Environment variable naming a configuration file.
pub const CONFIG_ENV: &str = "SYSUPDATE_CONFIG";

/// Errors loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Update session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Package-name suffix of user-installable content.
    pub installable_suffix: String,

    /// Query the download size of the selection.
    pub size_check: bool,

    /// Report byte/item progress while installing.
    pub download_progress: bool,

    /// Show per-file download descriptions.
    pub detail_text: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            installable_suffix: DEFAULT_INSTALLABLE_SUFFIX.to_string(),
            size_check: true,
            download_progress: true,
            detail_text: true,
        }
    }
}

impl SessionConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Loads a configuration file.
    ///
    /// # Errors
    ///
    /// `ConfigError::Io` if the file cannot be read, `ConfigError::Parse`
    /// if it is not valid TOML for this structure.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// `<config_dir>/sysupdate/config.toml`, if a config dir is known.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("sysupdate").join("config.toml"))
    }

    /// Resolves the configuration for a run.
    ///
    /// Order: the explicit path, then `$SYSUPDATE_CONFIG`, then the default
    /// path if that file exists, then built-in defaults. An explicitly
    /// named file that is missing is an error.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Ok(path) = env::var(CONFIG_ENV) {
            if !path.is_empty() {
                return Self::load(Path::new(&path));
            }
        }

        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => {
                debug!("No configuration file, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn reducer_options(&self) -> ReducerOptions {
        ReducerOptions {
            size_check: self.size_check,
            download_progress: self.download_progress,
            detail_text: self.detail_text,
        }
    }

    pub fn normalizer(&self) -> Normalizer {
        Normalizer::new(self.installable_suffix.clone(), self.detail_text)
    }
}
