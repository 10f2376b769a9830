//! Desktop runtime configuration loaded from TOML.

use std::{fs, path::Path};

use card_engine::EngineConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{contributions::IconCollisionPolicy, window_manager::WindowLimits};

/// Environment variable that overrides `[logging].filter`.
pub const LOG_FILTER_ENV: &str = "DESKTOP_LOG";

#[derive(Debug, Error)]
/// Errors raised while loading [`DesktopConfig`].
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config `{path}`: {source}")]
    Io {
        /// Path that was read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    /// The config parsed but holds an unusable value.
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
/// Composition settings.
pub struct ContributionSettings {
    /// Policy for icon ids declared by more than one contribution.
    pub icon_collision: IconCollisionPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
/// Logging settings.
pub struct LoggingSettings {
    /// `tracing` env-filter directive.
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
/// Top-level runtime configuration. Every section is optional.
pub struct DesktopConfig {
    /// Window geometry limits.
    pub windows: WindowLimits,
    /// Contribution composition.
    pub contributions: ContributionSettings,
    /// Card engine limits.
    pub engine: EngineConfig,
    /// Log filtering.
    pub logging: LoggingSettings,
}

impl DesktopConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses the file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&raw)?;
        tracing::debug!(path = %path.display(), "loaded desktop config");
        Ok(config)
    }

    /// Effective log filter: `DESKTOP_LOG` when set and non-empty, else `[logging].filter`.
    pub fn log_filter(&self) -> String {
        std::env::var(LOG_FILTER_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| self.logging.filter.clone())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let windows = &self.windows;
        if windows.default_min_width <= 0 || windows.default_min_height <= 0 {
            return Err(ConfigError::Invalid(
                "windows.default_min_width and default_min_height must be positive".to_string(),
            ));
        }
        if windows.title_bar_reach < 0 {
            return Err(ConfigError::Invalid(
                "windows.title_bar_reach must not be negative".to_string(),
            ));
        }
        if self.engine.max_instructions == 0 {
            return Err(ConfigError::Invalid(
                "engine.max_instructions must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
