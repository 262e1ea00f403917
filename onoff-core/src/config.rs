//! onoff configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{OnOffError, OnOffResult};

const DEFAULT_MAX_RECURRENCE_PER_EVENT: usize = 100;
const DEFAULT_MAX_TOTAL_INSTANCES: usize = 100;

/// Hard caps on how many intervals a schedule build may produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Most instances a single recurring event may contribute.
    pub max_recurrence_per_event: usize,
    /// Most intervals in the whole schedule.
    pub max_total_instances: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_recurrence_per_event: DEFAULT_MAX_RECURRENCE_PER_EVENT,
            max_total_instances: DEFAULT_MAX_TOTAL_INSTANCES,
        }
    }
}

/// Configuration at ~/.config/onoff/config.toml
///
/// ```toml
/// [limits]
/// max_recurrence_per_event = 100
/// max_total_instances = 100
/// ```
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct OnOffConfig {
    #[serde(default)]
    pub limits: Limits,
}

impl OnOffConfig {
    pub fn config_path() -> OnOffResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| OnOffError::Config("Could not determine config directory".into()))?
            .join("onoff");

        Ok(config_dir.join("config.toml"))
    }

    /// Load the default config file, falling back to defaults if it doesn't exist.
    pub fn load() -> OnOffResult<Self> {
        let path = Self::config_path()?;

        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load an explicitly named config file. The file must exist.
    pub fn load_from(path: &Path) -> OnOffResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            OnOffError::Config(format!("Could not read {}: {e}", path.display()))
        })?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> OnOffResult<Self> {
        toml::from_str(content).map_err(|e| OnOffError::Config(e.to_string()))
    }
}
