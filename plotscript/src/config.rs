//! Engine configuration
//!
//! Read from an optional JSON file, then overridden by environment
//! variables:
//!
//! - `PLOTSCRIPT_PLUGINS` = `0` | `1`
//! - `PLOTSCRIPT_PLUGIN_PATH` = platform path list, added to the search roots
//! - `PLOTSCRIPT_CONFLICT_LOG` = `0` | `1`
//! - `PLOTSCRIPT_ERROR_POLICY` = `continue` | `halt`

use crate::eval::ErrorPolicy;
use plotscript_core::SampleRange;
use plotscript_plugin::loader::{default_search_paths, LOADING_ENABLED_BY_DEFAULT};
use plotscript_plugin::{ConflictReporting, PluginLoader};
use serde::{Deserialize, Serialize};
use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ENV_PLUGINS: &str = "PLOTSCRIPT_PLUGINS";
pub const ENV_PLUGIN_PATH: &str = "PLOTSCRIPT_PLUGIN_PATH";
pub const ENV_CONFLICT_LOG: &str = "PLOTSCRIPT_CONFLICT_LOG";
pub const ENV_ERROR_POLICY: &str = "PLOTSCRIPT_ERROR_POLICY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid value '{value}' for {name}")]
    InvalidEnv { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub plugins: PluginConfig,
    pub error_policy: ErrorPolicy,
    pub sampling: SamplingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    pub enabled: bool,
    /// Searched before the default roots
    pub search_paths: Vec<PathBuf>,
    pub include_default_paths: bool,
    /// Log dropped plugin functions (they are always in the load report)
    pub report_conflicts: bool,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            enabled: LOADING_ENABLED_BY_DEFAULT,
            search_paths: Vec::new(),
            include_default_paths: true,
            report_conflicts: true,
        }
    }
}

impl PluginConfig {
    pub fn roots(&self) -> Vec<PathBuf> {
        let mut roots = self.search_paths.clone();
        if self.include_default_paths {
            roots.extend(default_search_paths());
        }
        roots
    }

    pub fn loader(&self) -> PluginLoader {
        PluginLoader::new(self.roots())
            .enabled(self.enabled)
            .conflict_reporting(ConflictReporting::from(self.report_conflicts))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub default_start: f64,
    pub default_end: f64,
    pub default_step: f64,
    /// Intervals a viewport sweep is split into
    pub viewport_samples: usize,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            default_start: SampleRange::DEFAULT_START,
            default_end: SampleRange::DEFAULT_END,
            default_step: SampleRange::DEFAULT_STEP,
            viewport_samples: 500,
        }
    }
}

impl SamplingConfig {
    /// Range for graphs without one of their own; falls back to the
    /// built-in default when the configured bounds are invalid
    pub fn default_range(&self) -> SampleRange {
        SampleRange::new(self.default_start, self.default_end, self.default_step)
            .unwrap_or_default()
    }

    /// Range covering `start..=end` in `viewport_samples` intervals
    pub fn viewport(&self, start: f64, end: f64) -> Option<SampleRange> {
        SampleRange::with_samples(start, end, self.viewport_samples)
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// File (if any) then process environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()
    }

    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_env_from(|name| env::var_os(name))
    }

    /// Apply overrides read through `lookup`
    pub fn apply_env_from(
        mut self,
        lookup: impl Fn(&str) -> Option<OsString>,
    ) -> Result<Self, ConfigError> {
        let text = |name: &'static str| -> Option<String> {
            lookup(name).map(|value| value.to_string_lossy().trim().to_string())
        };

        if let Some(value) = text(ENV_PLUGINS) {
            self.plugins.enabled = flag(ENV_PLUGINS, value)?;
        }
        if let Some(value) = text(ENV_CONFLICT_LOG) {
            self.plugins.report_conflicts = flag(ENV_CONFLICT_LOG, value)?;
        }
        if let Some(value) = text(ENV_ERROR_POLICY) {
            self.error_policy = match value.to_lowercase().as_str() {
                "continue" => ErrorPolicy::Continue,
                "halt" => ErrorPolicy::Halt,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        name: ENV_ERROR_POLICY,
                        value,
                    })
                }
            };
        }
        if let Some(paths) = lookup(ENV_PLUGIN_PATH) {
            let mut roots: Vec<PathBuf> = env::split_paths(&paths)
                .filter(|path| !path.as_os_str().is_empty())
                .collect();
            roots.append(&mut self.plugins.search_paths);
            self.plugins.search_paths = roots;
        }

        Ok(self)
    }
}

fn flag(name: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidEnv { name, value }),
    }
}
