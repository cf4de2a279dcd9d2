//! Plugin discovery and loading
//!
//! Candidates are files named `*.psplugin.<dll-extension>` found under the
//! search roots. Every candidate is opened and registered on its own: a
//! failure (or panic) skips that candidate and is recorded in the
//! `LoadReport`, nothing is returned as an error.

use crate::context::PluginContext;
use crate::native::NativeOpener;
use crate::registry::{FunctionRegistry, RegistryError, SourceKind};
use crate::NativeFunction;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Directory name under the per-user and per-machine roots
pub const PLUGIN_DIR_NAME: &str = "PlotPlugins";

/// Loading is disabled by default on macOS release builds
pub const LOADING_ENABLED_BY_DEFAULT: bool =
    !cfg!(all(target_os = "macos", not(debug_assertions)));

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PluginError {
    #[error("cannot open {path:?}: {message}")]
    Open { path: PathBuf, message: String },

    #[error("{path:?} does not export a plugin declaration")]
    MissingEntryPoint { path: PathBuf },

    #[error("plugin ABI version {found} is not supported (expected {expected})")]
    AbiMismatch { found: u32, expected: u32 },

    #[error("invalid plugin declaration: {0}")]
    InvalidDeclaration(String),

    #[error("plugin panicked while loading: {0}")]
    Panicked(String),
}

/// An opened plugin module
pub trait PluginModule: Send + Sync {
    fn name(&self) -> &str;
    fn functions(&self) -> Vec<Arc<dyn NativeFunction>>;
}

/// Turns a candidate file into a module
pub trait ModuleOpener: Send + Sync {
    fn open(&self, path: &Path) -> Result<Arc<dyn PluginModule>, PluginError>;
}

/// What happens to functions dropped because their name is taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictReporting {
    Silent,
    #[default]
    Log,
}

impl From<bool> for ConflictReporting {
    fn from(log: bool) -> Self {
        if log {
            ConflictReporting::Log
        } else {
            ConflictReporting::Silent
        }
    }
}

// ========== Report ==========

#[derive(Debug, Clone, Serialize)]
pub struct LoadedPlugin {
    pub name: String,
    pub path: PathBuf,
    /// Functions actually registered
    pub functions: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedCandidate {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NameConflict {
    pub function: String,
    pub plugin: String,
    pub path: PathBuf,
    pub existing: SourceKind,
}

/// Outcome of one `load_all` pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub loaded: Vec<LoadedPlugin>,
    pub skipped: Vec<SkippedCandidate>,
    pub conflicts: Vec<NameConflict>,
}

impl LoadReport {
    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty() && self.skipped.is_empty() && self.conflicts.is_empty()
    }
}

// ========== Discovery ==========

/// File name suffix of plugin modules on this platform
pub fn plugin_suffix() -> String {
    format!(".psplugin.{}", std::env::consts::DLL_EXTENSION)
}

/// Case-insensitive check against `plugin_suffix()`
pub fn is_plugin_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.to_lowercase().ends_with(&plugin_suffix()))
        .unwrap_or(false)
}

/// Executable directory, then the per-user and per-machine plugin folders
pub fn default_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        paths.push(dir);
    }

    if cfg!(windows) {
        if let Some(profile) = std::env::var_os("USERPROFILE") {
            paths.push(PathBuf::from(profile).join("Documents").join(PLUGIN_DIR_NAME));
        }
        if let Some(data) = std::env::var_os("PROGRAMDATA") {
            paths.push(PathBuf::from(data).join(PLUGIN_DIR_NAME));
        }
    } else {
        if let Some(home) = std::env::var_os("HOME") {
            paths.push(PathBuf::from(home).join(PLUGIN_DIR_NAME));
        }
        paths.push(Path::new("/usr/local/share").join(PLUGIN_DIR_NAME));
    }

    paths
}

/// Plugin candidates under `roots`.
///
/// Roots are visited in order and walked recursively with entries sorted
/// per directory. Missing roots are skipped, symlinked directories are not
/// followed and a file reachable from several roots is listed once.
pub fn discover(roots: &[PathBuf]) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut found = Vec::new();

    for root in roots {
        if !root.is_dir() {
            debug!(root = %root.display(), "plugin root missing, skipped");
            continue;
        }
        debug!(root = %root.display(), "scanning for plugins");
        walk(root, &mut seen, &mut found);
    }

    found
}

fn walk(dir: &Path, seen: &mut HashSet<PathBuf>, found: &mut Vec<PathBuf>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            debug!(dir = %dir.display(), %err, "cannot read plugin directory");
            return;
        }
    };

    let mut paths: Vec<PathBuf> = entries.filter_map(|e| e.ok()).map(|e| e.path()).collect();
    paths.sort();

    for path in paths {
        let Ok(meta) = fs::symlink_metadata(&path) else {
            continue;
        };

        if meta.is_dir() {
            walk(&path, seen, found);
        } else if is_plugin_file(&path) && path.is_file() {
            let key = fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
            if seen.insert(key) {
                found.push(path);
            }
        }
    }
}

// ========== Loading ==========

/// Loads plugin modules into a registry
pub struct PluginLoader {
    search_paths: Vec<PathBuf>,
    opener: Box<dyn ModuleOpener>,
    conflicts: ConflictReporting,
    enabled: bool,
}

impl PluginLoader {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self {
            search_paths,
            opener: Box::new(NativeOpener),
            conflicts: ConflictReporting::default(),
            enabled: LOADING_ENABLED_BY_DEFAULT,
        }
    }

    /// Loader over `default_search_paths()`
    pub fn with_default_paths() -> Self {
        Self::new(default_search_paths())
    }

    pub fn with_opener(mut self, opener: impl ModuleOpener + 'static) -> Self {
        self.opener = Box::new(opener);
        self
    }

    pub fn conflict_reporting(mut self, reporting: ConflictReporting) -> Self {
        self.conflicts = reporting;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Discover, open and register every plugin
    pub fn load_all(&self, registry: &mut FunctionRegistry) -> (PluginContext, LoadReport) {
        let mut context = PluginContext::new();
        let mut report = LoadReport::default();

        if !self.enabled {
            debug!("plugin loading disabled");
            return (context, report);
        }

        for path in discover(&self.search_paths) {
            let outcome = self.open(&path).and_then(|module| {
                let loaded =
                    self.register_isolated(&path, module.as_ref(), &mut *registry, &mut report)?;
                Ok((module, loaded))
            });
            match outcome {
                Ok((module, loaded)) => {
                    info!(
                        plugin = %loaded.name,
                        path = %path.display(),
                        functions = loaded.functions.len(),
                        "plugin loaded"
                    );
                    report.loaded.push(loaded);
                    context.insert(path, module);
                }
                Err(err) => {
                    warn!(path = %path.display(), %err, "plugin skipped");
                    report.skipped.push(SkippedCandidate {
                        path,
                        reason: err.to_string(),
                    });
                }
            }
        }

        (context, report)
    }

    fn open(&self, path: &Path) -> Result<Arc<dyn PluginModule>, PluginError> {
        panic::catch_unwind(AssertUnwindSafe(|| self.opener.open(path)))
            .unwrap_or_else(|payload| Err(PluginError::Panicked(panic_message(&*payload))))
    }

    /// Register `module` into `registry` as a whole or not at all; a panic
    /// while the module lists its functions leaves `registry` untouched.
    fn register_isolated(
        &self,
        path: &Path,
        module: &dyn PluginModule,
        registry: &mut FunctionRegistry,
        report: &mut LoadReport,
    ) -> Result<LoadedPlugin, PluginError> {
        let mut staged = registry.clone();
        let mut conflicts = Vec::new();
        let loaded = panic::catch_unwind(AssertUnwindSafe(|| {
            self.register(path, module, &mut staged, &mut conflicts)
        }))
        .map_err(|payload| PluginError::Panicked(panic_message(&*payload)))?;

        *registry = staged;
        report.conflicts.append(&mut conflicts);
        Ok(loaded)
    }

    fn register(
        &self,
        path: &Path,
        module: &dyn PluginModule,
        registry: &mut FunctionRegistry,
        conflicts: &mut Vec<NameConflict>,
    ) -> LoadedPlugin {
        let plugin = module.name().to_string();
        let mut registered = Vec::new();

        for function in module.functions() {
            let name = function.meta().name.into_owned();
            match registry.register(&name, function, SourceKind::Plugin(plugin.clone())) {
                Ok(()) => registered.push(name),
                Err(RegistryError::Conflict { existing, .. }) => {
                    if self.conflicts == ConflictReporting::Log {
                        warn!(
                            function = %name,
                            plugin = %plugin,
                            %existing,
                            "plugin function dropped, name already registered"
                        );
                    }
                    conflicts.push(NameConflict {
                        function: name,
                        plugin: plugin.clone(),
                        path: path.to_path_buf(),
                        existing,
                    });
                }
                Err(RegistryError::NotFound(_)) => {}
            }
        }

        LoadedPlugin {
            name: plugin,
            path: path.to_path_buf(),
            functions: registered,
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
