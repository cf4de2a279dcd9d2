//! Plugin context
//!
//! The modules opened by one `load_all` pass. Functions registered from a
//! module hold their own handle to it, so the library stays mapped while
//! any of them is reachable; dropping the context together with the
//! registry built alongside it releases the whole set.

use crate::loader::PluginModule;
use std::path::{Path, PathBuf};
use std::sync::Arc;

struct LoadedModule {
    path: PathBuf,
    module: Arc<dyn PluginModule>,
}

#[derive(Default)]
pub struct PluginContext {
    modules: Vec<LoadedModule>,
}

impl PluginContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, path: PathBuf, module: Arc<dyn PluginModule>) {
        self.modules.push(LoadedModule { path, module });
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Plugin names with the file each was loaded from, in load order
    pub fn plugins(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.modules
            .iter()
            .map(|m| (m.module.name(), m.path.as_path()))
    }
}

impl std::fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.plugins()).finish()
    }
}
