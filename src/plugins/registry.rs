//! Plugin registry.

use super::base::Plugin;
use super::compose::Composition;
use arc_swap::ArcSwap;
use std::sync::Arc;

/// The plugin set of one client, composed once per change.
///
/// Readers take a lock-free snapshot of the cached [`Composition`];
/// `register` rebuilds it.
pub struct PluginRegistry {
    plugins: ArcSwap<Vec<Arc<dyn Plugin>>>,
    composition: ArcSwap<Composition>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::with_plugins(Vec::new())
    }

    pub fn with_plugins(plugins: Vec<Arc<dyn Plugin>>) -> Self {
        let composition = Composition::compose(&plugins);
        Self {
            plugins: ArcSwap::from_pointee(plugins),
            composition: ArcSwap::from_pointee(composition),
        }
    }

    pub fn register(&self, plugin: Arc<dyn Plugin>) {
        tracing::debug!(plugin = plugin.name(), priority = plugin.priority(), "registering plugin");
        self.plugins.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(Arc::clone(&plugin));
            next
        });
        let composition = Composition::compose(&self.plugins.load());
        self.composition.store(Arc::new(composition));
    }

    pub fn composition(&self) -> Arc<Composition> {
        self.composition.load_full()
    }

    pub fn list(&self) -> Vec<Arc<dyn Plugin>> {
        self.plugins.load().as_ref().clone()
    }

    pub fn count(&self) -> usize {
        self.plugins.load().len()
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("composition", &self.composition.load())
            .finish()
    }
}
