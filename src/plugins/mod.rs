//! Plugin system: the [`Plugin`] trait, hook composition and the client registry.

mod base;
mod compose;
mod hooks;
mod registry;

pub use base::{FinallyContext, Plugin, PluginPriority, ResponseContext};
pub use compose::Composition;
pub use hooks::{FnPlugin, HookType};
pub use registry::PluginRegistry;
