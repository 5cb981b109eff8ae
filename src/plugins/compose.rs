//! Priority ordering and per-hook pipelines.

use super::base::Plugin;
use super::hooks::HookType;
use std::fmt;
use std::sync::Arc;

/// Plugins ordered by priority and split into one list per hook.
///
/// Ordering is a stable sort on [`Plugin::priority`]: lower first, ties keep
/// registration order. A plugin only appears in the lists of hooks it
/// [implements](Plugin::implements). Names play no part; registering the same
/// plugin twice runs it twice.
#[derive(Clone, Default)]
pub struct Composition {
    ordered: Vec<Arc<dyn Plugin>>,
    pub before_request: Vec<Arc<dyn Plugin>>,
    pub after_response: Vec<Arc<dyn Plugin>>,
    pub before_stream: Vec<Arc<dyn Plugin>>,
    pub transform_stream_chunk: Vec<Arc<dyn Plugin>>,
    pub on_error: Vec<Arc<dyn Plugin>>,
    pub on_finally: Vec<Arc<dyn Plugin>>,
}

impl Composition {
    pub fn compose(plugins: &[Arc<dyn Plugin>]) -> Self {
        let mut ordered = plugins.to_vec();
        ordered.sort_by_key(|p| p.priority());

        let pick = |hook: HookType| -> Vec<Arc<dyn Plugin>> {
            ordered
                .iter()
                .filter(|p| p.implements(hook))
                .cloned()
                .collect()
        };

        Self {
            before_request: pick(HookType::BeforeRequest),
            after_response: pick(HookType::AfterResponse),
            before_stream: pick(HookType::BeforeStream),
            transform_stream_chunk: pick(HookType::TransformStreamChunk),
            on_error: pick(HookType::OnError),
            on_finally: pick(HookType::OnFinally),
            ordered,
        }
    }

    /// Merge per-request plugins into this composition. Extras run after base
    /// plugins of equal priority.
    pub fn with_extras(self: &Arc<Self>, extras: &[Arc<dyn Plugin>]) -> Arc<Self> {
        if extras.is_empty() {
            return Arc::clone(self);
        }
        let mut all = self.ordered.clone();
        all.extend(extras.iter().cloned());
        Arc::new(Self::compose(&all))
    }

    /// Plugins in execution order.
    pub fn plugins(&self) -> &[Arc<dyn Plugin>] {
        &self.ordered
    }

    pub fn hook(&self, hook: HookType) -> &[Arc<dyn Plugin>] {
        match hook {
            HookType::BeforeRequest => &self.before_request,
            HookType::AfterResponse => &self.after_response,
            HookType::BeforeStream => &self.before_stream,
            HookType::TransformStreamChunk => &self.transform_stream_chunk,
            HookType::OnError => &self.on_error,
            HookType::OnFinally => &self.on_finally,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}

impl fmt::Debug for Composition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = |list: &[Arc<dyn Plugin>]| -> Vec<String> {
            list.iter().map(|p| p.name().to_string()).collect()
        };
        f.debug_struct("Composition")
            .field("plugins", &names(&self.ordered))
            .field("before_request", &names(&self.before_request))
            .field("on_error", &names(&self.on_error))
            .field("on_finally", &names(&self.on_finally))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::FnPlugin;

    fn named(name: &str, priority: i32) -> Arc<dyn Plugin> {
        FnPlugin::new(name)
            .with_priority(priority)
            .before_request(Ok)
            .build()
    }

    fn order(list: &[Arc<dyn Plugin>]) -> Vec<String> {
        list.iter().map(|p| p.name().to_string()).collect()
    }

    #[test]
    fn lower_priority_runs_first() {
        let c = Composition::compose(&[named("p5", 5), named("p1", 1), named("p3", 3)]);
        assert_eq!(order(&c.before_request), vec!["p1", "p3", "p5"]);
    }

    #[test]
    fn ties_keep_registration_order() {
        let c = Composition::compose(&[named("a", 0), named("b", -1), named("c", 0), named("d", 0)]);
        assert_eq!(order(c.plugins()), vec!["b", "a", "c", "d"]);
    }

    #[test]
    fn hooks_filtered_by_implementation() {
        let only_error = FnPlugin::new("err").on_error(|e, _| e).build();
        let c = Composition::compose(&[named("req", 0), only_error]);
        assert_eq!(order(&c.before_request), vec!["req"]);
        assert_eq!(order(&c.on_error), vec!["err"]);
        assert!(c.hook(HookType::OnFinally).is_empty());
    }

    #[test]
    fn same_name_is_not_deduplicated() {
        let c = Composition::compose(&[named("x", 0), named("x", 0)]);
        assert_eq!(c.before_request.len(), 2);
    }

    #[test]
    fn extras_sort_after_equal_priority_base() {
        let base = Arc::new(Composition::compose(&[named("base", 0), named("late", 10)]));
        let merged = base.with_extras(&[named("extra", 0), named("early", -10)]);
        assert_eq!(order(merged.plugins()), vec!["early", "base", "extra", "late"]);
        assert!(Arc::ptr_eq(&base, &base.with_extras(&[])));
    }
}
