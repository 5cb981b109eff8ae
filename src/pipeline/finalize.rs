//! Exactly-once `on_finally` execution for one consumption.

use crate::plugins::{FinallyContext, Plugin};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Runs the `on_finally` hooks of one materialization call at most once.
pub(crate) struct Finalizer {
    hooks: Vec<Arc<dyn Plugin>>,
    ctx: FinallyContext,
    done: AtomicBool,
}

impl Finalizer {
    pub(crate) fn new(hooks: Vec<Arc<dyn Plugin>>, ctx: FinallyContext) -> Arc<Self> {
        Arc::new(Self {
            hooks,
            ctx,
            done: AtomicBool::new(false),
        })
    }

    pub(crate) fn is_finalized(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }

    pub(crate) async fn finalize(&self) {
        if self.done.swap(true, Ordering::SeqCst) {
            return;
        }
        for plugin in &self.hooks {
            plugin.on_finally(&self.ctx).await;
        }
    }
}

/// Finalizes on [`finish`](Self::finish), or on drop when the consumer goes
/// away first (a stream dropped mid-way, a materializer future cancelled).
pub(crate) struct FinalizeGuard {
    finalizer: Option<Arc<Finalizer>>,
}

impl FinalizeGuard {
    pub(crate) fn new(finalizer: Arc<Finalizer>) -> Self {
        Self {
            finalizer: Some(finalizer),
        }
    }

    pub(crate) async fn finish(mut self) {
        if let Some(f) = self.finalizer.take() {
            f.finalize().await;
        }
    }
}

impl Drop for FinalizeGuard {
    fn drop(&mut self) {
        let Some(f) = self.finalizer.take() else {
            return;
        };
        if f.is_finalized() {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { f.finalize().await });
            }
            Err(_) => {
                tracing::warn!("consumer dropped outside a tokio runtime; on_finally hooks skipped")
            }
        }
    }
}
