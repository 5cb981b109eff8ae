//! In-flight request tracking.

use crate::plugins::{FinallyContext, HookType, Plugin};
use crate::transport::AbortController;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Point-in-time view of a client's in-flight requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InflightSnapshot {
    pub count: usize,
    pub ids: Vec<Uuid>,
}

/// Controllers of requests that have not finalized yet.
///
/// The lock is never held across an await.
#[derive(Debug, Default)]
pub(crate) struct InflightSet {
    controllers: Mutex<HashMap<Uuid, AbortController>>,
}

impl InflightSet {
    pub(crate) fn insert(&self, id: Uuid, controller: AbortController) {
        if let Ok(mut map) = self.controllers.lock() {
            map.insert(id, controller);
        }
    }

    pub(crate) fn remove(&self, id: &Uuid) {
        if let Ok(mut map) = self.controllers.lock() {
            map.remove(id);
        }
    }

    /// Abort every tracked controller and forget them.
    pub(crate) fn abort_all(&self) -> usize {
        let drained: Vec<AbortController> = match self.controllers.lock() {
            Ok(mut map) => map.drain().map(|(_, c)| c).collect(),
            Err(_) => return 0,
        };
        for controller in &drained {
            controller.abort();
        }
        drained.len()
    }

    pub(crate) fn snapshot(&self) -> InflightSnapshot {
        match self.controllers.lock() {
            Ok(map) => InflightSnapshot {
                count: map.len(),
                ids: map.keys().copied().collect(),
            },
            Err(_) => InflightSnapshot::default(),
        }
    }
}

/// Removes one request from the in-flight set when it finalizes. Runs last.
pub(crate) struct InflightTracker {
    set: Arc<InflightSet>,
    id: Uuid,
}

impl InflightTracker {
    pub(crate) fn new(set: Arc<InflightSet>, id: Uuid) -> Arc<dyn Plugin> {
        Arc::new(Self { set, id })
    }
}

#[async_trait]
impl Plugin for InflightTracker {
    fn name(&self) -> &str {
        "inflight-tracker"
    }

    fn priority(&self) -> i32 {
        i32::MAX
    }

    fn implements(&self, hook: HookType) -> bool {
        hook == HookType::OnFinally
    }

    async fn on_finally(&self, _ctx: &FinallyContext) {
        self.set.remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RequestConfig;

    #[tokio::test]
    async fn tracker_removes_its_request() {
        let set = Arc::new(InflightSet::default());
        let id = Uuid::new_v4();
        set.insert(id, AbortController::new());
        set.insert(Uuid::new_v4(), AbortController::new());
        assert_eq!(set.snapshot().count, 2);

        let tracker = InflightTracker::new(Arc::clone(&set), id);
        tracker
            .on_finally(&FinallyContext {
                config: Arc::new(RequestConfig::new("/")),
            })
            .await;
        let snap = set.snapshot();
        assert_eq!(snap.count, 1);
        assert!(!snap.ids.contains(&id));
    }

    #[test]
    fn abort_all_aborts_and_clears() {
        let set = InflightSet::default();
        let a = AbortController::new();
        let b = AbortController::new();
        set.insert(Uuid::new_v4(), a.clone());
        set.insert(Uuid::new_v4(), b.clone());
        assert_eq!(set.abort_all(), 2);
        assert!(a.is_aborted() && b.is_aborted());
        assert_eq!(set.snapshot().count, 0);
    }
}
