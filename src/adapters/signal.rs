//! A minimal observable value.

use super::{Adapter, LoadingState};
use arc_swap::ArcSwap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Observable value. Reads are lock-free; subscribers are called on every
/// change, outside the subscriber lock.
pub struct Signal<T> {
    value: ArcSwap<T>,
    subscribers: Mutex<Vec<(SubscriptionId, Subscriber<T>)>>,
    next_id: AtomicU64,
}

impl<T: PartialEq + Send + Sync + 'static> Signal<T> {
    pub fn new(initial: T) -> Self {
        Self {
            value: ArcSwap::from_pointee(initial),
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn get(&self) -> Arc<T> {
        self.value.load_full()
    }

    /// Replace the value; subscribers run only if it changed.
    pub fn set(&self, value: T) {
        let value = Arc::new(value);
        let previous = self.value.swap(Arc::clone(&value));
        if *previous == *value {
            return;
        }
        let subscribers: Vec<Subscriber<T>> = match self.subscribers.lock() {
            Ok(subs) => subs.iter().map(|(_, f)| Arc::clone(f)).collect(),
            Err(_) => return,
        };
        for f in subscribers {
            f(&value);
        }
    }

    pub fn subscribe<C>(&self, callback: C) -> SubscriptionId
    where
        C: Fn(&T) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push((id, Arc::new(callback)));
        }
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        match self.subscribers.lock() {
            Ok(mut subs) => {
                let before = subs.len();
                subs.retain(|(sid, _)| *sid != id);
                subs.len() != before
            }
            Err(_) => false,
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("value", &**self.value.load())
            .finish()
    }
}

impl Default for Signal<bool> {
    fn default() -> Self {
        Self::new(false)
    }
}

impl LoadingState for Signal<bool> {
    fn set_loading(&self, loading: bool) {
        self.set(loading);
    }

    fn is_loading(&self) -> bool {
        *self.get()
    }
}

pub type SignalAdapter<F> = Adapter<Signal<bool>, F>;

impl<F> Adapter<Signal<bool>, F> {
    pub fn signal(factory: F) -> Self {
        Self::new(Signal::default(), factory)
    }
}
