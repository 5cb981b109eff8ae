//! Loading state backed by a `tokio::sync::watch` channel.

use super::{Adapter, LoadingState};
use tokio::sync::watch as channel;

/// Loading flag published on a watch channel.
#[derive(Debug)]
pub struct WatchLoading {
    tx: channel::Sender<bool>,
}

impl WatchLoading {
    pub fn new() -> Self {
        let (tx, _) = channel::channel(false);
        Self { tx }
    }

    /// Receiver observing every loading change.
    pub fn subscribe(&self) -> channel::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for WatchLoading {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadingState for WatchLoading {
    fn set_loading(&self, loading: bool) {
        self.tx.send_if_modified(|current| {
            let changed = *current != loading;
            *current = loading;
            changed
        });
    }

    fn is_loading(&self) -> bool {
        *self.tx.borrow()
    }
}

pub type WatchAdapter<F> = Adapter<WatchLoading, F>;

impl<F> Adapter<WatchLoading, F> {
    pub fn watch(factory: F) -> Self {
        Self::new(WatchLoading::new(), factory)
    }
}
