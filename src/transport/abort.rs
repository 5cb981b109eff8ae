//! Abort primitive shared by a request and the transport it drives.

use tokio_util::sync::CancellationToken;

/// Owner side of a cancellation signal. Cloning shares the same signal.
#[derive(Debug, Clone, Default)]
pub struct AbortController {
    token: CancellationToken,
}

impl AbortController {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Signal cancellation. Idempotent.
    pub fn abort(&self) {
        self.token.cancel();
    }

    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            token: self.token.clone(),
        }
    }
}

/// Observer side handed to the transport.
#[derive(Debug, Clone)]
pub struct AbortSignal {
    token: CancellationToken,
}

impl AbortSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes once the owning controller aborts.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn abort_is_idempotent_and_observed() {
        let controller = AbortController::new();
        let signal = controller.signal();
        assert!(!signal.is_aborted());

        controller.abort();
        controller.abort();
        assert!(signal.is_aborted());
        tokio::time::timeout(Duration::from_millis(50), signal.cancelled())
            .await
            .expect("signal should already be cancelled");
    }

    #[test]
    fn separate_controllers_are_independent() {
        let a = AbortController::new();
        let b = AbortController::new();
        a.abort();
        assert!(!b.is_aborted());
    }
}
