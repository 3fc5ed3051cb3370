use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// Handle of one query batch. Cloned into every request of the batch.
#[derive(Debug, Clone)]
pub struct BatchToken {
    id: u64,
    cancel: CancellationToken,
}

impl BatchToken {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }
}

/// Owner of the single live batch token.
#[derive(Debug, Default)]
pub struct BatchControl {
    next_id: AtomicU64,
    current: Mutex<Option<BatchToken>>,
}

impl BatchControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels the live batch (if any) and hands out a fresh token.
    ///
    /// The old token is cancelled before this returns, so no request of the
    /// new batch can be issued while the old one still counts as live.
    pub fn begin(&self) -> BatchToken {
        let token = BatchToken {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            cancel: CancellationToken::new(),
        };
        let mut current = self.current.lock();
        if let Some(prev) = current.replace(token.clone()) {
            prev.cancel.cancel();
        }
        token
    }

    /// Cancels the live batch without starting a new one.
    pub fn cancel(&self) {
        if let Some(prev) = self.current.lock().take() {
            prev.cancel.cancel();
        }
    }

    pub fn is_live(&self, token: &BatchToken) -> bool {
        !token.is_cancelled()
            && self
                .current
                .lock()
                .as_ref()
                .is_some_and(|cur| cur.id == token.id)
    }
}

#[cfg(test)]
mod tests {
    use super::BatchControl;

    #[test]
    fn new_batch_cancels_previous() {
        let control = BatchControl::new();
        let first = control.begin();
        assert!(control.is_live(&first));

        let second = control.begin();
        assert!(first.is_cancelled());
        assert!(!control.is_live(&first));
        assert!(control.is_live(&second));
        assert!(second.id() > first.id());
    }

    #[test]
    fn cancel_leaves_no_live_batch() {
        let control = BatchControl::new();
        let token = control.begin();
        control.cancel();
        assert!(token.is_cancelled());
        assert!(!control.is_live(&token));
    }

    #[tokio::test]
    async fn cancelled_future_resolves_after_supersede() {
        let control = BatchControl::new();
        let first = control.begin();
        let _second = control.begin();
        first.cancelled().await;
    }
}
