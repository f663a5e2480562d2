//! Observable pipeline state container

use super::cancel::CancellationSignal;
use crate::error::PipelineError;
use crate::models::PipelineSnapshot;
use crate::Result;
use tokio::sync::watch;

/// Owns the snapshot. Observers only ever see clones or a receiver.
pub struct PipelineStore {
    tx: watch::Sender<PipelineSnapshot>,
}

impl PipelineStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(PipelineSnapshot::default());
        Self { tx }
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PipelineSnapshot> {
        self.tx.subscribe()
    }

    /// Mutate on behalf of a run. The signal is checked under the channel
    /// lock, so a run cancelled by `reset` can never write afterwards.
    pub fn apply<F>(&self, signal: &CancellationSignal, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut PipelineSnapshot),
    {
        self.try_apply(signal, |snapshot| {
            mutate(snapshot);
            Ok(())
        })
    }

    /// Like [`apply`](Self::apply), but the closure may refuse the change.
    /// A refused change is not published, so refuse before touching the snapshot.
    pub fn try_apply<T, F>(&self, signal: &CancellationSignal, mutate: F) -> Result<T>
    where
        F: FnOnce(&mut PipelineSnapshot) -> Result<T>,
    {
        let mut outcome: Result<T> = Err(PipelineError::Cancelled);
        self.tx.send_if_modified(|snapshot| {
            if signal.is_cancelled() {
                return false;
            }
            outcome = mutate(snapshot);
            outcome.is_ok()
        });
        outcome
    }

    /// Unconditional mutation, used by start and reset
    pub fn replace<F>(&self, mutate: F)
    where
        F: FnOnce(&mut PipelineSnapshot),
    {
        self.tx.send_modify(mutate);
    }
}

impl Default for PipelineStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PipelineStage;

    #[test]
    fn test_apply_publishes_to_subscribers() {
        let store = PipelineStore::new();
        let mut rx = store.subscribe();
        let signal = CancellationSignal::new();

        store
            .apply(&signal, |s| s.state.current_stage = PipelineStage::Encrypting)
            .unwrap();

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().state.current_stage, PipelineStage::Encrypting);
    }

    #[test]
    fn test_cancelled_signal_cannot_write() {
        let store = PipelineStore::new();
        let mut rx = store.subscribe();
        let signal = CancellationSignal::new();
        signal.cancel();

        let result = store.apply(&signal, |s| s.state.current_stage = PipelineStage::Uploading);

        assert!(matches!(result, Err(PipelineError::Cancelled)));
        assert_eq!(store.snapshot().state.current_stage, PipelineStage::Idle);
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_refused_change_is_not_published() {
        let store = PipelineStore::new();
        let mut rx = store.subscribe();
        let signal = CancellationSignal::new();

        let result: Result<()> = store.try_apply(&signal, |_| {
            Err(PipelineError::SettlementUnavailable("nothing to settle".to_string()))
        });

        assert!(matches!(result, Err(PipelineError::SettlementUnavailable(_))));
        assert!(!rx.has_changed().unwrap());
    }
}
