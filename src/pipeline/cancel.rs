use crate::error::PipelineError;
use crate::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative abort flag shared by one pipeline run.
///
/// Clones observe the same flag. Cancelling is one-way.
#[derive(Debug, Clone, Default)]
pub struct CancellationSignal {
    cancelled: Arc<AtomicBool>,
}

impl CancellationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once the signal has fired
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(PipelineError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let signal = CancellationSignal::new();
        let observer = signal.clone();

        assert!(observer.check().is_ok());
        signal.cancel();
        assert!(observer.is_cancelled());
        assert!(matches!(observer.check(), Err(PipelineError::Cancelled)));
    }

    #[test]
    fn test_independent_signals() {
        let old = CancellationSignal::new();
        let new = CancellationSignal::new();
        old.cancel();
        assert!(!new.is_cancelled());
    }
}
