//! Cooperative cancellation for enrichment runs
//!
//! The pipeline polls the token before reading each stub line. Batches that
//! were already committed stay in the store; in-flight batches are dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared stop flag. Clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    stop: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Request a stop at the next check
    pub fn cancel(&self) {
        self.stop.store(true, Ordering::Release);
    }
}
