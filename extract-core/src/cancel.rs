//! Cooperative cancellation for extraction loops.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Token for cooperative cancellation of an extraction.
///
/// Checked before every model call. Clone is cheap and shares state, so one
/// clone can be handed to the orchestrator while another is cancelled from a
/// different task.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new cancellation token (not cancelled).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}
