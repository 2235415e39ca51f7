//! Two-level run cancellation

use tokio_util::sync::CancellationToken;

/// Stop and abort signals for a run
///
/// `stop` lets the product in flight finish and be stored, then ends the run
/// at the next product boundary. `abort` also interrupts the product in
/// flight at its next throttle or backoff wait. Aborting implies stopping.
#[derive(Debug, Clone)]
pub struct RunControl {
    abort: CancellationToken,
    stop: CancellationToken,
}

impl RunControl {
    pub fn new() -> Self {
        let abort = CancellationToken::new();
        let stop = abort.child_token();
        Self { abort, stop }
    }

    /// Finish the current product, then end the run
    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// End the run without waiting for the current product
    pub fn abort(&self) {
        self.abort.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.is_cancelled()
    }

    /// Token cancelled by [`stop`](Self::stop) or [`abort`](Self::abort)
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Token cancelled only by [`abort`](Self::abort)
    pub fn abort_token(&self) -> CancellationToken {
        self.abort.clone()
    }
}

impl Default for RunControl {
    fn default() -> Self {
        Self::new()
    }
}
