use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative stop request for an in-flight turn.
///
/// The loop polls the signal between iterations, never mid-stage, and a
/// set signal terminates the turn through the normal path so the feedback
/// guarantee still runs.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    stopped: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests termination of the turn currently observing this signal.
    pub fn request(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Re-arms the signal before a new turn starts.
    pub fn clear(&self) {
        self.stopped.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::StopSignal;

    #[test]
    fn request_is_visible_through_clones() {
        let signal = StopSignal::new();
        let observer = signal.clone();
        assert!(!observer.is_requested());

        signal.request();
        assert!(observer.is_requested());

        signal.clear();
        assert!(!observer.is_requested());
    }
}
