//! Cross-thread interrupt flag.
//!
//! The CLI wires Ctrl-C to [`InterruptFlag::trigger`]; the execution
//! adapter polls it while waiting on a child process and the suite checks
//! it between scenarios.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cloneable interrupt signal backed by an atomic.
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag {
    triggered: Arc<AtomicBool>,
}

impl InterruptFlag {
    /// Create a new flag in the un-triggered state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the flag. All clones observe `true` immediately.
    pub fn trigger(&self) {
        self.triggered.store(true, Ordering::Release);
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let flag = InterruptFlag::new();
        let clone = flag.clone();
        assert!(!clone.is_triggered());
        flag.trigger();
        assert!(clone.is_triggered());
    }

    #[test]
    fn trigger_from_other_thread() {
        let flag = InterruptFlag::new();
        let remote = flag.clone();
        std::thread::spawn(move || remote.trigger()).join().unwrap();
        assert!(flag.is_triggered());
    }
}
