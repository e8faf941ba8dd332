//! Single-flight gate.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// Mutual-exclusion token for mutating actions.
///
/// Acquisition is a compare-and-swap, so two callers can never both observe
/// the gate as free. The returned guard releases on drop, including during
/// unwinding.
#[derive(Debug, Default)]
pub struct Gate {
    busy: AtomicBool,
}

impl Gate {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            busy: AtomicBool::new(false),
        }
    }

    /// Take the gate if it is free. Never waits.
    #[must_use]
    pub fn try_acquire(self: &Arc<Self>) -> Option<GateGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| GateGuard {
                gate: Arc::clone(self),
            })
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Held while a mutating action runs.
#[derive(Debug)]
pub struct GateGuard {
    gate: Arc<Gate>,
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        self.gate.busy.store(false, Ordering::Release);
    }
}
