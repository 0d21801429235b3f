//! Reload-in-progress flag shared between full reload and incremental sync.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared flag; set for the lifetime of a [`ReloadGuard`].
#[derive(Debug, Clone, Default)]
pub struct ReloadFlag {
    inner: Arc<AtomicBool>,
}

impl ReloadFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set(&self) -> bool {
        self.inner.load(Ordering::Acquire)
    }

    /// Set the flag if it is clear. `None` when another holder has it.
    pub fn try_acquire(&self) -> Option<ReloadGuard> {
        self.inner
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ReloadGuard {
                inner: self.inner.clone(),
            })
    }
}

/// Clears the flag when dropped, including on early return or panic.
#[derive(Debug)]
pub struct ReloadGuard {
    inner: Arc<AtomicBool>,
}

impl Drop for ReloadGuard {
    fn drop(&mut self) {
        self.inner.store(false, Ordering::Release);
    }
}
