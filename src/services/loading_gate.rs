use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::errors::{StageError, StageResult};

/// Coarse "loading" flag shared by the engine and its mutators.
///
/// Hydration, commit and revert replace the whole store; while one of them holds the
/// gate every editing operation is refused with `StageError::Busy`.
#[derive(Clone, Default)]
pub struct LoadingGate {
    loading: Arc<AtomicBool>,
}

impl LoadingGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    pub fn ensure_idle(&self) -> StageResult<()> {
        if self.is_loading() {
            Err(StageError::Busy)
        } else {
            Ok(())
        }
    }

    /// Take the gate for a wholesale operation. Released when the guard drops.
    pub fn begin(&self, operation: &'static str) -> StageResult<LoadingGuard> {
        self.loading
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| StageError::Busy)?;
        debug!("Loading gate taken for {}", operation);

        Ok(LoadingGuard {
            loading: self.loading.clone(),
            operation,
        })
    }
}

pub struct LoadingGuard {
    loading: Arc<AtomicBool>,
    operation: &'static str,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.loading.store(false, Ordering::Release);
        debug!("Loading gate released after {}", self.operation);
    }
}
