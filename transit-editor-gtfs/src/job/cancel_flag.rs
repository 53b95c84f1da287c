use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::gtfs_error::GtfsError;

/// best-effort cancellation shared between a job and its host. pipelines check
/// it between stages; once a pipeline has committed it is ignored.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> CancelFlag {
        CancelFlag::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// fails with [`GtfsError::Cancelled`] once cancellation was requested.
    pub fn check(&self) -> Result<(), GtfsError> {
        if self.is_cancelled() {
            Err(GtfsError::Cancelled)
        } else {
            Ok(())
        }
    }
}
