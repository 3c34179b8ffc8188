//! Termination signal capture.

use ::signal_hook::{consts::SIGTERM, flag, low_level, SigId};
use ::std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use ::tracing::debug;

use crate::errors::{Context, Result};

/// A RAII registration which, while held, records delivery of `SIGTERM`.
///
/// The handler itself only stores the signal number in an atomic. Everything
/// else (wake-up timer reset, logging, stopping the main loop) happens when
/// the main loop next calls [`take`], outside of signal context. The handler is
/// installed with `SA_RESTART`, so blocking system calls on the main thread
/// are resumed rather than failing with `EINTR`.
///
/// [`take`]: Self::take
#[derive(Debug)]
pub(crate) struct TermSignal {
    /// The most recently delivered signal number, or zero.
    pending: Arc<AtomicUsize>,
    id: SigId,
}

impl TermSignal {
    pub(crate) fn register() -> Result<Self> {
        debug!("Installing SIGTERM handler");
        let pending = Arc::new(AtomicUsize::new(0));
        let id = flag::register_usize(SIGTERM, Arc::clone(&pending), SIGTERM as usize)
            .context("Failed to install SIGTERM handler")
            .function("sigaction")?;

        Ok(Self { pending, id })
    }

    /// Returns the number of a signal delivered since the last call, if any.
    pub(crate) fn take(&self) -> Option<i32> {
        match self.pending.swap(0, Ordering::SeqCst) {
            0 => None,
            signo => Some(signo as i32),
        }
    }
}

impl Drop for TermSignal {
    fn drop(&mut self) {
        debug!("Removing SIGTERM handler");
        low_level::unregister(self.id);
    }
}
