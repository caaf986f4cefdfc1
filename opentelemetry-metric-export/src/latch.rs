use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{OTelSdkError, OTelSdkResult};

/// One-way `active → shut_down` state shared by every exporter variant.
///
/// Exporters compose a latch instead of inheriting shutdown behaviour:
/// `export` and `force_flush` call [`ensure_active`], `shutdown` calls
/// [`shut_down`] and only proceeds with teardown when it wins the transition.
///
/// [`ensure_active`]: ShutdownLatch::ensure_active
/// [`shut_down`]: ShutdownLatch::shut_down
#[derive(Debug, Default)]
pub struct ShutdownLatch {
    is_shutdown: AtomicBool,
}

impl ShutdownLatch {
    /// A latch in the `active` state.
    pub const fn new() -> Self {
        ShutdownLatch {
            is_shutdown: AtomicBool::new(false),
        }
    }

    /// Whether the latch has been tripped.
    pub fn is_shutdown(&self) -> bool {
        self.is_shutdown.load(Ordering::SeqCst)
    }

    /// `Ok` while active, the shutdown sentinel afterwards.
    pub fn ensure_active(&self) -> OTelSdkResult {
        if self.is_shutdown() {
            Err(OTelSdkError::AlreadyShutdown)
        } else {
            Ok(())
        }
    }

    /// Trip the latch.
    ///
    /// Exactly one caller ever gets `Ok`; that caller owns teardown. Every
    /// other call, concurrent or later, gets [`OTelSdkError::AlreadyShutdown`].
    pub fn shut_down(&self) -> OTelSdkResult {
        self.is_shutdown
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(|_| OTelSdkError::AlreadyShutdown)
    }
}
