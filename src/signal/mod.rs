//! Cancellation and interrupt handling
//!
//! A `CancelToken` is shared between the build driver and whoever may stop
//! the build: fail-fast after a unit failure, or the user pressing Ctrl-C.
//! Cancellation is cooperative. Units already running finish their current
//! step; units not yet started are reported as skipped.
//!
//! On a second SIGINT the process exits immediately with code 130.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use tracing::warn;

/// Exit code used when a second interrupt forces an immediate exit
pub const EXIT_CODE_INTERRUPTED: i32 = 130;

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Returns true if this call made the transition.
    pub fn cancel(&self) -> bool {
        !self.cancelled.swap(true, Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Action to take after receiving a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    /// First signal: stop starting new units
    InitiateCancellation,
    /// Second signal: exit immediately
    ImmediateExit,
    /// Third+ signal: ignore
    Ignore,
}

/// Interrupt handler that cancels a token
#[derive(Debug, Clone)]
pub struct SignalHandler {
    token: CancelToken,
    signal_count: Arc<AtomicU8>,
}

impl SignalHandler {
    pub fn new(token: CancelToken) -> Self {
        Self {
            token,
            signal_count: Arc::new(AtomicU8::new(0)),
        }
    }

    /// Record one received signal and decide what to do
    pub fn handle_signal(&self) -> SignalAction {
        let count = self.signal_count.fetch_add(1, Ordering::SeqCst);

        match count {
            0 => {
                self.token.cancel();
                SignalAction::InitiateCancellation
            }
            1 => SignalAction::ImmediateExit,
            _ => SignalAction::Ignore,
        }
    }

    /// Install the SIGINT/SIGTERM handler.
    ///
    /// Must be called at most once per process.
    pub fn install(&self) -> Result<(), ctrlc::Error> {
        let handler = self.clone();
        ctrlc::set_handler(move || match handler.handle_signal() {
            SignalAction::InitiateCancellation => {
                warn!("interrupt received, finishing running units (press Ctrl-C again to abort)");
            }
            SignalAction::ImmediateExit => {
                eprintln!("\nReceived second interrupt, exiting immediately...");
                std::process::exit(EXIT_CODE_INTERRUPTED);
            }
            SignalAction::Ignore => {}
        })
    }
}
