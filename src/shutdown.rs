//! Early-termination handling.
//!
//! SIGINT/SIGTERM should stop the capture and still produce a report, so
//! the signal handler only raises a flag that the main wait loop polls. The
//! token is passed explicitly to whoever needs to observe or request
//! cancellation; the static flag behind it exists only because a signal
//! handler cannot capture state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

static CANCELLED: AtomicBool = AtomicBool::new(false);

/// Only an atomic store: the handler must stay async-signal-safe.
extern "C" fn handle_signal(_signal: libc::c_int) {
    CANCELLED.store(true, Ordering::SeqCst);
}

/// Cancellation token shared between the signal handler and the capture's
/// main wait loop.
#[derive(Debug, Clone, Copy)]
pub struct ShutdownToken {
    _private: (),
}

impl ShutdownToken {
    /// Install the SIGINT/SIGTERM handlers and return the token.
    pub fn install() -> Self {
        let handler = handle_signal as extern "C" fn(libc::c_int);
        unsafe {
            libc::signal(libc::SIGINT, handler as libc::sighandler_t);
            libc::signal(libc::SIGTERM, handler as libc::sighandler_t);
        }

        Self { _private: () }
    }

    /// Token without signal handlers, for callers that only need the
    /// programmatic side.
    pub fn new() -> Self {
        Self { _private: () }
    }

    /// Request cancellation, as a received signal would.
    pub fn cancel(&self) {
        CANCELLED.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        CANCELLED.load(Ordering::SeqCst)
    }

    /// Block for `duration` or until cancelled, whichever comes first.
    /// Returns true when the wait ended through cancellation.
    ///
    /// The deadline is measured with `Instant` so wall-clock steps (NTP
    /// sync shortly after boot) cannot shorten or stretch the capture
    /// window.
    pub fn wait(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;

        loop {
            if self.is_cancelled() {
                return true;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return self.is_cancelled();
            }

            thread::sleep(remaining.min(Duration::from_millis(100)));
        }
    }
}

impl Default for ShutdownToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The cancelled flag is process-wide, so these tests share one token
    // and run in sequence within a single test body.
    #[test]
    fn test_wait_and_cancel() {
        let token = ShutdownToken::new();
        assert!(!token.is_cancelled());

        // Uncancelled wait runs to the deadline
        let start = Instant::now();
        let cancelled = token.wait(Duration::from_millis(120));
        assert!(!cancelled);
        assert!(start.elapsed() >= Duration::from_millis(120));

        // Cancellation short-circuits the wait
        token.cancel();
        let start = Instant::now();
        let cancelled = token.wait(Duration::from_secs(60));
        assert!(cancelled);
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
