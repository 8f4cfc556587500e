//! Per-session cancellation signal

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Inner {
    cancelled: AtomicBool,
    lock: Mutex<()>,
    wake: Condvar,
}

/// Cooperative stop flag observed by both workers of a session
#[derive(Clone, Default)]
pub struct StopSignal {
    inner: Arc<Inner>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        let _guard = match self.inner.lock.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.inner.wake.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Sleep up to `duration`, waking early on cancel. Returns true if cancelled.
    pub fn sleep(&self, duration: Duration) -> bool {
        let guard = match self.inner.lock.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        let result = self
            .inner
            .wake
            .wait_timeout_while(guard, duration, |_| !self.is_cancelled());
        drop(result);
        self.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_cancel_wakes_sleeper() {
        let signal = StopSignal::new();
        let sleeper = {
            let signal = signal.clone();
            std::thread::spawn(move || {
                let start = Instant::now();
                let cancelled = signal.sleep(Duration::from_secs(10));
                (cancelled, start.elapsed())
            })
        };
        std::thread::sleep(Duration::from_millis(20));
        signal.cancel();

        let (cancelled, elapsed) = sleeper.join().unwrap();
        assert!(cancelled);
        assert!(elapsed < Duration::from_secs(2));
    }

    #[test]
    fn test_sleep_times_out_without_cancel() {
        let signal = StopSignal::new();
        assert!(!signal.sleep(Duration::from_millis(5)));
        assert!(!signal.is_cancelled());
    }
}
