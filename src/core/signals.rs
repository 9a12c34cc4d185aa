//! Shared progress and abort signals.
//!
//! The engine runs long operations (download, unzip, copy) synchronously on
//! one worker thread; the only channel back to the host UI is this set of
//! atomics, polled by the host on its own cadence. Producers store with
//! `Release`, consumers load with `Acquire` — the counters are the entire
//! payload, nothing else is published through them.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

/// Sentinel meaning "not running / aborted / failed".
pub const PROGRESS_IDLE: i32 = -1;

/// Progress percentage plus a cooperative abort flag for one operation class.
#[derive(Debug)]
pub struct ProgressChannel {
    percent: AtomicI32,
    abort: AtomicBool,
}

impl Default for ProgressChannel {
    fn default() -> Self {
        Self {
            percent: AtomicI32::new(PROGRESS_IDLE),
            abort: AtomicBool::new(false),
        }
    }
}

impl ProgressChannel {
    /// Marks the operation as started: percent 0, abort flag cleared.
    pub fn begin(&self) {
        self.abort.store(false, Ordering::Release);
        self.percent.store(0, Ordering::Release);
    }

    pub fn set_percent(&self, percent: i32) {
        self.percent.store(percent.clamp(0, 100), Ordering::Release);
    }

    pub fn percent(&self) -> i32 {
        self.percent.load(Ordering::Acquire)
    }

    /// Marks success.
    pub fn finish(&self) {
        self.percent.store(100, Ordering::Release);
    }

    /// Marks abort or failure; the host cannot distinguish the two.
    pub fn reset(&self) {
        self.percent.store(PROGRESS_IDLE, Ordering::Release);
    }

    /// Requests cooperative cancellation. Observed at the next chunk
    /// boundary inside the running operation, never preemptively.
    pub fn request_abort(&self) {
        self.abort.store(true, Ordering::Release);
    }

    pub fn abort_requested(&self) -> bool {
        self.abort.load(Ordering::Acquire)
    }
}

/// One channel per long-running operation class, plus the advisory
/// "menu state changed underneath you" flag.
#[derive(Debug, Default)]
pub struct ProgressSignals {
    pub download: ProgressChannel,
    pub unzip: ProgressChannel,
    pub copy: ProgressChannel,
    needs_refresh: AtomicBool,
}

impl ProgressSignals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_needs_refresh(&self) {
        self.needs_refresh.store(true, Ordering::Release);
    }

    /// Reads and clears the refresh flag.
    pub fn take_needs_refresh(&self) -> bool {
        self.needs_refresh.swap(false, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_lifecycle() {
        let ch = ProgressChannel::default();
        assert_eq!(ch.percent(), PROGRESS_IDLE);
        ch.begin();
        assert_eq!(ch.percent(), 0);
        assert!(!ch.abort_requested());
        ch.set_percent(42);
        assert_eq!(ch.percent(), 42);
        ch.finish();
        assert_eq!(ch.percent(), 100);
        ch.reset();
        assert_eq!(ch.percent(), PROGRESS_IDLE);
    }

    #[test]
    fn begin_clears_stale_abort() {
        let ch = ProgressChannel::default();
        ch.request_abort();
        assert!(ch.abort_requested());
        ch.begin();
        assert!(!ch.abort_requested());
    }

    #[test]
    fn refresh_flag_is_taken_once() {
        let signals = ProgressSignals::new();
        assert!(!signals.take_needs_refresh());
        signals.mark_needs_refresh();
        assert!(signals.take_needs_refresh());
        assert!(!signals.take_needs_refresh());
    }

    #[test]
    fn set_percent_clamps() {
        let ch = ProgressChannel::default();
        ch.set_percent(250);
        assert_eq!(ch.percent(), 100);
        ch.set_percent(-5);
        assert_eq!(ch.percent(), 0);
    }
}
