//! Exponentially-weighted moving-rate estimator.

use std::sync::atomic::{AtomicI64, Ordering};

use parking_lot::Mutex;

use hc_01_message_pipe::PressableQueue;

/// Per-direction byte-rate estimator.
///
/// `add_bytes` is lock-free and callable from the I/O hot path; exactly one
/// ticker thread calls `tick` at a fixed interval `Δ`. Readers observe the
/// snapshot published by the most recent tick.
///
/// The estimator keeps a window of the last `window_size` per-tick counts
/// (`window_size = round(mean_time / Δ)`, at least 1) and publishes
///
/// - `aps = subtotal / window.size() / Δ` (integer), and
/// - `load_score = count + ⌊load_score × decay⌋` with
///   `decay = exp(-Δ / mean_time)`.
pub struct ExponentMeter {
    /// Bytes accumulated since the last tick.
    uncounted: AtomicI64,
    aps_value: AtomicI64,
    load_score: AtomicI64,
    decay_factor: f64,
    interval_secs: i64,
    window: Mutex<WindowState>,
}

struct WindowState {
    window: PressableQueue<i64>,
    subtotal: i64,
}

/// 5-minute mean time, the default for peer traffic.
pub const MEAN_TIME_5M: u32 = 5 * 60;
/// 15-minute mean time, for slower-moving aggregates.
pub const MEAN_TIME_15M: u32 = 15 * 60;

impl ExponentMeter {
    pub fn new(mean_time_secs: u32, interval_secs: u32) -> Self {
        assert!(interval_secs >= 1, "tick interval must be at least 1s");
        let window_size =
            (((mean_time_secs + interval_secs / 2) / interval_secs) as usize).max(1);
        Self {
            uncounted: AtomicI64::new(0),
            aps_value: AtomicI64::new(0),
            load_score: AtomicI64::new(0),
            decay_factor: (-(interval_secs as f64) / mean_time_secs as f64).exp(),
            interval_secs: interval_secs as i64,
            window: Mutex::new(WindowState {
                window: PressableQueue::new(window_size),
                subtotal: 0,
            }),
        }
    }

    /// Meter with a 5-minute mean time.
    pub fn five_minute(interval_secs: u32) -> Self {
        Self::new(MEAN_TIME_5M, interval_secs)
    }

    /// Meter with a 15-minute mean time.
    pub fn fifteen_minute(interval_secs: u32) -> Self {
        Self::new(MEAN_TIME_15M, interval_secs)
    }

    /// Record `n` bytes. Lock-free; any thread.
    pub fn add_bytes(&self, n: i64) {
        self.uncounted.fetch_add(n, Ordering::Relaxed);
    }

    /// Fold the bytes accumulated since the previous tick into the window
    /// and publish the new rate and load score.
    ///
    /// Must be invoked by a single thread at a fixed interval.
    pub fn tick(&self) {
        let count = self.uncounted.swap(0, Ordering::Relaxed);

        let mut st = self.window.lock();
        st.subtotal += count;
        if let Some(evicted) = st.window.press(count) {
            st.subtotal -= evicted;
        }
        debug_assert!(st.subtotal >= 0, "window subtotal went negative");
        let aps = st.subtotal / (st.window.size() as i64 * self.interval_secs);
        drop(st);

        self.aps_value.store(aps, Ordering::Relaxed);
        let prev = self.load_score.load(Ordering::Relaxed);
        let decayed = (prev as f64 * self.decay_factor).floor() as i64;
        self.load_score.store(count + decayed, Ordering::Relaxed);
    }

    /// Mean byte rate over the window, as of the last tick.
    pub fn aps(&self) -> i64 {
        self.aps_value.load(Ordering::Relaxed)
    }

    /// Exponentially decayed recent traffic magnitude, as of the last tick.
    pub fn load_score(&self) -> i64 {
        self.load_score.load(Ordering::Relaxed)
    }
}
