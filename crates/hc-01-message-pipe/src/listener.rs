//! Pipe lifecycle listeners.
//!
//! A pipe reports three events per element: `on_in` when an input is
//! accepted, `on_drop` when an overflow evicts it, `on_out` when it moves to
//! the out slot. Listeners are composed once at pipe construction through
//! [`MultiListener`]; no allocation happens per event.

use std::sync::atomic::{AtomicU64, Ordering};

/// Observer of one pipe's element lifecycle.
///
/// Implementations must be cheap: they run inside the pipe's dispatcher or
/// under its lock.
pub trait PipeEventListener<T>: Send + Sync {
    /// An input was accepted into the pipe.
    fn on_in(&self, element: &T);
    /// An element was evicted by overflow and will never reach the out slot.
    fn on_drop(&self, element: &T);
    /// An element moved to the out slot.
    fn on_out(&self, element: &T);
}

/// Fans events out to a fixed set of listeners.
pub struct MultiListener<T> {
    listeners: Vec<Box<dyn PipeEventListener<T>>>,
}

impl<T> MultiListener<T> {
    pub fn new(listeners: Vec<Box<dyn PipeEventListener<T>>>) -> Self {
        Self { listeners }
    }
}

impl<T> PipeEventListener<T> for MultiListener<T> {
    fn on_in(&self, element: &T) {
        for l in &self.listeners {
            l.on_in(element);
        }
    }

    fn on_drop(&self, element: &T) {
        for l in &self.listeners {
            l.on_drop(element);
        }
    }

    fn on_out(&self, element: &T) {
        for l in &self.listeners {
            l.on_out(element);
        }
    }
}

/// Counts pipe events with atomics.
///
/// `out_count` counts transitions into the out slot, so the accounting
/// invariant reads `in == out + drop + queued` with the current slot
/// occupant included in `out`.
#[derive(Debug, Default)]
pub struct StatListener {
    in_count: AtomicU64,
    drop_count: AtomicU64,
    out_count: AtomicU64,
    /// Drops since the last element reached the out slot.
    consecutive_drops: AtomicU64,
}

impl StatListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_count(&self) -> u64 {
        self.in_count.load(Ordering::Relaxed)
    }

    pub fn drop_count(&self) -> u64 {
        self.drop_count.load(Ordering::Relaxed)
    }

    pub fn out_count(&self) -> u64 {
        self.out_count.load(Ordering::Relaxed)
    }

    pub fn consecutive_drops(&self) -> u64 {
        self.consecutive_drops.load(Ordering::Relaxed)
    }
}

impl<T> PipeEventListener<T> for StatListener {
    fn on_in(&self, _element: &T) {
        self.in_count.fetch_add(1, Ordering::Relaxed);
    }

    fn on_drop(&self, _element: &T) {
        self.drop_count.fetch_add(1, Ordering::Relaxed);
        self.consecutive_drops.fetch_add(1, Ordering::Relaxed);
    }

    fn on_out(&self, _element: &T) {
        self.out_count.fetch_add(1, Ordering::Relaxed);
        self.consecutive_drops.store(0, Ordering::Relaxed);
    }
}
