//! Mutex-driven pipe variant.
//!
//! No dispatcher task: every transition happens inside `put`, `take_out` or
//! `done` while holding the pipe's mutex. Producers never suspend; a `put`
//! against a full pipe presses the wait queue and reports the eviction.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::listener::PipeEventListener;
use crate::queue::PressableQueue;

struct PipeState<T> {
    queue: PressableQueue<T>,
    out_slot: Option<T>,
    stopped: bool,
}

/// Synchronous implementation of the message-pipe contract.
///
/// The consumer loop is `take_out` → process → `done`; `done` promotes the
/// queue head into the freed slot. `close` is terminal: later `put`s return
/// `false` without touching state, queued elements are discarded, and a
/// still-occupied out slot is left for final consumption.
pub struct MutexPipe<T> {
    state: Mutex<PipeState<T>>,
    listener: Arc<dyn PipeEventListener<T>>,
}

impl<T> MutexPipe<T> {
    pub fn new(capacity: usize, listener: Arc<dyn PipeEventListener<T>>) -> Self {
        Self {
            state: Mutex::new(PipeState {
                queue: PressableQueue::new(capacity),
                out_slot: None,
                stopped: false,
            }),
            listener,
        }
    }

    /// Offer an element to the pipe. Never blocks.
    ///
    /// Returns `false` only after `close`; an overflow is not a failure, it
    /// evicts the oldest waiting element instead.
    pub fn put(&self, element: T) -> bool {
        let mut st = self.state.lock();
        if st.stopped {
            return false;
        }
        self.listener.on_in(&element);
        if st.out_slot.is_none() {
            if st.queue.is_empty() {
                self.listener.on_out(&element);
                st.out_slot = Some(element);
            } else {
                // Transitional state: promote the queue head first so order
                // is preserved, then park the newcomer.
                let head = st.queue.poll().expect("queue checked non-empty");
                self.listener.on_out(&head);
                st.out_slot = Some(head);
                st.queue.offer(element);
            }
        } else if let Some(dropped) = st.queue.press(element) {
            self.listener.on_drop(&dropped);
        }
        true
    }

    /// Take the element currently in the out slot, if any.
    pub fn take_out(&self) -> Option<T> {
        self.state.lock().out_slot.take()
    }

    /// Signal that the last taken element is fully consumed, promoting the
    /// queue head into the out slot.
    pub fn done(&self) {
        let mut st = self.state.lock();
        if st.out_slot.is_none() {
            if let Some(head) = st.queue.poll() {
                self.listener.on_out(&head);
                st.out_slot = Some(head);
            }
        }
    }

    /// Stop the pipe. Terminal; queued elements are dropped silently.
    pub fn close(&self) {
        let mut st = self.state.lock();
        st.stopped = true;
        while st.queue.poll().is_some() {}
    }

    /// Number of elements waiting behind the out slot.
    pub fn queued(&self) -> usize {
        self.state.lock().queue.size()
    }
}
