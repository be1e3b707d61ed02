//! Channel-driven pipe variant.
//!
//! A dedicated dispatcher task owns the wait queue and the out slot; the
//! handle only pushes events into channels, so producers never block and
//! all transitions are serialized in one place.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::listener::PipeEventListener;
use crate::queue::PressableQueue;

/// Asynchronous implementation of the message-pipe contract.
///
/// Created with [`ChannelPipe::open`], which spawns the dispatcher and
/// returns the out-slot receiver (capacity 1). The consumer loop is
/// `recv().await` → process → [`ChannelPipe::done`].
pub struct ChannelPipe<T> {
    in_tx: mpsc::UnboundedSender<T>,
    done_tx: mpsc::UnboundedSender<()>,
    stop_tx: mpsc::Sender<()>,
    closed: AtomicBool,
}

impl<T: Send + 'static> ChannelPipe<T> {
    /// Spawn the dispatcher and return the pipe handle plus the out-slot
    /// receiver. Must be called from within a tokio runtime.
    pub fn open(
        capacity: usize,
        listener: Arc<dyn PipeEventListener<T>>,
    ) -> (Arc<ChannelPipe<T>>, mpsc::Receiver<T>) {
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = mpsc::channel(1);
        let (out_tx, out_rx) = mpsc::channel(1);

        tokio::spawn(dispatch(capacity, listener, in_rx, done_rx, stop_rx, out_tx));

        let pipe = Arc::new(ChannelPipe {
            in_tx,
            done_tx,
            stop_tx,
            closed: AtomicBool::new(false),
        });
        (pipe, out_rx)
    }

    /// Offer an element. Never blocks; returns `false` after `close`.
    pub fn put(&self, element: T) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        self.in_tx.send(element).is_ok()
    }

    /// Signal that the last received element is fully consumed.
    pub fn done(&self) {
        let _ = self.done_tx.send(());
    }

    /// Stop the dispatcher. Terminal; queued elements are dropped, an
    /// undelivered out-slot element stays readable on the receiver.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let _ = self.stop_tx.try_send(());
    }
}

async fn dispatch<T: Send + 'static>(
    capacity: usize,
    listener: Arc<dyn PipeEventListener<T>>,
    mut in_rx: mpsc::UnboundedReceiver<T>,
    mut done_rx: mpsc::UnboundedReceiver<()>,
    mut stop_rx: mpsc::Receiver<()>,
    out_tx: mpsc::Sender<T>,
) {
    let mut queue = PressableQueue::new(capacity);

    loop {
        tokio::select! {
            biased;
            _ = stop_rx.recv() => {
                debug!("pipe dispatcher stopping");
                break;
            }
            Some(()) = done_rx.recv() => {
                if out_tx.capacity() > 0 {
                    if let Some(head) = queue.poll() {
                        push_out(&listener, &out_tx, head);
                    }
                }
            }
            maybe = in_rx.recv() => {
                let Some(element) = maybe else { break };
                listener.on_in(&element);
                if out_tx.capacity() > 0 && queue.is_empty() {
                    push_out(&listener, &out_tx, element);
                } else if let Some(dropped) = queue.press(element) {
                    listener.on_drop(&dropped);
                }
            }
        }
    }
    // Dropping out_tx closes the out channel once the consumer drains any
    // element still sitting in the slot.
}

fn push_out<T>(listener: &Arc<dyn PipeEventListener<T>>, out_tx: &mpsc::Sender<T>, element: T) {
    listener.on_out(&element);
    if out_tx.try_send(element).is_err() {
        warn!("pipe consumer is gone; discarding out-slot element");
    }
}
