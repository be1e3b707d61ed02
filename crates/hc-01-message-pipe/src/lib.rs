//! # Message Pipe Subsystem (hc-01)
//!
//! Bounded, non-blocking, order-preserving message pipes used to feed each
//! peer's network writer. When the consumer stalls, the pipe drops the
//! oldest waiting element rather than blocking the producer, and reports
//! every element's lifecycle to registered listeners.
//!
//! ## Shape
//!
//! ```text
//! producers → in → [dispatcher] → out slot (cap=1) → consumer → done
//!                          ↘ queue (cap=C) ↗
//! ```
//!
//! Two implementations satisfy the same contract:
//! [`ChannelPipe`] runs a dedicated dispatcher task; [`MutexPipe`] performs
//! the same transitions under a mutex and never suspends a producer.
//!
//! ## Accounting invariant
//!
//! With `out` counting transitions into the out slot (the current occupant
//! included), after every event:
//!
//! `in == out + drop + queued`

pub mod channel_pipe;
pub mod listener;
pub mod mutex_pipe;
pub mod queue;

pub use channel_pipe::ChannelPipe;
pub use listener::{MultiListener, PipeEventListener, StatListener};
pub use mutex_pipe::MutexPipe;
pub use queue::PressableQueue;
