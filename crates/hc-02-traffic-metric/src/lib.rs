//! # Traffic Metric Subsystem (hc-02)
//!
//! Per-peer byte-rate estimation used for admission and scheduling
//! decisions. Transport code reports every successful byte movement through
//! [`MsgIoListener`]; a single registry ticker periodically folds the
//! accumulated counts into a windowed mean rate and an exponentially
//! decaying load score per direction.
//!
//! ## Data flow
//!
//! ```text
//! counting reader/writer → MsgIoListener → PeerTrafficMetric
//!                                               │ add_bytes (lock-free)
//!                                               ▼
//! MetricsRegistry ── tick every Δ ──→ ExponentMeter (rate, load score)
//! ```

pub mod meter;
pub mod peer_metric;
pub mod registry;

pub use meter::ExponentMeter;
pub use peer_metric::{MsgIoListener, PeerTrafficMetric};
pub use registry::{MetricsRegistry, MetricsSummary};
