//! Per-peer traffic metric: one meter per direction plus running totals.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::SystemTime;

use shared_types::{PeerId, SubProtocol};

use crate::meter::ExponentMeter;

/// Sink for byte-count events from the transport.
///
/// Invoked on every successful byte movement; implementations must be cheap
/// and lock-free on the hot path.
pub trait MsgIoListener: Send + Sync {
    fn on_read(&self, proto: SubProtocol, n: usize);
    fn on_write(&self, proto: SubProtocol, n: usize);
}

/// Traffic bookkeeping for a single peer.
///
/// Totals are monotonic and atomic; the rate meters follow the single-ticker
/// discipline of [`ExponentMeter`].
pub struct PeerTrafficMetric {
    peer_id: PeerId,
    /// Generation number assigned by the registry, for detecting stale
    /// removals after a reconnect.
    seq: u32,
    since: SystemTime,
    in_meter: ExponentMeter,
    out_meter: ExponentMeter,
    total_in: AtomicI64,
    total_out: AtomicI64,
}

impl PeerTrafficMetric {
    pub fn new(peer_id: PeerId, seq: u32, interval_secs: u32) -> Self {
        Self {
            peer_id,
            seq,
            since: SystemTime::now(),
            in_meter: ExponentMeter::five_minute(interval_secs),
            out_meter: ExponentMeter::five_minute(interval_secs),
            total_in: AtomicI64::new(0),
            total_out: AtomicI64::new(0),
        }
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    pub fn seq(&self) -> u32 {
        self.seq
    }

    pub fn since(&self) -> SystemTime {
        self.since
    }

    pub fn in_meter(&self) -> &ExponentMeter {
        &self.in_meter
    }

    pub fn out_meter(&self) -> &ExponentMeter {
        &self.out_meter
    }

    pub fn total_in(&self) -> i64 {
        self.total_in.load(Ordering::Relaxed)
    }

    pub fn total_out(&self) -> i64 {
        self.total_out.load(Ordering::Relaxed)
    }

    /// Tick both directions. Called by the registry ticker only.
    pub(crate) fn tick(&self) {
        self.in_meter.tick();
        self.out_meter.tick();
    }
}

impl MsgIoListener for PeerTrafficMetric {
    fn on_read(&self, _proto: SubProtocol, n: usize) {
        self.total_in.fetch_add(n as i64, Ordering::Relaxed);
        self.in_meter.add_bytes(n as i64);
    }

    fn on_write(&self, _proto: SubProtocol, n: usize) {
        self.total_out.fetch_add(n as i64, Ordering::Relaxed);
        self.out_meter.add_bytes(n as i64);
    }
}
