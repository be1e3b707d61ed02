//! Registry of per-peer traffic metrics with a shared ticker.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, SystemTime};

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tracing::{info, warn};

use shared_types::{short_form, PeerId};

use crate::peer_metric::PeerTrafficMetric;

/// Aggregate traffic numbers across live and departed peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSummary {
    pub total_in: i64,
    pub total_out: i64,
    pub peer_count: usize,
    pub since: SystemTime,
}

/// Holds one [`PeerTrafficMetric`] per connected peer and drives all their
/// meters from a single periodic ticker.
///
/// Mutations (peer add/remove) take the write lock; the ticker and lookups
/// take the read lock. Totals of departed peers are folded into dead
/// counters so `summary` stays monotonic.
pub struct MetricsRegistry {
    self_ref: Weak<MetricsRegistry>,
    metrics: RwLock<HashMap<PeerId, Arc<PeerTrafficMetric>>>,
    interval_secs: u32,
    start_time: SystemTime,
    dead_total_in: AtomicI64,
    dead_total_out: AtomicI64,
    ticker: Mutex<Option<TickerHandle>>,
}

struct TickerHandle {
    stop_tx: mpsc::Sender<()>,
    task: tokio::task::JoinHandle<()>,
}

impl MetricsRegistry {
    pub fn new(interval_secs: u32) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            metrics: RwLock::new(HashMap::new()),
            interval_secs,
            start_time: SystemTime::now(),
            dead_total_in: AtomicI64::new(0),
            dead_total_out: AtomicI64::new(0),
            ticker: Mutex::new(None),
        })
    }

    /// Register a metric for a newly admitted peer.
    ///
    /// A metric already present under the same id is replaced; that only
    /// happens when a peer reconnected faster than its removal was
    /// processed, so it is logged.
    pub fn new_metric(&self, pid: PeerId, seq: u32) -> Arc<PeerTrafficMetric> {
        let metric = Arc::new(PeerTrafficMetric::new(pid.clone(), seq, self.interval_secs));
        let mut map = self.metrics.write();
        if let Some(old) = map.insert(pid.clone(), metric.clone()) {
            warn!(
                peer_id = %short_form(&pid),
                old_seq = old.seq(),
                new_seq = seq,
                "metric for peer already exists, replacing"
            );
            self.fold_dead(&old);
        }
        metric
    }

    /// Drop the metric of a departing peer, folding its totals into the
    /// dead counters.
    ///
    /// A sequence mismatch means the removal raced a reconnect; it is
    /// logged but the removal still happens.
    pub fn remove(&self, pid: &PeerId, seq: u32) -> Option<Arc<PeerTrafficMetric>> {
        let mut map = self.metrics.write();
        match map.remove(pid) {
            Some(metric) => {
                if metric.seq() != seq {
                    warn!(
                        peer_id = %short_form(pid),
                        stored_seq = metric.seq(),
                        remove_seq = seq,
                        "removing metric with mismatched sequence"
                    );
                }
                self.fold_dead(&metric);
                Some(metric)
            }
            None => {
                warn!(peer_id = %short_form(pid), "metric for peer does not exist");
                None
            }
        }
    }

    fn fold_dead(&self, metric: &PeerTrafficMetric) {
        self.dead_total_in
            .fetch_add(metric.total_in(), Ordering::Relaxed);
        self.dead_total_out
            .fetch_add(metric.total_out(), Ordering::Relaxed);
    }

    pub fn metric(&self, pid: &PeerId) -> Option<Arc<PeerTrafficMetric>> {
        self.metrics.read().get(pid).cloned()
    }

    pub fn metrics(&self) -> Vec<Arc<PeerTrafficMetric>> {
        self.metrics.read().values().cloned().collect()
    }

    /// Spawn the ticker task. Ticks every meter under the read lock, every
    /// `interval_secs` seconds, until `stop`.
    pub fn start(&self) {
        let mut guard = self.ticker.lock();
        if guard.is_some() {
            warn!("metrics ticker already running");
            return;
        }
        let Some(registry) = self.self_ref.upgrade() else {
            return;
        };
        info!("starting traffic metrics registry");
        let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);
        let task = tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(Duration::from_secs(registry.interval_secs as u64));
            // the first interval tick fires immediately; skip it
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = stop_rx.recv() => break,
                    _ = ticker.tick() => {
                        let map = registry.metrics.read();
                        for metric in map.values() {
                            metric.tick();
                        }
                    }
                }
            }
        });
        *guard = Some(TickerHandle { stop_tx, task });
    }

    /// Stop the ticker. An in-flight tick completes.
    pub fn stop(&self) {
        if let Some(handle) = self.ticker.lock().take() {
            info!("finishing traffic metrics registry");
            let _ = handle.stop_tx.try_send(());
            handle.task.abort();
        }
    }

    /// Aggregate totals: live peers plus departed ones.
    pub fn summary(&self) -> MetricsSummary {
        let map = self.metrics.read();
        let mut total_in = self.dead_total_in.load(Ordering::Relaxed);
        let mut total_out = self.dead_total_out.load(Ordering::Relaxed);
        for metric in map.values() {
            total_in += metric.total_in();
            total_out += metric.total_out();
        }
        MetricsSummary {
            total_in,
            total_out,
            peer_count: map.len(),
            since: self.start_time,
        }
    }

    /// Human-readable per-peer table, for diagnostics output.
    pub fn print_metrics(&self) -> String {
        let mut out = String::from("p2p traffic summary\n");
        let map = self.metrics.read();
        if !map.is_empty() {
            out.push_str(
                "PeerID      :  IN_TOTAL,    IN_APS,   IN_LOAD  :  OUT_TOTAL,   OUT_APS,  OUT_LOAD\n",
            );
            for metric in map.values() {
                let _ = writeln!(
                    out,
                    "{:<12}:{:>10},{:>10},{:>10}  :{:>10},{:>10},{:>10}",
                    short_form(metric.peer_id()),
                    metric.total_in(),
                    metric.in_meter().aps(),
                    metric.in_meter().load_score(),
                    metric.total_out(),
                    metric.out_meter().aps(),
                    metric.out_meter().load_score(),
                );
            }
        }
        out
    }
}
