//! Lightweight global metrics for KsegMap.
//!
//! Потокобезопасные атомарные счётчики для query-пути:
//! - Queries (total / interrupted / out of memory)
//! - Snapshot builds (built / truncated)
//! - Bytes served to readers

use std::sync::atomic::{AtomicU64, Ordering};

// ----- Queries -----
static QUERIES_TOTAL: AtomicU64 = AtomicU64::new(0);
static QUERIES_INTERRUPTED: AtomicU64 = AtomicU64::new(0);
static QUERIES_OOM: AtomicU64 = AtomicU64::new(0);

// ----- Snapshots -----
static SNAPSHOTS_BUILT: AtomicU64 = AtomicU64::new(0);
static SNAPSHOTS_TRUNCATED: AtomicU64 = AtomicU64::new(0);
static SNAPSHOT_BYTES_BUILT: AtomicU64 = AtomicU64::new(0);

// ----- Readers -----
static BYTES_SERVED: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub queries_total: u64,
    pub queries_interrupted: u64,
    pub queries_oom: u64,

    pub snapshots_built: u64,
    pub snapshots_truncated: u64,
    pub snapshot_bytes_built: u64,

    pub bytes_served: u64,
}

impl MetricsSnapshot {
    pub fn avg_snapshot_bytes(&self) -> f64 {
        if self.snapshots_built == 0 {
            0.0
        } else {
            self.snapshot_bytes_built as f64 / self.snapshots_built as f64
        }
    }
}

// ----- Recorders -----
pub fn record_query() {
    QUERIES_TOTAL.fetch_add(1, Ordering::Relaxed);
}

pub fn record_interrupted() {
    QUERIES_INTERRUPTED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_oom() {
    QUERIES_OOM.fetch_add(1, Ordering::Relaxed);
}

pub fn record_snapshot_built(bytes: usize, truncated: bool) {
    SNAPSHOTS_BUILT.fetch_add(1, Ordering::Relaxed);
    SNAPSHOT_BYTES_BUILT.fetch_add(bytes as u64, Ordering::Relaxed);
    if truncated {
        SNAPSHOTS_TRUNCATED.fetch_add(1, Ordering::Relaxed);
    }
}

pub fn record_bytes_served(n: usize) {
    BYTES_SERVED.fetch_add(n as u64, Ordering::Relaxed);
}

// ----- Snapshot -----
pub fn snapshot() -> MetricsSnapshot {
    MetricsSnapshot {
        queries_total: QUERIES_TOTAL.load(Ordering::Relaxed),
        queries_interrupted: QUERIES_INTERRUPTED.load(Ordering::Relaxed),
        queries_oom: QUERIES_OOM.load(Ordering::Relaxed),

        snapshots_built: SNAPSHOTS_BUILT.load(Ordering::Relaxed),
        snapshots_truncated: SNAPSHOTS_TRUNCATED.load(Ordering::Relaxed),
        snapshot_bytes_built: SNAPSHOT_BYTES_BUILT.load(Ordering::Relaxed),

        bytes_served: BYTES_SERVED.load(Ordering::Relaxed),
    }
}

/// Prometheus text exposition (version 0.0.4).
pub fn render_prometheus() -> String {
    let m = snapshot();
    let mut out = String::new();

    let ver = env!("CARGO_PKG_VERSION");
    out.push_str("# HELP ksegmap_build_info Build info.\n");
    out.push_str("# TYPE ksegmap_build_info gauge\n");
    out.push_str(&format!("ksegmap_build_info{{version=\"{}\"}} 1\n", ver));

    // --- queries ---
    out.push_str("# HELP ksegmap_queries_total Snapshot queries received.\n");
    out.push_str("# TYPE ksegmap_queries_total counter\n");
    out.push_str(&format!("ksegmap_queries_total {}\n", m.queries_total));

    out.push_str("# HELP ksegmap_queries_interrupted_total Queries aborted while waiting for the lock.\n");
    out.push_str("# TYPE ksegmap_queries_interrupted_total counter\n");
    out.push_str(&format!("ksegmap_queries_interrupted_total {}\n", m.queries_interrupted));

    out.push_str("# HELP ksegmap_queries_oom_total Queries failed on snapshot allocation.\n");
    out.push_str("# TYPE ksegmap_queries_oom_total counter\n");
    out.push_str(&format!("ksegmap_queries_oom_total {}\n", m.queries_oom));

    // --- snapshots ---
    out.push_str("# HELP ksegmap_snapshots_built_total Snapshots rebuilt.\n");
    out.push_str("# TYPE ksegmap_snapshots_built_total counter\n");
    out.push_str(&format!("ksegmap_snapshots_built_total {}\n", m.snapshots_built));

    out.push_str("# HELP ksegmap_snapshots_truncated_total Snapshots that dropped lines at capacity.\n");
    out.push_str("# TYPE ksegmap_snapshots_truncated_total counter\n");
    out.push_str(&format!("ksegmap_snapshots_truncated_total {}\n", m.snapshots_truncated));

    out.push_str("# HELP ksegmap_snapshot_bytes_avg Average snapshot size (bytes).\n");
    out.push_str("# TYPE ksegmap_snapshot_bytes_avg gauge\n");
    out.push_str(&format!("ksegmap_snapshot_bytes_avg {:.2}\n", m.avg_snapshot_bytes()));

    // --- readers ---
    out.push_str("# HELP ksegmap_bytes_served_total Bytes returned to readers.\n");
    out.push_str("# TYPE ksegmap_bytes_served_total counter\n");
    out.push_str(&format!("ksegmap_bytes_served_total {}\n", m.bytes_served));

    out
}
