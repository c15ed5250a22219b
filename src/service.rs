//! service: Snapshot Query Service.
//!
//! Single-builder, many-readers front end over the snapshot:
//! 1) acquire the gate (interruptible; interrupted -> no work done),
//! 2) rebuild facts -> catalog -> snapshot from scratch,
//! 3) copy out [offset, offset + max_len) clipped to the snapshot length,
//! 4) release the gate (guard Drop, on every exit path).
//!
//! The gate is a busy flag under a Mutex + Condvar (same shape as the WAL
//! group-commit "flushing" flag). Waiters wake on release or every
//! WAIT_SLICE to re-check their Interrupt.
//!
//! The snapshot buffer lives only inside one query and is dropped before
//! the gate is released.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use log::debug;

use crate::catalog::build_catalog;
use crate::config::KsegConfig;
use crate::error::{QueryError, QueryResult};
use crate::facts::{FactsSource, HostFacts};
use crate::metrics;
use crate::serialize::{serialize_with_trailer, Snapshot};

const WAIT_SLICE: Duration = Duration::from_millis(5);

/// Cancellation flag for a waiting caller (the "signal" in an interruptible wait).
#[derive(Clone, Debug, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Состояние гейта: занят ли он билдером.
struct GateState {
    busy: bool,
}

/// Mutual exclusion for the build-and-copy sequence.
pub struct QueryGate {
    state: Mutex<GateState>,
    cv: Condvar,
}

/// Held while a query builds and copies; releases on Drop.
pub struct GateGuard<'a> {
    gate: &'a QueryGate,
}

impl Default for QueryGate {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryGate {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState { busy: false }),
            cv: Condvar::new(),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, GateState> {
        // busy: простой флаг, после паники в другом потоке он всё ещё корректен
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Wait for exclusive access. A raised interrupt (before or during the
    /// wait) returns `Interrupted` with nothing acquired.
    pub fn acquire(&self, intr: &Interrupt) -> QueryResult<GateGuard<'_>> {
        let mut st = self.lock_state();
        loop {
            if intr.is_raised() {
                return Err(QueryError::Interrupted);
            }
            if !st.busy {
                st.busy = true;
                return Ok(GateGuard { gate: self });
            }
            st = match self.cv.wait_timeout(st, WAIT_SLICE) {
                Ok((g, _)) => g,
                Err(p) => p.into_inner().0,
            };
        }
    }

    /// Non-blocking attempt.
    pub fn try_acquire(&self) -> Option<GateGuard<'_>> {
        let mut st = self.lock_state();
        if st.busy {
            return None;
        }
        st.busy = true;
        Some(GateGuard { gate: self })
    }

    pub fn is_busy(&self) -> bool {
        self.lock_state().busy
    }

    fn release(&self) {
        let mut st = self.lock_state();
        st.busy = false;
        drop(st);
        self.cv.notify_one();
    }
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.gate.release();
    }
}

/// Result of one query: the bytes of the requested window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryChunk {
    pub bytes: Vec<u8>,
    /// Bytes returned (= cursor advance); 0 at end of snapshot.
    pub consumed: usize,
}

pub struct SnapshotService {
    source: Arc<dyn FactsSource>,
    gate: QueryGate,
    capacity: usize,
    trailer: bool,
}

impl SnapshotService {
    pub fn new(source: Arc<dyn FactsSource>, capacity: usize, trailer: bool) -> Self {
        Self {
            source,
            gate: QueryGate::new(),
            capacity,
            trailer,
        }
    }

    /// Host detection with config overrides.
    pub fn from_config(cfg: &KsegConfig) -> Self {
        Self::new(
            Arc::new(HostFacts::new(cfg)),
            cfg.snapshot_capacity,
            cfg.diagnostics,
        )
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn gate(&self) -> &QueryGate {
        &self.gate
    }

    /// Facts -> catalog -> snapshot. Callers must hold the gate.
    fn build(&self) -> QueryResult<Snapshot> {
        let facts = self.source.facts();
        let regions = build_catalog(&facts);
        let snap = serialize_with_trailer(&regions, &facts, self.capacity, self.trailer)?;
        metrics::record_snapshot_built(snap.len(), snap.is_truncated());
        debug!(
            "snapshot rebuilt: regions={} lines={} dropped={} len={}/{}",
            regions.len(),
            snap.lines(),
            snap.dropped(),
            snap.len(),
            self.capacity
        );
        Ok(snap)
    }

    /// Read `[offset, offset + max_len)` of a freshly built snapshot.
    pub fn query(&self, offset: u64, max_len: usize, intr: &Interrupt) -> QueryResult<QueryChunk> {
        metrics::record_query();
        let _guard = match self.gate.acquire(intr) {
            Ok(g) => g,
            Err(e) => {
                metrics::record_interrupted();
                return Err(e);
            }
        };

        let snap = match self.build() {
            Ok(s) => s,
            Err(e) => {
                if let QueryError::OutOfMemory(_) = e {
                    metrics::record_oom();
                }
                return Err(e);
            }
        };
        let bytes = snap.window(offset, max_len).to_vec();
        let consumed = bytes.len();
        metrics::record_bytes_served(consumed);
        Ok(QueryChunk { bytes, consumed })
    }

    /// File-read shape: fill `buf` from `*pos`, advance `*pos` by the count.
    pub fn read_at(&self, pos: &mut u64, buf: &mut [u8], intr: &Interrupt) -> QueryResult<usize> {
        let chunk = self.query(*pos, buf.len(), intr)?;
        buf[..chunk.consumed].copy_from_slice(&chunk.bytes);
        *pos += chunk.consumed as u64;
        Ok(chunk.consumed)
    }

    /// Whole current snapshot (one build), for renderers and tests.
    pub fn snapshot(&self, intr: &Interrupt) -> QueryResult<Snapshot> {
        let _guard = self.gate.acquire(intr)?;
        self.build()
    }

    pub fn reader(&self) -> SnapshotReader<'_> {
        SnapshotReader {
            service: self,
            pos: 0,
            intr: Interrupt::new(),
        }
    }
}

/// `std::io::Read` over the service with its own offset cursor.
/// Each `read` is one query (one rebuild), like a procfs read(2).
pub struct SnapshotReader<'a> {
    service: &'a SnapshotService,
    pos: u64,
    intr: Interrupt,
}

impl SnapshotReader<'_> {
    pub fn position(&self) -> u64 {
        self.pos
    }

    pub fn interrupt(&self) -> Interrupt {
        self.intr.clone()
    }
}

impl io::Read for SnapshotReader<'_> {
    /// Interrupt -> `ErrorKind::Other` with `QueryError::Interrupted` as the source.
    /// std read loops retry `ErrorKind::Interrupted` and the flag stays raised.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.service.read_at(&mut self.pos, buf, &self.intr) {
            Ok(n) => Ok(n),
            Err(QueryError::Interrupted) => {
                Err(io::Error::new(io::ErrorKind::Other, QueryError::Interrupted))
            }
            Err(e) => Err(e.into()),
        }
    }
}
