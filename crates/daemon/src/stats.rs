use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tunnelgate_relay::RelayReport;

use crate::FailureKind;

/// Server-wide counters, shared by every connection task
#[derive(Debug, Clone, Default)]
pub struct ServerStats {
    inner: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    next_id: AtomicU64,
    accept_errors: AtomicU64,
    active: AtomicU64,
    cache_hits: AtomicU64,
    protocol_errors: AtomicU64,
    backend_errors: AtomicU64,
    relay_errors: AtomicU64,
    panics: AtomicU64,
    bytes_client_to_backend: AtomicU64,
    bytes_backend_to_client: AtomicU64,
}

/// Point-in-time copy of [`ServerStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub accepted: u64,
    pub accept_errors: u64,
    pub active: u64,
    pub cache_hits: u64,
    pub protocol_errors: u64,
    pub backend_errors: u64,
    pub relay_errors: u64,
    pub panics: u64,
    pub bytes_client_to_backend: u64,
    pub bytes_backend_to_client: u64,
}

impl ServerStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a newly accepted connection and hand out its id
    pub fn connection_opened(&self) -> u64 {
        self.inner.active.fetch_add(1, Ordering::Relaxed);
        self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn connection_closed(&self) {
        self.inner.active.fetch_sub(1, Ordering::Relaxed);
    }

    /// Count an `accept` failure the listener survived
    pub fn accept_failed(&self) {
        self.inner.accept_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_hit(&self) {
        self.inner.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_failed(&self, kind: FailureKind) {
        let counter = match kind {
            FailureKind::Protocol => &self.inner.protocol_errors,
            FailureKind::Backend => &self.inner.backend_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_panicked(&self) {
        self.inner.panics.fetch_add(1, Ordering::Relaxed);
    }

    pub fn relay_finished(&self, report: &RelayReport) {
        self.inner
            .bytes_client_to_backend
            .fetch_add(report.a_to_b.bytes, Ordering::Relaxed);
        self.inner
            .bytes_backend_to_client
            .fetch_add(report.b_to_a.bytes, Ordering::Relaxed);
        if !report.is_clean() {
            self.inner.relay_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let c = &self.inner;
        StatsSnapshot {
            accepted: c.next_id.load(Ordering::Relaxed),
            accept_errors: c.accept_errors.load(Ordering::Relaxed),
            active: c.active.load(Ordering::Relaxed),
            cache_hits: c.cache_hits.load(Ordering::Relaxed),
            protocol_errors: c.protocol_errors.load(Ordering::Relaxed),
            backend_errors: c.backend_errors.load(Ordering::Relaxed),
            relay_errors: c.relay_errors.load(Ordering::Relaxed),
            panics: c.panics.load(Ordering::Relaxed),
            bytes_client_to_backend: c.bytes_client_to_backend.load(Ordering::Relaxed),
            bytes_backend_to_client: c.bytes_backend_to_client.load(Ordering::Relaxed),
        }
    }
}
