//! Monotonic id generators for workers and in-flight client calls.
//!
//! Grounded on `ferroid-tonic-server/src/server/pool/manager.rs`'s
//! `AtomicUsize`-based `next_worker` round-robin counter — the same relaxed
//! fetch-add pattern, generalized to hand out the pool's three id kinds.

use std::sync::atomic::{AtomicU64, Ordering};

/// Stable identity of a spawned worker, unique for the lifetime of the pool
/// (never reused, even across crash/replace cycles).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(u64);

/// Correlates a pending client call (checkout or work) with its possible
/// cancellation, and indexes an active monitor by who holds it. A single id
/// does double duty as both queue-position key and liveness correlator; see
/// `DESIGN.md` for why a separate liveness token isn't needed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientRef(u64);

/// Fences a worker assignment against a stale, already-superseded checkin.
///
/// A checkin for worker `W` is only honored if its epoch matches the epoch
/// recorded when `W` was last assigned (see `DESIGN.md`: a cancel that races
/// ahead of a still-in-flight `work()` dispatch can reassign `W` to someone
/// else before the original dispatch's own completion-triggered checkin
/// arrives; without fencing, that late checkin would yank `W` away from its
/// new, legitimate holder).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Epoch(u64);

#[derive(Debug, Default)]
pub struct IdGenerator {
    next_worker: AtomicU64,
    next_client: AtomicU64,
    next_epoch: AtomicU64,
}

impl IdGenerator {
    pub const fn new() -> Self {
        Self {
            next_worker: AtomicU64::new(0),
            next_client: AtomicU64::new(0),
            next_epoch: AtomicU64::new(0),
        }
    }

    pub fn next_worker_id(&self) -> WorkerId {
        WorkerId(self.next_worker.fetch_add(1, Ordering::Relaxed))
    }

    pub fn next_client_ref(&self) -> ClientRef {
        ClientRef(self.next_client.fetch_add(1, Ordering::Relaxed))
    }

    pub fn next_epoch(&self) -> Epoch {
        Epoch(self.next_epoch.fetch_add(1, Ordering::Relaxed))
    }
}
