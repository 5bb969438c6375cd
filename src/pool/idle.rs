//! The idle-worker container.
//!
//! Removal is always from the front; `Strategy` only controls which end a
//! checked-in worker is reinserted at.

use crate::config::Strategy;
use crate::pool::worker::{Supervised, Worker};
use std::collections::VecDeque;

pub(crate) struct IdleSet<W: Worker> {
    workers: VecDeque<Supervised<W>>,
}

impl<W: Worker> IdleSet<W> {
    pub fn new() -> Self {
        Self {
            workers: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Removes the next worker to hand out. Always pops from the front,
    /// regardless of `strategy`.
    pub fn pop(&mut self) -> Option<Supervised<W>> {
        self.workers.pop_front()
    }

    /// Reinserts a freshly-checked-in (or newly-spawned) worker at the end
    /// dictated by `strategy`.
    pub fn push(&mut self, worker: Supervised<W>, strategy: Strategy) {
        match strategy {
            Strategy::Lifo => self.workers.push_front(worker),
            Strategy::Fifo => self.workers.push_back(worker),
        }
    }

    /// Removes a specific worker by id, e.g. when it crashes while idle.
    pub fn remove(&mut self, worker_id: crate::pool::ids::WorkerId) -> Option<Supervised<W>> {
        let pos = self.workers.iter().position(|w| w.id == worker_id)?;
        self.workers.remove(pos)
    }

    /// Inserts at the front unconditionally, bypassing `strategy` — used when
    /// a replacement must land exactly where its predecessor was.
    pub fn insert_front(&mut self, worker: Supervised<W>) {
        self.workers.push_front(worker);
    }

    /// Inserts at the back unconditionally, bypassing `strategy` — used to
    /// refill steady-state capacity after a crash.
    pub fn insert_back(&mut self, worker: Supervised<W>) {
        self.workers.push_back(worker);
    }

    pub fn contains(&self, worker_id: crate::pool::ids::WorkerId) -> bool {
        self.workers.iter().any(|w| w.id == worker_id)
    }
}
