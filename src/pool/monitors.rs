//! Bidirectional map between busy workers and the clients holding them.

use crate::pool::ids::{ClientRef, Epoch, WorkerId};
use crate::pool::worker::Supervised;
use crate::pool::worker::Worker;
use std::collections::HashMap;

/// A busy worker currently assigned to a client. Uniquely keyed by `worker`,
/// also indexable by `client_ref`. `epoch` fences this specific assignment
/// against a checkin generated by an earlier, already-superseded one.
pub(crate) struct Monitor<W: Worker> {
    pub worker: Supervised<W>,
    pub client_ref: ClientRef,
    pub epoch: Epoch,
}

pub(crate) struct MonitorTable<W: Worker> {
    by_worker: HashMap<WorkerId, Monitor<W>>,
    worker_for_client: HashMap<ClientRef, WorkerId>,
}

impl<W: Worker> MonitorTable<W> {
    pub fn new() -> Self {
        Self {
            by_worker: HashMap::new(),
            worker_for_client: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.by_worker.len()
    }

    pub fn contains_worker(&self, worker_id: WorkerId) -> bool {
        self.by_worker.contains_key(&worker_id)
    }

    pub fn insert(&mut self, worker: Supervised<W>, client_ref: ClientRef, epoch: Epoch) {
        let worker_id = worker.id;
        self.by_worker.insert(
            worker_id,
            Monitor {
                worker,
                client_ref,
                epoch,
            },
        );
        self.worker_for_client.insert(client_ref, worker_id);
    }

    /// Releases the monitor for `worker_id`, unconditionally.
    pub fn remove_by_worker(&mut self, worker_id: WorkerId) -> Option<Monitor<W>> {
        let monitor = self.by_worker.remove(&worker_id)?;
        self.worker_for_client.remove(&monitor.client_ref);
        Some(monitor)
    }

    /// Releases the monitor for `worker_id`, but only if it's still at
    /// `epoch` — a checkin that arrives after the worker has already been
    /// reassigned to someone else is silently ignored instead of yanking the
    /// worker away from its new holder.
    pub fn remove_if_current(&mut self, worker_id: WorkerId, epoch: Epoch) -> Option<Monitor<W>> {
        if self.by_worker.get(&worker_id)?.epoch != epoch {
            return None;
        }
        self.remove_by_worker(worker_id)
    }

    /// Finds the worker assigned to `client_ref`, if any.
    pub fn worker_for_client(&self, client_ref: ClientRef) -> Option<WorkerId> {
        self.worker_for_client.get(&client_ref).copied()
    }

    /// Empties the table, yielding every monitor it held. Used only by fatal
    /// termination, which owes every busy worker a dismissal regardless of
    /// who currently holds it.
    pub fn drain(&mut self) -> impl Iterator<Item = Monitor<W>> + '_ {
        self.worker_for_client.clear();
        self.by_worker.drain().map(|(_, monitor)| monitor)
    }
}
