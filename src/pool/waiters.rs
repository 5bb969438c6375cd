//! The FIFO queue of clients blocked on checkout/work.

use crate::pool::events::Request;
use crate::pool::ids::ClientRef;
use crate::pool::worker::Worker;
use std::collections::VecDeque;

/// A client enrolled because neither an idle worker nor an overflow slot was
/// available at request time. Abandonment is detected by the requester's own
/// `CancelGuard` (see `client.rs`), not by anything polling this queue, so a
/// waiter carries nothing beyond the request itself and its correlation id.
pub(crate) struct Waiter<W: Worker> {
    pub request: Request<W>,
    pub client_ref: ClientRef,
}

pub(crate) struct WaiterQueue<W: Worker> {
    waiters: VecDeque<Waiter<W>>,
}

impl<W: Worker> WaiterQueue<W> {
    pub fn new() -> Self {
        Self {
            waiters: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }

    pub fn push_back(&mut self, waiter: Waiter<W>) {
        self.waiters.push_back(waiter);
    }

    /// Dequeues the head waiter — first in line for the next freed worker.
    pub fn pop_front(&mut self) -> Option<Waiter<W>> {
        self.waiters.pop_front()
    }

    /// Removes a waiter by `client_ref` regardless of queue position; a
    /// cancelling client isn't necessarily at the head.
    pub fn remove(&mut self, client_ref: ClientRef) -> Option<Waiter<W>> {
        let pos = self.waiters.iter().position(|w| w.client_ref == client_ref)?;
        self.waiters.remove(pos)
    }
}
