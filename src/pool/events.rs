//! The coordinator's event vocabulary: everything that can land in its
//! single inbox, and the payloads each event carries.

use crate::error::Result;
use crate::pool::ids::{ClientRef, Epoch, WorkerId};
use crate::pool::status::Status;
use crate::pool::worker::Worker;
use tokio::sync::oneshot;

/// What a client is asking the coordinator for. Checkout hands back a
/// [`WorkerHandle`](crate::WorkerHandle) for the client to use directly; work
/// dispatches a message through the pool and returns only the reply.
pub(crate) enum Request<W: Worker> {
    Checkout {
        reply: oneshot::Sender<Result<super::worker::WorkerHandle<W>>>,
    },
    Work {
        msg: W::Message,
        reply: oneshot::Sender<Result<W::Reply>>,
    },
}

/// One event delivered to the coordinator's single inbox.
pub(crate) enum Event<W: Worker> {
    /// A checkout or work request, blocking or not.
    Request {
        request: Request<W>,
        client_ref: ClientRef,
        block: bool,
    },
    /// A worker is being returned to the pool. `epoch` must match the
    /// assignment this checkin was issued for, or it's ignored as stale —
    /// see `remove_if_current` in `monitors.rs`.
    Checkin { worker_id: WorkerId, epoch: Epoch },
    /// A client gave up: cancel its enrolled waiter, or — if assignment
    /// already raced ahead of the cancel — treat its worker as checked in.
    /// Fired both for an explicit give-up (timeout) and for a client task
    /// disappearing outright (panic, abort); see the `CancelGuard` in
    /// `client.rs` for why those two cases don't need separate events.
    Cancel { client_ref: ClientRef },
    /// A worker task exited without being told to.
    WorkerExit { worker_id: WorkerId },
    /// Stop accepting new requests, fail enrolled waiters, dismiss idle
    /// workers, and acknowledge once every busy worker has checked back in.
    Shutdown { ack: oneshot::Sender<()> },
    /// Report a point-in-time snapshot of occupancy.
    StatusQuery { reply: oneshot::Sender<Status> },
}
