//! Worker protocol and lifecycle primitives.
//!
//! Grounded on `ferroid-tonic-server/src/server/pool/worker.rs`'s
//! `worker_loop`: each worker owns a bounded `mpsc::Receiver`, processes
//! messages one at a time, and exits cleanly on an explicit shutdown
//! envelope. Generalized here from a fixed `WorkRequest` to an arbitrary
//! caller-supplied [`Worker`] implementation, and from a round-robin sender
//! list to the full checkout/overflow/crash-recovery coordinator in
//! [`crate::pool::coordinator`].

use crate::error::{PoolError, Result};
use crate::pool::events::Event;
use crate::pool::ids::{Epoch, WorkerId};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, oneshot};
use tokio::task::AbortHandle;

/// A long-lived agent that receives messages and produces replies.
///
/// Each worker is spawned onto its own task and owns its state exclusively;
/// the coordinator never reaches into it except through `Message` in and
/// `Reply` out.
pub trait Worker: Send + 'static {
    type Message: Send + 'static;
    type Reply: Send + 'static;

    /// Processes one message and produces the reply. Never invoked
    /// concurrently with itself on the same worker.
    fn handle(&mut self, msg: Self::Message) -> impl Future<Output = Self::Reply> + Send;
}

/// Produces worker instances on demand. A failure here must not corrupt pool
/// state — every call site treats it as an ordinary fallible operation, not
/// a panic.
pub trait WorkerFactory: Send + Sync + 'static {
    type Worker: Worker;

    /// Builds one worker instance. `id` is the stable id this worker will be
    /// known by for its whole lifetime (useful for per-worker sharding, e.g.
    /// seeding a generator with `shard_offset + worker_id`).
    fn spawn(&self, id: WorkerId) -> Result<Self::Worker>;
}

pub(crate) enum Envelope<W: Worker> {
    Dispatch {
        msg: W::Message,
        reply_tx: oneshot::Sender<W::Reply>,
    },
    Shutdown {
        ack: oneshot::Sender<()>,
    },
}

/// The worker task body: receive, process one message at a time,
/// acknowledge shutdown, exit.
pub(crate) async fn worker_loop<W: Worker>(
    worker_id: WorkerId,
    mut rx: mpsc::Receiver<Envelope<W>>,
    mut worker: W,
) {
    #[cfg(feature = "tracing")]
    tracing::trace!(?worker_id, "worker started");

    while let Some(envelope) = rx.recv().await {
        match envelope {
            Envelope::Dispatch { msg, reply_tx } => {
                let reply = worker.handle(msg).await;
                // The receiver may have gone away (caller cancelled); that's
                // fine, the worker still finished its work and the
                // coordinator still gets its checkin via the replier.
                let _ = reply_tx.send(reply);
            }
            Envelope::Shutdown { ack } => {
                #[cfg(feature = "tracing")]
                tracing::debug!(?worker_id, "worker received shutdown");
                let _ = ack.send(());
                break;
            }
        }
    }

    #[cfg(feature = "tracing")]
    tracing::trace!(?worker_id, "worker stopped");
}

/// Everything the coordinator needs to reach, supervise, and eventually
/// dismiss one worker task. Owned exclusively by the coordinator and never
/// exposed outside `pool::`.
pub(crate) struct Supervised<W: Worker> {
    pub id: WorkerId,
    pub sender: mpsc::Sender<Envelope<W>>,
    /// Aborts the crash-watcher task. Calling this before sending a
    /// deliberate `Shutdown` unlinks the worker first, so its intentional
    /// exit is never mistaken for a crash.
    watcher: AbortHandle,
}

impl<W: Worker> Supervised<W> {
    /// Spawns a worker task plus a watcher task that reports unexpected exits
    /// (panics or a dropped join handle) back onto `exit_tx`.
    pub fn spawn<F>(
        id: WorkerId,
        factory: &F,
        events_tx: mpsc::UnboundedSender<Event<W>>,
    ) -> Result<Self>
    where
        F: WorkerFactory<Worker = W>,
    {
        let worker = factory.spawn(id)?;
        let (tx, rx) = mpsc::channel(1);
        let join = tokio::spawn(worker_loop(id, rx, worker));
        let watcher = join.abort_handle();
        tokio::spawn(async move {
            match join.await {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => {}
                Err(_join_err) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(?id, error = %_join_err, "worker task exited unexpectedly");
                    let _ = events_tx.send(Event::WorkerExit { worker_id: id });
                }
            }
        });
        Ok(Self {
            id,
            sender: tx,
            watcher,
        })
    }

    /// Unlinks (so its exit is never reported as a crash) and asks the
    /// worker to stop. Best-effort: the coordinator never blocks on the
    /// acknowledgement — event handlers run to completion without
    /// suspending.
    pub fn dismiss(self) {
        self.watcher.abort();
        let sender = self.sender;
        tokio::spawn(async move {
            let (ack_tx, ack_rx) = oneshot::channel();
            if sender.send(Envelope::Shutdown { ack: ack_tx }).await.is_ok() {
                let _ = tokio::time::timeout(std::time::Duration::from_secs(3), ack_rx).await;
            }
        });
    }
}

/// Handle to a checked-out worker, usable directly by the client that
/// checked it out.
///
/// Dropping a `WorkerHandle` without calling [`Pool::checkin`] auto-checks it
/// in — this is how `crewpool` detects a client crashing while holding a
/// worker: a panicking or aborted client task still runs Rust destructors,
/// so the pool never leaks the worker. See `DESIGN.md` for why this replaces
/// an explicit liveness-token watcher for the busy-checkout case.
pub struct WorkerHandle<W: Worker> {
    pub(crate) id: WorkerId,
    pub(crate) sender: mpsc::Sender<Envelope<W>>,
    pub(crate) events_tx: mpsc::UnboundedSender<Event<W>>,
    pub(crate) epoch: Epoch,
    checked_in: Arc<AtomicBool>,
}

impl<W: Worker> WorkerHandle<W> {
    pub(crate) fn new(
        id: WorkerId,
        sender: mpsc::Sender<Envelope<W>>,
        events_tx: mpsc::UnboundedSender<Event<W>>,
        epoch: Epoch,
    ) -> Self {
        Self {
            id,
            sender,
            events_tx,
            epoch,
            checked_in: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The stable id of the checked-out worker. Exposed for logging and
    /// tests, not for routing decisions.
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Dispatches one message directly to the worker and awaits its reply,
    /// bypassing the coordinator entirely. Does not check the worker back
    /// in; call [`Pool::checkin`] explicitly afterwards (or just drop the
    /// handle).
    pub async fn call(&self, msg: W::Message) -> Result<W::Reply> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(Envelope::Dispatch { msg, reply_tx })
            .await
            .map_err(|_| PoolError::ChannelClosed {
                context: "worker task gone".to_string(),
            })?;
        reply_rx.await.map_err(|_| PoolError::ChannelClosed {
            context: "worker dropped reply channel".to_string(),
        })
    }

    /// Marks this handle as checked in so the `Drop` guard below becomes a
    /// no-op. Used by [`Pool::checkin`] once it has sent the real checkin
    /// event, so the worker isn't checked in twice.
    pub(crate) fn mark_checked_in(&self) {
        self.checked_in.store(true, Ordering::Release);
    }
}

impl<W: Worker> Drop for WorkerHandle<W> {
    fn drop(&mut self) {
        if !self.checked_in.swap(true, Ordering::AcqRel) {
            let _ = self.events_tx.send(Event::Checkin {
                worker_id: self.id,
                epoch: self.epoch,
            });
        }
    }
}
