//! The pool's coordinator: a single task owning all mutable pool state,
//! driven by an unbounded event channel. Every state transition below runs
//! to completion without suspending, so two events never interleave their
//! effects — this is the pool's only serialization point, and the reason
//! none of its internal structures need their own locks.

use crate::config::PoolConfig;
use crate::error::{PoolError, Result};
use crate::pool::events::{Event, Request};
use crate::pool::idle::IdleSet;
use crate::pool::ids::{ClientRef, IdGenerator, WorkerId};
use crate::pool::monitors::MonitorTable;
use crate::pool::status::{Status, derive_state};
use crate::pool::waiters::{Waiter, WaiterQueue};
use crate::pool::worker::{Envelope, Supervised, Worker, WorkerFactory, WorkerHandle};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// A running coordinator: the sender side clients and the pool handle talk
/// to, plus a join handle to await full shutdown.
pub(crate) struct Handle<W: Worker> {
    pub events_tx: mpsc::UnboundedSender<Event<W>>,
    pub ids: Arc<IdGenerator>,
    pub join: tokio::task::JoinHandle<()>,
}

/// Spawns the steady-state workers and the coordinator task. Returns an
/// error without spawning the task at all if even one steady-state worker
/// fails to come up — a pool that starts in a short state is worse than one
/// that doesn't start.
pub(crate) fn start<F>(config: PoolConfig, factory: F) -> Result<Handle<F::Worker>>
where
    F: WorkerFactory,
{
    let ids = Arc::new(IdGenerator::new());
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    let mut idle = IdleSet::new();
    for _ in 0..config.size {
        let worker_id = ids.next_worker_id();
        let supervised = Supervised::spawn(worker_id, &factory, events_tx.clone())?;
        idle.insert_back(supervised);
    }

    let coordinator = Coordinator {
        factory,
        ids: ids.clone(),
        events_tx: events_tx.clone(),
        idle,
        waiters: WaiterQueue::new(),
        monitors: MonitorTable::new(),
        size: config.size,
        overflow: 0,
        max_overflow: config.max_overflow,
        strategy: config.strategy,
        shutting_down: false,
        terminated: false,
        shutdown_ack: None,
    };
    let join = tokio::spawn(coordinator.run(events_rx));

    Ok(Handle {
        events_tx,
        ids,
        join,
    })
}

struct Coordinator<W: Worker, F: WorkerFactory<Worker = W>> {
    factory: F,
    ids: Arc<IdGenerator>,
    events_tx: mpsc::UnboundedSender<Event<W>>,
    idle: IdleSet<W>,
    waiters: WaiterQueue<W>,
    monitors: MonitorTable<W>,
    size: usize,
    overflow: usize,
    max_overflow: usize,
    strategy: crate::config::Strategy,
    shutting_down: bool,
    /// Set once a runtime spawn failure has forced the pool to tear itself
    /// down (spec §7: spawn failure is fatal, with no partial state allowed,
    /// not just at startup). `run` stops reading further events as soon as
    /// this is set.
    terminated: bool,
    shutdown_ack: Option<oneshot::Sender<()>>,
}

impl<W: Worker, F: WorkerFactory<Worker = W>> Coordinator<W, F> {
    async fn run(mut self, mut events_rx: mpsc::UnboundedReceiver<Event<W>>) {
        while let Some(event) = events_rx.recv().await {
            self.handle_event(event);
            if self.terminated {
                break;
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("coordinator inbox closed, draining remaining workers");
        self.drain();
    }

    fn handle_event(&mut self, event: Event<W>) {
        match event {
            Event::Request {
                request,
                client_ref,
                block,
            } => self.handle_request(request, client_ref, block),
            Event::Checkin { worker_id, epoch } => self.handle_checkin(worker_id, epoch),
            Event::Cancel { client_ref } => self.handle_cancel(client_ref),
            Event::WorkerExit { worker_id } => self.handle_worker_exit(worker_id),
            Event::Shutdown { ack } => self.handle_shutdown(ack),
            Event::StatusQuery { reply } => {
                let _ = reply.send(self.status());
            }
        }
    }

    /// Stops accepting new work, fails everyone currently enrolled, and
    /// dismisses idle workers immediately. Busy workers are left to finish;
    /// the ack fires once the last of them checks back in.
    fn handle_shutdown(&mut self, ack: oneshot::Sender<()>) {
        #[cfg(feature = "tracing")]
        tracing::info!("pool shutdown initiated, refusing new requests");
        self.shutting_down = true;

        while let Some(waiter) = self.waiters.pop_front() {
            Self::fail(waiter.request, PoolError::ShuttingDown);
        }
        while let Some(worker) = self.idle.pop() {
            worker.dismiss();
        }

        if self.monitors.len() == 0 {
            #[cfg(feature = "tracing")]
            tracing::info!("pool shutdown complete, no busy workers to drain");
            let _ = ack.send(());
        } else {
            #[cfg(feature = "tracing")]
            tracing::debug!(busy = self.monitors.len(), "waiting for busy workers to check in");
            self.shutdown_ack = Some(ack);
        }
    }

    /// A worker spawn failed outside of startup (overflow admission, or
    /// crash replacement). Per spec §7, spawn failure is fatal with no
    /// partial state allowed — this isn't special-cased to `Pool::new`, so
    /// the coordinator mirrors that here instead of quietly running on with
    /// a permanently short population. Fails every outstanding waiter,
    /// dismisses every idle and busy worker it still owns, and stops the
    /// event loop; `run` sees `terminated` and breaks after this call
    /// returns.
    fn terminate_fatal(&mut self, err: PoolError) {
        #[cfg(feature = "tracing")]
        tracing::error!(error = %err, "fatal spawn failure, terminating pool");
        self.shutting_down = true;
        self.terminated = true;

        while let Some(waiter) = self.waiters.pop_front() {
            Self::fail(waiter.request, err.clone());
        }
        while let Some(worker) = self.idle.pop() {
            worker.dismiss();
        }
        debug_assert!(self.idle.is_empty(), "fatal termination must not leave idle workers behind");
        for monitor in self.monitors.drain() {
            monitor.worker.dismiss();
        }
        if let Some(ack) = self.shutdown_ack.take() {
            let _ = ack.send(());
        }
    }

    fn check_shutdown_complete(&mut self) {
        if self.shutting_down && self.monitors.len() == 0 {
            if let Some(ack) = self.shutdown_ack.take() {
                #[cfg(feature = "tracing")]
                tracing::info!("pool shutdown complete, last busy worker checked in");
                let _ = ack.send(());
            }
        }
    }

    /// A checkout or work request arrives. Idle worker first, then a fresh
    /// overflow worker if there's room, then either `Full` (non-blocking) or
    /// enrollment as a waiter.
    fn handle_request(&mut self, request: Request<W>, client_ref: ClientRef, block: bool) {
        if self.shutting_down {
            Self::fail(request, PoolError::ShuttingDown);
            return;
        }

        if let Some(worker) = self.idle.pop() {
            self.assign(worker, client_ref, request);
            return;
        }

        if self.overflow < self.max_overflow {
            match Supervised::spawn(self.ids.next_worker_id(), &self.factory, self.events_tx.clone()) {
                Ok(worker) => {
                    self.overflow += 1;
                    #[cfg(feature = "tracing")]
                    tracing::debug!(overflow = self.overflow, "spawned overflow worker");
                    self.assign(worker, client_ref, request);
                }
                Err(err) => {
                    Self::fail(request, err.clone());
                    self.terminate_fatal(err);
                }
            }
            return;
        }

        if !block {
            #[cfg(feature = "tracing")]
            tracing::trace!("pool full, refusing non-blocking request");
            Self::fail(request, PoolError::Full);
            return;
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(waiters = self.waiters.len() + 1, "enqueueing waiter, pool saturated");
        self.waiters.push_back(Waiter { request, client_ref });
    }

    /// Hands `worker` to `client_ref`, registering a monitor and replying (or
    /// dispatching) accordingly. `worker` must not already be idle or
    /// monitored.
    fn assign(&mut self, worker: Supervised<W>, client_ref: ClientRef, request: Request<W>) {
        let epoch = self.ids.next_epoch();
        let worker_id = worker.id;
        debug_assert!(!self.idle.contains(worker_id), "assigned worker must not still be idle");
        debug_assert!(
            !self.monitors.contains_worker(worker_id),
            "assigned worker must not already be monitored"
        );

        match request {
            Request::Checkout { reply } => {
                let handle = WorkerHandle::new(worker_id, worker.sender.clone(), self.events_tx.clone(), epoch);
                self.monitors.insert(worker, client_ref, epoch);
                let _ = reply.send(Ok(handle));
            }
            Request::Work { msg, reply } => {
                let sender = worker.sender.clone();
                self.monitors.insert(worker, client_ref, epoch);
                let events_tx = self.events_tx.clone();
                tokio::spawn(async move {
                    let (reply_tx, reply_rx) = oneshot::channel();
                    let outcome = if sender.send(Envelope::Dispatch { msg, reply_tx }).await.is_err() {
                        Err(PoolError::ChannelClosed {
                            context: "worker task gone before dispatch".to_string(),
                        })
                    } else {
                        reply_rx.await.map_err(|_| PoolError::ChannelClosed {
                            context: "worker dropped reply channel".to_string(),
                        })
                    };
                    let _ = reply.send(outcome);
                    let _ = events_tx.send(Event::Checkin { worker_id, epoch });
                });
            }
        }
    }

    /// A worker is freed (explicit checkin, or the automatic one fired by a
    /// dropped `WorkerHandle`/completed `work()` dispatch). Ignored if
    /// `epoch` doesn't match the current assignment — the worker has since
    /// moved on and this checkin is a late echo of a superseded one.
    fn handle_checkin(&mut self, worker_id: WorkerId, epoch: crate::pool::ids::Epoch) {
        let Some(monitor) = self.monitors.remove_if_current(worker_id, epoch) else {
            return;
        };
        self.reassign(monitor.worker);
    }

    /// A just-freed worker: hand it to the next waiter, shed it if it's an
    /// overflow worker with nobody waiting, or park it back in idle.
    fn reassign(&mut self, worker: Supervised<W>) {
        if self.shutting_down {
            worker.dismiss();
            self.check_shutdown_complete();
            return;
        }

        if let Some(waiter) = self.waiters.pop_front() {
            self.assign(worker, waiter.client_ref, waiter.request);
            return;
        }

        if self.overflow > 0 {
            self.overflow -= 1;
            #[cfg(feature = "tracing")]
            tracing::debug!(overflow = self.overflow, worker_id = ?worker.id, "dismissing overflow worker on checkin");
            worker.dismiss();
            return;
        }

        self.idle.push(worker, self.strategy);
    }

    /// A client gave up, either by explicit choice (its own timeout elapsed)
    /// or by disappearing outright (panic, abort) — both funnel through the
    /// same `CancelGuard` in `client.rs` and arrive here identically. If the
    /// client's worker has already been assigned, treat it as checked in; if
    /// the client is still enrolled as a waiter, drop its entry. Either way
    /// this is a no-op if neither holds any more (already served, or already
    /// cancelled once).
    fn handle_cancel(&mut self, client_ref: ClientRef) {
        if let Some(worker_id) = self.monitors.worker_for_client(client_ref) {
            if let Some(monitor) = self.monitors.remove_by_worker(worker_id) {
                self.reassign(monitor.worker);
            }
            return;
        }

        self.waiters.remove(client_ref);
    }

    /// A worker task exited without being told to. If it was busy, run crash
    /// recovery; if it was idle, replace it in place at the head of idle so
    /// the reinsertion strategy's most-recent slot is preserved.
    fn handle_worker_exit(&mut self, worker_id: WorkerId) {
        if let Some(monitor) = self.monitors.remove_by_worker(worker_id) {
            debug_assert_eq!(monitor.worker.id, worker_id);
            #[cfg(feature = "tracing")]
            tracing::warn!(?worker_id, "busy worker crashed");
            self.crash_recover();
            return;
        }

        if self.idle.remove(worker_id).is_some() {
            #[cfg(feature = "tracing")]
            tracing::warn!(?worker_id, "idle worker crashed, replacing");
            match Supervised::spawn(self.ids.next_worker_id(), &self.factory, self.events_tx.clone()) {
                Ok(replacement) => self.idle.insert_front(replacement),
                Err(err) => self.terminate_fatal(err),
            }
        }
    }

    /// A busy worker crashed. Prefers handing a fresh replacement straight to
    /// the next waiter over refilling idle, then sheds overflow capacity if
    /// there's no one waiting, and only refills the steady-state idle set as
    /// a last resort.
    fn crash_recover(&mut self) {
        if self.shutting_down {
            self.check_shutdown_complete();
            return;
        }

        if let Some(waiter) = self.waiters.pop_front() {
            match Supervised::spawn(self.ids.next_worker_id(), &self.factory, self.events_tx.clone()) {
                Ok(replacement) => self.assign(replacement, waiter.client_ref, waiter.request),
                Err(err) => {
                    Self::fail(waiter.request, err.clone());
                    self.terminate_fatal(err);
                }
            }
            return;
        }

        if self.overflow > 0 {
            self.overflow -= 1;
            return;
        }

        match Supervised::spawn(self.ids.next_worker_id(), &self.factory, self.events_tx.clone()) {
            Ok(replacement) => self.idle.insert_back(replacement),
            Err(err) => self.terminate_fatal(err),
        }
    }

    fn status(&self) -> Status {
        let idle_count = self.idle.len();
        let busy_count = self.monitors.len();
        debug_assert_eq!(
            idle_count + busy_count,
            self.size + self.overflow,
            "idle + busy must always equal size + overflow"
        );
        Status {
            state: derive_state(idle_count, self.overflow, self.max_overflow),
            idle_count,
            overflow: self.overflow,
            busy_count,
        }
    }

    fn fail(request: Request<W>, err: PoolError) {
        match request {
            Request::Checkout { reply } => {
                let _ = reply.send(Err(err));
            }
            Request::Work { reply, .. } => {
                let _ = reply.send(Err(err));
            }
        }
    }

    /// Dismisses every remaining idle worker once the inbox has closed
    /// (`Handle` dropped and all client handles with it). Busy workers are
    /// left to finish and check themselves in as normal, where their
    /// `Checkin` event will simply find a closed channel and be dropped.
    fn drain(&mut self) {
        while let Some(worker) = self.idle.pop() {
            worker.dismiss();
        }
    }
}
