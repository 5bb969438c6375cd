//! The public pool handle.

use crate::config::PoolConfig;
use crate::error::{PoolError, Result};
use crate::pool::coordinator::{self, Handle};
use crate::pool::events::{Event, Request};
use crate::pool::ids::ClientRef;
use crate::pool::status::Status;
use crate::pool::worker::{Worker, WorkerFactory, WorkerHandle};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// A bounded pool of workers, checked out and returned by clients concurrently.
///
/// Cloning a `Pool` is cheap and shares the same coordinator task — every
/// clone talks to the same idle set, waiter queue, and monitor table.
pub struct Pool<W: Worker> {
    inner: Arc<Handle<W>>,
}

impl<W: Worker> Clone for Pool<W> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Sends `Cancel` for `client_ref` unless disarmed, so a client that gives up
/// (timeout) or simply disappears (panic, task abort) always unwinds through
/// the same path. Rust runs destructors in both cases, which is what makes
/// this sufficient without a dedicated liveness-watcher task per waiter.
struct CancelGuard<W: Worker> {
    events_tx: mpsc::UnboundedSender<Event<W>>,
    client_ref: ClientRef,
    armed: bool,
}

impl<W: Worker> CancelGuard<W> {
    fn new(events_tx: mpsc::UnboundedSender<Event<W>>, client_ref: ClientRef) -> Self {
        Self {
            events_tx,
            client_ref,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl<W: Worker> Drop for CancelGuard<W> {
    fn drop(&mut self) {
        if self.armed {
            let _ = self.events_tx.send(Event::Cancel {
                client_ref: self.client_ref,
            });
        }
    }
}

impl<W: Worker> Pool<W> {
    /// Builds and starts a pool: spawns its `size` steady-state workers and
    /// its coordinator task. Fails without starting anything if even one
    /// steady-state worker can't be spawned.
    pub fn new<F>(config: PoolConfig, factory: F) -> Result<Self>
    where
        F: WorkerFactory<Worker = W>,
    {
        let inner = coordinator::start(config, factory)?;
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Checks out a worker for exclusive use, returning a handle the caller
    /// drives directly with [`WorkerHandle::call`].
    ///
    /// If `block` is `false` and no worker is immediately available (idle or
    /// fresh overflow), returns [`PoolError::Full`] right away. If `block` is
    /// `true`, waits for one to free up, bounded by `timeout` if given.
    pub async fn checkout(&self, block: bool, timeout: Option<Duration>) -> Result<WorkerHandle<W>> {
        let client_ref = self.inner.ids.next_client_ref();
        let mut guard = CancelGuard::new(self.inner.events_tx.clone(), client_ref);

        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Event::Request {
            request: Request::Checkout { reply: reply_tx },
            client_ref,
            block,
        })?;

        let result = Self::await_reply(reply_rx, timeout).await;
        if result.is_ok() {
            guard.disarm();
        }
        result
    }

    /// Checks a worker back in early. Equivalent to dropping `handle`, but
    /// makes the intent explicit and avoids waiting for the destructor.
    pub fn checkin(&self, handle: WorkerHandle<W>) {
        handle.mark_checked_in();
        let _ = self.inner.events_tx.send(Event::Checkin {
            worker_id: handle.id,
            epoch: handle.epoch,
        });
    }

    /// Checks out a worker, dispatches one message to it, awaits the reply,
    /// and checks the worker back in automatically — the common case when
    /// the caller has no need to hold the worker across several calls.
    pub async fn work(
        &self,
        msg: W::Message,
        block: bool,
        timeout: Option<Duration>,
    ) -> Result<W::Reply> {
        let client_ref = self.inner.ids.next_client_ref();
        let mut guard = CancelGuard::new(self.inner.events_tx.clone(), client_ref);

        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Event::Request {
            request: Request::Work {
                msg,
                reply: reply_tx,
            },
            client_ref,
            block,
        })?;

        let result = Self::await_reply(reply_rx, timeout).await;
        if result.is_ok() {
            guard.disarm();
        }
        result
    }

    /// Checks out a worker, runs `f` with it, and checks it back in
    /// regardless of how `f` returns — including a panic, which still
    /// unwinds through the handle's `Drop` and frees the worker.
    pub async fn transaction<T, Fut>(
        &self,
        timeout: Option<Duration>,
        f: impl FnOnce(WorkerHandle<W>) -> Fut,
    ) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        let handle = self.checkout(true, timeout).await?;
        f(handle).await
    }

    /// A point-in-time snapshot of idle/overflow/busy counts.
    pub async fn status(&self) -> Result<Status> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Event::StatusQuery { reply: reply_tx })?;
        reply_rx.await.map_err(|_| PoolError::ChannelClosed {
            context: "coordinator gone".to_string(),
        })
    }

    /// Stops accepting new requests, fails everyone currently waiting,
    /// dismisses idle workers, and waits for every checked-out worker to be
    /// returned before returning.
    pub async fn stop(&self) -> Result<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.send(Event::Shutdown { ack: ack_tx })?;
        ack_rx.await.map_err(|_| PoolError::ChannelClosed {
            context: "coordinator gone".to_string(),
        })
    }

    fn send(&self, event: Event<W>) -> Result<()> {
        self.inner
            .events_tx
            .send(event)
            .map_err(|_| PoolError::ChannelClosed {
                context: "coordinator gone".to_string(),
            })
    }

    async fn await_reply<T>(reply_rx: oneshot::Receiver<Result<T>>, timeout: Option<Duration>) -> Result<T> {
        match timeout {
            Some(duration) => tokio::time::timeout(duration, reply_rx)
                .await
                .map_err(|_| PoolError::Timeout)?
                .map_err(|_| PoolError::ChannelClosed {
                    context: "coordinator gone".to_string(),
                })?,
            None => reply_rx
                .await
                .map_err(|_| PoolError::ChannelClosed {
                    context: "coordinator gone".to_string(),
                })?,
        }
    }
}
