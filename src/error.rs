//! Error types for the worker pool.
//!
//! A single `#[non_exhaustive]` `thiserror` enum plus a crate-local `Result`
//! alias, so every fallible coordinator-facing operation returns the same
//! error currency.

pub type Result<T> = core::result::Result<T, PoolError>;

/// Unified error type for `crewpool` client operations.
#[derive(Clone, thiserror::Error, Debug)]
#[non_exhaustive]
pub enum PoolError {
    /// Non-blocking checkout/work found no idle worker and no overflow slot.
    #[error("pool is full")]
    Full,

    /// A blocking call did not complete before its deadline.
    #[error("timed out waiting for a worker")]
    Timeout,

    /// The pool has begun (or finished) a graceful shutdown.
    #[error("pool is shutting down")]
    ShuttingDown,

    /// The worker factory failed to produce a worker. Always fatal: there's
    /// no sound partial state to fall back to, whether the failure happens
    /// at startup, during overflow admission, or while replacing a crashed
    /// worker. On startup `Pool::new` simply returns it without spawning the
    /// coordinator; at runtime the coordinator tears itself down around it —
    /// see `Coordinator::terminate_fatal`.
    #[error("failed to spawn worker: {context}")]
    SpawnFailed { context: String },

    /// The coordinator task is gone (e.g. the pool was dropped).
    #[error("pool channel error: {context}")]
    ChannelClosed { context: String },
}
