//! `crewpool`: a generic, bounded worker pool with checkout/checkin, bounded
//! overflow under load, and automatic crash recovery.
//!
//! Clients either [`Pool::checkout`] a worker and drive it directly, or call
//! [`Pool::work`] for the common dispatch-and-reply case. Workers are
//! user-defined via the [`Worker`] trait and produced on demand by a
//! [`WorkerFactory`]; everything else — idle tracking, the waiter queue,
//! overflow accounting, and reassignment on checkin/crash — is owned by a
//! single coordinator task so pool state never needs its own lock.

mod client;
mod config;
mod error;
mod pool;
pub mod telemetry;

pub use client::Pool;
pub use config::{PoolConfig, PoolConfigBuilder, Strategy};
pub use error::{PoolError, Result};
pub use pool::ids::{ClientRef, WorkerId};
pub use pool::status::{PoolState, Status};
pub use pool::worker::{Worker, WorkerFactory, WorkerHandle};
