//! Runtime configuration for a [`crate::Pool`].
//!
//! Grounded on `ferroid-tonic-server/src/server/config.rs`: a `clap::Parser`
//! CLI struct with `env`/`default_value_t` on every field, converted via
//! `TryFrom` into a validated runtime config.

use crate::error::{PoolError, Result};

/// Which end of the idle queue a checked-in worker is reinserted at.
///
/// Idle-worker *removal* is always from the front of the queue; this knob
/// only controls the reinsertion end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Reinsert at the front: the most recently checked-in worker is the
    /// next one handed out ("last-checked-in-first-out").
    #[default]
    Lifo,
    /// Reinsert at the back: workers rotate round-robin.
    Fifo,
}

/// Validated, immutable configuration for a running pool.
///
/// Steady-state workers (`size` of them) are spawned at pool start; up to
/// `max_overflow` additional workers may be spawned transiently under load.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Steady-state worker count. May be zero, but only if `max_overflow` is
    /// nonzero — a pool needs capacity from one side or the other.
    pub size: usize,
    /// Additional workers allowed under load, dismissed on checkin once
    /// idle/waiter demand subsides.
    pub max_overflow: usize,
    /// Idle-worker reinsertion end.
    pub strategy: Strategy,
    /// Optional registration name, surfaced only for introspection/logging.
    pub name: Option<String>,
}

impl PoolConfig {
    /// Starts a builder with the default shape (`size = 5`, `max_overflow =
    /// 10`, `strategy = Lifo`).
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::default()
    }
}

/// Builder for [`PoolConfig`], validated on [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct PoolConfigBuilder {
    size: usize,
    max_overflow: usize,
    strategy: Strategy,
    name: Option<String>,
}

impl Default for PoolConfigBuilder {
    fn default() -> Self {
        Self {
            size: 5,
            max_overflow: 10,
            strategy: Strategy::Lifo,
            name: None,
        }
    }
}

impl PoolConfigBuilder {
    pub fn size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn max_overflow(mut self, max_overflow: usize) -> Self {
        self.max_overflow = max_overflow;
        self
    }

    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Validates and finalizes the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::SpawnFailed`] if `size == 0 && max_overflow == 0`
    /// — such a pool could never admit a single client.
    pub fn build(self) -> Result<PoolConfig> {
        if self.size == 0 && self.max_overflow == 0 {
            return Err(PoolError::SpawnFailed {
                context: "size and max_overflow cannot both be 0".to_string(),
            });
        }
        Ok(PoolConfig {
            size: self.size,
            max_overflow: self.max_overflow,
            strategy: self.strategy,
            name: self.name,
        })
    }
}
