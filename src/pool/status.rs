//! Derived pool status.

/// Coarse pool health, a pure function of `(idle_count, overflow, max_overflow)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    /// Capacity available right now.
    Ready,
    /// No steady-state idle workers, but overflow slots remain.
    Overflow,
    /// No capacity left; the next request without `block=true` gets `FULL`.
    Full,
}

impl std::fmt::Display for PoolState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Ready => "READY",
            Self::Overflow => "OVERFLOW",
            Self::Full => "FULL",
        };
        f.write_str(s)
    }
}

/// A snapshot of pool occupancy, returned by [`crate::Pool::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    pub state: PoolState,
    pub idle_count: usize,
    pub overflow: usize,
    pub busy_count: usize,
}

/// Written as a literal decision chain rather than collapsed/optimized — the
/// branch order (overflow saturation checked before idle count) is load
/// bearing, not incidental.
pub(crate) fn derive_state(idle_count: usize, overflow: usize, max_overflow: usize) -> PoolState {
    if overflow >= 1 && overflow == max_overflow {
        PoolState::Full
    } else if overflow >= 1 {
        PoolState::Overflow
    } else if overflow == 0 && idle_count == 0 && max_overflow == 0 {
        PoolState::Full
    } else if overflow == 0 && idle_count == 0 {
        PoolState::Overflow
    } else {
        PoolState::Ready
    }
}
