//! Tick counter.
//!
//! The tick number is the only ordering the simulation has. It advances by
//! exactly one per pipeline attempt, with checked arithmetic, and is
//! restored from the latest snapshot on start.

use std::time::Duration;

/// Errors that can occur during clock operations.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// Tick counter would overflow.
    #[error("tick counter overflow: cannot advance beyond u64::MAX")]
    TickOverflow,

    /// The configured tick length is zero.
    #[error("tick interval must be non-zero")]
    ZeroInterval,
}

/// Monotonic tick counter with a fixed tick length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickClock {
    /// Last tick number handed out. 0 before the first tick.
    tick: u64,
    interval: Duration,
}

impl TickClock {
    /// A clock at tick 0.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::ZeroInterval`] for a zero `interval`.
    pub const fn new(interval: Duration) -> Result<Self, ClockError> {
        Self::resume(0, interval)
    }

    /// A clock whose next tick is `tick + 1`.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::ZeroInterval`] for a zero `interval`.
    pub const fn resume(tick: u64, interval: Duration) -> Result<Self, ClockError> {
        if interval.is_zero() {
            return Err(ClockError::ZeroInterval);
        }
        Ok(Self { tick, interval })
    }

    /// Consume the next tick number and return it.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::TickOverflow`] at `u64::MAX`.
    pub fn advance(&mut self) -> Result<u64, ClockError> {
        self.tick = self.tick.checked_add(1).ok_or(ClockError::TickOverflow)?;
        Ok(self.tick)
    }

    /// The last tick number handed out.
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Wall-clock length of one tick.
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Tick length in seconds, as used by the yield and energy formulas.
    pub const fn tick_secs(&self) -> f64 {
        self.interval.as_secs_f64()
    }

    /// Whether `tick` falls on an every-`n`-ticks boundary.
    ///
    /// `n == 0` never matches.
    pub const fn is_every(tick: u64, n: u64) -> bool {
        matches!(tick.checked_rem(n), Some(0))
    }
}
