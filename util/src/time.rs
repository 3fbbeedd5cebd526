//! General time utility functions and the cycle-consistent clock
//!
//! Every module updated within one control cycle must see the same time, so
//! rather than reading a wall clock directly the control loop reads its
//! [`Clock`], which latches the first time read in a cycle until
//! [`Clock::cycle_ended`] is called.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::Arc;
use std::time::Instant;

use chrono;
use log::error;
use thiserror::Error;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of nanoseconds in a second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A provider of monotonic time in seconds.
pub trait TimeSource: Send + Sync {
    /// Current time in seconds. Must never go backwards.
    fn now_s(&self) -> f64;
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Monotonic time source counting seconds from its own creation.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicTime {
    epoch: Instant,
}

/// Provides a consistent time between cycles.
///
/// [`Clock::cycle_ended`] must be called at the end of each control cycle so
/// the clock knows to refresh its time on the next read.
pub struct Clock {
    source: Arc<dyn TimeSource>,
    start_time_s: f64,
    current_time_s: f64,
    updated_this_cycle: bool,
    simulated: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors raised by the [`Clock`].
#[derive(Debug, Error, PartialEq)]
pub enum ClockError {
    #[error("Setting the current time is not allowed outside of simulation")]
    NotSimulated,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl MonotonicTime {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for MonotonicTime {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicTime {
    fn now_s(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }
}

impl Clock {
    /// Create a real-time clock reading from a fresh [`MonotonicTime`].
    pub fn new() -> Self {
        Self::with_source(Arc::new(MonotonicTime::new()))
    }

    /// Create a real-time clock reading from the given source.
    ///
    /// Times reported by the clock are relative to the source's time at
    /// construction.
    pub fn with_source(source: Arc<dyn TimeSource>) -> Self {
        let start_time_s = source.now_s();
        Self {
            source,
            start_time_s,
            current_time_s: 0.0,
            updated_this_cycle: false,
            simulated: false,
        }
    }

    /// Create a simulated clock.
    ///
    /// A simulated clock starts at zero and only moves when
    /// [`Clock::set_time`] or [`Clock::advance`] is called.
    pub fn simulated() -> Self {
        let mut clock = Self::new();
        clock.simulated = true;
        clock.start_time_s = 0.0;
        clock
    }

    /// Returns true if this clock is in simulated mode.
    pub fn is_simulated(&self) -> bool {
        self.simulated
    }

    /// A cycle-consistent time, in seconds.
    pub fn current_time(&mut self) -> f64 {
        if !self.updated_this_cycle {
            if !self.simulated {
                self.current_time_s = self.source.now_s() - self.start_time_s;
            }
            self.updated_this_cycle = true;
        }

        self.current_time_s
    }

    /// A cycle-consistent time, in milliseconds.
    pub fn current_time_millis(&mut self) -> f64 {
        self.current_time() * 1e3
    }

    /// A cycle-consistent time, in microseconds.
    pub fn current_time_micros(&mut self) -> f64 {
        self.current_time() * 1e6
    }

    /// A cycle-consistent time, in nanoseconds.
    pub fn current_time_nanos(&mut self) -> f64 {
        self.current_time() * NANOS_PER_SECOND as f64
    }

    /// Signal the end of a cycle, the time will be refreshed on the next read.
    pub fn cycle_ended(&mut self) {
        self.updated_this_cycle = false;
    }

    /// Set the current time of a simulated clock.
    ///
    /// On a real clock the call is rejected and logged, the time is left
    /// untouched.
    pub fn set_time(&mut self, time_s: f64) -> Result<(), ClockError> {
        if !self.simulated {
            error!("Setting the current time is not allowed outside of simulation.");
            return Err(ClockError::NotSimulated);
        }

        self.current_time_s = time_s;
        Ok(())
    }

    /// Move a simulated clock forward by `dt_s` seconds.
    pub fn advance(&mut self, dt_s: f64) -> Result<(), ClockError> {
        let t = self.current_time_s + dt_s;
        self.set_time(t)
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Clock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Clock")
            .field("start_time_s", &self.start_time_s)
            .field("current_time_s", &self.current_time_s)
            .field("updated_this_cycle", &self.updated_this_cycle)
            .field("simulated", &self.simulated)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Convert a duration into a number of seconds, or `None` if overflow
pub fn duration_to_seconds(duration: chrono::Duration) -> Option<f64> {
    duration
        .num_nanoseconds()
        .map(|ns| ns as f64 / NANOS_PER_SECOND as f64)
}
