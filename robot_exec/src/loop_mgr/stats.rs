//! Loop timing records

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;
use util::diag::Observable;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Aggregate timing statistics over the loop manager's running life.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LoopStats {
    /// Number of ticks executed
    pub num_loops: u64,

    /// Number of ticks which took longer than the loop period
    pub num_overruns: u64,

    /// `num_overruns / num_loops`, zero if no loops have run
    pub overrun_ratio: f64,

    /// Wall time taken by the most recent tick
    pub last_dt_s: f64,
}

/// Bookkeeping for a single tick.
#[derive(Debug, Clone, Serialize)]
pub struct TickRecord {
    /// Cycle time handed to the modules
    pub start_s: f64,

    /// Wall time taken by the tick
    pub elapsed_s: f64,

    /// True if `elapsed_s` exceeded the loop period
    pub overran: bool,

    /// Loop count including this tick
    pub num_loops: u64,

    /// Overrun count including this tick
    pub num_overruns: u64,

    /// Faults raised by modules during this tick
    pub faults: Vec<ModuleFault>,
}

/// A module hook which failed during a tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleFault {
    pub module: String,
    pub hook: &'static str,
    pub reason: String,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LoopStats {
    pub fn new(num_loops: u64, num_overruns: u64, last_dt_s: f64) -> Self {
        let overrun_ratio = if num_loops == 0 {
            0.0
        } else {
            num_overruns as f64 / num_loops as f64
        };

        Self {
            num_loops,
            num_overruns,
            overrun_ratio,
            last_dt_s,
        }
    }
}

impl Observable for LoopStats {
    fn observations(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("highfreq_loop_dt", self.last_dt_s),
            ("num_loops", self.num_loops as f64),
            ("num_overruns", self.num_overruns as f64),
            ("overrun_ratio", self.overrun_ratio),
        ]
    }
}

impl std::fmt::Display for ModuleFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}::{} failed: {}", self.module, self.hook, self.reason)
    }
}
