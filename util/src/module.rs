//! Module interfaces
//!
//! Each controlled behaviour registered with the control loop (a subsystem,
//! the drivetrain, a queue of commands) shall implement [`Module`].
//!
//! All hooks are passed a time, which is the same for every module updated
//! in the same cycle.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use thiserror::Error;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// An error which can occur while running one of a module's hooks.
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("Hardware fault: {0}")]
    HardwareFault(String),

    #[error("Sensor {0} is not available")]
    SensorUnavailable(String),

    #[error("{0}")]
    Other(String),
}

// ---------------------------------------------------------------------------
// MODULE TRAIT
// ---------------------------------------------------------------------------

/// The lifecycle contract of a controlled behaviour.
///
/// Only `update` must be provided, the other hooks default to doing nothing
/// (or reporting success) so implementors override only what they need.
pub trait Module: Send {
    /// Name used when reporting faults in this module.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Called when the control loop starts. May be called more than once
    /// over the module's life, each call is a fresh start.
    fn init(&mut self, _now: f64) -> Result<(), ModuleError> {
        Ok(())
    }

    /// Capture inputs for this cycle.
    fn periodic_input(&mut self, _now: f64) -> Result<(), ModuleError> {
        Ok(())
    }

    /// Main cyclic processing.
    fn update(&mut self, now: f64) -> Result<(), ModuleError>;

    /// Commit outputs computed in `update`.
    fn periodic_output(&mut self, _now: f64) -> Result<(), ModuleError> {
        Ok(())
    }

    /// Called when the control loop stops.
    fn shutdown(&mut self, _now: f64) -> Result<(), ModuleError> {
        Ok(())
    }

    /// Runs a self-test routine on this module's hardware.
    fn check_module(&mut self, _now: f64) -> bool {
        true
    }

    /// Zeroes sensors.
    fn zero_sensors(&mut self, _now: f64) -> Result<(), ModuleError> {
        Ok(())
    }
}
