//! Interfaces to the drivetrain hardware and sensors

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use util::module::ModuleError;

use super::{ControlMode, DriveMessage};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Identifiers of the scalar measurements available to commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorId {
    /// Heading, degrees in [-180, 180), positive clockwise
    YawDeg,

    /// Left side distance travelled, inches
    LeftPosInches,

    /// Right side distance travelled, inches
    RightPosInches,

    /// Left side velocity, inches/second
    LeftVelInches,

    /// Right side velocity, inches/second
    RightVelInches,
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Read access to measurements. Reads have no side effects.
pub trait SensorSource: Send {
    fn get(&self, id: SensorId) -> Result<f64, ModuleError>;
}

/// Somewhere drive requests can be sent.
pub trait ActuatorSink: Send {
    fn set_drive_message(&mut self, msg: DriveMessage) -> Result<(), ModuleError>;
}

/// The drivetrain hardware abstraction.
pub trait DriveHardware: Send {
    /// Apply a request to the motors.
    fn set(&mut self, msg: &DriveMessage) -> Result<(), ModuleError>;

    /// Prepare the motor controllers for a control mode.
    fn configure_mode(&mut self, mode: ControlMode) -> Result<(), ModuleError>;

    /// Called once per cycle before any sensor is read.
    fn refresh(&mut self, _now: f64) -> Result<(), ModuleError> {
        Ok(())
    }

    fn zero_sensors(&mut self) -> Result<(), ModuleError>;

    /// Self-test, true if the hardware is healthy.
    fn check(&mut self) -> bool {
        true
    }

    fn heading_deg(&self) -> f64;

    fn left_inches(&self) -> f64;

    fn right_inches(&self) -> f64;

    fn left_vel_inches(&self) -> f64;

    fn right_vel_inches(&self) -> f64;
}
