//! Drivetrain actuator requests

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A request for the drivetrain actuators.
///
/// The meaning of the outputs depends on the control mode: a fraction of
/// full power between -1 and +1 in `PercentOutput`, a position target in
/// `MotionProfile`. The demands are an additional percent output applied on
/// top of whichever mode is active.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriveMessage {
    pub left_output: f64,
    pub right_output: f64,

    pub left_demand: f64,
    pub right_demand: f64,

    pub control_mode: ControlMode,

    pub left_neutral_mode: NeutralMode,
    pub right_neutral_mode: NeutralMode,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// How the motor controllers interpret the outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlMode {
    /// Fraction of full power, -1 to +1
    PercentOutput,

    /// Position target followed with a motion profile on the motor controller
    MotionProfile,
}

/// What the motors do when not driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NeutralMode {
    Brake,
    Coast,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DriveMessage {
    /// Create a new message with zero demand, braking when idle.
    pub fn new(left_output: f64, right_output: f64, control_mode: ControlMode) -> Self {
        Self {
            left_output,
            right_output,
            left_demand: 0.0,
            right_demand: 0.0,
            control_mode,
            left_neutral_mode: NeutralMode::Brake,
            right_neutral_mode: NeutralMode::Brake,
        }
    }

    /// Zero output, coasting.
    pub fn neutral() -> Self {
        Self::new(0.0, 0.0, ControlMode::PercentOutput).with_neutral_mode(NeutralMode::Coast)
    }

    /// Zero output, braking.
    pub fn brake() -> Self {
        Self::new(0.0, 0.0, ControlMode::PercentOutput).with_neutral_mode(NeutralMode::Brake)
    }

    /// Open loop drive and turn, both from -1 to +1.
    ///
    /// Positive throttle is forward, positive turn is to the right.
    pub fn from_throttle_and_turn(throttle: f64, turn: f64) -> Self {
        Self::new(throttle + turn, throttle - turn, ControlMode::PercentOutput)
    }

    /// Like [`DriveMessage::from_throttle_and_turn`], but turn power that
    /// would be lost to saturation on one side is taken off the other side
    /// instead.
    pub fn clamped_turn_drive(throttle: f64, turn: f64) -> Self {
        let mut left = throttle + turn;
        let mut right = throttle - turn;

        if left > 1.0 {
            right -= left - 1.0;
            left = 1.0;
        } else if right > 1.0 {
            left -= right - 1.0;
            right = 1.0;
        } else if left < -1.0 {
            right += -1.0 - left;
            left = -1.0;
        } else if right < -1.0 {
            left += -1.0 - right;
            right = -1.0;
        }

        Self::new(left, right, ControlMode::PercentOutput).with_neutral_mode(NeutralMode::Brake)
    }

    /// Throttle and turn with the turn scaled by the throttle magnitude and
    /// `turn_sensitivity`, so turning is gentler at low speed.
    pub fn curvature_drive(throttle: f64, turn: f64, turn_sensitivity: f64) -> Self {
        let adjusted_turn = throttle.abs() * turn * turn_sensitivity;

        Self::from_throttle_and_turn(throttle, adjusted_turn).with_neutral_mode(NeutralMode::Brake)
    }

    pub fn with_demand(mut self, left_demand: f64, right_demand: f64) -> Self {
        self.left_demand = left_demand;
        self.right_demand = right_demand;
        self
    }

    pub fn with_neutral_mode(mut self, mode: NeutralMode) -> Self {
        self.left_neutral_mode = mode;
        self.right_neutral_mode = mode;
        self
    }

    pub fn with_control_mode(mut self, mode: ControlMode) -> Self {
        self.control_mode = mode;
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_neutral_coasts() {
        let n = DriveMessage::neutral();
        assert_eq!(n.left_output, 0.0);
        assert_eq!(n.right_output, 0.0);
        assert_eq!(n.control_mode, ControlMode::PercentOutput);
        assert_eq!(n.left_neutral_mode, NeutralMode::Coast);
        assert_eq!(n.right_neutral_mode, NeutralMode::Coast);

        assert_eq!(DriveMessage::brake().left_neutral_mode, NeutralMode::Brake);
        assert_ne!(DriveMessage::brake(), n);
    }

    #[test]
    fn test_clamped_turn_drive() {
        let m = DriveMessage::clamped_turn_drive(0.8, 0.4);
        assert_eq!(m.left_output, 1.0);
        assert!((m.right_output - 0.2).abs() < 1e-12);

        let m = DriveMessage::clamped_turn_drive(-0.8, 0.4);
        assert_eq!(m.right_output, -1.0);
        assert!((m.left_output - (-0.2)).abs() < 1e-12);

        // Unsaturated is untouched
        let m = DriveMessage::clamped_turn_drive(0.2, 0.1);
        assert!((m.left_output - 0.3).abs() < 1e-12);
        assert!((m.right_output - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_curvature_drive() {
        let m = DriveMessage::curvature_drive(0.5, 1.0, 0.5);
        assert!((m.left_output - 0.75).abs() < 1e-12);
        assert!((m.right_output - 0.25).abs() < 1e-12);

        // No throttle means no turn
        let m = DriveMessage::curvature_drive(0.0, 1.0, 0.5);
        assert_eq!(m.left_output, 0.0);
        assert_eq!(m.right_output, 0.0);
    }
}
