//! Controller tuning constants

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Tuning constants for one controlled quantity: PIDF gains, maximum
/// acceleration and velocity, tolerance and the hardware gain slot.
///
/// No assumptions are made about units. All values default to zero except
/// the slot, which defaults to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileGains {
    /// Proportional gain
    pub k_p: f64,

    /// Integral gain
    pub k_i: f64,

    /// Derivative gain
    pub k_d: f64,

    /// Feedforward gain, applied to the setpoint
    pub k_f: f64,

    pub max_accel: f64,

    pub max_velocity: f64,

    pub tolerance: f64,

    /// Gain slot on the motor controller
    pub slot: i32,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for ProfileGains {
    fn default() -> Self {
        Self {
            k_p: 0.0,
            k_i: 0.0,
            k_d: 0.0,
            k_f: 0.0,
            max_accel: 0.0,
            max_velocity: 0.0,
            tolerance: 0.0,
            slot: 1,
        }
    }
}

impl ProfileGains {
    pub fn p(mut self, gain: f64) -> Self {
        self.k_p = gain;
        self
    }

    pub fn i(mut self, gain: f64) -> Self {
        self.k_i = gain;
        self
    }

    pub fn d(mut self, gain: f64) -> Self {
        self.k_d = gain;
        self
    }

    pub fn f(mut self, gain: f64) -> Self {
        self.k_f = gain;
        self
    }

    pub fn max_accel(mut self, max_accel: f64) -> Self {
        self.max_accel = max_accel;
        self
    }

    pub fn max_velocity(mut self, max_velocity: f64) -> Self {
        self.max_velocity = max_velocity;
        self
    }

    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn slot(mut self, slot: i32) -> Self {
        self.slot = slot;
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_builder() {
        let gains = ProfileGains::default()
            .p(0.1)
            .d(0.02)
            .max_velocity(3.0)
            .slot(0);

        assert_eq!(gains.k_p, 0.1);
        assert_eq!(gains.k_i, 0.0);
        assert_eq!(gains.k_d, 0.02);
        assert_eq!(gains.max_velocity, 3.0);
        assert_eq!(gains.slot, 0);
    }

    #[test]
    fn test_partial_deserialise() {
        let gains: ProfileGains = util::params::from_str("k_p = 0.015\ntolerance = 1.5").unwrap();

        assert_eq!(gains.k_p, 0.015);
        assert_eq!(gains.tolerance, 1.5);
        assert_eq!(gains.k_f, 0.0);
        assert_eq!(gains.slot, 1);
    }
}
