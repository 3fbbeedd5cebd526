//! Kinematic simulation of a differential drivetrain

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, trace};
use serde::Deserialize;

// Internal
use super::{ControlMode, DriveHardware, DriveMessage, NeutralMode};
use util::{maths, module::ModuleError};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct SimDriveParams {
    /// Wheel speed at full percent output, inches/second
    pub max_speed_in_s: f64,

    /// Distance between the left and right wheels, inches
    pub track_width_in: f64,

    /// Cruise speed used when following a position target, inches/second
    pub profile_cruise_in_s: f64,

    /// Proportional gain of the simulated position follower, 1/second
    pub profile_k_p: f64,

    /// Constant heading disturbance, degrees/second
    pub heading_drift_deg_s: f64,

    /// Time constant of the decay to rest when coasting, seconds
    pub coast_time_constant_s: f64,
}

/// Simulated drivetrain hardware.
///
/// Wheel speeds follow the commanded outputs instantly, except when
/// coasting to rest. Heading is integrated from the wheel speed difference.
#[derive(Debug)]
pub struct SimDriveHardware {
    params: SimDriveParams,

    msg: DriveMessage,
    mode: ControlMode,
    last_refresh_s: Option<f64>,

    left_in: f64,
    right_in: f64,
    left_vel_in_s: f64,
    right_vel_in_s: f64,
    heading_deg: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for SimDriveParams {
    fn default() -> Self {
        Self {
            max_speed_in_s: 150.0,
            track_width_in: 24.0,
            profile_cruise_in_s: 60.0,
            profile_k_p: 4.0,
            heading_drift_deg_s: 0.0,
            coast_time_constant_s: 0.5,
        }
    }
}

impl SimDriveHardware {
    pub fn new(params: SimDriveParams) -> Self {
        Self {
            params,
            msg: DriveMessage::neutral(),
            mode: ControlMode::PercentOutput,
            last_refresh_s: None,
            left_in: 0.0,
            right_in: 0.0,
            left_vel_in_s: 0.0,
            right_vel_in_s: 0.0,
            heading_deg: 0.0,
        }
    }

    /// The most recent request applied to the hardware.
    pub fn last_message(&self) -> &DriveMessage {
        &self.msg
    }

    pub fn control_mode(&self) -> ControlMode {
        self.mode
    }

    /// Advance the simulation by `dt_s` seconds.
    pub fn step(&mut self, dt_s: f64) {
        if dt_s <= 0.0 {
            return;
        }

        self.left_vel_in_s = self.side_velocity(
            self.left_vel_in_s,
            self.left_in,
            self.msg.left_output,
            self.msg.left_demand,
            self.msg.left_neutral_mode,
            dt_s,
        );
        self.right_vel_in_s = self.side_velocity(
            self.right_vel_in_s,
            self.right_in,
            self.msg.right_output,
            self.msg.right_demand,
            self.msg.right_neutral_mode,
            dt_s,
        );

        self.left_in += self.left_vel_in_s * dt_s;
        self.right_in += self.right_vel_in_s * dt_s;

        let yaw_rate_deg_s = ((self.left_vel_in_s - self.right_vel_in_s)
            / self.params.track_width_in)
            .to_degrees()
            + self.params.heading_drift_deg_s;
        self.heading_deg = wrap_deg(self.heading_deg + yaw_rate_deg_s * dt_s);

        trace!(
            "Sim drive: left {:.2} in, right {:.2} in, heading {:.2} deg",
            self.left_in,
            self.right_in,
            self.heading_deg
        );
    }

    fn side_velocity(
        &self,
        current_vel: f64,
        position: f64,
        output: f64,
        demand: f64,
        neutral: NeutralMode,
        dt_s: f64,
    ) -> f64 {
        let demand_vel = maths::limit(demand, 1.0) * self.params.max_speed_in_s;

        match self.mode {
            ControlMode::PercentOutput => {
                let percent = maths::limit(output + demand, 1.0);

                if percent == 0.0 {
                    match neutral {
                        NeutralMode::Brake => 0.0,
                        NeutralMode::Coast => {
                            let decay =
                                maths::clamp(dt_s / self.params.coast_time_constant_s, 0.0, 1.0);
                            current_vel * (1.0 - decay)
                        }
                    }
                } else {
                    percent * self.params.max_speed_in_s
                }
            }
            ControlMode::MotionProfile => {
                let follow = maths::limit(
                    (output - position) * self.params.profile_k_p,
                    self.params.profile_cruise_in_s,
                );
                follow + demand_vel
            }
        }
    }
}

impl DriveHardware for SimDriveHardware {
    fn set(&mut self, msg: &DriveMessage) -> Result<(), ModuleError> {
        if msg.control_mode != self.mode {
            return Err(ModuleError::HardwareFault(format!(
                "Request for {:?} while configured for {:?}",
                msg.control_mode, self.mode
            )));
        }

        self.msg = *msg;
        Ok(())
    }

    fn configure_mode(&mut self, mode: ControlMode) -> Result<(), ModuleError> {
        debug!("Sim drive configured for {:?}", mode);
        self.mode = mode;
        Ok(())
    }

    fn refresh(&mut self, now: f64) -> Result<(), ModuleError> {
        if let Some(last) = self.last_refresh_s {
            self.step(now - last);
        }
        self.last_refresh_s = Some(now);
        Ok(())
    }

    fn zero_sensors(&mut self) -> Result<(), ModuleError> {
        self.left_in = 0.0;
        self.right_in = 0.0;
        self.heading_deg = 0.0;
        Ok(())
    }

    fn heading_deg(&self) -> f64 {
        self.heading_deg
    }

    fn left_inches(&self) -> f64 {
        self.left_in
    }

    fn right_inches(&self) -> f64 {
        self.right_in
    }

    fn left_vel_inches(&self) -> f64 {
        self.left_vel_in_s
    }

    fn right_vel_inches(&self) -> f64 {
        self.right_vel_in_s
    }
}

/// Wrap an angle in degrees into [-180, 180).
fn wrap_deg(deg: f64) -> f64 {
    (deg + 180.0).rem_euclid(360.0) - 180.0
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_straight_percent() {
        let mut sim = SimDriveHardware::new(SimDriveParams::default());
        sim.set(&DriveMessage::new(0.5, 0.5, ControlMode::PercentOutput))
            .unwrap();
        sim.step(1.0);

        assert!((sim.left_inches() - 75.0).abs() < 1e-9);
        assert!((sim.right_inches() - 75.0).abs() < 1e-9);
        assert_eq!(sim.heading_deg(), 0.0);
    }

    #[test]
    fn test_turn_direction() {
        let mut sim = SimDriveHardware::new(SimDriveParams::default());

        // Left faster than right turns clockwise, which is positive yaw
        sim.set(&DriveMessage::new(0.2, 0.2, ControlMode::PercentOutput).with_demand(0.05, -0.05))
            .unwrap();
        sim.step(0.1);
        assert!(sim.heading_deg() > 0.0);
    }

    #[test]
    fn test_wrong_mode_rejected() {
        let mut sim = SimDriveHardware::new(SimDriveParams::default());
        assert!(sim
            .set(&DriveMessage::new(10.0, 10.0, ControlMode::MotionProfile))
            .is_err());

        sim.configure_mode(ControlMode::MotionProfile).unwrap();
        sim.set(&DriveMessage::new(10.0, 10.0, ControlMode::MotionProfile))
            .unwrap();

        for _ in 0..500 {
            sim.step(0.01);
        }
        assert!((sim.left_inches() - 10.0).abs() < 0.1);
    }

    #[test]
    fn test_brake_and_coast() {
        let mut sim = SimDriveHardware::new(SimDriveParams::default());
        sim.set(&DriveMessage::new(1.0, 1.0, ControlMode::PercentOutput))
            .unwrap();
        sim.step(0.1);

        sim.set(&DriveMessage::neutral()).unwrap();
        sim.step(0.1);
        assert!(sim.left_vel_inches() > 0.0);
        assert!(sim.left_vel_inches() < 150.0);

        sim.set(&DriveMessage::brake()).unwrap();
        sim.step(0.1);
        assert_eq!(sim.left_vel_inches(), 0.0);
    }

    #[test]
    fn test_wrap_deg() {
        assert_eq!(wrap_deg(190.0), -170.0);
        assert_eq!(wrap_deg(-190.0), 170.0);
        assert_eq!(wrap_deg(45.0), 45.0);
    }
}
