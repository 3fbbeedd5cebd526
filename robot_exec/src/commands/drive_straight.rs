//! Drive a set distance while holding a heading
//!
//! Heading is held by a PID controller on yaw whose output is applied as a
//! differential demand, so the same correction is used whichever control
//! mode the linear output is in.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{info, trace, warn};
use serde::{Deserialize, Serialize};

// Internal
use super::Command;
use crate::ctrl::{PidController, ProfileGains};
use crate::drive::{ActuatorSink, ControlMode, DriveMessage, NeutralMode, SensorId, SensorSource};
use util::{maths, module::ModuleError};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

const HEADING_MIN_DEG: f64 = -180.0;
const HEADING_MAX_DEG: f64 = 180.0;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveStraightParams {
    /// Percent output used once inside the ramp distance
    pub drive_percent_output: f64,

    /// Distance error within which the manoeuvre is complete, inches
    pub allowable_distance_error: f64,

    /// Distance over which the ramp headroom is spread, inches
    pub ramp_distance: f64,

    /// Absolute limit on the linear percent output
    pub linear_percent_output_limit: f64,
}

/// Snapshot of the command's working values from the last update.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DriveStraightTelemetry {
    pub heading_error: f64,
    pub pid_output: f64,
    pub heading: f64,
    pub target_heading: f64,
    pub linear_output: f64,
    pub distance_target: f64,
    pub distance_error: f64,
}

pub struct DriveStraight<S, A> {
    sensors: S,
    drive: A,

    control_mode: DriveControlMode,
    params: DriveStraightParams,

    state: DriveStraightState,

    distance_to_drive: f64,
    initial_distance: f64,

    /// Heading to hold, if `None` the heading at `init` is held
    explicit_heading: Option<f64>,
    target_heading: f64,

    heading_ctrl: PidController,

    telemetry: DriveStraightTelemetry,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// How the linear part of the drive output is generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriveControlMode {
    /// Percent output ramped down as the target is approached
    PercentOutput,

    /// A distance target followed by the motor controllers
    MotionProfile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DriveStraightState {
    Idle,
    Running,
    Complete,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for DriveStraightParams {
    fn default() -> Self {
        Self {
            drive_percent_output: 0.3,
            allowable_distance_error: 3.0,
            ramp_distance: 120.0,
            linear_percent_output_limit: 1.0,
        }
    }
}

impl DriveControlMode {
    pub fn motor_control_mode(self) -> ControlMode {
        match self {
            DriveControlMode::PercentOutput => ControlMode::PercentOutput,
            DriveControlMode::MotionProfile => ControlMode::MotionProfile,
        }
    }
}

impl<S, A> DriveStraight<S, A>
where
    S: SensorSource,
    A: ActuatorSink,
{
    /// Create a new drive straight command.
    ///
    /// - `distance_to_drive` - inches, relative to where the drivetrain is
    ///   when the command starts
    /// - `heading_gains` - gains for the heading controller, whose input is
    ///   yaw in degrees
    /// - `default_dt_s` - the heading controller's time step for its first
    ///   cycle, normally the control loop period
    pub fn new(
        sensors: S,
        drive: A,
        control_mode: DriveControlMode,
        distance_to_drive: f64,
        heading_gains: ProfileGains,
        default_dt_s: f64,
    ) -> Self {
        Self {
            sensors,
            drive,
            control_mode,
            params: DriveStraightParams::default(),
            state: DriveStraightState::Idle,
            distance_to_drive,
            initial_distance: 0.0,
            explicit_heading: None,
            target_heading: 0.0,
            heading_ctrl: PidController::new(
                heading_gains,
                HEADING_MIN_DEG,
                HEADING_MAX_DEG,
                default_dt_s,
            ),
            telemetry: DriveStraightTelemetry::default(),
        }
    }

    // ---- BUILDERS ----

    /// Set the ramp parameters. A non-positive ramp distance disables the
    /// ramp, the base percent output is used all the way to the target.
    pub fn with_params(mut self, params: DriveStraightParams) -> Self {
        if params.ramp_distance <= 0.0 {
            warn!(
                "DriveStraight ramp distance must be positive (got {}), ramp disabled",
                params.ramp_distance
            );
        }
        self.params = params;
        self
    }

    pub fn with_distance_to_drive(mut self, distance: f64) -> Self {
        self.distance_to_drive = distance;
        self
    }

    /// Hold the given heading rather than the heading at start.
    pub fn with_target_heading(mut self, heading_deg: f64) -> Self {
        self.explicit_heading = Some(heading_deg);
        self.target_heading = heading_deg;
        self.heading_ctrl.set_setpoint(heading_deg);
        self
    }

    pub fn with_heading_gains(mut self, gains: ProfileGains) -> Self {
        self.heading_ctrl.set_gains(gains);
        self
    }

    pub fn with_drive_percent_output(mut self, percent: f64) -> Self {
        self.params.drive_percent_output = percent;
        self
    }

    // ---- GETTERS ----

    pub fn state(&self) -> DriveStraightState {
        self.state
    }

    pub fn telemetry(&self) -> &DriveStraightTelemetry {
        &self.telemetry
    }

    pub fn heading_controller(&self) -> &PidController {
        &self.heading_ctrl
    }

    // ---- PRIVATE ----

    fn average_drive_distance(&self) -> Result<f64, ModuleError> {
        let left = self.sensors.get(SensorId::LeftPosInches)?;
        let right = self.sensors.get(SensorId::RightPosInches)?;
        Ok((left + right) / 2.0)
    }

    fn average_distance_travelled(&self) -> Result<f64, ModuleError> {
        Ok(self.average_drive_distance()? - self.initial_distance)
    }

    fn linear_output(&self, distance_error: f64) -> f64 {
        match self.control_mode {
            DriveControlMode::PercentOutput => {
                // Headroom above the base output, shared out over the ramp
                // distance. Outside the ramp this saturates.
                let available = 1.0 - self.params.drive_percent_output;
                let distance_gain = if self.params.ramp_distance > 0.0 {
                    available / self.params.ramp_distance
                } else {
                    0.0
                };
                let linear = self.params.drive_percent_output + distance_gain * distance_error;

                // Leave room for the heading correction on both sides
                let linear = maths::limit(linear, 1.0 - 2.0 * self.heading_ctrl.gains().k_p);
                maths::limit(linear, self.params.linear_percent_output_limit)
            }
            DriveControlMode::MotionProfile => self.initial_distance + self.distance_to_drive,
        }
    }
}

impl<S, A> Command for DriveStraight<S, A>
where
    S: SensorSource,
    A: ActuatorSink,
{
    fn name(&self) -> &str {
        "drive_straight"
    }

    fn init(&mut self, _now: f64) -> Result<(), ModuleError> {
        self.target_heading = match self.explicit_heading {
            Some(h) => h,
            None => self.sensors.get(SensorId::YawDeg)?,
        };
        self.initial_distance = self.average_drive_distance()?;

        self.heading_ctrl.set_continuous(true);
        self.heading_ctrl.set_output_range(-1.0, 1.0);
        self.heading_ctrl.reset();
        self.heading_ctrl.set_setpoint(self.target_heading);

        self.state = DriveStraightState::Running;

        info!(
            "Driving {:.1} in from {:.1} in holding {:.1} deg ({:?})",
            self.distance_to_drive, self.initial_distance, self.target_heading, self.control_mode
        );

        Ok(())
    }

    fn update(&mut self, now: f64) -> Result<bool, ModuleError> {
        match self.state {
            DriveStraightState::Running => (),
            DriveStraightState::Complete => return Ok(true),
            DriveStraightState::Idle => {
                return Err(ModuleError::Other(String::from(
                    "DriveStraight updated before being initialised",
                )))
            }
        }

        let heading = self.sensors.get(SensorId::YawDeg)?;
        let distance_error = self.distance_to_drive - self.average_distance_travelled()?;

        let angular_output = self.heading_ctrl.calculate(heading, now);
        let linear_output = self.linear_output(distance_error);

        self.telemetry = DriveStraightTelemetry {
            heading_error: self.heading_ctrl.error(),
            pid_output: angular_output,
            heading,
            target_heading: self.target_heading,
            linear_output,
            distance_target: self.distance_to_drive,
            distance_error,
        };
        trace!("DriveStraight: {:?}", self.telemetry);

        if maths::epsilon_equals(distance_error, 0.0, self.params.allowable_distance_error) {
            self.drive.set_drive_message(DriveMessage::neutral())?;
            self.state = DriveStraightState::Complete;

            info!(
                "DriveStraight complete, {:.2} in from target",
                distance_error
            );
            return Ok(true);
        }

        let msg = DriveMessage::new(
            linear_output,
            linear_output,
            self.control_mode.motor_control_mode(),
        )
        .with_demand(angular_output, -angular_output)
        .with_neutral_mode(NeutralMode::Brake);
        self.drive.set_drive_message(msg)?;

        Ok(false)
    }
}
