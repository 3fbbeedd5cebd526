//! Drivetrain characterisation data collection
//!
//! Ramps open loop power up slowly while coasting, recording the steady
//! state velocity reached at each voltage.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

// Internal
use super::Command;
use crate::drive::{ActuatorSink, ControlMode, DriveMessage, NeutralMode, SensorId, SensorSource};
use util::module::ModuleError;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Nominal battery voltage used to convert percent output to volts
const NOMINAL_VOLTAGE: f64 = 12.0;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectVelocityDataParams {
    /// Percent output at which collection stops
    pub max_power: f64,

    /// Percent output increase per second
    pub ramp_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VelocityDataPoint {
    /// Inches/second
    pub velocity: f64,

    /// Volts
    pub power: f64,
}

/// Samples collected for each side of the drivetrain.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VelocityData {
    pub left: Vec<VelocityDataPoint>,
    pub right: Vec<VelocityDataPoint>,
}

pub struct CollectVelocityData<S, A> {
    sensors: S,
    drive: A,
    params: CollectVelocityDataParams,

    reverse: bool,
    turn: bool,

    start_time_s: f64,
    data: Arc<Mutex<VelocityData>>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for CollectVelocityDataParams {
    fn default() -> Self {
        Self {
            max_power: 0.5,
            ramp_rate: 0.01,
        }
    }
}

impl<S, A> CollectVelocityData<S, A>
where
    S: SensorSource,
    A: ActuatorSink,
{
    /// Create a new collection command.
    ///
    /// If `reverse` the drivetrain drives backwards, if `turn` the right side
    /// is driven opposite to the left so the robot spins in place.
    pub fn new(
        sensors: S,
        drive: A,
        params: CollectVelocityDataParams,
        reverse: bool,
        turn: bool,
    ) -> Self {
        Self {
            sensors,
            drive,
            params,
            reverse,
            turn,
            start_time_s: 0.0,
            data: Arc::new(Mutex::new(VelocityData::default())),
        }
    }

    /// Handle to the collected data, valid after the command is dropped.
    pub fn data(&self) -> Arc<Mutex<VelocityData>> {
        self.data.clone()
    }

    fn lock_data(&self) -> MutexGuard<'_, VelocityData> {
        match self.data.lock() {
            Ok(g) => g,
            Err(poisoned) => {
                warn!("Velocity data lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl<S, A> Command for CollectVelocityData<S, A>
where
    S: SensorSource,
    A: ActuatorSink,
{
    fn name(&self) -> &str {
        "collect_velocity_data"
    }

    fn init(&mut self, now: f64) -> Result<(), ModuleError> {
        self.start_time_s = now;
        let mut data = self.lock_data();
        data.left.clear();
        data.right.clear();
        Ok(())
    }

    fn update(&mut self, now: f64) -> Result<bool, ModuleError> {
        let percent = self.params.ramp_rate * (now - self.start_time_s);
        if percent > self.params.max_power {
            return Ok(true);
        }

        let left_sign = if self.reverse { -1.0 } else { 1.0 };
        let right_sign = if self.turn { -left_sign } else { left_sign };

        self.drive.set_drive_message(
            DriveMessage::new(
                left_sign * percent,
                right_sign * percent,
                ControlMode::PercentOutput,
            )
            .with_neutral_mode(NeutralMode::Coast),
        )?;

        let left_vel = self.sensors.get(SensorId::LeftVelInches)?;
        let right_vel = self.sensors.get(SensorId::RightVelInches)?;
        let power = percent * NOMINAL_VOLTAGE;

        let mut data = self.lock_data();
        data.left.push(VelocityDataPoint {
            velocity: left_vel,
            power,
        });
        data.right.push(VelocityDataPoint {
            velocity: right_vel,
            power,
        });

        Ok(false)
    }

    fn shutdown(&mut self, _now: f64) -> Result<(), ModuleError> {
        debug!(
            "Collected {} velocity samples per side",
            self.lock_data().left.len()
        );
        self.drive.set_drive_message(DriveMessage::neutral())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::data_store::{self, SharedDataStore};

    fn make(reverse: bool, turn: bool) -> (CollectVelocityData<SharedDataStore, SharedDataStore>, SharedDataStore) {
        let data = data_store::shared();
        {
            let mut ds = data_store::lock(&data);
            ds.set_sensor(SensorId::LeftVelInches, 12.0);
            ds.set_sensor(SensorId::RightVelInches, -12.0);
        }
        let params = CollectVelocityDataParams {
            max_power: 0.5,
            ramp_rate: 0.25,
        };
        (
            CollectVelocityData::new(data.clone(), data.clone(), params, reverse, turn),
            data,
        )
    }

    #[test]
    fn test_ramps_until_max_power() {
        let (mut cmd, data) = make(false, false);
        cmd.init(10.0).unwrap();

        assert!(!cmd.update(11.0).unwrap());
        let msg = data_store::lock(&data).take_drive_message().unwrap();
        assert_eq!(msg.left_output, 0.25);
        assert_eq!(msg.right_output, 0.25);
        assert_eq!(msg.left_neutral_mode, NeutralMode::Coast);

        assert!(!cmd.update(12.0).unwrap());
        assert!(cmd.update(12.5).unwrap());

        let samples = cmd.data();
        let samples = samples.lock().unwrap();
        assert_eq!(samples.left.len(), 2);
        assert_eq!(samples.left[0].power, 3.0);
        assert_eq!(samples.left[1].power, 6.0);
        assert_eq!(samples.right[1].velocity, -12.0);
    }

    #[test]
    fn test_reverse_turn() {
        let (mut cmd, data) = make(true, true);
        cmd.init(0.0).unwrap();
        cmd.update(1.0).unwrap();

        let msg = data_store::lock(&data).take_drive_message().unwrap();
        assert_eq!(msg.left_output, -0.25);
        assert_eq!(msg.right_output, 0.25);

        cmd.shutdown(1.0).unwrap();
        assert_eq!(
            data_store::lock(&data).take_drive_message(),
            Some(DriveMessage::neutral())
        );
    }
}
