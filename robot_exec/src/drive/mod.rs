//! # Drive Module
//!
//! Owns the drivetrain hardware. At the start of each cycle the sensor
//! readings are copied into the data store, at the end of the cycle the
//! pending drive request is sent to the motors.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod hardware;
mod message;
mod sim;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{info, warn};

// Internal
pub use hardware::{ActuatorSink, DriveHardware, SensorId, SensorSource};
pub use message::{ControlMode, DriveMessage, NeutralMode};
pub use sim::{SimDriveHardware, SimDriveParams};

use crate::data_store::{self, SharedDataStore};
use util::module::{Module, ModuleError};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

pub struct Drive<H: DriveHardware> {
    hardware: H,
    data: SharedDataStore,

    /// Mode the hardware is currently configured for, `None` before the
    /// first request
    active_mode: Option<ControlMode>,

    /// Last request sent, held while no new request arrives
    last_msg: DriveMessage,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<H: DriveHardware> Drive<H> {
    pub fn new(hardware: H, data: SharedDataStore) -> Self {
        Self {
            hardware,
            data,
            active_mode: None,
            last_msg: DriveMessage::neutral(),
        }
    }

    pub fn hardware(&self) -> &H {
        &self.hardware
    }

    fn send(&mut self, msg: DriveMessage) -> Result<(), ModuleError> {
        if self.active_mode != Some(msg.control_mode) {
            self.hardware.configure_mode(msg.control_mode)?;
            self.active_mode = Some(msg.control_mode);
        }

        self.hardware.set(&msg)?;
        self.last_msg = msg;
        Ok(())
    }
}

impl<H: DriveHardware> Module for Drive<H> {
    fn name(&self) -> &str {
        "drive"
    }

    fn init(&mut self, _now: f64) -> Result<(), ModuleError> {
        self.active_mode = None;
        self.send(DriveMessage::neutral())
    }

    fn periodic_input(&mut self, now: f64) -> Result<(), ModuleError> {
        self.hardware.refresh(now)?;

        let mut ds = data_store::lock(&self.data);
        ds.set_sensor(SensorId::YawDeg, self.hardware.heading_deg());
        ds.set_sensor(SensorId::LeftPosInches, self.hardware.left_inches());
        ds.set_sensor(SensorId::RightPosInches, self.hardware.right_inches());
        ds.set_sensor(SensorId::LeftVelInches, self.hardware.left_vel_inches());
        ds.set_sensor(SensorId::RightVelInches, self.hardware.right_vel_inches());

        Ok(())
    }

    fn update(&mut self, _now: f64) -> Result<(), ModuleError> {
        Ok(())
    }

    fn periodic_output(&mut self, _now: f64) -> Result<(), ModuleError> {
        let pending = data_store::lock(&self.data).take_drive_message();

        let msg = pending.unwrap_or(self.last_msg);
        self.send(msg)
    }

    fn shutdown(&mut self, _now: f64) -> Result<(), ModuleError> {
        info!("Stopping drive");
        self.send(DriveMessage::neutral())
    }

    fn zero_sensors(&mut self, _now: f64) -> Result<(), ModuleError> {
        self.hardware.zero_sensors()
    }

    fn check_module(&mut self, _now: f64) -> bool {
        let ok = self.hardware.check();
        if !ok {
            warn!("Drive hardware failed its self-test");
        }
        ok
    }
}
