//! # Robot library.
//!
//! The real-time control core of the robot: the fixed period loop manager,
//! the controllers, the drivetrain interfaces and the commands built on them.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

/// Commands - one-shot behaviours and the queue which runs them
pub mod commands;

/// Control - PID controller and tuning constants
pub mod ctrl;

/// Data shared between the modules in the control loop
pub mod data_store;

/// Drive module - drivetrain hardware, sensors and actuator requests
pub mod drive;

/// Loop manager - runs the modules on a fixed period
pub mod loop_mgr;

/// Parameters for the robot executable
pub mod params;
