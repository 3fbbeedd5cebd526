//! # Robot Executable Parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use crate::{
    commands::{CollectVelocityDataParams, DriveStraightParams},
    ctrl::ProfileGains,
    drive::SimDriveParams,
};

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ExecParams {
    /// Period of the control loop in seconds
    pub control_loop_period_s: f64,

    /// Time step used by controllers on their first cycle, seconds
    pub default_dt_s: f64,

    /// Gains of the heading controller, input in degrees, output in percent
    pub drive_heading_gains: ProfileGains,

    #[serde(default)]
    pub drive_straight: DriveStraightParams,

    #[serde(default)]
    pub collect_velocity_data: CollectVelocityDataParams,

    #[serde(default)]
    pub sim: SimDriveParams,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_load_exec_params() {
        let p: ExecParams = util::params::from_str(
            r#"
            control_loop_period_s = 0.01
            default_dt_s = 0.01

            [drive_heading_gains]
            k_p = 0.0085
            k_d = 0.001

            [drive_straight]
            ramp_distance = 60.0
            "#,
        )
        .unwrap();

        assert_eq!(p.control_loop_period_s, 0.01);
        assert_eq!(p.drive_heading_gains.k_p, 0.0085);
        assert_eq!(p.drive_heading_gains.slot, 1);
        assert_eq!(p.drive_straight.ramp_distance, 60.0);
        assert_eq!(p.drive_straight.drive_percent_output, 0.3);
        assert_eq!(p.collect_velocity_data.max_power, 0.5);
        assert_eq!(p.sim.track_width_in, 24.0);
    }
}
