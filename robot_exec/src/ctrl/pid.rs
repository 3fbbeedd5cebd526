//! # PID controller
//!
//! A time-aware PIDF controller with:
//!
//! - Continuous (wraparound) input handling for cyclic quantities such as a
//!   compass heading, so error is always taken the short way round.
//! - Anti-windup: the integral only accumulates while the proportional term
//!   alone would not saturate the output, and is cleared otherwise.
//! - A proportional deadband which leaves the derivative term untouched.
//! - Symmetric output clamping.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{trace, warn};
use serde::Serialize;

// Internal
use super::ProfileGains;
use util::{diag::Observable, maths};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A PIDF controller.
#[derive(Debug, Clone, Serialize)]
pub struct PidController {
    gains: ProfileGains,

    /// If true the input wraps around between the min and max input
    continuous: bool,

    /// Time step used when no previous time is known
    default_dt_s: f64,

    min_input: f64,
    max_input: f64,
    min_output: f64,
    max_output: f64,

    /// Absolute error below which the proportional term treats the error as
    /// zero
    deadband: f64,

    setpoint: f64,

    prev_error: f64,

    /// The integral accumulation
    total_error: f64,

    error: f64,

    result: f64,

    last_input: Option<f64>,

    prev_time_s: Option<f64>,

    last_dt_s: f64,
}

/// Snapshot of the controller internals for telemetry.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PidTelemetry {
    pub current: f64,
    pub output: f64,
    pub goal: f64,
    pub error: f64,
    pub delta_time: f64,
    pub p_gain: f64,
    pub i_gain: f64,
    pub d_gain: f64,
    pub f_gain: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PidController {
    /// Create a new controller.
    ///
    /// - `gains` - PIDF gains
    /// - `min_input`, `max_input` - the range of the measured quantity, the
    ///   setpoint is always kept inside it
    /// - `default_dt_s` - time step used on the first call, normally the
    ///   control loop period
    ///
    /// The output range defaults to `[-1, 1]`.
    pub fn new(gains: ProfileGains, min_input: f64, max_input: f64, default_dt_s: f64) -> Self {
        if min_input > max_input {
            warn!(
                "PID input lower bound ({}) is greater than upper bound ({})",
                min_input, max_input
            );
        }

        Self {
            gains,
            continuous: false,
            default_dt_s,
            min_input,
            max_input,
            min_output: -1.0,
            max_output: 1.0,
            deadband: 0.0,
            setpoint: 0.0,
            prev_error: 0.0,
            total_error: 0.0,
            error: 0.0,
            result: 0.0,
            last_input: None,
            prev_time_s: None,
            last_dt_s: 0.0,
        }
    }

    /// Calculate the output for the given measurement at the given absolute
    /// time in seconds.
    pub fn calculate(&mut self, input: f64, now_s: f64) -> f64 {
        let dt = match self.prev_time_s {
            Some(t) if now_s - t > 0.0 => now_s - t,
            Some(t) => {
                trace!(
                    "Non-positive PID time step ({} s), using default of {} s",
                    now_s - t,
                    self.default_dt_s
                );
                self.default_dt_s
            }
            None => self.default_dt_s,
        };
        self.last_dt_s = dt;
        self.last_input = Some(input);

        let mut error = self.setpoint - input;

        // Take the short way round for continuous inputs
        if self.continuous {
            let span = self.max_input - self.min_input;
            if error.abs() > span / 2.0 {
                if error > 0.0 {
                    error -= span;
                } else {
                    error += span;
                }
            }
        }
        self.error = error;

        // Only integrate while the proportional term isn't saturating
        let p_out = error * self.gains.k_p;
        if p_out < self.max_output && p_out > self.min_output {
            self.total_error += error * dt;
        } else {
            self.total_error = 0.0;
        }

        // The derivative always sees the raw error
        let proportional_error = if error.abs() < self.deadband { 0.0 } else { error };

        let result = self.gains.k_p * proportional_error
            + self.gains.k_i * self.total_error
            + self.gains.k_d * (error - self.prev_error) / dt
            + self.gains.k_f * self.setpoint;

        self.prev_error = error;
        self.result = maths::limit(result, self.max_output);
        self.prev_time_s = Some(now_s);

        trace!(
            "PID: input {:.4}, goal {:.4}, error {:.4}, dt {:.4}, output {:.4}",
            input, self.setpoint, error, dt, self.result
        );

        self.result
    }

    /// Returns true once a measurement has been seen and it is strictly
    /// within `tolerance` of the setpoint.
    pub fn is_on_target(&self, tolerance: f64) -> bool {
        match self.last_input {
            Some(i) => (i - self.setpoint).abs() < tolerance,
            None => false,
        }
    }

    /// Clear the transient state: last input, previous error and time,
    /// integral and output.
    ///
    /// Gains, ranges, deadband and setpoint are kept so the controller can be
    /// re-armed for a new manoeuvre.
    pub fn reset(&mut self) {
        self.last_input = None;
        self.prev_error = 0.0;
        self.total_error = 0.0;
        self.result = 0.0;
        self.prev_time_s = None;
    }

    /// Clear the integral accumulation only.
    pub fn reset_integrator(&mut self) {
        self.total_error = 0.0;
    }

    /// Get a telemetry snapshot of the controller.
    pub fn telemetry(&self) -> PidTelemetry {
        PidTelemetry {
            current: self.last_input.unwrap_or(std::f64::NAN),
            output: self.result,
            goal: self.setpoint,
            error: self.error,
            delta_time: self.last_dt_s,
            p_gain: self.gains.k_p,
            i_gain: self.gains.k_i,
            d_gain: self.gains.k_d,
            f_gain: self.gains.k_f,
        }
    }

    // ---- SETTERS ----

    /// Set the input range, re-clamping the current setpoint into it.
    ///
    /// An inverted range is warned about but used as given.
    pub fn set_input_range(&mut self, min_input: f64, max_input: f64) {
        if min_input > max_input {
            warn!(
                "PID input lower bound ({}) is greater than upper bound ({})",
                min_input, max_input
            );
        }
        self.min_input = min_input;
        self.max_input = max_input;
        self.set_setpoint(self.setpoint);
    }

    /// Set the output range.
    ///
    /// An inverted range is warned about but used as given.
    pub fn set_output_range(&mut self, min_output: f64, max_output: f64) {
        if min_output > max_output {
            warn!(
                "PID output lower bound ({}) is greater than upper bound ({})",
                min_output, max_output
            );
        }
        self.min_output = min_output;
        self.max_output = max_output;
    }

    /// Set the setpoint, clamped into the input range.
    pub fn set_setpoint(&mut self, setpoint: f64) {
        self.setpoint = maths::clamp(setpoint, self.min_input, self.max_input);
    }

    pub fn set_continuous(&mut self, continuous: bool) {
        self.continuous = continuous;
    }

    /// Swap the gains, takes effect on the next call to `calculate`.
    pub fn set_gains(&mut self, gains: ProfileGains) {
        self.gains = gains;
    }

    pub fn set_deadband(&mut self, deadband: f64) {
        self.deadband = deadband;
    }

    // ---- GETTERS ----

    pub fn gains(&self) -> &ProfileGains {
        &self.gains
    }

    pub fn output(&self) -> f64 {
        self.result
    }

    pub fn setpoint(&self) -> f64 {
        self.setpoint
    }

    pub fn error(&self) -> f64 {
        self.error
    }

    pub fn integral(&self) -> f64 {
        self.total_error
    }

    pub fn is_continuous(&self) -> bool {
        self.continuous
    }
}

impl Observable for PidController {
    fn observations(&self) -> Vec<(&'static str, f64)> {
        let t = self.telemetry();
        vec![
            ("current", t.current),
            ("output", t.output),
            ("goal", t.goal),
            ("error", t.error),
            ("delta_time", t.delta_time),
            ("p_gain", t.p_gain),
            ("i_gain", t.i_gain),
            ("d_gain", t.d_gain),
            ("f_gain", t.f_gain),
        ]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const DT: f64 = 0.02;

    fn heading_ctrl(gains: ProfileGains) -> PidController {
        PidController::new(gains, -180.0, 180.0, DT)
    }

    #[test]
    fn test_saturates_at_boundary() {
        let mut pid = heading_ctrl(ProfileGains::default().p(0.1));
        pid.set_output_range(-1.0, 1.0);
        pid.set_setpoint(10.0);

        assert_eq!(pid.calculate(0.0, 0.0), 1.0);

        // 0.1 * 10 isn't strictly inside the output range
        assert_eq!(pid.integral(), 0.0);
    }

    #[test]
    fn test_output_clamped() {
        let mut pid = heading_ctrl(ProfileGains::default().p(1.0));
        pid.set_setpoint(50.0);
        assert_eq!(pid.calculate(0.0, 0.0), 1.0);

        pid.set_setpoint(-50.0);
        assert_eq!(pid.calculate(0.0, DT), -1.0);
    }

    #[test]
    fn test_saturated_cycle_still_updates_history() {
        let mut pid = heading_ctrl(ProfileGains::default().p(1.0).d(0.001));
        pid.set_setpoint(50.0);

        // Error 50, saturated
        assert_eq!(pid.calculate(0.0, 0.0), 1.0);

        // Error 0.5 half a second later. The derivative must see the
        // saturated cycle's error over the real gap:
        // 0.5 + 0.001 * (0.5 - 50) / 0.5 = 0.401
        let out = pid.calculate(49.5, 0.5);
        assert!((out - 0.401).abs() < 1e-9, "output was {}", out);
        assert!((pid.telemetry().delta_time - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_integral_accumulates_until_saturated() {
        let mut pid = PidController::new(ProfileGains::default().p(0.01).i(0.1), -200.0, 200.0, DT);
        pid.set_setpoint(10.0);

        let mut expected = 0.0;
        for (i, meas) in [0.0, 2.0, 4.0, 6.0].iter().enumerate() {
            pid.calculate(*meas, i as f64 * DT);
            expected += (10.0 - meas) * DT;
            assert!((pid.integral() - expected).abs() < 1e-12);
        }

        // P * error = 1.1, saturating, so the accumulator is cleared
        pid.calculate(-100.0, 4.0 * DT);
        assert_eq!(pid.integral(), 0.0);

        // And accumulates again from zero once out of saturation
        pid.calculate(9.0, 5.0 * DT);
        assert!((pid.integral() - 1.0 * DT).abs() < 1e-12);
    }

    #[test]
    fn test_first_call_uses_default_dt() {
        let mut pid = heading_ctrl(ProfileGains::default().i(1.0));
        pid.set_setpoint(1.0);

        pid.calculate(0.0, 100.0);
        assert!((pid.integral() - DT).abs() < 1e-12);
        assert_eq!(pid.telemetry().delta_time, DT);

        pid.calculate(0.0, 100.5);
        assert!((pid.telemetry().delta_time - 0.5).abs() < 1e-12);

        // Repeated timestamp falls back to the default rather than dividing
        // by zero
        pid.calculate(0.0, 100.5);
        assert_eq!(pid.telemetry().delta_time, DT);
    }

    #[test]
    fn test_continuous_wraps_short_way() {
        let mut pid = heading_ctrl(ProfileGains::default().p(0.01));
        pid.set_continuous(true);

        pid.set_setpoint(180.0);
        pid.calculate(-179.0, 0.0);
        assert!((pid.error() - (-1.0)).abs() < 1e-9);

        pid.set_setpoint(-170.0);
        pid.calculate(170.0, DT);
        assert!((pid.error() - 20.0).abs() < 1e-9);
        assert!((pid.output() - 0.2).abs() < 1e-9);

        // Within half a span the error is left alone
        pid.set_setpoint(0.0);
        pid.calculate(179.0, 2.0 * DT);
        assert!((pid.error() - (-179.0)).abs() < 1e-9);
    }

    #[test]
    fn test_not_continuous_does_not_wrap() {
        let mut pid = heading_ctrl(ProfileGains::default().p(0.01));
        pid.set_setpoint(-170.0);
        pid.calculate(170.0, 0.0);
        assert!((pid.error() - (-340.0)).abs() < 1e-9);
    }

    #[test]
    fn test_deadband() {
        // Proportional only: inside the deadband there is no output
        let mut pid = heading_ctrl(ProfileGains::default().p(1.0));
        pid.set_deadband(2.0);
        pid.set_setpoint(0.0);
        assert_eq!(pid.calculate(1.5, 0.0), 0.0);
        assert_eq!(pid.error(), -1.5);

        // The derivative still sees the changing error
        let mut pid = heading_ctrl(ProfileGains::default().p(1.0).d(0.1));
        pid.set_output_range(-100.0, 100.0);
        pid.set_deadband(2.0);
        pid.set_setpoint(0.0);
        pid.calculate(1.0, 0.0);
        let out = pid.calculate(1.5, DT);
        assert!((out - 0.1 * (-0.5) / DT).abs() < 1e-9);
        assert!(out != 0.0);
    }

    #[test]
    fn test_reset_reproduces_fresh_sequence() {
        let gains = ProfileGains::default().p(0.05).i(0.2).d(0.01).f(0.001);
        let measurements = [0.0, 3.0, 7.5, 9.0, 10.5];
        let times = [5.0, 5.02, 5.04, 5.07, 5.09];

        let mut fresh = heading_ctrl(gains);
        fresh.set_setpoint(10.0);
        let fresh_out: Vec<f64> = measurements
            .iter()
            .zip(times.iter())
            .map(|(m, t)| fresh.calculate(*m, *t))
            .collect();

        let mut used = heading_ctrl(gains);
        used.set_setpoint(10.0);
        for (i, m) in [40.0, -20.0, 3.0].iter().enumerate() {
            used.calculate(*m, i as f64 * 0.1);
        }
        used.reset();
        let used_out: Vec<f64> = measurements
            .iter()
            .zip(times.iter())
            .map(|(m, t)| used.calculate(*m, *t))
            .collect();

        assert_eq!(fresh_out, used_out);
        assert_eq!(used.gains(), &gains);
    }

    #[test]
    fn test_is_on_target() {
        let mut pid = heading_ctrl(ProfileGains::default().p(0.1));
        pid.set_setpoint(5.0);

        // No measurement yet
        assert!(!pid.is_on_target(100.0));

        pid.calculate(4.5, 0.0);
        assert!(pid.is_on_target(1.0));
        assert!(!pid.is_on_target(0.5));

        pid.reset();
        assert!(!pid.is_on_target(100.0));
    }

    #[test]
    fn test_input_range_reclamps_setpoint() {
        let mut pid = PidController::new(ProfileGains::default(), -100.0, 100.0, DT);
        pid.set_setpoint(150.0);
        assert_eq!(pid.setpoint(), 100.0);

        pid.set_setpoint(50.0);
        pid.set_input_range(-10.0, 10.0);
        assert_eq!(pid.setpoint(), 10.0);

        // Output range changes leave the setpoint alone
        pid.set_output_range(-0.5, 0.5);
        assert_eq!(pid.setpoint(), 10.0);
    }

    #[test]
    fn test_inverted_input_range_used_literally() {
        let mut pid = PidController::new(ProfileGains::default().p(0.01), 10.0, -10.0, DT);
        pid.set_setpoint(0.0);

        // Upper bound applied first, then lower bound
        assert_eq!(pid.setpoint(), 10.0);

        let out = pid.calculate(0.0, 0.0);
        assert!(out.is_finite());
        assert!((out - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_gain_hot_swap() {
        let mut pid = heading_ctrl(ProfileGains::default().p(0.01));
        pid.set_setpoint(10.0);
        assert!((pid.calculate(0.0, 0.0) - 0.1).abs() < 1e-12);

        pid.set_gains(ProfileGains::default().p(0.02));
        assert!((pid.calculate(0.0, DT) - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_observations() {
        let mut pid = heading_ctrl(ProfileGains::default().p(0.1).f(0.5));
        pid.set_setpoint(1.0);
        pid.calculate(0.0, 0.0);

        assert_eq!(pid.observation("goal"), Some(1.0));
        assert_eq!(pid.observation("p_gain"), Some(0.1));
        assert_eq!(pid.observation("current"), Some(0.0));
        assert_eq!(pid.observation("delta_time"), Some(DT));
        assert_eq!(pid.observation("nope"), None);
    }
}
