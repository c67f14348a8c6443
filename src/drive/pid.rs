// Single-axis PID controller with a fixed sample period

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::geometry::wrap_angle;

/// Gains and tolerance for one PID axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// Error magnitude at or below which the axis counts as settled
    pub tolerance: f64,
    /// Bound on the accumulated error (error * seconds)
    pub integrator_limit: f64,
}

impl Default for PidGains {
    fn default() -> Self {
        Self {
            kp: 1.0,
            ki: 0.0,
            kd: 0.0,
            tolerance: 0.05,
            integrator_limit: 1.0,
        }
    }
}

impl PidGains {
    pub const fn new(kp: f64, ki: f64, kd: f64, tolerance: f64) -> Self {
        Self {
            kp,
            ki,
            kd,
            tolerance,
            integrator_limit: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Pid {
    gains: PidGains,
    period: f64,
    continuous: bool,
    error: f64,
    total_error: f64,
    has_measurement: bool,
}

impl Pid {
    pub fn new(gains: PidGains, period: Duration) -> Self {
        Self {
            gains,
            period: period.as_secs_f64(),
            continuous: false,
            error: 0.0,
            total_error: 0.0,
            has_measurement: false,
        }
    }

    /// Treat the input as an angle in radians, taking the shortest way around
    pub fn with_continuous_input(mut self) -> Self {
        self.continuous = true;
        self
    }

    /// Compute the control output for one period
    pub fn calculate(&mut self, measurement: f64, setpoint: f64) -> f64 {
        let mut error = setpoint - measurement;
        if self.continuous {
            error = wrap_angle(error);
        }

        let derivative = if self.has_measurement {
            (error - self.error) / self.period
        } else {
            0.0
        };

        let limit = self.gains.integrator_limit;
        self.total_error = (self.total_error + error * self.period).clamp(-limit, limit);
        self.error = error;
        self.has_measurement = true;

        self.gains.kp * error + self.gains.ki * self.total_error + self.gains.kd * derivative
    }

    /// Error from the most recent `calculate` call
    pub fn error(&self) -> f64 {
        self.error
    }

    pub fn tolerance(&self) -> f64 {
        self.gains.tolerance
    }

    /// Whether the most recent error was within tolerance; false until the first sample
    pub fn at_setpoint(&self) -> bool {
        self.has_measurement && self.error.abs() <= self.gains.tolerance
    }

    /// Clear accumulated state
    pub fn reset(&mut self) {
        self.error = 0.0;
        self.total_error = 0.0;
        self.has_measurement = false;
    }
}
