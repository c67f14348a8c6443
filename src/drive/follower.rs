// Holonomic trajectory follower
//
// Feed-forward from the current position toward the goal, plus independent PID feedback on
// field x, field y and chassis heading. The result is converted into the chassis frame.

use std::time::Duration;

use tracing::trace;

use super::pid::{Pid, PidGains};
use crate::geometry::{ChassisVelocity, Pose};

#[derive(Debug, Clone)]
pub struct HolonomicFollower {
    x_controller: Pid,
    y_controller: Pid,
    theta_controller: Pid,
    enabled: bool,
}

impl HolonomicFollower {
    pub fn new(x: PidGains, y: PidGains, theta: PidGains, period: Duration) -> Self {
        Self {
            x_controller: Pid::new(x, period),
            y_controller: Pid::new(y, period),
            theta_controller: Pid::new(theta, period).with_continuous_input(),
            enabled: true,
        }
    }

    /// Compute the chassis velocity that drives `current` toward `desired`
    ///
    /// # Arguments
    /// * `current` - Current pose estimate
    /// * `desired` - Reference pose; only its position is used here
    /// * `linear_speed` - Feed-forward speed toward `desired` in m/s
    /// * `desired_heading` - Orientation the chassis should hold, in radians
    pub fn calculate(
        &mut self,
        current: Pose,
        desired: Pose,
        linear_speed: f64,
        desired_heading: f64,
    ) -> ChassisVelocity {
        let dx = desired.x - current.x;
        let dy = desired.y - current.y;
        // Inside the position tolerance only feedback acts, so the goal is not overrun
        let (x_ff, y_ff) = if dx.abs() <= self.x_controller.tolerance()
            && dy.abs() <= self.y_controller.tolerance()
        {
            (0.0, 0.0)
        } else {
            let (sin, cos) = dy.atan2(dx).sin_cos();
            (linear_speed * cos, linear_speed * sin)
        };

        let omega = self
            .theta_controller
            .calculate(current.heading, desired_heading);

        if !self.enabled {
            return ChassisVelocity::from_field_relative(x_ff, y_ff, omega, current.heading);
        }

        let x_feedback = self.x_controller.calculate(current.x, desired.x);
        let y_feedback = self.y_controller.calculate(current.y, desired.y);

        trace!(
            "Follower errors: x={:.4} y={:.4} theta={:.4}",
            self.x_controller.error(),
            self.y_controller.error(),
            self.theta_controller.error()
        );

        ChassisVelocity::from_field_relative(
            x_ff + x_feedback,
            y_ff + y_feedback,
            omega,
            current.heading,
        )
    }

    /// Whether every axis was within tolerance on the last `calculate` call
    ///
    /// False after `reset` until the next `calculate`.
    pub fn at_reference(&self) -> bool {
        self.x_controller.at_setpoint()
            && self.y_controller.at_setpoint()
            && self.theta_controller.at_setpoint()
    }

    /// Disable feedback, leaving only the feed-forward and heading terms
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Clear integral and derivative state on every axis
    pub fn reset(&mut self) {
        self.x_controller.reset();
        self.y_controller.reset();
        self.theta_controller.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_1_SQRT_2, FRAC_PI_2};

    const PERIOD: Duration = Duration::from_millis(20);

    fn follower() -> HolonomicFollower {
        let gains = PidGains::new(1.0, 0.0, 0.0, 0.02);
        HolonomicFollower::new(gains, gains, PidGains::new(2.0, 0.0, 0.0, 0.02), PERIOD)
    }

    #[test]
    fn test_at_goal_outputs_zero() {
        let mut follower = follower();
        let pose = Pose::new(1.0, 2.0, 0.4);
        let output = follower.calculate(pose, pose, 0.0, pose.heading);

        assert_eq!(output.vx, 0.0);
        assert_eq!(output.vy, 0.0);
        assert_eq!(output.omega, 0.0);
        assert!(follower.at_reference());
    }

    #[test]
    fn test_feedback_points_toward_goal() {
        let mut follower = follower();
        let output = follower.calculate(Pose::default(), Pose::new(1.0, 0.0, 0.0), 0.0, 0.0);
        assert!((output.vx - 1.0).abs() < 1e-12);
        assert!(output.vy.abs() < 1e-12);
        assert!(!follower.at_reference());
    }

    #[test]
    fn test_feedback_is_rotated_into_chassis_frame() {
        let mut follower = follower();
        // Robot faces +y; goal is 1 m along field +x, which is to the robot's right
        let current = Pose::new(0.0, 0.0, FRAC_PI_2);
        let output = follower.calculate(current, Pose::new(1.0, 0.0, FRAC_PI_2), 0.0, FRAC_PI_2);
        assert!(output.vx.abs() < 1e-12);
        assert!((output.vy - -1.0).abs() < 1e-12);
    }

    #[test]
    fn test_feed_forward_points_toward_goal() {
        let mut follower = follower();
        // Goal pose faces -y, but travel is along +y toward it
        let desired = Pose::new(0.0, 2.0, -FRAC_PI_2);
        let output = follower.calculate(Pose::default(), desired, 1.5, 0.0);
        // 1.5 feed-forward plus 2.0 proportional feedback
        assert!(output.vx.abs() < 1e-12);
        assert!((output.vy - 3.5).abs() < 1e-12);
        assert!(output.omega.abs() < 1e-12);
    }

    #[test]
    fn test_nonzero_speed_at_goal_outputs_zero() {
        let mut follower = follower();
        let pose = Pose::new(1.0, 2.0, 0.4);
        let output = follower.calculate(pose, pose, 1.5, pose.heading);
        assert!(output.is_zero());
        assert!(follower.at_reference());

        // Within tolerance only the feedback remains
        let output = follower.calculate(Pose::new(0.99, 0.0, 0.0), Pose::new(1.0, 0.0, 0.0), 1.5, 0.0);
        assert!((output.vx - 0.01).abs() < 1e-9);
        assert!(output.vy.abs() < 1e-12);
    }

    #[test]
    fn test_rotation_tracks_desired_heading() {
        let mut follower = follower();
        let pose = Pose::default();
        let output = follower.calculate(pose, pose, 0.0, 0.5);
        assert!((output.omega - 1.0).abs() < 1e-12);
        assert!(!follower.at_reference());
    }

    #[test]
    fn test_disabled_is_feed_forward_only() {
        let mut follower = follower();
        follower.set_enabled(false);
        let output = follower.calculate(Pose::default(), Pose::new(5.0, 5.0, 0.0), 1.0, 0.0);
        assert!((output.vx - FRAC_1_SQRT_2).abs() < 1e-12);
        assert!((output.vy - FRAC_1_SQRT_2).abs() < 1e-12);

        let goal = Pose::new(5.0, 5.0, 0.0);
        assert!(follower.calculate(goal, goal, 1.0, 0.0).is_zero());
    }

    #[test]
    fn test_at_reference_reflects_last_calculation() {
        let mut follower = follower();
        assert!(!follower.at_reference());
        follower.calculate(Pose::default(), Pose::new(1.0, 0.0, 0.0), 0.0, 0.0);
        assert!(!follower.at_reference());
        // Reading again does not recompute
        assert!(!follower.at_reference());
        follower.calculate(Pose::new(0.99, 0.0, 0.0), Pose::new(1.0, 0.0, 0.0), 0.0, 0.0);
        assert!(follower.at_reference());

        follower.reset();
        assert!(!follower.at_reference());
    }
}
