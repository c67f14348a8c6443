// Dead-reckoning pose estimation from module states and a heading sensor

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::kinematics::{MODULE_COUNT, SwerveKinematics};
use crate::geometry::{Pose, Twist, WheelState, wrap_angle};

/// Relation between the raw heading sensor reading and the heading used for pose estimation
///
/// Field navigation treats counter-clockwise as positive. Sensors mounted so that their raw
/// reading grows clockwise need `Inverted`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadingConvention {
    Direct,
    #[default]
    Inverted,
}

impl HeadingConvention {
    /// Map a raw sensor reading (radians) to a counter-clockwise-positive heading
    pub fn apply(self, raw: f64) -> f64 {
        match self {
            HeadingConvention::Direct => raw,
            HeadingConvention::Inverted => -raw,
        }
    }
}

/// Running pose estimate for a swerve base
///
/// The heading sensor is authoritative for orientation; module states only contribute
/// translation. Non-finite inputs propagate into the pose unchanged.
#[derive(Debug, Clone)]
pub struct SwerveOdometry {
    kinematics: SwerveKinematics,
    convention: HeadingConvention,
    period: f64,
    pose: Pose,
    heading_offset: f64,
    previous_heading: f64,
}

impl SwerveOdometry {
    /// Create an estimator starting at `start`, given the raw heading reading at that moment
    pub fn new(
        kinematics: SwerveKinematics,
        convention: HeadingConvention,
        period: Duration,
        raw_heading: f64,
        start: Pose,
    ) -> Self {
        let mut odometry = Self {
            kinematics,
            convention,
            period: period.as_secs_f64(),
            pose: start,
            heading_offset: 0.0,
            previous_heading: start.heading,
        };
        odometry.reset_position(start, raw_heading);
        odometry
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn convention(&self) -> HeadingConvention {
        self.convention
    }

    /// Reinitialize the estimate
    ///
    /// Must only be called after any physical reset of the heading sensor, otherwise the
    /// offset computed here is immediately stale.
    pub fn reset_position(&mut self, pose: Pose, raw_heading: f64) {
        debug!("Odometry reset to {:?} (raw heading {:.4} rad)", pose, raw_heading);
        self.pose = pose;
        self.previous_heading = pose.heading;
        self.heading_offset = pose.heading - self.convention.apply(raw_heading);
    }

    /// Advance the estimate by one control period
    pub fn update(&mut self, raw_heading: f64, states: &[WheelState; MODULE_COUNT]) -> Pose {
        let heading = self.convention.apply(raw_heading) + self.heading_offset;
        let chassis = self.kinematics.to_chassis_velocity(states);

        let twist = Twist {
            dx: chassis.vx * self.period,
            dy: chassis.vy * self.period,
            // Sensors wrap at +-pi; the turn taken this period is the short way round
            dtheta: wrap_angle(heading - self.previous_heading),
        };

        let moved = self.pose.exp(twist);
        self.pose = Pose::new(moved.x, moved.y, heading);
        self.previous_heading = heading;

        self.pose
    }
}
