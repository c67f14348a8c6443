// Planar geometry shared by the kinematics, odometry and follower.
//
// Frame convention: +x forward, +y left, angles in radians, counter-clockwise positive.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Wrap an angle into [-pi, pi).
pub fn wrap_angle(angle: f64) -> f64 {
    (angle + PI).rem_euclid(2.0 * PI) - PI
}

/// Rigid-body velocity of the chassis, expressed in the chassis frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChassisVelocity {
    /// Forward velocity in m/s
    pub vx: f64,
    /// Leftward velocity in m/s
    pub vy: f64,
    /// Angular velocity in rad/s (counter-clockwise positive)
    pub omega: f64,
}

impl ChassisVelocity {
    pub const fn new(vx: f64, vy: f64, omega: f64) -> Self {
        Self { vx, vy, omega }
    }

    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn is_zero(&self) -> bool {
        self.vx == 0.0 && self.vy == 0.0 && self.omega == 0.0
    }

    /// Convert a field-relative velocity into the chassis frame of a robot facing `heading`.
    pub fn from_field_relative(vx: f64, vy: f64, omega: f64, heading: f64) -> Self {
        let (sin, cos) = heading.sin_cos();
        Self {
            vx: vx * cos + vy * sin,
            vy: -vx * sin + vy * cos,
            omega,
        }
    }
}

/// Fixed mounting position of a wheel module relative to the rotation center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelGeometry {
    pub offset_x: f64,
    pub offset_y: f64,
}

impl WheelGeometry {
    pub const fn new(offset_x: f64, offset_y: f64) -> Self {
        Self { offset_x, offset_y }
    }
}

/// Target (or measured) state of a single wheel module.
///
/// The angle is not normalized; any real value is a valid steering target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WheelState {
    /// Signed linear speed at the wheel in m/s
    pub speed: f64,
    /// Steering angle in radians
    pub angle: f64,
}

impl WheelState {
    pub const fn new(speed: f64, angle: f64) -> Self {
        Self { speed, angle }
    }

    /// Velocity vector of the wheel contact point, in the chassis frame.
    pub fn velocity(&self) -> (f64, f64) {
        let (sin, cos) = self.angle.sin_cos();
        (self.speed * cos, self.speed * sin)
    }
}

/// Planar pose of the platform on the field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pose {
    /// Position in meters
    pub x: f64,
    pub y: f64,
    /// Orientation in radians
    pub heading: f64,
}

/// Change in pose expressed in the frame of the starting pose.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Twist {
    pub dx: f64,
    pub dy: f64,
    pub dtheta: f64,
}

impl Pose {
    pub const fn new(x: f64, y: f64, heading: f64) -> Self {
        Self { x, y, heading }
    }

    /// Apply a twist (constant-curvature arc) to this pose.
    pub fn exp(&self, twist: Twist) -> Pose {
        let Twist { dx, dy, dtheta } = twist;
        let (sin_theta, cos_theta) = dtheta.sin_cos();

        // Series expansion near zero rotation avoids dividing by ~0
        let (s, c) = if dtheta.abs() < 1e-9 {
            (1.0 - dtheta * dtheta / 6.0, 0.5 * dtheta)
        } else {
            (sin_theta / dtheta, (1.0 - cos_theta) / dtheta)
        };

        let local_x = dx * s - dy * c;
        let local_y = dx * c + dy * s;

        let (sin, cos) = self.heading.sin_cos();
        Pose {
            x: self.x + local_x * cos - local_y * sin,
            y: self.y + local_x * sin + local_y * cos,
            heading: self.heading + dtheta,
        }
    }
}

/// A pose goal for the holonomic follower.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryGoal {
    pub pose: Pose,
    /// Desired travel speed toward the goal position, in m/s
    pub linear_speed: f64,
    /// Desired final orientation of the chassis, in radians
    pub heading: f64,
}

impl TrajectoryGoal {
    pub const fn new(pose: Pose, linear_speed: f64, heading: f64) -> Self {
        Self {
            pose,
            linear_speed,
            heading,
        }
    }
}
