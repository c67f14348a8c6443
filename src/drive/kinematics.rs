// Swerve kinematics for a four-module base
// Converts chassis velocities (vx, vy, omega) to per-module (speed, angle) targets and back.

use nalgebra::{SMatrix, SVector};

use crate::geometry::{ChassisVelocity, WheelGeometry, WheelState};

/// Number of swerve modules on the platform
pub const MODULE_COUNT: usize = 4;

/// Module indices, in the order used by every `[_; MODULE_COUNT]` array in this crate
pub const FRONT_LEFT: usize = 0;
pub const FRONT_RIGHT: usize = 1;
pub const BACK_LEFT: usize = 2;
pub const BACK_RIGHT: usize = 3;

pub const MODULE_NAMES: [&str; MODULE_COUNT] = ["front_left", "front_right", "back_left", "back_right"];

#[derive(Debug, thiserror::Error)]
pub enum KinematicsError {
    #[error("Module offsets are degenerate, chassis velocity cannot be recovered from wheel states")]
    DegenerateGeometry,

    #[error("Invalid module dimension {name}: {value}")]
    InvalidDimension { name: &'static str, value: f64 },
}

/// Inverse and forward kinematics for a swerve drive with fixed module offsets
#[derive(Debug, Clone)]
pub struct SwerveKinematics {
    modules: [WheelGeometry; MODULE_COUNT],
    // Least-squares solution of the inverse map, precomputed once
    forward: SMatrix<f64, 3, 8>,
}

impl SwerveKinematics {
    /// Build kinematics from explicit module offsets (front-left, front-right, back-left, back-right)
    pub fn new(modules: [WheelGeometry; MODULE_COUNT]) -> Result<Self, KinematicsError> {
        // Each module contributes two rows: [1, 0, -y] and [0, 1, x]
        let mut inverse = SMatrix::<f64, 8, 3>::zeros();
        for (i, module) in modules.iter().enumerate() {
            inverse[(2 * i, 0)] = 1.0;
            inverse[(2 * i, 2)] = -module.offset_y;
            inverse[(2 * i + 1, 1)] = 1.0;
            inverse[(2 * i + 1, 2)] = module.offset_x;
        }

        let normal = inverse.transpose() * inverse;
        let normal_inv = normal
            .try_inverse()
            .ok_or(KinematicsError::DegenerateGeometry)?;

        Ok(Self {
            modules,
            forward: normal_inv * inverse.transpose(),
        })
    }

    /// Build kinematics for a rectangular base centered on its rotation center
    ///
    /// # Arguments
    /// * `trackwidth` - Left-right distance between module centers in meters
    /// * `wheelbase` - Front-back distance between module centers in meters
    pub fn from_dimensions(trackwidth: f64, wheelbase: f64) -> Result<Self, KinematicsError> {
        for (name, value) in [("trackwidth", trackwidth), ("wheelbase", wheelbase)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(KinematicsError::InvalidDimension { name, value });
            }
        }

        let x = wheelbase / 2.0;
        let y = trackwidth / 2.0;
        Self::new([
            WheelGeometry::new(x, y),
            WheelGeometry::new(x, -y),
            WheelGeometry::new(-x, y),
            WheelGeometry::new(-x, -y),
        ])
    }

    pub fn modules(&self) -> &[WheelGeometry; MODULE_COUNT] {
        &self.modules
    }

    /// Convert a chassis velocity to module states
    ///
    /// Speeds are magnitudes of each module's velocity vector and angles are left
    /// unnormalized. A zero velocity yields zero speeds with an angle of 0.
    pub fn to_wheel_states(&self, velocity: ChassisVelocity) -> [WheelState; MODULE_COUNT] {
        self.modules.map(|module| {
            // Rigid-body velocity at the module: v + omega x r
            let vx = velocity.vx - velocity.omega * module.offset_y;
            let vy = velocity.vy + velocity.omega * module.offset_x;

            WheelState::new(vx.hypot(vy), vy.atan2(vx))
        })
    }

    /// Recover the chassis velocity from module states (least-squares fit)
    pub fn to_chassis_velocity(&self, states: &[WheelState; MODULE_COUNT]) -> ChassisVelocity {
        let mut wheel_vectors = SVector::<f64, 8>::zeros();
        for (i, state) in states.iter().enumerate() {
            let (vx, vy) = state.velocity();
            wheel_vectors[2 * i] = vx;
            wheel_vectors[2 * i + 1] = vy;
        }

        let chassis = self.forward * wheel_vectors;
        ChassisVelocity::new(chassis[0], chassis[1], chassis[2])
    }
}

/// Scale all module speeds uniformly so none exceeds `max_speed`
///
/// Ratios between modules (and so the direction of travel) are preserved; angles are untouched.
pub fn desaturate(
    states: [WheelState; MODULE_COUNT],
    max_speed: f64,
) -> [WheelState; MODULE_COUNT] {
    let largest = states
        .iter()
        .map(|state| state.speed.abs())
        .fold(0.0f64, f64::max);

    if largest > max_speed {
        let scale = max_speed / largest;
        states.map(|state| WheelState::new(state.speed * scale, state.angle))
    } else {
        states
    }
}
