// Define message types for the runtime

use serde::{Deserialize, Serialize};

use crate::drive::kinematics::MODULE_COUNT;
use crate::drive::{CycleOutput, DriveMode};
use crate::geometry::{ChassisVelocity, Pose, WheelState};

// Command from teleop/scripts -> runtime
// Internally tagged: {"type": "velocity", "vx": 0.5, "vy": 0.0, "omega": 0.0}
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DriveCommand {
    /// Chassis-relative velocity (m/s, m/s, rad/s)
    Velocity { vx: f64, vy: f64, omega: f64 },
    /// Goal pose in field coordinates; speed and held heading fall back to defaults
    Goal {
        x: f64,
        y: f64,
        heading: f64,
        #[serde(default)]
        linear_speed: Option<f64>,
        #[serde(default)]
        target_heading: Option<f64>,
    },
    Defense,
    ClearDefense,
    ZeroHeading,
    ResetPose { x: f64, y: f64, heading: f64 },
}

impl DriveCommand {
    pub fn velocity(velocity: ChassisVelocity) -> Self {
        DriveCommand::Velocity {
            vx: velocity.vx,
            vy: velocity.vy,
            omega: velocity.omega,
        }
    }

    pub fn goal(pose: Pose) -> Self {
        DriveCommand::Goal {
            x: pose.x,
            y: pose.y,
            heading: pose.heading,
            linear_speed: None,
            target_heading: None,
        }
    }
}

// Telemetry published by runtime each cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Telemetry {
    pub x: f64,
    pub y: f64,
    pub heading_deg: f64,
    pub raw_heading_deg: f64,
    pub mode: DriveMode,
    pub at_reference: bool,
    pub states: [WheelState; MODULE_COUNT],
}

impl From<&CycleOutput> for Telemetry {
    fn from(output: &CycleOutput) -> Self {
        Self {
            x: output.pose.x,
            y: output.pose.y,
            heading_deg: output.pose.heading.to_degrees(),
            raw_heading_deg: output.raw_heading.to_degrees(),
            mode: output.mode,
            at_reference: output.at_reference,
            states: output.states,
        }
    }
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    CmdStale,
}
