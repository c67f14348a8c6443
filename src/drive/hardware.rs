// Capability interfaces for the drivetrain hardware, plus simulated stand-ins
//
// Real drivers (motor controllers, IMU) live outside this crate and implement these traits.

use crate::geometry::WheelState;

/// Heading source (gyroscope / IMU)
pub trait HeadingSensor {
    /// Current heading in radians, in the sensor's own sign convention
    fn heading(&mut self) -> f64;

    /// Make the current orientation read as zero
    fn zero(&mut self);
}

/// A single swerve module's drive and steer actuators
///
/// The actuator runs its own closed-loop speed and angle control; it receives targets.
pub trait ModuleActuator {
    /// Command a speed (m/s, already sign-corrected for mounting) and steering angle (rad)
    fn set(&mut self, state: WheelState);

    /// Measured module state in the actuator's own frame, if the hardware reports one
    fn measured_state(&mut self) -> Option<WheelState> {
        None
    }
}

/// Gyro whose reading is advanced explicitly by the caller
#[derive(Debug, Clone, Default)]
pub struct SimulatedGyro {
    heading: f64,
}

impl SimulatedGyro {
    pub fn new(heading: f64) -> Self {
        Self { heading }
    }

    /// Advance the raw reading by `delta` radians
    pub fn rotate(&mut self, delta: f64) {
        self.heading += delta;
    }
}

impl HeadingSensor for SimulatedGyro {
    fn heading(&mut self) -> f64 {
        self.heading
    }

    fn zero(&mut self) {
        self.heading = 0.0;
    }
}

/// Module that tracks its commanded state perfectly
#[derive(Debug, Clone, Default)]
pub struct SimulatedModule {
    last_command: Option<WheelState>,
    reports_state: bool,
}

impl SimulatedModule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Module that reports its last command back as the measured state
    pub fn with_feedback() -> Self {
        Self {
            last_command: None,
            reports_state: true,
        }
    }

    pub fn last_command(&self) -> Option<WheelState> {
        self.last_command
    }
}

impl ModuleActuator for SimulatedModule {
    fn set(&mut self, state: WheelState) {
        self.last_command = Some(state);
    }

    fn measured_state(&mut self) -> Option<WheelState> {
        if self.reports_state {
            self.last_command
        } else {
            None
        }
    }
}
