// Drivetrain coordinator
//
// Owns the kinematics, odometry and follower and runs one control cycle per `step()` call.
// The caller owns the scheduler and must serialize calls.

use std::f64::consts::FRAC_PI_4;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use super::follower::HolonomicFollower;
use super::hardware::{HeadingSensor, ModuleActuator};
use super::kinematics::{desaturate, KinematicsError, SwerveKinematics, MODULE_COUNT, MODULE_NAMES};
use super::odometry::SwerveOdometry;
use crate::config::{ConfigError, DrivetrainConfig};
use crate::geometry::{ChassisVelocity, Pose, TrajectoryGoal, WheelState};

/// X stance: front-left and back-right at +45 degrees, the other two at -45 degrees
pub const DEFENSE_STATES: [WheelState; MODULE_COUNT] = [
    WheelState::new(0.0, FRAC_PI_4),
    WheelState::new(0.0, -FRAC_PI_4),
    WheelState::new(0.0, -FRAC_PI_4),
    WheelState::new(0.0, FRAC_PI_4),
];

#[derive(Debug, thiserror::Error)]
pub enum DrivetrainError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Kinematics(#[from] KinematicsError),
}

/// Pending motion command; the latest one set wins
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Velocity(ChassisVelocity),
    Goal(TrajectoryGoal),
}

/// What produced the wheel targets of a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriveMode {
    Velocity,
    Goal,
    Defense,
}

/// Result of one control cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleOutput {
    pub mode: DriveMode,
    /// Chassis velocity sent through kinematics (zero in defense)
    pub chassis: ChassisVelocity,
    /// Module targets before per-module drive inversion
    pub states: [WheelState; MODULE_COUNT],
    pub pose: Pose,
    /// Heading sensor reading for this cycle, in the sensor's convention
    pub raw_heading: f64,
    pub at_reference: bool,
}

pub struct Drivetrain<G, M> {
    config: DrivetrainConfig,
    kinematics: SwerveKinematics,
    odometry: SwerveOdometry,
    follower: HolonomicFollower,
    gyro: G,
    modules: [M; MODULE_COUNT],
    command: Command,
    defense: bool,
    last_states: [WheelState; MODULE_COUNT],
}

impl<G: HeadingSensor, M: ModuleActuator> Drivetrain<G, M> {
    /// Build a drivetrain; modules are ordered front-left, front-right, back-left, back-right
    pub fn new(
        config: DrivetrainConfig,
        mut gyro: G,
        modules: [M; MODULE_COUNT],
    ) -> Result<Self, DrivetrainError> {
        config.validate()?;

        let kinematics = SwerveKinematics::from_dimensions(config.trackwidth_m, config.wheelbase_m)?;
        let odometry = SwerveOdometry::new(
            kinematics.clone(),
            config.heading_convention,
            config.period(),
            gyro.heading(),
            config.starting_pose,
        );
        let follower = HolonomicFollower::new(
            config.follower.x,
            config.follower.y,
            config.follower.theta,
            config.period(),
        );

        info!(
            "Drivetrain ready: {:.3}m x {:.3}m, max {:.2} m/s, {}ms period",
            config.trackwidth_m, config.wheelbase_m, config.max_velocity_mps, config.period_ms
        );

        Ok(Self {
            config,
            kinematics,
            odometry,
            follower,
            gyro,
            modules,
            command: Command::Velocity(ChassisVelocity::zero()),
            defense: false,
            last_states: [WheelState::default(); MODULE_COUNT],
        })
    }

    /// Drive at a chassis-relative velocity; rotation beyond the configured maximum is clamped
    pub fn drive(&mut self, velocity: ChassisVelocity) {
        let max = self.config.max_angular_velocity_radps;
        self.command = Command::Velocity(ChassisVelocity {
            omega: velocity.omega.clamp(-max, max),
            ..velocity
        });
    }

    /// Follow a goal pose with an explicit speed and heading
    ///
    /// A different goal clears the follower, so `finished_movement` stays false until a cycle
    /// has run against it. Re-sending the pending goal keeps the follower state.
    pub fn follow(&mut self, goal: TrajectoryGoal) {
        let next = Command::Goal(goal);
        if self.command != next {
            self.follower.reset();
            info!("Following goal {:?}", goal.pose);
        }
        self.command = next;
    }

    /// Follow a goal pose at the default speed, holding the pose's own heading
    pub fn follow_pose(&mut self, pose: Pose) {
        self.follow(TrajectoryGoal::new(
            pose,
            self.config.default_linear_velocity_mps,
            pose.heading,
        ));
    }

    /// Lock the modules into an X until `clear_defense` is called
    pub fn defense(&mut self) {
        if !self.defense {
            info!("Defense stance engaged");
        }
        self.defense = true;
    }

    pub fn clear_defense(&mut self) {
        if self.defense {
            info!("Defense stance cleared");
        }
        self.defense = false;
    }

    pub fn is_defense(&self) -> bool {
        self.defense
    }

    pub fn command(&self) -> Command {
        self.command
    }

    /// Zero the heading sensor so the current orientation reads as forward
    pub fn zero_heading(&mut self) {
        info!("Zeroing heading sensor");
        self.gyro.zero();
    }

    /// Reset the pose estimate; call after `zero_heading` if both are needed
    pub fn reset_position(&mut self, pose: Pose) {
        let raw_heading = self.gyro.heading();
        info!("Resetting pose to {:?}", pose);
        self.odometry.reset_position(pose, raw_heading);
    }

    /// Reset the pose estimate to the configured starting pose
    pub fn reset_odometry(&mut self) {
        self.reset_position(self.config.starting_pose);
    }

    pub fn pose(&self) -> Pose {
        self.odometry.pose()
    }

    /// Whether the follower was within tolerance on its last calculation
    pub fn at_reference(&self) -> bool {
        self.follower.at_reference()
    }

    pub fn finished_movement(&self) -> bool {
        self.at_reference()
    }

    pub fn follower_mut(&mut self) -> &mut HolonomicFollower {
        &mut self.follower
    }

    pub fn heading_sensor_mut(&mut self) -> &mut G {
        &mut self.gyro
    }

    pub fn modules(&self) -> &[M; MODULE_COUNT] {
        &self.modules
    }

    pub fn config(&self) -> &DrivetrainConfig {
        &self.config
    }

    /// Run one control cycle
    pub fn step(&mut self) -> CycleOutput {
        let raw_heading = self.gyro.heading();
        if !raw_heading.is_finite() {
            warn!("Heading sensor returned {}", raw_heading);
        }

        let (mode, chassis, states) = if self.defense {
            (DriveMode::Defense, ChassisVelocity::zero(), DEFENSE_STATES)
        } else {
            let (mode, chassis) = match self.command {
                Command::Velocity(velocity) => (DriveMode::Velocity, velocity),
                Command::Goal(goal) => {
                    let chassis = self.follower.calculate(
                        self.odometry.pose(),
                        goal.pose,
                        goal.linear_speed,
                        goal.heading,
                    );
                    (DriveMode::Goal, chassis)
                }
            };
            (mode, chassis, self.wheel_targets(chassis))
        };

        for (i, (module, state)) in self.modules.iter_mut().zip(states).enumerate() {
            let output = mounted(state, self.config.drive_inverted[i]);
            trace!(
                "{}: speed={:.3} angle={:.3}",
                MODULE_NAMES[i],
                output.speed,
                output.angle
            );
            module.set(output);
        }
        self.last_states = states;

        let feedback = self.measured_states().unwrap_or(states);
        let pose = self.odometry.update(raw_heading, &feedback);

        debug!(
            "Cycle {:?}: pose=({:.3}, {:.3}, {:.1} deg) raw heading={:.1} deg",
            mode,
            pose.x,
            pose.y,
            pose.heading.to_degrees(),
            raw_heading.to_degrees()
        );

        CycleOutput {
            mode,
            chassis,
            states,
            pose,
            raw_heading,
            at_reference: self.follower.at_reference(),
        }
    }

    fn wheel_targets(&self, chassis: ChassisVelocity) -> [WheelState; MODULE_COUNT] {
        // Hold the previous steering angles instead of snapping back to zero
        if chassis.is_zero() {
            return self.last_states.map(|state| WheelState::new(0.0, state.angle));
        }
        desaturate(
            self.kinematics.to_wheel_states(chassis),
            self.config.max_velocity_mps,
        )
    }

    /// Measured states in the chassis frame, if every module reports one
    fn measured_states(&mut self) -> Option<[WheelState; MODULE_COUNT]> {
        let mut states = [WheelState::default(); MODULE_COUNT];
        for (i, module) in self.modules.iter_mut().enumerate() {
            states[i] = mounted(module.measured_state()?, self.config.drive_inverted[i]);
        }
        Some(states)
    }
}

/// Apply a module's drive inversion (its own inverse)
fn mounted(state: WheelState, inverted: bool) -> WheelState {
    if inverted {
        WheelState::new(-state.speed, state.angle)
    } else {
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drive::hardware::{SimulatedGyro, SimulatedModule};
    use crate::drive::HeadingConvention;
    use crate::drive::kinematics::{BACK_LEFT, BACK_RIGHT, FRONT_LEFT, FRONT_RIGHT};

    fn drivetrain(config: DrivetrainConfig) -> Drivetrain<SimulatedGyro, SimulatedModule> {
        let modules = std::array::from_fn(|_| SimulatedModule::new());
        Drivetrain::new(config, SimulatedGyro::default(), modules).unwrap()
    }

    fn commanded(drivetrain: &Drivetrain<SimulatedGyro, SimulatedModule>) -> [WheelState; MODULE_COUNT] {
        drivetrain
            .modules()
            .each_ref()
            .map(|module| module.last_command().unwrap())
    }

    #[test]
    fn test_velocity_command_reaches_modules_with_inversion() {
        let mut drivetrain = drivetrain(DrivetrainConfig::default());
        drivetrain.drive(ChassisVelocity::new(1.0, 0.0, 0.0));
        let output = drivetrain.step();

        assert_eq!(output.mode, DriveMode::Velocity);
        let sent = commanded(&drivetrain);
        assert!((sent[FRONT_LEFT].speed - 1.0).abs() < 1e-9);
        assert!((sent[FRONT_RIGHT].speed - 1.0).abs() < 1e-9);
        assert!((sent[BACK_LEFT].speed - -1.0).abs() < 1e-9);
        assert!((sent[BACK_RIGHT].speed - 1.0).abs() < 1e-9);
        // Reported targets are before inversion
        assert!((output.states[BACK_LEFT].speed - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_targets_are_desaturated() {
        let config = DrivetrainConfig::default();
        let max = config.max_velocity_mps;
        let mut drivetrain = drivetrain(config);
        drivetrain.drive(ChassisVelocity::new(3.0 * max, 0.0, 0.0));
        let output = drivetrain.step();
        for state in output.states {
            assert!((state.speed - max).abs() < 1e-9);
        }
    }

    #[test]
    fn test_odometry_advances_each_cycle() {
        let config = DrivetrainConfig {
            heading_convention: HeadingConvention::Direct,
            ..DrivetrainConfig::default()
        };
        let mut drivetrain = drivetrain(config);
        drivetrain.drive(ChassisVelocity::new(1.0, 0.0, 0.0));
        for _ in 0..50 {
            drivetrain.step();
        }
        let pose = drivetrain.pose();
        assert!((pose.x - 1.0).abs() < 1e-9);
        assert!(pose.y.abs() < 1e-9);
    }

    #[test]
    fn test_defense_overrides_pending_command() {
        let mut drivetrain = drivetrain(DrivetrainConfig::default());
        drivetrain.drive(ChassisVelocity::new(1.0, 0.5, 0.2));
        drivetrain.defense();
        assert!(drivetrain.is_defense());
        let output = drivetrain.step();

        assert_eq!(output.mode, DriveMode::Defense);
        assert_eq!(output.states, DEFENSE_STATES);
        let sent = commanded(&drivetrain);
        assert_eq!(sent[FRONT_LEFT].angle, FRAC_PI_4);
        assert_eq!(sent[FRONT_RIGHT].angle, -FRAC_PI_4);
        assert_eq!(sent[BACK_LEFT].angle, -FRAC_PI_4);
        assert_eq!(sent[BACK_RIGHT].angle, FRAC_PI_4);
        for state in sent {
            assert_eq!(state.speed, 0.0);
        }

        // New commands do not escape defense until it is cleared
        drivetrain.follow_pose(Pose::new(1.0, 1.0, 0.0));
        assert_eq!(drivetrain.step().mode, DriveMode::Defense);
        drivetrain.clear_defense();
        assert!(!drivetrain.is_defense());
        assert_eq!(drivetrain.step().mode, DriveMode::Goal);
    }

    #[test]
    fn test_latest_command_wins() {
        let mut drivetrain = drivetrain(DrivetrainConfig::default());
        drivetrain.follow_pose(Pose::new(2.0, 0.0, 0.0));
        drivetrain.drive(ChassisVelocity::new(0.5, 0.0, 0.0));
        assert_eq!(drivetrain.command(), Command::Velocity(ChassisVelocity::new(0.5, 0.0, 0.0)));
        let output = drivetrain.step();
        assert_eq!(output.mode, DriveMode::Velocity);
        assert_eq!(output.chassis, ChassisVelocity::new(0.5, 0.0, 0.0));
    }

    #[test]
    fn test_zero_velocity_holds_steering_angle() {
        let mut drivetrain = drivetrain(DrivetrainConfig::default());
        drivetrain.drive(ChassisVelocity::new(0.0, 1.0, 0.0));
        drivetrain.step();
        drivetrain.drive(ChassisVelocity::zero());
        let output = drivetrain.step();
        for state in output.states {
            assert_eq!(state.speed, 0.0);
            assert!((state.angle - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        }
    }

    #[test]
    fn test_goal_at_current_pose_is_at_reference() {
        let mut drivetrain = drivetrain(DrivetrainConfig::default());
        drivetrain.follow(TrajectoryGoal::new(Pose::default(), 0.0, 0.0));
        let output = drivetrain.step();
        assert!(output.chassis.is_zero());
        assert!(output.at_reference);
        assert!(drivetrain.finished_movement());
    }

    #[test]
    fn test_follow_pose_at_current_pose_holds_still() {
        let mut drivetrain = drivetrain(DrivetrainConfig::default());
        assert!(drivetrain.config().default_linear_velocity_mps > 0.0);
        drivetrain.follow_pose(Pose::default());
        let output = drivetrain.step();
        assert!(output.chassis.is_zero());
        assert!(output.at_reference);
        assert_eq!(output.pose, Pose::default());
    }

    #[test]
    fn test_new_goal_is_not_finished_until_stepped() {
        let mut drivetrain = drivetrain(DrivetrainConfig::default());
        assert!(!drivetrain.finished_movement());

        let reached = TrajectoryGoal::new(Pose::default(), 0.0, 0.0);
        drivetrain.follow(reached);
        assert!(!drivetrain.finished_movement());
        drivetrain.step();
        assert!(drivetrain.finished_movement());

        // Re-sending the same goal keeps its state
        drivetrain.follow(reached);
        assert!(drivetrain.finished_movement());

        // A goal replacing a reached goal starts unfinished
        drivetrain.follow(TrajectoryGoal::new(Pose::new(1.0, 0.0, 0.0), 0.0, 0.0));
        assert!(!drivetrain.finished_movement());
        assert!(!drivetrain.step().at_reference);
    }

    #[test]
    fn test_goal_following_converges() {
        let mut drivetrain = drivetrain(DrivetrainConfig {
            heading_convention: HeadingConvention::Direct,
            ..DrivetrainConfig::default()
        });
        drivetrain.follow(TrajectoryGoal::new(Pose::new(1.0, 0.5, 0.0), 0.0, 0.0));

        let mut finished = false;
        for _ in 0..500 {
            if drivetrain.step().at_reference {
                finished = true;
                break;
            }
        }
        assert!(finished);
        let pose = drivetrain.pose();
        assert!((pose.x - 1.0).abs() <= 0.05);
        assert!((pose.y - 0.5).abs() <= 0.05);
    }

    #[test]
    fn test_disabled_follower_uses_feed_forward() {
        let mut drivetrain = drivetrain(DrivetrainConfig::default());
        drivetrain.follower_mut().set_enabled(false);
        assert!(!drivetrain.follower_mut().is_enabled());

        drivetrain.follow(TrajectoryGoal::new(Pose::new(5.0, 0.0, 0.0), 0.5, 0.0));
        let output = drivetrain.step();
        assert!((output.chassis.vx - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_reset_odometry_returns_to_starting_pose() {
        let start = Pose::new(1.0, 2.0, 0.5);
        let mut drivetrain = drivetrain(DrivetrainConfig {
            starting_pose: start,
            ..DrivetrainConfig::default()
        });
        drivetrain.drive(ChassisVelocity::new(1.0, 0.0, 0.0));
        drivetrain.step();
        assert_ne!(drivetrain.pose(), start);

        drivetrain.heading_sensor_mut().rotate(0.3);
        drivetrain.zero_heading();
        drivetrain.reset_odometry();
        assert_eq!(drivetrain.pose(), start);

        drivetrain.drive(ChassisVelocity::zero());
        let pose = drivetrain.step().pose;
        assert!((pose.x - start.x).abs() < 1e-12);
        assert!((pose.heading - start.heading).abs() < 1e-12);
    }

    #[test]
    fn test_measured_states_drive_odometry() {
        let modules = std::array::from_fn(|_| SimulatedModule::with_feedback());
        let config = DrivetrainConfig {
            heading_convention: HeadingConvention::Direct,
            ..DrivetrainConfig::default()
        };
        let mut drivetrain = Drivetrain::new(config, SimulatedGyro::default(), modules).unwrap();
        drivetrain.drive(ChassisVelocity::new(0.0, 1.0, 0.0));
        for _ in 0..10 {
            drivetrain.step();
        }
        // Inverted back-left module is un-inverted before integration
        let pose = drivetrain.pose();
        assert!(pose.x.abs() < 1e-9);
        assert!((pose.y - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_angular_velocity_is_clamped() {
        let config = DrivetrainConfig::default();
        let max = config.max_angular_velocity_radps;
        let mut drivetrain = drivetrain(config);
        drivetrain.drive(ChassisVelocity::new(0.0, 0.0, -10.0 * max));
        assert_eq!(drivetrain.step().chassis.omega, -max);
    }

    #[test]
    fn test_nan_heading_does_not_stall() {
        let mut drivetrain = drivetrain(DrivetrainConfig::default());
        drivetrain.heading_sensor_mut().rotate(f64::NAN);
        let output = drivetrain.step();
        assert!(output.pose.heading.is_nan());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = DrivetrainConfig {
            trackwidth_m: 0.0,
            ..DrivetrainConfig::default()
        };
        let modules = std::array::from_fn(|_| SimulatedModule::new());
        let result = Drivetrain::new(config, SimulatedGyro::default(), modules);
        assert!(matches!(result, Err(DrivetrainError::Config(_))));
    }
}
