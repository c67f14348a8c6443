// Motion-control core for a four-module swerve base
//
// Provides:
// - Swerve inverse/forward kinematics with uniform wheel-speed desaturation
// - Odometry from module states and a heading sensor
// - Holonomic pose follower (x, y and heading PID)
// - The drivetrain coordinator running one control cycle per step

mod drivetrain;
pub mod follower;
pub mod hardware;
pub mod kinematics;
pub mod odometry;
pub mod pid;

pub use drivetrain::{
    Command, CycleOutput, DEFENSE_STATES, DriveMode, Drivetrain, DrivetrainError,
};
pub use follower::HolonomicFollower;
pub use hardware::{HeadingSensor, ModuleActuator, SimulatedGyro, SimulatedModule};
pub use kinematics::{KinematicsError, SwerveKinematics, desaturate};
pub use odometry::{HeadingConvention, SwerveOdometry};
