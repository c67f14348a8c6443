//! Swerve drive runtime: kinematics, odometry and pose following for a four-module base,
//! driven at a fixed rate and bridged to Zenoh.

pub mod config;
pub mod drive;
pub mod geometry;
pub mod messages;
pub mod runtime;
