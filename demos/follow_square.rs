// Offline simulation: follow the corners of a 1m square, turning to face each side
//
// Usage: cargo run --example follow_square
// RUST_LOG=debug shows every control cycle.

use std::f64::consts::FRAC_PI_2;

use swerve_zenoh_runtime::config::DrivetrainConfig;
use swerve_zenoh_runtime::drive::{Drivetrain, HeadingConvention, SimulatedGyro, SimulatedModule};
use swerve_zenoh_runtime::geometry::{Pose, TrajectoryGoal};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// Give up on a corner after this many cycles (10 s at 50 Hz)
const MAX_CYCLES_PER_GOAL: usize = 500;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = DrivetrainConfig::default();
    let dt = config.period().as_secs_f64();
    let convention: HeadingConvention = config.heading_convention;

    let modules = std::array::from_fn(|_| SimulatedModule::new());
    let mut drivetrain = Drivetrain::new(config, SimulatedGyro::default(), modules)?;

    let corners = [
        Pose::new(1.0, 0.0, 0.0),
        Pose::new(1.0, 1.0, FRAC_PI_2),
        Pose::new(0.0, 1.0, 2.0 * FRAC_PI_2),
        Pose::new(0.0, 0.0, 3.0 * FRAC_PI_2),
    ];

    for corner in corners {
        // Cruise toward the corner; feed-forward drops out inside the tolerance band
        drivetrain.follow(TrajectoryGoal::new(corner, 0.5, corner.heading));

        let mut cycles = 0;
        loop {
            let output = drivetrain.step();
            drivetrain
                .heading_sensor_mut()
                .rotate(convention.apply(output.chassis.omega * dt));
            cycles += 1;

            if output.at_reference {
                let pose = output.pose;
                info!(
                    "Reached ({:.2}, {:.2}) in {} cycles: pose=({:.3}, {:.3}, {:.1} deg)",
                    corner.x,
                    corner.y,
                    cycles,
                    pose.x,
                    pose.y,
                    pose.heading.to_degrees()
                );
                break;
            }
            if cycles >= MAX_CYCLES_PER_GOAL {
                warn!("Gave up on ({:.2}, {:.2}) at pose {:?}", corner.x, corner.y, output.pose);
                break;
            }
        }
    }

    drivetrain.defense();
    let output = drivetrain.step();
    info!("Parked in defense stance: {:?}", output.states);
    Ok(())
}
