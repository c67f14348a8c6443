// Keyboard teleop: WASD move, Z/X rotate, R/F speed, SPACE defense, O return to origin,
// H zero heading and reset pose, Q quit
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::time::{Duration, Instant};
use swerve_zenoh_runtime::config::TOPIC_CMD_DRIVE;
use swerve_zenoh_runtime::geometry::{ChassisVelocity, Pose};
use swerve_zenoh_runtime::messages::DriveCommand;
use tracing::info;

const SPEEDS: [f64; 3] = [0.5, 1.5, 3.0]; // m/s
const THETA_SPEEDS: [f64; 3] = [1.0, 3.0, 6.0]; // rad/s
const INPUT_TIMEOUT_MS: u64 = 100; // Reset velocities after this much time with no input

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher(TOPIC_CMD_DRIVE).await?;

    info!("Controls: WASD=move, Z/X=rotate, R/F=speed, SPACE=defense, O=origin, H=reset, Q=quit");
    info!("Speed: LOW");

    enable_raw_mode()?;
    let result = run_teleop(&publisher).await;
    disable_raw_mode()?;

    result
}

async fn send(
    publisher: &zenoh::pubsub::Publisher<'_>,
    cmd: &DriveCommand,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    publisher.put(serde_json::to_string(cmd)?).await?;
    Ok(())
}

async fn run_teleop(
    publisher: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut speed_idx: usize = 0;
    let mut defense = false;
    // While a goal is active, stop streaming velocity so it is not overridden
    let mut goal_active = false;

    // Persistent velocity state
    let mut velocity = ChassisVelocity::zero();
    let mut last_movement_input = Instant::now();

    loop {
        // Poll for key with 20ms timeout (50Hz effective rate)
        if event::poll(Duration::from_millis(20))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;
                let mut moved = true;

                match code {
                    KeyCode::Char('w') if pressed => velocity.vx = SPEEDS[speed_idx],
                    KeyCode::Char('s') if pressed => velocity.vx = -SPEEDS[speed_idx],
                    KeyCode::Char('a') if pressed => velocity.vy = SPEEDS[speed_idx],
                    KeyCode::Char('d') if pressed => velocity.vy = -SPEEDS[speed_idx],

                    // Rotation
                    KeyCode::Char('z') if pressed => velocity.omega = THETA_SPEEDS[speed_idx],
                    KeyCode::Char('x') if pressed => velocity.omega = -THETA_SPEEDS[speed_idx],

                    _ => moved = false,
                }

                if moved {
                    last_movement_input = Instant::now();
                    goal_active = false;
                }

                match code {
                    // Speed control
                    KeyCode::Char('r') if pressed => {
                        speed_idx = (speed_idx + 1).min(2);
                        print_speed(speed_idx);
                    }
                    KeyCode::Char('f') if pressed => {
                        speed_idx = speed_idx.saturating_sub(1);
                        print_speed(speed_idx);
                    }

                    KeyCode::Char(' ') if pressed => {
                        defense = !defense;
                        let cmd = if defense {
                            DriveCommand::Defense
                        } else {
                            DriveCommand::ClearDefense
                        };
                        info!("Defense: {}", defense);
                        send(publisher, &cmd).await?;
                    }
                    KeyCode::Char('o') if pressed => {
                        info!("Returning to origin");
                        goal_active = true;
                        send(publisher, &DriveCommand::goal(Pose::default())).await?;
                    }
                    KeyCode::Char('h') if pressed => {
                        info!("Zeroing heading and resetting pose");
                        send(publisher, &DriveCommand::ZeroHeading).await?;
                        send(publisher, &DriveCommand::ResetPose { x: 0.0, y: 0.0, heading: 0.0 }).await?;
                    }

                    // Quit
                    KeyCode::Char('q') | KeyCode::Esc if pressed => break,

                    _ => {}
                }
            }
        }

        // Reset velocities if no movement input for INPUT_TIMEOUT_MS
        if last_movement_input.elapsed() > Duration::from_millis(INPUT_TIMEOUT_MS) {
            velocity = ChassisVelocity::zero();
        }

        // Publish at ~50Hz unless a goal is being followed
        if !goal_active {
            send(publisher, &DriveCommand::velocity(velocity)).await?;
        }
    }

    Ok(())
}

fn print_speed(idx: usize) {
    let label = ["LOW", "MED", "HIGH"][idx];
    info!("Speed: {}", label);
}
