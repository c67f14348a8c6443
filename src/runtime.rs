// Fixed-rate loop around the drivetrain, with a watchdog on velocity commands
// Note: the watchdog only covers streamed velocity commands (teleop). Goals, defense and resets
// persist until replaced, so they are not expected to be re-sent every cycle.

use std::time::{Duration, Instant};
use tokio::time::interval;
use tracing::{info, warn};

// local imports
use crate::config::{CMD_TIMEOUT, DrivetrainConfig, TOPIC_CMD_DRIVE, TOPIC_HEALTH, TOPIC_STATE_POSE};
use crate::drive::{
    CycleOutput, Drivetrain, HeadingSensor, ModuleActuator, SimulatedGyro, SimulatedModule,
};
use crate::geometry::{ChassisVelocity, Pose, TrajectoryGoal};
use crate::messages::{DriveCommand, RuntimeHealth, Telemetry};

pub struct Runtime<G, M> {
    drivetrain: Drivetrain<G, M>,
    velocity_received_at: Option<Instant>,
    health: RuntimeHealth,
}

impl<G: HeadingSensor, M: ModuleActuator> Runtime<G, M> {
    pub fn new(drivetrain: Drivetrain<G, M>) -> Self {
        Self {
            drivetrain,
            velocity_received_at: None,
            health: RuntimeHealth::CmdStale, // Start stale until first cmd
        }
    }

    pub fn health(&self) -> RuntimeHealth {
        self.health
    }

    pub fn drivetrain(&self) -> &Drivetrain<G, M> {
        &self.drivetrain
    }

    pub fn drivetrain_mut(&mut self) -> &mut Drivetrain<G, M> {
        &mut self.drivetrain
    }

    /// Process incoming command
    pub fn on_command(&mut self, cmd: DriveCommand, now: Instant) {
        match cmd {
            DriveCommand::Velocity { vx, vy, omega } => {
                self.drivetrain.drive(ChassisVelocity::new(vx, vy, omega));
                self.velocity_received_at = Some(now);
            }
            DriveCommand::Goal {
                x,
                y,
                heading,
                linear_speed,
                target_heading,
            } => {
                info!("Received goal: ({:.3}, {:.3}, {:.3})", x, y, heading);
                let pose = Pose::new(x, y, heading);
                let speed = linear_speed
                    .unwrap_or(self.drivetrain.config().default_linear_velocity_mps);
                self.drivetrain
                    .follow(TrajectoryGoal::new(pose, speed, target_heading.unwrap_or(heading)));
                self.velocity_received_at = None;
            }
            DriveCommand::Defense => self.drivetrain.defense(),
            DriveCommand::ClearDefense => self.drivetrain.clear_defense(),
            DriveCommand::ZeroHeading => self.drivetrain.zero_heading(),
            DriveCommand::ResetPose { x, y, heading } => {
                self.drivetrain.reset_position(Pose::new(x, y, heading));
            }
        }
        self.health = RuntimeHealth::Ok;
    }

    /// Stop the base if the latest velocity command has gone stale
    fn check_watchdog(&mut self, now: Instant) {
        let Some(received_at) = self.velocity_received_at else {
            return;
        };

        let cmd_age = now.saturating_duration_since(received_at);
        if cmd_age > CMD_TIMEOUT {
            // Watchdog triggered - stop the robot
            warn!("Command stale ({:?} old), stopping robot", cmd_age);
            self.drivetrain.drive(ChassisVelocity::zero());
            self.velocity_received_at = None;
            self.health = RuntimeHealth::CmdStale;
        }
    }

    /// Run one cycle: watchdog, then the drivetrain step
    pub fn tick(&mut self, now: Instant) -> CycleOutput {
        self.check_watchdog(now);
        self.drivetrain.step()
    }
}

pub async fn run(config: DrivetrainConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let period = config.period();
    let convention = config.heading_convention;

    // Hardware drivers are not part of this runtime; the base is simulated
    let modules = std::array::from_fn(|_| SimulatedModule::new());
    let drivetrain = Drivetrain::new(config, SimulatedGyro::default(), modules)?;
    let mut runtime = Runtime::new(drivetrain);

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let subscriber = session.declare_subscriber(TOPIC_CMD_DRIVE).await?;
    let pub_pose = session.declare_publisher(TOPIC_STATE_POSE).await?;
    let pub_health = session.declare_publisher(TOPIC_HEALTH).await?;

    let mut tick = interval(period);

    info!(
        "Runtime started: {}ms period, {}ms watchdog timeout",
        period.as_millis(),
        CMD_TIMEOUT.as_millis()
    );
    info!("Subscribed to: {}", TOPIC_CMD_DRIVE);
    info!("Publishing to: {}, {}", TOPIC_STATE_POSE, TOPIC_HEALTH);

    loop {
        tick.tick().await;

        // 1. Drain all pending commands (non-blocking), latest wins
        while let Ok(Some(sample)) = subscriber.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<DriveCommand>(&payload) {
                Ok(cmd) => {
                    runtime.on_command(cmd, Instant::now());
                }
                Err(e) => {
                    warn!("Failed to parse command: {}", e);
                }
            }
        }

        // 2. Run the control cycle (includes watchdog logic)
        let output = runtime.tick(Instant::now());

        // 3. Simulated gyro follows the commanded rotation
        simulate_heading(runtime.drivetrain_mut().heading_sensor_mut(), &output, period, convention);

        // 4. Publish telemetry
        let telemetry_json = serde_json::to_string(&Telemetry::from(&output))?;
        pub_pose.put(telemetry_json).await?;

        // 5. Publish health
        let health_json = serde_json::to_string(&runtime.health())?;
        pub_health.put(health_json).await?;
    }
}

/// Advance the simulated gyro by one period of the commanded rotation, in its raw convention
fn simulate_heading(
    gyro: &mut SimulatedGyro,
    output: &CycleOutput,
    period: Duration,
    convention: crate::drive::HeadingConvention,
) {
    // The convention is its own inverse, so it maps a pose rotation back to a raw one
    gyro.rotate(convention.apply(output.chassis.omega * period.as_secs_f64()));
}
