// Timeouts, topics, drivetrain configuration
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::drive::HeadingConvention;
use crate::drive::kinematics::{BACK_LEFT, MODULE_COUNT};
use crate::drive::pid::PidGains;
use crate::geometry::Pose;

// Control loop frequency
pub const LOOP_HZ: u64 = 50;

// Velocity commands older than this are replaced with a stop
pub const CMD_TIMEOUT: Duration = Duration::from_millis(250);

// Zenoh topics
pub const TOPIC_CMD_DRIVE: &str = "swerve/cmd/drive"; // commands
pub const TOPIC_STATE_POSE: &str = "swerve/state/pose"; // telemetry
pub const TOPIC_HEALTH: &str = "swerve/state/health"; // health status

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// PID gains for the three axes of the holonomic follower
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FollowerConfig {
    pub x: PidGains,
    pub y: PidGains,
    pub theta: PidGains,
}

impl Default for FollowerConfig {
    fn default() -> Self {
        Self {
            x: PidGains::new(1.0, 0.0, 0.0, 0.05),
            y: PidGains::new(1.0, 0.0, 0.0, 0.05),
            theta: PidGains::new(2.0, 0.0, 0.0, 0.05),
        }
    }
}

/// Platform geometry and tuning, fixed for the lifetime of a drivetrain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrivetrainConfig {
    /// Left-right distance between module centers
    pub trackwidth_m: f64,
    /// Front-back distance between module centers
    pub wheelbase_m: f64,
    pub max_velocity_mps: f64,
    pub max_angular_velocity_radps: f64,
    pub period_ms: u64,
    /// Drive direction inversion per module (front-left, front-right, back-left, back-right)
    pub drive_inverted: [bool; MODULE_COUNT],
    pub heading_convention: HeadingConvention,
    pub starting_pose: Pose,
    /// Speed used when a goal pose is given without one
    pub default_linear_velocity_mps: f64,
    pub follower: FollowerConfig,
}

impl Default for DrivetrainConfig {
    fn default() -> Self {
        let trackwidth_m = 0.5588;
        let wheelbase_m = 0.5588;
        let max_velocity_mps = 4.14;

        let mut drive_inverted = [false; MODULE_COUNT];
        drive_inverted[BACK_LEFT] = true;

        Self {
            trackwidth_m,
            wheelbase_m,
            max_velocity_mps,
            // Theoretical: full wheel speed on a circle through the module centers
            max_angular_velocity_radps: max_velocity_mps
                / (trackwidth_m / 2.0).hypot(wheelbase_m / 2.0),
            period_ms: 1000 / LOOP_HZ,
            drive_inverted,
            heading_convention: HeadingConvention::Inverted,
            starting_pose: Pose::default(),
            default_linear_velocity_mps: 1.0,
            follower: FollowerConfig::default(),
        }
    }
}

impl DrivetrainConfig {
    /// Load a JSON config file; missing fields take their defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("trackwidth_m", self.trackwidth_m)?;
        positive("wheelbase_m", self.wheelbase_m)?;
        positive("max_velocity_mps", self.max_velocity_mps)?;
        positive("max_angular_velocity_radps", self.max_angular_velocity_radps)?;

        if self.period_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "period_ms",
                reason: "must be at least 1".to_string(),
            });
        }

        if !(self.default_linear_velocity_mps.is_finite() && self.default_linear_velocity_mps >= 0.0)
        {
            return Err(ConfigError::Invalid {
                field: "default_linear_velocity_mps",
                reason: format!("{} is not a finite non-negative speed", self.default_linear_velocity_mps),
            });
        }

        let pose = self.starting_pose;
        if !(pose.x.is_finite() && pose.y.is_finite() && pose.heading.is_finite()) {
            return Err(ConfigError::Invalid {
                field: "starting_pose",
                reason: format!("{:?} is not finite", pose),
            });
        }

        for (field, gains) in [
            ("follower.x", &self.follower.x),
            ("follower.y", &self.follower.y),
            ("follower.theta", &self.follower.theta),
        ] {
            let values = [gains.kp, gains.ki, gains.kd, gains.tolerance, gains.integrator_limit];
            if values.iter().any(|v| !v.is_finite()) || gains.tolerance < 0.0 || gains.integrator_limit < 0.0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("{:?} must be finite with non-negative limits", gains),
                });
            }
        }

        Ok(())
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("{} is not a finite positive number", value),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = DrivetrainConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.period(), Duration::from_millis(20));
        assert_eq!(config.drive_inverted, [false, false, true, false]);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = DrivetrainConfig::from_json(
            r#"{ "max_velocity_mps": 3.0, "follower": { "theta": { "kp": 4.0 } } }"#,
        )
        .unwrap();
        assert_eq!(config.max_velocity_mps, 3.0);
        assert_eq!(config.follower.theta.kp, 4.0);
        assert_eq!(config.follower.x, FollowerConfig::default().x);
        assert_eq!(config.heading_convention, HeadingConvention::Inverted);
    }

    #[test]
    fn test_heading_convention_parses() {
        let config = DrivetrainConfig::from_json(r#"{ "heading_convention": "direct" }"#).unwrap();
        assert_eq!(config.heading_convention, HeadingConvention::Direct);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = DrivetrainConfig::from_json(r#"{ "trackwidth_m": -1.0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "trackwidth_m", .. }));

        let err = DrivetrainConfig::from_json(r#"{ "period_ms": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "period_ms", .. }));

        let err = DrivetrainConfig::from_json(r#"{ "follower": { "x": { "tolerance": -0.1 } } }"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "follower.x", .. }));
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let err = DrivetrainConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = DrivetrainConfig::load("/nonexistent/drivetrain.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
