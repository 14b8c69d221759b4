//! Error types for the swerve pose core

use crate::common::ModuleId;
use thiserror::Error;

/// Odometry input that cannot be integrated.
///
/// This is the only failure the estimator propagates: integrating garbage
/// would corrupt the pose irrecoverably.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OdometryError {
    #[error("module {module} reported a non-finite {quantity}: {value}")]
    NonFinite {
        module: ModuleId,
        quantity: &'static str,
        value: f64,
    },

    #[error("gyro reported a non-finite yaw: {value}")]
    NonFiniteGyro { value: f64 },

    #[error("odometry sample has a non-finite timestamp: {value}")]
    NonFiniteTimestamp { value: f64 },
}

/// Configuration loading or validation failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors surfaced to the host harness.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{component} cannot {transition} from state {state}")]
    Transition {
        component: String,
        transition: &'static str,
        state: String,
    },

    #[error("{0} is not active")]
    Inactive(String),

    #[error(transparent)]
    Odometry(#[from] OdometryError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
