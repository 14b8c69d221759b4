//! Odometry integrator
//!
//! Dead-reckons the body pose from cumulative module travel and the gyro.
//! Translation comes from the least-squares module twist, followed as an arc;
//! heading comes from the gyro plus an offset fixed at the last reset. Nothing
//! here corrects drift, that is the pose estimator's job.

use crate::common::{ModuleMap, Pose2D, Rotation2d};
use crate::control::kinematics::{ModulePosition, SwerveKinematics};
use crate::error::OdometryError;

/// Drive sensor readings taken at one control-loop tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OdometrySample {
    /// Monotonic time of the reading, seconds
    pub timestamp: f64,
    /// Raw gyro yaw, counter-clockwise positive
    pub gyro_yaw: Rotation2d,
    pub modules: ModuleMap<ModulePosition>,
}

impl OdometrySample {
    pub fn new(timestamp: f64, gyro_yaw: Rotation2d, modules: ModuleMap<ModulePosition>) -> Self {
        OdometrySample {
            timestamp,
            gyro_yaw,
            modules,
        }
    }

    /// Reject readings that would poison the integral.
    pub fn validate(&self) -> Result<(), OdometryError> {
        if !self.timestamp.is_finite() {
            return Err(OdometryError::NonFiniteTimestamp {
                value: self.timestamp,
            });
        }
        if !self.gyro_yaw.radians().is_finite() {
            return Err(OdometryError::NonFiniteGyro {
                value: self.gyro_yaw.radians(),
            });
        }
        for (module, position) in self.modules.iter() {
            if !position.distance.is_finite() {
                return Err(OdometryError::NonFinite {
                    module,
                    quantity: "distance",
                    value: position.distance,
                });
            }
            if !position.angle.radians().is_finite() {
                return Err(OdometryError::NonFinite {
                    module,
                    quantity: "steer angle",
                    value: position.angle.radians(),
                });
            }
        }
        Ok(())
    }
}

/// Continuously tracks the body pose from wheel and gyro readings
#[derive(Debug, Clone)]
pub struct OdometryIntegrator {
    kinematics: SwerveKinematics,
    pose: Pose2D,
    gyro_offset: Rotation2d,
    previous_gyro: Rotation2d,
    previous_modules: ModuleMap<ModulePosition>,
}

impl OdometryIntegrator {
    /// Start tracking at `initial_pose` from the given baseline readings.
    pub fn new(
        kinematics: SwerveKinematics,
        initial_pose: Pose2D,
        baseline: &OdometrySample,
    ) -> Result<Self, OdometryError> {
        baseline.validate()?;
        Ok(OdometryIntegrator {
            kinematics,
            pose: initial_pose,
            gyro_offset: initial_pose.rotation.minus(baseline.gyro_yaw),
            previous_gyro: baseline.gyro_yaw,
            previous_modules: baseline.modules,
        })
    }

    /// Integrate the motion since the previous call and return the new pose.
    ///
    /// Invalid input leaves the integrator untouched.
    pub fn update(&mut self, sample: &OdometrySample) -> Result<Pose2D, OdometryError> {
        sample.validate()?;

        let angle = sample.gyro_yaw.rotate_by(self.gyro_offset);
        let previous_angle = self.previous_gyro.rotate_by(self.gyro_offset);

        let deltas = sample
            .modules
            .map(|id, position| position.delta_since(&self.previous_modules[id]));
        let mut twist = self.kinematics.to_twist(&deltas);
        twist.dtheta = angle.minus(previous_angle).radians();

        let moved = self.pose.exp(&twist);
        self.pose = Pose2D::new(moved.x, moved.y, angle);
        self.previous_gyro = sample.gyro_yaw;
        self.previous_modules = sample.modules;
        Ok(self.pose)
    }

    /// Discard the accumulated pose and restart from `pose` at the given readings.
    pub fn reset(&mut self, pose: Pose2D, sample: &OdometrySample) -> Result<(), OdometryError> {
        sample.validate()?;
        self.gyro_offset = pose.rotation.minus(sample.gyro_yaw);
        self.previous_gyro = sample.gyro_yaw;
        self.previous_modules = sample.modules;
        self.pose = pose;
        Ok(())
    }

    /// Move the pose without touching the module baseline.
    ///
    /// Used to apply a vision correction between two updates.
    pub(crate) fn rebase(&mut self, pose: Pose2D) {
        self.gyro_offset = pose.rotation.minus(self.previous_gyro);
        self.pose = pose;
    }

    pub fn pose(&self) -> Pose2D {
        self.pose
    }
}
