//! Localization module
//!
//! Fuses gyro-anchored swerve odometry with fiducial vision fixes. Odometry
//! alone drives the estimate between fixes. An accepted fix is compared with
//! the odometry pose at the frame's capture time, the difference is scaled
//! per axis by a trust gain, and the motion since capture is replayed on top
//! of the corrected pose.

use std::sync::Arc;

use crate::common::Pose2D;
use crate::config::{FusionSection, LocalizationConfig};
use crate::control::kinematics::SwerveKinematics;
use crate::error::{CoreError, OdometryError};
use crate::perception::landmarks::FieldLayout;
use crate::perception::observer::PoseObserver;
use crate::perception::odometry::{OdometryIntegrator, OdometrySample};
use crate::perception::pose_history::PoseHistory;
use crate::perception::vision::{Rejection, VisionCandidate, VisionFilter, VisionFrame};

/// Outcome of offering a vision frame to the estimator
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VisionUpdate {
    Applied {
        candidate: VisionCandidate,
        corrected: Pose2D,
    },
    Rejected(Rejection),
}

impl VisionUpdate {
    pub fn is_applied(&self) -> bool {
        matches!(self, VisionUpdate::Applied { .. })
    }

    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            VisionUpdate::Rejected(rejection) => Some(*rejection),
            VisionUpdate::Applied { .. } => None,
        }
    }
}

/// Per-axis fraction of a vision correction to apply.
///
/// `q` and `r` are the odometry and vision variances; a zero vision
/// deviation trusts vision completely, a zero odometry deviation ignores it.
pub fn correction_gains(state_std_devs: [f64; 3], vision_std_devs: [f64; 3]) -> [f64; 3] {
    let mut gains = [0.0; 3];
    for (gain, (state, vision)) in gains
        .iter_mut()
        .zip(state_std_devs.iter().zip(vision_std_devs.iter()))
    {
        let q = state * state;
        let r = vision * vision;
        *gain = if q == 0.0 { 0.0 } else { q / (q + (q * r).sqrt()) };
    }
    gains
}

/// Best-estimate field pose from odometry and vision
pub struct PoseEstimator {
    odometry: OdometryIntegrator,
    filter: VisionFilter,
    history: PoseHistory,
    gains: [f64; 3],
    last_sample: OdometrySample,
    last_vision_timestamp: Option<f64>,
    observers: Vec<Box<dyn PoseObserver>>,
}

impl PoseEstimator {
    /// Create an estimator at `initial_pose` with the current drive readings.
    pub fn new(
        kinematics: SwerveKinematics,
        filter: VisionFilter,
        fusion: &FusionSection,
        initial_pose: Pose2D,
        baseline: &OdometrySample,
    ) -> Result<Self, OdometryError> {
        let odometry = OdometryIntegrator::new(kinematics, initial_pose, baseline)?;
        let mut history = PoseHistory::new(fusion.history_window_secs);
        history.record(baseline.timestamp, initial_pose);

        Ok(PoseEstimator {
            odometry,
            filter,
            history,
            gains: correction_gains(fusion.state_std_devs, fusion.vision_std_devs),
            last_sample: *baseline,
            last_vision_timestamp: None,
            observers: Vec::new(),
        })
    }

    /// Build every part from configuration and a shared field layout.
    pub fn from_config(
        config: &LocalizationConfig,
        field: Arc<FieldLayout>,
        initial_pose: Pose2D,
        baseline: &OdometrySample,
    ) -> Result<Self, CoreError> {
        let kinematics = SwerveKinematics::from_config(&config.drive)?;
        let filter = VisionFilter::from_config(field, &config.camera);
        Ok(Self::new(
            kinematics,
            filter,
            &config.fusion,
            initial_pose,
            baseline,
        )?)
    }

    pub fn add_observer(&mut self, observer: Box<dyn PoseObserver>) {
        self.observers.push(observer);
    }

    /// Advance the estimate with fresh drive readings.
    ///
    /// Non-finite readings are a hardware or wiring fault; they are returned
    /// as errors and the estimate is left as it was.
    pub fn integrate_odometry(&mut self, sample: &OdometrySample) -> Result<Pose2D, OdometryError> {
        let pose = match self.odometry.update(sample) {
            Ok(pose) => pose,
            Err(e) => {
                log::warn!("Discarding odometry sample: {}", e);
                return Err(e);
            }
        };

        self.history.record(sample.timestamp, pose);
        self.last_sample = *sample;
        for observer in self.observers.iter_mut() {
            observer.on_odometry(&pose);
        }
        Ok(pose)
    }

    /// Offer a polled camera frame. Rejections leave the estimate untouched.
    pub fn try_integrate_vision(&mut self, frame: &VisionFrame) -> VisionUpdate {
        let update = match self.filter.accept(frame, self.last_vision_timestamp) {
            Ok(candidate) => self.apply_vision(candidate),
            Err(rejection) => VisionUpdate::Rejected(rejection),
        };

        for observer in self.observers.iter_mut() {
            match &update {
                VisionUpdate::Applied {
                    candidate,
                    corrected,
                } => observer.on_vision_applied(candidate, corrected),
                VisionUpdate::Rejected(rejection) => observer.on_vision_rejected(rejection),
            }
        }
        update
    }

    fn apply_vision(&mut self, candidate: VisionCandidate) -> VisionUpdate {
        let current = self.odometry.pose();
        let (oldest, newest) = match (self.history.oldest_timestamp(), self.history.newest_timestamp()) {
            (Some(oldest), Some(newest)) => (oldest, newest),
            _ => (self.last_sample.timestamp, self.last_sample.timestamp),
        };

        if candidate.timestamp < oldest {
            return VisionUpdate::Rejected(Rejection::OutsideHistory {
                age: newest - candidate.timestamp,
            });
        }

        let anchor_time = candidate.timestamp.min(newest);
        let at_capture = self.history.sample(anchor_time).unwrap_or(current);

        let correction = at_capture.log(&candidate.pose).scaled(self.gains);
        let corrected_at_capture = at_capture.exp(&correction);
        let corrected = corrected_at_capture.transform_by(&current.relative_to(&at_capture));

        self.odometry.rebase(corrected);
        self.history
            .shift_from(anchor_time, &at_capture, &corrected_at_capture);
        self.last_vision_timestamp = Some(candidate.timestamp);

        VisionUpdate::Applied {
            candidate,
            corrected,
        }
    }

    /// Current best estimate
    pub fn current_pose(&self) -> Pose2D {
        self.odometry.pose()
    }

    /// Overwrite the estimate with an externally known pose.
    ///
    /// Odometry is rebased on the latest drive readings and the pose history
    /// is discarded. Only for known placements, e.g. before a match.
    pub fn set_current_pose(&mut self, pose: Pose2D) {
        self.odometry.rebase(pose);
        self.restart_history(pose);
    }

    /// Overwrite the estimate and rebase odometry on fresh drive readings.
    pub fn reset_with_sample(
        &mut self,
        pose: Pose2D,
        sample: &OdometrySample,
    ) -> Result<(), OdometryError> {
        self.odometry.reset(pose, sample)?;
        self.last_sample = *sample;
        self.restart_history(pose);
        Ok(())
    }

    /// Place the robot at the field origin facing downfield.
    pub fn reset_field_position(&mut self) {
        self.set_current_pose(Pose2D::default());
    }

    fn restart_history(&mut self, pose: Pose2D) {
        self.history.clear();
        self.history.record(self.last_sample.timestamp, pose);
        log::info!("Pose estimate reset to {}", pose);
        for observer in self.observers.iter_mut() {
            observer.on_reset(&pose);
        }
    }

    /// Capture time of the last vision frame folded in
    pub fn last_vision_timestamp(&self) -> Option<f64> {
        self.last_vision_timestamp
    }

    pub fn gains(&self) -> [f64; 3] {
        self.gains
    }

    pub fn history(&self) -> &PoseHistory {
        &self.history
    }

    pub fn filter(&self) -> &VisionFilter {
        &self.filter
    }
}
