//! Vision observation filter
//!
//! Gates single-tag camera detections and turns the survivors into a body
//! pose on the field. Rules are checked in a fixed order and the first match
//! decides the outcome:
//!
//! 1. same capture timestamp as the last consumed frame: duplicate
//! 2. no detected target
//! 3. pose ambiguity above the threshold
//! 4. landmark id not in the field layout
//! 5. resolved body pose not finite

use std::fmt;
use std::sync::Arc;

use crate::common::{Pose2D, Pose3D, Transform3D};
use crate::config::CameraSection;
use crate::perception::landmarks::FieldLayout;

/// The best target of one camera frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetObservation {
    /// Fiducial id as reported by the pipeline; may be out of range
    pub landmark_id: i32,
    /// Pose ambiguity in [0, 1], higher is less reliable
    pub ambiguity: f64,
    /// Landmark pose in the camera frame
    pub camera_to_target: Transform3D,
}

/// One polled camera result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisionFrame {
    /// Capture time on the same monotonic clock as odometry, seconds
    pub timestamp: f64,
    pub target: Option<TargetObservation>,
}

impl VisionFrame {
    pub fn new(timestamp: f64, target: TargetObservation) -> Self {
        VisionFrame {
            timestamp,
            target: Some(target),
        }
    }

    pub fn no_target(timestamp: f64) -> Self {
        VisionFrame {
            timestamp,
            target: None,
        }
    }
}

/// Why a frame was not used. These are routine, not faults.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rejection {
    /// Same capture timestamp as the last consumed frame
    Duplicate,
    /// The camera saw no landmark
    NoTarget,
    /// Single-tag solve is bimodal above the threshold
    Ambiguous { ambiguity: f64 },
    /// Landmark id outside the field layout
    UnknownLandmark { id: i32 },
    /// Target transform resolved to a non-finite body pose
    NonFinite,
    /// Captured earlier than the odometry history reaches back
    OutsideHistory { age: f64 },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Duplicate => write!(f, "duplicate frame"),
            Rejection::NoTarget => write!(f, "no target"),
            Rejection::Ambiguous { ambiguity } => write!(f, "ambiguous ({:.3})", ambiguity),
            Rejection::UnknownLandmark { id } => write!(f, "unknown landmark {}", id),
            Rejection::NonFinite => write!(f, "non-finite target pose"),
            Rejection::OutsideHistory { age } => {
                write!(f, "frame {:.3}s older than odometry history", age)
            }
        }
    }
}

/// A body pose derived from an accepted frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisionCandidate {
    pub pose: Pose2D,
    pub timestamp: f64,
    pub landmark_id: u32,
    pub ambiguity: f64,
    /// Full 3D camera pose on the field, before the mount offset
    pub camera_pose: Pose3D,
}

/// Stateless gate from camera frames to body pose candidates
#[derive(Debug, Clone)]
pub struct VisionFilter {
    field: Arc<FieldLayout>,
    camera_to_body: Transform3D,
    max_ambiguity: f64,
}

impl VisionFilter {
    pub fn new(field: Arc<FieldLayout>, camera_to_body: Transform3D, max_ambiguity: f64) -> Self {
        VisionFilter {
            field,
            camera_to_body,
            max_ambiguity,
        }
    }

    pub fn from_config(field: Arc<FieldLayout>, camera: &CameraSection) -> Self {
        Self::new(
            field,
            camera.camera_to_body.to_transform(),
            camera.max_ambiguity,
        )
    }

    pub fn field(&self) -> &FieldLayout {
        &self.field
    }

    /// Accept or reject `frame` given the timestamp of the last consumed one.
    pub fn accept(
        &self,
        frame: &VisionFrame,
        previous_timestamp: Option<f64>,
    ) -> Result<VisionCandidate, Rejection> {
        if previous_timestamp == Some(frame.timestamp) {
            return Err(Rejection::Duplicate);
        }

        let target = frame.target.as_ref().ok_or(Rejection::NoTarget)?;

        // NaN counts as ambiguous.
        if !(target.ambiguity <= self.max_ambiguity) {
            return Err(Rejection::Ambiguous {
                ambiguity: target.ambiguity,
            });
        }

        let landmark = self
            .field
            .get(target.landmark_id)
            .ok_or(Rejection::UnknownLandmark {
                id: target.landmark_id,
            })?;

        let camera_pose = landmark
            .pose
            .transform_by(&target.camera_to_target.inverse());
        let pose = camera_pose.transform_by(&self.camera_to_body).to_pose2d();
        if !pose.is_finite() {
            return Err(Rejection::NonFinite);
        }

        Ok(VisionCandidate {
            pose,
            timestamp: frame.timestamp,
            landmark_id: landmark.id,
            ambiguity: target.ambiguity,
            camera_pose,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn filter() -> VisionFilter {
        VisionFilter::new(Arc::new(FieldLayout::default()), Transform3D::identity(), 0.2)
    }

    /// Camera 1 m in front of the tag, looking straight at it.
    fn facing_tag(landmark_id: i32, ambiguity: f64) -> TargetObservation {
        TargetObservation {
            landmark_id,
            ambiguity,
            camera_to_target: Transform3D::new(1.0, 0.0, 0.0, 0.0, 0.0, PI),
        }
    }

    #[test]
    fn test_accepts_tag_in_front_of_camera() {
        let frame = VisionFrame::new(1.0, facing_tag(0, 0.05));
        let candidate = filter().accept(&frame, None).unwrap();
        assert_relative_eq!(candidate.pose.x, 2.0, epsilon = 1e-9);
        assert_relative_eq!(candidate.pose.y, 1.165, epsilon = 1e-9);
        assert_relative_eq!(candidate.pose.rotation.radians(), 0.0, epsilon = 1e-9);
        assert_relative_eq!(candidate.camera_pose.z(), 0.452, epsilon = 1e-9);
        assert_eq!(candidate.timestamp, 1.0);
        assert_eq!(candidate.landmark_id, 0);
    }

    #[test]
    fn test_duplicate_wins_over_no_target() {
        let frame = VisionFrame::no_target(3.0);
        assert_eq!(filter().accept(&frame, Some(3.0)), Err(Rejection::Duplicate));
        assert_eq!(filter().accept(&frame, Some(2.0)), Err(Rejection::NoTarget));
    }

    #[test]
    fn test_ambiguity_threshold_is_inclusive() {
        let at_threshold = VisionFrame::new(1.0, facing_tag(0, 0.2));
        assert!(filter().accept(&at_threshold, None).is_ok());

        let above = VisionFrame::new(1.0, facing_tag(0, 0.2001));
        assert_eq!(
            filter().accept(&above, None),
            Err(Rejection::Ambiguous { ambiguity: 0.2001 })
        );
    }

    #[test]
    fn test_nan_ambiguity_is_rejected() {
        let frame = VisionFrame::new(1.0, facing_tag(0, f64::NAN));
        assert!(matches!(
            filter().accept(&frame, None),
            Err(Rejection::Ambiguous { .. })
        ));
    }

    #[test]
    fn test_ambiguity_checked_before_landmark_id() {
        let frame = VisionFrame::new(1.0, facing_tag(7, 0.9));
        assert!(matches!(
            filter().accept(&frame, None),
            Err(Rejection::Ambiguous { .. })
        ));
    }

    #[test]
    fn test_unknown_landmarks_rejected() {
        for id in [-1, 2, 99] {
            let frame = VisionFrame::new(1.0, facing_tag(id, 0.0));
            assert_eq!(
                filter().accept(&frame, None),
                Err(Rejection::UnknownLandmark { id })
            );
        }
    }

    #[test]
    fn test_non_finite_target_transform_rejected() {
        let target = TargetObservation {
            camera_to_target: Transform3D::new(f64::NAN, 0.0, 0.0, 0.0, 0.0, PI),
            ..facing_tag(0, 0.05)
        };
        let frame = VisionFrame::new(1.0, target);
        assert_eq!(filter().accept(&frame, None), Err(Rejection::NonFinite));

        let target = TargetObservation {
            camera_to_target: Transform3D::new(1.0, f64::INFINITY, 0.0, 0.0, 0.0, PI),
            ..facing_tag(0, 0.05)
        };
        let frame = VisionFrame::new(1.0, target);
        assert_eq!(filter().accept(&frame, None), Err(Rejection::NonFinite));
    }

    #[test]
    fn test_camera_mount_offset_applied() {
        // Camera mounted 0.3 m ahead of the body center.
        let filter = VisionFilter::new(
            Arc::new(FieldLayout::default()),
            Transform3D::new(-0.3, 0.0, 0.0, 0.0, 0.0, 0.0),
            0.2,
        );
        let frame = VisionFrame::new(1.0, facing_tag(1, 0.1));
        let candidate = filter.accept(&frame, None).unwrap();
        assert_relative_eq!(candidate.pose.x, 1.7, epsilon = 1e-9);
        assert_relative_eq!(candidate.pose.y, 0.0, epsilon = 1e-9);
    }
}
