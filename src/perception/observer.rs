//! Telemetry hooks for the pose estimator.

use crate::common::Pose2D;
use crate::perception::vision::{Rejection, VisionCandidate};

/// Receives estimator events; every method defaults to doing nothing.
pub trait PoseObserver: Send + Sync {
    /// The estimate after an odometry update
    fn on_odometry(&mut self, _pose: &Pose2D) {}

    /// A vision candidate was folded into the estimate
    fn on_vision_applied(&mut self, _candidate: &VisionCandidate, _corrected: &Pose2D) {}

    /// A vision frame was discarded
    fn on_vision_rejected(&mut self, _rejection: &Rejection) {}

    /// The estimate was overwritten by a hard reset
    fn on_reset(&mut self, _pose: &Pose2D) {}
}

/// Writes estimator events through the `log` facade.
///
/// Odometry updates are throttled to one line every `odometry_every` ticks.
#[derive(Debug)]
pub struct LoggingObserver {
    odometry_every: u32,
    ticks: u32,
}

impl LoggingObserver {
    pub fn new(odometry_every: u32) -> Self {
        LoggingObserver {
            odometry_every: odometry_every.max(1),
            ticks: 0,
        }
    }
}

impl Default for LoggingObserver {
    fn default() -> Self {
        // Once a second at 50 Hz.
        Self::new(50)
    }
}

impl PoseObserver for LoggingObserver {
    fn on_odometry(&mut self, pose: &Pose2D) {
        self.ticks = (self.ticks + 1) % self.odometry_every;
        if self.ticks == 0 {
            log::info!("Pose {}", pose);
        }
    }

    fn on_vision_applied(&mut self, candidate: &VisionCandidate, corrected: &Pose2D) {
        log::debug!(
            "Vision from landmark {} (ambiguity {:.3}) saw {}, estimate now {}",
            candidate.landmark_id,
            candidate.ambiguity,
            candidate.pose,
            corrected
        );
    }

    fn on_vision_rejected(&mut self, rejection: &Rejection) {
        log::trace!("Vision frame rejected: {}", rejection);
    }

    fn on_reset(&mut self, _pose: &Pose2D) {
        // Logged by the estimator; only restart the throttle.
        self.ticks = 0;
    }
}
