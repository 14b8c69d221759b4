//! Perception module: odometry, vision and pose fusion
pub mod landmarks;
pub mod localization;
pub mod observer;
pub mod odometry;
pub mod pose_history;
pub mod sensors;
pub mod vision;

use self::landmarks::FieldLayout;
use self::localization::{PoseEstimator, VisionUpdate};
use self::observer::PoseObserver;
use self::odometry::OdometrySample;
use self::sensors::{Camera, DriveSensors};
use self::vision::VisionFrame;
use crate::common::Pose2D;
use crate::config::LocalizationConfig;
use crate::error::{ConfigError, CoreError};
use crate::lifecycle::{LifecycleNode, LifecycleNodeBase, State};
use std::any::Any;
use std::sync::Arc;

/// Result of one control-loop tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub pose: Pose2D,
    pub vision: VisionUpdate,
}

/// Perception stack for the robot
pub struct PerceptionStack {
    base: LifecycleNodeBase,
    config: LocalizationConfig,
    field: Arc<FieldLayout>,
    estimator: Option<PoseEstimator>,
    initial_pose: Pose2D,
    pending_observers: Vec<Box<dyn PoseObserver>>,
}

impl PerceptionStack {
    /// Create a new perception stack
    pub fn new(config: LocalizationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let field = Arc::new(FieldLayout::from_config(&config.field)?);
        Ok(PerceptionStack {
            base: LifecycleNodeBase::new("perception_stack"),
            config,
            field,
            estimator: None,
            initial_pose: Pose2D::default(),
            pending_observers: Vec::new(),
        })
    }

    pub fn field(&self) -> Arc<FieldLayout> {
        Arc::clone(&self.field)
    }

    /// Attach a telemetry observer
    pub fn add_observer(&mut self, observer: Box<dyn PoseObserver>) {
        match self.estimator.as_mut() {
            Some(estimator) => estimator.add_observer(observer),
            None => self.pending_observers.push(observer),
        }
    }

    /// Run one tick: odometry first, then the polled vision frame.
    ///
    /// The first tick after activation seeds odometry from `sample`.
    pub fn tick(
        &mut self,
        sample: &OdometrySample,
        frame: &VisionFrame,
    ) -> Result<TickReport, CoreError> {
        if self.base.get_state() != State::Active {
            return Err(CoreError::Inactive(self.base.name.clone()));
        }

        let estimator = match self.estimator {
            Some(ref mut estimator) => {
                estimator.integrate_odometry(sample)?;
                estimator
            }
            None => {
                let mut estimator = PoseEstimator::from_config(
                    &self.config,
                    Arc::clone(&self.field),
                    self.initial_pose,
                    sample,
                )?;
                for observer in self.pending_observers.drain(..) {
                    estimator.add_observer(observer);
                }
                self.estimator.insert(estimator)
            }
        };

        let vision = estimator.try_integrate_vision(frame);
        Ok(TickReport {
            pose: estimator.current_pose(),
            vision,
        })
    }

    /// Poll both sensors and run one tick
    pub fn poll(
        &mut self,
        drive: &mut dyn DriveSensors,
        camera: &mut dyn Camera,
    ) -> Result<TickReport, CoreError> {
        let sample = drive.sample();
        let frame = camera.latest_frame();
        self.tick(&sample, &frame)
    }

    /// Get the current pose estimate
    pub fn current_pose(&self) -> Pose2D {
        self.estimator
            .as_ref()
            .map_or(self.initial_pose, PoseEstimator::current_pose)
    }

    /// Hard reset to an externally known pose
    pub fn set_current_pose(&mut self, pose: Pose2D) {
        match self.estimator.as_mut() {
            Some(estimator) => estimator.set_current_pose(pose),
            None => self.initial_pose = pose,
        }
    }

    pub fn estimator(&self) -> Option<&PoseEstimator> {
        self.estimator.as_ref()
    }
}

impl LifecycleNode for PerceptionStack {
    fn on_configure(&mut self) -> Result<(), CoreError> {
        log::info!(
            "Configuring perception stack with {} landmarks",
            self.field.len()
        );
        self.config.validate()?;
        self.base.transition("configure", State::Unconfigured, State::Inactive)
    }

    fn on_activate(&mut self) -> Result<(), CoreError> {
        log::info!("Activating perception stack");
        self.base.transition("activate", State::Inactive, State::Active)
    }

    fn on_deactivate(&mut self) -> Result<(), CoreError> {
        log::info!("Deactivating perception stack");
        self.base.transition("deactivate", State::Active, State::Inactive)
    }

    fn on_cleanup(&mut self) -> Result<(), CoreError> {
        log::info!("Cleaning up perception stack");
        if let Some(estimator) = self.estimator.take() {
            self.initial_pose = estimator.current_pose();
        }
        self.base.transition("cleanup", State::Inactive, State::Unconfigured)
    }

    fn state(&self) -> State {
        self.base.get_state()
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
