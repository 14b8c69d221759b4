pub mod behaviors;
pub mod common;
pub mod config;
pub mod control;
pub mod error;
pub mod lifecycle;
pub mod perception;

pub use crate::common::{Pose2D, Pose3D, Rotation2d, Transform2D, Transform3D, Twist2d};
pub use crate::config::LocalizationConfig;
pub use crate::error::{ConfigError, CoreError, OdometryError};
pub use crate::perception::localization::{PoseEstimator, VisionUpdate};
pub use crate::perception::vision::{Rejection, VisionFrame};

use crate::control::ControlStack;
use crate::lifecycle::LifecycleNode;
use crate::perception::PerceptionStack;

/// Core runtime for the swerve pose estimator
pub struct SwervePoseCore {
    components: Vec<Box<dyn LifecycleNode>>,
}

impl Default for SwervePoseCore {
    fn default() -> Self {
        Self::new()
    }
}

impl SwervePoseCore {
    /// Create a new instance of SwervePoseCore
    pub fn new() -> Self {
        SwervePoseCore {
            components: Vec::new(),
        }
    }

    /// Build the perception and control stacks from one configuration
    pub fn from_config(config: LocalizationConfig) -> Result<Self, ConfigError> {
        let mut core = Self::new();
        core.register(ControlStack::new(&config)?);
        core.register(PerceptionStack::new(config)?);
        Ok(core)
    }

    /// Register a component with the core
    pub fn register<T: LifecycleNode + 'static>(&mut self, component: T) {
        self.components.push(Box::new(component));
    }

    /// Initialize all registered components
    pub fn init(&mut self) -> Result<(), CoreError> {
        for component in &mut self.components {
            component.on_configure()?;
            component.on_activate()?;
        }
        Ok(())
    }

    /// Shutdown all registered components, in reverse registration order
    pub fn shutdown(&mut self) -> Result<(), CoreError> {
        for component in self.components.iter_mut().rev() {
            component.on_deactivate()?;
            component.on_cleanup()?;
        }
        Ok(())
    }

    /// Get a reference to the perception stack
    pub fn perception_stack_mut(&mut self) -> Option<&mut PerceptionStack> {
        self.components
            .iter_mut()
            .find_map(|component| component.as_any_mut().downcast_mut::<PerceptionStack>())
    }

    /// Get a reference to the control stack
    pub fn control_stack_mut(&mut self) -> Option<&mut ControlStack> {
        self.components
            .iter_mut()
            .find_map(|component| component.as_any_mut().downcast_mut::<ControlStack>())
    }

    /// Both stacks at once, for loops that command and estimate each tick
    pub fn stacks_mut(&mut self) -> Option<(&mut ControlStack, &mut PerceptionStack)> {
        let mut control = None;
        let mut perception = None;
        for component in self.components.iter_mut() {
            let any = component.as_any_mut();
            if any.is::<ControlStack>() {
                control = any.downcast_mut::<ControlStack>();
            } else if any.is::<PerceptionStack>() {
                perception = any.downcast_mut::<PerceptionStack>();
            }
        }
        Some((control?, perception?))
    }
}
