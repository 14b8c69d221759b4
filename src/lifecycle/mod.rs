//! Lifecycle management for swerve pose core components

use crate::error::CoreError;
use std::any::Any;

/// Trait for components that follow a lifecycle pattern
pub trait LifecycleNode: Send + Sync {
    /// Configure the node
    fn on_configure(&mut self) -> Result<(), CoreError>;

    /// Activate the node
    fn on_activate(&mut self) -> Result<(), CoreError>;

    /// Deactivate the node
    fn on_deactivate(&mut self) -> Result<(), CoreError>;

    /// Clean up the node
    fn on_cleanup(&mut self) -> Result<(), CoreError>;

    /// Current lifecycle state
    fn state(&self) -> State;

    /// Convert to Any for downcasting
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Base implementation for lifecycle nodes
#[derive(Debug)]
pub struct LifecycleNodeBase {
    pub name: String,
    state: State,
}

/// State of a lifecycle node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Unconfigured,
    Inactive,
    Active,
}

impl LifecycleNodeBase {
    /// Create a new lifecycle node base
    pub fn new(name: &str) -> Self {
        LifecycleNodeBase {
            name: name.to_string(),
            state: State::Unconfigured,
        }
    }

    /// Get the current state
    pub fn get_state(&self) -> State {
        self.state
    }

    /// Move from `from` to `to`, failing if the node is elsewhere
    pub fn transition(
        &mut self,
        transition: &'static str,
        from: State,
        to: State,
    ) -> Result<(), CoreError> {
        if self.state != from {
            return Err(CoreError::Transition {
                component: self.name.clone(),
                transition,
                state: format!("{:?}", self.state),
            });
        }
        self.state = to;
        Ok(())
    }
}
