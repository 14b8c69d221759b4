//! Control module: kinematics, drive command mapping and controllers
pub mod controllers;
pub mod drive;
pub mod kinematics;

use self::drive::SwerveDrive;
use self::kinematics::{ChassisSpeeds, ModuleState};
use crate::behaviors::AutoBalance;
use crate::common::{ModuleMap, Rotation2d};
use crate::config::LocalizationConfig;
use crate::error::{ConfigError, CoreError};
use crate::lifecycle::{LifecycleNode, LifecycleNodeBase, State};
use std::any::Any;

/// Control stack for the robot
pub struct ControlStack {
    base: LifecycleNodeBase,
    drive: SwerveDrive,
    balance: AutoBalance,
}

impl ControlStack {
    /// Create a new control stack
    pub fn new(config: &LocalizationConfig) -> Result<Self, ConfigError> {
        Ok(ControlStack {
            base: LifecycleNodeBase::new("control_stack"),
            drive: SwerveDrive::from_config(&config.drive)?,
            balance: AutoBalance::new(&config.balance),
        })
    }

    /// Map a driver command to module targets; stopped while inactive
    pub fn drive(
        &mut self,
        translation: (f64, f64),
        rotation: f64,
        field_relative: bool,
        heading: Rotation2d,
    ) -> ModuleMap<ModuleState> {
        if self.base.get_state() != State::Active {
            return self.drive.set_chassis_speeds(&ChassisSpeeds::default());
        }
        self.drive.drive(translation, rotation, field_relative, heading)
    }

    /// Map a body-frame velocity to module targets; stopped while inactive
    pub fn set_chassis_speeds(&mut self, speeds: &ChassisSpeeds) -> ModuleMap<ModuleState> {
        if self.base.get_state() != State::Active {
            return self.drive.set_chassis_speeds(&ChassisSpeeds::default());
        }
        self.drive.set_chassis_speeds(speeds)
    }

    /// One self-leveling step for the measured pitch
    pub fn balance(&mut self, pitch: Rotation2d) -> ModuleMap<ModuleState> {
        let speeds = self.balance.execute(pitch);
        self.set_chassis_speeds(&speeds)
    }

    pub fn balance_finished(&self) -> bool {
        self.balance.is_finished()
    }

    pub fn reset_balance(&mut self) {
        self.balance.reset();
    }
}

impl LifecycleNode for ControlStack {
    fn on_configure(&mut self) -> Result<(), CoreError> {
        log::info!("Configuring control stack");
        self.base.transition("configure", State::Unconfigured, State::Inactive)
    }

    fn on_activate(&mut self) -> Result<(), CoreError> {
        log::info!("Activating control stack");
        self.base.transition("activate", State::Inactive, State::Active)
    }

    fn on_deactivate(&mut self) -> Result<(), CoreError> {
        log::info!("Deactivating control stack");
        self.drive.set_chassis_speeds(&ChassisSpeeds::default());
        self.base.transition("deactivate", State::Active, State::Inactive)
    }

    fn on_cleanup(&mut self) -> Result<(), CoreError> {
        log::info!("Cleaning up control stack");
        self.base.transition("cleanup", State::Inactive, State::Unconfigured)
    }

    fn state(&self) -> State {
        self.base.get_state()
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
