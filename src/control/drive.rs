//! Drive command mapping: body or field velocity to module targets.

use crate::common::{ModuleMap, Rotation2d};
use crate::config::DriveSection;
use crate::control::kinematics::{ChassisSpeeds, ModuleState, SwerveKinematics};
use crate::error::ConfigError;

/// Turns driver or behavior commands into desaturated per-module targets.
///
/// Remembers the last commanded steer angles so a stopped module holds its
/// direction instead of swinging back to zero.
#[derive(Debug, Clone)]
pub struct SwerveDrive {
    kinematics: SwerveKinematics,
    max_module_speed: f64,
    last_states: ModuleMap<ModuleState>,
}

impl SwerveDrive {
    pub fn new(kinematics: SwerveKinematics, max_module_speed: f64) -> Self {
        SwerveDrive {
            kinematics,
            max_module_speed,
            last_states: ModuleMap::default(),
        }
    }

    pub fn from_config(drive: &DriveSection) -> Result<Self, ConfigError> {
        Ok(Self::new(
            SwerveKinematics::from_config(drive)?,
            drive.max_module_speed,
        ))
    }

    /// Map a translation (m/s) and rotation (rad/s) command to module targets.
    ///
    /// With `field_relative` the translation is in the field frame and is
    /// rotated into the body frame using `heading`.
    pub fn drive(
        &mut self,
        translation: (f64, f64),
        rotation: f64,
        field_relative: bool,
        heading: Rotation2d,
    ) -> ModuleMap<ModuleState> {
        let speeds = if field_relative {
            ChassisSpeeds::from_field_relative(translation.0, translation.1, rotation, heading)
        } else {
            ChassisSpeeds::new(translation.0, translation.1, rotation)
        };
        self.set_chassis_speeds(&speeds)
    }

    /// Map a body-frame velocity to module targets.
    pub fn set_chassis_speeds(&mut self, speeds: &ChassisSpeeds) -> ModuleMap<ModuleState> {
        let mut states = self.kinematics.to_module_states(speeds);
        if let Some(factor) = SwerveKinematics::desaturate(&mut states, self.max_module_speed) {
            log::trace!("Desaturated module speeds by {:.3}", factor);
        }

        for (id, state) in states.iter_mut() {
            if state.is_stopped() {
                state.angle = self.last_states[id].angle;
            }
        }
        self.last_states = states;
        states
    }

    /// The most recent module targets.
    pub fn last_states(&self) -> &ModuleMap<ModuleState> {
        &self.last_states
    }
}
