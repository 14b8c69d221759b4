//! Swerve drive kinematics
//!
//! Maps body motion to per-module speed and steer angle, and module
//! measurements back to body motion. The inverse model stacks one 2x3 block
//! per module into an 8x3 matrix; the forward model is its least-squares
//! pseudo-inverse, so disagreeing modules are averaged rather than trusted
//! individually.

use nalgebra::{SMatrix, SVector, Vector3};

use crate::common::{ModuleMap, Rotation2d, Twist2d};
use crate::config::DriveSection;
use crate::error::ConfigError;

/// Below this speed a module has no meaningful direction.
const MIN_DIRECTIONAL_SPEED: f64 = 1e-9;

/// Body-frame velocity: forward (m/s), strafe left (m/s), counter-clockwise (rad/s)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChassisSpeeds {
    pub vx: f64,
    pub vy: f64,
    pub omega: f64,
}

impl ChassisSpeeds {
    pub fn new(vx: f64, vy: f64, omega: f64) -> Self {
        ChassisSpeeds { vx, vy, omega }
    }

    /// Convert a field-relative command into the body frame of a robot with
    /// the given heading.
    pub fn from_field_relative(vx: f64, vy: f64, omega: f64, heading: Rotation2d) -> Self {
        let (s, c) = (heading.sin(), heading.cos());
        ChassisSpeeds {
            vx: vx * c + vy * s,
            vy: -vx * s + vy * c,
            omega,
        }
    }
}

/// Commanded or measured module velocity
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ModuleState {
    /// Wheel surface speed, m/s
    pub speed: f64,
    /// Steer angle relative to the body's forward axis
    pub angle: Rotation2d,
}

impl ModuleState {
    pub fn new(speed: f64, angle: Rotation2d) -> Self {
        ModuleState { speed, angle }
    }

    /// Too slow to have a meaningful steer direction
    pub fn is_stopped(&self) -> bool {
        self.speed.abs() < MIN_DIRECTIONAL_SPEED
    }
}

/// Cumulative wheel travel and current steer angle of one module
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ModulePosition {
    /// Signed wheel distance since power-on, meters
    pub distance: f64,
    pub angle: Rotation2d,
}

impl ModulePosition {
    pub fn new(distance: f64, angle: Rotation2d) -> Self {
        ModulePosition { distance, angle }
    }

    /// Travel since `previous`, along the current steer angle.
    pub fn delta_since(&self, previous: &ModulePosition) -> ModulePosition {
        ModulePosition {
            distance: self.distance - previous.distance,
            angle: self.angle,
        }
    }
}

/// Kinematic model of a four-module swerve chassis
#[derive(Debug, Clone)]
pub struct SwerveKinematics {
    inverse: SMatrix<f64, 8, 3>,
    forward: SMatrix<f64, 3, 8>,
}

impl SwerveKinematics {
    /// Build the model from module offsets `[x, y]` relative to the body center.
    pub fn new(offsets: ModuleMap<[f64; 2]>) -> Result<Self, ConfigError> {
        let mut inverse = SMatrix::<f64, 8, 3>::zeros();
        for (id, &[x, y]) in offsets.iter() {
            if !(x.is_finite() && y.is_finite()) {
                return Err(ConfigError::Invalid(format!(
                    "module {} offset is not finite: [{}, {}]",
                    id, x, y
                )));
            }
            let row = 2 * id.index();
            inverse[(row, 0)] = 1.0;
            inverse[(row, 2)] = -y;
            inverse[(row + 1, 1)] = 1.0;
            inverse[(row + 1, 2)] = x;
        }

        let transpose = inverse.transpose();
        let normal = transpose * inverse;
        let normal_inv = normal.try_inverse().ok_or_else(|| {
            ConfigError::Invalid("module offsets cannot observe chassis rotation".to_string())
        })?;

        Ok(SwerveKinematics {
            inverse,
            forward: normal_inv * transpose,
        })
    }

    pub fn from_config(drive: &DriveSection) -> Result<Self, ConfigError> {
        Self::new(drive.module_offsets.to_module_map())
    }

    /// Per-module targets for a body velocity, before desaturation.
    ///
    /// A module with no speed reports a zero steer angle; holding the previous
    /// angle is the drive command path's job.
    pub fn to_module_states(&self, speeds: &ChassisSpeeds) -> ModuleMap<ModuleState> {
        let module_velocities = self.inverse * Vector3::new(speeds.vx, speeds.vy, speeds.omega);

        ModuleMap::from_fn(|id| {
            let vx = module_velocities[2 * id.index()];
            let vy = module_velocities[2 * id.index() + 1];
            let speed = vx.hypot(vy);
            let angle = if speed.abs() < MIN_DIRECTIONAL_SPEED {
                Rotation2d::default()
            } else {
                Rotation2d::from_radians(vy.atan2(vx))
            };
            ModuleState::new(speed, angle)
        })
    }

    /// Best-fit body velocity for measured module states.
    pub fn to_chassis_speeds(&self, states: &ModuleMap<ModuleState>) -> ChassisSpeeds {
        let body = self.forward * Self::stack(states.map(|_, s| (s.speed, s.angle)));
        ChassisSpeeds::new(body[0], body[1], body[2])
    }

    /// Best-fit body displacement for per-module travel deltas.
    pub fn to_twist(&self, deltas: &ModuleMap<ModulePosition>) -> Twist2d {
        let body = self.forward * Self::stack(deltas.map(|_, d| (d.distance, d.angle)));
        Twist2d::new(body[0], body[1], body[2])
    }

    /// Scale every module down by one shared factor so none exceeds
    /// `max_speed`. Steer angles are never touched.
    ///
    /// Returns the factor applied, or `None` when no module was saturated.
    pub fn desaturate(states: &mut ModuleMap<ModuleState>, max_speed: f64) -> Option<f64> {
        let fastest = states
            .values()
            .map(|s| s.speed.abs())
            .fold(0.0_f64, f64::max);

        if fastest <= max_speed {
            return None;
        }

        let factor = max_speed / fastest;
        for (_, state) in states.iter_mut() {
            state.speed *= factor;
        }
        Some(factor)
    }

    fn stack(polar: ModuleMap<(f64, Rotation2d)>) -> SVector<f64, 8> {
        let mut stacked = SVector::<f64, 8>::zeros();
        for (id, &(magnitude, angle)) in polar.iter() {
            stacked[2 * id.index()] = magnitude * angle.cos();
            stacked[2 * id.index() + 1] = magnitude * angle.sin();
        }
        stacked
    }
}
