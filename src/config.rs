//! Configuration for the swerve pose core, loaded from a single YAML file.
//!
//! Every section falls back to its defaults, so a partial file is valid.
//! The defaults describe the competition robot and its two-tag field.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::common::{ModuleMap, Transform3D};
use crate::error::ConfigError;

mod defaults {
    pub fn max_module_speed() -> f64 {
        4.5
    }
    pub fn max_ambiguity() -> f64 {
        0.2
    }
    pub fn state_std_devs() -> [f64; 3] {
        [0.1, 0.1, 0.1]
    }
    pub fn vision_std_devs() -> [f64; 3] {
        [0.9, 0.9, 0.9]
    }
    pub fn history_window_secs() -> f64 {
        1.5
    }
    pub fn balance_gains() -> [f64; 3] {
        [0.4, 0.3, 0.01]
    }
    pub fn balance_tolerance_deg() -> f64 {
        3.0
    }
    pub fn balance_settle_ticks() -> u32 {
        10
    }
    pub fn balance_output_scale() -> f64 {
        0.025
    }
    pub fn period_secs() -> f64 {
        0.02
    }
}

/// Full configuration loaded from YAML
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LocalizationConfig {
    #[serde(default)]
    pub drive: DriveSection,

    #[serde(default)]
    pub camera: CameraSection,

    #[serde(default)]
    pub fusion: FusionSection,

    #[serde(default)]
    pub field: FieldSection,

    #[serde(default)]
    pub balance: BalanceSection,
}

impl LocalizationConfig {
    /// Load and validate configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse and validate from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: LocalizationConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.drive.max_module_speed.is_finite() && self.drive.max_module_speed > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "drive.max_module_speed must be positive, got {}",
                self.drive.max_module_speed
            )));
        }

        if !(0.0..=1.0).contains(&self.camera.max_ambiguity) {
            return Err(ConfigError::Invalid(format!(
                "camera.max_ambiguity must be within [0, 1], got {}",
                self.camera.max_ambiguity
            )));
        }

        for (name, devs) in [
            ("fusion.state_std_devs", &self.fusion.state_std_devs),
            ("fusion.vision_std_devs", &self.fusion.vision_std_devs),
        ] {
            if devs.iter().any(|d| !d.is_finite() || *d < 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be finite and non-negative, got {:?}",
                    name, devs
                )));
            }
        }

        if !(self.fusion.history_window_secs > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "fusion.history_window_secs must be positive, got {}",
                self.fusion.history_window_secs
            )));
        }

        if self.field.landmarks.is_empty() {
            return Err(ConfigError::Invalid(
                "field.landmarks must not be empty".to_string(),
            ));
        }
        for (expected, landmark) in self.field.landmarks.iter().enumerate() {
            if landmark.id as usize != expected {
                return Err(ConfigError::Invalid(format!(
                    "field.landmarks ids must be contiguous from 0, found id {} at position {}",
                    landmark.id, expected
                )));
            }
        }

        if !(self.balance.period_secs > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "balance.period_secs must be positive, got {}",
                self.balance.period_secs
            )));
        }

        Ok(())
    }
}

/// Drive geometry and limits
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DriveSection {
    /// (x, y) offset of each module from the body center, meters
    #[serde(default)]
    pub module_offsets: ModuleOffsets,

    /// Fastest any module may be commanded, m/s
    #[serde(default = "defaults::max_module_speed")]
    pub max_module_speed: f64,
}

impl Default for DriveSection {
    fn default() -> Self {
        Self {
            module_offsets: ModuleOffsets::default(),
            max_module_speed: defaults::max_module_speed(),
        }
    }
}

/// Module mounting points, x forward and y left of the body center.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModuleOffsets {
    pub front_left: [f64; 2],
    pub front_right: [f64; 2],
    pub back_left: [f64; 2],
    pub back_right: [f64; 2],
}

impl ModuleOffsets {
    pub fn to_module_map(&self) -> ModuleMap<[f64; 2]> {
        ModuleMap::new(
            self.front_left,
            self.front_right,
            self.back_left,
            self.back_right,
        )
    }
}

impl Default for ModuleOffsets {
    fn default() -> Self {
        // 0.5 m square wheelbase.
        Self {
            front_left: [0.25, 0.25],
            front_right: [0.25, -0.25],
            back_left: [-0.25, 0.25],
            back_right: [-0.25, -0.25],
        }
    }
}

/// Camera mounting and detection gating
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CameraSection {
    /// Transform from the camera frame to the body frame
    #[serde(default)]
    pub camera_to_body: MountTransform,

    /// Detections with a pose ambiguity above this are discarded
    #[serde(default = "defaults::max_ambiguity")]
    pub max_ambiguity: f64,
}

impl Default for CameraSection {
    fn default() -> Self {
        Self {
            camera_to_body: MountTransform::default(),
            max_ambiguity: defaults::max_ambiguity(),
        }
    }
}

/// A rigid transform written with angles in degrees.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MountTransform {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    #[serde(default)]
    pub roll_deg: f64,
    #[serde(default)]
    pub pitch_deg: f64,
    #[serde(default)]
    pub yaw_deg: f64,
}

impl MountTransform {
    pub fn to_transform(&self) -> Transform3D {
        Transform3D::new(
            self.x,
            self.y,
            self.z,
            self.roll_deg.to_radians(),
            self.pitch_deg.to_radians(),
            self.yaw_deg.to_radians(),
        )
    }
}

/// Trust given to odometry versus vision
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FusionSection {
    /// Odometry standard deviations (x m, y m, heading rad)
    #[serde(default = "defaults::state_std_devs")]
    pub state_std_devs: [f64; 3],

    /// Vision standard deviations (x m, y m, heading rad); zeros snap to vision
    #[serde(default = "defaults::vision_std_devs")]
    pub vision_std_devs: [f64; 3],

    /// How far back vision frames may be matched against odometry, seconds
    #[serde(default = "defaults::history_window_secs")]
    pub history_window_secs: f64,
}

impl Default for FusionSection {
    fn default() -> Self {
        Self {
            state_std_devs: defaults::state_std_devs(),
            vision_std_devs: defaults::vision_std_devs(),
            history_window_secs: defaults::history_window_secs(),
        }
    }
}

/// Fixed fiducial landmarks, ordered by id
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldSection {
    pub landmarks: Vec<LandmarkEntry>,
}

impl Default for FieldSection {
    fn default() -> Self {
        let height = 0.287 + 0.165;
        Self {
            landmarks: vec![
                LandmarkEntry {
                    id: 0,
                    x: 3.0,
                    y: 1.165,
                    z: height,
                    yaw_deg: 180.0,
                },
                LandmarkEntry {
                    id: 1,
                    x: 3.0,
                    y: 0.0,
                    z: height,
                    yaw_deg: 180.0,
                },
            ],
        }
    }
}

/// One landmark; tags are mounted upright so only yaw is configurable.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LandmarkEntry {
    pub id: u32,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw_deg: f64,
}

/// Self-leveling controller tuning
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BalanceSection {
    /// PID gains (kp, ki, kd)
    #[serde(default = "defaults::balance_gains")]
    pub gains: [f64; 3],

    /// Pitch error considered level, degrees
    #[serde(default = "defaults::balance_tolerance_deg")]
    pub tolerance_deg: f64,

    /// Consecutive level ticks before the behavior finishes
    #[serde(default = "defaults::balance_settle_ticks")]
    pub settle_ticks: u32,

    /// Scale from PID output to forward speed, m/s per unit
    #[serde(default = "defaults::balance_output_scale")]
    pub output_scale: f64,

    /// Control loop period, seconds
    #[serde(default = "defaults::period_secs")]
    pub period_secs: f64,
}

impl Default for BalanceSection {
    fn default() -> Self {
        Self {
            gains: defaults::balance_gains(),
            tolerance_deg: defaults::balance_tolerance_deg(),
            settle_ticks: defaults::balance_settle_ticks(),
            output_scale: defaults::balance_output_scale(),
            period_secs: defaults::period_secs(),
        }
    }
}
