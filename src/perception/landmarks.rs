//! Field landmark table: fiducial markers at fixed, known field poses.

use crate::common::Pose3D;
use crate::config::FieldSection;
use crate::error::ConfigError;

/// A fiducial marker fixed on the field
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Landmark {
    pub id: u32,
    pub pose: Pose3D,
}

/// Immutable table of landmarks, dense and ordered by id.
///
/// Built once at startup and shared read-only by every consumer.
#[derive(Debug, Clone)]
pub struct FieldLayout {
    landmarks: Vec<Landmark>,
}

impl FieldLayout {
    /// Build a layout where each pose's position in `poses` is its id.
    pub fn new(poses: Vec<Pose3D>) -> Self {
        FieldLayout {
            landmarks: poses
                .into_iter()
                .enumerate()
                .map(|(id, pose)| Landmark {
                    id: id as u32,
                    pose,
                })
                .collect(),
        }
    }

    pub fn from_config(field: &FieldSection) -> Result<Self, ConfigError> {
        let mut poses = Vec::with_capacity(field.landmarks.len());
        for (expected, entry) in field.landmarks.iter().enumerate() {
            if entry.id as usize != expected {
                return Err(ConfigError::Invalid(format!(
                    "landmark id {} out of order, expected {}",
                    entry.id, expected
                )));
            }
            poses.push(Pose3D::new(
                entry.x,
                entry.y,
                entry.z,
                0.0,
                0.0,
                entry.yaw_deg.to_radians(),
            ));
        }
        Ok(Self::new(poses))
    }

    /// Look up a landmark; ids outside the table (including negative) miss.
    pub fn get(&self, id: i32) -> Option<&Landmark> {
        usize::try_from(id).ok().and_then(|i| self.landmarks.get(i))
    }

    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Landmark> {
        self.landmarks.iter()
    }
}

impl Default for FieldLayout {
    fn default() -> Self {
        // The default field section is contiguous by construction.
        Self::from_config(&FieldSection::default()).unwrap_or_else(|_| Self::new(Vec::new()))
    }
}
