//! Common utilities and types for the swerve pose core

pub mod geometry;
pub mod module;

pub use geometry::{Pose2D, Pose3D, Rotation2d, Transform2D, Transform3D, Twist2d};
pub use module::{ModuleId, ModuleMap};
