//! Planar and spatial geometry for the field, body, wheel and camera frames.
//!
//! Conventions: x forward, y left, counter-clockwise positive rotation.
//! All lengths are meters, all stored angles are radians.

use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
use std::f64::consts::{PI, TAU};
use std::fmt;

/// Threshold below which the series expansions of `exp`/`log` are used.
const SMALL_ANGLE: f64 = 1e-9;

/// Wrap an angle into (-π, π].
///
/// Angles already inside the range are returned untouched so that exact
/// values survive a round trip.
pub fn normalize_angle(angle: f64) -> f64 {
    if !angle.is_finite() || (angle > -PI && angle <= PI) {
        return angle;
    }
    let wrapped = PI - (PI - angle).rem_euclid(TAU);
    // rem_euclid can round up to TAU just above π.
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

/// Wrap `value` into `[min, max)`.
pub fn input_modulus(value: f64, min: f64, max: f64) -> f64 {
    let span = max - min;
    min + (value - min).rem_euclid(span)
}

/// A planar rotation, normalized to (-π, π].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rotation2d {
    radians: f64,
}

impl Rotation2d {
    pub fn from_radians(radians: f64) -> Self {
        Rotation2d {
            radians: normalize_angle(radians),
        }
    }

    pub fn from_degrees(degrees: f64) -> Self {
        Self::from_radians(degrees.to_radians())
    }

    pub fn radians(&self) -> f64 {
        self.radians
    }

    pub fn degrees(&self) -> f64 {
        self.radians.to_degrees()
    }

    pub fn sin(&self) -> f64 {
        self.radians.sin()
    }

    pub fn cos(&self) -> f64 {
        self.radians.cos()
    }

    /// Sum of the two rotations.
    pub fn rotate_by(&self, other: Rotation2d) -> Rotation2d {
        Rotation2d::from_radians(self.radians + other.radians)
    }

    /// Difference `self - other`.
    pub fn minus(&self, other: Rotation2d) -> Rotation2d {
        Rotation2d::from_radians(self.radians - other.radians)
    }

    pub fn inverse(&self) -> Rotation2d {
        Rotation2d::from_radians(-self.radians)
    }
}

/// A body-frame displacement along an arc: forward, strafe and rotation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Twist2d {
    pub dx: f64,
    pub dy: f64,
    pub dtheta: f64,
}

impl Twist2d {
    pub fn new(dx: f64, dy: f64, dtheta: f64) -> Self {
        Twist2d { dx, dy, dtheta }
    }

    /// Scale each axis by its own gain.
    pub fn scaled(&self, gains: [f64; 3]) -> Twist2d {
        Twist2d {
            dx: self.dx * gains[0],
            dy: self.dy * gains[1],
            dtheta: self.dtheta * gains[2],
        }
    }
}

/// A rigid offset between two planar frames.
///
/// `a.transform_by(&t) == b` when `t` is the transform from frame `a` to `b`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Transform2D {
    pub x: f64,
    pub y: f64,
    pub rotation: Rotation2d,
}

impl Transform2D {
    pub fn new(x: f64, y: f64, rotation: Rotation2d) -> Self {
        Transform2D { x, y, rotation }
    }

    /// The transform that maps pose `from` onto pose `to`.
    pub fn between(from: &Pose2D, to: &Pose2D) -> Transform2D {
        to.relative_to(from)
    }

    /// Inverse transform; applying `t` then `t.inverse()` is the identity.
    pub fn inverse(&self) -> Transform2D {
        let (s, c) = (self.rotation.sin(), self.rotation.cos());
        Transform2D {
            x: -self.x * c - self.y * s,
            y: self.x * s - self.y * c,
            rotation: self.rotation.inverse(),
        }
    }
}

/// Robot pose on the field: position in meters and heading.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose2D {
    pub x: f64,
    pub y: f64,
    pub rotation: Rotation2d,
}

impl Pose2D {
    pub fn new(x: f64, y: f64, rotation: Rotation2d) -> Self {
        Pose2D { x, y, rotation }
    }

    /// Convenience constructor with heading in degrees.
    pub fn from_degrees(x: f64, y: f64, heading_degrees: f64) -> Self {
        Pose2D::new(x, y, Rotation2d::from_degrees(heading_degrees))
    }

    pub fn heading(&self) -> Rotation2d {
        self.rotation
    }

    /// Apply `transform`, expressed in this pose's frame.
    pub fn transform_by(&self, transform: &Transform2D) -> Pose2D {
        let (s, c) = (self.rotation.sin(), self.rotation.cos());
        Pose2D {
            x: self.x + transform.x * c - transform.y * s,
            y: self.y + transform.x * s + transform.y * c,
            rotation: self.rotation.rotate_by(transform.rotation),
        }
    }

    /// This pose expressed in the frame of `origin`.
    pub fn relative_to(&self, origin: &Pose2D) -> Transform2D {
        let (s, c) = (origin.rotation.sin(), origin.rotation.cos());
        let dx = self.x - origin.x;
        let dy = self.y - origin.y;
        Transform2D {
            x: dx * c + dy * s,
            y: -dx * s + dy * c,
            rotation: self.rotation.minus(origin.rotation),
        }
    }

    /// Follow a constant-curvature arc described by `twist` from this pose.
    pub fn exp(&self, twist: &Twist2d) -> Pose2D {
        let theta = twist.dtheta;
        let (sin_over_theta, one_minus_cos_over_theta) = if theta.abs() < SMALL_ANGLE {
            (1.0 - theta * theta / 6.0, 0.5 * theta)
        } else {
            (theta.sin() / theta, (1.0 - theta.cos()) / theta)
        };

        let step = Transform2D {
            x: twist.dx * sin_over_theta - twist.dy * one_minus_cos_over_theta,
            y: twist.dx * one_minus_cos_over_theta + twist.dy * sin_over_theta,
            rotation: Rotation2d::from_radians(theta),
        };
        self.transform_by(&step)
    }

    /// The twist that takes this pose to `end`; inverse of [`Pose2D::exp`].
    pub fn log(&self, end: &Pose2D) -> Twist2d {
        let transform = end.relative_to(self);
        let dtheta = transform.rotation.radians();
        let half_dtheta = 0.5 * dtheta;
        let cos_minus_one = transform.rotation.cos() - 1.0;

        let half_theta_by_tan = if cos_minus_one.abs() < SMALL_ANGLE {
            1.0 - dtheta * dtheta / 12.0
        } else {
            -(half_dtheta * transform.rotation.sin()) / cos_minus_one
        };

        Twist2d {
            dx: transform.x * half_theta_by_tan + transform.y * half_dtheta,
            dy: transform.y * half_theta_by_tan - transform.x * half_dtheta,
            dtheta,
        }
    }

    /// Interpolate along the arc from this pose to `end`, `t` in [0, 1].
    pub fn interpolate(&self, end: &Pose2D, t: f64) -> Pose2D {
        if t <= 0.0 {
            *self
        } else if t >= 1.0 {
            *end
        } else {
            self.exp(&self.log(end).scaled([t; 3]))
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.rotation.radians().is_finite()
    }
}

impl fmt::Display for Pose2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:.2}, {:.2}) {:.2} degrees",
            self.x,
            self.y,
            self.rotation.degrees()
        )
    }
}

/// A rigid offset between two spatial frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform3D {
    isometry: Isometry3<f64>,
}

impl Transform3D {
    /// Build from a translation and roll/pitch/yaw in radians.
    pub fn new(x: f64, y: f64, z: f64, roll: f64, pitch: f64, yaw: f64) -> Self {
        Transform3D {
            isometry: Isometry3::from_parts(
                Translation3::new(x, y, z),
                UnitQuaternion::from_euler_angles(roll, pitch, yaw),
            ),
        }
    }

    pub fn identity() -> Self {
        Transform3D {
            isometry: Isometry3::identity(),
        }
    }

    pub fn from_isometry(isometry: Isometry3<f64>) -> Self {
        Transform3D { isometry }
    }

    pub fn isometry(&self) -> &Isometry3<f64> {
        &self.isometry
    }

    pub fn translation(&self) -> Vector3<f64> {
        self.isometry.translation.vector
    }

    pub fn inverse(&self) -> Transform3D {
        Transform3D {
            isometry: self.isometry.inverse(),
        }
    }
}

impl Default for Transform3D {
    fn default() -> Self {
        Self::identity()
    }
}

/// A pose in the field's 3D frame, used for landmarks and the camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose3D {
    isometry: Isometry3<f64>,
}

impl Pose3D {
    /// Build from a position and roll/pitch/yaw in radians.
    pub fn new(x: f64, y: f64, z: f64, roll: f64, pitch: f64, yaw: f64) -> Self {
        Pose3D {
            isometry: Isometry3::from_parts(
                Translation3::new(x, y, z),
                UnitQuaternion::from_euler_angles(roll, pitch, yaw),
            ),
        }
    }

    /// Lift a planar pose onto the floor (z = 0, level).
    pub fn from_pose2d(pose: &Pose2D) -> Self {
        Pose3D::new(pose.x, pose.y, 0.0, 0.0, 0.0, pose.rotation.radians())
    }

    pub fn x(&self) -> f64 {
        self.isometry.translation.x
    }

    pub fn y(&self) -> f64 {
        self.isometry.translation.y
    }

    pub fn z(&self) -> f64 {
        self.isometry.translation.z
    }

    pub fn rotation(&self) -> UnitQuaternion<f64> {
        self.isometry.rotation
    }

    pub fn transform_by(&self, transform: &Transform3D) -> Pose3D {
        Pose3D {
            isometry: self.isometry * transform.isometry,
        }
    }

    /// This pose expressed in the frame of `origin`.
    pub fn relative_to(&self, origin: &Pose3D) -> Transform3D {
        Transform3D::from_isometry(origin.isometry.inverse() * self.isometry)
    }

    /// Collapse to the field plane: drop z, roll and pitch.
    pub fn to_pose2d(&self) -> Pose2D {
        let (_, _, yaw) = self.isometry.rotation.euler_angles();
        Pose2D::new(self.x(), self.y(), Rotation2d::from_radians(yaw))
    }
}
