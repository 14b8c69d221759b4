//! Sensor interfaces the host provides to the perception stack

use crate::common::Rotation2d;
use crate::perception::odometry::OdometrySample;
use crate::perception::vision::VisionFrame;

/// The drive subsystem: gyro plus four module encoders
pub trait DriveSensors: Send {
    /// Get the sensor name
    fn name(&self) -> &str;

    /// Latest gyro yaw and module positions, stamped with the read time
    fn sample(&mut self) -> OdometrySample;

    /// Body pitch, nose up positive
    fn pitch(&self) -> Rotation2d;
}

/// A fiducial camera pipeline, polled once per tick
pub trait Camera: Send {
    /// Get the sensor name
    fn name(&self) -> &str;

    /// Most recent pipeline result; repeats its timestamp until a new frame
    /// is processed
    fn latest_frame(&mut self) -> VisionFrame;
}
