//! Self-leveling on a tilting platform
//!
//! Drives straight forward or back with a PID on body pitch until the
//! platform has read level for a number of consecutive ticks.

use crate::common::geometry::input_modulus;
use crate::common::Rotation2d;
use crate::config::BalanceSection;
use crate::control::controllers::PidController;
use crate::control::kinematics::ChassisSpeeds;

/// Robot-relative pitch leveling behavior
#[derive(Debug, Clone)]
pub struct AutoBalance {
    pid: PidController,
    settle_ticks: u32,
    output_scale: f64,
    level_ticks: u32,
}

impl AutoBalance {
    pub fn new(balance: &BalanceSection) -> Self {
        let [kp, ki, kd] = balance.gains;
        let mut pid = PidController::new(kp, ki, kd, balance.period_secs);
        pid.set_setpoint(0.0);
        pid.set_tolerance(balance.tolerance_deg);

        AutoBalance {
            pid,
            settle_ticks: balance.settle_ticks,
            output_scale: balance.output_scale,
            level_ticks: 0,
        }
    }

    /// One control step: robot-relative speeds for the current pitch.
    pub fn execute(&mut self, pitch: Rotation2d) -> ChassisSpeeds {
        let pitch_deg = input_modulus(pitch.degrees(), -180.0, 180.0);
        let output = self.pid.calculate(pitch_deg);

        if self.pid.at_setpoint() {
            self.level_ticks += 1;
        } else {
            self.level_ticks = 0;
        }

        ChassisSpeeds::new(output * self.output_scale, 0.0, 0.0)
    }

    pub fn is_finished(&self) -> bool {
        self.level_ticks >= self.settle_ticks
    }

    pub fn reset(&mut self) {
        self.pid.reset();
        self.level_ticks = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_drives_against_tilt() {
        let mut balance = AutoBalance::new(&BalanceSection::default());
        let speeds = balance.execute(Rotation2d::from_degrees(10.0));
        assert!(speeds.vx < 0.0);
        assert_relative_eq!(speeds.vy, 0.0);
        assert_relative_eq!(speeds.omega, 0.0);
        assert!(!balance.is_finished());
    }

    #[test]
    fn test_finishes_after_settle_ticks() {
        let mut balance = AutoBalance::new(&BalanceSection::default());
        for _ in 0..9 {
            balance.execute(Rotation2d::from_degrees(1.0));
            assert!(!balance.is_finished());
        }
        balance.execute(Rotation2d::from_degrees(1.0));
        assert!(balance.is_finished());
    }

    #[test]
    fn test_leaving_tolerance_restarts_count() {
        let mut balance = AutoBalance::new(&BalanceSection::default());
        for _ in 0..9 {
            balance.execute(Rotation2d::from_degrees(0.5));
        }
        balance.execute(Rotation2d::from_degrees(8.0));
        balance.execute(Rotation2d::from_degrees(0.5));
        assert!(!balance.is_finished());
    }
}
