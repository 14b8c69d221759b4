//! Controllers for the robot

/// A fixed-period PID controller
#[derive(Debug, Clone)]
pub struct PidController {
    kp: f64,
    ki: f64,
    kd: f64,
    period: f64,
    setpoint: f64,
    tolerance: f64,
    // Bounds on ki * integral
    integrator_range: (f64, f64),
    position_error: f64,
    previous_error: f64,
    total_error: f64,
    has_measurement: bool,
}

impl PidController {
    /// Create a new controller running every `period` seconds
    pub fn new(kp: f64, ki: f64, kd: f64, period: f64) -> Self {
        PidController {
            kp,
            ki,
            kd,
            period,
            setpoint: 0.0,
            tolerance: 0.05,
            integrator_range: (-1.0, 1.0),
            position_error: 0.0,
            previous_error: 0.0,
            total_error: 0.0,
            has_measurement: false,
        }
    }

    pub fn set_setpoint(&mut self, setpoint: f64) {
        self.setpoint = setpoint;
    }

    pub fn setpoint(&self) -> f64 {
        self.setpoint
    }

    pub fn set_tolerance(&mut self, tolerance: f64) {
        self.tolerance = tolerance;
    }

    /// Compute the control output for a new measurement
    pub fn calculate(&mut self, measurement: f64) -> f64 {
        self.previous_error = self.position_error;
        self.position_error = self.setpoint - measurement;
        let velocity_error = if self.has_measurement {
            (self.position_error - self.previous_error) / self.period
        } else {
            0.0
        };
        self.has_measurement = true;

        if self.ki != 0.0 {
            let (min, max) = self.integrator_range;
            self.total_error = (self.total_error + self.position_error * self.period)
                .clamp(min / self.ki, max / self.ki);
        }

        self.kp * self.position_error + self.ki * self.total_error + self.kd * velocity_error
    }

    /// Whether the last measurement was within tolerance of the setpoint
    pub fn at_setpoint(&self) -> bool {
        self.has_measurement && self.position_error.abs() < self.tolerance
    }

    /// Clear accumulated error
    pub fn reset(&mut self) {
        self.position_error = 0.0;
        self.previous_error = 0.0;
        self.total_error = 0.0;
        self.has_measurement = false;
    }
}
