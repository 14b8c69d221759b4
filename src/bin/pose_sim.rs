//! Closed-loop simulation of a swerve robot driving a circle in front of two
//! fiducial landmarks, then leveling itself on a tilted platform.
//!
//! Usage: pose_sim [config.yaml] [seconds]

use anyhow::{anyhow, Context, Result};
use std::f64::consts::PI;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use swerve_pose_core::common::{ModuleId, ModuleMap, Pose2D, Pose3D, Rotation2d, Transform3D};
use swerve_pose_core::control::kinematics::{ModulePosition, ModuleState, SwerveKinematics};
use swerve_pose_core::perception::landmarks::FieldLayout;
use swerve_pose_core::perception::observer::LoggingObserver;
use swerve_pose_core::perception::odometry::OdometrySample;
use swerve_pose_core::perception::sensors::{Camera, DriveSensors};
use swerve_pose_core::perception::vision::{TargetObservation, VisionFrame};
use swerve_pose_core::{LocalizationConfig, SwervePoseCore};
use tokio::time::MissedTickBehavior;

const DEFAULT_CONFIG: &str = "config/localization.yaml";
const DEFAULT_DURATION_SECS: f64 = 10.0;

// Front-left encoder over-reports travel by this factor.
const ENCODER_SCALE_ERROR: f64 = 1.02;
const GYRO_MOUNT_OFFSET: f64 = PI;

const CAPTURE_EVERY_TICKS: u64 = 10;
const PIPELINE_LATENCY_TICKS: u64 = 3;
const AMBIGUITY_NEAR: f64 = 0.05;
const AMBIGUITY_FAR: f64 = 0.3;
const FAR_RANGE: f64 = 3.0;

const CIRCLE_CENTER: (f64, f64) = (1.0, 0.6);
const CIRCLE_RADIUS: f64 = 0.5;
const CIRCLE_RATE: f64 = 0.6;

const BALANCE_START_PITCH_DEG: f64 = 15.0;
const BALANCE_PITCH_PER_METER_DEG: f64 = 60.0;
const BALANCE_MAX_TICKS: u64 = 1000;

/// Ground-truth drive base with imperfect encoders
struct SimulatedDrive {
    kinematics: SwerveKinematics,
    truth: Pose2D,
    positions: ModuleMap<ModulePosition>,
    pitch_deg: f64,
    pitch_per_meter_deg: f64,
    timestamp: f64,
}

impl SimulatedDrive {
    fn new(kinematics: SwerveKinematics, truth: Pose2D) -> Self {
        SimulatedDrive {
            kinematics,
            truth,
            positions: ModuleMap::default(),
            pitch_deg: 0.0,
            pitch_per_meter_deg: 0.0,
            timestamp: 0.0,
        }
    }

    /// Advance the true pose by one period of module commands
    fn step(&mut self, states: &ModuleMap<ModuleState>, period: f64, timestamp: f64) {
        let deltas = states.map(|_, state| ModulePosition::new(state.speed * period, state.angle));
        let twist = self.kinematics.to_twist(&deltas);
        self.truth = self.truth.exp(&twist);
        self.pitch_deg += self.pitch_per_meter_deg * twist.dx;

        for (id, position) in self.positions.iter_mut() {
            let scale = if id == ModuleId::FrontLeft { ENCODER_SCALE_ERROR } else { 1.0 };
            position.distance += deltas[id].distance * scale;
            position.angle = deltas[id].angle;
        }
        self.timestamp = timestamp;
    }

    fn start_tilt(&mut self, pitch_deg: f64, pitch_per_meter_deg: f64) {
        self.pitch_deg = pitch_deg;
        self.pitch_per_meter_deg = pitch_per_meter_deg;
    }
}

impl DriveSensors for SimulatedDrive {
    fn name(&self) -> &str {
        "simulated_drive"
    }

    fn sample(&mut self) -> OdometrySample {
        let gyro = self
            .truth
            .rotation
            .rotate_by(Rotation2d::from_radians(GYRO_MOUNT_OFFSET));
        OdometrySample::new(self.timestamp, gyro, self.positions)
    }

    fn pitch(&self) -> Rotation2d {
        Rotation2d::from_degrees(self.pitch_deg)
    }
}

/// Camera pipeline with a fixed capture rate and processing delay
struct SimulatedCamera {
    field: Arc<FieldLayout>,
    body_to_camera: Transform3D,
    pending: Option<(u64, VisionFrame)>,
    latest: VisionFrame,
}

impl SimulatedCamera {
    fn new(field: Arc<FieldLayout>, camera_to_body: &Transform3D) -> Self {
        SimulatedCamera {
            field,
            body_to_camera: camera_to_body.inverse(),
            pending: None,
            latest: VisionFrame::no_target(0.0),
        }
    }

    /// Capture and release frames for this tick
    fn observe(&mut self, tick: u64, timestamp: f64, truth: &Pose2D) {
        if let Some((release_tick, frame)) = self.pending {
            if release_tick <= tick {
                self.latest = frame;
                self.pending = None;
            }
        }

        if tick % CAPTURE_EVERY_TICKS == 0 {
            let frame = self.capture(timestamp, truth);
            self.pending = Some((tick + PIPELINE_LATENCY_TICKS, frame));
        }
    }

    fn capture(&self, timestamp: f64, truth: &Pose2D) -> VisionFrame {
        let camera_pose = Pose3D::from_pose2d(truth).transform_by(&self.body_to_camera);

        let nearest = self
            .field
            .iter()
            .map(|landmark| (landmark.id, landmark.pose.relative_to(&camera_pose)))
            .filter(|(_, camera_to_target)| camera_to_target.translation().x > 0.0)
            .min_by(|(_, a), (_, b)| a.translation().norm().total_cmp(&b.translation().norm()));

        match nearest {
            Some((id, camera_to_target)) => {
                let range = camera_to_target.translation().norm();
                let ambiguity = if range > FAR_RANGE {
                    AMBIGUITY_FAR
                } else {
                    AMBIGUITY_NEAR
                };
                VisionFrame::new(
                    timestamp,
                    TargetObservation {
                        landmark_id: id as i32,
                        ambiguity,
                        camera_to_target,
                    },
                )
            }
            None => VisionFrame::no_target(timestamp),
        }
    }
}

impl Camera for SimulatedCamera {
    fn name(&self) -> &str {
        "simulated_camera"
    }

    fn latest_frame(&mut self) -> VisionFrame {
        self.latest
    }
}

fn load_config(path: &Path) -> Result<LocalizationConfig> {
    if !path.exists() {
        log::warn!("{} not found, using built-in defaults", path.display());
        return Ok(LocalizationConfig::default());
    }
    LocalizationConfig::load(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let config_path = args.get(1).map_or(DEFAULT_CONFIG, String::as_str);
    let duration_secs = match args.get(2) {
        Some(arg) => arg
            .parse::<f64>()
            .with_context(|| format!("Invalid duration {:?}", arg))?,
        None => DEFAULT_DURATION_SECS,
    };

    let config = load_config(Path::new(config_path))?;
    let period = config.balance.period_secs;
    let kinematics =
        SwerveKinematics::from_config(&config.drive).context("Invalid module offsets")?;
    let camera_to_body = config.camera.camera_to_body.to_transform();

    log::info!("Initializing swerve pose core...");
    let mut core = SwervePoseCore::from_config(config).context("Failed to build core")?;
    core.init().context("Failed to initialize core")?;

    let start = Pose2D::from_degrees(CIRCLE_CENTER.0 + CIRCLE_RADIUS, CIRCLE_CENTER.1, 0.0);
    let (control, perception) = core
        .stacks_mut()
        .ok_or_else(|| anyhow!("Core is missing a stack"))?;
    perception.add_observer(Box::new(LoggingObserver::default()));
    // Seed the estimate off the true start so vision has something to fix.
    perception.set_current_pose(Pose2D::from_degrees(start.x - 0.3, start.y - 0.2, 5.0));

    let mut drive = SimulatedDrive::new(kinematics, start);
    let mut camera = SimulatedCamera::new(perception.field(), &camera_to_body);
    log::info!("Polling {} and {}", drive.name(), camera.name());

    let mut interval = tokio::time::interval(Duration::from_secs_f64(period));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let drive_ticks = (duration_secs / period).round() as u64;
    let mut tick: u64 = 0;
    let mut applied = 0usize;
    let mut interrupted = false;

    log::info!("Driving a circle for {:.1} s", duration_secs);
    while tick < drive_ticks {
        tokio::select! {
            _ = interval.tick() => {}
            _ = &mut shutdown => {
                log::info!("Interrupted, shutting down");
                interrupted = true;
                break;
            }
        }

        let t = tick as f64 * period;
        let phase = CIRCLE_RATE * t;
        let translation = (
            -CIRCLE_RADIUS * CIRCLE_RATE * phase.sin(),
            CIRCLE_RADIUS * CIRCLE_RATE * phase.cos(),
        );
        let heading = perception.current_pose().rotation;
        let states = control.drive(translation, 0.0, true, heading);

        tick += 1;
        let now = tick as f64 * period;
        drive.step(&states, period, now);
        camera.observe(tick, now, &drive.truth);

        let report = perception
            .poll(&mut drive, &mut camera)
            .context("Perception tick failed")?;
        if report.vision.is_applied() {
            applied += 1;
        }
    }

    log::info!(
        "Circle done: estimate {} truth {} ({} vision updates applied)",
        perception.current_pose(),
        drive.truth,
        applied
    );

    if !interrupted {
        log::info!(
            "Leveling from {:.1} degrees of pitch",
            BALANCE_START_PITCH_DEG
        );
        control.reset_balance();
        drive.start_tilt(BALANCE_START_PITCH_DEG, BALANCE_PITCH_PER_METER_DEG);

        let mut balance_ticks = 0;
        while !control.balance_finished() && balance_ticks < BALANCE_MAX_TICKS {
            tokio::select! {
                _ = interval.tick() => {}
                _ = &mut shutdown => {
                    log::info!("Interrupted, shutting down");
                    break;
                }
            }

            let states = control.balance(drive.pitch());
            tick += 1;
            balance_ticks += 1;
            let now = tick as f64 * period;
            drive.step(&states, period, now);
            camera.observe(tick, now, &drive.truth);
            perception
                .poll(&mut drive, &mut camera)
                .context("Perception tick failed")?;
        }

        if control.balance_finished() {
            log::info!(
                "Level after {} ticks, pitch {:.2} degrees",
                balance_ticks,
                drive.pitch().degrees()
            );
        } else {
            log::warn!(
                "Still {:.2} degrees off level after {} ticks",
                drive.pitch().degrees(),
                balance_ticks
            );
        }
    }

    let estimate = perception.current_pose();
    log::info!(
        "Final estimate {} truth {} error {:.3} m",
        estimate,
        drive.truth,
        (estimate.x - drive.truth.x).hypot(estimate.y - drive.truth.y)
    );

    core.shutdown().context("Failed to shut down core")?;
    log::info!("Core shutdown successfully!");
    Ok(())
}
