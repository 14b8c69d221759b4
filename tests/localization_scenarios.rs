use approx::assert_relative_eq;
use std::f64::consts::PI;
use std::sync::Arc;
use swerve_pose_core::common::{ModuleId, ModuleMap, Pose2D, Rotation2d, Transform3D, Twist2d};
use swerve_pose_core::config::FusionSection;
use swerve_pose_core::control::kinematics::{ChassisSpeeds, ModulePosition, SwerveKinematics};
use swerve_pose_core::control::ControlStack;
use swerve_pose_core::lifecycle::{LifecycleNode, State};
use swerve_pose_core::perception::landmarks::FieldLayout;
use swerve_pose_core::perception::vision::{TargetObservation, VisionFilter};
use swerve_pose_core::perception::odometry::OdometrySample;
use swerve_pose_core::{
    CoreError, LocalizationConfig, PoseEstimator, Rejection, SwervePoseCore, VisionFrame,
    VisionUpdate,
};

const PERIOD: f64 = 0.02;

fn straight_sample(t: f64, gyro_deg: f64, distance: f64) -> OdometrySample {
    OdometrySample::new(
        t,
        Rotation2d::from_degrees(gyro_deg),
        ModuleMap::from_fn(|_| ModulePosition::new(distance, Rotation2d::default())),
    )
}

/// Camera 1 m in front of landmark 0 and facing it
fn landmark_zero_frame(t: f64, ambiguity: f64) -> VisionFrame {
    VisionFrame::new(
        t,
        TargetObservation {
            landmark_id: 0,
            ambiguity,
            camera_to_target: Transform3D::new(1.0, 0.0, 0.452, 0.0, 0.0, PI),
        },
    )
}

fn estimator(fusion: &FusionSection, initial: Pose2D, baseline: &OdometrySample) -> PoseEstimator {
    let config = LocalizationConfig::default();
    let kinematics = SwerveKinematics::from_config(&config.drive).unwrap();
    let field = Arc::new(FieldLayout::from_config(&config.field).unwrap());
    let filter = VisionFilter::from_config(field, &config.camera);
    PoseEstimator::new(kinematics, filter, fusion, initial, baseline).unwrap()
}

fn snapping_fusion() -> FusionSection {
    FusionSection {
        vision_std_devs: [0.0; 3],
        ..FusionSection::default()
    }
}

#[test]
fn test_full_tick_flow_through_core() {
    let mut config = LocalizationConfig::default();
    config.fusion.vision_std_devs = [0.0; 3];

    let mut core = SwervePoseCore::from_config(config).unwrap();
    core.init().unwrap();

    let perception = core.perception_stack_mut().unwrap();
    assert_eq!(perception.state(), State::Active);
    perception.set_current_pose(Pose2D::from_degrees(1.0, 1.0, 0.0));

    let report = perception
        .tick(&straight_sample(0.0, 0.0, 0.0), &VisionFrame::no_target(0.0))
        .unwrap();
    assert_eq!(report.vision, VisionUpdate::Rejected(Rejection::NoTarget));
    assert_eq!(report.pose, Pose2D::from_degrees(1.0, 1.0, 0.0));

    let report = perception
        .tick(&straight_sample(PERIOD, 0.0, 0.1), &VisionFrame::no_target(0.0))
        .unwrap();
    assert_relative_eq!(report.pose.x, 1.1, epsilon = 1e-9);
    assert_relative_eq!(report.pose.y, 1.0, epsilon = 1e-9);

    let report = perception
        .tick(
            &straight_sample(2.0 * PERIOD, 0.0, 0.1),
            &landmark_zero_frame(2.0 * PERIOD, 0.05),
        )
        .unwrap();
    assert!(report.vision.is_applied());
    assert_relative_eq!(report.pose.x, 2.0, epsilon = 1e-9);
    assert_relative_eq!(report.pose.y, 1.165, epsilon = 1e-9);
    assert_relative_eq!(report.pose.rotation.radians(), 0.0, epsilon = 1e-9);

    core.shutdown().unwrap();
    let perception = core.perception_stack_mut().unwrap();
    assert_eq!(perception.state(), State::Unconfigured);
    assert!(matches!(
        perception.tick(&straight_sample(1.0, 0.0, 0.1), &VisionFrame::no_target(1.0)),
        Err(CoreError::Inactive(_))
    ));
}

#[test]
fn test_landmark_scenario_candidate() {
    let filter = VisionFilter::from_config(
        Arc::new(FieldLayout::default()),
        &LocalizationConfig::default().camera,
    );
    let candidate = filter.accept(&landmark_zero_frame(1.0, 0.05), None).unwrap();

    assert_eq!(candidate.landmark_id, 0);
    assert_relative_eq!(candidate.pose.x, 2.0, epsilon = 1e-9);
    assert_relative_eq!(candidate.pose.y, 1.165, epsilon = 1e-9);
    assert_relative_eq!(candidate.pose.rotation.radians(), 0.0, epsilon = 1e-9);
}

#[test]
fn test_duplicate_frame_changes_state_once() {
    let baseline = straight_sample(0.0, 0.0, 0.0);
    let mut estimator = estimator(&FusionSection::default(), Pose2D::default(), &baseline);
    estimator
        .integrate_odometry(&straight_sample(PERIOD, 0.0, 0.0))
        .unwrap();

    let frame = landmark_zero_frame(PERIOD, 0.05);
    assert!(estimator.try_integrate_vision(&frame).is_applied());
    let after_first = estimator.current_pose();
    assert_eq!(estimator.last_vision_timestamp(), Some(PERIOD));

    assert_eq!(
        estimator.try_integrate_vision(&frame),
        VisionUpdate::Rejected(Rejection::Duplicate)
    );
    assert_eq!(estimator.current_pose(), after_first);
    assert_eq!(estimator.last_vision_timestamp(), Some(PERIOD));
}

#[test]
fn test_hard_reset_is_exact() {
    let baseline = straight_sample(0.0, 37.0, 0.0);
    let mut estimator = estimator(
        &FusionSection::default(),
        Pose2D::from_degrees(1.0, 2.0, 30.0),
        &baseline,
    );
    let moved = straight_sample(PERIOD, 41.0, 0.3);
    estimator.integrate_odometry(&moved).unwrap();

    estimator.set_current_pose(Pose2D::from_degrees(0.0, 0.0, 0.0));
    assert_eq!(estimator.current_pose(), Pose2D::default());

    let still = straight_sample(2.0 * PERIOD, 41.0, 0.3);
    let pose = estimator.integrate_odometry(&still).unwrap();
    assert_eq!(pose, Pose2D::default());
    assert_eq!(estimator.current_pose(), Pose2D::default());
}

#[test]
fn test_rejection_ordering() {
    let filter = VisionFilter::new(Arc::new(FieldLayout::default()), Transform3D::identity(), 0.2);

    // Duplicate wins over no target.
    assert_eq!(
        filter.accept(&VisionFrame::no_target(3.0), Some(3.0)),
        Err(Rejection::Duplicate)
    );
    assert_eq!(
        filter.accept(&VisionFrame::no_target(3.0), Some(2.0)),
        Err(Rejection::NoTarget)
    );

    assert!(filter.accept(&landmark_zero_frame(3.0, 0.2), None).is_ok());
    assert!(matches!(
        filter.accept(&landmark_zero_frame(3.0, 0.2001), None),
        Err(Rejection::Ambiguous { .. })
    ));
    assert!(matches!(
        filter.accept(&landmark_zero_frame(3.0, f64::NAN), None),
        Err(Rejection::Ambiguous { .. })
    ));

    let mut bad_geometry = landmark_zero_frame(3.0, 0.05);
    if let Some(target) = bad_geometry.target.as_mut() {
        target.camera_to_target = Transform3D::new(f64::NAN, 0.0, 0.452, 0.0, 0.0, PI);
    }
    assert_eq!(filter.accept(&bad_geometry, None), Err(Rejection::NonFinite));

    for id in [-1, 2, 99] {
        let mut frame = landmark_zero_frame(3.0, 0.05);
        if let Some(target) = frame.target.as_mut() {
            target.landmark_id = id;
        }
        assert_eq!(
            filter.accept(&frame, None),
            Err(Rejection::UnknownLandmark { id })
        );
    }
}

#[test]
fn test_odometry_matches_closed_form_arc() {
    let config = LocalizationConfig::default();
    let kinematics = SwerveKinematics::from_config(&config.drive).unwrap();
    let (v, omega) = (1.0, 0.5);
    let states = kinematics.to_module_states(&ChassisSpeeds::new(v, 0.0, omega));

    let baseline = straight_sample(0.0, 0.0, 0.0);
    let mut estimator = estimator(&FusionSection::default(), Pose2D::default(), &baseline);

    let mut distances = ModuleMap::<f64>::default();
    let steps = 50;
    for step in 1..=steps {
        for (id, distance) in distances.iter_mut() {
            *distance += states[id].speed * PERIOD;
        }
        let t = step as f64 * PERIOD;
        let sample = OdometrySample::new(
            t,
            Rotation2d::from_radians(omega * t),
            distances.map(|id, distance| ModulePosition::new(*distance, states[id].angle)),
        );
        estimator.integrate_odometry(&sample).unwrap();
    }

    let duration = steps as f64 * PERIOD;
    let expected = Pose2D::default().exp(&Twist2d::new(v * duration, 0.0, omega * duration));
    let pose = estimator.current_pose();
    assert_relative_eq!(pose.x, expected.x, epsilon = 1e-6);
    assert_relative_eq!(pose.y, expected.y, epsilon = 1e-6);
    assert_relative_eq!(pose.rotation.radians(), omega * duration, epsilon = 1e-9);
}

#[test]
fn test_zero_motion_without_vision_holds_pose() {
    let baseline = straight_sample(0.0, -90.0, 2.0);
    let start = Pose2D::from_degrees(4.0, -1.0, 135.0);
    let mut estimator = estimator(&FusionSection::default(), start, &baseline);

    for step in 1..=100 {
        let pose = estimator
            .integrate_odometry(&straight_sample(step as f64 * PERIOD, -90.0, 2.0))
            .unwrap();
        assert_eq!(pose.x, start.x);
        assert_eq!(pose.y, start.y);
        assert_relative_eq!(pose.rotation.radians(), start.rotation.radians(), epsilon = 1e-12);
    }
}

#[test]
fn test_non_finite_frame_does_not_poison_later_ticks() {
    let baseline = straight_sample(0.0, 0.0, 0.0);
    let mut estimator = estimator(&snapping_fusion(), Pose2D::default(), &baseline);
    estimator
        .integrate_odometry(&straight_sample(PERIOD, 0.0, 0.1))
        .unwrap();

    let mut frame = landmark_zero_frame(PERIOD, 0.05);
    if let Some(target) = frame.target.as_mut() {
        target.camera_to_target = Transform3D::new(f64::NAN, 0.0, 0.452, 0.0, 0.0, PI);
    }
    assert_eq!(
        estimator.try_integrate_vision(&frame),
        VisionUpdate::Rejected(Rejection::NonFinite)
    );

    for step in 2..=4 {
        estimator
            .integrate_odometry(&straight_sample(step as f64 * PERIOD, 0.0, 0.1 * step as f64))
            .unwrap();
    }
    let pose = estimator.current_pose();
    assert!(pose.is_finite());
    assert_relative_eq!(pose.x, 0.4, epsilon = 1e-9);

    // A good frame afterwards is still accepted.
    let update = estimator.try_integrate_vision(&landmark_zero_frame(4.0 * PERIOD, 0.05));
    assert!(update.is_applied());
    assert_relative_eq!(estimator.current_pose().x, 2.0, epsilon = 1e-9);
}

#[test]
fn test_latency_compensated_snap() {
    let baseline = straight_sample(0.0, 0.0, 0.0);
    let mut estimator = estimator(&snapping_fusion(), Pose2D::default(), &baseline);

    // 0.1 m per tick along +x; the frame is captured at t = 0.02 and arrives
    // two ticks later.
    for step in 1..=3 {
        estimator
            .integrate_odometry(&straight_sample(step as f64 * PERIOD, 0.0, 0.1 * step as f64))
            .unwrap();
    }
    let update = estimator.try_integrate_vision(&landmark_zero_frame(PERIOD, 0.05));
    assert!(update.is_applied());

    let pose = estimator.current_pose();
    assert_relative_eq!(pose.x, 2.2, epsilon = 1e-9);
    assert_relative_eq!(pose.y, 1.165, epsilon = 1e-9);
}

#[test]
fn test_desaturation_scales_uniformly() {
    let config = LocalizationConfig::default();
    let kinematics = SwerveKinematics::from_config(&config.drive).unwrap();
    let raw = kinematics.to_module_states(&ChassisSpeeds::new(4.0, 1.0, 6.0));
    let mut limited = raw;

    let factor = SwerveKinematics::desaturate(&mut limited, config.drive.max_module_speed).unwrap();
    assert!(factor < 1.0);

    let fastest = limited.values().map(|s| s.speed).fold(0.0_f64, f64::max);
    assert_relative_eq!(fastest, config.drive.max_module_speed, epsilon = 1e-12);
    for id in ModuleId::ALL {
        assert_relative_eq!(limited[id].speed, raw[id].speed * factor, epsilon = 1e-12);
        assert_eq!(limited[id].angle, raw[id].angle);
    }
}

#[test]
fn test_control_stack_balances_against_tilt() {
    let config = LocalizationConfig::default();
    let mut control = ControlStack::new(&config).unwrap();

    // Inactive: commands are held at zero.
    let states = control.balance(Rotation2d::from_degrees(10.0));
    assert!(states.values().all(|s| s.speed == 0.0));

    control.on_configure().unwrap();
    control.on_activate().unwrap();
    control.reset_balance();

    let states = control.balance(Rotation2d::from_degrees(10.0));
    for state in states.values() {
        assert!(state.speed > 0.0);
        assert_relative_eq!(state.angle.degrees().abs(), 180.0, epsilon = 1e-9);
    }
    assert!(!control.balance_finished());

    for _ in 0..config.balance.settle_ticks {
        control.balance(Rotation2d::default());
    }
    assert!(control.balance_finished());
}

#[test]
fn test_lifecycle_rejects_out_of_order_transitions() {
    let mut control = ControlStack::new(&LocalizationConfig::default()).unwrap();
    assert!(matches!(
        control.on_activate(),
        Err(CoreError::Transition { .. })
    ));
    control.on_configure().unwrap();
    control.on_activate().unwrap();
    assert_eq!(control.state(), State::Active);
}
