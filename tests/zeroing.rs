//! Round-trip checks for the inverse solvers: an elevation they return
//! must actually put the bullet on the sight line at the asked distance.

use exterior_ballistics::{
    Ammo, DragModel, EngineConfig, Error, IntegrationMethod, Shot, TrajFlag, TrajectoryEngine,
    Weapon,
};

fn clean_shot() -> Shot {
    let weapon = Weapon::new(2.0 / 12.0, 12.0);
    let ammo = Ammo::new(DragModel::g1(0.223, 168.0, 0.308, 1.18), 2750.0);
    Shot::new(weapon, ammo)
}

fn residual_at(engine: &TrajectoryEngine, elevation_rad: f64, slant_distance_ft: f64) -> f64 {
    let mut shot = clean_shot();
    shot.relative_angle_rad = elevation_rad;
    let hit = engine
        .integrate(&shot, slant_distance_ft, slant_distance_ft, 0.0, TrajFlag::RANGE, true)
        .expect("zeroed shot reaches its own target");
    hit.rows()
        .iter()
        .find(|r| (r.distance_ft - slant_distance_ft).abs() < 1e-6)
        .expect("sample at the target distance")
        .slant_height_ft
}

#[test]
fn test_zero_round_trip_at_800_yd() {
    let engine = TrajectoryEngine::new(IntegrationMethod::RungeKutta4);
    let angle = engine
        .find_zero_angle(&clean_shot(), 2400.0, false)
        .expect("800 yd is inside reach");
    let miss_ft = residual_at(&engine, angle, 2400.0);
    assert!(miss_ft.abs() < 1e-3, "residual miss: {} ft", miss_ft);
}

#[test]
fn test_hundred_yard_zero_matches_reference_elevation() {
    // The 1000 yd reference tables carry 0.001228 rad of elevation, which
    // is this load zeroed at 100 yd.
    let engine = TrajectoryEngine::new(IntegrationMethod::RungeKutta4);
    let angle = engine
        .find_zero_angle(&clean_shot(), 300.0, false)
        .expect("100 yd is inside reach");
    assert!(
        (angle - 0.001228).abs() < 3.0e-4,
        "100 yd zero came out at {} rad",
        angle
    );
}

#[test]
fn test_adaptive_and_fixed_step_find_the_same_zero() {
    let fixed = TrajectoryEngine::new(IntegrationMethod::RungeKutta4);
    let adaptive = TrajectoryEngine::new(IntegrationMethod::AdaptiveRk45);
    let angle_fixed = fixed
        .find_zero_angle(&clean_shot(), 1800.0, false)
        .expect("600 yd is inside reach");
    let angle_adaptive = adaptive
        .find_zero_angle(&clean_shot(), 1800.0, false)
        .expect("600 yd is inside reach");
    assert!(
        (angle_fixed - angle_adaptive).abs() < 1.0e-4,
        "fixed {} vs adaptive {}",
        angle_fixed,
        angle_adaptive
    );
}

#[test]
fn test_legacy_zero_tracks_the_bracketing_zero() {
    let engine = TrajectoryEngine::new(IntegrationMethod::RungeKutta4);
    let bracketing = engine
        .find_zero_angle(&clean_shot(), 2400.0, false)
        .expect("800 yd is inside reach");
    let legacy = engine
        .zero_angle(&clean_shot(), 2400.0)
        .expect("damped iteration converges");
    assert!(
        (bracketing - legacy).abs() < 1.0e-6,
        "bracketing {} vs legacy {}",
        bracketing,
        legacy
    );
}

#[test]
fn test_unreachable_target_reports_the_ceiling() {
    let engine = TrajectoryEngine::new(IntegrationMethod::RungeKutta4);
    match engine.find_zero_angle(&clean_shot(), 60_000.0, false) {
        Err(Error::OutOfRange(e)) => {
            assert!((e.requested_distance_ft - 60_000.0).abs() < 1e-9);
            assert!(
                e.max_range_ft > 6_000.0 && e.max_range_ft < 60_000.0,
                "max range: {}",
                e.max_range_ft
            );
        }
        other => panic!("expected an out-of-range error, got {other:?}"),
    }
}

#[test]
fn test_max_range_elevation_reaches_the_reported_range() {
    let engine = TrajectoryEngine::new(IntegrationMethod::RungeKutta4);
    let (range_ft, angle_rad) = engine
        .find_max_range(&clean_shot(), (0.0, 90.0))
        .expect("search converges");
    assert!(range_ft > 6_000.0 && range_ft < 40_000.0, "range: {}", range_ft);
    assert!(angle_rad > 0.2 && angle_rad < 1.2, "angle: {}", angle_rad);

    // fire at the returned elevation with the limits lifted and confirm the
    // descending arc re-crosses the sight line where the search said
    let relaxed = TrajectoryEngine::with_config(
        IntegrationMethod::RungeKutta4,
        EngineConfig::default().without_range_limits(),
    );
    let mut shot = clean_shot();
    shot.relative_angle_rad = angle_rad;
    let hit = relaxed
        .integrate(&shot, 1.0e9, 0.0, 0.0, TrajFlag::ZERO, false)
        .expect("error is embedded instead");
    let crossing = hit
        .rows()
        .iter()
        .find(|r| r.flag.intersects(TrajFlag::ZERO_DOWN))
        .expect("full arc comes back down through the sight line");
    assert!(
        (crossing.slant_distance_ft - range_ft).abs() / range_ft < 0.02,
        "reported {} ft but landed at {} ft",
        range_ft,
        crossing.slant_distance_ft
    );
}
