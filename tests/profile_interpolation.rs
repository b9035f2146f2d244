//! Target temperature interpolation over roast profiles.

use roasty_rs::profile::{Interpolation, Profile, ProfileError, Setpoint};

const MODES: [Interpolation; 2] = [Interpolation::Spline, Interpolation::Linear];

fn profile(points: &[(f64, f64)]) -> Profile {
    Profile::new(points.iter().map(|&(t, temp)| Setpoint::new(t, temp)).collect()).unwrap()
}

#[test]
fn test_single_point_is_constant_everywhere() {
    let p = profile(&[(30.0, 195.0)]);
    for mode in MODES {
        for t in [-100.0, -0.5, 0.0, 29.9, 30.0, 30.1, 1e6] {
            assert_eq!(p.target_temperature(t, mode).unwrap(), 195.0, "{mode:?} t={t}");
        }
    }
}

#[test]
fn test_exact_at_every_setpoint() {
    let p = profile(&[(0.0, 200.0), (45.0, 183.5), (120.0, 196.25), (300.0, 211.0), (480.0, 224.75)]);
    for mode in MODES {
        for sp in &p.setpoints {
            assert_eq!(p.target_temperature(sp.time, mode).unwrap(), sp.temperature, "{mode:?}");
        }
    }
}

#[test]
fn test_clamped_outside_span() {
    let p = profile(&[(10.0, 150.0), (60.0, 200.0), (90.0, 230.0)]);
    for mode in MODES {
        assert_eq!(p.target_temperature(0.0, mode).unwrap(), 150.0);
        assert_eq!(p.target_temperature(-5.0, mode).unwrap(), 150.0);
        assert_eq!(p.target_temperature(90.5, mode).unwrap(), 230.0);
        assert_eq!(p.target_temperature(10_000.0, mode).unwrap(), 230.0);
    }
}

#[test]
fn test_linear_between_setpoints() {
    let p = profile(&[(0.0, 200.0), (60.0, 220.0), (120.0, 160.0)]);
    let at = |t| p.target_temperature(t, Interpolation::Linear).unwrap();
    assert!((at(30.0) - 210.0).abs() < 1e-9);
    assert!((at(90.0) - 190.0).abs() < 1e-9);
    assert!((at(15.0) - 205.0).abs() < 1e-9);
}

#[test]
fn test_spline_is_continuous() {
    let p = profile(&[(0.0, 200.0), (60.0, 180.0), (180.0, 205.0), (360.0, 225.0)]);
    let mut previous = p.target_temperature(0.0, Interpolation::Spline).unwrap();
    let mut t = 0.0;
    while t < 360.0 {
        t += 0.25;
        let value = p.target_temperature(t, Interpolation::Spline).unwrap();
        assert!((value - previous).abs() < 0.5, "jump at t={t}");
        previous = value;
    }
}

#[test]
fn test_empty_profile_is_invalid() {
    let empty = Profile::default();
    for mode in MODES {
        assert_eq!(empty.target_temperature(10.0, mode), Err(ProfileError::Empty));
    }
    assert_eq!(empty.preview(), Err(ProfileError::Empty));
}

#[test]
fn test_preview_one_second_resolution() {
    let p = profile(&[(0.0, 200.0), (60.0, 220.0)]);
    let preview = p.preview().unwrap();
    assert_eq!(preview.time.len(), 61);
    assert_eq!(preview.target_temperature.len(), 61);
    for (k, t) in preview.time.iter().enumerate() {
        assert_eq!(*t, k as f64);
    }
    assert_eq!(preview.target_temperature[0], 200.0);
    assert_eq!(preview.target_temperature[60], 220.0);
    assert!((preview.target_temperature[30] - 210.0).abs() < 1e-9);
}

#[test]
fn test_profile_json_shape() {
    let p: Profile = serde_json::from_str(r#"{"setpoints":[{"time":0,"temperature":200},{"time":60,"temperature":220}]}"#).unwrap();
    assert!(p.validate().is_ok());
    assert_eq!(p.setpoints[1], Setpoint::new(60.0, 220.0));
}
