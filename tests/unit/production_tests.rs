/*!
 * Tests for pacing rules and the settings bundle
 */

use reelsmith::production::pacing::{
    normalize_tenths, normalize_whole_seconds, scene_bounds, shot_bounds,
};
use reelsmith::production::{CountSetting, DurationBucket, GenerationSettings, PacingCategory};

#[test]
fn test_sceneBounds_twoMinutesMediumPacing_shouldAllowFourToEight() {
    let bounds = scene_bounds(120.0, 50, None);

    assert_eq!(bounds.min, 4);
    assert_eq!(bounds.max, 8);
    assert!(bounds.contains(bounds.target));
}

#[test]
fn test_sceneBounds_withExplicitCount_shouldBeExact() {
    let bounds = scene_bounds(120.0, 50, Some(3));

    assert_eq!((bounds.min, bounds.max, bounds.target), (3, 3, 3));
}

#[test]
fn test_shotBounds_fasterPacing_shouldAllowMoreShots() {
    let slow = shot_bounds(20.0, 10, None);
    let fast = shot_bounds(20.0, 90, None);

    assert!(fast.max > slow.max);
    assert!(fast.min >= slow.min);
}

#[test]
fn test_pacingCategory_boundaries_shouldSplitAtThirds() {
    assert_eq!(PacingCategory::from_pacing(33), PacingCategory::Slow);
    assert_eq!(PacingCategory::from_pacing(34), PacingCategory::Medium);
    assert_eq!(PacingCategory::from_pacing(66), PacingCategory::Medium);
    assert_eq!(PacingCategory::from_pacing(67), PacingCategory::Fast);
}

#[test]
fn test_normalizeWholeSeconds_shouldSumToTarget() {
    let durations = normalize_whole_seconds(&[8.0, 11.0, 14.0, 17.0, 8.0, 11.0], 120);

    assert_eq!(durations.iter().sum::<f64>(), 120.0);
    assert!(durations.iter().all(|d| d.fract() == 0.0 && *d >= 1.0));
}

#[test]
fn test_normalizeTenths_shouldSumToSceneDuration() {
    let durations = normalize_tenths(&[2.0, 3.0, 4.0], 17.0);

    let total: f64 = durations.iter().sum();
    assert!((total - 17.0).abs() < 1e-9);
    assert!(durations.iter().all(|d| ((d * 10.0).round() - d * 10.0).abs() < 1e-9));
}

#[test]
fn test_settings_fromJson_shouldAcceptAutoAndNumbers() {
    let settings: GenerationSettings = serde_json::from_str(
        r#"{"duration": "2m", "scene_count": "auto", "shots_per_scene": 3, "pacing": 70}"#,
    )
    .unwrap();

    assert_eq!(settings.duration, DurationBucket::Minutes2);
    assert_eq!(settings.scene_count, CountSetting::Auto);
    assert_eq!(settings.shots_per_scene, CountSetting::Fixed(3));
    assert!(settings.validate().is_ok());
}

#[test]
fn test_settings_withBadSchedule_shouldFailValidation() {
    let mut settings = GenerationSettings::default();
    settings.publish.enabled = true;
    settings.publish.platforms = vec!["youtube".to_string()];
    settings.publish.schedule = Some("next tuesday".to_string());

    assert!(settings.validate().is_err());
}
