use std::{collections::HashMap, path::Path};

use handcam::{
    config::{HandsOptions, Settings},
    hand::ModelComplexity,
};

fn settings(vars: &[(&str, &str)]) -> anyhow::Result<Settings> {
    let vars = vars
        .iter()
        .map(|&(k, v)| (k.to_string(), v.to_string()))
        .collect::<HashMap<_, _>>();
    Settings::from_lookup(|name| vars.get(name).cloned())
}

#[test]
fn defaults() {
    let settings = settings(&[]).unwrap();
    assert_eq!(settings, Settings::default());
    assert_eq!(settings.camera, 0);
    assert_eq!(settings.fps, 30);
    assert_eq!(settings.window_title, "Hand Detector");
    assert!(settings.mirror);
    assert!(settings.model_dir.ends_with("3rdparty/onnx"));

    let hands = &settings.hands;
    assert_eq!(hands.model_complexity, 0);
    assert_eq!(hands.max_num_hands, 2);
    assert_eq!(hands.min_detection_confidence, 0.5);
    assert_eq!(hands.min_tracking_confidence, 0.5);
    assert_eq!(hands.complexity().unwrap(), ModelComplexity::Lite);
}

#[test]
fn overrides() {
    let settings = settings(&[
        ("HANDCAM_CAMERA", "2"),
        ("HANDCAM_FPS", "60"),
        ("HANDCAM_MODEL_DIR", "/opt/models"),
        ("HANDCAM_MODEL_COMPLEXITY", "1"),
        ("HANDCAM_MAX_HANDS", "4"),
        ("HANDCAM_MIN_DETECTION_CONFIDENCE", "0.7"),
        ("HANDCAM_MIN_TRACKING_CONFIDENCE", " 0.25 "),
        ("HANDCAM_MIRROR", "no"),
    ])
    .unwrap();

    assert_eq!(settings.camera, 2);
    assert_eq!(settings.fps, 60);
    assert_eq!(settings.model_dir, Path::new("/opt/models"));
    assert_eq!(
        settings.hands,
        HandsOptions {
            model_complexity: 1,
            max_num_hands: 4,
            min_detection_confidence: 0.7,
            min_tracking_confidence: 0.25,
        }
    );
    assert_eq!(settings.hands.complexity().unwrap(), ModelComplexity::Full);
    assert!(!settings.mirror);
}

#[test]
fn malformed_values_name_the_variable() {
    for (var, value) in [
        ("HANDCAM_CAMERA", "-1"),
        ("HANDCAM_CAMERA", "front"),
        ("HANDCAM_FPS", "0"),
        ("HANDCAM_FPS", "29.97"),
        ("HANDCAM_MAX_HANDS", "two"),
        ("HANDCAM_MIN_DETECTION_CONFIDENCE", "high"),
        ("HANDCAM_MIRROR", "sometimes"),
    ] {
        let err = settings(&[(var, value)]).unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains(var), "{var}={value}: {msg}");
    }
}

#[test]
fn out_of_range_values() {
    for (var, value) in [
        ("HANDCAM_MODEL_COMPLEXITY", "2"),
        ("HANDCAM_MAX_HANDS", "0"),
        ("HANDCAM_MIN_DETECTION_CONFIDENCE", "1.5"),
        ("HANDCAM_MIN_TRACKING_CONFIDENCE", "-0.1"),
        ("HANDCAM_MIN_TRACKING_CONFIDENCE", "NaN"),
    ] {
        let err = settings(&[(var, value)]).unwrap_err();
        assert!(
            format!("{err:#}").contains("invalid hand detection settings"),
            "{var}={value}: {err:#}"
        );
    }
}

#[test]
fn random_valid_confidences() {
    let mut rng = fastrand::Rng::with_seed(0x68616e64);
    for _ in 0..100 {
        let options = HandsOptions {
            model_complexity: rng.u8(0..=1),
            max_num_hands: rng.usize(1..=8),
            min_detection_confidence: rng.f32(),
            min_tracking_confidence: rng.f32(),
        };
        options.validate().unwrap();
    }
}
