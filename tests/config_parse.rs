use roadscan::config::Config;
use roadscan::error::ErrorKind;

#[test]
fn parse_example_config() {
    let raw = include_str!("../roadscan.example.toml");
    let cfg: Config = toml::from_str(raw).expect("parse TOML");
    assert_eq!(cfg.video.max_frames, 10);
    assert_eq!(cfg.detector.confidence_threshold, 0.3);
    assert_eq!(cfg.detector.class_names.len(), 4);
    assert_eq!(
        cfg.detector.env.get("TORCH_DEVICE_BACKEND_AUTOLOAD").map(String::as_str),
        Some("0")
    );
    assert!(cfg.dispatcher.workers >= 1);
    assert!(!cfg.paths.scratch_dir.is_empty());
}

#[test]
fn missing_sections_use_defaults() {
    let cfg: Config = toml::from_str(
        r#"
[job]
max_retries = 3
retry_delay_ms = 100
raise_on_exhaustion = true
retry_on = ["Detector", "Timeout"]
mark_error_on_failure = true
timeout_seconds = 0
no_detection_label = "No detections found"
"#,
    )
    .expect("parse TOML");

    assert_eq!(cfg.job.max_retries, 3);
    assert_eq!(cfg.job.retry_on, vec![ErrorKind::Detector, ErrorKind::Timeout]);
    assert_eq!(cfg.video.max_frames, 10);
    assert_eq!(cfg.dispatcher.queue_capacity, 64);
    assert_eq!(cfg.detector.class_names[3], "D40_Pothole");
    assert_eq!(cfg.logging.level, "info");
}

#[test]
fn load_reports_path_on_error() {
    let err = Config::load(std::path::Path::new("/nonexistent/roadscan.toml")).unwrap_err();
    assert!(format!("{err:#}").contains("/nonexistent/roadscan.toml"));
}
