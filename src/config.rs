use crate::error::ErrorKind;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub global: Global,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub detector: Detector,
    #[serde(default)]
    pub video: Video,
    #[serde(default)]
    pub job: Job,
    #[serde(default)]
    pub dispatcher: Dispatcher,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub debug: Debug,
    #[serde(default)]
    pub security: Security,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Global {
    pub print_summary: bool,
}
impl Default for Global {
    fn default() -> Self {
        Self {
            print_summary: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paths {
    pub scratch_dir: String,
    pub media_dir: String,
    pub reports_dir: String,
    pub scripts_dir: String,
    pub out_dir: String,
}
impl Default for Paths {
    fn default() -> Self {
        Self {
            scratch_dir: ".roadscan-scratch".into(),
            media_dir: "data/media".into(),
            reports_dir: "data/reports".into(),
            scripts_dir: "scripts".into(),
            out_dir: "out".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detector {
    pub python_exe: String,
    pub script: String,
    pub model_path: String,
    pub confidence_threshold: f32,
    pub timeout_seconds: u64,
    pub doctor_timeout_seconds: u64,
    pub class_names: Vec<String>,
    #[serde(default)]
    pub env: std::collections::BTreeMap<String, String>,
}
impl Default for Detector {
    fn default() -> Self {
        Self {
            python_exe: "python3".into(),
            script: "road_detect.py".into(),
            model_path: "models/best.pt".into(),
            confidence_threshold: 0.3,
            timeout_seconds: 120,
            doctor_timeout_seconds: 30,
            class_names: vec![
                "D00_Longitudinal_Crack".into(),
                "D10_Transverse_Crack".into(),
                "D20_Alligator_Crack".into(),
                "D40_Pothole".into(),
            ],
            env: Default::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    pub ffprobe_exe: String,
    pub ffmpeg_exe: String,
    pub max_frames: usize,
    pub probe_timeout_seconds: u64,
    pub frame_timeout_seconds: u64,
    pub jpeg_quality: u32,
}
impl Default for Video {
    fn default() -> Self {
        Self {
            ffprobe_exe: "ffprobe".into(),
            ffmpeg_exe: "ffmpeg".into(),
            max_frames: 10,
            probe_timeout_seconds: 60,
            frame_timeout_seconds: 60,
            jpeg_quality: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub raise_on_exhaustion: bool,
    #[serde(default)]
    pub retry_on: Vec<ErrorKind>,
    pub mark_error_on_failure: bool,
    pub timeout_seconds: u64,
    pub no_detection_label: String,
}
impl Default for Job {
    fn default() -> Self {
        Self {
            max_retries: 0,
            retry_delay_ms: 0,
            raise_on_exhaustion: false,
            retry_on: Vec::new(),
            mark_error_on_failure: true,
            timeout_seconds: 0,
            no_detection_label: "No detections found".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dispatcher {
    pub workers: usize,
    pub queue_capacity: usize,
}
impl Default for Dispatcher {
    fn default() -> Self {
        Self {
            workers: 2,
            queue_capacity: 64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Debug {
    pub keep_python_stderr: bool,
    pub dump_effective_config: bool,
}
impl Default for Debug {
    fn default() -> Self {
        Self {
            keep_python_stderr: true,
            dump_effective_config: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Security {
    pub pin_scripts_dir: bool,
}
impl Default for Security {
    fn default() -> Self {
        Self {
            pin_scripts_dir: true,
        }
    }
}
