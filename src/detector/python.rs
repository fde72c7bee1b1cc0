use super::{Detector, types::*};
use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::process::{run_with_timeout, timeout_from_secs};
use anyhow::{Context, anyhow};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, warn};

pub struct PythonDetector {
    cfg: Config,
    script: PathBuf,
    python_exe: PathBuf,
}

impl PythonDetector {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let scripts_dir = PathBuf::from(&cfg.paths.scripts_dir);
        if cfg.security.pin_scripts_dir {
            let cwd = std::env::current_dir().with_context(|| "current_dir")?;
            let canon = scripts_dir
                .canonicalize()
                .with_context(|| format!("canonicalize scripts_dir: {}", scripts_dir.display()))?;
            if !canon.starts_with(&cwd) {
                return Err(anyhow!(
                    "scripts_dir is outside cwd while pin_scripts_dir=true: {}",
                    canon.display()
                ));
            }
        }
        let script = scripts_dir.join(&cfg.detector.script);
        if !script.exists() {
            return Err(anyhow!("missing script: {}", script.display()));
        }
        let python_exe = resolve_python_exe(&cfg.detector.python_exe);
        Ok(Self {
            cfg: cfg.clone(),
            script,
            python_exe,
        })
    }

    fn run_json<I: serde::Serialize, O: for<'de> serde::Deserialize<'de>>(
        &self,
        input: &I,
        timeout_seconds: u64,
    ) -> Result<O> {
        let mut cmd = Command::new(&self.python_exe);
        cmd.arg(&self.script);
        for (k, v) in &self.cfg.detector.env {
            cmd.env(k, v);
        }

        let label = format!("python {}", self.script.display());
        let bytes = serde_json::to_vec(input)?;
        let output = run_with_timeout(
            cmd,
            &label,
            Some(&bytes),
            timeout_from_secs(timeout_seconds),
        )?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::Detector(format!(
                "{label} exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        if self.cfg.debug.keep_python_stderr && !output.stderr.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("{label} stderr: {}", stderr.trim());
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| PipelineError::Detector(format!("parsing {label} JSON output: {e}")))
    }
}

fn resolve_python_exe(raw: &str) -> PathBuf {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("auto") {
        if let Ok(env_val) = std::env::var("ROADSCAN_PYTHON") {
            let p = expand_tilde(&env_val);
            if p.exists() {
                return p;
            }
        }
        return PathBuf::from("python3");
    }
    expand_tilde(raw)
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

impl Detector for PythonDetector {
    fn doctor(&self) -> Result<DetectorDiag> {
        let req = serde_json::json!({
            "cmd": "doctor",
            "model_path": self.cfg.detector.model_path,
        });
        self.run_json(&req, self.cfg.detector.doctor_timeout_seconds)
    }

    fn infer(&self, input: &Path, annotated_out: &Path) -> Result<Vec<RawDetection>> {
        let req = InferIn {
            image_path: input.display().to_string(),
            annotated_path: annotated_out.display().to_string(),
            model_path: self.cfg.detector.model_path.clone(),
            confidence_threshold: self.cfg.detector.confidence_threshold,
            class_names: self.cfg.detector.class_names.clone(),
        };
        let out: InferOut = self.run_json(
            &serde_json::json!({"cmd": "infer", "req": req}),
            self.cfg.detector.timeout_seconds,
        )?;
        for w in &out.warnings {
            warn!("detector warning for {}: {w}", input.display());
        }
        if !out.ok {
            let msg = out
                .error
                .unwrap_or_else(|| "detector returned ok=false".to_string());
            return Err(PipelineError::Detector(msg));
        }
        Ok(out.detections)
    }
}
