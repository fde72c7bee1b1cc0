#![allow(dead_code)]

use crossbeam_channel::{Receiver, Sender};
use roadscan::config::Config;
use roadscan::detector::{Detector, DetectorDiag, RawBox, RawDetection};
use roadscan::error::{PipelineError, Result};
use roadscan::model::{MediaReference, Report};
use roadscan::pipeline::Pipeline;
use roadscan::store::{MemoryMediaStore, MemoryReportRepository};
use roadscan::video::{FrameSource, VideoInfo};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

/// Parses image bytes like `"3:0.81;0:0.2"` into detections. An empty image
/// has no detections, `fail` is a detector error, `panic` panics.
pub fn scripted_detections(text: &str) -> Result<Vec<RawDetection>> {
    let text = text.trim();
    if text == "fail" {
        return Err(PipelineError::Detector("scripted failure".into()));
    }
    if text == "panic" {
        panic!("scripted detector panic");
    }
    let mut out = Vec::new();
    for part in text.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let (id, conf) = part
            .split_once(':')
            .ok_or_else(|| PipelineError::Detector(format!("bad script entry: {part}")))?;
        out.push(RawDetection {
            class_id: id.trim().parse().map_err(|_| PipelineError::Detector(part.into()))?,
            class_name: None,
            confidence: conf.trim().parse().map_err(|_| PipelineError::Detector(part.into()))?,
            bbox: RawBox {
                x1: 1.5,
                y1: 2.5,
                x2: 11.5,
                y2: 22.5,
            },
        });
    }
    Ok(out)
}

/// Writes `annotated:<input bytes>` as the annotated copy.
#[derive(Default)]
pub struct ScriptedDetector {
    calls: AtomicUsize,
    failures_left: AtomicUsize,
    delay: Duration,
}

impl ScriptedDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// The first `n` calls fail with a detector error.
    pub fn failing_first(self, n: usize) -> Self {
        self.failures_left.store(n, Ordering::SeqCst);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Detector for ScriptedDetector {
    fn doctor(&self) -> Result<DetectorDiag> {
        Ok(DetectorDiag {
            python_exe: "scripted".into(),
            python_version: "0".into(),
            ultralytics_version: None,
            model_path: "none".into(),
            ok: true,
            error: None,
        })
    }

    fn infer(&self, input: &Path, annotated_out: &Path) -> Result<Vec<RawDetection>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(PipelineError::Detector("transient failure".into()));
        }
        let bytes = std::fs::read(input)?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        let detections = scripted_detections(&text)?;
        std::fs::write(annotated_out, format!("annotated:{text}"))?;
        Ok(detections)
    }
}

/// Signals on `entered` and then blocks until `release` yields or closes.
pub struct GatedDetector {
    inner: ScriptedDetector,
    entered: Sender<()>,
    release: Receiver<()>,
}

impl GatedDetector {
    pub fn new(entered: Sender<()>, release: Receiver<()>) -> Self {
        Self {
            inner: ScriptedDetector::new(),
            entered,
            release,
        }
    }
}

impl Detector for GatedDetector {
    fn doctor(&self) -> Result<DetectorDiag> {
        self.inner.doctor()
    }

    fn infer(&self, input: &Path, annotated_out: &Path) -> Result<Vec<RawDetection>> {
        let _ = self.entered.send(());
        let _ = self.release.recv();
        self.inner.infer(input, annotated_out)
    }
}

/// A "video" is a text file with one line per frame; the line becomes the
/// extracted frame's bytes. A file starting with `corrupt` cannot be opened,
/// a line `EOF` ends the stream early and a line `ERR` fails extraction.
#[derive(Default)]
pub struct TextFrameSource {
    extracted: AtomicUsize,
}

impl TextFrameSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extracted(&self) -> usize {
        self.extracted.load(Ordering::SeqCst)
    }
}

impl FrameSource for TextFrameSource {
    fn probe(&self, video: &Path) -> Result<VideoInfo> {
        let text = std::fs::read_to_string(video)
            .map_err(|e| PipelineError::unreadable(video, e.to_string()))?;
        if text.starts_with("corrupt") {
            return Err(PipelineError::unreadable(video, "moov atom not found"));
        }
        Ok(VideoInfo {
            total_frames: text.lines().count() as u64,
            fps: 30.0,
        })
    }

    fn extract_frame(&self, video: &Path, index: u64, out: &Path) -> Result<bool> {
        let text = std::fs::read_to_string(video)?;
        let Some(line) = text.lines().nth(index as usize) else {
            return Ok(false);
        };
        match line {
            "EOF" => Ok(false),
            "ERR" => Err(PipelineError::unreadable(video, "decode error")),
            _ => {
                std::fs::write(out, line)?;
                self.extracted.fetch_add(1, Ordering::SeqCst);
                Ok(true)
            }
        }
    }
}

/// `lines` joined as a text video.
pub fn text_video(lines: &[&str]) -> Vec<u8> {
    let mut out = lines.join("\n");
    out.push('\n');
    out.into_bytes()
}

pub struct Fixture {
    pub dir: TempDir,
    pub cfg: Config,
    pub media: Arc<MemoryMediaStore>,
    pub reports: Arc<MemoryReportRepository>,
    pub frames: Arc<TextFrameSource>,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut cfg = Config::default();
        cfg.paths.scratch_dir = dir.path().join("scratch").display().to_string();
        Self {
            dir,
            cfg,
            media: Arc::new(MemoryMediaStore::new()),
            reports: Arc::new(MemoryReportRepository::new()),
            frames: Arc::new(TextFrameSource::new()),
        }
    }

    pub fn pipeline(&self, detector: Arc<dyn Detector>) -> Pipeline {
        Pipeline::new(
            &self.cfg,
            self.media.clone(),
            self.reports.clone(),
            detector,
            self.frames.clone(),
        )
        .expect("pipeline")
    }

    /// Stores each blob and a `Processing` report referencing them, in order.
    pub fn submit(&self, report_id: &str, media: Vec<(MediaReference, Vec<u8>)>) -> Report {
        let mut refs = Vec::new();
        for (reference, bytes) in media {
            self.media
                .insert(reference.media_id.clone(), bytes)
                .expect("insert blob");
            refs.push(reference);
        }
        let report = Report::submitted(report_id, refs);
        self.reports.insert(report.clone()).expect("insert report");
        report
    }

    pub fn scratch_root(&self) -> PathBuf {
        PathBuf::from(&self.cfg.paths.scratch_dir)
    }

    pub fn scratch_entries(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(self.scratch_root()) {
            Ok(rd) => rd.map(|e| e.expect("dir entry").path()).collect(),
            Err(_) => Vec::new(),
        }
    }
}
