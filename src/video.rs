use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::process::{run_with_timeout, timeout_from_secs};
use crate::scratch::remove_quietly;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub total_frames: u64,
    pub fps: f64,
}

impl VideoInfo {
    pub fn duration_secs(&self) -> Option<f64> {
        if self.fps > 0.0 {
            Some(self.total_frames as f64 / self.fps)
        } else {
            None
        }
    }
}

pub trait FrameSource: Send + Sync {
    fn probe(&self, video: &Path) -> Result<VideoInfo>;

    /// Writes frame `index` as an image at `out`. `Ok(false)` means the
    /// stream ended before `index`.
    fn extract_frame(&self, video: &Path, index: u64, out: &Path) -> Result<bool>;
}

pub struct FfmpegFrameSource {
    ffprobe_exe: PathBuf,
    ffmpeg_exe: PathBuf,
    probe_timeout_seconds: u64,
    frame_timeout_seconds: u64,
    jpeg_quality: u32,
}

impl FfmpegFrameSource {
    pub fn new(cfg: &Config) -> Self {
        Self {
            ffprobe_exe: PathBuf::from(&cfg.video.ffprobe_exe),
            ffmpeg_exe: PathBuf::from(&cfg.video.ffmpeg_exe),
            probe_timeout_seconds: cfg.video.probe_timeout_seconds,
            frame_timeout_seconds: cfg.video.frame_timeout_seconds,
            jpeg_quality: cfg.video.jpeg_quality,
        }
    }

    pub fn versions(&self) -> Vec<(String, std::result::Result<String, String>)> {
        [&self.ffprobe_exe, &self.ffmpeg_exe]
            .into_iter()
            .map(|exe| {
                let mut cmd = Command::new(exe);
                cmd.arg("-version");
                let res = run_with_timeout(cmd, "version", None, timeout_from_secs(10))
                    .map_err(|e| e.to_string())
                    .and_then(|out| {
                        if out.status.success() {
                            Ok(String::from_utf8_lossy(&out.stdout)
                                .lines()
                                .next()
                                .unwrap_or_default()
                                .to_string())
                        } else {
                            Err(format!("exited with {}", out.status))
                        }
                    });
                (exe.display().to_string(), res)
            })
            .collect()
    }

    fn ffprobe_stream(&self, video: &Path, count_frames: bool) -> Result<ProbeStream> {
        let mut cmd = Command::new(&self.ffprobe_exe);
        cmd.args(["-v", "error", "-select_streams", "v:0"]);
        if count_frames {
            cmd.arg("-count_frames");
        }
        cmd.args([
            "-show_entries",
            "stream=nb_frames,nb_read_frames,r_frame_rate,avg_frame_rate",
        ])
        .args(["-of", "json"])
        .arg(video);

        let output = run_with_timeout(
            cmd,
            "ffprobe",
            None,
            timeout_from_secs(self.probe_timeout_seconds),
        )?;
        if !output.status.success() {
            return Err(PipelineError::unreadable(
                video,
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        let parsed: ProbeOutput = serde_json::from_slice(&output.stdout)
            .map_err(|e| PipelineError::unreadable(video, format!("ffprobe output: {e}")))?;
        parsed
            .streams
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::unreadable(video, "no video stream"))
    }
}

impl FrameSource for FfmpegFrameSource {
    fn probe(&self, video: &Path) -> Result<VideoInfo> {
        let mut stream = self.ffprobe_stream(video, false)?;
        let mut total = parse_count(stream.nb_frames.as_deref());
        if total.is_none() {
            debug!("container has no frame count, decoding {}", video.display());
            stream = self.ffprobe_stream(video, true)?;
            total = parse_count(stream.nb_read_frames.as_deref());
        }
        let fps = parse_rate(stream.avg_frame_rate.as_deref())
            .or_else(|| parse_rate(stream.r_frame_rate.as_deref()))
            .unwrap_or(0.0);
        Ok(VideoInfo {
            total_frames: total.unwrap_or(0),
            fps,
        })
    }

    fn extract_frame(&self, video: &Path, index: u64, out: &Path) -> Result<bool> {
        let select = format!("select=eq(n\\,{index})");
        let quality = self.jpeg_quality.to_string();
        let mut cmd = Command::new(&self.ffmpeg_exe);
        cmd.args(["-hide_banner", "-loglevel", "error", "-nostdin"])
            .arg("-i")
            .arg(video)
            .args(["-an", "-sn"])
            .args(["-vf", &select])
            .args(["-frames:v", "1"])
            .args(["-q:v", &quality])
            .arg("-y")
            .arg(out);

        let output = run_with_timeout(
            cmd,
            "ffmpeg",
            None,
            timeout_from_secs(self.frame_timeout_seconds),
        )?;
        if !output.status.success() {
            remove_quietly(out);
            return Err(PipelineError::unreadable(
                video,
                format!(
                    "ffmpeg frame {index}: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }

        let written = std::fs::metadata(out).map(|m| m.len() > 0).unwrap_or(false);
        if !written {
            remove_quietly(out);
        }
        Ok(written)
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    nb_frames: Option<String>,
    nb_read_frames: Option<String>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
}

fn parse_count(raw: Option<&str>) -> Option<u64> {
    raw.and_then(|s| s.trim().parse::<u64>().ok())
}

pub fn parse_rate(raw: Option<&str>) -> Option<f64> {
    let raw = raw?.trim();
    let rate = match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => raw.parse().ok()?,
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}
