use crate::classify::MediaClassifier;
use crate::error::Result;
use crate::model::DetectionResult;
use crate::scratch::{annotated_path, frame_path, remove_quietly};
use crate::video::{FrameSource, VideoInfo};
use serde::{Deserialize, Serialize};
use std::iter::StepBy;
use std::ops::Range;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FramePlan {
    pub total_frames: u64,
    pub max_frames: usize,
    pub stride: u64,
}

impl FramePlan {
    pub fn new(total_frames: u64, max_frames: usize) -> Self {
        let max_frames = max_frames.max(1);
        let per = total_frames / max_frames as u64;
        let stride = if total_frames <= max_frames as u64 {
            per.max(1)
        } else {
            per
        };
        Self {
            total_frames,
            max_frames,
            stride,
        }
    }

    pub fn candidates(&self) -> StepBy<Range<u64>> {
        (0..self.total_frames).step_by(self.stride as usize)
    }

    pub fn sampled(&self) -> Vec<u64> {
        self.candidates().take(self.max_frames).collect()
    }
}

pub struct FrameSampler<'a> {
    source: &'a dyn FrameSource,
    classifier: &'a MediaClassifier,
    max_frames: usize,
}

impl<'a> FrameSampler<'a> {
    pub fn new(source: &'a dyn FrameSource, classifier: &'a MediaClassifier, max_frames: usize) -> Self {
        Self {
            source,
            classifier,
            max_frames: max_frames.max(1),
        }
    }

    /// Opens `video` and returns the lazy sample sequence. The sequence owns
    /// the video scratch file and deletes it once exhausted or dropped. If the
    /// video cannot be opened nothing is touched.
    pub fn sample(&self, media_id: &str, video: &Path) -> Result<FrameSamples<'a>> {
        let info = self.source.probe(video)?;
        let plan = FramePlan::new(info.total_frames, self.max_frames);
        info!(
            media_id,
            total_frames = info.total_frames,
            fps = info.fps,
            duration_secs = ?info.duration_secs(),
            stride = plan.stride,
            "sampling video"
        );
        Ok(FrameSamples {
            source: self.source,
            classifier: self.classifier,
            media_id: media_id.to_string(),
            video: video.to_path_buf(),
            info,
            indices: plan.candidates(),
            max_frames: plan.max_frames,
            yielded: 0,
            finished: false,
        })
    }
}

pub struct FrameSamples<'a> {
    source: &'a dyn FrameSource,
    classifier: &'a MediaClassifier,
    media_id: String,
    video: PathBuf,
    info: VideoInfo,
    indices: StepBy<Range<u64>>,
    max_frames: usize,
    yielded: usize,
    finished: bool,
}

impl FrameSamples<'_> {
    pub fn info(&self) -> VideoInfo {
        self.info
    }

    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        if remove_quietly(&self.video) {
            debug!(media_id = %self.media_id, "removed video scratch {}", self.video.display());
        }
    }

    fn classify_frame(&self, index: u64, frame: PathBuf) -> DetectionResult {
        let annotated = annotated_path(&frame);
        match self.classifier.classify(&frame, &annotated) {
            Ok(classification) => DetectionResult::new(
                &self.media_id,
                frame,
                classification.as_ref().map(|_| annotated),
                classification.as_ref(),
            ),
            Err(e) => {
                warn!(media_id = %self.media_id, frame_index = index, "frame classification failed: {e}");
                remove_quietly(&annotated);
                DetectionResult::empty(&self.media_id, frame)
            }
        }
    }
}

impl Iterator for FrameSamples<'_> {
    type Item = DetectionResult;

    fn next(&mut self) -> Option<DetectionResult> {
        if self.finished {
            return None;
        }
        if self.yielded >= self.max_frames {
            self.finish();
            return None;
        }
        let Some(index) = self.indices.next() else {
            self.finish();
            return None;
        };

        let frame = frame_path(&self.video, index);
        match self.source.extract_frame(&self.video, index, &frame) {
            Ok(true) => {}
            Ok(false) => {
                debug!(media_id = %self.media_id, frame_index = index, "stream ended early");
                self.finish();
                return None;
            }
            Err(e) => {
                warn!(media_id = %self.media_id, frame_index = index, "frame extraction failed: {e}");
                remove_quietly(&frame);
                self.finish();
                return None;
            }
        }

        self.yielded += 1;
        Some(self.classify_frame(index, frame).with_frame_index(index))
    }
}

impl Drop for FrameSamples<'_> {
    fn drop(&mut self) {
        self.finish();
    }
}
