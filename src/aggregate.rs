use crate::error::{PipelineError, Result};
use crate::model::DetectionResult;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateOutcome {
    pub label: String,
    pub confidence: f32,
    pub detections_found: bool,
    pub source_media_id: String,
    pub frame_index: Option<u64>,
    pub snapshot_path: PathBuf,
}

/// Picks the highest-confidence result. Ties keep the earliest entry, so an
/// all-zero collection falls back to the first media item's artifact under
/// `no_detection_label`.
pub fn aggregate(
    report_id: &str,
    results: &[DetectionResult],
    no_detection_label: &str,
) -> Result<AggregateOutcome> {
    let best = results
        .iter()
        .reduce(|best, r| if r.confidence > best.confidence { r } else { best })
        .ok_or_else(|| PipelineError::AggregationEmpty(report_id.to_string()))?;

    let (label, detections_found) = match &best.label {
        Some(label) if best.confidence > 0.0 => (label.clone(), true),
        _ => (no_detection_label.to_string(), false),
    };

    Ok(AggregateOutcome {
        label,
        confidence: best.confidence,
        detections_found,
        source_media_id: best.source_media_id.clone(),
        frame_index: best.frame_index,
        snapshot_path: best.snapshot_path().to_path_buf(),
    })
}
