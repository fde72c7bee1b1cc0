use crate::aggregate::AggregateOutcome;
use crate::model::DetectionResult;
use crate::util::sha256_hex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub report_id: String,
    pub label: String,
    pub confidence: f32,
    pub detections_found: bool,
    pub source_media_id: String,
    pub frame_index: Option<u64>,
    pub media_processed: usize,
    pub frames_sampled: usize,
    pub results: Vec<ResultEntry>,
    pub attempts: u32,
    pub elapsed_ms: u64,
    pub snapshot_bytes: usize,
    pub snapshot_sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultEntry {
    pub media_id: String,
    pub frame_index: Option<u64>,
    pub label: Option<String>,
    pub confidence: f32,
}

impl JobReport {
    pub fn new(
        report_id: &str,
        outcome: &AggregateOutcome,
        results: &[DetectionResult],
        media_processed: usize,
        snapshot: &[u8],
    ) -> Self {
        Self {
            report_id: report_id.to_string(),
            label: outcome.label.clone(),
            confidence: outcome.confidence,
            detections_found: outcome.detections_found,
            source_media_id: outcome.source_media_id.clone(),
            frame_index: outcome.frame_index,
            media_processed,
            frames_sampled: results.iter().filter(|r| r.frame_index.is_some()).count(),
            results: results
                .iter()
                .map(|r| ResultEntry {
                    media_id: r.source_media_id.clone(),
                    frame_index: r.frame_index,
                    label: r.label.clone(),
                    confidence: r.confidence,
                })
                .collect(),
            attempts: 1,
            elapsed_ms: 0,
            snapshot_bytes: snapshot.len(),
            snapshot_sha256: sha256_hex(snapshot),
        }
    }
}
