use crate::detector::{Detector, RawDetection};
use crate::error::Result;
use crate::model::{BoundingBox, Classification, Detection};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct MediaClassifier {
    detector: Arc<dyn Detector>,
    class_names: Vec<String>,
}

impl MediaClassifier {
    pub fn new(detector: Arc<dyn Detector>, class_names: Vec<String>) -> Self {
        Self {
            detector,
            class_names,
        }
    }

    pub fn classify(&self, input: &Path, annotated_out: &Path) -> Result<Option<Classification>> {
        if !input.exists() {
            warn!("classify: input does not exist: {}", input.display());
            return Ok(None);
        }

        let raw = self.detector.infer(input, annotated_out)?;

        if !annotated_out.exists() {
            debug!(
                "detector wrote no annotated copy for {}; copying input",
                input.display()
            );
            std::fs::copy(input, annotated_out)?;
        }

        let image_name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let detections: Vec<Detection> = raw.iter().map(|d| self.normalize(d)).collect();

        Ok(Some(summarize(image_name, detections)))
    }

    fn class_name(&self, raw: &RawDetection) -> String {
        if let Some(name) = self.class_names.get(raw.class_id as usize) {
            return name.clone();
        }
        match &raw.class_name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("Class_{}", raw.class_id),
        }
    }

    fn normalize(&self, raw: &RawDetection) -> Detection {
        let confidence = if raw.confidence.is_finite() {
            (raw.confidence.clamp(0.0, 1.0) * 10_000.0).round() / 10_000.0
        } else {
            0.0
        };
        let b = raw.bbox;
        let area = ((b.x2 - b.x1) * (b.y2 - b.y1)).max(0.0);
        Detection {
            class_label: self.class_name(raw),
            confidence,
            bounding_box: BoundingBox {
                x1: b.x1 as i32,
                y1: b.y1 as i32,
                x2: b.x2 as i32,
                y2: b.y2 as i32,
            },
            area_pixels: area as u64,
        }
    }
}

pub fn summarize(image_name: String, detections: Vec<Detection>) -> Classification {
    let mut best: Option<&Detection> = None;
    for d in &detections {
        if best.is_none_or(|b| d.confidence > b.confidence) {
            best = Some(d);
        }
    }
    let (main_class, main_confidence) = match best {
        Some(d) => (Some(d.class_label.clone()), d.confidence),
        None => (None, 0.0),
    };
    Classification {
        image_name,
        detections,
        main_class,
        main_confidence,
    }
}
