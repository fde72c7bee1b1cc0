use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn scratch_extension(self) -> &'static str {
        match self {
            MediaKind::Image => "jpg",
            MediaKind::Video => "mp4",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaReference {
    pub media_id: String,
    pub media_kind: MediaKind,
}

impl MediaReference {
    pub fn image(media_id: impl Into<String>) -> Self {
        Self {
            media_id: media_id.into(),
            media_kind: MediaKind::Image,
        }
    }

    pub fn video(media_id: impl Into<String>) -> Self {
        Self {
            media_id: media_id.into(),
            media_kind: MediaKind::Video,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportStatus {
    Processing,
    Pending,
    #[serde(rename = "In Progress")]
    InProgress,
    Resolved,
    Error,
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportStatus::Processing => write!(f, "Processing"),
            ReportStatus::Pending => write!(f, "Pending"),
            ReportStatus::InProgress => write!(f, "In Progress"),
            ReportStatus::Resolved => write!(f, "Resolved"),
            ReportStatus::Error => write!(f, "Error"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geolocation {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportDetails {
    #[serde(default)]
    pub registrant: String,
    #[serde(default)]
    pub road_name: String,
    #[serde(default)]
    pub area_name: Option<String>,
    #[serde(default)]
    pub pincode: Option<u32>,
    #[serde(default)]
    pub geolocation: Option<Geolocation>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub posted_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    pub media: Vec<MediaReference>,
    pub status: ReportStatus,
    #[serde(default)]
    pub anomaly_label: Option<String>,
    #[serde(skip)]
    pub anomaly_snapshot: Option<Vec<u8>>,
    #[serde(default)]
    pub details: ReportDetails,
}

impl Report {
    pub fn submitted(id: impl Into<String>, media: Vec<MediaReference>) -> Self {
        Self {
            id: id.into(),
            media,
            status: ReportStatus::Processing,
            anomaly_label: None,
            anomaly_snapshot: None,
            details: ReportDetails::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_label: String,
    pub confidence: f32,
    pub bounding_box: BoundingBox,
    pub area_pixels: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub image_name: String,
    pub detections: Vec<Detection>,
    pub main_class: Option<String>,
    pub main_confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub source_media_id: String,
    #[serde(default)]
    pub frame_index: Option<u64>,
    pub scratch_path: PathBuf,
    pub annotated_path: Option<PathBuf>,
    pub label: Option<String>,
    pub confidence: f32,
}

impl DetectionResult {
    pub fn new(
        source_media_id: &str,
        scratch_path: PathBuf,
        annotated_path: Option<PathBuf>,
        classification: Option<&Classification>,
    ) -> Self {
        let (label, confidence) = match classification {
            Some(c) if c.main_confidence > 0.0 => (c.main_class.clone(), c.main_confidence),
            _ => (None, 0.0),
        };
        let confidence = if label.is_some() { confidence } else { 0.0 };
        Self {
            source_media_id: source_media_id.to_string(),
            frame_index: None,
            scratch_path,
            annotated_path,
            label,
            confidence,
        }
    }

    pub fn with_frame_index(mut self, index: u64) -> Self {
        self.frame_index = Some(index);
        self
    }

    pub fn empty(source_media_id: &str, scratch_path: PathBuf) -> Self {
        Self::new(source_media_id, scratch_path, None, None)
    }

    pub fn snapshot_path(&self) -> &Path {
        self.annotated_path.as_deref().unwrap_or(&self.scratch_path)
    }

    pub fn artifacts(&self) -> impl Iterator<Item = &Path> {
        std::iter::once(self.scratch_path.as_path()).chain(self.annotated_path.as_deref())
    }
}
