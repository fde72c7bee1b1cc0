use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorDiag {
    pub python_exe: String,
    pub python_version: String,
    pub ultralytics_version: Option<String>,
    pub model_path: String,
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferIn {
    pub image_path: String,
    pub annotated_path: String,
    pub model_path: String,
    pub confidence_threshold: f32,
    pub class_names: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub class_id: u32,
    #[serde(default)]
    pub class_name: Option<String>,
    pub confidence: f32,
    pub bbox: RawBox,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferOut {
    pub ok: bool,
    #[serde(default)]
    pub detections: Vec<RawDetection>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}
