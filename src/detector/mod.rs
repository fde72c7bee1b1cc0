pub mod python;
pub mod types;

use crate::error::Result;
use std::path::Path;

pub use types::{DetectorDiag, InferIn, InferOut, RawBox, RawDetection};

pub trait Detector: Send + Sync {
    fn doctor(&self) -> Result<DetectorDiag>;

    fn infer(&self, input: &Path, annotated_out: &Path) -> Result<Vec<RawDetection>>;
}
