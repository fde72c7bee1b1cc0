use crate::error::Result;
use crate::model::MediaReference;
use crate::util::ensure_dir;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ScratchDir {
    root: PathBuf,
}

impl ScratchDir {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        ensure_dir(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn unique_path(&self, stem: &str, ext: &str) -> PathBuf {
        self.root
            .join(format!("{}_{}.{ext}", sanitize_stem(stem), Uuid::new_v4()))
    }

    pub fn write_blob(&self, media: &MediaReference, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.unique_path(&media.media_id, media.media_kind.scratch_extension());
        std::fs::write(&path, bytes)?;
        debug!(
            media_id = %media.media_id,
            bytes = bytes.len(),
            "wrote scratch {}",
            path.display()
        );
        Ok(path)
    }
}

pub fn frame_path(video: &Path, index: u64) -> PathBuf {
    let stem = video
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string());
    video.with_file_name(format!("{stem}_frame_{index}_{}.jpg", Uuid::new_v4()))
}

pub fn annotated_path(image: &Path) -> PathBuf {
    let stem = image
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    image.with_file_name(format!("{stem}_annotated.jpg"))
}

fn sanitize_stem(stem: &str) -> String {
    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(64)
        .collect();
    if cleaned.is_empty() {
        "media".to_string()
    } else {
        cleaned
    }
}

#[derive(Debug, Default)]
pub struct ScratchSet {
    paths: Vec<PathBuf>,
}

impl ScratchSet {
    pub fn track(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn remove_all(&mut self) -> usize {
        let mut removed = 0;
        for path in self.paths.drain(..) {
            if remove_quietly(&path) {
                removed += 1;
            }
        }
        removed
    }
}

impl Drop for ScratchSet {
    fn drop(&mut self) {
        self.remove_all();
    }
}

pub fn remove_quietly(path: &Path) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            warn!("failed to remove scratch {}: {e}", path.display());
            false
        }
    }
}
