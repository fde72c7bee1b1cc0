use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("media unreadable: {}: {reason}", .path.display())]
    MediaUnreadable { path: PathBuf, reason: String },

    #[error("media blob missing: {0}")]
    BlobMissing(String),

    #[error("report no longer exists: {0}")]
    ReportVanished(String),

    #[error("no detection results produced for report {0}")]
    AggregationEmpty(String),

    #[error("detector failed: {0}")]
    Detector(String),

    #[error("deadline exceeded after {seconds}s: {operation}")]
    Timeout { operation: String, seconds: u64 },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("dispatch queue is full ({capacity} pending)")]
    QueueFull { capacity: usize },

    #[error("dispatcher is shut down")]
    DispatcherClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    MediaUnreadable,
    BlobMissing,
    ReportVanished,
    AggregationEmpty,
    Detector,
    Timeout,
    Storage,
    Io,
    Serialization,
    QueueFull,
    DispatcherClosed,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::MediaUnreadable { .. } => ErrorKind::MediaUnreadable,
            PipelineError::BlobMissing(_) => ErrorKind::BlobMissing,
            PipelineError::ReportVanished(_) => ErrorKind::ReportVanished,
            PipelineError::AggregationEmpty(_) => ErrorKind::AggregationEmpty,
            PipelineError::Detector(_) => ErrorKind::Detector,
            PipelineError::Timeout { .. } => ErrorKind::Timeout,
            PipelineError::Storage(_) => ErrorKind::Storage,
            PipelineError::Io(_) => ErrorKind::Io,
            PipelineError::Serialization(_) => ErrorKind::Serialization,
            PipelineError::QueueFull { .. } => ErrorKind::QueueFull,
            PipelineError::DispatcherClosed => ErrorKind::DispatcherClosed,
        }
    }

    pub fn unreadable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        PipelineError::MediaUnreadable {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
