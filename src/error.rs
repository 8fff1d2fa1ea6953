//! Pipeline error taxonomy.

use crate::ports::storage::StorageError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Segmentation failed: {0}")]
    SegmentationFailed(String),

    #[error("Segmentation timed out after {0:?}")]
    SegmentationTimedOut(Duration),

    #[error("File system unavailable at {path:?}: {reason}")]
    FileSystemUnavailable { path: PathBuf, reason: String },

    #[error("No segment set found in {0:?}")]
    NoSegmentSet(PathBuf),

    #[error("Upload of {key} failed: {source}")]
    UploadFailed {
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Invalid path segment: {0:?}")]
    InvalidPathSegment(String),

    #[error("Namespace {0} has no failed upload to retry")]
    UnknownNamespace(String),
}

impl PipelineError {
    /// Stable machine-readable name, used in HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::SegmentationFailed(_) => "SegmentationFailed",
            PipelineError::SegmentationTimedOut(_) => "SegmentationTimedOut",
            PipelineError::FileSystemUnavailable { .. } => "FileSystemUnavailable",
            PipelineError::NoSegmentSet(_) => "NoSegmentSet",
            PipelineError::UploadFailed { .. } => "UploadFailed",
            PipelineError::ObjectNotFound(_) => "ObjectNotFound",
            PipelineError::InvalidPathSegment(_) => "InvalidPathSegment",
            PipelineError::UnknownNamespace(_) => "UnknownNamespace",
        }
    }

    pub(crate) fn fs(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        PipelineError::FileSystemUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
