use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::path::Path;
use std::pin::Pin;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Byte stream of a fetched object.
pub type ObjectStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Private,
    PublicRead,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write the file at `source` as an object, replacing any previous content under
    /// the same key. The body is streamed from disk.
    async fn put(
        &self,
        key: &str,
        source: &Path,
        content_type: &str,
        visibility: Visibility,
    ) -> Result<(), StorageError>;

    /// Open an object for streaming
    async fn get(&self, key: &str) -> Result<ObjectStream, StorageError>;

    /// List every key that starts with `prefix`
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}
