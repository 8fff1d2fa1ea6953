use crate::domain::hls::content_type_for;
use crate::domain::keys::{object_key, validate_segment};
use crate::domain::namespace::NamespacePrefix;
use crate::domain::walker::LocalFile;
use crate::error::PipelineError;
use crate::ports::storage::{ObjectStore, StorageError, Visibility};
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;

#[derive(Debug, Clone, PartialEq)]
pub struct UploadReport {
    pub namespace: NamespacePrefix,
    /// Keys written, in input order
    pub keys: Vec<String>,
}

/// Pushes a Segment Set to the object store, at most `max_concurrency` files at a time.
pub struct Uploader {
    store: Arc<dyn ObjectStore>,
    collection_root: String,
    permits: Arc<Semaphore>,
}

impl Uploader {
    pub fn new(store: Arc<dyn ObjectStore>, collection_root: String, max_concurrency: usize) -> Self {
        Self {
            store,
            collection_root,
            permits: Arc::new(Semaphore::new(max_concurrency.max(1))),
        }
    }

    /// Upload every file under `{collection_root}/{namespace}/{relative}`.
    ///
    /// Every path component must be a segment the Stream Gateway accepts; otherwise
    /// nothing is written. Waits for all transfers to settle. Fails with the first error
    /// in file order; objects already written stay in place.
    pub async fn upload(
        &self,
        files: &[LocalFile],
        namespace: &NamespacePrefix,
    ) -> Result<UploadReport, PipelineError> {
        for file in files {
            if file.relative.split('/').any(|c| validate_segment(c).is_err()) {
                return Err(PipelineError::UploadFailed {
                    key: object_key(&self.collection_root, namespace.as_str(), &file.relative),
                    source: StorageError::InvalidKey(file.relative.clone()),
                });
            }
        }

        let results = join_all(files.iter().map(|file| self.upload_one(file, namespace))).await;

        let mut keys = Vec::with_capacity(results.len());
        let mut first_error = None;
        for result in results {
            match result {
                Ok(key) => keys.push(key),
                Err(err) if first_error.is_none() => first_error = Some(err),
                Err(_) => {}
            }
        }

        if let Some(err) = first_error {
            tracing::error!(
                namespace = %namespace,
                error = %err,
                orphaned = keys.len(),
                total = files.len(),
                "Upload failed, written objects are left in place"
            );
            return Err(err);
        }

        tracing::info!(namespace = %namespace, files = keys.len(), "Upload completed");
        Ok(UploadReport {
            namespace: namespace.clone(),
            keys,
        })
    }

    async fn upload_one(
        &self,
        file: &LocalFile,
        namespace: &NamespacePrefix,
    ) -> Result<String, PipelineError> {
        let key = object_key(&self.collection_root, namespace.as_str(), &file.relative);
        let failed = |source: StorageError| PipelineError::UploadFailed {
            key: key.clone(),
            source,
        };

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| failed(StorageError::Backend(e.to_string())))?;

        self.store
            .put(
                &key,
                &file.absolute,
                content_type_for(&file.relative),
                Visibility::PublicRead,
            )
            .await
            .map_err(failed)?;

        tracing::debug!(key = %key, "Uploaded");
        Ok(key)
    }
}
