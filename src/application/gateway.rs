use crate::application::catalog::Catalog;
use crate::domain::hls::content_type_for;
use crate::domain::keys::{object_key, validate_segment};
use crate::domain::namespace::NamespacePrefix;
use crate::error::PipelineError;
use crate::ports::storage::{ObjectStore, ObjectStream, StorageError};
use std::sync::Arc;

/// An object ready to be relayed to a client.
pub struct StreamedObject {
    pub key: String,
    pub content_type: &'static str,
    pub body: ObjectStream,
}

/// Resolves `(namespace, filename)` request pairs to stored objects.
pub struct StreamGateway {
    store: Arc<dyn ObjectStore>,
    catalog: Arc<Catalog>,
    collection_root: String,
}

impl StreamGateway {
    pub fn new(store: Arc<dyn ObjectStore>, catalog: Arc<Catalog>, collection_root: String) -> Self {
        Self {
            store,
            catalog,
            collection_root,
        }
    }

    /// Both arguments come straight from the request path and are validated before
    /// the store is touched. Every fetch failure is reported as `ObjectNotFound`.
    pub async fn open(
        &self,
        namespace: &str,
        filename: &str,
    ) -> Result<StreamedObject, PipelineError> {
        let namespace = NamespacePrefix::parse(namespace)?;
        let filename = validate_segment(filename)?;
        let key = object_key(&self.collection_root, namespace.as_str(), filename);

        if !self.catalog.is_published(&namespace).await {
            tracing::debug!(key = %key, "Namespace not published");
            return Err(PipelineError::ObjectNotFound(key));
        }

        match self.store.get(&key).await {
            Ok(body) => Ok(StreamedObject {
                content_type: content_type_for(filename),
                key,
                body,
            }),
            Err(StorageError::NotFound(_)) => {
                tracing::debug!(key = %key, "Object not found");
                Err(PipelineError::ObjectNotFound(key))
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Object fetch failed");
                Err(PipelineError::ObjectNotFound(key))
            }
        }
    }
}
