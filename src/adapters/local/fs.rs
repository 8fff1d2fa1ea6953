use crate::domain::walker::walk;
use crate::ports::storage::{ObjectStore, ObjectStream, StorageError, Visibility};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use tokio_util::io::ReaderStream;

/// Object metadata kept in `{root}/.meta/{key}.json`.
const META_DIR: &str = ".meta";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub content_type: String,
    pub public_read: bool,
}

/// Directory-backed object store: object `k` lives at `{root}/k`.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub async fn metadata(&self, key: &str) -> Result<ObjectMeta, StorageError> {
        let raw = tokio::fs::read(self.meta_path(key)?)
            .await
            .map_err(|e| not_found_or_io(key, e))?;
        serde_json::from_slice(&raw).map_err(|e| StorageError::Backend(e.to_string()))
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if key.is_empty() || escapes || key.starts_with(META_DIR) {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }

    fn meta_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        self.object_path(key)?;
        Ok(self.root.join(META_DIR).join(format!("{}.json", key)))
    }
}

fn not_found_or_io(key: &str, err: std::io::Error) -> StorageError {
    if err.kind() == std::io::ErrorKind::NotFound {
        StorageError::NotFound(key.to_string())
    } else {
        StorageError::Io(err)
    }
}

async fn create_parent(path: &Path) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(())
}

#[async_trait]
impl ObjectStore for FsStore {
    async fn put(
        &self,
        key: &str,
        source: &Path,
        content_type: &str,
        visibility: Visibility,
    ) -> Result<(), StorageError> {
        let path = self.object_path(key)?;
        let meta = ObjectMeta {
            content_type: content_type.to_string(),
            public_read: visibility == Visibility::PublicRead,
        };
        let meta_json =
            serde_json::to_vec(&meta).map_err(|e| StorageError::Backend(e.to_string()))?;

        let meta_path = self.meta_path(key)?;

        create_parent(&path).await?;
        let size = tokio::fs::copy(source, &path).await?;
        create_parent(&meta_path).await?;
        tokio::fs::write(&meta_path, meta_json).await?;

        tracing::debug!(key, path = %path.display(), size, "Stored object");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<ObjectStream, StorageError> {
        let path = self.object_path(key)?;
        let file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| not_found_or_io(key, e))?;

        Ok(Box::pin(ReaderStream::new(file)))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        if !tokio::fs::try_exists(&self.root).await? {
            return Ok(Vec::new());
        }

        let root = self.root.clone();
        let files = tokio::task::spawn_blocking(move || walk(&root))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let meta_prefix = format!("{}/", META_DIR);
        Ok(files
            .into_iter()
            .map(|f| f.relative)
            .filter(|key| !key.starts_with(&meta_prefix) && key.starts_with(prefix))
            .collect())
    }
}
