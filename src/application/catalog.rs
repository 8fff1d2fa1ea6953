//! Registry of namespaces whose upload fully completed.
//!
//! The Stream Gateway only resolves namespaces found here, so consumers never see a
//! Segment Set while it is still being uploaded.

use crate::domain::hls::{is_playlist, MediaPlaylist};
use crate::domain::namespace::NamespacePrefix;
use crate::ports::storage::{ObjectStore, StorageError};
use bytes::Bytes;
use futures::TryStreamExt;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct Catalog {
    published: RwLock<HashSet<NamespacePrefix>>,
}

impl Catalog {
    pub async fn publish(&self, namespace: NamespacePrefix) {
        tracing::info!(namespace = %namespace, "Namespace published");
        self.published.write().await.insert(namespace);
    }

    pub async fn is_published(&self, namespace: &NamespacePrefix) -> bool {
        self.published.read().await.contains(namespace)
    }

    /// Publish namespaces already present in the store from earlier runs.
    ///
    /// A namespace qualifies only if it holds at least one finished playlist (ending in
    /// `#EXT-X-ENDLIST`) and every segment referenced by its playlists is present. Returns the number of namespaces published.
    pub async fn hydrate(
        &self,
        store: &dyn ObjectStore,
        collection_root: &str,
    ) -> Result<usize, StorageError> {
        let root = format!("{}/", collection_root.trim_matches('/'));
        let keys = store.list(&root).await?;

        let mut namespaces: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for key in &keys {
            if let Some((namespace, relative)) =
                key.strip_prefix(&root).and_then(|rest| rest.split_once('/'))
            {
                namespaces
                    .entry(namespace.to_string())
                    .or_default()
                    .insert(relative.to_string());
            }
        }

        let mut published = 0;
        for (namespace, files) in namespaces {
            let Ok(prefix) = NamespacePrefix::parse(&namespace) else {
                tracing::debug!(namespace = %namespace, "Skipping foreign key prefix");
                continue;
            };
            match is_complete(store, &root, &namespace, &files).await {
                Ok(true) => {
                    self.published.write().await.insert(prefix);
                    published += 1;
                }
                Ok(false) => {
                    tracing::warn!(namespace = %namespace, "Incomplete segment set left unpublished");
                }
                Err(e) => {
                    tracing::warn!(namespace = %namespace, error = %e, "Could not check segment set");
                }
            }
        }

        tracing::info!(published, "Catalog hydrated from object store");
        Ok(published)
    }
}

async fn is_complete(
    store: &dyn ObjectStore,
    root: &str,
    namespace: &str,
    files: &BTreeSet<String>,
) -> Result<bool, StorageError> {
    let playlists: Vec<&String> = files.iter().filter(|f| is_playlist(f)).collect();
    if playlists.is_empty() {
        return Ok(false);
    }

    for playlist_path in playlists {
        let key = format!("{}{}/{}", root, namespace, playlist_path);
        let chunks: Vec<Bytes> = store.get(&key).await?.try_collect().await?;
        let text = String::from_utf8_lossy(&chunks.concat()).into_owned();
        let playlist = match MediaPlaylist::parse(&text) {
            Ok(playlist) if playlist.end_list => playlist,
            _ => return Ok(false),
        };

        let dir = playlist_path
            .rsplit_once('/')
            .map(|(dir, _)| format!("{}/", dir))
            .unwrap_or_default();
        if !playlist
            .uris()
            .all(|uri| files.contains(&format!("{}{}", dir, uri)))
        {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::local::fs::FsStore;
    use crate::ports::storage::Visibility;
    use tempfile::{tempdir, NamedTempFile};

    async fn put(store: &FsStore, key: &str, body: &str) {
        let source = NamedTempFile::new().unwrap();
        std::fs::write(source.path(), body).unwrap();
        store
            .put(key, source.path(), "video/MP2T", Visibility::PublicRead)
            .await
            .unwrap();
    }

    fn ns(value: &str) -> NamespacePrefix {
        NamespacePrefix::parse(value).unwrap()
    }

    #[tokio::test]
    async fn test_publish_then_resolve() {
        let catalog = Catalog::default();
        assert!(!catalog.is_published(&ns("1")).await);

        catalog.publish(ns("1")).await;
        assert!(catalog.is_published(&ns("1")).await);
        assert!(!catalog.is_published(&ns("2")).await);
    }

    #[tokio::test]
    async fn test_hydrate_only_complete_sets() {
        let dir = tempdir().unwrap();
        let store = FsStore::new(dir.path());
        let playlist = "#EXTM3U\n#EXTINF:10.0,\ntimer0.ts\n#EXTINF:3.0,\ntimer1.ts\n#EXT-X-ENDLIST\n";

        // Complete
        put(&store, "videos/100/timer.m3u8", playlist).await;
        put(&store, "videos/100/timer0.ts", "a").await;
        put(&store, "videos/100/timer1.ts", "b").await;
        // Playlist uploaded, one segment missing
        put(&store, "videos/200/timer.m3u8", playlist).await;
        put(&store, "videos/200/timer0.ts", "a").await;
        // Segments only
        put(&store, "videos/300/timer0.ts", "a").await;
        // Playlist from an interrupted run
        put(&store, "videos/250/timer.m3u8", &playlist.replace("#EXT-X-ENDLIST\n", "")).await;
        put(&store, "videos/250/timer0.ts", "a").await;
        put(&store, "videos/250/timer1.ts", "b").await;
        // Nested playlist
        put(&store, "videos/400/hd/timer.m3u8", playlist).await;
        put(&store, "videos/400/hd/timer0.ts", "a").await;
        put(&store, "videos/400/hd/timer1.ts", "b").await;
        // Outside the collection root
        put(&store, "other/500/timer.m3u8", playlist).await;

        let catalog = Catalog::default();
        let published = catalog.hydrate(&store, "videos").await.unwrap();

        assert_eq!(published, 2);
        assert!(catalog.is_published(&ns("100")).await);
        assert!(!catalog.is_published(&ns("200")).await);
        assert!(!catalog.is_published(&ns("250")).await);
        assert!(!catalog.is_published(&ns("300")).await);
        assert!(catalog.is_published(&ns("400")).await);
        assert!(!catalog.is_published(&ns("500")).await);
    }
}
