use crate::application::catalog::Catalog;
use crate::application::segmenter::{Segmenter, SegmenterConfig};
use crate::application::uploader::Uploader;
use crate::config::AppConfig;
use crate::domain::hls::is_playlist;
use crate::domain::jobs::{JobStatus, PackagingJob};
use crate::domain::keys::namespace_folder;
use crate::domain::namespace::{NamespaceAllocator, NamespacePrefix};
use crate::domain::walker::walk;
use crate::error::PipelineError;
use crate::ports::storage::ObjectStore;
use crate::ports::transcoder::Transcoder;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Drives packaging jobs through the working directory:
/// segment, then walk, allocate, upload and publish.
pub struct PackagingService {
    config: Arc<AppConfig>,
    segmenter: Segmenter,
    uploader: Uploader,
    allocator: NamespaceAllocator,
    catalog: Arc<Catalog>,
    // Held for the whole of a convert or publish so jobs never share the directory.
    workdir: Mutex<()>,
    last_job: RwLock<Option<PackagingJob>>,
}

impl PackagingService {
    pub fn new(
        config: Arc<AppConfig>,
        transcoder: Arc<dyn Transcoder>,
        store: Arc<dyn ObjectStore>,
        catalog: Arc<Catalog>,
    ) -> Self {
        let segmenter = Segmenter::new(
            transcoder,
            SegmenterConfig {
                segment_duration: config.segment_duration,
                timeout: config.transcode_timeout,
                clean_output: config.clean_working_dir,
                ..SegmenterConfig::default()
            },
        );
        let uploader = Uploader::new(
            store,
            config.collection_root.clone(),
            config.upload_concurrency,
        );
        let allocator = match &config.namespace_salt {
            Some(salt) => NamespaceAllocator::new(Some(salt.clone())),
            None => NamespaceAllocator::with_random_salt(),
        };

        Self {
            config,
            segmenter,
            uploader,
            allocator,
            catalog,
            workdir: Mutex::new(()),
            last_job: RwLock::new(None),
        }
    }

    /// Object key folder of a namespace, e.g. `videos/1700000000000-1a2b3c4d/`.
    pub fn folder(&self, namespace: &NamespacePrefix) -> String {
        namespace_folder(&self.config.collection_root, namespace.as_str())
    }

    pub async fn last_job(&self) -> Option<PackagingJob> {
        self.last_job.read().await.clone()
    }

    /// Segment the configured input into the working directory.
    pub async fn convert(&self) -> Result<PackagingJob, PipelineError> {
        let _workdir = self.workdir.lock().await;

        let mut job = PackagingJob::new(
            self.config.input_file.clone(),
            self.config.working_dir.clone(),
        );
        job.status = JobStatus::Segmenting;
        self.record(&job).await;
        tracing::info!(job_id = %job.id, input = %job.input.display(), "Conversion started");

        match self.segmenter.run(&job.input, &job.working_dir).await {
            Ok(set) => {
                job.status = JobStatus::Segmented;
                job.segment_count = set.segments.len();
                job.playlist = Some(set.playlist);
                self.record(&job).await;
                Ok(job)
            }
            Err(err) => {
                job.fail(&err);
                self.record(&job).await;
                Err(err)
            }
        }
    }

    /// Upload the Segment Set in the working directory and publish it.
    ///
    /// `reuse` retries a failed upload under the namespace it already received, which
    /// overwrites the same keys instead of leaving orphans under a fresh prefix. It is
    /// only accepted for the last job's own namespace while that namespace is unpublished.
    pub async fn publish(
        &self,
        reuse: Option<NamespacePrefix>,
    ) -> Result<PackagingJob, PipelineError> {
        let _workdir = self.workdir.lock().await;
        let retried = match &reuse {
            Some(namespace) => Some(self.retryable_job(namespace).await?),
            None => None,
        };

        let working_dir = &self.config.working_dir;
        let files = walk(working_dir)?;
        let playlist = files
            .iter()
            .find(|f| is_playlist(&f.relative))
            .map(|f| f.relative.clone())
            .ok_or_else(|| PipelineError::NoSegmentSet(working_dir.clone()))?;

        let mut job = match retried {
            Some(job) => job,
            None => self.segmented_job().await,
        };
        if job.playlist.is_none() {
            job.segment_count = files.iter().filter(|f| !is_playlist(&f.relative)).count();
            job.playlist = Some(playlist);
        }
        let namespace = job
            .namespace
            .clone()
            .unwrap_or_else(|| self.allocator.allocate());
        let namespace = job.assign_namespace(namespace).clone();
        job.status = JobStatus::Uploading;
        job.error = None;
        self.record(&job).await;
        tracing::info!(
            job_id = %job.id,
            namespace = %namespace,
            files = files.len(),
            retry = reuse.is_some(),
            "Upload started"
        );

        match self.uploader.upload(&files, &namespace).await {
            Ok(_) => {
                self.catalog.publish(namespace).await;
                job.status = JobStatus::Published;
                self.record(&job).await;
                Ok(job)
            }
            Err(err) => {
                job.fail(&err);
                self.record(&job).await;
                Err(err)
            }
        }
    }

    /// The job whose failed upload under `namespace` may be retried.
    async fn retryable_job(
        &self,
        namespace: &NamespacePrefix,
    ) -> Result<PackagingJob, PipelineError> {
        let unknown = || PipelineError::UnknownNamespace(namespace.to_string());

        let job = self
            .last_job()
            .await
            .filter(|job| job.namespace.as_ref() == Some(namespace))
            .ok_or_else(unknown)?;
        let retryable = matches!(job.status, JobStatus::Failed | JobStatus::Uploading);
        if !retryable || self.catalog.is_published(namespace).await {
            tracing::warn!(job_id = %job.id, namespace = %namespace, status = ?job.status, "Retry refused");
            return Err(unknown());
        }
        Ok(job)
    }

    /// The last job if it was segmented and never uploaded, otherwise a fresh record
    /// for whatever sits in the working directory.
    async fn segmented_job(&self) -> PackagingJob {
        self.last_job()
            .await
            .filter(|job| job.status == JobStatus::Segmented && job.namespace.is_none())
            .unwrap_or_else(|| {
                PackagingJob::new(
                    self.config.input_file.clone(),
                    self.config.working_dir.clone(),
                )
            })
    }

    async fn record(&self, job: &PackagingJob) {
        *self.last_job.write().await = Some(job.clone());
    }
}
