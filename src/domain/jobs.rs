use crate::domain::namespace::NamespacePrefix;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Segmenting,
    Segmented,
    Uploading,
    Published,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackagingJob {
    pub id: Uuid,
    pub input: PathBuf,
    pub working_dir: PathBuf,
    pub namespace: Option<NamespacePrefix>,
    pub status: JobStatus,
    pub playlist: Option<String>,
    pub segment_count: usize,
    pub error: Option<String>,
}

impl PackagingJob {
    pub fn new(input: PathBuf, working_dir: PathBuf) -> Self {
        Self {
            id: Uuid::new_v4(),
            input,
            working_dir,
            namespace: None,
            status: JobStatus::Pending,
            playlist: None,
            segment_count: 0,
            error: None,
        }
    }

    /// Bind the job to its remote namespace. The first assignment wins.
    pub fn assign_namespace(&mut self, namespace: NamespacePrefix) -> &NamespacePrefix {
        self.namespace.get_or_insert(namespace)
    }

    pub fn fail(&mut self, error: &impl ToString) {
        self.status = JobStatus::Failed;
        self.error = Some(error.to_string());
    }
}
