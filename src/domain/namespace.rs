//! Namespace prefixes scoping one job's objects in the shared key space.

use crate::domain::keys::validate_segment;
use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NamespacePrefix(String);

impl NamespacePrefix {
    /// Accept an externally supplied prefix, e.g. one reused for a retry.
    pub fn parse(value: &str) -> Result<Self, PipelineError> {
        validate_segment(value).map(|v| Self(v.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NamespacePrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Issues `{millis}` or `{millis}-{salt}` prefixes.
///
/// The millisecond part is strictly increasing per allocator, so two calls never
/// return the same value even inside one millisecond. The salt separates processes.
#[derive(Debug)]
pub struct NamespaceAllocator {
    last_issued: AtomicU64,
    salt: Option<String>,
}

impl NamespaceAllocator {
    pub fn new(salt: Option<String>) -> Self {
        Self {
            last_issued: AtomicU64::new(0),
            salt: salt.filter(|s| !s.is_empty()),
        }
    }

    /// Allocator salted with a random per-process token.
    pub fn with_random_salt() -> Self {
        let token = Uuid::new_v4().simple().to_string();
        Self::new(Some(token[..8].to_string()))
    }

    pub fn allocate(&self) -> NamespacePrefix {
        let now = now_millis();
        let previous = self
            .last_issued
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            // The closure always returns Some.
            .unwrap_or_else(|last| last);
        let issued = now.max(previous + 1);

        match &self.salt {
            Some(salt) => NamespacePrefix(format!("{}-{}", issued, salt)),
            None => NamespacePrefix(issued.to_string()),
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
