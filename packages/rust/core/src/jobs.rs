//! Generation job bookkeeping.
//!
//! [`JobStore`] is the injectable seam; [`InMemoryJobStore`] bounds memory
//! with a TTL on finished jobs and a hard cap on retained records.

use std::path::PathBuf;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use fsdgen_shared::{FsdGenError, JobId, JobsConfig, Result};

/// Lifecycle state of a generation job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Done { file_path: PathBuf },
    Failed { error: String },
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// One tracked job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    #[serde(flatten)]
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Storage for job records.
pub trait JobStore: Send + Sync {
    /// Register a new pending job, evicting old records if at capacity.
    fn insert(&self, id: JobId) -> JobRecord;

    fn get(&self, id: &JobId) -> Option<JobRecord>;

    /// Replace the status of a known job.
    fn set_status(&self, id: &JobId, status: JobStatus) -> Result<JobRecord>;

    /// Drop finished jobs past their TTL. Returns how many were removed.
    fn evict_expired(&self) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// InMemoryJobStore
// ---------------------------------------------------------------------------

/// Process-local job store.
#[derive(Debug)]
pub struct InMemoryJobStore {
    jobs: DashMap<JobId, JobRecord>,
    ttl: TimeDelta,
    max_jobs: usize,
}

impl InMemoryJobStore {
    pub fn new(config: &JobsConfig) -> Self {
        let ttl = i64::try_from(config.ttl_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX);
        Self::with_ttl(ttl, config.max_jobs)
    }

    pub fn with_ttl(ttl: TimeDelta, max_jobs: usize) -> Self {
        Self {
            jobs: DashMap::new(),
            ttl,
            max_jobs: max_jobs.max(1),
        }
    }

    /// Drop finished jobs whose last update is older than `now - ttl`.
    pub fn evict_expired_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.jobs.len();
        let ttl = self.ttl;
        self.jobs
            .retain(|_, job| !(job.status.is_finished() && now - job.updated_at > ttl));
        let evicted = before.saturating_sub(self.jobs.len());
        if evicted > 0 {
            debug!(evicted, "evicted expired jobs");
        }
        evicted
    }

    /// Oldest job by creation time, optionally restricted to finished jobs.
    fn oldest(&self, finished_only: bool) -> Option<JobId> {
        self.jobs
            .iter()
            .filter(|entry| !finished_only || entry.status.is_finished())
            .min_by_key(|entry| (entry.created_at, entry.id))
            .map(|entry| entry.id)
    }

    fn make_room(&self, now: DateTime<Utc>) {
        if self.jobs.len() < self.max_jobs {
            return;
        }
        self.evict_expired_at(now);

        while self.jobs.len() >= self.max_jobs {
            let Some(victim) = self.oldest(true).or_else(|| self.oldest(false)) else {
                break;
            };
            if let Some((_, job)) = self.jobs.remove(&victim) {
                if job.status.is_finished() {
                    debug!(job_id = %victim, "evicted finished job at capacity");
                } else {
                    warn!(job_id = %victim, "evicted pending job at capacity");
                }
            }
        }
    }
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self::new(&JobsConfig::default())
    }
}

impl JobStore for InMemoryJobStore {
    fn insert(&self, id: JobId) -> JobRecord {
        let now = Utc::now();
        self.make_room(now);

        let record = JobRecord {
            id,
            status: JobStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        self.jobs.insert(id, record.clone());
        record
    }

    fn get(&self, id: &JobId) -> Option<JobRecord> {
        self.jobs.get(id).map(|entry| entry.clone())
    }

    fn set_status(&self, id: &JobId, status: JobStatus) -> Result<JobRecord> {
        let mut entry = self
            .jobs
            .get_mut(id)
            .ok_or_else(|| FsdGenError::Job(format!("unknown job {id}")))?;
        entry.status = status;
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    fn evict_expired(&self) -> usize {
        self.evict_expired_at(Utc::now())
    }

    fn len(&self) -> usize {
        self.jobs.len()
    }
}
