//! Live processing status, keyed by video id.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use vidblur_mask_model::ProcessingStatus;

/// Minutes of wait estimated per video currently processing.
pub const MINUTES_PER_VIDEO: u32 = 2;

/// How long a finished entry is kept. Its outcome is also on the record,
/// which status lookups fall back to once the entry is gone.
pub const FINISHED_RETENTION_SECS: i64 = 600;

/// Progress milestones reported while a job runs.
pub mod milestones {
    pub const QUEUED: u8 = 0;
    pub const PREPARED: u8 = 20;
    pub const RENDERING: u8 = 40;
    pub const RENDERED: u8 = 80;
    pub const DONE: u8 = 100;
}

/// Snapshot of one video's processing state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgress {
    pub status: ProcessingStatus,
    /// Percent complete, 0-100.
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edited_path: Option<PathBuf>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Queue summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub queue_length: usize,
    pub estimated_wait_minutes: u32,
}

/// Shared map of in-flight and recently finished jobs.
#[derive(Debug, Clone, Default)]
pub struct ProcessingTracker(Arc<Mutex<HashMap<String, JobProgress>>>);

impl ProcessingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, JobProgress>> {
        // Entries are plain values; a panic mid-update leaves nothing half-written.
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark a video as processing. Returns `false` if it already is.
    pub fn try_start(&self, video_id: &str) -> bool {
        let mut entries = self.entries();
        if entries
            .get(video_id)
            .is_some_and(|job| job.status == ProcessingStatus::Processing)
        {
            return false;
        }
        let now = Utc::now();
        prune_finished(&mut entries, now);
        entries.insert(
            video_id.to_string(),
            JobProgress {
                status: ProcessingStatus::Processing,
                progress: milestones::QUEUED,
                error: None,
                edited_path: None,
                started_at: now,
                updated_at: now,
            },
        );
        true
    }

    /// Record progress. Never moves backwards and ignores finished jobs.
    pub fn set_progress(&self, video_id: &str, progress: u8) {
        if let Some(job) = self.entries().get_mut(video_id) {
            if job.status == ProcessingStatus::Processing && progress > job.progress {
                job.progress = progress.min(milestones::DONE);
                job.updated_at = Utc::now();
            }
        }
    }

    pub fn complete(&self, video_id: &str, edited_path: PathBuf) {
        self.finish(video_id, |job| {
            job.status = ProcessingStatus::Completed;
            job.progress = milestones::DONE;
            job.edited_path = Some(edited_path);
            job.error = None;
        });
    }

    pub fn fail(&self, video_id: &str, message: impl Into<String>) {
        let message = message.into();
        self.finish(video_id, |job| {
            job.status = ProcessingStatus::Error;
            job.error = Some(message);
        });
    }

    fn finish(&self, video_id: &str, apply: impl FnOnce(&mut JobProgress)) {
        let now = Utc::now();
        let mut entries = self.entries();
        prune_finished(&mut entries, now);
        let job = entries
            .entry(video_id.to_string())
            .or_insert_with(|| JobProgress {
                status: ProcessingStatus::Processing,
                progress: milestones::QUEUED,
                error: None,
                edited_path: None,
                started_at: now,
                updated_at: now,
            });
        apply(job);
        job.updated_at = now;
    }

    /// Forget a video (used to roll back a rejected submission).
    pub fn remove(&self, video_id: &str) -> Option<JobProgress> {
        self.entries().remove(video_id)
    }

    pub fn get(&self, video_id: &str) -> Option<JobProgress> {
        self.entries().get(video_id).cloned()
    }

    pub fn is_processing(&self, video_id: &str) -> bool {
        self.get(video_id)
            .is_some_and(|job| job.status == ProcessingStatus::Processing)
    }

    /// Number of videos currently processing.
    pub fn queue_length(&self) -> usize {
        self.entries()
            .values()
            .filter(|job| job.status == ProcessingStatus::Processing)
            .count()
    }

    pub fn queue_stats(&self) -> QueueStats {
        let queue_length = self.queue_length();
        QueueStats {
            queue_length,
            estimated_wait_minutes: (queue_length as u32).saturating_mul(MINUTES_PER_VIDEO),
        }
    }

    /// Number of tracked entries, running or finished.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

/// Drop finished entries older than [`FINISHED_RETENTION_SECS`].
fn prune_finished(entries: &mut HashMap<String, JobProgress>, now: DateTime<Utc>) {
    let cutoff = now - chrono::Duration::seconds(FINISHED_RETENTION_SECS);
    entries.retain(|_, job| job.status == ProcessingStatus::Processing || job.updated_at > cutoff);
}
