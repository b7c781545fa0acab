//! Video records and their processing lifecycle.
//!
//! A record is the persisted description of one uploaded source video:
//! where the original lives, what was learned by probing it, the mask
//! snapshot submitted for processing, and where the edited output landed.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geometry::FrameSize;
use crate::mask::{ModelError, VideoMask};

/// Processing state of a video.
///
/// `Uploaded → Processing → Completed | Error`. A completed or failed
/// video may be submitted again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    #[default]
    #[serde(alias = "pending")]
    Uploaded,
    Processing,
    Completed,
    Error,
}

impl ProcessingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    /// Whether a new processing run may start from this state.
    pub fn accepts_submission(self) -> bool {
        !matches!(self, Self::Processing)
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata learned about a source video at import time.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub duration_secs: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Persisted record for one source video (`records/<id>.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoRecord {
    /// Unique video identifier (UUID).
    pub id: String,

    /// Owning user, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Filename as supplied by the uploader.
    pub original_filename: String,

    pub size_bytes: u64,

    #[serde(default)]
    pub duration_secs: Option<f64>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,

    pub status: ProcessingStatus,

    /// Absolute path to the stored original.
    pub original_path: PathBuf,

    /// Absolute path to the edited output once completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_path: Option<PathBuf>,

    /// Mask snapshot of the most recent submission, stored verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub masks: Option<Vec<VideoMask>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VideoRecord {
    /// Create a fresh `Uploaded` record.
    pub fn new(
        id: impl Into<String>,
        original_filename: impl Into<String>,
        original_path: impl Into<PathBuf>,
        size_bytes: u64,
        metadata: VideoMetadata,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            user_id: None,
            original_filename: original_filename.into(),
            size_bytes,
            duration_secs: metadata.duration_secs,
            width: metadata.width,
            height: metadata.height,
            status: ProcessingStatus::Uploaded,
            original_path: original_path.into(),
            edited_path: None,
            masks: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Native frame size, when both dimensions are known and non-zero.
    pub fn frame_size(&self) -> Option<FrameSize> {
        match (self.width, self.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Some(FrameSize::new(w, h)),
            _ => None,
        }
    }

    /// `<stem>_edited<.ext>` derived from the original filename.
    pub fn edited_filename(&self) -> String {
        let path = Path::new(&self.original_filename);
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("video");
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{stem}_edited.{ext}"),
            None => format!("{stem}_edited"),
        }
    }

    /// Start a processing run with the given mask snapshot.
    pub fn begin_processing(&mut self, masks: Vec<VideoMask>) -> Result<(), ModelError> {
        if !self.status.accepts_submission() {
            return Err(ModelError::InvalidTransition {
                from: self.status,
                to: ProcessingStatus::Processing,
            });
        }
        self.status = ProcessingStatus::Processing;
        self.masks = Some(masks);
        self.error_message = None;
        self.touch();
        Ok(())
    }

    /// Mark the running job as completed with its output artifact.
    pub fn complete(&mut self, edited_path: impl Into<PathBuf>) -> Result<(), ModelError> {
        self.require_processing(ProcessingStatus::Completed)?;
        self.status = ProcessingStatus::Completed;
        self.edited_path = Some(edited_path.into());
        self.error_message = None;
        self.touch();
        Ok(())
    }

    /// Mark the running job as failed.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), ModelError> {
        self.require_processing(ProcessingStatus::Error)?;
        self.status = ProcessingStatus::Error;
        self.error_message = Some(message.into());
        self.touch();
        Ok(())
    }

    fn require_processing(&self, to: ProcessingStatus) -> Result<(), ModelError> {
        if self.status != ProcessingStatus::Processing {
            return Err(ModelError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> VideoRecord {
        VideoRecord::new(
            "vid-1",
            "holiday clip.mp4",
            "/lib/originals/vid-1.mp4",
            1024,
            VideoMetadata {
                duration_secs: Some(12.0),
                width: Some(1920),
                height: Some(1080),
            },
        )
    }

    #[test]
    fn test_status_serialization_and_pending_alias() {
        assert_eq!(
            serde_json::to_string(&ProcessingStatus::Completed).unwrap(),
            "\"completed\""
        );
        let pending: ProcessingStatus = serde_json::from_str("\"pending\"").unwrap();
        assert_eq!(pending, ProcessingStatus::Uploaded);
    }

    #[test]
    fn test_full_lifecycle() {
        let mut record = sample();
        record.begin_processing(vec![]).unwrap();
        assert_eq!(record.status, ProcessingStatus::Processing);

        record.complete("/lib/edited/vid-1/holiday clip_edited.mp4").unwrap();
        assert_eq!(record.status, ProcessingStatus::Completed);
        assert!(record.edited_path.is_some());

        // A completed video can be reprocessed.
        record.begin_processing(vec![]).unwrap();
        record.fail("ffmpeg exited with status 1").unwrap();
        assert_eq!(record.status, ProcessingStatus::Error);
        assert_eq!(
            record.error_message.as_deref(),
            Some("ffmpeg exited with status 1")
        );

        record.begin_processing(vec![]).unwrap();
        assert!(record.error_message.is_none());
    }

    #[test]
    fn test_double_submission_rejected() {
        let mut record = sample();
        record.begin_processing(vec![]).unwrap();
        let err = record.begin_processing(vec![]).unwrap_err();
        assert_eq!(
            err,
            ModelError::InvalidTransition {
                from: ProcessingStatus::Processing,
                to: ProcessingStatus::Processing,
            }
        );
    }

    #[test]
    fn test_complete_requires_processing() {
        let mut record = sample();
        assert!(record.complete("/tmp/out.mp4").is_err());
        assert!(record.fail("nope").is_err());
        assert_eq!(record.status, ProcessingStatus::Uploaded);
    }

    #[test]
    fn test_edited_filename() {
        let mut record = sample();
        assert_eq!(record.edited_filename(), "holiday clip_edited.mp4");
        record.original_filename = "raw".to_string();
        assert_eq!(record.edited_filename(), "raw_edited");
    }

    #[test]
    fn test_frame_size_requires_both_dimensions() {
        let mut record = sample();
        assert_eq!(record.frame_size(), Some(FrameSize::new(1920, 1080)));
        record.height = Some(0);
        assert!(record.frame_size().is_none());
        record.height = None;
        assert!(record.frame_size().is_none());
    }

    #[test]
    fn test_record_json_roundtrip_keeps_masks() {
        let mut record = sample();
        let mask: VideoMask = serde_json::from_str(
            r#"{"id":"m1","x":10,"y":10,"width":20,"height":20,"startTime":0,"endTime":2,"intensity":10}"#,
        )
        .unwrap();
        record.begin_processing(vec![mask.clone()]).unwrap();

        let json = serde_json::to_string(&record).unwrap();
        let parsed: VideoRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.masks, Some(vec![mask]));
        assert_eq!(parsed.status, ProcessingStatus::Processing);
    }
}
