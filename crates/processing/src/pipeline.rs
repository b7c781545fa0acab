//! Submission, background rendering, and record finalization.

use std::path::PathBuf;
use std::sync::Arc;

use vidblur_common::error::VidblurError;
use vidblur_mask_model::{
    LibraryError, ModelError, ProcessingStatus, VideoLibrary, VideoMask, VideoRecord,
};
use vidblur_render_engine::{
    run_blur_job, BlurJob, EncoderSettings, ProgressCallback, RenderBackend, RenderOutcome,
    RenderPlan,
};

use crate::tracker::{milestones, ProcessingTracker, QueueStats};

/// Errors raised by the processing pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Video not found: {video_id}")]
    VideoNotFound { video_id: String },

    #[error("Video {video_id} is already processing")]
    AlreadyProcessing { video_id: String },

    #[error("Invalid masks: {message}")]
    InvalidMasks { message: String },

    #[error("Invalid output for video {video_id}: {message}")]
    InvalidOutput { video_id: String, message: String },

    #[error("Cannot update video {video_id}: {source}")]
    Transition {
        video_id: String,
        source: ModelError,
    },

    #[error(transparent)]
    Library(LibraryError),

    #[error(transparent)]
    Render(#[from] VidblurError),

    #[error("Processing task failed: {message}")]
    TaskFailed { message: String },
}

impl From<LibraryError> for ProcessingError {
    fn from(err: LibraryError) -> Self {
        match err {
            LibraryError::NotFound { id } => Self::VideoNotFound { video_id: id },
            other => Self::Library(other),
        }
    }
}

/// Status of a video as reported to clients.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub status: ProcessingStatus,
    pub progress: u8,
    pub error: Option<String>,
    pub edited_path: Option<PathBuf>,
}

/// A submitted job running in the background.
#[derive(Debug)]
pub struct JobHandle {
    pub video_id: String,
    /// `"pass_through"` or `"blur"`.
    pub plan: &'static str,
    handle: tokio::task::JoinHandle<Result<RenderOutcome, ProcessingError>>,
}

impl JobHandle {
    /// Wait for the job to finish. Dropping the handle instead detaches it.
    pub async fn wait(self) -> Result<RenderOutcome, ProcessingError> {
        self.handle.await.map_err(|e| ProcessingError::TaskFailed {
            message: e.to_string(),
        })?
    }
}

/// A validated job whose record has already moved to `processing`.
struct PreparedJob {
    record: VideoRecord,
    job: BlurJob,
    plan: &'static str,
}

/// Owns the library, the live tracker, and the render backend.
#[derive(Clone)]
pub struct Processor {
    library: VideoLibrary,
    tracker: ProcessingTracker,
    backend: Arc<dyn RenderBackend>,
    encoder: EncoderSettings,
}

impl Processor {
    pub fn new(
        library: VideoLibrary,
        backend: Arc<dyn RenderBackend>,
        encoder: EncoderSettings,
    ) -> Self {
        Self {
            library,
            tracker: ProcessingTracker::new(),
            backend,
            encoder,
        }
    }

    pub fn library(&self) -> &VideoLibrary {
        &self.library
    }

    pub fn tracker(&self) -> &ProcessingTracker {
        &self.tracker
    }

    pub fn encoder(&self) -> &EncoderSettings {
        &self.encoder
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Validate and start a job on the Tokio runtime.
    ///
    /// The record is `processing` before this returns. Must be called from
    /// within a runtime.
    pub fn submit(
        &self,
        video_id: &str,
        masks: Vec<VideoMask>,
    ) -> Result<JobHandle, ProcessingError> {
        let prepared = self.prepare(video_id, masks)?;
        let plan = prepared.plan;

        let processor = self.clone();
        let job_video_id = video_id.to_string();
        let handle = tokio::spawn(async move {
            let worker = processor.clone();
            match tokio::task::spawn_blocking(move || worker.execute(prepared)).await {
                Ok(result) => result,
                Err(join_err) => {
                    // The blocking task panicked before finalizing.
                    let message = format!("Render task aborted: {join_err}");
                    processor.fail_by_id(&job_video_id, &message);
                    Err(ProcessingError::TaskFailed { message })
                }
            }
        });

        Ok(JobHandle {
            video_id: video_id.to_string(),
            plan,
            handle,
        })
    }

    /// Validate and run a job on the current thread.
    pub fn process_blocking(
        &self,
        video_id: &str,
        masks: Vec<VideoMask>,
    ) -> Result<RenderOutcome, ProcessingError> {
        let prepared = self.prepare(video_id, masks)?;
        self.execute(prepared)
    }

    fn prepare(
        &self,
        video_id: &str,
        masks: Vec<VideoMask>,
    ) -> Result<PreparedJob, ProcessingError> {
        if !self.tracker.try_start(video_id) {
            return Err(ProcessingError::AlreadyProcessing {
                video_id: video_id.to_string(),
            });
        }

        match self.prepare_started(video_id, masks) {
            Ok(prepared) => Ok(prepared),
            Err(err) => {
                self.tracker.remove(video_id);
                Err(err)
            }
        }
    }

    fn prepare_started(
        &self,
        video_id: &str,
        masks: Vec<VideoMask>,
    ) -> Result<PreparedJob, ProcessingError> {
        let mut record = self.library.load(video_id)?;
        if record.status == ProcessingStatus::Processing {
            return Err(ProcessingError::AlreadyProcessing {
                video_id: video_id.to_string(),
            });
        }

        let masks = self.validate_masks(&record, masks)?;
        if !record.original_path.exists() {
            return Err(ProcessingError::Render(VidblurError::FileNotFound {
                path: record.original_path.clone(),
            }));
        }

        let job = BlurJob {
            input_path: self.library.original_path(&record),
            output_path: self.library.prepare_edited_path(&record)?,
            masks,
            duration_secs: record.duration_secs,
            encoder: self.encoder.clone(),
        };
        let plan = RenderPlan::for_job(&job)?.label();

        record
            .begin_processing(job.masks.clone())
            .map_err(|source| ProcessingError::Transition {
                video_id: video_id.to_string(),
                source,
            })?;
        self.library.save(&record)?;
        self.tracker.set_progress(video_id, milestones::PREPARED);

        tracing::info!(
            video_id,
            masks = job.masks.len(),
            plan,
            output = %job.output_path.display(),
            "Processing submitted"
        );

        Ok(PreparedJob { record, job, plan })
    }

    /// Cap windows at the known duration and reject masks outside the
    /// known frame.
    fn validate_masks(
        &self,
        record: &VideoRecord,
        masks: Vec<VideoMask>,
    ) -> Result<Vec<VideoMask>, ProcessingError> {
        let frame = record.frame_size();
        masks
            .into_iter()
            .map(|mask| {
                if let Some(frame) = frame {
                    if !mask.rect().fits_within(frame) {
                        let rect = mask.rect();
                        return Err(ProcessingError::InvalidMasks {
                            message: format!(
                                "mask {} ({}x{} at {},{}) lies outside the {}x{} frame",
                                mask.id(),
                                rect.width,
                                rect.height,
                                rect.x,
                                rect.y,
                                frame.width,
                                frame.height
                            ),
                        });
                    }
                }
                match record.duration_secs {
                    Some(duration) if mask.window().end() > duration => {
                        tracing::debug!(
                            mask_id = %mask.id(),
                            end = mask.window().end(),
                            duration,
                            "Capping mask window at video duration"
                        );
                        Ok(mask.with_window_capped(duration))
                    }
                    _ => Ok(mask),
                }
            })
            .collect()
    }

    /// Render and finalize. Always leaves the record `completed` or `error`.
    fn execute(&self, prepared: PreparedJob) -> Result<RenderOutcome, ProcessingError> {
        let PreparedJob {
            mut record,
            job,
            plan,
        } = prepared;
        let video_id = record.id.clone();
        self.tracker.set_progress(&video_id, milestones::RENDERING);

        let tracker = self.tracker.clone();
        let progress_id = video_id.clone();
        let span = f64::from(milestones::RENDERED - milestones::RENDERING);
        let callback: ProgressCallback = Box::new(move |p| {
            let pct = f64::from(milestones::RENDERING) + span * p.progress.clamp(0.0, 1.0);
            tracker.set_progress(&progress_id, pct.floor() as u8);
        });

        let result = run_blur_job(self.backend.as_ref(), &job, Some(callback));

        match result {
            Ok(outcome) => {
                self.tracker.set_progress(&video_id, milestones::RENDERED);
                record
                    .complete(&outcome.output_path)
                    .map_err(|source| ProcessingError::Transition {
                        video_id: video_id.clone(),
                        source,
                    })?;
                if let Err(err) = self.library.save(&record) {
                    tracing::error!(
                        video_id = %video_id,
                        error = %err,
                        "Failed to persist completed record"
                    );
                    self.tracker.fail(&video_id, err.to_string());
                    return Err(err.into());
                }
                self.tracker.complete(&video_id, outcome.output_path.clone());
                tracing::info!(
                    video_id = %video_id,
                    plan,
                    codec = outcome.codec.as_deref().unwrap_or("copy"),
                    elapsed_secs = outcome.elapsed_secs,
                    "Processing completed"
                );
                Ok(outcome)
            }
            Err(err) => {
                let message = err.to_string();
                tracing::error!(video_id = %video_id, plan, error = %message, "Processing failed");
                if let Err(model_err) = record.fail(message.clone()) {
                    tracing::error!(
                        video_id = %video_id,
                        error = %model_err,
                        "Unexpected record state"
                    );
                }
                if let Err(save_err) = self.library.save(&record) {
                    tracing::error!(
                        video_id = %video_id,
                        error = %save_err,
                        "Failed to persist failed record"
                    );
                }
                self.tracker.fail(&video_id, message);
                Err(err.into())
            }
        }
    }

    fn fail_by_id(&self, video_id: &str, message: &str) {
        self.tracker.fail(video_id, message);
        match self.library.load(video_id) {
            Ok(mut record) => {
                if record.fail(message).is_ok() {
                    if let Err(err) = self.library.save(&record) {
                        tracing::error!(video_id, error = %err, "Failed to persist failed record");
                    }
                }
            }
            Err(err) => tracing::error!(video_id, error = %err, "Failed to load record"),
        }
    }

    /// Status from the live tracker first, the persisted record second.
    pub fn status(&self, video_id: &str) -> Result<StatusReport, ProcessingError> {
        if let Some(job) = self.tracker.get(video_id) {
            return Ok(StatusReport {
                status: job.status,
                progress: job.progress,
                error: job.error,
                edited_path: job.edited_path,
            });
        }

        let record = self.library.load(video_id)?;
        let progress = match record.status {
            ProcessingStatus::Completed => milestones::DONE,
            _ => milestones::QUEUED,
        };
        Ok(StatusReport {
            status: record.status,
            progress,
            error: record.error_message,
            edited_path: record.edited_path,
        })
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.tracker.queue_stats()
    }

    /// Apply a completion notice from an external renderer.
    ///
    /// Only a record left `processing` by some other worker can be
    /// finalized; a job this process is rendering is rejected. A reported
    /// output must be an existing file in the record's edited directory.
    /// Success without an output path falls back to the conventional edited
    /// location, and if nothing was written there the record is failed.
    pub fn complete_external(
        &self,
        video_id: &str,
        success: bool,
        output_path: Option<PathBuf>,
        error: Option<String>,
    ) -> Result<VideoRecord, ProcessingError> {
        if self.tracker.is_processing(video_id) {
            return Err(ProcessingError::AlreadyProcessing {
                video_id: video_id.to_string(),
            });
        }

        let mut record = self.library.load(video_id)?;
        let transition = |source| ProcessingError::Transition {
            video_id: video_id.to_string(),
            source,
        };
        if record.status != ProcessingStatus::Processing {
            let to = if success {
                ProcessingStatus::Completed
            } else {
                ProcessingStatus::Error
            };
            return Err(transition(ModelError::InvalidTransition {
                from: record.status,
                to,
            }));
        }

        let outcome = if !success {
            Err(error.unwrap_or_else(|| "External processing failed".to_string()))
        } else if let Some(reported) = output_path {
            let Some(path) = self.library.resolve_edited_artifact(&record, &reported) else {
                tracing::warn!(
                    video_id,
                    output = %reported.display(),
                    "Rejected external output outside the edited directory"
                );
                return Err(ProcessingError::InvalidOutput {
                    video_id: video_id.to_string(),
                    message: format!(
                        "{} is not an edited output of this video",
                        reported.display()
                    ),
                });
            };
            Ok(path)
        } else {
            let expected = self.library.edited_path_for(&record);
            self.library
                .resolve_edited_artifact(&record, &expected)
                .ok_or_else(|| "Reported success but no edited output was written".to_string())
        };

        match outcome {
            Ok(path) => {
                record.complete(&path).map_err(transition)?;
                self.library.save(&record)?;
                self.tracker.complete(video_id, path);
                tracing::info!(video_id, "External processing completed");
            }
            Err(message) => {
                record.fail(message.clone()).map_err(transition)?;
                self.library.save(&record)?;
                tracing::warn!(video_id, error = %message, "External processing failed");
                self.tracker.fail(video_id, message);
            }
        }
        Ok(record)
    }

    /// Mark records left `processing` by a previous run as failed.
    ///
    /// Returns the ids that were recovered.
    pub fn recover_interrupted(&self) -> Result<Vec<String>, ProcessingError> {
        let mut recovered = Vec::new();
        for mut record in self.library.list()? {
            if record.status != ProcessingStatus::Processing
                || self.tracker.is_processing(&record.id)
            {
                continue;
            }
            if record.fail("Processing was interrupted").is_ok() {
                self.library.save(&record)?;
                tracing::warn!(video_id = %record.id, "Recovered interrupted job");
                recovered.push(record.id);
            }
        }
        Ok(recovered)
    }
}

impl std::fmt::Debug for Processor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processor")
            .field("library", &self.library)
            .field("backend", &self.backend.name())
            .finish()
    }
}
