//! Processing pipeline tests against a scripted render backend.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use vidblur_common::error::{VidblurError, VidblurResult};
use vidblur_mask_model::{
    Intensity, MaskId, PixelRect, ProcessingStatus, TimeWindow, VideoLibrary, VideoMask,
    VideoMetadata, VideoRecord,
};
use vidblur_processing::{ProcessingError, Processor};
use vidblur_render_engine::{
    BlurJob, EncoderSettings, ProgressCallback, RenderBackend, RenderOutcome, RenderPlan,
    RenderProgress, RenderStage,
};

/// Writes a marker file instead of transcoding and remembers every job.
struct FakeBackend {
    fail_with: Option<String>,
    jobs: Mutex<Vec<BlurJob>>,
}

impl FakeBackend {
    fn ok() -> Arc<Self> {
        Arc::new(Self {
            fail_with: None,
            jobs: Mutex::new(Vec::new()),
        })
    }

    fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            fail_with: Some(message.to_string()),
            jobs: Mutex::new(Vec::new()),
        })
    }

    fn jobs(&self) -> Vec<BlurJob> {
        self.jobs.lock().unwrap().clone()
    }
}

impl RenderBackend for FakeBackend {
    fn render(
        &self,
        job: &BlurJob,
        progress: Option<ProgressCallback>,
    ) -> VidblurResult<RenderOutcome> {
        self.jobs.lock().unwrap().push(job.clone());
        if let Some(message) = &self.fail_with {
            return Err(VidblurError::render(message.clone()));
        }
        if let Some(cb) = &progress {
            cb(RenderProgress {
                progress: 0.5,
                out_time_secs: 5.0,
                eta_secs: 1.0,
                stage: RenderStage::Rendering,
            });
        }
        std::fs::write(&job.output_path, b"edited")?;
        let plan = RenderPlan::for_job(job)?;
        Ok(RenderOutcome {
            output_path: job.output_path.clone(),
            plan: plan.label(),
            codec: (!plan.is_pass_through()).then(|| "libx264".to_string()),
            elapsed_secs: 0.01,
        })
    }

    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "fake"
    }
}

struct Fixture {
    dir: tempfile::TempDir,
    processor: Processor,
    record: VideoRecord,
}

fn fixture(backend: Arc<FakeBackend>) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let library = VideoLibrary::open(dir.path()).unwrap();
    let record = library
        .import_bytes(
            "beach.mp4",
            b"source",
            VideoMetadata {
                duration_secs: Some(10.0),
                width: Some(1920),
                height: Some(1080),
            },
        )
        .unwrap();
    let processor = Processor::new(library, backend, EncoderSettings::default());
    Fixture {
        dir,
        processor,
        record,
    }
}

fn mask(rect: PixelRect, start: f64, end: f64) -> VideoMask {
    VideoMask::new(
        MaskId::generate(),
        rect,
        TimeWindow::new(start, end).unwrap(),
        Intensity::new(20),
    )
    .unwrap()
}

#[tokio::test]
async fn test_submit_blur_job_completes_record() {
    let backend = FakeBackend::ok();
    let fx = fixture(backend.clone());
    let id = fx.record.id.clone();

    let handle = fx
        .processor
        .submit(&id, vec![mask(PixelRect::new(240, 120, 480, 240), 1.0, 4.0)])
        .unwrap();
    assert_eq!(handle.plan, "blur");

    let outcome = handle.wait().await.unwrap();
    assert_eq!(outcome.plan, "blur");
    assert!(outcome.output_path.ends_with("beach_edited.mp4"));
    assert_eq!(std::fs::read(&outcome.output_path).unwrap(), b"edited");

    let record = fx.processor.library().load(&id).unwrap();
    assert_eq!(record.status, ProcessingStatus::Completed);
    assert_eq!(record.edited_path.as_ref(), Some(&outcome.output_path));
    assert_eq!(record.masks.as_ref().map(Vec::len), Some(1));

    let status = fx.processor.status(&id).unwrap();
    assert_eq!(status.status, ProcessingStatus::Completed);
    assert_eq!(status.progress, 100);
    assert_eq!(backend.jobs().len(), 1);
}

#[tokio::test]
async fn test_zero_masks_pass_through() {
    let backend = FakeBackend::ok();
    let fx = fixture(backend.clone());

    let handle = fx.processor.submit(&fx.record.id, vec![]).unwrap();
    assert_eq!(handle.plan, "pass_through");
    let outcome = handle.wait().await.unwrap();
    assert_eq!(outcome.plan, "pass_through");
    assert!(outcome.codec.is_none());
    assert!(backend.jobs()[0].masks.is_empty());
}

#[tokio::test]
async fn test_render_failure_marks_record_error() {
    let fx = fixture(FakeBackend::failing("ffmpeg failed (status 1): boom"));
    let id = fx.record.id.clone();

    let handle = fx
        .processor
        .submit(&id, vec![mask(PixelRect::new(0, 0, 100, 100), 0.0, 1.0)])
        .unwrap();
    let err = handle.wait().await.unwrap_err();
    assert!(matches!(err, ProcessingError::Render(_)));

    let record = fx.processor.library().load(&id).unwrap();
    assert_eq!(record.status, ProcessingStatus::Error);
    assert!(record.error_message.unwrap().contains("boom"));

    let status = fx.processor.status(&id).unwrap();
    assert_eq!(status.status, ProcessingStatus::Error);
    assert!(status.error.unwrap().contains("boom"));
    assert_eq!(fx.processor.queue_stats().queue_length, 0);
}

#[test]
fn test_failed_video_can_be_resubmitted() {
    let fx = fixture(FakeBackend::failing("nope"));
    let id = fx.record.id.clone();
    assert!(fx.processor.process_blocking(&id, vec![]).is_err());
    // A second attempt is accepted and fails again rather than conflicting.
    let err = fx.processor.process_blocking(&id, vec![]).unwrap_err();
    assert!(matches!(err, ProcessingError::Render(_)));
}

#[test]
fn test_process_blocking_caps_windows_at_duration() {
    let backend = FakeBackend::ok();
    let fx = fixture(backend.clone());

    fx.processor
        .process_blocking(
            &fx.record.id,
            vec![mask(PixelRect::new(0, 0, 64, 64), 8.0, 30.0)],
        )
        .unwrap();

    let jobs = backend.jobs();
    assert_eq!(jobs[0].masks[0].window().end(), 10.0);
    assert_eq!(jobs[0].duration_secs, Some(10.0));
}

#[test]
fn test_mask_outside_frame_rejected_without_state_change() {
    let fx = fixture(FakeBackend::ok());
    let id = fx.record.id.clone();

    let err = fx
        .processor
        .process_blocking(&id, vec![mask(PixelRect::new(1900, 0, 100, 100), 0.0, 1.0)])
        .unwrap_err();
    assert!(matches!(err, ProcessingError::InvalidMasks { .. }));

    let record = fx.processor.library().load(&id).unwrap();
    assert_eq!(record.status, ProcessingStatus::Uploaded);
    assert!(fx.processor.tracker().get(&id).is_none());
}

#[test]
fn test_unknown_video() {
    let fx = fixture(FakeBackend::ok());
    let err = fx.processor.process_blocking("does-not-exist", vec![]).unwrap_err();
    assert!(matches!(err, ProcessingError::VideoNotFound { .. }));
    assert!(matches!(
        fx.processor.status("does-not-exist"),
        Err(ProcessingError::VideoNotFound { .. })
    ));
}

#[test]
fn test_already_processing_conflicts() {
    let fx = fixture(FakeBackend::ok());
    let id = fx.record.id.clone();

    // Live job in the tracker.
    assert!(fx.processor.tracker().try_start(&id));
    let err = fx.processor.process_blocking(&id, vec![]).unwrap_err();
    assert!(matches!(err, ProcessingError::AlreadyProcessing { .. }));
    fx.processor.tracker().remove(&id);

    // Persisted record already processing.
    let mut record = fx.processor.library().load(&id).unwrap();
    record.begin_processing(vec![]).unwrap();
    fx.processor.library().save(&record).unwrap();
    let err = fx.processor.process_blocking(&id, vec![]).unwrap_err();
    assert!(matches!(err, ProcessingError::AlreadyProcessing { .. }));
    assert!(fx.processor.tracker().get(&id).is_none());
}

#[test]
fn test_status_falls_back_to_record() {
    let fx = fixture(FakeBackend::ok());
    let status = fx.processor.status(&fx.record.id).unwrap();
    assert_eq!(status.status, ProcessingStatus::Uploaded);
    assert_eq!(status.progress, 0);
}

/// Move the fixture's record to `processing` as an external worker would.
fn mark_processing(fx: &Fixture) -> VideoRecord {
    let mut record = fx.processor.library().load(&fx.record.id).unwrap();
    record.begin_processing(vec![]).unwrap();
    fx.processor.library().save(&record).unwrap();
    record
}

#[test]
fn test_external_completion() {
    let fx = fixture(FakeBackend::ok());
    let id = fx.record.id.clone();

    // Not processing yet: transition rejected.
    let err = fx
        .processor
        .complete_external(&id, true, None, None)
        .unwrap_err();
    assert!(matches!(err, ProcessingError::Transition { .. }));

    let record = mark_processing(&fx);
    let output = fx.processor.library().prepare_edited_path(&record).unwrap();
    std::fs::write(&output, b"rendered elsewhere").unwrap();

    let record = fx
        .processor
        .complete_external(&id, true, Some(output.clone()), None)
        .unwrap();
    assert_eq!(record.status, ProcessingStatus::Completed);
    assert_eq!(record.edited_path, Some(std::fs::canonicalize(&output).unwrap()));
    assert_eq!(
        fx.processor.status(&id).unwrap().status,
        ProcessingStatus::Completed
    );
}

#[test]
fn test_external_output_outside_library_is_rejected() {
    let fx = fixture(FakeBackend::ok());
    let id = fx.record.id.clone();
    let record = mark_processing(&fx);
    fx.processor.library().prepare_edited_path(&record).unwrap();

    let secret = fx.dir.path().join("secret.txt");
    std::fs::write(&secret, b"not a video").unwrap();

    let attempts = [
        secret,
        PathBuf::from(format!("../../records/{id}.json")),
        PathBuf::from("/etc/passwd"),
    ];
    for reported in attempts {
        let err = fx
            .processor
            .complete_external(&id, true, Some(reported), None)
            .unwrap_err();
        assert!(matches!(err, ProcessingError::InvalidOutput { .. }), "{err}");
    }

    // Nothing changed.
    let record = fx.processor.library().load(&id).unwrap();
    assert_eq!(record.status, ProcessingStatus::Processing);
    assert!(record.edited_path.is_none());
}

#[test]
fn test_external_success_without_output_fails_record() {
    let fx = fixture(FakeBackend::ok());
    let id = fx.record.id.clone();
    mark_processing(&fx);

    let record = fx
        .processor
        .complete_external(&id, true, None, None)
        .unwrap();
    assert_eq!(record.status, ProcessingStatus::Error);
    assert!(record.edited_path.is_none());
    assert!(record.error_message.is_some());
}

#[test]
fn test_external_success_uses_conventional_output() {
    let fx = fixture(FakeBackend::ok());
    let id = fx.record.id.clone();
    let record = mark_processing(&fx);
    let output = fx.processor.library().prepare_edited_path(&record).unwrap();
    std::fs::write(&output, b"rendered elsewhere").unwrap();

    let record = fx
        .processor
        .complete_external(&id, true, None, None)
        .unwrap();
    assert_eq!(record.status, ProcessingStatus::Completed);
    assert!(record.edited_path.unwrap().ends_with("beach_edited.mp4"));
}

#[test]
fn test_external_completion_rejected_during_local_job() {
    let fx = fixture(FakeBackend::ok());
    let id = fx.record.id.clone();
    mark_processing(&fx);
    assert!(fx.processor.tracker().try_start(&id));

    let err = fx
        .processor
        .complete_external(&id, false, None, Some("worker crashed".to_string()))
        .unwrap_err();
    assert!(matches!(err, ProcessingError::AlreadyProcessing { .. }));
    assert_eq!(
        fx.processor.library().load(&id).unwrap().status,
        ProcessingStatus::Processing
    );
}

#[test]
fn test_external_failure() {
    let fx = fixture(FakeBackend::ok());
    let id = fx.record.id.clone();
    mark_processing(&fx);

    let record = fx
        .processor
        .complete_external(&id, false, None, Some("worker crashed".to_string()))
        .unwrap();
    assert_eq!(record.status, ProcessingStatus::Error);
    assert_eq!(record.error_message.as_deref(), Some("worker crashed"));
}

#[test]
fn test_recover_interrupted_jobs() {
    let fx = fixture(FakeBackend::ok());
    let id = fx.record.id.clone();
    let mut record = fx.processor.library().load(&id).unwrap();
    record.begin_processing(vec![]).unwrap();
    fx.processor.library().save(&record).unwrap();

    let recovered = fx.processor.recover_interrupted().unwrap();
    assert_eq!(recovered, vec![id.clone()]);

    let record = fx.processor.library().load(&id).unwrap();
    assert_eq!(record.status, ProcessingStatus::Error);
    assert!(fx.processor.recover_interrupted().unwrap().is_empty());
}
