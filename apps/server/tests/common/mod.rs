#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use vidblur_common::config::AppConfig;
use vidblur_common::error::VidblurResult;
use vidblur_mask_model::{ProcessingStatus, VideoMetadata, VideoRecord};
use vidblur_processing::Processor;
use vidblur_render_engine::{BlurJob, ProgressCallback, RenderBackend, RenderOutcome, RenderPlan};
use vidblur_server::config::ServerConfig;
use vidblur_server::router::build_app_router;
use vidblur_server::state::AppState;

/// Copies a marker into the output path instead of transcoding.
pub struct FakeBackend;

impl RenderBackend for FakeBackend {
    fn render(
        &self,
        job: &BlurJob,
        _progress: Option<ProgressCallback>,
    ) -> VidblurResult<RenderOutcome> {
        std::fs::write(&job.output_path, b"edited video")?;
        let plan = RenderPlan::for_job(job)?;
        Ok(RenderOutcome {
            output_path: job.output_path.clone(),
            plan: plan.label(),
            codec: None,
            elapsed_secs: 0.0,
        })
    }

    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "fake"
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    _dir: TempDir,
}

/// A server over a fresh temporary library with a fake render backend.
pub fn build_test_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let mut app_config = AppConfig::default();
    app_config.library_dir = dir.path().to_path_buf();
    app_config.render.ffprobe_bin = dir.path().join("no-ffprobe").display().to_string();

    let config = ServerConfig::from_app_config(&app_config);
    let library = vidblur_mask_model::VideoLibrary::open(&config.library_dir).unwrap();
    let processor = Processor::new(library, Arc::new(FakeBackend), config.encoder.clone());
    let state = AppState::new(processor, config);

    TestApp {
        router: build_app_router(state.clone()),
        state,
        _dir: dir,
    }
}

impl TestApp {
    /// Scratch directory holding the library.
    pub fn dir(&self) -> &std::path::Path {
        self._dir.path()
    }

    /// Store a source video with known metadata, bypassing upload probing.
    pub fn seed_video(&self) -> VideoRecord {
        self.state
            .processor
            .library()
            .import_bytes(
                "office.mp4",
                b"source video",
                VideoMetadata {
                    duration_secs: Some(12.0),
                    width: Some(1920),
                    height: Some(1080),
                },
            )
            .unwrap()
    }

    /// Move a stored video to `processing` as if a job were running elsewhere.
    pub fn mark_processing(&self, video_id: &str) {
        let library = self.state.processor.library();
        let mut record = library.load(video_id).unwrap();
        record.begin_processing(vec![]).unwrap();
        library.save(&record).unwrap();
    }

    /// Poll the tracker until the job leaves `processing`.
    pub async fn wait_for_job(&self, video_id: &str) -> ProcessingStatus {
        for _ in 0..200 {
            let status = self.state.processor.status(video_id).unwrap().status;
            if status != ProcessingStatus::Processing {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job for {video_id} did not finish");
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn post_json(&self, uri: &str, body: serde_json::Value) -> Response<Body> {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn post_bytes(&self, uri: &str, bytes: &'static [u8]) -> Response<Body> {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(Body::from(bytes))
            .unwrap();
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
