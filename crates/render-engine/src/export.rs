//! Blur job planning and ffmpeg execution.

use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::Deserialize;
use vidblur_common::config::RenderDefaults;
use vidblur_common::error::{VidblurError, VidblurResult};
use vidblur_mask_model::VideoMask;

use crate::filter_graph::{BlurSettings, FilterGraph};

/// Keep this much of ffmpeg's stderr in error messages.
const STDERR_TAIL_BYTES: usize = 2000;

/// Transcoder invocation settings.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderSettings {
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
    pub primary_codec: String,
    pub fallback_codec: String,
    pub preset: String,
    pub blur: BlurSettings,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self::from(&RenderDefaults::default())
    }
}

impl From<&RenderDefaults> for EncoderSettings {
    fn from(defaults: &RenderDefaults) -> Self {
        Self {
            ffmpeg_bin: defaults.ffmpeg_bin.clone(),
            ffprobe_bin: defaults.ffprobe_bin.clone(),
            primary_codec: defaults.primary_codec.clone(),
            fallback_codec: defaults.fallback_codec.clone(),
            preset: defaults.preset.clone(),
            blur: BlurSettings {
                power: defaults.blur_power.max(1),
            },
        }
    }
}

/// A blur job ready to be rendered.
#[derive(Debug, Clone)]
pub struct BlurJob {
    /// Source video.
    pub input_path: PathBuf,

    /// Output file path.
    pub output_path: PathBuf,

    /// Video-space masks. Empty means stream copy.
    pub masks: Vec<VideoMask>,

    /// Source duration, used for progress estimation.
    pub duration_secs: Option<f64>,

    pub encoder: EncoderSettings,
}

/// Progress callback for rendering.
pub type ProgressCallback = Box<dyn Fn(RenderProgress) + Send>;

/// Render progress report.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderProgress {
    /// Current progress [0.0, 1.0].
    pub progress: f64,

    /// Output timestamp reached so far.
    pub out_time_secs: f64,

    /// Estimated time remaining in seconds.
    pub eta_secs: f64,

    pub stage: RenderStage,
}

/// Stages of a render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStage {
    Preparing,
    Rendering,
    Finalizing,
    Complete,
    Failed,
}

/// What a render will do with its input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanKind {
    /// No masks: copy streams unchanged.
    PassThrough,
    /// Re-encode video through the blur graph.
    Blur { mask_count: usize, graph: FilterGraph },
}

/// Planned invocation for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderPlan {
    pub kind: PlanKind,
}

impl RenderPlan {
    pub fn for_job(job: &BlurJob) -> VidblurResult<Self> {
        if job.masks.is_empty() {
            return Ok(Self {
                kind: PlanKind::PassThrough,
            });
        }
        let graph = FilterGraph::build_with(&job.masks, job.encoder.blur)
            .map_err(|e| VidblurError::render(e.to_string()))?;
        Ok(Self {
            kind: PlanKind::Blur {
                mask_count: job.masks.len(),
                graph,
            },
        })
    }

    /// Log-friendly plan name.
    pub fn label(&self) -> &'static str {
        match self.kind {
            PlanKind::PassThrough => "pass_through",
            PlanKind::Blur { .. } => "blur",
        }
    }

    pub fn is_pass_through(&self) -> bool {
        matches!(self.kind, PlanKind::PassThrough)
    }

    /// Encoders to try in order. Pass-through needs none.
    pub fn codec_attempts<'a>(&self, encoder: &'a EncoderSettings) -> Vec<&'a str> {
        match self.kind {
            PlanKind::PassThrough => Vec::new(),
            PlanKind::Blur { .. } => {
                let mut codecs = vec![encoder.primary_codec.as_str()];
                let fallback = encoder.fallback_codec.as_str();
                if !fallback.is_empty() && fallback != encoder.primary_codec {
                    codecs.push(fallback);
                }
                codecs
            }
        }
    }

    /// Full ffmpeg argument list. `codec` is ignored for pass-through.
    pub fn ffmpeg_args(&self, job: &BlurJob, codec: Option<&str>) -> Vec<String> {
        let mut args: Vec<String> = [
            "-y",
            "-hide_banner",
            "-loglevel",
            "error",
            "-nostats",
            "-progress",
            "pipe:1",
            "-i",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        args.push(job.input_path.to_string_lossy().into_owned());

        match &self.kind {
            PlanKind::PassThrough => {
                args.extend(["-c".to_string(), "copy".to_string()]);
            }
            PlanKind::Blur { graph, .. } => {
                args.push("-filter_complex".to_string());
                args.push(graph.to_filter_complex());
                args.push("-map".to_string());
                args.push(format!("[{}]", graph.output_label()));
                args.push("-map".to_string());
                args.push("0:a?".to_string());
                let codec = codec.unwrap_or(job.encoder.primary_codec.as_str());
                args.extend(codec_args(codec, &job.encoder.preset));
                args.extend(["-c:a".to_string(), "copy".to_string()]);
            }
        }

        args.push(job.output_path.to_string_lossy().into_owned());
        args
    }
}

/// Video encoder arguments for a codec name.
pub fn codec_args(codec: &str, preset: &str) -> Vec<String> {
    let mut args = vec!["-c:v".to_string(), codec.to_string()];
    match codec {
        "libx264" | "libx265" => {
            args.extend([
                "-preset".to_string(),
                preset.to_string(),
                "-pix_fmt".to_string(),
                "yuv420p".to_string(),
            ]);
        }
        "mpeg4" => {
            args.extend(["-q:v".to_string(), "2".to_string()]);
        }
        _ => {
            args.extend(["-pix_fmt".to_string(), "yuv420p".to_string()]);
        }
    }
    args
}

/// Summary of a finished render.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOutcome {
    pub output_path: PathBuf,
    /// `"pass_through"` or `"blur"`.
    pub plan: &'static str,
    /// Encoder that produced the output; `None` for stream copy.
    pub codec: Option<String>,
    pub elapsed_secs: f64,
}

/// Trait for render backends.
pub trait RenderBackend: Send + Sync {
    /// Execute the job.
    fn render(
        &self,
        job: &BlurJob,
        progress: Option<ProgressCallback>,
    ) -> VidblurResult<RenderOutcome>;

    /// Check if this backend is available on the system.
    fn is_available(&self) -> bool;

    /// Backend name.
    fn name(&self) -> &str;
}

/// Validate a job and render it on `backend`.
///
/// This is the main blocking entry point for rendering.
pub fn run_blur_job(
    backend: &dyn RenderBackend,
    job: &BlurJob,
    progress: Option<ProgressCallback>,
) -> VidblurResult<RenderOutcome> {
    tracing::info!(
        input = %job.input_path.display(),
        output = %job.output_path.display(),
        masks = job.masks.len(),
        "Starting render"
    );

    if !job.input_path.exists() {
        return Err(VidblurError::FileNotFound {
            path: job.input_path.clone(),
        });
    }
    if let Some(parent) = job.output_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !backend.is_available() {
        return Err(VidblurError::unsupported(format!(
            "Render backend '{}' is not available (expected {} in PATH)",
            backend.name(),
            job.encoder.ffmpeg_bin
        )));
    }

    tracing::info!(backend = backend.name(), "Using render backend");
    backend.render(job, progress)
}

/// Render backend driving the `ffmpeg` executable.
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    ffmpeg_bin: String,
}

impl FfmpegBackend {
    pub fn new(ffmpeg_bin: impl Into<String>) -> Self {
        Self {
            ffmpeg_bin: ffmpeg_bin.into(),
        }
    }

    fn run_ffmpeg(
        &self,
        args: &[String],
        expected_duration_secs: f64,
        progress: Option<&ProgressCallback>,
    ) -> VidblurResult<()> {
        tracing::debug!(?args, "Running ffmpeg");
        let mut cmd = Command::new(&self.ffmpeg_bin);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let start = std::time::Instant::now();
        let mut child = cmd
            .spawn()
            .map_err(|e| VidblurError::render(format!("Failed to start ffmpeg: {e}")))?;

        tracing::info!(pid = child.id(), args_len = args.len(), "ffmpeg process started");

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| VidblurError::render("Failed to capture ffmpeg stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| VidblurError::render("Failed to capture ffmpeg stderr"))?;

        // Drain stderr concurrently so ffmpeg never blocks on a full pipe.
        let stderr_task = std::thread::spawn(move || -> String {
            let mut reader = BufReader::new(stderr);
            let mut output = String::new();
            match reader.read_to_string(&mut output) {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        let mut reader = BufReader::new(stdout);
        let mut line = String::new();
        let mut latest = ProgressState::default();
        let mut last_progress_secs = 0.0f64;
        let mut last_progress_wall = std::time::Instant::now();
        loop {
            line.clear();
            let bytes = reader
                .read_line(&mut line)
                .map_err(|e| VidblurError::render(format!("Failed reading ffmpeg progress: {e}")))?;
            if bytes == 0 {
                break;
            }

            let Some((key, value)) = line.trim().split_once('=') else {
                continue;
            };
            latest.update(key, value);
            if key != "progress" {
                continue;
            }

            if latest.out_time_secs > last_progress_secs + 0.001 {
                last_progress_secs = latest.out_time_secs;
                last_progress_wall = std::time::Instant::now();
            }
            if let Some(cb) = progress {
                cb(progress_report(
                    &latest,
                    expected_duration_secs,
                    start.elapsed().as_secs_f64(),
                ));
            }
            if last_progress_wall.elapsed().as_secs() >= 10 {
                tracing::warn!(
                    out_time_secs = latest.out_time_secs,
                    elapsed_secs = start.elapsed().as_secs_f64(),
                    "No ffmpeg progress advancement for 10s"
                );
                last_progress_wall = std::time::Instant::now();
            }
        }

        let status = child
            .wait()
            .map_err(|e| VidblurError::render(format!("Failed to wait on ffmpeg: {e}")))?;

        let stderr_output = stderr_task
            .join()
            .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());

        if !status.success() {
            return Err(VidblurError::render(format!(
                "ffmpeg failed (status {}): {}",
                status,
                stderr_tail(&stderr_output)
            )));
        }
        Ok(())
    }
}

impl Default for FfmpegBackend {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl RenderBackend for FfmpegBackend {
    fn render(
        &self,
        job: &BlurJob,
        progress: Option<ProgressCallback>,
    ) -> VidblurResult<RenderOutcome> {
        let started = std::time::Instant::now();
        let plan = RenderPlan::for_job(job)?;
        let expected_duration_secs = job.duration_secs.unwrap_or(0.0);

        tracing::info!(
            plan = plan.label(),
            masks = job.masks.len(),
            duration_secs = expected_duration_secs,
            "Render plan built"
        );

        if let Some(cb) = &progress {
            cb(RenderProgress {
                progress: 0.0,
                out_time_secs: 0.0,
                eta_secs: 0.0,
                stage: RenderStage::Preparing,
            });
        }

        let codec = if plan.is_pass_through() {
            let args = plan.ffmpeg_args(job, None);
            if let Err(err) = self.run_ffmpeg(&args, expected_duration_secs, progress.as_ref()) {
                report_failure(progress.as_ref());
                return Err(err);
            }
            None
        } else {
            let mut last_err = None;
            let mut used = None;
            for codec in plan.codec_attempts(&job.encoder) {
                let args = plan.ffmpeg_args(job, Some(codec));
                match self.run_ffmpeg(&args, expected_duration_secs, progress.as_ref()) {
                    Ok(()) => {
                        used = Some(codec.to_string());
                        break;
                    }
                    Err(err) => {
                        tracing::warn!(codec, error = %err, "Encoder attempt failed");
                        last_err = Some(err);
                    }
                }
            }
            match used {
                Some(codec) => Some(codec),
                None => {
                    report_failure(progress.as_ref());
                    return Err(last_err
                        .unwrap_or_else(|| VidblurError::render("No encoder configured")));
                }
            }
        };

        if let Some(cb) = &progress {
            cb(RenderProgress {
                progress: 1.0,
                out_time_secs: expected_duration_secs,
                eta_secs: 0.0,
                stage: RenderStage::Complete,
            });
        }

        let elapsed_secs = started.elapsed().as_secs_f64();
        tracing::info!(
            plan = plan.label(),
            codec = codec.as_deref().unwrap_or("copy"),
            elapsed_secs,
            "Render finished"
        );

        Ok(RenderOutcome {
            output_path: job.output_path.clone(),
            plan: plan.label(),
            codec,
            elapsed_secs,
        })
    }

    fn is_available(&self) -> bool {
        command_exists(&self.ffmpeg_bin)
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

fn report_failure(progress: Option<&ProgressCallback>) {
    if let Some(cb) = progress {
        cb(RenderProgress {
            progress: 0.0,
            out_time_secs: 0.0,
            eta_secs: 0.0,
            stage: RenderStage::Failed,
        });
    }
}

fn stderr_tail(stderr: &str) -> &str {
    let trimmed = stderr.trim();
    if trimmed.len() <= STDERR_TAIL_BYTES {
        return trimmed;
    }
    let mut start = trimmed.len() - STDERR_TAIL_BYTES;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    &trimmed[start..]
}

/// Whether `binary` resolves to an executable.
pub fn command_exists(binary: &str) -> bool {
    if binary.contains('/') {
        return Path::new(binary).is_file();
    }
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Metadata read from a video file with `ffprobe`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbedVideo {
    pub width: u32,
    pub height: u32,
    pub duration_secs: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Probe frame size and duration. `None` when ffprobe is missing, fails,
/// or reports no usable video stream.
pub fn probe_video(ffprobe_bin: &str, path: &Path) -> Option<ProbedVideo> {
    let output = Command::new(ffprobe_bin)
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height:format=duration",
            "-of",
            "json",
        ])
        .arg(path)
        .output()
        .ok()?;

    if !output.status.success() {
        tracing::debug!(path = %path.display(), "ffprobe failed");
        return None;
    }

    let raw = String::from_utf8(output.stdout).ok()?;
    parse_probe_output(&raw)
}

/// Parse `ffprobe -of json` output.
pub fn parse_probe_output(raw: &str) -> Option<ProbedVideo> {
    let parsed: ProbeOutput = serde_json::from_str(raw).ok()?;
    let stream = parsed.streams.first()?;
    let width = stream.width.filter(|w| *w > 0)?;
    let height = stream.height.filter(|h| *h > 0)?;
    let duration_secs = parsed
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0);
    Some(ProbedVideo {
        width,
        height,
        duration_secs,
    })
}

#[derive(Debug, Default)]
struct ProgressState {
    out_time_secs: f64,
    complete: bool,
}

impl ProgressState {
    fn update(&mut self, key: &str, value: &str) {
        match key {
            // ffmpeg reports microseconds under both names.
            "out_time_ms" | "out_time_us" => {
                if let Ok(us) = value.parse::<f64>() {
                    self.out_time_secs = us / 1_000_000.0;
                }
            }
            "progress" => {
                self.complete = value == "end";
            }
            _ => {}
        }
    }
}

fn progress_report(
    state: &ProgressState,
    expected_duration_secs: f64,
    elapsed_secs: f64,
) -> RenderProgress {
    let progress = if expected_duration_secs <= 0.0 {
        0.0
    } else {
        (state.out_time_secs / expected_duration_secs).clamp(0.0, 1.0)
    };

    let eta_secs = if progress > 0.0 {
        (elapsed_secs / progress) - elapsed_secs
    } else {
        0.0
    }
    .max(0.0);

    RenderProgress {
        progress: if state.complete { 1.0 } else { progress },
        out_time_secs: state.out_time_secs,
        eta_secs,
        stage: if state.complete {
            RenderStage::Finalizing
        } else {
            RenderStage::Rendering
        },
    }
}
