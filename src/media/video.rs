//! Video composition from per-page assets.
//!
//! Each image becomes a looped segment scaled to 1280x720, the segments
//! are concatenated, and a single audio track is optionally muxed with
//! `-shortest`. ffmpeg runs as a subprocess; the returned path is local
//! and is uploaded by the blob uploader before asset insertion.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::{PipelineError, PipelineResult};

const FRAME_WIDTH: u32 = 1280;
const FRAME_HEIGHT: u32 = 720;
const DEFAULT_FPS: u32 = 24;
const DEFAULT_SEGMENT_SECS: f64 = 3.0;

#[derive(Debug, Clone)]
pub struct VideoRequest {
    pub image_uris: Vec<String>,
    pub audio_uri: Option<String>,
    pub per_page_durations: Option<Vec<f64>>,
    pub format: Option<String>,
    pub fps: Option<u32>,
}

pub struct VideoComposer {
    client: reqwest::Client,
    work_dir: PathBuf,
}

impl VideoComposer {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            client: reqwest::Client::new(),
            work_dir: work_dir.into(),
        }
    }

    /// Compose the final video and return its local path.
    pub async fn compose(&self, request: VideoRequest) -> PipelineResult<PathBuf> {
        if request.image_uris.is_empty() {
            return Err(PipelineError::Validation(
                "video composition needs at least one image".into(),
            ));
        }

        let format = request.format.clone().unwrap_or_else(|| "mp4".to_string());
        let fps = request.fps.unwrap_or(DEFAULT_FPS);

        let job_dir = self.work_dir.join(format!("compose-{}", Uuid::new_v4()));
        fs::create_dir_all(&job_dir)
            .await
            .map_err(|e| PipelineError::Media(format!("cannot create work dir: {e}")))?;

        let mut segments = Vec::with_capacity(request.image_uris.len());
        for (index, uri) in request.image_uris.iter().enumerate() {
            let image_path = self.materialize(uri, &job_dir, index).await?;
            let duration = request
                .per_page_durations
                .as_ref()
                .and_then(|durations| durations.get(index).copied())
                .unwrap_or(DEFAULT_SEGMENT_SECS);

            let segment = job_dir.join(format!("segment-{index:03}.{format}"));
            self.render_segment(&image_path, &segment, duration, fps)
                .await?;
            segments.push(segment);
        }

        let concatenated = job_dir.join(format!("concat.{format}"));
        self.concat_segments(&segments, &job_dir, &concatenated)
            .await?;

        let output = match &request.audio_uri {
            Some(audio_uri) => {
                let audio_path = self
                    .materialize(audio_uri, &job_dir, usize::MAX)
                    .await?;
                let muxed = job_dir.join(format!("final.{format}"));
                self.mux_audio(&concatenated, &audio_path, &muxed).await?;
                muxed
            }
            None => concatenated,
        };

        info!(
            segments = segments.len(),
            output = %output.display(),
            "video composed"
        );
        Ok(output)
    }

    /// Resolve a URI to a local file, downloading http(s) sources into
    /// the work dir.
    async fn materialize(&self, uri: &str, job_dir: &Path, index: usize) -> PipelineResult<PathBuf> {
        if let Some(path) = uri.strip_prefix("file://") {
            return Ok(PathBuf::from(path));
        }

        if uri.starts_with("http://") || uri.starts_with("https://") {
            let response = self
                .client
                .get(uri)
                .send()
                .await
                .map_err(|e| PipelineError::Transport(format!("fetch {uri} failed: {e}")))?;

            if !response.status().is_success() {
                return Err(PipelineError::Media(format!(
                    "fetch {uri} returned status {}",
                    response.status()
                )));
            }

            let bytes = response
                .bytes()
                .await
                .map_err(|e| PipelineError::Transport(format!("read {uri} failed: {e}")))?;

            let name = match index {
                usize::MAX => "input-audio".to_string(),
                n => format!("input-{n:03}"),
            };
            let target = job_dir.join(name);
            fs::write(&target, &bytes)
                .await
                .map_err(|e| PipelineError::Media(format!("write download failed: {e}")))?;
            return Ok(target);
        }

        Ok(PathBuf::from(uri))
    }

    /// Loop one still image into a fixed-size video segment.
    async fn render_segment(
        &self,
        image: &Path,
        output: &Path,
        duration: f64,
        fps: u32,
    ) -> PipelineResult<()> {
        let filter = format!(
            "scale={FRAME_WIDTH}:{FRAME_HEIGHT}:force_original_aspect_ratio=decrease,\
pad={FRAME_WIDTH}:{FRAME_HEIGHT}:(ow-iw)/2:(oh-ih)/2"
        );

        let mut cmd = Command::new("ffmpeg");
        cmd.arg("-y")
            .arg("-loop")
            .arg("1")
            .arg("-i")
            .arg(image)
            .arg("-t")
            .arg(format!("{duration:.3}"))
            .arg("-vf")
            .arg(&filter)
            .arg("-r")
            .arg(fps.to_string())
            .arg("-pix_fmt")
            .arg("yuv420p")
            .arg(output);

        run_ffmpeg(cmd, "segment render").await
    }

    /// Concatenate segments with the concat demuxer (stream copy).
    async fn concat_segments(
        &self,
        segments: &[PathBuf],
        job_dir: &Path,
        output: &Path,
    ) -> PipelineResult<()> {
        let list_path = job_dir.join("segments.txt");
        let mut list = String::new();
        for segment in segments {
            list.push_str(&format!("file '{}'\n", segment.display()));
        }
        fs::write(&list_path, list)
            .await
            .map_err(|e| PipelineError::Media(format!("write concat list failed: {e}")))?;

        let mut cmd = Command::new("ffmpeg");
        cmd.arg("-y")
            .arg("-f")
            .arg("concat")
            .arg("-safe")
            .arg("0")
            .arg("-i")
            .arg(&list_path)
            .arg("-c")
            .arg("copy")
            .arg(output);

        run_ffmpeg(cmd, "concat").await
    }

    /// Mux the narration track; `-shortest` trims to the shorter stream.
    async fn mux_audio(&self, video: &Path, audio: &Path, output: &Path) -> PipelineResult<()> {
        let mut cmd = Command::new("ffmpeg");
        cmd.arg("-y")
            .arg("-i")
            .arg(video)
            .arg("-i")
            .arg(audio)
            .arg("-c:v")
            .arg("copy")
            .arg("-c:a")
            .arg("aac")
            .arg("-shortest")
            .arg(output);

        run_ffmpeg(cmd, "audio mux").await
    }
}

async fn run_ffmpeg(mut cmd: Command, step: &str) -> PipelineResult<()> {
    debug!(?cmd, step, "running ffmpeg");

    let output = cmd
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| PipelineError::Media(format!("failed to spawn ffmpeg for {step}: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail: String = stderr
            .lines()
            .rev()
            .take(5)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect::<Vec<_>>()
            .join("\n");
        return Err(PipelineError::Media(format!(
            "ffmpeg {step} exited with {}: {tail}",
            output.status
        )));
    }

    Ok(())
}
