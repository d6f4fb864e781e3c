use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::Context;
use chrono::{DateTime, Utc};
use tracing::info;

use crate::capture::FrameSink;
use crate::error::{RenderError, RenderResult};

pub const VIDEO_EXT: &str = "mp4";

/// `<presentation-id>_<timestamp>.mp4` — the timestamp disambiguates
/// repeated renders of the same presentation, nothing more.
pub fn output_path(videos_dir: &Path, presentation_id: &str, timestamp: DateTime<Utc>) -> PathBuf {
    videos_dir.join(format!(
        "{presentation_id}_{}.{VIDEO_EXT}",
        timestamp.format("%Y-%m-%dT%H-%M-%S")
    ))
}

pub fn is_ffmpeg_available() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Invoke the encoder exactly once over the complete, verified frame
/// sequence. On failure the caller keeps the sequence on disk; this
/// function never deletes anything.
pub fn encode_sequence(sink: &FrameSink, fps: u32, output: &Path) -> RenderResult<()> {
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory {}", parent.display()))?;
    }

    let binary = ffmpeg_binary()?;
    let args = ffmpeg_args(fps, &sink.sequence_pattern(), output);
    info!(encoder = %binary.display(), output = %output.display(), "encoding frame sequence");

    let child = Command::new(&binary)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|error| {
            RenderError::encode(format!(
                "failed to spawn ffmpeg ({}): {error}",
                binary.display()
            ))
        })?;

    let result = child
        .wait_with_output()
        .context("failed waiting for ffmpeg")?;
    if !result.status.success() {
        // A partially written container is not a product; the frame
        // sequence stays on disk for diagnosis instead.
        let _ = fs::remove_file(output);
        return Err(RenderError::encode(format!(
            "ffmpeg exited with {}: {}",
            result.status,
            stderr_tail(&result.stderr)
        )));
    }

    Ok(())
}

#[cfg(not(feature = "sidecar_ffmpeg"))]
fn ffmpeg_binary() -> RenderResult<PathBuf> {
    if is_ffmpeg_available() {
        Ok(PathBuf::from("ffmpeg"))
    } else {
        Err(RenderError::encode(
            "ffmpeg not found on PATH; install ffmpeg or rebuild with `--features sidecar_ffmpeg`",
        ))
    }
}

#[cfg(feature = "sidecar_ffmpeg")]
fn ffmpeg_binary() -> RenderResult<PathBuf> {
    if is_ffmpeg_available() {
        return Ok(PathBuf::from("ffmpeg"));
    }
    let path = ffmpeg_sidecar::paths::ffmpeg_path();
    if !path.exists() {
        ffmpeg_sidecar::download::auto_download()
            .context("failed to auto-download ffmpeg sidecar binary")?;
    }
    Ok(path)
}

fn ffmpeg_args(fps: u32, pattern: &Path, output: &Path) -> Vec<String> {
    vec![
        "-hide_banner".to_owned(),
        "-loglevel".to_owned(),
        "error".to_owned(),
        "-y".to_owned(),
        "-framerate".to_owned(),
        fps.to_string(),
        "-i".to_owned(),
        pattern.to_string_lossy().into_owned(),
        "-vf".to_owned(),
        "format=yuv420p".to_owned(),
        "-c:v".to_owned(),
        "libx264".to_owned(),
        "-pix_fmt".to_owned(),
        "yuv420p".to_owned(),
        "-movflags".to_owned(),
        "+faststart".to_owned(),
        output.to_string_lossy().into_owned(),
    ]
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let chars = text.chars().collect::<Vec<_>>();
    let start = chars.len().saturating_sub(500);
    chars[start..].iter().collect::<String>().trim().to_owned()
}
