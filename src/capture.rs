use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::error::{RenderError, RenderResult};

/// Width of the numeric suffix in frame file names. Five digits keeps
/// lexicographic and numeric order identical for every sequence the
/// timeline validation admits (about 27 minutes at 60 fps).
pub const FRAME_INDEX_DIGITS: usize = 5;

/// Hard ceiling on sequence length implied by the suffix width.
pub const MAX_SEQUENCE_FRAMES: u64 = 100_000;

const FRAME_PREFIX: &str = "frame_";
const FRAME_EXT: &str = "png";

/// Owns the intermediate frame directory for one render. Frames are keyed
/// by their global index, shared across the whole video; the sink never
/// renumbers at phase boundaries.
#[derive(Debug)]
pub struct FrameSink {
    dir: PathBuf,
    written: u64,
}

impl FrameSink {
    /// Create the frame directory and clear any stale frames a prior run
    /// left behind, so this run's sequence can never be contaminated.
    pub fn prepare(dir: &Path) -> RenderResult<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create frame directory {}", dir.display()))?;

        for entry in fs::read_dir(dir)
            .with_context(|| format!("failed to list frame directory {}", dir.display()))?
        {
            let entry = entry.context("failed to read frame directory entry")?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(FRAME_PREFIX) && name.ends_with(FRAME_EXT) {
                fs::remove_file(entry.path()).with_context(|| {
                    format!("failed to remove stale frame {}", entry.path().display())
                })?;
            }
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            written: 0,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn frame_path(&self, global_index: u64) -> PathBuf {
        self.dir.join(format!(
            "{FRAME_PREFIX}{global_index:0width$}.{FRAME_EXT}",
            width = FRAME_INDEX_DIGITS
        ))
    }

    /// The `printf`-style pattern ffmpeg uses to consume the sequence.
    pub fn sequence_pattern(&self) -> PathBuf {
        self.dir
            .join(format!("{FRAME_PREFIX}%0{FRAME_INDEX_DIGITS}d.{FRAME_EXT}"))
    }

    /// Persist one captured still. A write failure is fatal for the render;
    /// frames already on disk stay there for diagnosis.
    pub fn write_frame(&mut self, global_index: u64, png: &[u8]) -> RenderResult<()> {
        let path = self.frame_path(global_index);
        fs::write(&path, png).map_err(|error| {
            RenderError::capture(format!(
                "failed to write frame {global_index} to {}: {error}",
                path.display()
            ))
        })?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// Encoding precondition: the sequence on disk must be exactly
    /// `0..expected` with no gaps. A short or holey sequence (e.g. after a
    /// cancelled run) must never reach the encoder.
    pub fn verify_contiguous(&self, expected: u64) -> RenderResult<()> {
        if self.written != expected {
            return Err(RenderError::capture(format!(
                "frame sequence is incomplete: wrote {} of {expected} frames",
                self.written
            )));
        }
        for index in 0..expected {
            let path = self.frame_path(index);
            if !path.is_file() {
                return Err(RenderError::capture(format!(
                    "frame sequence has a gap: {} is missing",
                    path.display()
                )));
            }
        }
        Ok(())
    }

    /// Success-path cleanup: remove the whole intermediate directory.
    /// Only called after the encoder has produced its output.
    pub fn remove_all(self) -> RenderResult<()> {
        fs::remove_dir_all(&self.dir)
            .with_context(|| format!("failed to remove frame directory {}", self.dir.display()))?;
        Ok(())
    }
}
