use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{RenderError, RenderResult};

/// Optional per-presentation timeline file, looked up next to the document.
pub const TIMELINE_FILE: &str = "reel.yaml";

pub const DEFAULT_FPS: u32 = 60;
pub const DEFAULT_INTRO_SECONDS: f64 = 3.0;
pub const DEFAULT_DEMO_SECONDS: f64 = 24.0;
pub const DEFAULT_OUTRO_SECONDS: f64 = 3.0;

pub const INTRO_PHASE_ID: &str = "intro";
pub const OUTRO_PHASE_ID: &str = "outro";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimelineSpec {
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default)]
    pub viewport: Viewport,
    pub phases: Vec<PhaseSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhaseSpec {
    pub id: String,
    /// Seconds of wall-clock playback this phase owes the final video.
    pub duration: f64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        // Portrait reel format, the shape the stock templates are built for.
        Self {
            width: 1080,
            height: 1920,
        }
    }
}

fn default_fps() -> u32 {
    DEFAULT_FPS
}

impl TimelineSpec {
    /// The built-in timeline: intro, one demo phase named after the
    /// presentation, outro. This matches the slide ids the `new` command
    /// stamps into generated documents.
    pub fn default_for(presentation_id: &str) -> Self {
        Self {
            fps: DEFAULT_FPS,
            viewport: Viewport::default(),
            phases: vec![
                PhaseSpec {
                    id: INTRO_PHASE_ID.to_owned(),
                    duration: DEFAULT_INTRO_SECONDS,
                },
                PhaseSpec {
                    id: demo_phase_id(presentation_id),
                    duration: DEFAULT_DEMO_SECONDS,
                },
                PhaseSpec {
                    id: OUTRO_PHASE_ID.to_owned(),
                    duration: DEFAULT_OUTRO_SECONDS,
                },
            ],
        }
    }

    pub fn validate(&self) -> RenderResult<()> {
        if self.fps == 0 {
            return Err(RenderError::configuration("fps must be > 0"));
        }

        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(RenderError::configuration(format!(
                "viewport must be positive, got {}x{}",
                self.viewport.width, self.viewport.height
            )));
        }
        if self.viewport.width % 2 != 0 || self.viewport.height % 2 != 0 {
            // yuv420p output subsamples chroma 2x2.
            return Err(RenderError::configuration(format!(
                "viewport dimensions must be even for yuv420p output, got {}x{}",
                self.viewport.width, self.viewport.height
            )));
        }

        if self.phases.is_empty() {
            return Err(RenderError::configuration(
                "timeline must declare at least one phase",
            ));
        }

        let mut seen = HashSet::with_capacity(self.phases.len());
        for phase in &self.phases {
            if phase.id.trim().is_empty() {
                return Err(RenderError::configuration("phase id cannot be empty"));
            }
            if !(phase.duration > 0.0 && phase.duration.is_finite()) {
                return Err(RenderError::configuration(format!(
                    "phase '{}' duration must be > 0, got {}",
                    phase.id, phase.duration
                )));
            }
            if !seen.insert(phase.id.as_str()) {
                return Err(RenderError::configuration(format!(
                    "duplicate phase id '{}'",
                    phase.id
                )));
            }
        }

        Ok(())
    }
}

/// The slide id the generator gives the demo section of a presentation.
pub fn demo_phase_id(presentation_id: &str) -> String {
    format!("{presentation_id}-demo")
}

/// Load the timeline for a presentation: `reel.yaml` beside the document
/// when present, the built-in default otherwise. Always validated.
pub fn load_timeline(presentation_dir: &Path, presentation_id: &str) -> RenderResult<TimelineSpec> {
    let path = presentation_dir.join(TIMELINE_FILE);
    let spec = if path.is_file() {
        let contents = fs::read_to_string(&path).map_err(|error| {
            RenderError::configuration(format!("failed to read {}: {error}", path.display()))
        })?;
        serde_yaml::from_str::<TimelineSpec>(&contents).map_err(|error| {
            let location = error
                .location()
                .map(|location| format!("line {}, column {}", location.line(), location.column()))
                .unwrap_or_else(|| "unknown location".to_owned());
            RenderError::configuration(format!(
                "failed to parse {} at {}: {error}",
                path.display(),
                location
            ))
        })?
    } else {
        TimelineSpec::default_for(presentation_id)
    };

    spec.validate()?;
    Ok(spec)
}
