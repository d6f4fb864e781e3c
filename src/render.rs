use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Utc;
use tracing::info;

use crate::capture::FrameSink;
use crate::driver::PhaseDriver;
use crate::encode;
use crate::error::{RenderError, RenderResult};
use crate::scheduler::{self, FramePlan};
use crate::schema;
use crate::surface::{ChromeSurface, RenderSurface};
use crate::timeline::Timeline;

/// Intermediate frames live here for the duration of one render.
pub const FRAMES_DIR: &str = "frames_temp";
/// Finished videos land here.
pub const VIDEOS_DIR: &str = "videos";

#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub input: PathBuf,
    pub output_name: Option<String>,
    pub videos_dir: PathBuf,
    pub frames_dir: PathBuf,
}

impl RenderRequest {
    pub fn new(input: PathBuf) -> Self {
        Self {
            input,
            output_name: None,
            videos_dir: PathBuf::from(VIDEOS_DIR),
            frames_dir: PathBuf::from(FRAMES_DIR),
        }
    }

    /// Output base name: the explicit override, else the presentation's
    /// directory name (a presentation is a directory holding index.html).
    pub fn presentation_id(&self) -> String {
        if let Some(name) = &self.output_name {
            return name.clone();
        }
        self.input
            .parent()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .filter(|name| !name.is_empty() && name != ".")
            .unwrap_or_else(|| "presentation".to_owned())
    }
}

#[derive(Debug)]
pub struct RenderedVideo {
    pub path: PathBuf,
    pub frames: u64,
}

/// One complete single-shot render:
/// load → (activate → capture)* → verify → encode → cleanup.
/// Any failure is terminal; the browser session is released on every exit
/// path, and the frame sequence is deleted only after a successful encode.
pub fn render(request: &RenderRequest) -> Result<RenderedVideo> {
    if !request.input.is_file() {
        return Err(RenderError::surface_load(format!(
            "presentation document not found: {}",
            request.input.display()
        ))
        .into());
    }

    let presentation_id = request.presentation_id();
    let presentation_dir = request.input.parent().unwrap_or_else(|| Path::new("."));
    let spec = schema::load_timeline(presentation_dir, &presentation_id)?;
    let timeline = Timeline::from_spec(&spec)?;
    info!(
        presentation = %presentation_id,
        fps = timeline.fps(),
        frames = timeline.total_frames(),
        duration_s = timeline.total_duration().as_secs_f64(),
        "starting render"
    );

    let mut sink = FrameSink::prepare(&request.frames_dir)?;

    let surface = ChromeSurface::launch(spec.viewport)
        .map_err(|error| RenderError::surface_load(format!("{error:#}")))?;
    surface
        .load(&request.input)
        .map_err(|error| RenderError::surface_load(format!("{error:#}")))?;

    capture_presentation(&surface, &mut sink, &timeline)?;
    // Release the browser before encoding; the encoder shares nothing with
    // the capture loop.
    drop(surface);

    sink.verify_contiguous(timeline.total_frames())?;
    let output = encode::output_path(&request.videos_dir, &presentation_id, Utc::now());
    encode::encode_sequence(&sink, timeline.fps(), &output)?;
    sink.remove_all()?;

    info!(output = %output.display(), "render complete");
    Ok(RenderedVideo {
        path: output,
        frames: timeline.total_frames(),
    })
}

/// Drive every phase of the timeline in order, capturing each phase's
/// frames into the sink. Frame numbering runs through the whole timeline
/// without resetting at phase boundaries.
pub fn capture_presentation<S>(
    surface: &S,
    sink: &mut FrameSink,
    timeline: &Timeline,
) -> RenderResult<()>
where
    S: RenderSurface + ?Sized,
{
    let available = surface.phase_ids().map_err(|error| {
        RenderError::surface_load(format!("failed to query surface phases: {error:#}"))
    })?;
    let mut driver = PhaseDriver::new(available);
    driver.negotiate_render_mode(surface)?;
    driver.warn_on_missing(timeline.phases());

    let mut next_frame = 0u64;
    for phase in timeline.phases() {
        driver.activate(surface, &phase.id)?;
        debug_assert_eq!(next_frame, phase.first_frame);
        let plan = FramePlan {
            first_frame: phase.first_frame,
            count: phase.frames,
            fps: timeline.fps(),
        };
        next_frame = scheduler::capture_phase(surface, sink, plan)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use anyhow::{anyhow, Result};

    use super::*;
    use crate::schema::{PhaseSpec, TimelineSpec, Viewport};

    struct ScriptedSurface {
        ids: Vec<String>,
        log: RefCell<Vec<String>>,
        fail_on_shot: Option<u32>,
        shots: RefCell<u32>,
    }

    impl ScriptedSurface {
        fn new(ids: &[&str]) -> Self {
            Self {
                ids: ids.iter().map(|id| (*id).to_owned()).collect(),
                log: RefCell::new(Vec::new()),
                fail_on_shot: None,
                shots: RefCell::new(0),
            }
        }
    }

    impl RenderSurface for ScriptedSurface {
        fn phase_ids(&self) -> Result<Vec<String>> {
            Ok(self.ids.clone())
        }

        fn set_render_mode(&self, enabled: bool) -> Result<()> {
            self.log.borrow_mut().push(format!("render_mode:{enabled}"));
            Ok(())
        }

        fn activate_phase(&self, phase_id: &str) -> Result<()> {
            self.log.borrow_mut().push(format!("activate:{phase_id}"));
            Ok(())
        }

        fn screenshot(&self) -> Result<Vec<u8>> {
            let mut shots = self.shots.borrow_mut();
            if Some(*shots) == self.fail_on_shot {
                return Err(anyhow!("tab crashed"));
            }
            *shots += 1;
            Ok(vec![1, 2, 3])
        }
    }

    fn quick_timeline() -> Timeline {
        // 200 fps keeps the corrective sleeps at 5ms so the test finishes
        // quickly while still exercising real pacing.
        let spec = TimelineSpec {
            fps: 200,
            viewport: Viewport::default(),
            phases: vec![
                PhaseSpec {
                    id: "intro".to_owned(),
                    duration: 0.05,
                },
                PhaseSpec {
                    id: "feature-demo".to_owned(),
                    duration: 0.1,
                },
                PhaseSpec {
                    id: "outro".to_owned(),
                    duration: 0.05,
                },
            ],
        };
        Timeline::from_spec(&spec).expect("timeline should build")
    }

    #[test]
    fn captures_every_phase_into_one_contiguous_sequence() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let mut sink = FrameSink::prepare(dir.path()).expect("sink should prepare");
        let surface = ScriptedSurface::new(&["intro", "feature-demo", "outro"]);
        let timeline = quick_timeline();

        capture_presentation(&surface, &mut sink, &timeline).expect("capture should succeed");

        assert_eq!(sink.written(), timeline.total_frames());
        sink.verify_contiguous(timeline.total_frames())
            .expect("sequence should be contiguous");

        let log = surface.log.borrow();
        assert_eq!(
            *log,
            vec![
                "render_mode:true",
                "activate:intro",
                "activate:feature-demo",
                "activate:outro",
            ]
        );
    }

    #[test]
    fn undeclared_phase_fails_before_any_capture() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let mut sink = FrameSink::prepare(dir.path()).expect("sink should prepare");
        // Surface is missing the demo slide.
        let surface = ScriptedSurface::new(&["intro", "outro"]);
        let timeline = quick_timeline();

        let error = capture_presentation(&surface, &mut sink, &timeline)
            .expect_err("missing phase should abort");
        assert!(matches!(error, RenderError::PhaseNotFound(_)));
        // The intro captured, the demo never started.
        assert_eq!(sink.written(), u64::from(timeline.phases()[0].frames));
    }

    #[test]
    fn failed_capture_keeps_earlier_frames_for_diagnosis() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let mut sink = FrameSink::prepare(dir.path()).expect("sink should prepare");
        let mut surface = ScriptedSurface::new(&["intro", "feature-demo", "outro"]);
        surface.fail_on_shot = Some(15);
        let timeline = quick_timeline();

        let error = capture_presentation(&surface, &mut sink, &timeline)
            .expect_err("capture failure should abort");
        assert!(matches!(error, RenderError::Capture(_)));
        assert_eq!(sink.written(), 15);
        assert!(sink.frame_path(14).is_file());
        // An incomplete sequence must never pass the encoding precondition.
        assert!(sink.verify_contiguous(timeline.total_frames()).is_err());
    }

    #[test]
    fn presentation_id_comes_from_the_directory_unless_overridden() {
        let request = RenderRequest::new(PathBuf::from("output/css-border/index.html"));
        assert_eq!(request.presentation_id(), "css-border");

        let mut named = RenderRequest::new(PathBuf::from("output/css-border/index.html"));
        named.output_name = Some("launch-cut".to_owned());
        assert_eq!(named.presentation_id(), "launch-cut");
    }

    #[test]
    fn missing_input_is_a_surface_load_error() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let mut request = RenderRequest::new(dir.path().join("nope/index.html"));
        request.frames_dir = dir.path().join("frames_temp");
        request.videos_dir = dir.path().join("videos");

        let error = render(&request).expect_err("missing input should fail");
        assert_eq!(crate::error::exit_code(&error), 3);
        assert!(!request.videos_dir.exists(), "no video may be produced");
    }
}
