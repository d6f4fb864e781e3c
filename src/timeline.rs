use std::time::Duration;

use crate::capture::MAX_SEQUENCE_FRAMES;
use crate::error::{RenderError, RenderResult};
use crate::schema::TimelineSpec;

/// One validated segment of the playback timeline, annotated with the slice
/// of the global frame sequence it owns.
#[derive(Debug, Clone)]
pub struct Phase {
    pub id: String,
    pub duration: Duration,
    /// Frames owed to this phase.
    pub frames: u32,
    /// Global index of this phase's first frame. Indices never reset across
    /// phase boundaries.
    pub first_frame: u64,
}

impl Phase {
    /// Global index one past this phase's last frame.
    pub fn end_frame(&self) -> u64 {
        self.first_frame + u64::from(self.frames)
    }
}

/// Immutable playback plan: ordered phases plus the global frame rate.
/// Built once from configuration before any capture begins.
#[derive(Debug, Clone)]
pub struct Timeline {
    fps: u32,
    phases: Vec<Phase>,
    total_frames: u64,
}

impl Timeline {
    /// Frame counts are allocated from rounded cumulative boundaries rather
    /// than rounding each phase independently, so the per-phase counts
    /// always sum to `round(total_duration * fps)`. For whole-second phases
    /// the two schemes agree.
    pub fn from_spec(spec: &TimelineSpec) -> RenderResult<Self> {
        spec.validate()?;

        let fps = spec.fps;
        let mut phases = Vec::with_capacity(spec.phases.len());
        let mut cumulative_seconds = 0.0f64;
        let mut previous_boundary = 0u64;

        for phase in &spec.phases {
            cumulative_seconds += phase.duration;
            let boundary = round_half_up(cumulative_seconds * f64::from(fps));
            let frames = boundary - previous_boundary;
            if frames == 0 {
                return Err(RenderError::configuration(format!(
                    "phase '{}' is too short to contribute a frame at {} fps",
                    phase.id, fps
                )));
            }
            let frames = u32::try_from(frames).map_err(|_| {
                RenderError::configuration(format!("phase '{}' frame count overflows", phase.id))
            })?;
            phases.push(Phase {
                id: phase.id.clone(),
                duration: Duration::from_secs_f64(phase.duration),
                frames,
                first_frame: previous_boundary,
            });
            previous_boundary = boundary;
        }

        let total_frames = previous_boundary;
        if total_frames > MAX_SEQUENCE_FRAMES {
            return Err(RenderError::configuration(format!(
                "timeline owes {total_frames} frames, above the {MAX_SEQUENCE_FRAMES} \
                 the frame sequence namespace supports"
            )));
        }

        Ok(Self {
            fps,
            phases,
            total_frames,
        })
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    pub fn total_duration(&self) -> Duration {
        self.phases.iter().map(|phase| phase.duration).sum()
    }
}

fn round_half_up(value: f64) -> u64 {
    (value + 0.5).floor() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{PhaseSpec, TimelineSpec, Viewport};

    fn spec(fps: u32, durations: &[(&str, f64)]) -> TimelineSpec {
        TimelineSpec {
            fps,
            viewport: Viewport::default(),
            phases: durations
                .iter()
                .map(|(id, duration)| PhaseSpec {
                    id: (*id).to_owned(),
                    duration: *duration,
                })
                .collect(),
        }
    }

    #[test]
    fn boundaries_are_contiguous_with_no_renumbering() {
        let timeline =
            Timeline::from_spec(&spec(10, &[("a", 3.0), ("b", 5.0), ("c", 2.0)])).unwrap();

        assert_eq!(timeline.total_frames(), 100);
        let phases = timeline.phases();
        assert_eq!((phases[0].first_frame, phases[0].end_frame()), (0, 30));
        assert_eq!((phases[1].first_frame, phases[1].end_frame()), (30, 80));
        assert_eq!((phases[2].first_frame, phases[2].end_frame()), (80, 100));
    }

    #[test]
    fn stock_reel_owes_exactly_1800_frames() {
        let timeline =
            Timeline::from_spec(&spec(60, &[("intro", 3.0), ("demo", 24.0), ("outro", 3.0)]))
                .unwrap();

        assert_eq!(timeline.total_frames(), 1800);
        assert_eq!(timeline.phases()[1].first_frame, 180);
        assert_eq!(timeline.phases()[2].first_frame, 1620);
        assert_eq!(timeline.total_duration(), Duration::from_secs(30));
    }

    #[test]
    fn half_frame_ties_round_up() {
        // 1.25s at 2 fps is 2.5 frames; the boundary lands on 3.
        let timeline = Timeline::from_spec(&spec(2, &[("a", 1.25)])).unwrap();
        assert_eq!(timeline.total_frames(), 3);
    }

    #[test]
    fn fractional_durations_sum_to_the_rounded_total() {
        // Independent rounding would give 3 + 3 = 6; the correct total for
        // 2.5s at 2 fps is 5.
        let timeline = Timeline::from_spec(&spec(2, &[("a", 1.25), ("b", 1.25)])).unwrap();
        assert_eq!(timeline.total_frames(), 5);
        let per_phase: u64 = timeline
            .phases()
            .iter()
            .map(|phase| u64::from(phase.frames))
            .sum();
        assert_eq!(per_phase, timeline.total_frames());
    }

    #[test]
    fn every_phase_contributes_at_least_one_frame() {
        let error = Timeline::from_spec(&spec(10, &[("blip", 0.01)]))
            .expect_err("sub-frame phase should be rejected");
        assert!(error.to_string().contains("too short"));
    }

    #[test]
    fn sequence_namespace_is_enforced() {
        // 30 minutes at 60 fps overflows the five-digit frame namespace.
        let error = Timeline::from_spec(&spec(60, &[("long", 1800.0)]))
            .expect_err("oversized timeline should be rejected");
        assert!(error.to_string().contains("namespace"));
    }

    #[test]
    fn invalid_spec_is_rejected_at_construction() {
        let error = Timeline::from_spec(&spec(0, &[("a", 1.0)])).unwrap_err();
        assert_eq!(error.exit_code(), 2);
    }
}
