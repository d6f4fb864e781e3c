use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::capture::FrameSink;
use crate::error::{RenderError, RenderResult};
use crate::surface::RenderSurface;

/// One scheduled capture: where the still lands in the final sequence, and
/// when it should ideally be taken relative to the start of its phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRequest {
    pub global_index: u64,
    pub ideal_offset: Duration,
}

/// Capture plan for one phase: `count` frames at `fps`, numbered from
/// `first_frame` in the global sequence.
#[derive(Debug, Clone, Copy)]
pub struct FramePlan {
    pub first_frame: u64,
    pub count: u32,
    pub fps: u32,
}

impl FramePlan {
    pub fn request(&self, index: u32) -> FrameRequest {
        FrameRequest {
            global_index: self.first_frame + u64::from(index),
            ideal_offset: frame_offset(index, self.fps),
        }
    }

    pub fn period(&self) -> Duration {
        frame_offset(1, self.fps)
    }
}

/// Ideal wall-clock offset of frame `index` from the start of its phase.
pub fn frame_offset(index: u32, fps: u32) -> Duration {
    Duration::from_secs_f64(f64::from(index) / f64::from(fps))
}

/// How long to wait before the next capture. `elapsed` is measured against
/// the phase-start reference clock, never against the previous frame: each
/// correction therefore absorbs all error accumulated so far, which bounds
/// total drift to one frame period no matter how long the phase runs. A
/// capture that overruns its slot yields a zero sleep; the frame is still
/// taken, never dropped.
pub fn corrective_sleep(target: Duration, elapsed: Duration) -> Duration {
    target.saturating_sub(elapsed)
}

/// Capture every frame a phase owes, pacing against the phase-start clock.
/// The surface must already show the phase. Returns the next free global
/// index, which the caller feeds into the next phase's plan.
pub fn capture_phase<S>(surface: &S, sink: &mut FrameSink, plan: FramePlan) -> RenderResult<u64>
where
    S: RenderSurface + ?Sized,
{
    let period = plan.period();
    let t0 = Instant::now();

    for index in 0..plan.count {
        let request = plan.request(index);
        let png = surface.screenshot().map_err(|error| {
            RenderError::capture(format!(
                "snapshot for frame {} failed: {error:#}",
                request.global_index
            ))
        })?;
        sink.write_frame(request.global_index, &png)?;

        let elapsed = t0.elapsed();
        let lateness = elapsed.saturating_sub(request.ideal_offset);
        if lateness > period {
            debug!(
                frame = request.global_index,
                lateness_ms = lateness.as_millis() as u64,
                "capture overran its frame slot; schedule will re-converge"
            );
        }
        trace!(frame = request.global_index, "frame captured");

        let target = frame_offset(index + 1, plan.fps);
        let sleep = corrective_sleep(target, elapsed);
        if !sleep.is_zero() {
            thread::sleep(sleep);
        }
    }

    let nominal = frame_offset(plan.count, plan.fps);
    debug!(
        frames = plan.count,
        nominal_ms = nominal.as_millis() as u64,
        actual_ms = t0.elapsed().as_millis() as u64,
        "phase captured"
    );
    Ok(plan.first_frame + u64::from(plan.count))
}
