use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::error::{RenderError, RenderResult};
use crate::surface::RenderSurface;
use crate::timeline::Phase;

/// Drives phase transitions on the rendering surface. Exactly one phase is
/// active at a time; the driver does not hand control back to the capture
/// loop until the surface has acknowledged the transition.
pub struct PhaseDriver {
    available: HashSet<String>,
    current: Option<String>,
}

impl PhaseDriver {
    /// `available` is the id set the loaded surface reported.
    pub fn new(available: Vec<String>) -> Self {
        Self {
            available: available.into_iter().collect(),
            current: None,
        }
    }

    /// Put the surface into render mode once, right after load, so the
    /// document stops advancing phases on its own timers.
    pub fn negotiate_render_mode<S>(&self, surface: &S) -> RenderResult<()>
    where
        S: RenderSurface + ?Sized,
    {
        surface.set_render_mode(true)?;
        debug!("surface switched to render mode");
        Ok(())
    }

    /// Advisory check (the timeline is validated before the surface is
    /// loaded, so mismatches only become observable here).
    pub fn warn_on_missing(&self, phases: &[Phase]) {
        for phase in phases {
            if !self.available.contains(&phase.id) {
                warn!(
                    phase = %phase.id,
                    "timeline declares a phase the surface does not expose; \
                     activation will fail"
                );
            }
        }
    }

    /// Switch the surface to `phase_id`, blocking until the transition is
    /// committed. Re-activating the current phase is a successful no-op.
    pub fn activate<S>(&mut self, surface: &S, phase_id: &str) -> RenderResult<()>
    where
        S: RenderSurface + ?Sized,
    {
        if self.current.as_deref() == Some(phase_id) {
            debug!(phase = %phase_id, "phase already active");
            return Ok(());
        }

        if !self.available.contains(phase_id) {
            return Err(RenderError::phase_not_found(format!(
                "surface exposes no phase '{phase_id}' (available: {})",
                self.available_sorted().join(", ")
            )));
        }

        surface.activate_phase(phase_id)?;
        info!(phase = %phase_id, "phase active");
        self.current = Some(phase_id.to_owned());
        Ok(())
    }

    fn available_sorted(&self) -> Vec<&str> {
        let mut ids = self.available.iter().map(String::as_str).collect::<Vec<_>>();
        ids.sort_unstable();
        ids
    }
}
