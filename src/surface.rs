use std::ffi::OsStr;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions, Tab};
use tracing::debug;

use crate::schema::Viewport;

/// Every surface call is bounded; a stuck browser aborts the render instead
/// of hanging it.
pub const SURFACE_TIMEOUT: Duration = Duration::from_secs(10);

/// The rendering-surface collaborator, as consumed by the render pipeline.
/// The surface renders the presentation document on its own internal clock;
/// the pipeline only switches phases and takes snapshots.
pub trait RenderSurface {
    /// The set of phase ids the loaded document exposes.
    fn phase_ids(&self) -> Result<Vec<String>>;

    /// Tell the document whether it is being captured. In render mode the
    /// document must stop auto-advancing phases on its own timers.
    fn set_render_mode(&self, enabled: bool) -> Result<()>;

    /// Switch the active phase and return once the transition is visually
    /// committed, not merely dispatched.
    fn activate_phase(&self, phase_id: &str) -> Result<()>;

    /// Synchronous PNG snapshot of the current visible surface.
    fn screenshot(&self) -> Result<Vec<u8>>;
}

const PHASE_IDS_SCRIPT: &str = r#"
JSON.stringify(
  Array.from(document.querySelectorAll(".slide"))
    .map((slide) => slide.id)
    .filter((id) => id.length > 0)
)
"#;

/// A presentation document loaded in a headless Chromium tab. Owns the
/// browser process for the lifetime of one render; dropping the surface
/// tears the browser down on every exit path.
pub struct ChromeSurface {
    // Held so the browser process outlives the tab handle.
    _browser: Browser,
    tab: Arc<Tab>,
}

impl ChromeSurface {
    pub fn launch(viewport: Viewport) -> Result<Self> {
        let options = LaunchOptions {
            headless: true,
            window_size: Some((viewport.width, viewport.height)),
            args: vec![OsStr::new("--disable-gpu")],
            idle_browser_timeout: Duration::from_secs(300),
            ..Default::default()
        };
        let browser = Browser::new(options).context("failed to launch headless browser")?;
        let tab = browser.new_tab().context("failed to open browser tab")?;
        tab.set_default_timeout(SURFACE_TIMEOUT);

        Ok(Self {
            _browser: browser,
            tab,
        })
    }

    /// Navigate to the presentation document and wait for the load event.
    pub fn load(&self, document: &Path) -> Result<()> {
        let url = file_url(document)?;
        debug!(%url, "loading presentation document");
        self.tab
            .navigate_to(&url)
            .with_context(|| format!("failed to navigate to {url}"))?;
        self.tab
            .wait_until_navigated()
            .with_context(|| format!("timed out loading {url}"))?;
        Ok(())
    }
}

impl RenderSurface for ChromeSurface {
    fn phase_ids(&self) -> Result<Vec<String>> {
        let object = self
            .tab
            .evaluate(PHASE_IDS_SCRIPT, false)
            .context("failed to query phase ids from the surface")?;
        let value = object
            .value
            .ok_or_else(|| anyhow!("surface returned no value for phase ids"))?;
        let json = value
            .as_str()
            .ok_or_else(|| anyhow!("surface returned a non-string phase id payload"))?;
        serde_json::from_str(json).context("failed to decode phase ids")
    }

    fn set_render_mode(&self, enabled: bool) -> Result<()> {
        let script = format!(
            r#"(() => {{
  window.__reelRenderMode = {enabled};
  if (typeof window.setRenderMode === "function") {{ window.setRenderMode({enabled}); }}
  return "ok";
}})()"#
        );
        self.tab
            .evaluate(&script, false)
            .context("failed to set render mode on the surface")?;
        Ok(())
    }

    fn activate_phase(&self, phase_id: &str) -> Result<()> {
        // Resolves after two animation-frame callbacks: the earliest point
        // at which the class flip is known to have been composited.
        let id_literal = serde_json::to_string(phase_id)?;
        let script = format!(
            r#"(() => new Promise((resolve, reject) => {{
  const id = {id_literal};
  const el = document.getElementById(id);
  if (!el || !el.classList.contains("slide")) {{
    reject(new Error("no such phase: " + id));
    return;
  }}
  if (typeof window.setSlide === "function") {{
    window.setSlide(id);
  }} else {{
    document.querySelectorAll(".slide").forEach((slide) => {{
      slide.classList.toggle("active", slide === el);
      slide.classList.toggle("hidden", slide !== el);
    }});
  }}
  requestAnimationFrame(() => requestAnimationFrame(() => resolve("committed")));
}}))()"#
        );
        self.tab
            .evaluate(&script, true)
            .with_context(|| format!("surface failed to activate phase '{phase_id}'"))?;
        Ok(())
    }

    fn screenshot(&self) -> Result<Vec<u8>> {
        self.tab
            .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
            .context("surface failed to produce a snapshot")
    }
}

fn file_url(document: &Path) -> Result<String> {
    let absolute = fs::canonicalize(document)
        .with_context(|| format!("presentation document not found: {}", document.display()))?;
    Ok(format!("file://{}", absolute.display()))
}
