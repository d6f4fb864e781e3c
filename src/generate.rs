use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::info;

use crate::error::{RenderError, RenderResult};
use crate::schema::{
    self, DEFAULT_DEMO_SECONDS, DEFAULT_INTRO_SECONDS, DEFAULT_OUTRO_SECONDS, INTRO_PHASE_ID,
    OUTRO_PHASE_ID,
};

pub const TEMPLATES_DIR: &str = "templates";
pub const BASE_TEMPLATE_DIR: &str = "base";
pub const SHARED_DIR: &str = "shared";
pub const OUTPUT_DIR: &str = "output";

const REQUIRED_TEMPLATE_FILES: [&str; 3] = ["demo.html", "demo.css", "demo.js"];

/// The slide engine baked into every generated document. It exposes the
/// control hooks the renderer drives (`setSlide`, `setRenderMode`) and
/// auto-advances on its own timers only when no renderer is attached.
const ENGINE_SCRIPT: &str = r#"document.addEventListener("DOMContentLoaded", () => {
  const slides = ["intro", "__DEMO_ID__", "outro"];
  const timings = __TIMINGS_MS__;
  let current = 0;
  let pending = null;

  window.setSlide = (id) => {
    document.querySelectorAll(".slide").forEach((slide) => {
      slide.classList.toggle("active", slide.id === id);
      slide.classList.toggle("hidden", slide.id !== id);
    });
    const index = slides.indexOf(id);
    if (index !== -1) current = index;
    if (id === "__DEMO_ID__" && typeof startDemo === "function") startDemo();
  };

  window.setRenderMode = (enabled) => {
    window.__reelRenderMode = !!enabled;
    if (enabled && pending !== null) {
      clearTimeout(pending);
      pending = null;
    }
  };

  const advance = () => {
    pending = null;
    if (window.__reelRenderMode) return;
    current += 1;
    if (current >= slides.length) return;
    window.setSlide(slides[current]);
    pending = setTimeout(advance, timings[current]);
  };

  window.setSlide("intro");
  if (!window.__reelRenderMode) pending = setTimeout(advance, timings[0]);
});"#;

/// Assemble `output/<name>/` from `templates/<name>/`, `templates/base/`
/// and `shared/`: pure file copying and string substitution. Returns the
/// path of the generated document.
pub fn create_presentation(root: &Path, template: &str, title: &str) -> RenderResult<PathBuf> {
    let name = sanitize_name(template);
    if name.is_empty() {
        return Err(RenderError::configuration("template name cannot be empty"));
    }

    let template_dir = root.join(TEMPLATES_DIR).join(&name);
    let base_dir = root.join(TEMPLATES_DIR).join(BASE_TEMPLATE_DIR);
    let shared_dir = root.join(SHARED_DIR);
    let output_dir = root.join(OUTPUT_DIR).join(&name);

    if !template_dir.is_dir() {
        return Err(RenderError::configuration(format!(
            "template not found: {}",
            template_dir.display()
        )));
    }
    for file in REQUIRED_TEMPLATE_FILES {
        if !template_dir.join(file).is_file() {
            return Err(RenderError::configuration(format!(
                "template '{name}' is missing required file {file}"
            )));
        }
    }

    let intro_html = read_template(&base_dir.join("intro.html"))?;
    let outro_html = read_template(&base_dir.join("outro.html"))?;
    let demo_html = read_template(&template_dir.join("demo.html"))?;

    // Stale output from a previous generation is fully replaced.
    if output_dir.exists() {
        fs::remove_dir_all(&output_dir).with_context(|| {
            format!("failed to remove previous output {}", output_dir.display())
        })?;
    }
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;

    let shared_assets = copy_shared_assets(&shared_dir, &output_dir)?;
    for file in ["demo.css", "demo.js"] {
        fs::copy(template_dir.join(file), output_dir.join(file))
            .with_context(|| format!("failed to copy template file {file}"))?;
    }

    let demo_id = schema::demo_phase_id(&name);
    let document = assemble_document(
        title,
        &demo_id,
        &intro_html,
        &demo_html,
        &outro_html,
        &shared_assets,
    );
    let index_path = output_dir.join("index.html");
    fs::write(&index_path, document)
        .with_context(|| format!("failed to write {}", index_path.display()))?;

    let timeline = default_timeline_yaml(&demo_id);
    fs::write(output_dir.join(schema::TIMELINE_FILE), timeline)
        .context("failed to write timeline file")?;

    info!(presentation = %name, output = %output_dir.display(), "presentation generated");
    Ok(index_path)
}

/// Directory-and-id-safe form of a template name.
pub fn sanitize_name(raw: &str) -> String {
    raw.trim().to_lowercase().split_whitespace().collect::<Vec<_>>().join("-")
}

fn read_template(path: &Path) -> RenderResult<String> {
    fs::read_to_string(path).map_err(|error| {
        RenderError::configuration(format!("failed to read {}: {error}", path.display()))
    })
}

/// Copy every file in `shared/` (if present) into the output directory and
/// report the copied names, so the document can link them without a
/// hard-coded asset list.
fn copy_shared_assets(shared_dir: &Path, output_dir: &Path) -> RenderResult<Vec<String>> {
    let mut copied = Vec::new();
    if !shared_dir.is_dir() {
        return Ok(copied);
    }

    let mut entries = fs::read_dir(shared_dir)
        .with_context(|| format!("failed to list {}", shared_dir.display()))?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to read shared asset entry")?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        if !entry.path().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        fs::copy(entry.path(), output_dir.join(&name))
            .with_context(|| format!("failed to copy shared asset {name}"))?;
        copied.push(name);
    }
    Ok(copied)
}

fn assemble_document(
    title: &str,
    demo_id: &str,
    intro_html: &str,
    demo_html: &str,
    outro_html: &str,
    shared_assets: &[String],
) -> String {
    let stylesheets = shared_assets
        .iter()
        .filter(|name| name.ends_with(".css"))
        .map(|name| format!("  <link rel=\"stylesheet\" href=\"./{name}\">\n"))
        .collect::<String>();
    let scripts = shared_assets
        .iter()
        .filter(|name| name.ends_with(".js"))
        .map(|name| format!("  <script src=\"./{name}\"></script>\n"))
        .collect::<String>();

    let engine = ENGINE_SCRIPT
        .replace("__DEMO_ID__", demo_id)
        .replace("__TIMINGS_MS__", &default_timings_ms());

    format!(
        r#"<!DOCTYPE html>
<html lang="en">

<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=1080, initial-scale=1.0">
  <title>{title}</title>

{stylesheets}  <link rel="stylesheet" href="./demo.css">
</head>

<body>

  <div class="reel">

    <section class="slide active" id="{intro_id}">
      <div class="slide-inner">
{intro_html}
        <h2 class="intro-demo-name">{title}</h2>
      </div>
    </section>

    <section class="slide" id="{demo_id}">
{demo_html}
    </section>

    <section class="slide" id="{outro_id}">
      <div class="slide-inner">
{outro_html}
      </div>
    </section>

  </div>

{scripts}  <script src="./demo.js"></script>

  <script>
{engine}
  </script>

</body>
</html>
"#,
        intro_id = INTRO_PHASE_ID,
        outro_id = OUTRO_PHASE_ID,
    )
}

fn default_timings_ms() -> String {
    format!(
        "[{}, {}, {}]",
        (DEFAULT_INTRO_SECONDS * 1000.0) as u64,
        (DEFAULT_DEMO_SECONDS * 1000.0) as u64,
        (DEFAULT_OUTRO_SECONDS * 1000.0) as u64
    )
}

fn default_timeline_yaml(demo_id: &str) -> String {
    format!(
        "fps: {}\nphases:\n  - {{ id: {INTRO_PHASE_ID}, duration: {DEFAULT_INTRO_SECONDS} }}\n  - {{ id: {demo_id}, duration: {DEFAULT_DEMO_SECONDS} }}\n  - {{ id: {OUTRO_PHASE_ID}, duration: {DEFAULT_OUTRO_SECONDS} }}\n",
        schema::DEFAULT_FPS
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed_project(root: &Path, template: &str) {
        let template_dir = root.join(TEMPLATES_DIR).join(template);
        fs::create_dir_all(&template_dir).unwrap();
        fs::write(template_dir.join("demo.html"), "<div class=\"stage\"></div>").unwrap();
        fs::write(template_dir.join("demo.css"), ".stage {}").unwrap();
        fs::write(template_dir.join("demo.js"), "function startDemo() {}").unwrap();

        let base_dir = root.join(TEMPLATES_DIR).join(BASE_TEMPLATE_DIR);
        fs::create_dir_all(&base_dir).unwrap();
        fs::write(base_dir.join("intro.html"), "<h1>hello</h1>").unwrap();
        fs::write(base_dir.join("outro.html"), "<h1>bye</h1>").unwrap();

        let shared = root.join(SHARED_DIR);
        fs::create_dir_all(&shared).unwrap();
        fs::write(shared.join("reel.css"), "body {}").unwrap();
        fs::write(shared.join("particles.js"), "// fx").unwrap();
    }

    #[test]
    fn generated_document_declares_the_timeline_phases() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        seed_project(dir.path(), "css-border");

        let index = create_presentation(dir.path(), "css-border", "Border Styles")
            .expect("generation should succeed");
        let html = fs::read_to_string(&index).unwrap();

        assert!(html.contains("id=\"intro\""));
        assert!(html.contains("id=\"css-border-demo\""));
        assert!(html.contains("id=\"outro\""));
        assert!(html.contains("<title>Border Styles</title>"));
        assert!(html.contains("window.setSlide"));
        assert!(html.contains("window.setRenderMode"));
        assert!(html.contains("href=\"./reel.css\""));
        assert!(html.contains("src=\"./particles.js\""));
    }

    #[test]
    fn generated_timeline_round_trips_through_the_schema() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        seed_project(dir.path(), "glow");

        let index = create_presentation(dir.path(), "glow", "Glow").unwrap();
        let presentation_dir = index.parent().unwrap();

        let spec = schema::load_timeline(presentation_dir, "glow")
            .expect("generated reel.yaml should validate");
        assert_eq!(spec.phases[1].id, "glow-demo");
        assert_eq!(spec.fps, schema::DEFAULT_FPS);
    }

    #[test]
    fn regeneration_replaces_stale_output() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        seed_project(dir.path(), "glow");

        create_presentation(dir.path(), "glow", "Glow").unwrap();
        let stale = dir.path().join(OUTPUT_DIR).join("glow").join("old.png");
        fs::write(&stale, b"stale").unwrap();

        create_presentation(dir.path(), "glow", "Glow").unwrap();
        assert!(!stale.exists());
    }

    #[test]
    fn missing_template_file_is_a_configuration_error() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        seed_project(dir.path(), "glow");
        fs::remove_file(
            dir.path()
                .join(TEMPLATES_DIR)
                .join("glow")
                .join("demo.js"),
        )
        .unwrap();

        let error = create_presentation(dir.path(), "glow", "Glow")
            .expect_err("missing demo.js should fail");
        assert!(error.to_string().contains("demo.js"));
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn template_names_are_sanitized() {
        assert_eq!(sanitize_name("  CSS Border  "), "css-border");
        assert_eq!(sanitize_name("Glow"), "glow");
    }
}
