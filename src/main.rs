mod capture;
mod driver;
mod encode;
mod error;
mod generate;
mod render;
mod schema;
mod scheduler;
mod surface;
mod timeline;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use crate::render::RenderRequest;
use crate::timeline::Timeline;

#[derive(Debug, Parser)]
#[command(name = "slidereel", version = env!("SLIDEREEL_VERSION"))]
#[command(about = "Frame-accurate presentation-to-video renderer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Render a presentation document to a video file.
    Render {
        /// Path to the presentation's index.html
        input: PathBuf,
        /// Output base name (defaults to the presentation directory name)
        #[arg(short = 'o', long = "output")]
        output: Option<String>,
    },
    /// Validate the timeline configuration without launching a browser.
    Check {
        /// Path to the presentation's index.html
        input: PathBuf,
        /// Emit a machine-readable summary
        #[arg(long)]
        json: bool,
    },
    /// Assemble a presentation from a template directory.
    New {
        /// Template name under templates/
        template: String,
        /// Title shown on the intro slide
        #[arg(long, default_value = "Untitled demo")]
        title: String,
    },
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Render { input, output } => run_render(input, output),
        Commands::Check { input, json } => run_check(&input, json),
        Commands::New { template, title } => run_new(&template, &title),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::from(error::exit_code(&error))
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run_render(input: PathBuf, output: Option<String>) -> Result<()> {
    let mut request = RenderRequest::new(input);
    request.output_name = output;

    let video = render::render(&request)?;
    println!("Wrote {} ({} frames)", video.path.display(), video.frames);
    Ok(())
}

fn run_check(input: &Path, json: bool) -> Result<()> {
    if !input.is_file() {
        return Err(error::RenderError::surface_load(format!(
            "presentation document not found: {}",
            input.display()
        ))
        .into());
    }

    let request = RenderRequest::new(input.to_path_buf());
    let presentation_id = request.presentation_id();
    let presentation_dir = input.parent().unwrap_or_else(|| Path::new("."));
    let spec = schema::load_timeline(presentation_dir, &presentation_id)?;
    let timeline = Timeline::from_spec(&spec)?;

    if json {
        let phases = timeline
            .phases()
            .iter()
            .map(|phase| {
                json!({
                    "id": phase.id,
                    "duration_seconds": phase.duration.as_secs_f64(),
                    "frames": phase.frames,
                    "first_frame": phase.first_frame,
                })
            })
            .collect::<Vec<_>>();
        let summary = json!({
            "ok": true,
            "presentation": presentation_id,
            "fps": timeline.fps(),
            "viewport": { "width": spec.viewport.width, "height": spec.viewport.height },
            "total_duration_seconds": timeline.total_duration().as_secs_f64(),
            "total_frames": timeline.total_frames(),
            "phases": phases,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!(
        "OK: {presentation_id} ({} fps, {:.1}s, {} frames)",
        timeline.fps(),
        timeline.total_duration().as_secs_f64(),
        timeline.total_frames()
    );
    for phase in timeline.phases() {
        println!(
            "  {:<24} {:>6.1}s  frames {}..{}",
            phase.id,
            phase.duration.as_secs_f64(),
            phase.first_frame,
            phase.end_frame() - 1
        );
    }
    Ok(())
}

fn run_new(template: &str, title: &str) -> Result<()> {
    let root = std::env::current_dir()?;
    let index = generate::create_presentation(&root, template, title)?;
    println!("Generated {}", index.display());
    println!("Render with: slidereel render {}", index.display());
    Ok(())
}
