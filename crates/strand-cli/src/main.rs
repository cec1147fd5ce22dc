//! `strand-cli`: inspect and export OpenStrand project files without the GUI.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use strand_core::CanvasState;
use strand_editor::{EditorConfig, LayerStateService, persist};
use strand_render::{export_svg, export_svg_cropped};

#[derive(Debug, Parser)]
#[command(name = "strand-cli", version, about = "OpenStrand project tools")]
struct Cli {
    /// Editor settings as a (partial) JSON file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print layer, strand and mask totals.
    Info { file: PathBuf },

    /// Render the project to SVG.
    Export {
        file: PathBuf,
        /// Output path; defaults to the project path with an `.svg` extension.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Crop to the drawing plus padding instead of the full page.
        #[arg(long)]
        crop: bool,
        #[arg(long, default_value_t = 1200.0)]
        width: f64,
        #[arg(long, default_value_t = 900.0)]
        height: f64,
    },

    /// Print the derived layer-state report.
    Layers { file: PathBuf },

    /// Check the project's invariants; exits non-zero on the first violation.
    Validate { file: PathBuf },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("strand-cli: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            EditorConfig::from_json(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None => EditorConfig::default(),
    };
    log::debug!("using config {config:?}");

    match cli.command {
        Command::Info { file } => {
            let canvas = load(&file).await?;
            print!("{}", canvas.statistics());
        }
        Command::Export {
            file,
            output,
            crop,
            width,
            height,
        } => {
            let canvas = load(&file).await?;
            let export = if crop {
                export_svg_cropped(&canvas)
            } else {
                export_svg(&canvas, width, height)
            };
            let out = output.unwrap_or_else(|| svg_path(&file));
            tokio::fs::write(&out, export.svg)
                .await
                .with_context(|| format!("writing {}", out.display()))?;
            log::info!(
                "exported {} ({}x{})",
                out.display(),
                export.width,
                export.height
            );
        }
        Command::Layers { file } => {
            let canvas = load(&file).await?;
            let mut service = LayerStateService::new();
            println!("{}", service.save_current_state(&canvas));
        }
        Command::Validate { file } => {
            let text = read(&file).await?;
            // Parse without repair so broken links are reported, not fixed.
            let canvas: CanvasState = serde_json::from_str(&text)
                .with_context(|| format!("{} is not an OpenStrand project", file.display()))?;
            if let Err(e) = canvas.validate() {
                bail!("{}: {e}", file.display());
            }
            println!("{}: ok ({} strands)", file.display(), canvas.strands().len());
        }
    }
    Ok(())
}

async fn read(file: &Path) -> Result<String> {
    tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("reading {}", file.display()))
}

async fn load(file: &Path) -> Result<CanvasState> {
    let text = read(file).await?;
    persist::import_json(&text)
        .with_context(|| format!("{} is not an OpenStrand project", file.display()))
}

fn svg_path(file: &Path) -> PathBuf {
    file.with_extension("svg")
}
