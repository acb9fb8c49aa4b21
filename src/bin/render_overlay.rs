//! render_overlay - draw a saved detection export onto an image, offline

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use detection_workbench::overlay::{raster, render_frames, svg, DisplayGeometry};
use detection_workbench::DetectionSet;

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Detection export written by `detect --export`.
    export: PathBuf,
    /// Image the detections were produced for.
    image: PathBuf,
    /// Output path for the annotated image (format from the extension).
    #[arg(long)]
    out: Option<PathBuf>,
    /// Output path for an SVG overlay.
    #[arg(long)]
    svg: Option<PathBuf>,
    /// Display width in pixels (defaults to the image width).
    #[arg(long)]
    display_width: Option<u32>,
    /// Display height in pixels (defaults to the image height).
    #[arg(long)]
    display_height: Option<u32>,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if args.out.is_none() && args.svg.is_none() {
        return Err(anyhow!("nothing to do: pass --out and/or --svg"));
    }
    let ui = ui::Ui::from_flag(&args.ui, std::io::stderr().is_terminal())?;

    let detections = {
        let stage = ui.stage("Load export");
        let raw = std::fs::read_to_string(&args.export)
            .with_context(|| format!("read export {}", args.export.display()))?;
        let detections = DetectionSet::from_export_json(&raw)?;
        stage.succeed();
        detections
    };
    let suspicious = detections
        .iter()
        .filter(|d| !d.bbox.in_bounds() || !d.bbox.is_well_formed())
        .count();
    if suspicious > 0 {
        log::warn!(
            "{} of {} boxes are inverted or outside the 0..=1000 grid",
            suspicious,
            detections.len()
        );
    }

    let source = {
        let stage = ui.stage("Load image");
        let source = image::open(&args.image)
            .with_context(|| format!("open image {}", args.image.display()))?;
        stage.succeed();
        source
    };
    let geometry = DisplayGeometry::for_image(
        (source.width(), source.height()),
        args.display_width,
        args.display_height,
    );

    if let Some(path) = &args.out {
        let stage = ui.stage("Write annotated image");
        raster::save_annotated(raster::annotate(&source, detections.as_slice(), geometry), path)?;
        stage.succeed();
        println!("annotated image written to {}", path.display());
    }
    if let Some(path) = &args.svg {
        let stage = ui.stage("Write SVG overlay");
        let frames = render_frames(detections.as_slice(), geometry);
        std::fs::write(path, svg::render_svg(&frames, geometry))
            .with_context(|| format!("write {}", path.display()))?;
        stage.succeed();
        println!("svg overlay written to {}", path.display());
    }
    println!(
        "{} detections rendered at {}x{}",
        detections.len(),
        geometry.width,
        geometry.height
    );
    Ok(())
}
