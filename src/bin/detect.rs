//! detect - run remote object detection on one image and report the boxes
//!
//! This tool:
//! 1. Loads configuration (WORKBENCH_CONFIG file + environment)
//! 2. Sends the image to the inference service (or a stub)
//! 3. Prints detections by descending confidence
//! 4. Optionally writes a JSON export, an annotated image, and an SVG overlay

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use std::io::IsTerminal;
use std::path::PathBuf;

use detection_workbench::config::validate_model;
use detection_workbench::detect::{DetectionClient, ImagePayload, InferenceTransport, StubTransport};
use detection_workbench::overlay::{raster, svg, DisplayGeometry};
use detection_workbench::{Completion, Detection, Workbench, WorkbenchConfig};

#[path = "../ui.rs"]
mod ui;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// Hosted Gemini generateContent endpoint.
    Gemini,
    /// Offline; answers with the file given by --stub-response.
    Stub,
}

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Image to analyze.
    image: PathBuf,
    /// Write detections as indented JSON.
    #[arg(long)]
    export: Option<PathBuf>,
    /// Write an annotated copy of the image (format from the extension).
    #[arg(long)]
    annotate: Option<PathBuf>,
    /// Write an SVG overlay sized to the display geometry.
    #[arg(long)]
    svg: Option<PathBuf>,
    /// Display width in pixels (defaults to the image width).
    #[arg(long)]
    display_width: Option<u32>,
    /// Display height in pixels (defaults to the image height).
    #[arg(long)]
    display_height: Option<u32>,
    /// Model id, overriding configuration.
    #[arg(long)]
    model: Option<String>,
    /// Inference backend.
    #[arg(long, value_enum, default_value_t = Backend::Gemini)]
    backend: Backend,
    /// Canned model output used by the stub backend.
    #[arg(long, required_if_eq("backend", "stub"))]
    stub_response: Option<PathBuf>,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let ui = ui::Ui::from_flag(&args.ui, std::io::stderr().is_terminal())?;

    let mut cfg = WorkbenchConfig::load()?;
    if let Some(model) = args.model.as_deref() {
        validate_model(model)?;
        cfg.model = model.to_string();
    }
    log::info!("config: {:?}", cfg);

    let (payload, decoded) = {
        let stage = ui.stage("Load image");
        let bytes = std::fs::read(&args.image)
            .with_context(|| format!("read image {}", args.image.display()))?;
        let decoded = image::load_from_memory(&bytes)
            .with_context(|| format!("decode image {}", args.image.display()))?;
        let payload = ImagePayload::from_bytes(&bytes, Some(&args.image))?;
        stage.succeed();
        (payload, decoded)
    };
    let geometry = DisplayGeometry::for_image(
        (decoded.width(), decoded.height()),
        args.display_width,
        args.display_height,
    );

    let client = match args.backend {
        Backend::Gemini => DetectionClient::from_config(&cfg)?,
        Backend::Stub => {
            let path = args
                .stub_response
                .as_deref()
                .ok_or_else(|| anyhow!("--stub-response is required with --backend stub"))?;
            let transport: Box<dyn InferenceTransport> = Box::new(StubTransport::from_file(path)?);
            DetectionClient::new(transport, &cfg.model).with_bounds_policy(cfg.bounds_policy)
        }
    };

    let mut workbench = Workbench::new();
    workbench.load_image(payload.clone());
    workbench.set_geometry(geometry);
    let ticket = workbench.begin_detection()?;
    let outcome = {
        let stage = ui.stage("Detect objects");
        let outcome = client.detect(&payload);
        if outcome.is_ok() {
            stage.succeed();
        }
        outcome
    };
    if workbench.complete(ticket, outcome) == Completion::Stale {
        return Err(anyhow!("detection result was superseded"));
    }
    if let Some(failure) = workbench.state().failure() {
        eprintln!("{}", failure.user_message);
        return Err(anyhow!("{}", failure.message));
    }

    print_listing(&workbench.listing());

    if let Some(path) = &args.export {
        let stage = ui.stage("Write export");
        let json = workbench
            .export_json()?
            .ok_or_else(|| anyhow!("no detections to export"))?;
        std::fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
        stage.succeed();
        println!("export written to {}", path.display());
    }
    if let Some(path) = &args.annotate {
        let stage = ui.stage("Write annotated image");
        let detections = workbench
            .state()
            .detections()
            .map(|set| set.as_slice())
            .unwrap_or_default();
        raster::save_annotated(raster::annotate(&decoded, detections, geometry), path)?;
        stage.succeed();
        println!("annotated image written to {}", path.display());
    }
    if let Some(path) = &args.svg {
        let stage = ui.stage("Write SVG overlay");
        std::fs::write(path, svg::render_svg(&workbench.frames(), geometry))
            .with_context(|| format!("write {}", path.display()))?;
        stage.succeed();
        println!("svg overlay written to {}", path.display());
    }
    Ok(())
}

fn print_listing(detections: &[&Detection]) {
    if detections.is_empty() {
        println!("no objects detected");
        return;
    }
    println!("{:>3}  {:<28} {:>5}  [ymin, xmin, ymax, xmax]", "#", "label", "conf");
    for (rank, detection) in detections.iter().enumerate() {
        let b = detection.bbox;
        println!(
            "{:>3}  {:<28} {:>4}%  [{}, {}, {}, {}]",
            rank + 1,
            detection.label,
            detection.confidence_percent(),
            b.ymin,
            b.xmin,
            b.ymax,
            b.xmax
        );
    }
}
