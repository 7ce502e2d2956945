// segprompt command line interface
// Runs one box, point, text or everything prompt over an image and its masks

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use segprompt_core::{
    BBox, Detection, Device, LabeledPoint, Mask, PointLabel, PromptConfig, RenderOptions,
    SegmentationResults,
};
use segprompt_eye::{PromptSession, SessionContext};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "segprompt")]
#[command(about = "Select and render segmentation masks from box, point or text prompts", long_about = None)]
#[command(version)]
struct Cli {
    /// Source image
    image: PathBuf,

    /// Directory of PNG mask planes, read in file-name order
    #[arg(long)]
    masks: PathBuf,

    /// JSON file of `[[x1, y1, x2, y2, conf], ...]`, one per mask
    #[arg(long)]
    boxes: Option<PathBuf>,

    /// Output directory (overrides the config file)
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// cpu or accelerator (overrides the config file)
    #[arg(long)]
    device: Option<Device>,

    #[command(flatten)]
    render: RenderArgs,

    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct RenderArgs {
    /// Paint every mask in the fixed blue
    #[arg(long, global = true)]
    no_random_color: bool,

    /// Skip the morphological cleanup
    #[arg(long, global = true)]
    no_better_quality: bool,

    /// Composite at the mask resolution
    #[arg(long, global = true)]
    retina: bool,

    /// Do not draw mask outlines
    #[arg(long, global = true)]
    no_contours: bool,

    /// Seed for random mask colors
    #[arg(long, global = true)]
    seed: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Render every mask
    Everything {
        /// Drop masks mostly contained in a larger one
        #[arg(long)]
        filter_overlaps: bool,
    },

    /// Select the mask best matching a box
    #[command(name = "box")]
    BoxPrompt {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
    },

    /// Compose a mask from labeled points
    Point {
        /// X,Y,LABEL with LABEL 1 for foreground and 0 for background
        #[arg(long = "point", value_parser = parse_point, required = true)]
        points: Vec<LabeledPoint>,
    },

    /// Select the region best matching a text query
    Text {
        query: String,

        /// Directory holding image_encoder.onnx, text_encoder.onnx and tokenizer.json
        #[arg(long)]
        model_dir: Option<PathBuf>,
    },
}

fn parse_point(s: &str) -> Result<LabeledPoint, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    let [x, y, label] = parts.as_slice() else {
        return Err(format!("expected X,Y,LABEL, got {:?}", s));
    };
    let x: f32 = x.parse().map_err(|_| format!("invalid x coordinate: {}", x))?;
    let y: f32 = y.parse().map_err(|_| format!("invalid y coordinate: {}", y))?;
    let label: u8 = label.parse().map_err(|_| format!("invalid label: {}", label))?;
    let label = PointLabel::try_from(label).map_err(|e| e.to_string())?;
    Ok(LabeledPoint { x, y, label })
}

/// PNG mask planes in `dir`, sorted by file name.
fn load_masks(dir: &Path) -> anyhow::Result<Vec<Mask>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read mask directory {:?}", dir))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("png"))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();

    paths
        .iter()
        .map(|path| {
            let plane = image::open(path)
                .with_context(|| format!("Failed to decode mask {:?}", path))?
                .to_luma8();
            Ok(Mask::from_luma(&plane))
        })
        .collect()
}

fn load_boxes(path: &Path) -> anyhow::Result<Vec<Detection>> {
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read boxes {:?}", path))?;
    let rows: Vec<[f32; 5]> =
        serde_json::from_str(&text).with_context(|| format!("Failed to parse boxes {:?}", path))?;
    Ok(rows
        .into_iter()
        .map(|[x1, y1, x2, y2, conf]| Detection::new(BBox::new(x1, y1, x2, y2), conf))
        .collect())
}

fn load_results(masks: &Path, boxes: Option<&Path>) -> anyhow::Result<SegmentationResults> {
    let masks = load_masks(masks)?;
    let results = match boxes {
        Some(path) => SegmentationResults::new(masks, load_boxes(path)?)?,
        None => SegmentationResults::from_masks(masks)?,
    };
    Ok(results)
}

fn render_options(base: RenderOptions, args: &RenderArgs) -> RenderOptions {
    RenderOptions {
        random_color: base.random_color && !args.no_random_color,
        better_quality: base.better_quality && !args.no_better_quality,
        retina: base.retina || args.retina,
        with_contours: base.with_contours && !args.no_contours,
        seed: args.seed.or(base.seed),
    }
}

#[cfg(feature = "onnx")]
fn text_masks(session: &PromptSession, query: &str, model_dir: &Path) -> anyhow::Result<Vec<Mask>> {
    let mut embedder = segprompt_eye::ClipEmbedder::load(model_dir, session.context().device())?;
    Ok(session.text_prompt(&mut embedder, query)?)
}

#[cfg(not(feature = "onnx"))]
fn text_masks(_session: &PromptSession, _query: &str, _model_dir: &Path) -> anyhow::Result<Vec<Mask>> {
    bail!("text prompts need segprompt built with the `onnx` feature")
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let mut config = match &cli.config {
        Some(path) => PromptConfig::from_file(path)?,
        None => PromptConfig::default(),
    };
    if let Some(device) = cli.device {
        config.device = device;
    }
    if let Some(output) = &cli.output {
        config.output_dir = output.clone();
    }
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
    let options = render_options(config.render, &cli.render);
    debug!("Configuration: {:?}", config);

    let results = load_results(&cli.masks, cli.boxes.as_deref())?;
    info!("Loaded {} masks from {:?}", results.len(), cli.masks);
    let context = SessionContext::open(&cli.image, results, config.device)?;
    let session = PromptSession::new(context).with_min_area(config.min_area);

    let mut bbox = None;
    let mut points = Vec::new();
    let masks = match cli.command {
        Commands::Everything { filter_overlaps } => session.everything_prompt(filter_overlaps)?,
        Commands::BoxPrompt { x1, y1, x2, y2 } => {
            let query = BBox::new(x1, y1, x2, y2);
            bbox = Some(query);
            session.box_prompt(query)?
        }
        Commands::Point { points: prompt } => {
            let masks = session.point_prompt(&prompt)?;
            points = prompt;
            masks
        }
        Commands::Text { query, model_dir } => {
            let Some(model_dir) = model_dir.or_else(|| config.model_dir.clone()) else {
                bail!("text prompts need --model-dir or model_dir in the config file");
            };
            text_masks(&session, &query, &model_dir)?
        }
    };

    let path = session.plot(&masks, &config.output_dir, bbox, &points, &options)?;
    println!("{}", path.display());
    Ok(())
}
