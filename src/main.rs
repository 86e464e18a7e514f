use anyhow::Context;
use clap::Parser;
use imageproc::drawing;
use tracing::info;
use tracing_subscriber::EnvFilter;

use std::path::PathBuf;
use std::sync::Arc;

use platescan::{Config, Lpr, Models, PlateResult};

/// Locate and read the license plates of an image.
#[derive(Parser, Debug)]
#[command(name = "platescan", version, author = "kingrong")]
struct Args {
    /// image file with license plate
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// plate judge model (JSON)
    #[arg(long, default_value = "./models/judge.json")]
    judge_model: PathBuf,

    /// character classifier model (JSON)
    #[arg(long, default_value = "./models/classifier.json")]
    classifier_model: PathBuf,

    /// TOML configuration, defaults are used for missing keys
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// overrides `max_results` of the configuration
    #[arg(long)]
    max_results: Option<usize>,

    /// write a copy of the input with the recognized regions drawn on it
    #[arg(long, value_name = "PATH")]
    annotate: Option<PathBuf>,

    /// used when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let mut config = match args.config.as_ref() {
        Some(path) => Config::from_toml_file(path).with_context(|| format!("reading {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(max_results) = args.max_results {
        config.max_results = max_results;
    }

    let models = Models::load(&args.judge_model, &args.classifier_model)?;
    let lpr = Lpr::new(config, Arc::new(models))?;

    let img = image::open(&args.input).with_context(|| format!("opening {}", args.input.display()))?;
    let results = lpr.recognize(&img)?;
    info!(plates = results.len(), input = %args.input.display(), "done");

    if let Some(path) = args.annotate.as_ref() {
        let mut canvas = img.to_rgb8();
        annotate(&mut canvas, &results);
        canvas.save(path).with_context(|| format!("writing {}", path.display()))?;
    }

    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn annotate(canvas: &mut image::RgbImage, results: &[PlateResult]) {
    let red = image::Rgb([255, 0, 0]);
    for result in results {
        let corners = result.corners();
        for i in 0..corners.len() {
            let (a, b) = (corners[i], corners[(i + 1) % corners.len()]);
            drawing::draw_line_segment_mut(canvas, (a.x, a.y), (b.x, b.y), red);
        }
    }
}
