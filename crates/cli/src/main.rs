use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::Parser;

use deepcheck_core::detection::infrastructure::face_mesh_detector::DetectorSettings;
use deepcheck_core::detection::infrastructure::onnx_detector_factory::OnnxLandmarkDetectorFactory;
use deepcheck_core::model::pretrained_model::PretrainedModel;
use deepcheck_core::pipeline::pipeline_logger::{
    NullPipelineLogger, PipelineLogger, StdoutPipelineLogger,
};
use deepcheck_core::pipeline::predict_media_use_case::PredictMediaUseCase;
use deepcheck_core::shared::config::PipelineConfig;
use deepcheck_core::shared::constants::{FACE_DETECTION_MODEL_NAME, FACE_MESH_MODEL_NAME};
use deepcheck_core::shared::media_input::MediaInput;
use deepcheck_core::shared::model_resolver;
use deepcheck_core::video::infrastructure::reader_factory::FfmpegReaderFactory;

/// Deepfake detection for videos and images.
#[derive(Parser)]
#[command(name = "deepcheck")]
struct Cli {
    /// Input video or image file.
    input: PathBuf,

    /// Directory holding reducer.json, classifier.json and the face models.
    #[arg(long, default_value = "models")]
    models: PathBuf,

    /// Pipeline configuration file (JSON). Flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Frames per second to sample from videos.
    #[arg(long)]
    sample_rate: Option<f64>,

    /// Maximum number of faces the detector looks for.
    #[arg(long)]
    max_faces: Option<usize>,

    /// Minimum face presence score (0.0-1.0).
    #[arg(long)]
    detection_confidence: Option<f64>,

    /// Minimum score to keep tracking a face across frames (0.0-1.0).
    #[arg(long)]
    tracking_confidence: Option<f64>,

    /// Download URL for the face detection model when it is not cached.
    #[arg(long)]
    detection_model_url: Option<String>,

    /// Download URL for the face mesh model when it is not cached.
    #[arg(long)]
    mesh_model_url: Option<String>,

    /// Print the result as JSON.
    #[arg(long)]
    json: bool,

    /// Log per-stage timings and counters after the run.
    #[arg(long)]
    stats: bool,
}

fn main() {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_filter(&cli)))
        .init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

/// `--stats` reports through `log::info!`, so it lowers the default level.
/// `RUST_LOG` still wins when set.
fn log_filter(cli: &Cli) -> &'static str {
    if cli.stats {
        "info"
    } else {
        "error"
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    validate(&cli)?;

    let config = build_config(&cli)?;
    let model = Arc::new(PretrainedModel::load(&cli.models)?);
    let detectors = build_detector_factory(&cli, &config)?;

    let use_case = PredictMediaUseCase::new(
        model,
        Box::new(FfmpegReaderFactory),
        Box::new(detectors),
        config,
    )?;

    let input = MediaInput::from_path(&cli.input);
    let result = if cli.stats {
        let mut logger = StdoutPipelineLogger::default();
        let result = use_case.execute(&input, &mut logger);
        logger.summary();
        result?
    } else {
        use_case.execute(&input, &mut NullPipelineLogger)?
    };

    if cli.json {
        println!("{}", serde_json::to_string(&result)?);
    } else {
        println!("{result}");
    }
    Ok(())
}

/// File values (or defaults), then flags on top.
fn build_config(cli: &Cli) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(rate) = cli.sample_rate {
        config.target_sample_rate = rate;
    }
    if let Some(n) = cli.max_faces {
        config.max_faces = n;
    }
    if let Some(c) = cli.detection_confidence {
        config.detection_confidence = c;
    }
    if let Some(c) = cli.tracking_confidence {
        config.tracking_confidence = c;
    }
    config.validate()?;
    Ok(config)
}

fn build_detector_factory(
    cli: &Cli,
    config: &PipelineConfig,
) -> Result<OnnxLandmarkDetectorFactory, Box<dyn std::error::Error>> {
    let model_dir = Some(cli.models.as_path());

    log::info!("Resolving model: {FACE_DETECTION_MODEL_NAME}");
    let detection_model = model_resolver::resolve(
        FACE_DETECTION_MODEL_NAME,
        model_dir,
        cli.detection_model_url.as_deref(),
        Some(Box::new(|done: u64, total: u64| {
            download_progress("face detection", done, total)
        })),
    )?;

    log::info!("Resolving model: {FACE_MESH_MODEL_NAME}");
    let mesh_model = model_resolver::resolve(
        FACE_MESH_MODEL_NAME,
        model_dir,
        cli.mesh_model_url.as_deref(),
        Some(Box::new(|done: u64, total: u64| {
            download_progress("face mesh", done, total)
        })),
    )?;

    Ok(OnnxLandmarkDetectorFactory::new(
        detection_model,
        mesh_model,
        DetectorSettings::from(config),
    ))
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.input.exists() {
        return Err(format!("Input file not found: {}", cli.input.display()).into());
    }
    if let Some(rate) = cli.sample_rate {
        if !(rate.is_finite() && rate > 0.0) {
            return Err(format!("Sample rate must be positive, got {rate}").into());
        }
    }
    if cli.max_faces == Some(0) {
        return Err("Max faces must be at least 1".into());
    }
    for (name, value) in [
        ("Detection confidence", cli.detection_confidence),
        ("Tracking confidence", cli.tracking_confidence),
    ] {
        if let Some(v) = value {
            if !(0.0..=1.0).contains(&v) {
                return Err(format!("{name} must be between 0.0 and 1.0, got {v}").into());
            }
        }
    }
    if let Some(path) = &cli.config {
        if !path.exists() {
            return Err(format!("Config file not found: {}", path.display()).into());
        }
    }
    if !is_dir(&cli.models) {
        return Err(format!("Model directory not found: {}", cli.models.display()).into());
    }
    Ok(())
}

fn is_dir(path: &Path) -> bool {
    path.metadata().map(|m| m.is_dir()).unwrap_or(false)
}

fn download_progress(what: &str, downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading {what} model... {pct}%");
        if downloaded >= total {
            eprintln!();
        }
    } else {
        eprint!("\rDownloading {what} model... {downloaded} bytes");
    }
}
