mod config;
mod domain;
mod error;
mod routes;
mod services;
#[cfg(test)]
mod test_support;

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use deepcheck_core::detection::infrastructure::face_mesh_detector::DetectorSettings;
use deepcheck_core::detection::infrastructure::onnx_detector_factory::{
    ModelUrls, OnnxLandmarkDetectorFactory,
};
use deepcheck_core::model::pretrained_model::PretrainedModel;
use deepcheck_core::pipeline::predict_media_use_case::PredictMediaUseCase;
use deepcheck_core::shared::config::PipelineConfig;
use deepcheck_core::video::infrastructure::reader_factory::FfmpegReaderFactory;

use config::ServerConfig;
use domain::users;

const DB_MAX_CONNECTIONS: u32 = 5;

pub struct AppState {
    pub db: SqlitePool,
    pub predictor: Arc<PredictMediaUseCase>,
    pub jwt_secret: Vec<u8>,
    pub require_auth: bool,
    pub secure_cookies: bool,
    pub upload_dir: PathBuf,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::from_env()?;

    // Model resolution may download over blocking HTTP, so it happens before
    // the async runtime starts.
    let predictor = Arc::new(build_predictor(&config)?);
    std::fs::create_dir_all(&config.upload_dir)?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(serve(config, predictor))
}

fn build_predictor(config: &ServerConfig) -> Result<PredictMediaUseCase, Box<dyn std::error::Error>> {
    let pipeline_config = match &config.pipeline_config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    let model = Arc::new(PretrainedModel::load(&config.models_dir)?);

    let urls = ModelUrls {
        face_detection: config.detection_model_url.clone(),
        face_mesh: config.mesh_model_url.clone(),
    };
    let detectors = OnnxLandmarkDetectorFactory::resolve(
        Some(&config.models_dir),
        &urls,
        DetectorSettings::from(&pipeline_config),
    )?;

    Ok(PredictMediaUseCase::new(
        model,
        Box::new(FfmpegReaderFactory),
        Box::new(detectors),
        pipeline_config,
    )?)
}

async fn serve(
    config: ServerConfig,
    predictor: Arc<PredictMediaUseCase>,
) -> Result<(), Box<dyn std::error::Error>> {
    let db = SqlitePoolOptions::new()
        .max_connections(DB_MAX_CONNECTIONS)
        .connect(&config.database_url)
        .await?;
    users::init_schema(&db).await?;

    if !config.require_auth {
        log::warn!("DEEPCHECK_REQUIRE_AUTH is off: uploads are accepted without a session");
    }

    let state = Arc::new(AppState {
        db,
        predictor,
        jwt_secret: config.jwt_secret,
        require_auth: config.require_auth,
        secure_cookies: config.secure_cookies,
        upload_dir: config.upload_dir,
    });
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    log::info!("Listening on {}", config.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
