use crate::config::ConfigError;
use crate::interpolation::InterpolationError;
use crate::record::RecordError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error(transparent)]
    Interpolation(#[from] InterpolationError),
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),
    #[error("coordinates required: pass both --x and --y")]
    MissingCoordinates,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("state lock poisoned")]
    StateLock,
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
