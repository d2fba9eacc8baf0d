use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Recording deserialization error: {0}")]
    Deserialization(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid recording: {0}")]
    InvalidRecording(String),

    #[error("Asset load failed: {0}")]
    AssetLoad(String),
}

pub type Result<T> = std::result::Result<T, Error>;
