// ABOUTME: Centralized error handling for the application
// Provides consistent error types and conversions

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Image could not be read: {0}")]
    ImageDecode(String),

    #[error("OCR request failed: {0}")]
    Inference(String),

    #[error("An OCR run is already in progress")]
    RunInProgress,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl From<image::ImageError> for OcrError {
    fn from(err: image::ImageError) -> Self {
        OcrError::ImageDecode(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, OcrError>;
