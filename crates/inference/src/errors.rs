use std::path::PathBuf;
use thiserror::Error;

/// Everything that can stop a request from producing detections.
///
/// The `Display` text of each variant is what callers see in the
/// `error` field of the failure record.
#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("No input received")]
    EmptyInput,

    #[error("Model not found: {}", .0.display())]
    ModelNotFound(PathBuf),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Inference failed: {0:#}")]
    Inference(anyhow::Error),
}

impl DetectorError {
    /// Short stable name used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            DetectorError::EmptyInput => "empty_input",
            DetectorError::ModelNotFound(_) => "model_not_found",
            DetectorError::Decode(_) => "decode_failure",
            DetectorError::Inference(_) => "inference_failure",
        }
    }
}

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Input is not valid UTF-8 text")]
    NotUtf8,

    #[error("Invalid input envelope: {0}")]
    Envelope(String),

    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Failed to decode image: {0}")]
    Image(#[from] image::ImageError),
}
