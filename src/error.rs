//! Error types for Drishti

use thiserror::Error;

use crate::camera::CameraError;
use crate::detect::DetectionError;
use crate::render::RenderError;
use crate::translate::TranslationError;
use crate::voice::SpeechError;

/// Result type alias for Drishti operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Drishti
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Camera acquisition or capture error
    #[error(transparent)]
    Camera(#[from] CameraError),

    /// Object detection error
    #[error(transparent)]
    Detection(#[from] DetectionError),

    /// Label translation error
    #[error(transparent)]
    Translation(#[from] TranslationError),

    /// Speech synthesis or playback error
    #[error(transparent)]
    Speech(#[from] SpeechError),

    /// Frame drawing or encoding error
    #[error(transparent)]
    Render(#[from] RenderError),

    /// HTTP server error
    #[error("server error: {0}")]
    Server(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
