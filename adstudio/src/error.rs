//! Error definitions for the studio pipeline.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP client error: {source}")]
    HttpClient {
        #[from]
        source: reqwest::Error,
    },

    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Parse error: {message}")]
    Parse { message: String },

    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },

    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("Image error: {source}")]
    Image {
        #[from]
        source: image::ImageError,
    },

    #[error("Auth error: {message}")]
    Auth { message: String },

    #[error("Prompt synthesis returned no usable text: {message}")]
    EmptyPrompt { message: String },

    #[error("Scene generation was filtered by the safety policy: {reason}")]
    SceneFiltered { reason: String },

    #[error("Scene generation returned no image")]
    NoImageGenerated,

    #[error("Segmentation returned no foreground mask")]
    NoMask,
}

pub type Result<T> = std::result::Result<T, Error>;
