// File: error.rs
// Location: /src/error.rs

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("encoder capability failed to load: {0}")]
    Failed(String),
    #[error("encoder capability did not become ready within {0:?}")]
    TimedOut(Duration),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("worker did not respond within {0:?}")]
    Timeout(Duration),
    #[error("worker reported failure: {0}")]
    Worker(String),
    #[error("worker channel closed before a response arrived")]
    Disconnected,
    #[error("worker was terminated")]
    Terminated,
    #[error("failed to start worker: {0}")]
    Spawn(String),
}

#[derive(Debug, Error)]
pub enum LogoLoadError {
    #[error("failed to read logo: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to decode logo: {0}")]
    Decode(#[from] image::ImageError),
    #[error("logo unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum CompositeError {
    #[error("invalid surface size {0}")]
    InvalidSize(u32),
    #[error("empty module matrix")]
    EmptyMatrix,
    #[error("failed to encode surface: {0}")]
    Encode(#[from] image::ImageError),
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RequestError {
    #[error("text must not be empty")]
    EmptyText,
    #[error("text is longer than {max} characters")]
    TextTooLong { max: usize },
    #[error("size must be between 1 and {max} pixels, got {got}")]
    InvalidSize { got: u32, max: u32 },
    #[error("logo size fraction must be in (0, 1), got {0}")]
    InvalidLogoFraction(f32),
}

#[derive(Debug, Error)]
pub enum GenerationFailure {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Composite(#[from] CompositeError),
}
