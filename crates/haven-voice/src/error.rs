//! Error types for the voice routing engine

use thiserror::Error;

/// Result type alias for speech operations
pub type SpeechResult<T> = Result<T, SpeechError>;

/// Errors that can occur while routing and playing synthesized speech.
///
/// Only `LocalEngine` and `Playback` (on the local route) are fatal to a
/// `speak()` call; premium-side failures are absorbed by the router and
/// surface as an advisory instead.
#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Premium synthesis error: {0}")]
    Premium(String),

    #[error("Local synthesis engine error: {0}")]
    LocalEngine(String),

    #[error("Audio playback error: {0}")]
    Playback(String),

    #[error("Quota store error: {0}")]
    QuotaStore(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for SpeechError {
    fn from(err: reqwest::Error) -> Self {
        SpeechError::Premium(err.to_string())
    }
}
