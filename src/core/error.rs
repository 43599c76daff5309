//! Error types for the assetflow runtime

use thiserror::Error;

use crate::loading::source::FetchError;

/// Main error type for the runtime
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Task error: {0}")]
    Task(String),

    #[error("Unknown task: {0}")]
    UnknownTask(String),

    #[error("Cleanup error: {0}")]
    Cleanup(String),
}

impl Error {
    /// Shorthand for a failing frame-task callback.
    pub fn task(message: impl Into<String>) -> Self {
        Self::Task(message.into())
    }
}
