//! Error types for chk-fetch.

use thiserror::Error;

use crate::keys::KeyError;
use crate::postprocess::PostProcessError;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in chk-fetch.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Content key error.
    #[error("key error: {0}")]
    Key(#[from] KeyError),

    /// Post-processing failed.
    #[error("post-processing failed: {0}")]
    PostProcess(#[from] PostProcessError),

    /// Worker thread could not be started.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
