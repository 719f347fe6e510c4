//! Error types
//!
//! Nothing on the render path returns an error. These surface only from
//! setup and control-side operations: parsing names, assigning controllers,
//! loading configuration, spawning threads and writing to an audio sink.

use thiserror::Error;

/// Errors produced by the synthesizer's control surface.
#[derive(Debug, Error)]
pub enum Error {
    /// Controller numbers are 7-bit
    #[error("invalid controller number {0} (expected 0-127)")]
    InvalidController(u8),

    /// Name is not one of the mappable parameters
    #[error("unknown parameter: {0}")]
    UnknownParameter(String),

    /// Name is not one of the known scales
    #[error("unknown scale: {0}")]
    UnknownScale(String),

    /// Configuration failed validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration could not be parsed
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// The audio sink rejected a block
    #[error("audio sink error: {0}")]
    Sink(String),

    /// A worker thread could not be started
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        /// Thread name
        name: &'static str,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Crate result alias
pub type Result<T> = core::result::Result<T, Error>;
