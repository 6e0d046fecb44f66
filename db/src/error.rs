//! Error types for snapshot loading, configuration and manifests.
//!
//! Provides a unified error type covering all failure modes: I/O,
//! serialization, invalid configuration and compression.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading inputs or writing run artifacts.
#[derive(Debug, Error)]
pub enum LoadError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing or serialization failure.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// A snapshot file could not be parsed; carries the offending path.
    #[error("failed to parse {path}: {message}")]
    InvalidSnapshot { path: PathBuf, message: String },

    /// Run configuration is structurally valid YAML but semantically wrong.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// All configured loader sources failed.
    #[error("no source snapshots available")]
    NoSourcesAvailable,

    /// Gzip decompression failure.
    #[error("compression error: {0}")]
    CompressionError(String),
}

/// Convenience alias for results with [`LoadError`].
pub type Result<T> = std::result::Result<T, LoadError>;
