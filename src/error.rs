//! Error types for the asset pipeline.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using PipelineError.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Main error type for asset generation.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The requested version or alias is not in the upstream manifest.
    #[error("Version not found: {requested}{}", closest_hint(.closest))]
    VersionNotFound {
        requested: String,
        closest: Option<String>,
    },

    /// Downloaded content did not match the expected digest or size.
    #[error("Integrity check failed: expected {expected}, got {actual}")]
    Integrity { expected: String, actual: String },

    /// The packed atlas would exceed the configured maximum dimension.
    #[error("Atlas too large: {required}px required, maximum is {max}px")]
    AtlasTooLarge { required: u32, max: u32 },

    /// A model's parent chain loops back on itself.
    #[error("Cyclic model reference: {}", .chain.join(" -> "))]
    CyclicModelReference { chain: Vec<String> },

    /// Another process held the generation lock for too long.
    #[error("Timed out after {waited:?} waiting for generation lock {path:?}")]
    LockTimeout { path: PathBuf, waited: Duration },

    /// Generation was cancelled or hit its deadline.
    #[error("Generation cancelled")]
    Cancelled,

    /// An upstream request failed.
    #[error("HTTP error for {url}: {message}")]
    Http { url: String, message: String },

    /// The version manifest or detail document is malformed.
    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    /// The configuration file could not be parsed.
    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    /// Failed to read or parse a ZIP archive.
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Failed to parse JSON data.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to read or process an image.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn closest_hint(closest: &Option<String>) -> String {
    match closest {
        Some(version) => format!(" (closest available: {})", version),
        None => String::new(),
    }
}

impl PipelineError {
    /// Build an HTTP error from a reqwest failure.
    pub fn http(url: &str, err: impl std::fmt::Display) -> Self {
        PipelineError::Http {
            url: url.to_string(),
            message: err.to_string(),
        }
    }

    /// Stable machine-readable code, used by the CLI's JSON error payload.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::VersionNotFound { .. } => "version_not_found",
            PipelineError::Integrity { .. } => "integrity_error",
            PipelineError::AtlasTooLarge { .. } => "atlas_too_large",
            PipelineError::CyclicModelReference { .. } => "cyclic_model_reference",
            PipelineError::LockTimeout { .. } => "lock_timeout",
            PipelineError::Cancelled => "cancelled",
            PipelineError::Http { .. } => "http_error",
            PipelineError::InvalidManifest(_) => "invalid_manifest",
            PipelineError::Config(_) => "config_error",
            PipelineError::Zip(_) => "zip_error",
            PipelineError::Json(_) => "json_error",
            PipelineError::Image(_) => "image_error",
            PipelineError::Io(_) => "io_error",
        }
    }
}
