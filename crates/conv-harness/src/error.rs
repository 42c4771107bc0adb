use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed matrix file {path}, line {line}: {reason}")]
    Format {
        path: String,
        line: usize,
        reason: String,
    },

    #[error("Matrix must have at least one row and one column, got {rows}x{cols}")]
    EmptyMatrix { rows: usize, cols: usize },

    #[error("Matrix data length {len} does not match shape {rows}x{cols}")]
    ShapeMismatch { rows: usize, cols: usize, len: usize },

    #[error("Convolution executable not found: {}", .0.display())]
    ExecutableMissing(PathBuf),

    #[error("Failed to serialize JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Run interrupted")]
    Interrupted,
}

impl HarnessError {
    /// Build a [`HarnessError::Format`] for `path` at 1-based `line`.
    pub fn format(path: impl Into<String>, line: usize, reason: impl Into<String>) -> Self {
        Self::Format {
            path: path.into(),
            line,
            reason: reason.into(),
        }
    }
}
