//! Error types for Conatus

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("weight sum for {what} must be 1.0 ±1%, got {sum}")]
    WeightSum { what: String, sum: f32 },

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("{boundary} boundary failed: {message}")]
    Boundary { boundary: String, message: String },

    #[error("store error: {0}")]
    Store(String),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn weight_sum(what: impl Into<String>, sum: f32) -> Self {
        Self::WeightSum {
            what: what.into(),
            sum,
        }
    }

    pub fn boundary(boundary: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Boundary {
            boundary: boundary.into(),
            message: message.into(),
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }

    /// Transient failures are caught at the call site and degrade a single
    /// cycle. Everything else is fatal at construction time.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Boundary { .. } | Self::Store(_))
    }
}
