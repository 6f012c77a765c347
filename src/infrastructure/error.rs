//! Error types for the solver
//!
//! Every failure the solve loop can meet, with enough context to log it and a
//! verdict on whether the loop should start over or give up.

use thiserror::Error;

use crate::domain::MatrixError;

#[derive(Error, Debug, Clone)]
pub enum SolverError {
    #[error("Configuration error: {field} - {message}")]
    Configuration { field: String, message: String },

    #[error("HTTP request failed with status {status}: {url}")]
    HttpRequestFailed { status: u16, url: String },

    #[error("Transport error for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("Username not found in challenge page ({content_length} bytes)")]
    UsernameNotFound { content_length: usize },

    #[error("QR encoding failed: {message}")]
    QrEncoding { message: String },

    #[error("Matrix error: {0}")]
    Matrix(#[from] MatrixError),

    #[error("Image I/O failed for {path}: {message}")]
    ImageIo { path: String, message: String },

    #[error("Validator '{program}' could not run: {message}")]
    Validator { program: String, message: String },

    #[error("Gave up after {attempts} attempts without a flag")]
    AttemptsExhausted { attempts: u32 },

    #[error("Solve loop cancelled")]
    Cancelled,
}

impl SolverError {
    pub fn configuration(field: &str, message: impl Into<String>) -> Self {
        Self::Configuration {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn transport(url: &str, error: &reqwest::Error) -> Self {
        Self::Transport {
            url: url.to_string(),
            message: error.to_string(),
        }
    }

    pub fn image_io(path: &std::path::Path, error: impl std::fmt::Display) -> Self {
        Self::ImageIo {
            path: path.display().to_string(),
            message: error.to_string(),
        }
    }

    /// Whether the solve loop should start a fresh attempt after this error
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::HttpRequestFailed { .. } => true,
            Self::Transport { .. } => true,
            Self::UsernameNotFound { .. } => true,
            Self::Configuration { .. } => false,
            Self::QrEncoding { .. } => false,
            Self::Matrix(_) => false,
            Self::ImageIo { .. } => false,
            Self::Validator { .. } => false,
            Self::AttemptsExhausted { .. } => false,
            Self::Cancelled => false,
        }
    }

    /// Extra pause before the next attempt, on top of the pacing limiter
    #[must_use]
    pub const fn retry_delay_seconds(&self) -> Option<u64> {
        match self {
            Self::HttpRequestFailed { status: 429, .. } => Some(10),
            Self::HttpRequestFailed { status, .. } if *status >= 500 => Some(5),
            _ => None,
        }
    }
}

pub type SolverResult<T> = Result<T, SolverError>;
