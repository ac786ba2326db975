//! Error types shared across the workspace.

use thiserror::Error;

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, RvvBenchError>;

/// Top-level error type.
#[derive(Error, Debug)]
pub enum RvvBenchError {
    #[error("kernel error: {0}")]
    Kernel(#[from] KernelError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised at kernel entry points, before any buffer is touched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    /// A dimension, stride or derived output extent is not usable.
    #[error("invalid shape: {reason}")]
    InvalidShape { reason: String },

    /// A caller-supplied buffer does not match its dimension-derived size.
    #[error("{buffer} buffer has {actual} elements, expected {expected}")]
    BufferSize { buffer: &'static str, expected: usize, actual: usize },

    /// Tuning parameters (block sizes, batch rows) are out of range.
    #[error("invalid arguments: {reason}")]
    InvalidArguments { reason: String },

    #[error("no kernel provider available")]
    NoProvider,
}

impl KernelError {
    pub fn shape(reason: impl Into<String>) -> Self {
        Self::InvalidShape { reason: reason.into() }
    }

    pub fn arguments(reason: impl Into<String>) -> Self {
        Self::InvalidArguments { reason: reason.into() }
    }
}

/// Require `buf` to hold at least `expected` elements.
pub fn check_input_len(buffer: &'static str, buf: &[f32], expected: usize) -> Result<()> {
    if buf.len() < expected {
        return Err(KernelError::BufferSize { buffer, expected, actual: buf.len() }.into());
    }
    Ok(())
}

/// Require `buf` to hold exactly `expected` elements.
pub fn check_output_len(buffer: &'static str, buf: &[f32], expected: usize) -> Result<()> {
    if buf.len() != expected {
        return Err(KernelError::BufferSize { buffer, expected, actual: buf.len() }.into());
    }
    Ok(())
}
