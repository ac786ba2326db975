//! Cross-validation support for the convolution benchmark harness
//!
//! Kernel outputs are dumped as raw little-endian float32 files so they can
//! be compared against a reference framework outside this workspace, and are
//! compared in-process against the direct convolution before being written.

use thiserror::Error;

pub mod binary;
pub mod metrics;
pub mod report;
pub mod utils;

pub use binary::{read_tensor_binary, read_tensor_binary_exact, write_matrix_binary};
pub use metrics::{max_abs, mse_row, snr_db};
pub use report::{ParityReport, ParitySummary, Snr};
pub use utils::{compare_floats, first_mismatch};

/// Errors that can occur during cross-validation
#[derive(Error, Debug)]
pub enum CrossvalError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed tensor file: {0}")]
    Format(String),

    #[error("Comparison failed: {0}")]
    ComparisonError(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CrossvalError>;

/// Configuration for cross-validation comparisons
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossvalConfig {
    /// Allowed per-element difference
    pub tolerance: f64,
    /// Scale the tolerance by `max(1, |reference|)` for large magnitudes
    pub relative: bool,
}

impl Default for CrossvalConfig {
    fn default() -> Self {
        Self { tolerance: 1e-4, relative: false }
    }
}

impl CrossvalConfig {
    pub fn with_tolerance(tolerance: f64) -> Self {
        Self { tolerance, ..Self::default() }
    }

    /// Tolerance that applies to an element whose reference value is `reference`.
    #[inline]
    pub fn tolerance_for(&self, reference: f32) -> f32 {
        let tol = self.tolerance as f32;
        if self.relative { tol * reference.abs().max(1.0) } else { tol }
    }
}
