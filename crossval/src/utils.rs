//! Utility functions for cross-validation

use crate::{CrossvalConfig, CrossvalError, Result};

/// Index of the first element where `test` leaves the tolerance band around
/// `reference`, or `None` when every element is within it.
///
/// Lengths are compared first; a length mismatch reports the shorter length
/// as the first offending index.
pub fn first_mismatch(reference: &[f32], test: &[f32], config: &CrossvalConfig) -> Option<usize> {
    let found = reference.iter().zip(test).position(|(&r, &t)| {
        let diff = (r - t).abs();
        // NaN never compares as within tolerance.
        diff.is_nan() || diff > config.tolerance_for(r)
    });
    match found {
        Some(i) => Some(i),
        None if reference.len() != test.len() => Some(reference.len().min(test.len())),
        None => None,
    }
}

/// Compare two sequences of floating-point values with tolerance
pub fn compare_floats(reference: &[f32], test: &[f32], config: &CrossvalConfig) -> Result<()> {
    if reference.len() != test.len() {
        return Err(CrossvalError::ComparisonError(format!(
            "Float sequence length mismatch: reference={}, test={}",
            reference.len(),
            test.len()
        )));
    }

    if let Some(i) = first_mismatch(reference, test, config) {
        let (r, t) = (reference[i], test[i]);
        return Err(CrossvalError::ComparisonError(format!(
            "Float value mismatch at position {}: reference={}, test={}, diff={} > tolerance={}",
            i,
            r,
            t,
            (r - t).abs(),
            config.tolerance_for(r)
        )));
    }

    Ok(())
}
