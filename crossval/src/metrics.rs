//! Parity metrics for cross-validation
//!
//! Element-wise error statistics between a reference output (normally the
//! scalar direct convolution) and the output of another variant.
//!
//! # Metrics
//!
//! - **Max Absolute Error**: worst single element
//! - **MSE**: mean squared error over the whole tensor
//! - **SNR (dB)**: signal power of the reference over the error power
//!
//! # Example
//!
//! ```rust
//! use rvvbench_crossval::metrics::{max_abs, mse_row, snr_db};
//!
//! let reference = vec![1.0, 2.0, 3.0, 4.0];
//! let im2col = vec![1.0, 2.0, 3.0001, 4.0];
//!
//! println!("max abs: {:.2e}", max_abs(&reference, &im2col));
//! println!("MSE: {:.2e}", mse_row(&reference, &im2col));
//! println!("SNR: {:.1} dB", snr_db(&reference, &im2col));
//! ```

/// Mean Squared Error between two float arrays
///
/// Computes: MSE = (1/n) * Σ(aᵢ - bᵢ)², accumulated in `f64`.
///
/// # Panics
///
/// Panics if the arrays have different lengths
///
/// # Example
///
/// ```rust
/// use rvvbench_crossval::metrics::mse_row;
///
/// let a = vec![1.0, 2.0, 3.0];
/// let b = vec![1.1, 2.0, 2.9];
///
/// let mse = mse_row(&a, &b);
/// assert!(mse < 0.01);
/// ```
pub fn mse_row(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(
        a.len(),
        b.len(),
        "Arrays must have equal length for MSE: a.len()={}, b.len()={}",
        a.len(),
        b.len()
    );

    if a.is_empty() {
        return 0.0;
    }

    let sum_squared_diff: f64 = a
        .iter()
        .zip(b)
        .map(|(&x, &y)| {
            let diff = f64::from(x) - f64::from(y);
            diff * diff
        })
        .sum();

    (sum_squared_diff / a.len() as f64) as f32
}

/// Maximum absolute difference between two float arrays
///
/// Computes: max|aᵢ - bᵢ| for all i. A NaN in either input yields NaN so
/// that a broken variant can never look clean.
///
/// # Panics
///
/// Panics if the arrays have different lengths
///
/// # Example
///
/// ```rust
/// use rvvbench_crossval::metrics::max_abs;
///
/// let a = vec![1.0, 2.0, 3.0];
/// let b = vec![1.1, 2.5, 2.9];
///
/// let max_diff = max_abs(&a, &b);
/// assert!((max_diff - 0.5).abs() < 1e-6);
/// ```
pub fn max_abs(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(
        a.len(),
        b.len(),
        "Arrays must have equal length for max_abs: a.len()={}, b.len()={}",
        a.len(),
        b.len()
    );

    let mut worst = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        let diff = (x - y).abs();
        if diff.is_nan() {
            return f32::NAN;
        }
        worst = worst.max(diff);
    }
    worst
}

/// Signal-to-noise ratio in decibels
///
/// Computes: 10·log10(Σrefᵢ² / Σ(refᵢ - testᵢ)²). Identical inputs give
/// `+∞`; an all-zero reference with any error gives `-∞`.
///
/// # Panics
///
/// Panics if the arrays have different lengths
///
/// # Example
///
/// ```rust
/// use rvvbench_crossval::metrics::snr_db;
///
/// let reference = vec![1.0, -1.0, 1.0, -1.0];
/// let test = vec![1.1, -1.0, 1.0, -1.0];
///
/// // signal 4.0, noise 0.01 → 26 dB
/// assert!((snr_db(&reference, &test) - 26.02).abs() < 0.01);
/// assert_eq!(snr_db(&reference, &reference), f64::INFINITY);
/// ```
pub fn snr_db(reference: &[f32], test: &[f32]) -> f64 {
    assert_eq!(
        reference.len(),
        test.len(),
        "Arrays must have equal length for SNR: reference.len()={}, test.len()={}",
        reference.len(),
        test.len()
    );

    let (signal, noise) = reference.iter().zip(test).fold((0.0f64, 0.0f64), |(s, n), (&r, &t)| {
        let r = f64::from(r);
        let d = r - f64::from(t);
        (s + r * r, n + d * d)
    });

    if noise == 0.0 {
        return f64::INFINITY;
    }
    10.0 * (signal / noise).log10()
}
