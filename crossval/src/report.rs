//! Parity reports for a benchmark run
//!
//! One [`ParityReport`] row per kernel variant, collected into a
//! [`ParitySummary`] that the driver prints and optionally writes as JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::metrics::{max_abs, mse_row, snr_db};
use crate::utils::first_mismatch;
use crate::{CrossvalConfig, Result};

/// Signal-to-noise ratio of a variant against the reference.
///
/// Serialized as `"exact"`, `{"db": x}`, `"no_signal"` or `"undefined"` so
/// the JSON report never holds a non-finite number.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Snr {
    /// Outputs are identical (`+inf` dB).
    Exact,
    Db(f64),
    /// The reference is all zeros but the output is not (`-inf` dB).
    NoSignal,
    /// Non-finite values in either buffer, or mismatched lengths.
    Undefined,
}

impl Snr {
    pub fn from_db(db: f64) -> Self {
        if db.is_nan() {
            Snr::Undefined
        } else if db == f64::INFINITY {
            Snr::Exact
        } else if db == f64::NEG_INFINITY {
            Snr::NoSignal
        } else {
            Snr::Db(db)
        }
    }

    /// Finite dB value, if there is one.
    pub fn db(&self) -> Option<f64> {
        match self {
            Snr::Db(db) => Some(*db),
            _ => None,
        }
    }
}

impl std::fmt::Display for Snr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Snr::Exact => f.write_str("inf"),
            Snr::Db(db) => write!(f, "{db:.1}"),
            Snr::NoSignal => f.write_str("-inf"),
            Snr::Undefined => f.write_str("n/a"),
        }
    }
}

/// Comparison of one variant's output against the reference output.
///
/// `max_abs` and `mse` are `None` when they cannot be expressed as a finite
/// number: mismatched lengths or NaN/infinite values in the output.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ParityReport {
    pub variant: String,
    pub elements: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_abs: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mse: Option<f32>,
    pub snr: Snr,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_mismatch: Option<usize>,
    pub elapsed_ms: f64,
    pub passed: bool,
}

impl ParityReport {
    /// Compare `test` against `reference` under `config`.
    pub fn compute(
        variant: impl Into<String>,
        reference: &[f32],
        test: &[f32],
        config: &CrossvalConfig,
        elapsed_ms: f64,
    ) -> Self {
        let variant = variant.into();
        let mismatch = first_mismatch(reference, test, config);

        let finite = |v: f32| v.is_finite().then_some(v);
        let (max_abs, mse, snr) = if reference.len() == test.len() {
            let snr = Snr::from_db(snr_db(reference, test));
            (finite(max_abs(reference, test)), finite(mse_row(reference, test)), snr)
        } else {
            (None, None, Snr::Undefined)
        };

        if let Some(i) = mismatch {
            log::warn!("{variant}: first mismatch at element {i}, max abs error {max_abs:?}");
        }

        Self {
            variant,
            elements: test.len(),
            max_abs,
            mse,
            snr,
            first_mismatch: mismatch,
            elapsed_ms,
            passed: mismatch.is_none(),
        }
    }
}

/// All parity rows of one run plus the run parameters.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ParitySummary {
    pub shape: String,
    pub seed: u64,
    pub tolerance: f64,
    pub reports: Vec<ParityReport>,
    #[serde(default)]
    pub all_passed: bool,
}

impl ParitySummary {
    pub fn new(shape: impl Into<String>, seed: u64, tolerance: f64) -> Self {
        Self { shape: shape.into(), seed, tolerance, reports: Vec::new(), all_passed: true }
    }

    pub fn push(&mut self, report: ParityReport) {
        self.all_passed &= report.passed;
        self.reports.push(report);
    }

    /// Variants that failed parity.
    pub fn failures(&self) -> impl Iterator<Item = &ParityReport> {
        self.reports.iter().filter(|r| !r.passed)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the summary to `path` as pretty-printed JSON.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(reference: &[f32], test: &[f32]) -> ParityReport {
        ParityReport::compute("variant", reference, test, &CrossvalConfig::default(), 0.5)
    }

    #[test]
    fn identical_output_passes_with_exact_snr() {
        let r = report(&[1.0, 2.0], &[1.0, 2.0]);
        assert!(r.passed);
        assert_eq!(r.max_abs, Some(0.0));
        assert_eq!(r.snr, Snr::Exact);
        assert_eq!(r.first_mismatch, None);
    }

    #[test]
    fn mismatch_fails_the_summary() {
        let cfg = CrossvalConfig::default();
        let mut summary = ParitySummary::new("1x1x4x4", 0, cfg.tolerance);
        summary.push(ParityReport::compute("scalar", &[1.0; 4], &[1.0; 4], &cfg, 0.1));
        summary.push(ParityReport::compute("im2col", &[1.0; 4], &[1.0, 1.0, 1.5, 1.0], &cfg, 0.2));

        assert!(!summary.all_passed);
        let failed: Vec<_> = summary.failures().map(|r| r.variant.as_str()).collect();
        assert_eq!(failed, vec!["im2col"]);
        assert_eq!(summary.reports[1].first_mismatch, Some(2));
        assert!(summary.reports[1].snr.db().is_some());
    }

    #[test]
    fn length_mismatch_fails_without_panicking() {
        let r = report(&[1.0; 4], &[1.0; 3]);
        assert!(!r.passed);
        assert_eq!(r.first_mismatch, Some(3));
        assert_eq!((r.max_abs, r.mse, r.snr), (None, None, Snr::Undefined));
    }

    #[test]
    fn zero_reference_with_error_is_not_reported_as_exact() {
        let r = report(&[0.0; 3], &[0.0, 0.5, 0.0]);
        assert!(!r.passed);
        assert_eq!(r.snr, Snr::NoSignal);
        assert_eq!(r.snr.to_string(), "-inf");

        let exact_zeros = report(&[0.0; 3], &[0.0; 3]);
        assert_eq!(exact_zeros.snr, Snr::Exact);
    }

    #[test]
    fn nan_output_has_undefined_metrics() {
        let r = report(&[1.0, 2.0], &[1.0, f32::NAN]);
        assert!(!r.passed);
        assert_eq!(r.snr, Snr::Undefined);
        assert_eq!(r.mse, None);
        assert_eq!(r.snr.to_string(), "n/a");
    }

    #[test]
    fn json_round_trip_includes_failing_rows() {
        let cfg = CrossvalConfig::default();
        let mut summary = ParitySummary::new("2x3x8x8", 42, cfg.tolerance);
        summary.push(ParityReport::compute("scalar", &[1.0, 2.0], &[1.0, 2.0], &cfg, 0.5));
        summary.push(ParityReport::compute("e32m1", &[1.0, 2.0], &[1.0, 2.00001], &cfg, 1.25));
        summary.push(ParityReport::compute("short", &[1.0, 2.0], &[1.0], &cfg, 0.1));
        summary.push(ParityReport::compute("nan", &[1.0, 2.0], &[f32::NAN, 2.0], &cfg, 0.1));
        summary.push(ParityReport::compute("zero", &[0.0, 0.0], &[0.0, 1.0], &cfg, 0.1));

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("reports").join("report.json");
        summary.write_to_file(&path).unwrap();

        let json = std::fs::read_to_string(&path).unwrap();
        assert!(!json.contains("null"), "{json}");
        let loaded: ParitySummary = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, summary);
        assert!(!loaded.all_passed);
    }
}
