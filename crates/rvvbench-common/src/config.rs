//! Configuration types and utilities

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{KernelError, Result, RvvBenchError};
use crate::lanes::LaneWidth;
use crate::shape::Conv2dShape;

/// Main benchmark configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    pub shape: Conv2dShape,
    pub gemm: GemmConfig,
    pub run: RunConfig,
    pub logging: LoggingConfig,
}

/// Tile sizes for the blocked GEMM (`M x N x K`).
///
/// Blocks need not divide the matrix dimensions; the last tile along each
/// axis is truncated to the remainder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GemmBlocking {
    pub block_m: usize,
    pub block_n: usize,
    pub block_k: usize,
}

impl GemmBlocking {
    pub const fn new(block_m: usize, block_n: usize, block_k: usize) -> Self {
        Self { block_m, block_n, block_k }
    }

    /// Blocking used by the scalar im2col pipeline.
    pub const SCALAR: GemmBlocking = GemmBlocking::new(32, 32, 32);

    /// Blocking used by the vectorized im2col pipeline.
    pub const VECTOR: GemmBlocking = GemmBlocking::new(8, 64, 32);

    pub fn validate(&self) -> Result<()> {
        if self.block_m == 0 || self.block_n == 0 || self.block_k == 0 {
            return Err(KernelError::arguments(format!(
                "GEMM block sizes must be > 0, got {}x{}x{}",
                self.block_m, self.block_n, self.block_k
            ))
            .into());
        }
        Ok(())
    }
}

impl Default for GemmBlocking {
    fn default() -> Self {
        Self::SCALAR
    }
}

/// GEMM blocking for each pipeline flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GemmConfig {
    pub scalar: GemmBlocking,
    pub vector: GemmBlocking,
}

impl Default for GemmConfig {
    fn default() -> Self {
        Self { scalar: GemmBlocking::SCALAR, vector: GemmBlocking::VECTOR }
    }
}

/// Driver run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub seed: u64,
    pub tolerance: f32,
    pub output_dir: PathBuf,
    pub batch_rows: usize,
    pub lane_widths: Vec<LaneWidth>,
    pub write_binaries: bool,
    pub report: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            tolerance: 1e-4,
            output_dir: PathBuf::from("./output_files"),
            batch_rows: 4,
            lane_widths: LaneWidth::ALL.to_vec(),
            write_binaries: true,
            report: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}

impl BenchConfig {
    /// Start a builder from the default configuration.
    pub fn builder() -> BenchConfigBuilder {
        BenchConfigBuilder::default()
    }

    /// Parse a TOML document; missing sections fall back to defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: BenchConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&contents)
    }

    /// Serialize back to TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| RvvBenchError::Config(e.to_string()))
    }

    /// Apply `RVVBENCH_*` environment overrides on top of the loaded values.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(seed) = std::env::var("RVVBENCH_SEED") {
            self.run.seed = seed
                .parse()
                .map_err(|_| RvvBenchError::Config(format!("invalid RVVBENCH_SEED '{seed}'")))?;
        }
        if let Ok(tol) = std::env::var("RVVBENCH_TOLERANCE") {
            self.run.tolerance = tol.parse().map_err(|_| {
                RvvBenchError::Config(format!("invalid RVVBENCH_TOLERANCE '{tol}'"))
            })?;
        }
        if let Ok(dir) = std::env::var("RVVBENCH_OUTPUT_DIR") {
            self.run.output_dir = PathBuf::from(dir);
        }
        if let Ok(level) = std::env::var("RVVBENCH_LOG_LEVEL") {
            self.logging.level = level;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        self.shape.validate()?;
        self.gemm.scalar.validate()?;
        self.gemm.vector.validate()?;
        if !(self.run.tolerance.is_finite() && self.run.tolerance > 0.0) {
            return Err(RvvBenchError::Config(format!(
                "tolerance must be a positive finite number, got {}",
                self.run.tolerance
            )));
        }
        if self.run.batch_rows == 0 {
            return Err(RvvBenchError::Config("batch_rows must be > 0".to_string()));
        }
        match self.logging.format.as_str() {
            "pretty" | "compact" | "json" => Ok(()),
            other => Err(RvvBenchError::Config(format!("unknown log format '{other}'"))),
        }
    }
}

/// Builder for [`BenchConfig`]
#[derive(Debug, Clone, Default)]
pub struct BenchConfigBuilder {
    config: BenchConfig,
}

impl BenchConfigBuilder {
    pub fn shape(mut self, shape: Conv2dShape) -> Self {
        self.config.shape = shape;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.run.seed = seed;
        self
    }

    pub fn tolerance(mut self, tolerance: f32) -> Self {
        self.config.run.tolerance = tolerance;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.run.output_dir = dir.into();
        self
    }

    pub fn batch_rows(mut self, rows: usize) -> Self {
        self.config.run.batch_rows = rows;
        self
    }

    pub fn lane_widths(mut self, widths: Vec<LaneWidth>) -> Self {
        self.config.run.lane_widths = widths;
        self
    }

    pub fn write_binaries(mut self, enabled: bool) -> Self {
        self.config.run.write_binaries = enabled;
        self
    }

    pub fn report(mut self, path: Option<PathBuf>) -> Self {
        self.config.run.report = path;
        self
    }

    pub fn scalar_blocking(mut self, blocking: GemmBlocking) -> Self {
        self.config.gemm.scalar = blocking;
        self
    }

    pub fn vector_blocking(mut self, blocking: GemmBlocking) -> Self {
        self.config.gemm.vector = blocking;
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn log_format(mut self, format: impl Into<String>) -> Self {
        self.config.logging.format = format.into();
        self
    }

    pub fn build(self) -> Result<BenchConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests;
