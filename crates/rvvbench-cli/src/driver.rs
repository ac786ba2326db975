//! Benchmark driver: generate data, run every variant, dump and verify.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use console::style;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rvvbench_common::{BenchConfig, Conv2dShape, LaneWidth};
use rvvbench_crossval::{CrossvalConfig, ParityReport, ParitySummary, write_matrix_binary};
use rvvbench_kernels::cpu::{self, StencilStrategy, Variant};
use tracing::{debug, info, warn};

/// Seeded `input` and `kernel` tensors, uniform in `[-1, 1]`.
#[derive(Debug, Clone)]
pub struct BenchData {
    pub input: Vec<f32>,
    pub kernel: Vec<f32>,
}

impl BenchData {
    /// Input first, then kernel, from one generator.
    pub fn generate(shape: &Conv2dShape, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let input = (0..shape.input_len()).map(|_| rng.gen_range(-1.0f32..=1.0)).collect();
        let kernel = (0..shape.kernel_len()).map(|_| rng.gen_range(-1.0f32..=1.0)).collect();
        Self { input, kernel }
    }
}

pub struct Driver<'a> {
    config: &'a BenchConfig,
    data: BenchData,
    reference: Vec<f32>,
    summary: ParitySummary,
    crossval: CrossvalConfig,
}

impl<'a> Driver<'a> {
    pub fn new(config: &'a BenchConfig) -> Self {
        let shape = config.shape;
        let tolerance = f64::from(config.run.tolerance);
        Self {
            config,
            data: BenchData::generate(&shape, config.run.seed),
            reference: Vec::new(),
            summary: ParitySummary::new(shape.to_string(), config.run.seed, tolerance),
            crossval: CrossvalConfig { tolerance, relative: true },
        }
    }

    fn shape(&self) -> &Conv2dShape {
        &self.config.shape
    }

    fn out_path(&self, file: &str) -> PathBuf {
        self.config.run.output_dir.join(file)
    }

    fn dump(&self, file: &str, data: &[f32]) -> Result<()> {
        if !self.config.run.write_binaries {
            return Ok(());
        }
        let path = self.out_path(file);
        write_matrix_binary(&path, data)
            .with_context(|| format!("failed to write {}", path.display()))
    }

    /// Run one variant into a fresh buffer, time it, dump it, compare it.
    fn run_variant<F>(&mut self, name: &str, file: &str, f: F) -> Result<()>
    where
        F: FnOnce(&BenchData, &mut [f32]) -> rvvbench_common::Result<()>,
    {
        let mut out = vec![0.0f32; self.shape().output_len()];
        let start = Instant::now();
        f(&self.data, &mut out).with_context(|| format!("variant {name} failed"))?;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1e3;

        if let Some(i) = out.iter().position(|v| !v.is_finite()) {
            warn!(variant = name, index = i, "non-finite value in output");
        }
        self.dump(file, &out)?;

        let report = ParityReport::compute(name, &self.reference, &out, &self.crossval, elapsed_ms);
        debug!(variant = name, max_abs = ?report.max_abs, elapsed_ms, "variant finished");
        self.summary.push(report);
        Ok(())
    }

    /// Run every variant enabled by the configuration.
    pub fn run(mut self) -> Result<ParitySummary> {
        let shape = *self.shape();
        info!("Conv2D: {shape}");
        info!(
            "Output NCHW={}x{}x{}x{}",
            shape.batch,
            shape.out_channels,
            shape.out_h(),
            shape.out_w()
        );

        self.dump("input.bin", &self.data.input)?;
        self.dump("kernel.bin", &self.data.kernel)?;

        // Oracle
        let mut reference = vec![0.0f32; shape.output_len()];
        let start = Instant::now();
        cpu::conv2d_direct(&shape, &self.data.input, &self.data.kernel, &mut reference)
            .context("direct convolution failed")?;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1e3;
        self.dump("c_scalar.bin", &reference)?;
        let oracle =
            ParityReport::compute("scalar", &reference, &reference, &self.crossval, elapsed_ms);
        self.summary.push(oracle);
        self.reference = reference;

        let widths = self.config.run.lane_widths.clone();
        for &width in &widths {
            let name = width.variant_name();
            self.run_variant(name, &format!("c_{name}.bin"), |d, out| {
                cpu::conv2d_direct_vector(&shape, &d.input, &d.kernel, out, width)
            })?;
        }

        self.run_variant("parallel", "c_parallel.bin", |d, out| {
            cpu::conv2d_direct_parallel(&shape, &d.input, &d.kernel, out)
        })?;

        let scalar_blocking = self.config.gemm.scalar;
        self.run_variant("im2col_scalar", "c_im2col_scalar.bin", |d, out| {
            let (input, kernel) = (&d.input, &d.kernel);
            let variant = Variant::Scalar;
            cpu::conv2d_im2col_gemm(&shape, input, kernel, None, out, &scalar_blocking, variant)
        })?;

        if let Some(&widest) = widths.iter().max() {
            let vector_blocking = self.config.gemm.vector;
            let name = format!("im2col_{}", widest.variant_name());
            let variant = Variant::Vector(widest);
            self.run_variant(&name, &format!("c_{name}.bin"), |d, out| {
                let (input, kernel) = (&d.input, &d.kernel);
                cpu::conv2d_im2col_gemm(&shape, input, kernel, None, out, &vector_blocking, variant)
            })?;
        }

        if shape.is_3x3_unit_stride() {
            for width in [LaneWidth::M4, LaneWidth::M8] {
                let name = format!("3x3_{}", width.suffix());
                let strategy = StencilStrategy::vector(width);
                self.run_variant(&name, &format!("c_{name}.bin"), |d, out| {
                    cpu::conv2d_3x3_accumulate(&shape, &d.input, &d.kernel, out, strategy)
                })?;
            }
            let strategy = StencilStrategy::batched(self.config.run.batch_rows);
            self.run_variant("3x3_batched", "c_3x3_batched.bin", |d, out| {
                cpu::conv2d_3x3_accumulate(&shape, &d.input, &d.kernel, out, strategy)
            })?;
        } else {
            info!("skipping specialized 3x3 variants for {shape}");
        }

        if let Some(path) = &self.config.run.report {
            write_report(&self.summary, path)?;
        }
        Ok(self.summary)
    }
}

fn write_report(summary: &ParitySummary, path: &Path) -> Result<()> {
    summary
        .write_to_file(path)
        .with_context(|| format!("failed to write report {}", path.display()))?;
    info!("wrote parity report to {}", path.display());
    Ok(())
}

/// Print the parity table to stdout.
pub fn print_summary(summary: &ParitySummary) {
    println!();
    println!("{}", style(format!("Parity vs scalar direct ({})", summary.shape)).bold().cyan());
    println!(
        "{:<16} {:>12} {:>12} {:>10} {:>10}  status",
        "variant", "max_abs", "mse", "snr_db", "ms"
    );
    let metric = |v: Option<f32>| v.map_or_else(|| "n/a".to_string(), |v| format!("{v:.3e}"));
    for r in &summary.reports {
        let status = if r.passed { style("PASS").green() } else { style("FAIL").red() };
        println!(
            "{:<16} {:>12} {:>12} {:>10} {:>10.3}  {}",
            r.variant,
            metric(r.max_abs),
            metric(r.mse),
            r.snr.to_string(),
            r.elapsed_ms,
            status
        );
    }
}
