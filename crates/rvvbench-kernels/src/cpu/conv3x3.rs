//! Specialized single-plane 3×3 stencil, stride 1.
//!
//! With `use_padding` the output keeps the input extent and the plane gets an
//! implicit one-pixel zero border, materialised as an `(H+2)×(W+2)` copy.
//! Without it the convolution is "valid" and the output is `(H-2)×(W-2)`.
//!
//! Every variant sums the nine taps of an output element in `k00..k22`
//! order starting from zero, so the scalar, vector and batched variants all
//! produce bit-identical planes.

use std::borrow::Cow;

use rvvbench_common::{KernelError, LaneWidth, Result, check_input_len, check_output_len};

use super::lanes::{self, MAX_LANES};

/// Taps in one 3×3 filter.
pub const TAPS: usize = 9;

// ── Plane geometry ───────────────────────────────────────────────────────────

/// Extent of one input plane and its padding mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conv3x3Plane {
    pub height: usize,
    pub width: usize,
    pub use_padding: bool,
}

impl Conv3x3Plane {
    pub fn new(height: usize, width: usize, use_padding: bool) -> Result<Self> {
        let plane = Self { height, width, use_padding };
        plane.validate()?;
        Ok(plane)
    }

    pub fn validate(&self) -> Result<()> {
        if self.height == 0 || self.width == 0 {
            return Err(KernelError::shape(format!(
                "3x3 input plane must be non-empty, got {}x{}",
                self.height, self.width
            ))
            .into());
        }
        if !self.use_padding && (self.height < 3 || self.width < 3) {
            return Err(KernelError::shape(format!(
                "unpadded 3x3 convolution needs at least 3x3 input, got {}x{}",
                self.height, self.width
            ))
            .into());
        }
        // The padded copy is the largest buffer a plane needs.
        let (h, w) = (self.height.checked_add(2), self.width.checked_add(2));
        let padded_len = h.zip(w).and_then(|(h, w)| h.checked_mul(w));
        if padded_len.is_none_or(|len| len > isize::MAX as usize / size_of::<f32>()) {
            return Err(KernelError::shape(format!(
                "3x3 plane {}x{} overflows usize",
                self.height, self.width
            ))
            .into());
        }
        Ok(())
    }

    #[inline]
    pub fn out_h(&self) -> usize {
        if self.use_padding { self.height } else { self.height.saturating_sub(2) }
    }

    #[inline]
    pub fn out_w(&self) -> usize {
        if self.use_padding { self.width } else { self.width.saturating_sub(2) }
    }

    #[inline]
    pub fn input_len(&self) -> usize {
        self.height * self.width
    }

    #[inline]
    pub fn output_len(&self) -> usize {
        self.out_h() * self.out_w()
    }

    /// Row-major source the stencil reads: the input itself, or a
    /// zero-bordered copy. Returns the buffer and its row stride.
    fn source<'a>(&self, input: &'a [f32]) -> (Cow<'a, [f32]>, usize) {
        let (h, w) = (self.height, self.width);
        if !self.use_padding {
            return (Cow::Borrowed(&input[..h * w]), w);
        }
        let stride = w + 2;
        let mut padded = vec![0.0f32; (h + 2) * stride];
        let rows = input.chunks_exact(w).take(h);
        for (dst, src) in padded.chunks_exact_mut(stride).skip(1).zip(rows) {
            dst[1..=w].copy_from_slice(src);
        }
        (Cow::Owned(padded), stride)
    }
}

// ── Execution strategy ───────────────────────────────────────────────────────

/// How the stencil loop is driven. Never changes the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StencilStrategy {
    /// Process output columns `vl` at a time.
    pub lanes: Option<LaneWidth>,
    /// Produce this many output rows per pass over the shared input rows.
    pub batch_rows: Option<usize>,
}

impl StencilStrategy {
    pub const SCALAR: Self = Self { lanes: None, batch_rows: None };

    pub const fn vector(width: LaneWidth) -> Self {
        Self { lanes: Some(width), batch_rows: None }
    }

    pub const fn batched(rows: usize) -> Self {
        Self { lanes: None, batch_rows: Some(rows) }
    }

    pub const fn batched_vector(width: LaneWidth, rows: usize) -> Self {
        Self { lanes: Some(width), batch_rows: Some(rows) }
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_rows == Some(0) {
            return Err(KernelError::arguments("batch_rows must be > 0").into());
        }
        Ok(())
    }
}

impl std::fmt::Display for StencilStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.lanes, self.batch_rows) {
            (None, None) => write!(f, "scalar"),
            (Some(w), None) => write!(f, "{}", w.variant_name()),
            (None, Some(r)) => write!(f, "batched(rows={r})"),
            (Some(w), Some(r)) => write!(f, "{}-batched(rows={r})", w.variant_name()),
        }
    }
}

// ── Entry points ─────────────────────────────────────────────────────────────

/// Scalar 3×3 convolution of one plane.
pub fn conv3x3(
    input: &[f32],
    kernel: &[f32],
    output: &mut [f32],
    plane: Conv3x3Plane,
) -> Result<()> {
    conv3x3_with(input, kernel, output, plane, StencilStrategy::SCALAR)
}

/// 3×3 convolution processing output columns in `width`-lane steps.
pub fn conv3x3_vector(
    input: &[f32],
    kernel: &[f32],
    output: &mut [f32],
    plane: Conv3x3Plane,
    width: LaneWidth,
) -> Result<()> {
    conv3x3_with(input, kernel, output, plane, StencilStrategy::vector(width))
}

/// 3×3 convolution producing `batch_rows` output rows per pass.
pub fn conv3x3_batched(
    input: &[f32],
    kernel: &[f32],
    output: &mut [f32],
    plane: Conv3x3Plane,
    batch_rows: usize,
) -> Result<()> {
    conv3x3_with(input, kernel, output, plane, StencilStrategy::batched(batch_rows))
}

/// Row-batched and lane-chunked 3×3 convolution.
pub fn conv3x3_batched_vector(
    input: &[f32],
    kernel: &[f32],
    output: &mut [f32],
    plane: Conv3x3Plane,
    width: LaneWidth,
    batch_rows: usize,
) -> Result<()> {
    conv3x3_with(input, kernel, output, plane, StencilStrategy::batched_vector(width, batch_rows))
}

/// 3×3 convolution of one plane with an explicit strategy.
pub fn conv3x3_with(
    input: &[f32],
    kernel: &[f32],
    output: &mut [f32],
    plane: Conv3x3Plane,
    strategy: StencilStrategy,
) -> Result<()> {
    plane.validate()?;
    strategy.validate()?;
    check_input_len("input", input, plane.input_len())?;
    check_input_len("kernel", kernel, TAPS)?;
    check_output_len("output", output, plane.output_len())?;

    let (src, stride) = plane.source(input);
    let k: &[f32; TAPS] = kernel[..TAPS]
        .try_into()
        .map_err(|_| KernelError::arguments("3x3 kernel slice"))?;
    let out_w = plane.out_w();

    match (strategy.lanes, strategy.batch_rows) {
        (None, None) => stencil_rows(&src, stride, k, output, out_w),
        (Some(w), None) => stencil_rows_vector(&src, stride, k, output, out_w, w),
        (lanes, Some(rows)) => stencil_batched(&src, stride, k, output, out_w, rows, lanes),
    }
    Ok(())
}

/// Apply the stencil to every channel independently: channel `c` of `input`
/// is filtered by kernel slice `c` into output plane `c`. No summation across
/// channels.
pub fn conv3x3_per_channel(
    input: &[f32],
    kernel: &[f32],
    output: &mut [f32],
    channels: usize,
    plane: Conv3x3Plane,
    strategy: StencilStrategy,
) -> Result<()> {
    if channels == 0 {
        return Err(KernelError::shape("channels must be > 0").into());
    }
    plane.validate()?;
    check_input_len("input", input, channels * plane.input_len())?;
    check_input_len("kernel", kernel, channels * TAPS)?;
    check_output_len("output", output, channels * plane.output_len())?;

    let (in_len, out_len) = (plane.input_len(), plane.output_len());
    for c in 0..channels {
        conv3x3_with(
            &input[c * in_len..(c + 1) * in_len],
            &kernel[c * TAPS..(c + 1) * TAPS],
            &mut output[c * out_len..(c + 1) * out_len],
            plane,
            strategy,
        )?;
    }
    Ok(())
}

// ── Stencil loops ────────────────────────────────────────────────────────────

#[inline]
fn stencil_rows(src: &[f32], stride: usize, k: &[f32; TAPS], output: &mut [f32], out_w: usize) {
    for (oh, out_row) in output.chunks_exact_mut(out_w).enumerate() {
        let r0 = &src[oh * stride..];
        let r1 = &src[(oh + 1) * stride..];
        let r2 = &src[(oh + 2) * stride..];
        for (ow, out) in out_row.iter_mut().enumerate() {
            let mut sum = 0.0f32;
            sum += r0[ow] * k[0];
            sum += r0[ow + 1] * k[1];
            sum += r0[ow + 2] * k[2];
            sum += r1[ow] * k[3];
            sum += r1[ow + 1] * k[4];
            sum += r1[ow + 2] * k[5];
            sum += r2[ow] * k[6];
            sum += r2[ow + 1] * k[7];
            sum += r2[ow + 2] * k[8];
            *out = sum;
        }
    }
}

fn stencil_rows_vector(
    src: &[f32],
    stride: usize,
    k: &[f32; TAPS],
    output: &mut [f32],
    out_w: usize,
    width: LaneWidth,
) {
    for (oh, out_row) in output.chunks_exact_mut(out_w).enumerate() {
        for (offset, vl) in lanes::strip_mine(out_w, width) {
            let mut acc = [0.0f32; MAX_LANES];
            for (tap, &weight) in k.iter().enumerate() {
                let (kh, kw) = (tap / 3, tap % 3);
                let base = (oh + kh) * stride + offset + kw;
                lanes::axpy(&mut acc[..vl], weight, &src[base..base + vl], width);
            }
            out_row[offset..offset + vl].copy_from_slice(&acc[..vl]);
        }
    }
}

/// Each pass produces output rows `[r0, r1)` by walking the input rows
/// `r0..r1+2` once; input row `ir` contributes kernel row `ir - oh` to every
/// output row `oh` of the block it touches.
fn stencil_batched(
    src: &[f32],
    stride: usize,
    k: &[f32; TAPS],
    output: &mut [f32],
    out_w: usize,
    batch_rows: usize,
    width: Option<LaneWidth>,
) {
    output.fill(0.0);
    let out_h = output.len() / out_w;

    for r0 in (0..out_h).step_by(batch_rows) {
        let r1 = out_h.min(r0 + batch_rows);
        for ir in r0..r1 + 2 {
            let in_row = &src[ir * stride..ir * stride + out_w + 2];
            for kh in 0..3 {
                let Some(oh) = ir.checked_sub(kh) else { continue };
                if oh < r0 || oh >= r1 {
                    continue;
                }
                let out_row = &mut output[oh * out_w..(oh + 1) * out_w];
                let taps = &k[kh * 3..kh * 3 + 3];
                match width {
                    Some(w) => {
                        for (kw, &weight) in taps.iter().enumerate() {
                            lanes::axpy(out_row, weight, &in_row[kw..kw + out_w], w);
                        }
                    }
                    None => {
                        for (ow, out) in out_row.iter_mut().enumerate() {
                            *out += in_row[ow] * taps[0];
                            *out += in_row[ow + 1] * taps[1];
                            *out += in_row[ow + 2] * taps[2];
                        }
                    }
                }
            }
        }
    }
}
