//! Multi-channel convolution pipelines built from the lower-level kernels.
//!
//! * [`conv2d_im2col_gemm`]: per image, unroll into a column buffer and
//!   multiply by the OIHW weights viewed as `[Cout, Cin*kH*kW]`.
//! * [`conv2d_3x3_accumulate`]: per `(b, oc)`, run the 3×3 stencil on every
//!   input channel and sum the planes in a [`ChannelAccumulator`].

use rvvbench_common::{Conv2dShape, GemmBlocking, KernelError, LaneWidth, Result, check_input_len};

use super::conv3x3::{Conv3x3Plane, StencilStrategy, TAPS, conv3x3_with};
use super::direct::validate_conv;
use super::gemm::{GemmDims, gemm_blocked, gemm_blocked_vector};
use super::im2col::{im2col, im2col_vector};
use super::{Variant, lanes};

// ── im2col + GEMM ────────────────────────────────────────────────────────────

/// Convolution lowered to im2col + blocked GEMM.
///
/// The column buffer is owned by this call. GEMM writes each image's
/// `[Cout, outH*outW]` result directly into its slice of `output`; `bias`,
/// when given, holds one value per output channel and is added afterwards.
pub fn conv2d_im2col_gemm(
    shape: &Conv2dShape,
    input: &[f32],
    kernel: &[f32],
    bias: Option<&[f32]>,
    output: &mut [f32],
    blocking: &GemmBlocking,
    variant: Variant,
) -> Result<()> {
    validate_conv(shape, input, kernel, output)?;
    if let Some(bias) = bias {
        check_input_len("bias", bias, shape.out_channels)?;
    }
    log::debug!("conv2d_im2col_gemm[{variant}]: {shape}, blocking={blocking:?}");

    let plane = shape.out_plane_len();
    let image_len = shape.image_len();
    let per_image = shape.out_channels * plane;
    let dims = GemmDims::new(shape.out_channels, plane, shape.patch_len());
    let weights = &kernel[..shape.kernel_len()];
    let mut col = vec![0.0f32; shape.col_len()];

    for (b, out_image) in output.chunks_exact_mut(per_image).enumerate() {
        let image = &input[b * image_len..(b + 1) * image_len];
        match variant {
            Variant::Scalar => {
                im2col(shape, image, &mut col)?;
                gemm_blocked(weights, &col, out_image, dims, blocking)?;
            }
            Variant::Vector(width) => {
                im2col_vector(shape, image, &mut col, width)?;
                gemm_blocked_vector(weights, &col, out_image, dims, blocking, width)?;
            }
        }

        if let Some(bias) = bias {
            for (oc, out_plane) in out_image.chunks_exact_mut(plane).enumerate() {
                match variant {
                    Variant::Scalar => out_plane.iter_mut().for_each(|v| *v += bias[oc]),
                    Variant::Vector(width) => lanes::add_scalar(out_plane, bias[oc], width),
                }
            }
        }
    }
    Ok(())
}

// ── 3×3 channel accumulation ─────────────────────────────────────────────────

/// Per-output-channel running sum of 3×3 stencil planes.
///
/// The buffer is zero when created and after every [`drain_into`], so each
/// output channel starts its input-channel loop from zero.
///
/// [`drain_into`]: ChannelAccumulator::drain_into
#[derive(Debug, Clone)]
pub struct ChannelAccumulator {
    sum: Vec<f32>,
    lanes: Option<LaneWidth>,
}

impl ChannelAccumulator {
    pub fn new(plane_len: usize, lanes: Option<LaneWidth>) -> Self {
        Self { sum: vec![0.0; plane_len], lanes }
    }

    pub fn len(&self) -> usize {
        self.sum.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sum.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.sum
    }

    /// `sum += plane`
    pub fn accumulate(&mut self, plane: &[f32]) -> Result<()> {
        if plane.len() != self.sum.len() {
            return Err(KernelError::BufferSize {
                buffer: "plane",
                expected: self.sum.len(),
                actual: plane.len(),
            }
            .into());
        }
        match self.lanes {
            Some(width) => lanes::add_assign(&mut self.sum, plane, width),
            None => self.sum.iter_mut().zip(plane).for_each(|(s, &p)| *s += p),
        }
        Ok(())
    }

    /// Copy the sum into `dst` and zero the accumulator.
    pub fn drain_into(&mut self, dst: &mut [f32]) -> Result<()> {
        if dst.len() != self.sum.len() {
            return Err(KernelError::BufferSize {
                buffer: "output plane",
                expected: self.sum.len(),
                actual: dst.len(),
            }
            .into());
        }
        dst.copy_from_slice(&self.sum);
        self.sum.fill(0.0);
        Ok(())
    }
}

/// Multi-channel convolution composed from single-plane 3×3 stencils.
///
/// Requires `kH = kW = 3`, unit stride and `pH = pW ∈ {0, 1}`. Every batch
/// image is processed; for each `(b, oc)` the stencil runs once per input
/// channel on plane `ic` with filter `[oc, ic]` and the planes are summed.
pub fn conv2d_3x3_accumulate(
    shape: &Conv2dShape,
    input: &[f32],
    kernel: &[f32],
    output: &mut [f32],
    strategy: StencilStrategy,
) -> Result<()> {
    validate_conv(shape, input, kernel, output)?;
    if !shape.is_3x3_unit_stride() {
        return Err(KernelError::shape(format!(
            "3x3 accumulation needs a 3x3 kernel, stride 1 and equal padding of 0 or 1, got {shape}"
        ))
        .into());
    }
    strategy.validate()?;
    log::debug!("conv2d_3x3_accumulate[{strategy}]: {shape}");

    let plane = Conv3x3Plane::new(shape.in_h, shape.in_w, shape.pad_h == 1)?;
    let (in_plane, out_plane) = (plane.input_len(), plane.output_len());
    let cin = shape.in_channels;
    let mut scratch = vec![0.0f32; out_plane];
    let mut acc = ChannelAccumulator::new(out_plane, strategy.lanes);

    for (p, out) in output.chunks_exact_mut(out_plane).enumerate() {
        let (b, oc) = (p / shape.out_channels, p % shape.out_channels);
        for ic in 0..cin {
            let src = (b * cin + ic) * in_plane;
            let taps = (oc * cin + ic) * TAPS;
            conv3x3_with(
                &input[src..src + in_plane],
                &kernel[taps..taps + TAPS],
                &mut scratch,
                plane,
                strategy,
            )?;
            acc.accumulate(&scratch)?;
        }
        acc.drain_into(out)?;
    }
    Ok(())
}
