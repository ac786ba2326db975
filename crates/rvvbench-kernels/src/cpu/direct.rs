//! Direct NCHW convolution.
//!
//! The scalar variant is the correctness oracle for every other path in this
//! crate: a straight six-deep loop that accumulates
//! `input[b, ic, oh*sH - pH + kh, ow*sW - pW + kw] * kernel[oc, ic, kh, kw]`
//! over `(ic, kh, kw)` and skips taps that land in the zero padding.
//!
//! # Layout
//!
//! * `input`:  `[batch, in_channels, in_h, in_w]`
//! * `kernel`: `[out_channels, in_channels, kernel_h, kernel_w]`
//! * output:   `[batch, out_channels, out_h, out_w]`

use rayon::prelude::*;
use rvvbench_common::{Conv2dShape, LaneWidth, Result, check_input_len, check_output_len};

use super::lanes;

/// Validate the shape and all three buffers of a convolution call.
pub(crate) fn validate_conv(
    shape: &Conv2dShape,
    input: &[f32],
    kernel: &[f32],
    output: &[f32],
) -> Result<()> {
    shape.validate()?;
    check_input_len("input", input, shape.input_len())?;
    check_input_len("kernel", kernel, shape.kernel_len())?;
    check_output_len("output", output, shape.output_len())
}

/// One output plane `(b, oc)` of the scalar oracle.
///
/// `image` is the `[Cin, H, W]` slice of batch `b`, `filter` the
/// `[Cin, kH, kW]` slice of output channel `oc`.
fn direct_plane(shape: &Conv2dShape, image: &[f32], filter: &[f32], plane: &mut [f32]) {
    let (in_h, in_w) = (shape.in_h, shape.in_w);
    let (k_h, k_w) = (shape.kernel_h, shape.kernel_w);
    let out_w = shape.out_w();

    for (oh, out_row) in plane.chunks_exact_mut(out_w).enumerate() {
        for (ow, out) in out_row.iter_mut().enumerate() {
            let mut sum = 0.0f32;
            for ic in 0..shape.in_channels {
                let chan = &image[ic * in_h * in_w..(ic + 1) * in_h * in_w];
                let taps = &filter[ic * k_h * k_w..(ic + 1) * k_h * k_w];
                for kh in 0..k_h {
                    let ih = oh * shape.stride_h + kh;
                    if ih < shape.pad_h || ih - shape.pad_h >= in_h {
                        continue;
                    }
                    let ih = ih - shape.pad_h;
                    for kw in 0..k_w {
                        let iw = ow * shape.stride_w + kw;
                        if iw >= shape.pad_w && iw - shape.pad_w < in_w {
                            sum += chan[ih * in_w + (iw - shape.pad_w)] * taps[kh * k_w + kw];
                        }
                    }
                }
            }
            *out = sum;
        }
    }
}

/// Scalar direct convolution (reference oracle).
///
/// `output` is zero-initialised and then fully overwritten.
pub fn conv2d_direct(
    shape: &Conv2dShape,
    input: &[f32],
    kernel: &[f32],
    output: &mut [f32],
) -> Result<()> {
    validate_conv(shape, input, kernel, output)?;
    log::debug!("conv2d_direct: {shape}");

    output.fill(0.0);
    let plane_len = shape.out_plane_len();
    let (image_len, filter_len) = (shape.image_len(), shape.patch_len());

    for b in 0..shape.batch {
        let image = &input[b * image_len..(b + 1) * image_len];
        for oc in 0..shape.out_channels {
            let filter = &kernel[oc * filter_len..(oc + 1) * filter_len];
            let p = b * shape.out_channels + oc;
            direct_plane(shape, image, filter, &mut output[p * plane_len..(p + 1) * plane_len]);
        }
    }
    Ok(())
}

/// Direct convolution with output planes computed on the rayon pool.
///
/// Each element is reduced in the same order as [`conv2d_direct`], so the
/// result is bit-identical to the oracle.
pub fn conv2d_direct_parallel(
    shape: &Conv2dShape,
    input: &[f32],
    kernel: &[f32],
    output: &mut [f32],
) -> Result<()> {
    validate_conv(shape, input, kernel, output)?;
    log::debug!("conv2d_direct_parallel: {shape}, threads={}", rayon::current_num_threads());

    let (image_len, filter_len) = (shape.image_len(), shape.patch_len());
    output.par_chunks_mut(shape.out_plane_len()).enumerate().for_each(|(p, plane)| {
        let (b, oc) = (p / shape.out_channels, p % shape.out_channels);
        plane.fill(0.0);
        direct_plane(
            shape,
            &input[b * image_len..(b + 1) * image_len],
            &kernel[oc * filter_len..(oc + 1) * filter_len],
            plane,
        );
    });
    Ok(())
}

/// Range of kernel columns `kw` whose tap lands inside the input row for
/// output column `ow`.
#[inline]
fn valid_kw(shape: &Conv2dShape, ow: usize) -> std::ops::Range<usize> {
    let start = ow * shape.stride_w;
    let lo = shape.pad_w.saturating_sub(start);
    let hi = (shape.in_w + shape.pad_w).saturating_sub(start).min(shape.kernel_w);
    lo..hi.max(lo)
}

/// Vectorized direct convolution.
///
/// For every output element and every `(ic, kh)` the in-bounds run of kernel
/// columns is contiguous in both the input row and the filter row; that run
/// is multiplied lane-wise and reduced per step (see [`lanes::dot`]).
pub fn conv2d_direct_vector(
    shape: &Conv2dShape,
    input: &[f32],
    kernel: &[f32],
    output: &mut [f32],
    width: LaneWidth,
) -> Result<()> {
    validate_conv(shape, input, kernel, output)?;
    log::debug!("conv2d_direct_vector[{width}]: {shape}");

    output.fill(0.0);
    let (in_h, in_w) = (shape.in_h, shape.in_w);
    let (k_h, k_w) = (shape.kernel_h, shape.kernel_w);
    let (out_h, out_w) = (shape.out_h(), shape.out_w());

    for b in 0..shape.batch {
        for oc in 0..shape.out_channels {
            let out_base = (b * shape.out_channels + oc) * out_h * out_w;
            for oh in 0..out_h {
                for ow in 0..out_w {
                    let cols = valid_kw(shape, ow);
                    let mut sum = 0.0f32;
                    if !cols.is_empty() {
                        let iw0 = ow * shape.stride_w + cols.start - shape.pad_w;
                        for ic in 0..shape.in_channels {
                            for kh in 0..k_h {
                                let ih = oh * shape.stride_h + kh;
                                if ih < shape.pad_h || ih - shape.pad_h >= in_h {
                                    continue;
                                }
                                let row = ((b * shape.in_channels + ic) * in_h + ih - shape.pad_h)
                                    * in_w;
                                let taps = ((oc * shape.in_channels + ic) * k_h + kh) * k_w;
                                sum += lanes::dot(
                                    &input[row + iw0..row + iw0 + cols.len()],
                                    &kernel[taps + cols.start..taps + cols.end],
                                    width,
                                );
                            }
                        }
                    }
                    output[out_base + oh * out_w + ow] = sum;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f32 = 1e-5;

    fn approx_eq(a: &[f32], b: &[f32], tol: f32) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() <= tol)
    }

    fn shape(
        n: usize,
        cin: usize,
        cout: usize,
        hw: (usize, usize),
        k: (usize, usize),
        s: (usize, usize),
        p: (usize, usize),
    ) -> Conv2dShape {
        Conv2dShape::new(n, cin, cout, hw, k, s, p).unwrap()
    }

    fn ramp(len: usize, scale: f32) -> Vec<f32> {
        (0..len).map(|i| ((i * 7 % 13) as f32 - 6.0) * scale).collect()
    }

    #[test]
    fn identity_kernel_copies_input() {
        let s = shape(1, 1, 1, (3, 4), (1, 1), (1, 1), (0, 0));
        let input = ramp(12, 1.0);
        let mut out = vec![0.0; 12];
        conv2d_direct(&s, &input, &[1.0], &mut out).unwrap();
        assert!(approx_eq(&out, &input, TOL));
    }

    #[test]
    fn averaging_kernel_on_ones_with_padding() {
        let s = shape(1, 1, 1, (4, 4), (3, 3), (1, 1), (1, 1));
        let mut out = vec![0.0; 16];
        conv2d_direct(&s, &[1.0; 16], &[1.0 / 9.0; 9], &mut out).unwrap();
        let corner = 4.0 / 9.0;
        let edge = 6.0 / 9.0;
        #[rustfmt::skip]
        let expected = [
            corner, edge, edge, corner,
            edge,   1.0,  1.0,  edge,
            edge,   1.0,  1.0,  edge,
            corner, edge, edge, corner,
        ];
        assert!(approx_eq(&out, &expected, TOL));
    }

    #[test]
    fn edge_detect_matches_hand_computation() {
        // 1..16 in a 4x4 grid, vertical gradient kernel, no padding.
        let s = shape(1, 1, 1, (4, 4), (3, 3), (1, 1), (0, 0));
        let input: Vec<f32> = (1..=16).map(|v| v as f32).collect();
        let kernel = [-1.0, -1.0, -1.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let mut out = vec![0.0; 4];
        conv2d_direct(&s, &input, &kernel, &mut out).unwrap();
        // each output: sum(row+2) - sum(row) over 3 columns = 3 * 8 = 24
        assert!(approx_eq(&out, &[24.0; 4], TOL));
    }

    #[test]
    fn stride_two_picks_every_other_window() {
        let s = shape(1, 1, 1, (1, 5), (1, 2), (1, 2), (0, 0));
        let mut out = vec![0.0; 2];
        conv2d_direct(&s, &[1.0, 2.0, 3.0, 4.0, 5.0], &[1.0, 1.0], &mut out).unwrap();
        assert!(approx_eq(&out, &[3.0, 7.0], TOL));
    }

    #[test]
    fn multichannel_sums_over_input_channels() {
        // Two 1x3 channels, 1x1 kernel weights [1, -1] for out channel 0 and [2, 0] for 1.
        let s = shape(1, 2, 2, (1, 3), (1, 1), (1, 1), (0, 0));
        let input = [1.0, 2.0, 3.0, 10.0, 20.0, 30.0];
        let kernel = [1.0, -1.0, 2.0, 0.0];
        let mut out = vec![0.0; 6];
        conv2d_direct(&s, &input, &kernel, &mut out).unwrap();
        assert!(approx_eq(&out, &[-9.0, -18.0, -27.0, 2.0, 4.0, 6.0], TOL));
    }

    #[test]
    fn batches_are_independent() {
        let s = shape(2, 2, 3, (5, 5), (3, 3), (1, 1), (1, 1));
        let input = ramp(s.input_len(), 0.1);
        let kernel = ramp(s.kernel_len(), 0.05);
        let mut out = vec![0.0; s.output_len()];
        conv2d_direct(&s, &input, &kernel, &mut out).unwrap();

        let single = shape(1, 2, 3, (5, 5), (3, 3), (1, 1), (1, 1));
        let mut second = vec![0.0; single.output_len()];
        conv2d_direct(&single, &input[s.image_len()..], &kernel, &mut second).unwrap();
        assert_eq!(&out[single.output_len()..], &second[..]);
    }

    #[test]
    fn stale_output_is_overwritten() {
        let s = shape(1, 1, 1, (3, 3), (3, 3), (1, 1), (0, 0));
        let mut out = vec![f32::NAN];
        conv2d_direct(&s, &[0.0; 9], &[1.0; 9], &mut out).unwrap();
        assert_eq!(out, vec![0.0]);
    }

    #[test]
    fn vector_matches_oracle_for_every_width() {
        let s = shape(2, 3, 4, (7, 9), (3, 5), (2, 1), (1, 2));
        let input = ramp(s.input_len(), 0.1);
        let kernel = ramp(s.kernel_len(), 0.03);
        let mut reference = vec![0.0; s.output_len()];
        conv2d_direct(&s, &input, &kernel, &mut reference).unwrap();

        for width in LaneWidth::ALL {
            let mut out = vec![0.0; s.output_len()];
            conv2d_direct_vector(&s, &input, &kernel, &mut out, width).unwrap();
            assert!(approx_eq(&out, &reference, 1e-4), "{width}");
        }
    }

    #[test]
    fn parallel_is_bit_identical() {
        let s = shape(2, 3, 5, (9, 6), (3, 3), (1, 2), (1, 1));
        let input = ramp(s.input_len(), 0.2);
        let kernel = ramp(s.kernel_len(), 0.07);
        let mut reference = vec![0.0; s.output_len()];
        let mut out = vec![1.0; s.output_len()];
        conv2d_direct(&s, &input, &kernel, &mut reference).unwrap();
        conv2d_direct_parallel(&s, &input, &kernel, &mut out).unwrap();
        assert_eq!(out, reference);
    }

    #[test]
    fn valid_kw_clips_both_borders() {
        let s = shape(1, 1, 1, (4, 4), (3, 3), (1, 1), (1, 1));
        assert_eq!(valid_kw(&s, 0), 1..3);
        assert_eq!(valid_kw(&s, 1), 0..3);
        assert_eq!(valid_kw(&s, 3), 0..2);
    }

    #[test]
    fn short_buffers_rejected() {
        let s = shape(1, 2, 1, (3, 3), (3, 3), (1, 1), (0, 0));
        let mut out = vec![0.0; 1];
        assert!(conv2d_direct(&s, &[0.0; 17], &[0.0; 18], &mut out).is_err());
        assert!(conv2d_direct(&s, &[0.0; 18], &[0.0; 17], &mut out).is_err());
        let mut wrong = vec![0.0; 2];
        assert!(conv2d_direct(&s, &[0.0; 18], &[0.0; 18], &mut wrong).is_err());
        assert!(conv2d_direct(&s, &[0.0; 18], &[0.0; 18], &mut out).is_ok());
    }
}
