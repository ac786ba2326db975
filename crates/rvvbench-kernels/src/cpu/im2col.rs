//! Receptive-field unrolling for the GEMM lowering.
//!
//! The column buffer for one image is a row-major `[Cin*kH*kW, outH*outW]`
//! matrix. Row `ic*kH*kW + kh*kW + kw` holds, for every output position
//! `oy*outW + ox`, the input sample that tap `(ic, kh, kw)` sees there, or
//! zero when the tap falls in the padding. The same flattening is used for
//! the GEMM `A` operand, so the OIHW weight tensor can be used as-is.

use rvvbench_common::{Conv2dShape, LaneWidth, Result, check_input_len, check_output_len};

use super::lanes;

fn validate_im2col(shape: &Conv2dShape, image: &[f32], col: &[f32]) -> Result<()> {
    shape.validate()?;
    check_input_len("image", image, shape.image_len())?;
    check_output_len("col", col, shape.col_len())
}

/// Output columns `[lo, hi)` whose input column `ox*sW - pW + kw` is in
/// bounds.
#[inline]
fn valid_ox(shape: &Conv2dShape, kw: usize, out_w: usize) -> (usize, usize) {
    let s = shape.stride_w;
    // ox*s + kw >= pad  ⇔  ox >= ceil((pad - kw) / s)
    let lo = shape.pad_w.saturating_sub(kw).div_ceil(s).min(out_w);
    // ox*s + kw < pad + in_w  ⇔  ox < ceil((pad + in_w - kw) / s)
    let hi = (shape.pad_w + shape.in_w).saturating_sub(kw).div_ceil(s).min(out_w);
    (lo, hi.max(lo))
}

/// Scalar im2col of a single `[Cin, H, W]` image.
pub fn im2col(shape: &Conv2dShape, image: &[f32], col: &mut [f32]) -> Result<()> {
    validate_im2col(shape, image, col)?;

    let (in_h, in_w) = (shape.in_h, shape.in_w);
    let (k_h, k_w) = (shape.kernel_h, shape.kernel_w);
    let (out_h, out_w) = (shape.out_h(), shape.out_w());
    let plane = out_h * out_w;

    for ic in 0..shape.in_channels {
        for kh in 0..k_h {
            for kw in 0..k_w {
                let row = (ic * k_h + kh) * k_w + kw;
                let dst = &mut col[row * plane..(row + 1) * plane];
                for oy in 0..out_h {
                    let ih = oy * shape.stride_h + kh;
                    for ox in 0..out_w {
                        let iw = ox * shape.stride_w + kw;
                        dst[oy * out_w + ox] = if ih >= shape.pad_h
                            && ih - shape.pad_h < in_h
                            && iw >= shape.pad_w
                            && iw - shape.pad_w < in_w
                        {
                            image[(ic * in_h + ih - shape.pad_h) * in_w + iw - shape.pad_w]
                        } else {
                            0.0
                        };
                    }
                }
            }
        }
    }
    Ok(())
}

/// Vectorized im2col.
///
/// Each destination row segment `[oy*outW, (oy+1)*outW)` is split into a
/// left padding run, an in-bounds run gathered with stride `sW`, and a right
/// padding run. Rows whose source lies in vertical padding are zero-filled
/// whole. Produces exactly the same buffer as [`im2col`].
pub fn im2col_vector(
    shape: &Conv2dShape,
    image: &[f32],
    col: &mut [f32],
    width: LaneWidth,
) -> Result<()> {
    validate_im2col(shape, image, col)?;

    let (in_h, in_w) = (shape.in_h, shape.in_w);
    let (k_h, k_w) = (shape.kernel_h, shape.kernel_w);
    let (out_h, out_w) = (shape.out_h(), shape.out_w());
    let plane = out_h * out_w;

    for ic in 0..shape.in_channels {
        let chan = &image[ic * in_h * in_w..(ic + 1) * in_h * in_w];
        for kh in 0..k_h {
            for kw in 0..k_w {
                let row = (ic * k_h + kh) * k_w + kw;
                let dst = &mut col[row * plane..(row + 1) * plane];
                let (lo, hi) = valid_ox(shape, kw, out_w);

                for (oy, seg) in dst.chunks_exact_mut(out_w).enumerate() {
                    let ih = oy * shape.stride_h + kh;
                    if ih < shape.pad_h || ih - shape.pad_h >= in_h {
                        lanes::fill(seg, 0.0, width);
                        continue;
                    }
                    let src_row = &chan[(ih - shape.pad_h) * in_w..(ih - shape.pad_h + 1) * in_w];

                    lanes::fill(&mut seg[..lo], 0.0, width);
                    if hi > lo {
                        let iw0 = lo * shape.stride_w + kw - shape.pad_w;
                        lanes::copy_strided(
                            &mut seg[lo..hi],
                            &src_row[iw0..],
                            shape.stride_w,
                            width,
                        );
                    }
                    lanes::fill(&mut seg[hi..], 0.0, width);
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    type Dims = (usize, usize);

    fn shape(hw: Dims, k: Dims, s: Dims, p: Dims) -> Conv2dShape {
        Conv2dShape::new(1, 2, 1, hw, k, s, p).unwrap()
    }

    fn image(s: &Conv2dShape) -> Vec<f32> {
        (0..s.image_len()).map(|i| i as f32 + 1.0).collect()
    }

    #[test]
    fn unpadded_1x1_is_a_copy() {
        let s = shape((3, 3), (1, 1), (1, 1), (0, 0));
        let img = image(&s);
        let mut col = vec![0.0; s.col_len()];
        im2col(&s, &img, &mut col).unwrap();
        assert_eq!(col, img);
    }

    #[test]
    fn row_ordering_follows_ic_kh_kw() {
        // 2 channels of 2x2, kernel 2x2, no padding: one output position.
        let s = shape((2, 2), (2, 2), (1, 1), (0, 0));
        let img = image(&s);
        let mut col = vec![0.0; s.col_len()];
        im2col(&s, &img, &mut col).unwrap();
        assert_eq!(col, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn padding_taps_are_zero() {
        let s = Conv2dShape::new(1, 1, 1, (2, 2), (3, 3), (1, 1), (1, 1)).unwrap();
        let img = [1.0, 2.0, 3.0, 4.0];
        let mut col = vec![f32::NAN; s.col_len()];
        im2col(&s, &img, &mut col).unwrap();
        // Tap (0,0) sees the input only from output (1,1).
        assert_eq!(&col[0..4], &[0.0, 0.0, 0.0, 1.0]);
        // Centre tap sees the whole image.
        assert_eq!(&col[4 * 4..5 * 4], &img);
        assert!(col.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn valid_ox_respects_stride() {
        let s = shape((7, 7), (3, 3), (2, 2), (1, 1));
        let out_w = s.out_w();
        assert_eq!(out_w, 4);
        assert_eq!(valid_ox(&s, 0, out_w), (1, 4));
        assert_eq!(valid_ox(&s, 1, out_w), (0, 4));
        assert_eq!(valid_ox(&s, 2, out_w), (0, 3));
    }

    #[test]
    fn vector_is_byte_identical() {
        for (hw, k, st, p) in [
            ((5, 7), (3, 3), (1, 1), (1, 1)),
            ((7, 6), (3, 2), (2, 3), (1, 2)),
            ((4, 9), (1, 5), (1, 2), (0, 3)),
            ((3, 3), (3, 3), (1, 1), (0, 0)),
        ] {
            let s = shape(hw, k, st, p);
            let img = image(&s);
            let mut reference = vec![0.0; s.col_len()];
            im2col(&s, &img, &mut reference).unwrap();
            for width in LaneWidth::ALL {
                let mut col = vec![f32::NAN; s.col_len()];
                im2col_vector(&s, &img, &mut col, width).unwrap();
                assert_eq!(col, reference, "{s} {width}");
            }
        }
    }

    #[test]
    fn wrong_col_length_rejected() {
        let s = shape((3, 3), (3, 3), (1, 1), (1, 1));
        let img = image(&s);
        let mut col = vec![0.0; s.col_len() - 1];
        assert!(im2col(&s, &img, &mut col).is_err());
        assert!(im2col_vector(&s, &img, &mut col, LaneWidth::M1).is_err());
    }
}
