//! Convolution shape validation.
//!
//! All kernels share one output-extent formula,
//! `out = floor((in + 2*pad - k) / stride) + 1`, and one set of
//! preconditions. Both live here so every computation path rejects the same
//! shapes with the same message before touching a buffer.

use serde::{Deserialize, Serialize};

use crate::error::{KernelError, Result};

/// Largest element count a single `f32` buffer may hold.
const MAX_BUFFER_ELEMS: usize = isize::MAX as usize / std::mem::size_of::<f32>();

/// Output extent of one spatial axis, or `None` when the padded input is
/// smaller than the kernel, the stride is zero or `input + 2*pad` overflows.
#[inline]
pub fn output_dim(input: usize, kernel: usize, stride: usize, pad: usize) -> Option<usize> {
    if stride == 0 || kernel == 0 {
        return None;
    }
    let padded = pad.checked_mul(2)?.checked_add(input)?;
    if padded < kernel { None } else { Some((padded - kernel) / stride + 1) }
}

/// `a * b * ...`, or `None` on overflow.
fn checked_product(factors: &[usize]) -> Option<usize> {
    factors.iter().try_fold(1usize, |acc, &f| acc.checked_mul(f))
}

/// Dimensions of a batched 2-D convolution.
///
/// * `input`:  `[batch, in_channels, in_h, in_w]` (NCHW)
/// * `kernel`: `[out_channels, in_channels, kernel_h, kernel_w]` (OIHW)
/// * output:   `[batch, out_channels, out_h, out_w]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Conv2dShape {
    pub batch: usize,
    pub in_channels: usize,
    pub out_channels: usize,
    pub in_h: usize,
    pub in_w: usize,
    pub kernel_h: usize,
    pub kernel_w: usize,
    pub stride_h: usize,
    pub stride_w: usize,
    pub pad_h: usize,
    pub pad_w: usize,
}

impl Default for Conv2dShape {
    fn default() -> Self {
        Self {
            batch: 1,
            in_channels: 3,
            out_channels: 3,
            in_h: 8,
            in_w: 8,
            kernel_h: 3,
            kernel_w: 3,
            stride_h: 1,
            stride_w: 1,
            pad_h: 1,
            pad_w: 1,
        }
    }
}

impl Conv2dShape {
    /// Build and validate a shape. Spatial arguments are `(height, width)` pairs.
    pub fn new(
        batch: usize,
        in_channels: usize,
        out_channels: usize,
        input: (usize, usize),
        kernel: (usize, usize),
        stride: (usize, usize),
        pad: (usize, usize),
    ) -> Result<Self> {
        let shape = Self {
            batch,
            in_channels,
            out_channels,
            in_h: input.0,
            in_w: input.1,
            kernel_h: kernel.0,
            kernel_w: kernel.1,
            stride_h: stride.0,
            stride_w: stride.1,
            pad_h: pad.0,
            pad_w: pad.1,
        };
        shape.validate()?;
        Ok(shape)
    }

    /// Check every precondition shared by the convolution kernels.
    pub fn validate(&self) -> Result<()> {
        let dims = [
            ("batch", self.batch),
            ("in_channels", self.in_channels),
            ("out_channels", self.out_channels),
            ("in_h", self.in_h),
            ("in_w", self.in_w),
            ("kernel_h", self.kernel_h),
            ("kernel_w", self.kernel_w),
            ("stride_h", self.stride_h),
            ("stride_w", self.stride_w),
        ];
        for (name, value) in dims {
            if value == 0 {
                return Err(KernelError::shape(format!("{name} must be > 0")).into());
            }
        }
        let pads = [("pad_h", self.in_h, self.pad_h), ("pad_w", self.in_w, self.pad_w)];
        for (name, input, pad) in pads {
            if pad.checked_mul(2).and_then(|p| p.checked_add(input)).is_none() {
                return Err(KernelError::shape(format!("{name} {pad} overflows usize")).into());
            }
        }
        let Some(out_h) = output_dim(self.in_h, self.kernel_h, self.stride_h, self.pad_h) else {
            return Err(KernelError::shape(format!(
                "kernel_h {} exceeds padded input height (in_h {}, pad_h {})",
                self.kernel_h, self.in_h, self.pad_h
            ))
            .into());
        };
        let Some(out_w) = output_dim(self.in_w, self.kernel_w, self.stride_w, self.pad_w) else {
            return Err(KernelError::shape(format!(
                "kernel_w {} exceeds padded input width (in_w {}, pad_w {})",
                self.kernel_w, self.in_w, self.pad_w
            ))
            .into());
        };

        let (cin, kh, kw) = (self.in_channels, self.kernel_h, self.kernel_w);
        let buffers = [
            ("input", checked_product(&[self.batch, cin, self.in_h, self.in_w])),
            ("kernel", checked_product(&[self.out_channels, cin, kh, kw])),
            ("output", checked_product(&[self.batch, self.out_channels, out_h, out_w])),
            ("col", checked_product(&[cin, kh, kw, out_h, out_w])),
        ];
        for (name, len) in buffers {
            let reason = match len {
                Some(len) if len <= MAX_BUFFER_ELEMS => continue,
                Some(len) => format!("{name} buffer of {len} elements exceeds isize::MAX bytes"),
                None => format!("{name} buffer length overflows usize"),
            };
            return Err(KernelError::shape(format!("{reason} for {self}")).into());
        }
        Ok(())
    }

    // The length helpers below use plain arithmetic: `validate` has already
    // proven every product fits.

    /// Output height. Only meaningful on a validated shape.
    #[inline]
    pub fn out_h(&self) -> usize {
        output_dim(self.in_h, self.kernel_h, self.stride_h, self.pad_h).unwrap_or(0)
    }

    /// Output width. Only meaningful on a validated shape.
    #[inline]
    pub fn out_w(&self) -> usize {
        output_dim(self.in_w, self.kernel_w, self.stride_w, self.pad_w).unwrap_or(0)
    }

    /// Elements in one input image (`C*H*W`).
    #[inline]
    pub fn image_len(&self) -> usize {
        self.in_channels * self.in_h * self.in_w
    }

    /// Elements in the whole input tensor.
    #[inline]
    pub fn input_len(&self) -> usize {
        self.batch * self.image_len()
    }

    /// Elements in one filter (`Cin*kH*kW`), which is also the GEMM `K` extent.
    #[inline]
    pub fn patch_len(&self) -> usize {
        self.in_channels * self.kernel_h * self.kernel_w
    }

    /// Elements in the weight tensor.
    #[inline]
    pub fn kernel_len(&self) -> usize {
        self.out_channels * self.patch_len()
    }

    /// Output spatial positions per channel (`outH*outW`).
    #[inline]
    pub fn out_plane_len(&self) -> usize {
        self.out_h() * self.out_w()
    }

    /// Elements in the whole output tensor.
    #[inline]
    pub fn output_len(&self) -> usize {
        self.batch * self.out_channels * self.out_plane_len()
    }

    /// Elements in the im2col column buffer for one image.
    #[inline]
    pub fn col_len(&self) -> usize {
        self.patch_len() * self.out_plane_len()
    }

    /// Whether the specialized 3×3 kernel can reproduce this convolution.
    pub fn is_3x3_unit_stride(&self) -> bool {
        self.kernel_h == 3
            && self.kernel_w == 3
            && self.stride_h == 1
            && self.stride_w == 1
            && self.pad_h == self.pad_w
            && self.pad_h <= 1
    }
}

impl std::fmt::Display for Conv2dShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "NCHW={}x{}x{}x{} OIHW={}x{}x{}x{} stride=({},{}) pad=({},{})",
            self.batch,
            self.in_channels,
            self.in_h,
            self.in_w,
            self.out_channels,
            self.in_channels,
            self.kernel_h,
            self.kernel_w,
            self.stride_h,
            self.stride_w,
            self.pad_h,
            self.pad_w
        )
    }
}
