//! Positional shape arguments: `N Cin Cout H W [kH kW [sH sW [pH pW]]]`.
//!
//! Groups are applied only when complete, so a trailing odd value is
//! ignored. Sizes and strides are clamped to at least 1 and pads to at
//! least 0 before the shape is validated.

use anyhow::{Context, Result};
use rvvbench_common::Conv2dShape;
use tracing::warn;

fn size(v: i64) -> usize {
    v.max(1) as usize
}

fn pad(v: i64) -> usize {
    v.max(0) as usize
}

/// Apply positional `dims` on top of `base` and validate the result.
pub fn apply_positional(base: Conv2dShape, dims: &[i64]) -> Result<Conv2dShape> {
    let mut shape = base;
    let mut used = 0;

    if dims.len() >= 5 {
        shape.batch = size(dims[0]);
        shape.in_channels = size(dims[1]);
        shape.out_channels = size(dims[2]);
        shape.in_h = size(dims[3]);
        shape.in_w = size(dims[4]);
        used = 5;
    }
    if dims.len() >= 7 {
        shape.kernel_h = size(dims[5]);
        shape.kernel_w = size(dims[6]);
        used = 7;
    }
    if dims.len() >= 9 {
        shape.stride_h = size(dims[7]);
        shape.stride_w = size(dims[8]);
        used = 9;
    }
    if dims.len() >= 11 {
        shape.pad_h = pad(dims[9]);
        shape.pad_w = pad(dims[10]);
        used = 11;
    }
    if used < dims.len() {
        warn!("ignoring {} trailing shape argument(s) {:?}", dims.len() - used, &dims[used..]);
    }

    shape.validate().with_context(|| format!("invalid convolution shape {shape}"))?;
    Ok(shape)
}
