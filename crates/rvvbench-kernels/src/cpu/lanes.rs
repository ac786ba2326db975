//! Strip-mined vector primitives.
//!
//! Every vectorized kernel in this crate is the scalar algorithm driven in
//! steps of at most [`LaneWidth::lanes`] elements, the way an RVV loop is
//! driven by `vsetvl`. Elementwise primitives produce exactly the scalar
//! values regardless of width; [`dot`] reduces each step with a fold before
//! adding it to the running total, so its rounding depends on the width.

use rvvbench_common::LaneWidth;

/// Widest step any [`LaneWidth`] can request.
pub const MAX_LANES: usize = 32;

/// Iterator over `(offset, vl)` steps covering `0..len`.
#[derive(Debug, Clone)]
pub struct StripMine {
    offset: usize,
    len: usize,
    lanes: usize,
}

impl Iterator for StripMine {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.len {
            return None;
        }
        let vl = self.lanes.min(self.len - self.offset);
        let step = (self.offset, vl);
        self.offset += vl;
        Some(step)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = (self.len - self.offset.min(self.len)).div_ceil(self.lanes);
        (n, Some(n))
    }
}

impl ExactSizeIterator for StripMine {}

/// Split `0..len` into steps of `vl = min(lanes, remaining)`.
#[inline]
pub fn strip_mine(len: usize, width: LaneWidth) -> StripMine {
    StripMine { offset: 0, len, lanes: width.lanes() }
}

/// `dst[i] = value`
pub fn fill(dst: &mut [f32], value: f32, width: LaneWidth) {
    for chunk in dst.chunks_mut(width.lanes()) {
        chunk.fill(value);
    }
}

/// `dst[i] = src[i]`
pub fn copy(dst: &mut [f32], src: &[f32], width: LaneWidth) {
    debug_assert_eq!(dst.len(), src.len());
    for (d, s) in dst.chunks_mut(width.lanes()).zip(src.chunks(width.lanes())) {
        d.copy_from_slice(s);
    }
}

/// Strided gather: `dst[i] = src[i * stride]`.
pub fn copy_strided(dst: &mut [f32], src: &[f32], stride: usize, width: LaneWidth) {
    if stride == 1 {
        copy(dst, &src[..dst.len()], width);
        return;
    }
    for (offset, vl) in strip_mine(dst.len(), width) {
        for (i, d) in dst[offset..offset + vl].iter_mut().enumerate() {
            *d = src[(offset + i) * stride];
        }
    }
}

/// `acc[i] += a * x[i]`
pub fn axpy(acc: &mut [f32], a: f32, x: &[f32], width: LaneWidth) {
    debug_assert_eq!(acc.len(), x.len());
    for (c, v) in acc.chunks_mut(width.lanes()).zip(x.chunks(width.lanes())) {
        for (ci, &vi) in c.iter_mut().zip(v) {
            *ci += a * vi;
        }
    }
}

/// `dst[i] += src[i]`
pub fn add_assign(dst: &mut [f32], src: &[f32], width: LaneWidth) {
    debug_assert_eq!(dst.len(), src.len());
    for (d, s) in dst.chunks_mut(width.lanes()).zip(src.chunks(width.lanes())) {
        for (di, &si) in d.iter_mut().zip(s) {
            *di += si;
        }
    }
}

/// `dst[i] += value`
pub fn add_scalar(dst: &mut [f32], value: f32, width: LaneWidth) {
    for chunk in dst.chunks_mut(width.lanes()) {
        for d in chunk {
            *d += value;
        }
    }
}

/// Dot product with a per-step lane reduction.
pub fn dot(a: &[f32], b: &[f32], width: LaneWidth) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let mut total = 0.0f32;
    for (xa, xb) in a.chunks(width.lanes()).zip(b.chunks(width.lanes())) {
        let mut prod = [0.0f32; MAX_LANES];
        for (p, (&x, &y)) in prod.iter_mut().zip(xa.iter().zip(xb)) {
            *p = x * y;
        }
        total += prod[..xa.len()].iter().fold(0.0f32, |s, &v| s + v);
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_mine_covers_range_with_tail() {
        let steps: Vec<_> = strip_mine(10, LaneWidth::M1).collect();
        assert_eq!(steps, vec![(0, 4), (4, 4), (8, 2)]);
        assert_eq!(strip_mine(10, LaneWidth::M1).len(), 3);
    }

    #[test]
    fn strip_mine_empty_and_exact() {
        assert_eq!(strip_mine(0, LaneWidth::M8).count(), 0);
        let steps: Vec<_> = strip_mine(32, LaneWidth::M8).collect();
        assert_eq!(steps, vec![(0, 32)]);
    }

    #[test]
    fn copy_strided_gathers_every_nth() {
        let src: Vec<f32> = (0..20).map(|i| i as f32).collect();
        let mut dst = vec![0.0; 7];
        copy_strided(&mut dst, &src, 3, LaneWidth::M1);
        assert_eq!(dst, vec![0.0, 3.0, 6.0, 9.0, 12.0, 15.0, 18.0]);
    }

    #[test]
    fn axpy_matches_scalar_bitwise() {
        let x: Vec<f32> = (0..37).map(|i| (i as f32 * 0.37).sin()).collect();
        let mut expected: Vec<f32> = (0..37).map(|i| i as f32 * 0.1).collect();
        let mut got = expected.clone();
        for (e, &v) in expected.iter_mut().zip(&x) {
            *e += 0.75 * v;
        }
        axpy(&mut got, 0.75, &x, LaneWidth::M2);
        assert_eq!(got, expected);
    }

    #[test]
    fn dot_close_to_scalar_for_every_width() {
        let a: Vec<f32> = (0..101).map(|i| (i as f32 * 0.21).cos()).collect();
        let b: Vec<f32> = (0..101).map(|i| (i as f32 * 0.13).sin()).collect();
        let scalar: f32 = a.iter().zip(&b).map(|(x, y)| x * y).sum();
        for width in LaneWidth::ALL {
            assert!((dot(&a, &b, width) - scalar).abs() < 1e-4, "{width}");
        }
    }

    #[test]
    fn add_helpers() {
        let mut d = vec![1.0; 9];
        add_assign(&mut d, &[2.0; 9], LaneWidth::M1);
        add_scalar(&mut d, 0.5, LaneWidth::M1);
        assert!(d.iter().all(|&v| v == 3.5));
        fill(&mut d, 0.0, LaneWidth::M4);
        assert!(d.iter().all(|&v| v == 0.0));
    }
}
