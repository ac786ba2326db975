//! Blocked single-precision GEMM, `C[M,N] = A[M,K] @ B[K,N]`, all row-major.
//!
//! The three loops are tiled by [`GemmBlocking`]. Tiles that run past a
//! matrix edge are truncated to `min(dim, start + block)`. Inside the tiles
//! every `C[i, j]` accumulates its `k` terms in increasing `k` order, so the
//! blocking and the lane width never change the result.

use rvvbench_common::{
    GemmBlocking, KernelError, LaneWidth, Result, check_input_len, check_output_len,
};

use super::lanes;

/// Matrix extents of one GEMM call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GemmDims {
    pub m: usize,
    pub n: usize,
    pub k: usize,
}

impl GemmDims {
    pub const fn new(m: usize, n: usize, k: usize) -> Self {
        Self { m, n, k }
    }
}

fn validate_gemm(
    dims: GemmDims,
    a: &[f32],
    b: &[f32],
    c: &[f32],
    blocking: &GemmBlocking,
) -> Result<()> {
    if dims.m == 0 || dims.n == 0 || dims.k == 0 {
        return Err(KernelError::shape(format!(
            "GEMM dimensions must be > 0, got M={} N={} K={}",
            dims.m, dims.n, dims.k
        ))
        .into());
    }
    blocking.validate()?;
    check_input_len("A", a, dims.m * dims.k)?;
    check_input_len("B", b, dims.k * dims.n)?;
    check_output_len("C", c, dims.m * dims.n)
}

/// `(start, end)` pairs tiling `0..dim` in steps of `block`.
#[inline]
fn tiles(dim: usize, block: usize) -> impl Iterator<Item = (usize, usize)> {
    (0..dim).step_by(block).map(move |start| (start, dim.min(start + block)))
}

/// Scalar blocked GEMM. `c` is overwritten.
pub fn gemm_blocked(
    a: &[f32],
    b: &[f32],
    c: &mut [f32],
    dims: GemmDims,
    blocking: &GemmBlocking,
) -> Result<()> {
    validate_gemm(dims, a, b, c, blocking)?;
    let GemmDims { n, k, .. } = dims;

    c.fill(0.0);
    for (i0, i1) in tiles(dims.m, blocking.block_m) {
        for (j0, j1) in tiles(n, blocking.block_n) {
            for (k0, k1) in tiles(k, blocking.block_k) {
                for i in i0..i1 {
                    for p in k0..k1 {
                        let a_ip = a[i * k + p];
                        let b_row = &b[p * n..(p + 1) * n];
                        for j in j0..j1 {
                            c[i * n + j] += a_ip * b_row[j];
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

/// Vectorized blocked GEMM.
///
/// For each row `i` of the tile and each `vl`-wide chunk of the `N` tile, the
/// accumulator chunk is updated with `C += A[i, p] * B[p, j..j+vl]` for every
/// `p` of the `K` tile before moving on.
pub fn gemm_blocked_vector(
    a: &[f32],
    b: &[f32],
    c: &mut [f32],
    dims: GemmDims,
    blocking: &GemmBlocking,
    width: LaneWidth,
) -> Result<()> {
    validate_gemm(dims, a, b, c, blocking)?;
    let GemmDims { n, k, .. } = dims;

    lanes::fill(c, 0.0, width);
    for (i0, i1) in tiles(dims.m, blocking.block_m) {
        for (j0, j1) in tiles(n, blocking.block_n) {
            for (k0, k1) in tiles(k, blocking.block_k) {
                for i in i0..i1 {
                    let c_row = &mut c[i * n + j0..i * n + j1];
                    for (offset, vl) in lanes::strip_mine(j1 - j0, width) {
                        let acc = &mut c_row[offset..offset + vl];
                        for p in k0..k1 {
                            let j = p * n + j0 + offset;
                            lanes::axpy(acc, a[i * k + p], &b[j..j + vl], width);
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive(a: &[f32], b: &[f32], dims: GemmDims) -> Vec<f32> {
        let mut c = vec![0.0; dims.m * dims.n];
        for i in 0..dims.m {
            for j in 0..dims.n {
                let mut s = 0.0f32;
                for p in 0..dims.k {
                    s += a[i * dims.k + p] * b[p * dims.n + j];
                }
                c[i * dims.n + j] = s;
            }
        }
        c
    }

    fn filled(len: usize, seed: usize) -> Vec<f32> {
        (0..len).map(|i| (((i + seed) * 31 % 17) as f32 - 8.0) / 8.0).collect()
    }

    #[test]
    fn small_known_product() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let b = [7.0, 8.0, 9.0, 10.0, 11.0, 12.0];
        let mut c = vec![0.0; 4];
        gemm_blocked(&a, &b, &mut c, GemmDims::new(2, 2, 3), &GemmBlocking::new(1, 1, 2)).unwrap();
        assert_eq!(c, vec![58.0, 64.0, 139.0, 154.0]);
    }

    #[test]
    fn ragged_tiles_match_naive_bitwise() {
        let dims = GemmDims::new(13, 70, 37);
        let a = filled(dims.m * dims.k, 1);
        let b = filled(dims.k * dims.n, 5);
        let expected = naive(&a, &b, dims);

        for blocking in [
            GemmBlocking::SCALAR,
            GemmBlocking::VECTOR,
            GemmBlocking::new(5, 7, 3),
            GemmBlocking::new(100, 100, 100),
            GemmBlocking::new(1, 1, 1),
        ] {
            let mut c = vec![f32::NAN; dims.m * dims.n];
            gemm_blocked(&a, &b, &mut c, dims, &blocking).unwrap();
            assert_eq!(c, expected, "{blocking:?}");

            for width in LaneWidth::ALL {
                let mut c = vec![f32::NAN; dims.m * dims.n];
                gemm_blocked_vector(&a, &b, &mut c, dims, &blocking, width).unwrap();
                assert_eq!(c, expected, "{blocking:?} {width}");
            }
        }
    }

    #[test]
    fn tiles_truncate_last_block() {
        let t: Vec<_> = tiles(10, 4).collect();
        assert_eq!(t, vec![(0, 4), (4, 8), (8, 10)]);
        let t: Vec<_> = tiles(3, 8).collect();
        assert_eq!(t, vec![(0, 3)]);
    }

    #[test]
    fn rejects_bad_arguments() {
        let mut c = vec![0.0; 4];
        let dims = GemmDims::new(2, 2, 2);
        let (a, b) = ([0.0; 4], [0.0; 4]);
        let zero_block = GemmBlocking::new(0, 1, 1);
        assert!(gemm_blocked(&a, &b, &mut c, dims, &zero_block).is_err());
        assert!(gemm_blocked(&[0.0; 3], &b, &mut c, dims, &GemmBlocking::SCALAR).is_err());
        let empty = GemmDims::new(0, 2, 2);
        assert!(gemm_blocked(&a, &b, &mut c, empty, &GemmBlocking::SCALAR).is_err());
        let mut short = vec![0.0; 3];
        let blocking = GemmBlocking::VECTOR;
        assert!(gemm_blocked_vector(&a, &b, &mut short, dims, &blocking, LaneWidth::M1).is_err());
    }
}
