use tg_grid::Element;

use crate::error::{GemmError, Result};
use crate::matrix::Matrix;

/// Serial triple-loop product of row-major `a` [m, k] and `b` [k, n].
///
/// Accumulates over `k` in ascending order starting from zero, the same
/// order the tiled kernel uses, so both produce bit-identical results.
pub fn serial_gemm<T: Element>(a: &[T], b: &[T], m: usize, k: usize, n: usize) -> Result<Vec<T>> {
    if a.len() != m * k {
        return Err(GemmError::LengthMismatch {
            len: a.len(),
            rows: m,
            cols: k,
        });
    }
    if b.len() != k * n {
        return Err(GemmError::LengthMismatch {
            len: b.len(),
            rows: k,
            cols: n,
        });
    }

    let mut c = vec![T::zero(); m * n];
    for i in 0..m {
        for j in 0..n {
            let mut sum = T::zero();
            for p in 0..k {
                sum += a[i * k + p] * b[p * n + j];
            }
            c[i * n + j] = sum;
        }
    }
    Ok(c)
}

/// Reference product `a @ b` of two matrices.
pub fn reference_product<T: Element>(a: &Matrix<T>, b: &Matrix<T>) -> Result<Matrix<T>> {
    let (m, k, k2, n) = (a.rows(), a.cols(), b.rows(), b.cols());
    if k != k2 {
        return Err(GemmError::DimensionMismatch { m, k, k2, n });
    }
    let data = serial_gemm(a.as_slice(), b.as_slice(), m, k, n)?;
    Matrix::new(data, m, n)
}
