//! Dense kernel (Gram) matrix assembly.

use crate::kernel::Kernel;
use crate::types::Point;
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;

/// Symmetric `n x n` matrix `M[i][j] = k(points[i], points[j])`.
///
/// The kernel is evaluated once per unordered pair (`i <= j`); the lower
/// triangle is a mirror of the upper one, so the result is exactly symmetric.
pub fn compute_kernel_matrix<const D: usize, K>(points: &[Point<D>], kernel: &K) -> Array2<f64>
where
    K: Kernel<D> + ?Sized,
{
    let n = points.len();
    let upper_rows: Vec<Vec<f64>> = (0..n)
        .into_par_iter()
        .map(|i| {
            points[i..]
                .iter()
                .map(|pj| kernel.evaluate(&points[i], pj))
                .collect()
        })
        .collect();

    let mut matrix = Array2::zeros((n, n));
    for (i, row) in upper_rows.into_iter().enumerate() {
        for (offset, value) in row.into_iter().enumerate() {
            let j = i + offset;
            matrix[(i, j)] = value;
            matrix[(j, i)] = value;
        }
    }
    log::debug!("Assembled {}x{} kernel matrix", n, n);
    matrix
}

/// `[k(x, points[0]), ..., k(x, points[n-1])]`.
pub fn compute_kernel_vector_for<const D: usize, K>(
    x: &Point<D>,
    points: &[Point<D>],
    kernel: &K,
) -> Array1<f64>
where
    K: Kernel<D> + ?Sized,
{
    points.iter().map(|p| kernel.evaluate(x, p)).collect()
}

/// Rectangular `rows.len() x cols.len()` matrix of kernel values.
pub fn compute_cross_kernel_matrix<const D: usize, K>(
    rows: &[Point<D>],
    cols: &[Point<D>],
    kernel: &K,
) -> Array2<f64>
where
    K: Kernel<D> + ?Sized,
{
    let mut matrix = Array2::zeros((rows.len(), cols.len()));
    matrix
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(i, mut row)| {
            for (j, c) in cols.iter().enumerate() {
                row[j] = kernel.evaluate(&rows[i], c);
            }
        });
    matrix
}
