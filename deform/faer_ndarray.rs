use faer::diag::DiagRef;
use faer::linalg::solvers::{self, Solve};
use faer::{Mat, MatRef, Side};
use ndarray::{Array1, Array2, ArrayBase, Data, Ix1, Ix2};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FaerLinalgError {
    #[error("Self-adjoint eigendecomposition failed: {0:?}")]
    SelfAdjointEigen(solvers::EvdError),
    #[error("Cholesky factorization failed: {0:?}")]
    Cholesky(solvers::LltError),
    #[error("Expected a square matrix, got {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },
}

fn mat_to_array(mat: MatRef<'_, f64>) -> Array2<f64> {
    Array2::from_shape_fn((mat.nrows(), mat.ncols()), |(i, j)| mat[(i, j)])
}

fn diag_to_array(diag: DiagRef<'_, f64>) -> Array1<f64> {
    let mat = diag.column_vector().as_mat();
    Array1::from_shape_fn(mat.nrows(), |i| mat[(i, 0)])
}

enum FaerStorage<'a> {
    Borrowed(MatRef<'a, f64>),
    Owned(Mat<f64>),
}

impl<'a> FaerStorage<'a> {
    #[inline]
    fn as_ref(&self) -> MatRef<'_, f64> {
        match self {
            FaerStorage::Borrowed(view) => *view,
            FaerStorage::Owned(mat) => mat.as_ref(),
        }
    }
}

/// Zero-copy view of a standard-layout ndarray matrix as a faer matrix.
/// Non-contiguous inputs are copied once.
pub struct FaerArrayView<'a> {
    storage: FaerStorage<'a>,
}

impl<'a> FaerArrayView<'a> {
    pub fn new<S: Data<Elem = f64>>(array: &'a ArrayBase<S, Ix2>) -> Self {
        let storage = match array.as_slice_memory_order() {
            Some(slice) if array.is_standard_layout() => FaerStorage::Borrowed(
                MatRef::from_row_major_slice(slice, array.nrows(), array.ncols()),
            ),
            Some(slice) if array.t().is_standard_layout() => FaerStorage::Borrowed(
                MatRef::from_column_major_slice(slice, array.nrows(), array.ncols()),
            ),
            _ => {
                let (rows, cols) = array.dim();
                FaerStorage::Owned(Mat::from_fn(rows, cols, |i, j| array[(i, j)]))
            }
        };
        Self { storage }
    }

    #[inline]
    pub fn as_ref(&self) -> MatRef<'_, f64> {
        self.storage.as_ref()
    }
}

pub struct FaerColView<'a> {
    storage: FaerStorage<'a>,
}

impl<'a> FaerColView<'a> {
    pub fn new<S: Data<Elem = f64>>(array: &'a ArrayBase<S, Ix1>) -> Self {
        let len = array.len();
        let storage = if let Some(slice) = array.as_slice() {
            FaerStorage::Borrowed(MatRef::from_row_major_slice(slice, len, 1))
        } else {
            FaerStorage::Owned(Mat::from_fn(len, 1, |i, _| array[i]))
        };
        Self { storage }
    }

    #[inline]
    pub fn as_ref(&self) -> MatRef<'_, f64> {
        self.storage.as_ref()
    }
}

pub trait FaerEigh {
    /// Eigenvalues in ascending order with eigenvectors in the matching columns.
    fn eigh(&self, side: Side) -> Result<(Array1<f64>, Array2<f64>), FaerLinalgError>;
}

impl<S: Data<Elem = f64>> FaerEigh for ArrayBase<S, Ix2> {
    fn eigh(&self, side: Side) -> Result<(Array1<f64>, Array2<f64>), FaerLinalgError> {
        if self.nrows() != self.ncols() {
            return Err(FaerLinalgError::NotSquare {
                rows: self.nrows(),
                cols: self.ncols(),
            });
        }
        let faer_view = FaerArrayView::new(self);
        let eigen = faer_view
            .as_ref()
            .self_adjoint_eigen(side)
            .map_err(FaerLinalgError::SelfAdjointEigen)?;
        let values = diag_to_array(eigen.S());
        let vectors = mat_to_array(eigen.U());
        Ok((values, vectors))
    }
}

/// Full symmetric eigendecomposition reordered by descending eigenvalue.
///
/// Ties keep the solver's column order, so the result is deterministic for a
/// given input. Negative eigenvalues produced by rounding on a PSD matrix are
/// clamped to zero.
pub fn descending_eigh(
    matrix: &Array2<f64>,
) -> Result<(Array1<f64>, Array2<f64>), FaerLinalgError> {
    let (values, vectors) = matrix.eigh(Side::Lower)?;
    if values.is_empty() {
        return Ok((values, Array2::zeros((matrix.nrows(), 0))));
    }
    let mut idxs: Vec<usize> = (0..values.len()).collect();
    // sort_by is stable, so equal eigenvalues stay in index order
    idxs.sort_by(|&i, &j| {
        values[j]
            .partial_cmp(&values[i])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let sorted_values = Array1::from_iter(idxs.iter().map(|&idx| values[idx].max(0.0)));
    let mut sorted_vectors = Array2::zeros((matrix.nrows(), idxs.len()));
    for (col, &idx) in idxs.iter().enumerate() {
        sorted_vectors.column_mut(col).assign(&vectors.column(idx));
    }
    Ok((sorted_values, sorted_vectors))
}

pub struct FaerCholeskyFactor {
    factor: solvers::Llt<f64>,
}

impl FaerCholeskyFactor {
    pub fn solve_vec(&self, rhs: &Array1<f64>) -> Array1<f64> {
        let rhs_view = FaerColView::new(rhs);
        let sol = self.factor.solve(rhs_view.as_ref());
        Array1::from_shape_fn(rhs.len(), |i| sol[(i, 0)])
    }

    pub fn solve_mat(&self, rhs: &Array2<f64>) -> Array2<f64> {
        let rhs_view = FaerArrayView::new(rhs);
        let sol = self.factor.solve(rhs_view.as_ref());
        mat_to_array(sol.as_ref())
    }

    /// Explicit inverse of the factored matrix, obtained by solving against the identity.
    pub fn inverse(&self) -> Array2<f64> {
        let n = self.factor.L().nrows();
        self.solve_mat(&Array2::eye(n))
    }

    pub fn diag(&self) -> Array1<f64> {
        diag_to_array(self.factor.L().diagonal())
    }

    /// Lower-triangular factor `L` with `A = L Lᵀ`.
    pub fn lower(&self) -> Array2<f64> {
        let l = self.factor.L();
        Array2::from_shape_fn((l.nrows(), l.ncols()), |(i, j)| {
            if j <= i { l[(i, j)] } else { 0.0 }
        })
    }

    /// Reciprocal condition estimate `(min diag L / max diag L)^2`.
    pub fn reciprocal_condition_estimate(&self) -> f64 {
        let diag = self.diag();
        let (lo, hi) = diag
            .iter()
            .fold((f64::INFINITY, 0.0_f64), |(lo, hi), &d| (lo.min(d.abs()), hi.max(d.abs())));
        if hi == 0.0 { 0.0 } else { (lo / hi).powi(2) }
    }
}

pub trait FaerCholesky {
    fn cholesky(&self, side: Side) -> Result<FaerCholeskyFactor, FaerLinalgError>;
}

impl<S: Data<Elem = f64>> FaerCholesky for ArrayBase<S, Ix2> {
    fn cholesky(&self, side: Side) -> Result<FaerCholeskyFactor, FaerLinalgError> {
        if self.nrows() != self.ncols() {
            return Err(FaerLinalgError::NotSquare {
                rows: self.nrows(),
                cols: self.ncols(),
            });
        }
        let faer_view = FaerArrayView::new(self);
        let factor = faer_view
            .as_ref()
            .llt(side)
            .map_err(FaerLinalgError::Cholesky)?;
        Ok(FaerCholeskyFactor { factor })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, array};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_psd(n: usize, rank: usize, rng: &mut StdRng) -> Array2<f64> {
        let mut mat = Array2::zeros((rank, n));
        for i in 0..rank {
            for j in 0..n {
                mat[(i, j)] = rng.gen_range(-1.0..1.0);
            }
        }
        mat.t().dot(&mat)
    }

    #[test]
    fn descending_eigh_orders_and_reconstructs() {
        let mut rng = StdRng::seed_from_u64(42);
        let matrix = random_psd(12, 5, &mut rng);

        let (values, vectors) = descending_eigh(&matrix).unwrap();
        assert_eq!(values.len(), 12);
        for w in values.as_slice().unwrap().windows(2) {
            assert!(w[0] >= w[1], "eigenvalues not descending: {:?}", w);
        }
        assert!(values.iter().all(|&v| v >= 0.0));

        let rebuilt = vectors.dot(&Array2::from_diag(&values)).dot(&vectors.t());
        for (a, b) in rebuilt.iter().zip(matrix.iter()) {
            assert!((a - b).abs() < 1e-9, "reconstruction mismatch {} vs {}", a, b);
        }
    }

    #[test]
    fn cholesky_lower_and_inverse_agree() {
        let a = array![[4.0, 2.0, 0.6], [2.0, 5.0, 1.0], [0.6, 1.0, 3.0]];
        let factor = a.cholesky(Side::Lower).unwrap();

        let l = factor.lower();
        assert_eq!(l[(0, 1)], 0.0);
        let llt = l.dot(&l.t());
        for (x, y) in llt.iter().zip(a.iter()) {
            assert!((x - y).abs() < 1e-12);
        }

        let identity = a.dot(&factor.inverse());
        for ((i, j), v) in identity.indexed_iter() {
            let expected = if i == j { 1.0 } else { 0.0 };
            assert!((v - expected).abs() < 1e-12);
        }

        let rhs = array![1.0, 2.0, 3.0];
        let x = factor.solve_vec(&rhs);
        let back = a.dot(&x);
        for (x, y) in back.iter().zip(rhs.iter()) {
            assert!((x - y).abs() < 1e-12);
        }
    }

    #[test]
    fn cholesky_rejects_indefinite_and_non_square() {
        let indefinite = array![[1.0, 2.0], [2.0, 1.0]];
        assert!(matches!(
            indefinite.cholesky(Side::Lower),
            Err(FaerLinalgError::Cholesky(_))
        ));

        let rect = Array2::<f64>::zeros((2, 3));
        assert!(matches!(
            rect.cholesky(Side::Lower),
            Err(FaerLinalgError::NotSquare { rows: 2, cols: 3 })
        ));
    }
}
