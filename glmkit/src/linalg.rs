use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, OwnedRepr};
use ndarray_linalg::error::LinalgError;
use ndarray_linalg::{CholeskyFactorized, FactorizeC, InverseC, SolveC, UPLO};

use crate::types::{FitError, FitResult};

const PIVOT_TOL: f64 = 1e-10;

impl From<LinalgError> for FitError {
    fn from(err: LinalgError) -> Self {
        match err {
            LinalgError::NotSquare { rows, cols } => {
                FitError::Dimension(format!("factorisation of {rows}x{cols} matrix"))
            }
            _ => FitError::Singular,
        }
    }
}

/// Cholesky factorisation of a symmetric positive definite matrix.
///
/// LAPACK accepts matrices whose pivots are merely tiny; those are rejected
/// here as [`FitError::Singular`], which is how rank-deficient designs surface.
fn factorize(a: ArrayView2<f64>) -> FitResult<CholeskyFactorized<OwnedRepr<f64>>> {
    let (n, m) = a.dim();
    if n != m {
        return Err(FitError::Dimension(format!("cholesky of {n}x{m} matrix")));
    }
    let chol = a.factorizec(UPLO::Lower)?;
    let collapsed = chol
        .factor
        .diag()
        .iter()
        .zip(a.diag().iter())
        .any(|(l, d)| !l.is_finite() || *d <= 0.0 || l * l <= PIVOT_TOL * d);
    if collapsed {
        return Err(FitError::Singular);
    }
    Ok(chol)
}

/// Lower-triangular Cholesky factor.
pub fn cholesky(a: ArrayView2<f64>) -> FitResult<Array2<f64>> {
    let chol = factorize(a)?;
    let mut l = chol.factor;
    for ((i, j), v) in l.indexed_iter_mut() {
        if j > i {
            *v = 0.0;
        }
    }
    Ok(l)
}

pub fn spd_inverse(a: ArrayView2<f64>) -> FitResult<Array2<f64>> {
    let inv = factorize(a)?.invc()?;
    Ok((&inv + &inv.t()) * 0.5)
}

/// Solves `a x = b` for symmetric positive definite `a`.
pub fn spd_solve(a: ArrayView2<f64>, b: ArrayView1<f64>) -> FitResult<Array1<f64>> {
    if a.nrows() != b.len() {
        return Err(FitError::Dimension(format!(
            "system of order {} with rhs of length {}",
            a.nrows(),
            b.len()
        )));
    }
    Ok(factorize(a)?.solvec(&b)?)
}

/// `x' diag(w) x`.
pub fn weighted_crossprod(x: ArrayView2<f64>, w: ArrayView1<f64>) -> Array2<f64> {
    let scaled = &x * &w.insert_axis(Axis(1));
    x.t().dot(&scaled)
}
