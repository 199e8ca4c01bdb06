//! Real matrix inversion.
//!
//! See the [crypto module] documentation since this is a private module anyways.
//!
//! [crypto module]: crate::crypto

use ndarray::{s, Array2, Axis};

use crate::{crypto::ensure_square, ProtocolError, Result};

/// Pivots with an absolute value below this are treated as zero.
const SINGULARITY_THRESHOLD: f64 = 1e-9;

/// The tolerance of [`is_identity`].
pub const IDENTITY_TOLERANCE: f64 = 1e-9;

/// Inverts a square real matrix by Gauss-Jordan elimination with partial pivoting.
///
/// # Errors
/// Fails with [`ProtocolError::NoInverse`] if the matrix is singular or too close to singular.
pub fn invert(matrix: &Array2<f64>) -> Result<Array2<f64>> {
    let n = matrix.nrows();
    ensure_square(matrix, n)?;

    let mut aug = Array2::<f64>::zeros((n, 2 * n));
    aug.slice_mut(s![.., ..n]).assign(matrix);
    aug.slice_mut(s![.., n..]).assign(&Array2::eye(n));

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&a, &b| aug[[a, col]].abs().total_cmp(&aug[[b, col]].abs()))
            .unwrap_or(col);
        if aug[[pivot, col]].abs() < SINGULARITY_THRESHOLD {
            return Err(ProtocolError::NoInverse);
        }
        if pivot != col {
            for j in 0..2 * n {
                aug.swap([pivot, j], [col, j]);
            }
        }

        let pivot_value = aug[[col, col]];
        aug.row_mut(col).mapv_inplace(|x| x / pivot_value);
        let pivot_row = aug.row(col).to_owned();

        for (row, mut values) in aug.axis_iter_mut(Axis(0)).enumerate() {
            if row != col {
                let factor = values[col];
                values.scaled_add(-factor, &pivot_row);
            }
        }
    }

    Ok(aug.slice(s![.., n..]).to_owned())
}

/// Checks whether `matrix` equals the identity up to [`IDENTITY_TOLERANCE`].
pub fn is_identity(matrix: &Array2<f64>) -> bool {
    matrix.indexed_iter().all(|((i, j), cell)| {
        let expected = if i == j { 1. } else { 0. };
        (cell - expected).abs() <= IDENTITY_TOLERANCE
    })
}
