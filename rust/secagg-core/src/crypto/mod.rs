//! Arithmetic primitives of both schemes.
//!
//! Every scalar group operation is lifted elementwise to `n×n` matrices. The lifts are pure and
//! run cell-parallel.
//!
//! - [`curve`]: point matrices over ristretto255 for the elliptic-curve scheme.
//! - [`modular`]: modular exponentiation, inversion and matrix algebra over `Z_p` for the
//!   classic scheme.
//! - [`linalg`]: real matrix inversion for the elliptic-curve scheme's basis matrices.
//! - [`prng`]: sampling of bounded integers and matrices.

pub mod curve;
pub mod linalg;
pub mod modular;
pub mod prng;

use ndarray::Array2;

pub use self::{
    curve::{
        multiply_point_matrix,
        point_add,
        point_subtract,
        points_equal,
        scalar_multiply,
        CompressedPointMatrix,
        EccGroup,
        PointMatrix,
    },
    modular::{mod_inverse, mod_pow, ModularGroup},
    prng::{generate_bounded_matrix, generate_integer},
};
use crate::{ProtocolError, Result};

/// Checks that `matrix` is an `n×n` matrix.
///
/// # Errors
/// Fails with [`ProtocolError::ShapeMismatch`] otherwise.
pub fn ensure_square<T>(matrix: &Array2<T>, n: usize) -> Result<()> {
    let (rows, cols) = matrix.dim();
    if rows == n && cols == n {
        Ok(())
    } else {
        Err(ProtocolError::ShapeMismatch {
            expected: n,
            rows,
            cols,
        })
    }
}

/// Checks that two operands of an elementwise operation have the same shape.
pub(crate) fn ensure_same_shape<A, B>(a: &Array2<A>, b: &Array2<B>) -> Result<()> {
    ensure_square(b, a.nrows())?;
    ensure_square(a, b.nrows())
}
