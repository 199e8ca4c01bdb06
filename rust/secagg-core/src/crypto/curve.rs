//! Point matrices over the ristretto255 group.
//!
//! See the [crypto module] documentation since this is a private module anyways.
//!
//! [crypto module]: crate::crypto

use std::{fmt, iter};

use curve25519_dalek::{
    constants::RISTRETTO_BASEPOINT_POINT,
    ristretto::{CompressedRistretto, RistrettoPoint},
    scalar::Scalar,
    traits::Identity,
};
use derive_more::{AsRef, From};
use ndarray::{Array2, Zip};
use num::{bigint::BigUint, traits::One};

use crate::{crypto::ensure_same_shape, ProtocolError, Result};

/// A matrix of group elements.
pub type PointMatrix = Array2<RistrettoPoint>;

/// The name of the curve all point matrices live on.
pub const CURVE_NAME: &str = "ristretto255";

/// The group parameters of the elliptic-curve scheme.
#[derive(Clone, Debug, PartialEq)]
pub struct EccGroup {
    /// The curve identifier.
    pub curve: &'static str,
    /// The generator `G`.
    pub generator: RistrettoPoint,
    /// The prime order of `G`.
    pub order: BigUint,
}

impl Default for EccGroup {
    fn default() -> Self {
        // l = 2^252 + 27742317777372353535851937790883648493
        let order = (BigUint::one() << 252_usize)
            + BigUint::parse_bytes(b"27742317777372353535851937790883648493", 10)
                .unwrap_or_default();
        Self {
            curve: CURVE_NAME,
            generator: RISTRETTO_BASEPOINT_POINT,
            order,
        }
    }
}

impl fmt::Display for EccGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (order {})", self.curve, self.order)
    }
}

impl EccGroup {
    /// Iterates over the multiples `0·G, 1·G, 2·G, ...` of the generator.
    pub fn multiples(&self) -> impl Iterator<Item = RistrettoPoint> + '_ {
        iter::successors(Some(RistrettoPoint::identity()), move |acc| {
            Some(acc + self.generator)
        })
    }

    /// Maps every cell `s` of the scalar matrix to `s·G`.
    pub fn scalar_multiply(&self, scalars: &Array2<u64>) -> PointMatrix {
        scalar_multiply(scalars, &self.generator)
    }
}

/// Maps every cell `s` of the scalar matrix to `s·base`.
pub fn scalar_multiply(scalars: &Array2<u64>, base: &RistrettoPoint) -> PointMatrix {
    Zip::from(scalars).par_map_collect(|scalar| Scalar::from(*scalar) * base)
}

/// Adds two point matrices elementwise.
///
/// # Errors
/// Fails if the shapes of the operands differ.
pub fn point_add(a: &PointMatrix, b: &PointMatrix) -> Result<PointMatrix> {
    ensure_same_shape(a, b)?;
    Ok(Zip::from(a).and(b).par_map_collect(|x, y| x + y))
}

/// Subtracts two point matrices elementwise.
///
/// # Errors
/// Fails if the shapes of the operands differ.
pub fn point_subtract(a: &PointMatrix, b: &PointMatrix) -> Result<PointMatrix> {
    ensure_same_shape(a, b)?;
    Ok(Zip::from(a).and(b).par_map_collect(|x, y| x - y))
}

/// Multiplies every point of `points` by the scalar in the same cell of `scalars`.
///
/// # Errors
/// Fails if the shapes of the operands differ.
pub fn multiply_point_matrix(scalars: &Array2<u64>, points: &PointMatrix) -> Result<PointMatrix> {
    ensure_same_shape(scalars, points)?;
    Ok(Zip::from(scalars)
        .and(points)
        .par_map_collect(|scalar, point| Scalar::from(*scalar) * point))
}

/// Checks two point matrices for elementwise equality.
pub fn points_equal(a: &PointMatrix, b: &PointMatrix) -> bool {
    a.dim() == b.dim() && a.iter().zip(b.iter()).all(|(x, y)| x == y)
}

/// Sums point matrices elementwise, starting from the identity.
///
/// # Errors
/// Fails if any matrix is not `n×n`.
pub fn sum_points<'a, I>(matrices: I, n: usize) -> Result<PointMatrix>
where
    I: IntoIterator<Item = &'a PointMatrix>,
{
    matrices.into_iter().try_fold(
        Array2::from_elem((n, n), RistrettoPoint::identity()),
        |acc, matrix| point_add(&acc, matrix),
    )
}

#[derive(AsRef, From, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
/// The wire form of a [`PointMatrix`].
///
/// Decompression validates that every cell encodes a group element.
pub struct CompressedPointMatrix(Array2<CompressedRistretto>);

impl From<&PointMatrix> for CompressedPointMatrix {
    fn from(points: &PointMatrix) -> Self {
        Self(Zip::from(points).par_map_collect(|point| point.compress()))
    }
}

impl CompressedPointMatrix {
    /// Gets the shape of the matrix.
    pub fn dim(&self) -> (usize, usize) {
        self.0.dim()
    }

    /// Decompresses all cells.
    ///
    /// # Errors
    /// Fails with [`ProtocolError::InvalidPoint`] if any cell is not a valid encoding.
    pub fn decompress(&self) -> Result<PointMatrix> {
        let points = Zip::from(&self.0)
            .par_map_collect(|compressed| compressed.decompress())
            .iter()
            .copied()
            .collect::<Option<Vec<_>>>()
            .ok_or(ProtocolError::InvalidPoint)?;
        let (rows, cols) = self.0.dim();
        Array2::from_shape_vec((rows, cols), points).map_err(|_| ProtocolError::ShapeMismatch {
            expected: rows,
            rows,
            cols,
        })
    }
}
