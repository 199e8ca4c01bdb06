//! Packing of model weights into square matrices.
//!
//! The protocol only ever sees `n×n` matrices. The model weights of a participant are
//! flattened layer by layer, packed row-major into such a matrix and padded with zeros. The
//! aggregate matrix is split back into per-layer tensors by the recorded [`ModelShapes`].

use std::{
    fmt::Debug,
    ops::{Add, Sub},
};

use ndarray::{Array2, ArrayD, IxDyn};
use num::traits::Zero;
use rand::Rng;

use crate::{ProtocolError, Result};

/// A numeric weight type.
pub trait Weight:
    Copy + Debug + PartialEq + Zero + Add<Output = Self> + Sub<Output = Self> + Send + Sync + 'static
{
    /// Converts an integer into a weight.
    fn from_i64(value: i64) -> Self;

    /// Checks equality up to the precision of the type.
    fn approx_eq(&self, other: &Self) -> bool;

    /// Samples a weight from `[min, max]`.
    fn random<R: Rng + ?Sized>(rng: &mut R, min: i64, max: i64) -> Self;
}

impl Weight for f64 {
    fn from_i64(value: i64) -> Self {
        value as f64
    }

    fn approx_eq(&self, other: &Self) -> bool {
        // relative to the magnitude, but never stricter than an absolute 1e-6
        (self - other).abs() <= 1e-6 * self.abs().max(other.abs()).max(1.)
    }

    fn random<R: Rng + ?Sized>(rng: &mut R, min: i64, max: i64) -> Self {
        rng.gen_range(min as f64..=max as f64)
    }
}

impl Weight for i64 {
    fn from_i64(value: i64) -> Self {
        value
    }

    fn approx_eq(&self, other: &Self) -> bool {
        self == other
    }

    fn random<R: Rng + ?Sized>(rng: &mut R, min: i64, max: i64) -> Self {
        rng.gen_range(min..=max)
    }
}

/// Checks two matrices for approximate equality.
pub fn matrices_approx_eq<W: Weight>(a: &Array2<W>, b: &Array2<W>) -> bool {
    a.dim() == b.dim() && a.iter().zip(b.iter()).all(|(x, y)| x.approx_eq(y))
}

/// Converts real weights into fixed-point integers with `scale` steps per unit.
///
/// Each weight is rounded to the nearest step, so a dequantized weight is off by at most
/// `0.5 / scale`.
///
/// # Errors
/// Fails if a weight is not finite or its scaled value exceeds the range of `i64`.
pub fn quantize(weights: &Array2<f64>, scale: u64) -> Result<Array2<i64>> {
    let scale = scale as f64;
    // i64::MAX is not representable, its nearest f64 is 2^63
    let limit = i64::MAX as f64;
    let scaled = weights.map(|w| (w * scale).round());
    if scaled.iter().any(|w| !w.is_finite() || w.abs() >= limit) {
        return Err(ProtocolError::WeightOutOfRange);
    }
    Ok(scaled.map(|w| *w as i64))
}

/// Converts fixed-point integers with `scale` steps per unit back into real weights.
pub fn dequantize(values: &Array2<i64>, scale: u64) -> Array2<f64> {
    let scale = scale as f64;
    values.map(|v| *v as f64 / scale)
}

/// The layer shapes of a model.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelShapes {
    shapes: Vec<Vec<usize>>,
    flat_len: usize,
}

impl ModelShapes {
    /// Creates the model info from the layer shapes.
    pub fn new(shapes: Vec<Vec<usize>>) -> Self {
        let flat_len = shapes.iter().map(|shape| shape.iter().product::<usize>()).sum();
        Self { shapes, flat_len }
    }

    /// Records the shapes of the given layers.
    pub fn of<W>(layers: &[ArrayD<W>]) -> Self {
        Self::new(layers.iter().map(|layer| layer.shape().to_vec()).collect())
    }

    /// Gets the layer shapes.
    pub fn shapes(&self) -> &[Vec<usize>] {
        &self.shapes
    }

    /// Gets the total number of weights.
    pub fn flat_len(&self) -> usize {
        self.flat_len
    }
}

/// Flattens the layers in order, each in row-major order.
pub fn flatten_layers<W: Weight>(layers: &[ArrayD<W>]) -> Vec<W> {
    layers.iter().flat_map(|layer| layer.iter().copied()).collect()
}

/// Packs a flat weight vector row-major into an `n×n` matrix, padding with zeros.
///
/// # Errors
/// Fails with [`ProtocolError::DimensionMismatch`] if the vector has more than `n²` entries.
pub fn weights_to_matrix<W: Weight>(flat: &[W], n: usize) -> Result<Array2<W>> {
    let capacity = n * n;
    if flat.len() > capacity {
        return Err(ProtocolError::DimensionMismatch {
            expected: capacity,
            actual: flat.len(),
        });
    }
    Ok(Array2::from_shape_fn((n, n), |(i, j)| {
        flat.get(i * n + j).copied().unwrap_or_else(W::zero)
    }))
}

/// Splits the row-major cells of a matrix into tensors of the given shapes.
///
/// Padding cells beyond [`ModelShapes::flat_len`] are dropped.
///
/// # Errors
/// Fails with [`ProtocolError::DimensionMismatch`] if the shapes need more cells than the
/// matrix has.
pub fn matrix_to_weight_shapes<W: Weight>(matrix: &Array2<W>, shapes: &ModelShapes) -> Result<Vec<ArrayD<W>>> {
    if shapes.flat_len() > matrix.len() {
        return Err(ProtocolError::DimensionMismatch {
            expected: matrix.len(),
            actual: shapes.flat_len(),
        });
    }
    let mut cells = matrix.iter().copied();
    shapes
        .shapes()
        .iter()
        .map(|shape| {
            let len = shape.iter().product::<usize>();
            let values = cells.by_ref().take(len).collect::<Vec<_>>();
            let actual = values.len();
            ArrayD::from_shape_vec(IxDyn(shape), values)
                .map_err(|_| ProtocolError::DimensionMismatch { expected: len, actual })
        })
        .collect()
}
