//! Modular arithmetic for the classic scheme.
//!
//! See the [crypto module] documentation since this is a private module anyways.
//!
//! [crypto module]: crate::crypto

use std::{fmt, iter};

use ndarray::{Array2, Zip};
use num::{
    bigint::{BigInt, BigUint, ToBigUint},
    integer::Integer,
    traits::{One, ToPrimitive, Zero},
};
use num_bigint_dig::RandPrime;
use rand::Rng;

use crate::{crypto::ensure_square, ProtocolError, Result};

/// The group parameters of the classic scheme: a generator `g` of the multiplicative group
/// modulo the prime `p`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModularGroup {
    /// The generator.
    pub g: BigUint,
    /// The prime modulus.
    pub p: BigUint,
}

impl fmt::Display for ModularGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g = {}, p = {} ({} bits)", self.g, self.p, self.p.bits())
    }
}

impl ModularGroup {
    /// Creates the group parameters from a random prime of `bits` bits.
    ///
    /// # Errors
    /// Fails if the generator does not lie in `[2, p-2]` for the generated prime or if fewer
    /// than 3 bits are requested.
    pub fn generate<R: Rng + ?Sized>(bits: usize, g: u64, rng: &mut R) -> Result<Self> {
        if bits < 3 {
            return Err(ProtocolError::InvalidConfig("the prime needs at least 3 bits"));
        }
        let prime: num_bigint_dig::BigUint = rng.gen_prime(bits);
        let p = BigUint::from_bytes_le(&prime.to_bytes_le());
        Self::new(BigUint::from(g), p)
    }

    /// Creates the group parameters from a known prime.
    ///
    /// # Errors
    /// Fails if the generator does not lie in `[2, p-2]`.
    pub fn new(g: BigUint, p: BigUint) -> Result<Self> {
        if g < BigUint::from(2_u8) || &g + BigUint::from(2_u8) > p {
            return Err(ProtocolError::InvalidConfig("the generator must lie in [2, p-2]"));
        }
        Ok(Self { g, p })
    }

    /// Computes `g^exponent mod p`.
    pub fn pow(&self, exponent: &BigUint) -> BigUint {
        mod_pow(&self.g, exponent, &self.p)
    }

    /// Iterates over the powers `g^0, g^1, g^2, ...` modulo `p`.
    pub fn powers(&self) -> impl Iterator<Item = BigUint> + '_ {
        iter::successors(Some(BigUint::one()), move |acc| Some((acc * &self.g) % &self.p))
    }

    /// Maps a signed integer into `Z_p`.
    pub fn embed(&self, value: i64) -> BigUint {
        // the modulus is positive, hence the floored remainder is non-negative
        BigInt::from(value)
            .mod_floor(&BigInt::from(self.p.clone()))
            .to_biguint()
            .unwrap_or_default()
    }

    /// Maps an element of `Z_p` back to the signed integer of least absolute value.
    ///
    /// # Errors
    /// Fails if that integer does not fit into an `i64`.
    pub fn lift(&self, value: &BigUint) -> Result<i64> {
        let value = value % &self.p;
        let signed = if value > &self.p >> 1_usize {
            -BigInt::from(&self.p - value)
        } else {
            BigInt::from(value)
        };
        signed
            .to_i64()
            .ok_or(ProtocolError::MalformedMessage("the aggregate exceeds the i64 range"))
    }
}

/// Computes `base^exponent mod modulus`.
///
/// # Panics
/// Panics if the modulus is zero.
pub fn mod_pow(base: &BigUint, exponent: &BigUint, modulus: &BigUint) -> BigUint {
    base.modpow(exponent, modulus)
}

/// Computes the inverse of `value` modulo `modulus`.
///
/// # Errors
/// Fails with [`ProtocolError::NoInverse`] if `value` and `modulus` are not coprime.
pub fn mod_inverse(value: &BigUint, modulus: &BigUint) -> Result<BigUint> {
    if modulus.is_zero() {
        return Err(ProtocolError::NoInverse);
    }
    let modulus = BigInt::from(modulus.clone());
    let value = BigInt::from(value.clone()).mod_floor(&modulus);
    let egcd = value.extended_gcd(&modulus);
    if !egcd.gcd.is_one() {
        return Err(ProtocolError::NoInverse);
    }
    egcd.x
        .mod_floor(&modulus)
        .to_biguint()
        .ok_or(ProtocolError::NoInverse)
}

/// Multiplies two matrices modulo `modulus`.
///
/// # Errors
/// Fails if the inner dimensions don't match.
pub fn mat_mul_mod(a: &Array2<BigUint>, b: &Array2<BigUint>, modulus: &BigUint) -> Result<Array2<BigUint>> {
    let (rows, inner) = a.dim();
    if b.nrows() != inner {
        return Err(ProtocolError::ShapeMismatch {
            expected: inner,
            rows: b.nrows(),
            cols: b.ncols(),
        });
    }
    Ok(Array2::from_shape_fn((rows, b.ncols()), |(i, j)| {
        (0..inner).fold(BigUint::zero(), |acc, k| acc + &a[[i, k]] * &b[[k, j]]) % modulus
    }))
}

/// Adds two matrices elementwise modulo `modulus`.
pub(crate) fn mat_add_mod(a: &Array2<BigUint>, b: &Array2<BigUint>, modulus: &BigUint) -> Array2<BigUint> {
    Zip::from(a).and(b).par_map_collect(|x, y| (x + y) % modulus)
}

/// Multiplies two matrices elementwise modulo `modulus`.
pub(crate) fn mat_hadamard_mod(
    a: &Array2<BigUint>,
    b: &Array2<BigUint>,
    modulus: &BigUint,
) -> Array2<BigUint> {
    Zip::from(a).and(b).par_map_collect(|x, y| (x * y) % modulus)
}

/// Inverts a square matrix modulo the prime `modulus` by Gauss-Jordan elimination.
///
/// # Errors
/// Fails with [`ProtocolError::NoInverse`] if the matrix is singular modulo `modulus`.
pub fn invert_matrix_mod(matrix: &Array2<BigUint>, modulus: &BigUint) -> Result<Array2<BigUint>> {
    let n = matrix.nrows();
    ensure_square(matrix, n)?;

    // augmented matrix [matrix | identity]
    let mut aug = Array2::from_shape_fn((n, 2 * n), |(i, j)| {
        if j < n {
            &matrix[[i, j]] % modulus
        } else if j - n == i {
            BigUint::one()
        } else {
            BigUint::zero()
        }
    });

    for col in 0..n {
        let pivot = (col..n)
            .find(|&row| !aug[[row, col]].is_zero())
            .ok_or(ProtocolError::NoInverse)?;
        if pivot != col {
            for j in 0..2 * n {
                aug.swap([pivot, j], [col, j]);
            }
        }

        let inverse = mod_inverse(&aug[[col, col]], modulus)?;
        for j in 0..2 * n {
            aug[[col, j]] = (&aug[[col, j]] * &inverse) % modulus;
        }

        for row in (0..n).filter(|&row| row != col) {
            let factor = aug[[row, col]].clone();
            if factor.is_zero() {
                continue;
            }
            for j in 0..2 * n {
                let sub = (&factor * &aug[[col, j]]) % modulus;
                aug[[row, j]] = (&aug[[row, j]] + modulus - sub) % modulus;
            }
        }
    }

    Ok(Array2::from_shape_fn((n, n), |(i, j)| aug[[i, n + j]].clone()))
}

/// Lifts a matrix of non-negative integers into `Z_p`.
pub(crate) fn to_residues(matrix: &Array2<u64>, modulus: &BigUint) -> Array2<BigUint> {
    matrix.map(|cell| BigUint::from(*cell) % modulus)
}

/// Checks whether `value` is the identity matrix.
pub(crate) fn is_identity_mod(value: &Array2<BigUint>) -> bool {
    value
        .indexed_iter()
        .all(|((i, j), cell)| if i == j { cell.is_one() } else { cell.is_zero() })
}
