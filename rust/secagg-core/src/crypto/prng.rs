//! PRNG utilities for the arithmetic primitives.
//!
//! See the [crypto module] documentation since this is a private module anyways.
//!
//! [crypto module]: crate::crypto

use ndarray::Array2;
use num::{bigint::BigUint, traits::identities::Zero};
use rand::{Rng, RngCore};

/// Generates a secure pseudo-random integer.
///
/// Draws from a uniform distribution over the integers between zero (included) and
/// `max_int` (excluded) by rejection sampling.
pub fn generate_integer<R: RngCore + ?Sized>(prng: &mut R, max_int: &BigUint) -> BigUint {
    if max_int.is_zero() {
        return BigUint::zero();
    }
    let mut bytes = max_int.to_bytes_le();
    let mut rand_int = max_int.clone();
    while &rand_int >= max_int {
        prng.fill_bytes(&mut bytes);
        rand_int = BigUint::from_bytes_le(&bytes);
    }
    rand_int
}

/// Generates an `n×n` matrix with cells drawn uniformly from `[min, max]`.
pub fn generate_bounded_matrix<R: Rng + ?Sized>(
    prng: &mut R,
    n: usize,
    min: u64,
    max: u64,
) -> Array2<u64> {
    Array2::from_shape_simple_fn((n, n), || prng.gen_range(min..=max))
}
