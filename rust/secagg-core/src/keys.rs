//! Generation of invertible masking matrices.
//!
//! Both schemes blind their inputs with a matrix that must be invertible over the domain the
//! matrix is used in:
//! - the elliptic-curve scheme uses a real basis matrix `S` (and `S⁻¹`) to derive the private
//!   parameters of every participant;
//! - the classic scheme right-multiplies every weight matrix by `K` modulo `p` and the server
//!   undoes that with `K⁻¹`.
//!
//! Candidates are sampled until one has a verified inverse. The number of attempts is bounded
//! by [`MAX_INVERTIBLE_ATTEMPTS`].

use ndarray::Array2;
use num::bigint::BigUint;
use rand::Rng;
use tracing::debug;

use crate::{
    crypto::{generate_bounded_matrix, linalg, modular},
    ProtocolError,
    Result,
};

/// The maximal number of candidates sampled by [`generate_invertible_matrix`].
pub const MAX_INVERTIBLE_ATTEMPTS: usize = 1_000;

/// A matrix together with its inverse.
#[derive(Clone, Debug, PartialEq)]
pub struct MaskingMatrices<T> {
    /// The masking matrix.
    pub forward: Array2<T>,
    /// The inverse of the masking matrix.
    pub inverse: Array2<T>,
}

/// A numeric domain in which masking matrices are sampled and inverted.
pub trait InvertibleDomain {
    /// The type of the matrix cells.
    type Elem;

    /// Samples a random `n×n` candidate matrix.
    fn sample<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Array2<Self::Elem>;

    /// Computes the inverse of `matrix`.
    ///
    /// # Errors
    /// Fails with [`ProtocolError::NoInverse`] if the matrix is singular in this domain.
    fn invert(&self, matrix: &Array2<Self::Elem>) -> Result<Array2<Self::Elem>>;

    /// Checks that `forward · inverse` is the identity in this domain.
    fn verify(&self, forward: &Array2<Self::Elem>, inverse: &Array2<Self::Elem>) -> bool;
}

/// Real matrices with integer cells sampled from `[min, max]`.
#[derive(Clone, Copy, Debug)]
pub struct RealDomain {
    pub min: u64,
    pub max: u64,
}

impl InvertibleDomain for RealDomain {
    type Elem = f64;

    fn sample<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Array2<f64> {
        generate_bounded_matrix(rng, n, self.min, self.max).mapv(|cell| cell as f64)
    }

    fn invert(&self, matrix: &Array2<f64>) -> Result<Array2<f64>> {
        linalg::invert(matrix)
    }

    fn verify(&self, forward: &Array2<f64>, inverse: &Array2<f64>) -> bool {
        linalg::is_identity(&forward.dot(inverse))
    }
}

/// Matrices over `Z_p` with cells sampled from `[min, max]`.
#[derive(Clone, Copy, Debug)]
pub struct ModularDomain<'a> {
    pub modulus: &'a BigUint,
    pub min: u64,
    pub max: u64,
}

impl InvertibleDomain for ModularDomain<'_> {
    type Elem = BigUint;

    fn sample<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Array2<BigUint> {
        modular::to_residues(&generate_bounded_matrix(rng, n, self.min, self.max), self.modulus)
    }

    fn invert(&self, matrix: &Array2<BigUint>) -> Result<Array2<BigUint>> {
        modular::invert_matrix_mod(matrix, self.modulus)
    }

    fn verify(&self, forward: &Array2<BigUint>, inverse: &Array2<BigUint>) -> bool {
        modular::mat_mul_mod(forward, inverse, self.modulus)
            .map(|product| modular::is_identity_mod(&product))
            .unwrap_or(false)
    }
}

/// Samples `n×n` matrices in the given domain until one has a verified inverse.
///
/// # Errors
/// Fails with [`ProtocolError::KeyGenerationFailure`] if no invertible candidate was found
/// within [`MAX_INVERTIBLE_ATTEMPTS`] attempts.
pub fn generate_invertible_matrix<D, R>(domain: &D, n: usize, rng: &mut R) -> Result<MaskingMatrices<D::Elem>>
where
    D: InvertibleDomain,
    R: Rng + ?Sized,
{
    for attempt in 1..=MAX_INVERTIBLE_ATTEMPTS {
        let forward = domain.sample(n, rng);
        match domain.invert(&forward) {
            Ok(inverse) if domain.verify(&forward, &inverse) => {
                debug!("found an invertible {}x{} matrix after {} attempt(s)", n, n, attempt);
                return Ok(MaskingMatrices { forward, inverse });
            }
            Ok(_) => debug!("discarding an ill-conditioned candidate"),
            Err(_) => debug!("discarding a singular candidate"),
        }
    }
    Err(ProtocolError::KeyGenerationFailure {
        attempts: MAX_INVERTIBLE_ATTEMPTS,
    })
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;

    #[test]
    fn test_generate_real_invertible_matrix() {
        let mut rng = ChaCha20Rng::from_seed([0_u8; 32]);
        let domain = RealDomain { min: 1, max: 124 };
        for n in 1..6 {
            let MaskingMatrices { forward, inverse } =
                generate_invertible_matrix(&domain, n, &mut rng).unwrap();
            assert_eq!(forward.dim(), (n, n));
            assert!(linalg::is_identity(&forward.dot(&inverse)));
        }
    }

    #[test]
    fn test_generate_modular_invertible_matrix() {
        let mut rng = ChaCha20Rng::from_seed([1_u8; 32]);
        let modulus = BigUint::from(1_000_000_007_u64);
        let domain = ModularDomain {
            modulus: &modulus,
            min: 1,
            max: 10,
        };
        for n in 1..6 {
            let MaskingMatrices { forward, inverse } =
                generate_invertible_matrix(&domain, n, &mut rng).unwrap();
            assert!(modular::is_identity_mod(
                &modular::mat_mul_mod(&forward, &inverse, &modulus).unwrap()
            ));
        }
    }

    #[test]
    fn test_generation_gives_up() {
        let mut rng = ChaCha20Rng::from_seed([2_u8; 32]);
        // every candidate is the all-ones matrix, which is singular for n > 1
        let domain = RealDomain { min: 1, max: 1 };
        assert_eq!(
            generate_invertible_matrix(&domain, 2, &mut rng).unwrap_err(),
            ProtocolError::KeyGenerationFailure {
                attempts: MAX_INVERTIBLE_ATTEMPTS
            },
        );
        assert!(generate_invertible_matrix(&domain, 1, &mut rng).is_ok());
    }
}
