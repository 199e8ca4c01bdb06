//! Configuration of the schemes.

use crate::{ProtocolError, Result};

/// The default dimension of the weight matrices.
pub const DEFAULT_MATRIX_SIZE: usize = 8;

/// How the elliptic-curve scheme agrees on the blinding matrices `M` and `N`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseOneMode {
    /// The private parameters are blinded and the blinding is recovered by the server.
    Full,
    /// The private parameters are sent in the clear and summed by the server.
    Short,
}

impl Default for PhaseOneMode {
    fn default() -> Self {
        Self::Full
    }
}

/// The configuration of the elliptic-curve scheme.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EccConfig {
    /// The dimension `n` of the `n×n` weight matrices.
    pub matrix_size: usize,
    /// The lower bound of the sampled scalars.
    pub min_val: u64,
    /// The upper bound of the sampled scalars.
    pub max_val: u64,
    /// The variant of the setup phase.
    pub phase_one: PhaseOneMode,
}

impl Default for EccConfig {
    fn default() -> Self {
        Self {
            matrix_size: DEFAULT_MATRIX_SIZE,
            min_val: 1,
            max_val: 124,
            phase_one: PhaseOneMode::Full,
        }
    }
}

impl EccConfig {
    /// Checks the configuration.
    ///
    /// # Errors
    /// Fails with [`ProtocolError::InvalidConfig`] if the matrices are empty or the scalar range
    /// is empty.
    pub fn validate(&self) -> Result<()> {
        validate_common(self.matrix_size, self.min_val, self.max_val)
    }
}

/// The default fixed-point resolution of the classic scheme.
pub const DEFAULT_SCALE: u64 = 1_000_000_000;

/// The smallest accepted bit length of the prime modulus.
pub const MIN_PRIME_BITS: usize = 32;

/// The configuration of the classic scheme.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElGamalConfig {
    /// The dimension `n` of the `n×n` weight matrices.
    pub matrix_size: usize,
    /// The lower bound of the sampled noise and blinding cells.
    pub min_val: u64,
    /// The upper bound of the sampled noise and blinding cells.
    pub max_val: u64,
    /// The bit length of the prime modulus.
    pub prime_bits: usize,
    /// The generator of the multiplicative group.
    pub generator: u64,
    /// The number of fixed-point steps per unit of a weight.
    ///
    /// Every sum of quantized weights of a round must stay below `p/2` in absolute value.
    pub scale: u64,
}

impl Default for ElGamalConfig {
    fn default() -> Self {
        Self {
            matrix_size: DEFAULT_MATRIX_SIZE,
            min_val: 1,
            max_val: 10,
            prime_bits: 256,
            generator: 2,
            scale: DEFAULT_SCALE,
        }
    }
}

impl ElGamalConfig {
    /// Checks the configuration.
    ///
    /// # Errors
    /// Fails with [`ProtocolError::InvalidConfig`] if the matrices are empty, the noise range is
    /// empty, the generator is below 2, the prime is shorter than [`MIN_PRIME_BITS`] or the
    /// scale is zero.
    pub fn validate(&self) -> Result<()> {
        validate_common(self.matrix_size, self.min_val, self.max_val)?;
        if self.generator < 2 {
            return Err(ProtocolError::InvalidConfig("the generator must be at least 2"));
        }
        if self.prime_bits < MIN_PRIME_BITS {
            return Err(ProtocolError::InvalidConfig("the prime needs at least 32 bits"));
        }
        if self.scale == 0 {
            return Err(ProtocolError::InvalidConfig("the scale must be positive"));
        }
        Ok(())
    }
}

fn validate_common(matrix_size: usize, min_val: u64, max_val: u64) -> Result<()> {
    if matrix_size == 0 {
        return Err(ProtocolError::InvalidConfig("the matrix size must be positive"));
    }
    if min_val > max_val {
        return Err(ProtocolError::InvalidConfig("min_val must not exceed max_val"));
    }
    Ok(())
}
