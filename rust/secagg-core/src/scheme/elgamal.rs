//! The classic scheme.
//!
//! The scheme instance holds a prime modulus `p`, a generator `g` and a blinding matrix `K`
//! which is invertible modulo `p`. Every participant samples the secrets `x_i, y_i` from
//! `[1, p-2]` and publishes `X_i = g^x_i`, `Y_i = g^y_i`. The collective key of a participant
//! set is `X = ΠX_i`, `Y = ΠY_i`.
//!
//! Real weights are quantized to fixed-point integers with [`ElGamalConfig::scale`] steps per
//! unit before they are embedded into the group, and the aggregate is scaled back.
//!
//! A participant with weights `W_i` draws fresh bounded noise `r_i` and sends
//! ```text
//! M_i = g^r_i · X^y_i    H_i = (Y^x_i)^-1    S_i = W_i·K + r_i    (mod p)
//! ```
//! Since `Π(M_i·H_i) = g^(Σr_i) · g^(Σy_i·Σx_j − Σx_i·Σy_j) = g^(Σr_i)`, the server recovers
//! `R = Σr_i` cellwise by a bounded search and reconstructs `ΣW_i = (ΣS_i − R)·K⁻¹`.
//!
//! The setup phase of this scheme is empty: the round key is the collective key.

use ndarray::{Array2, Zip};
use num::{bigint::BigUint, traits::One};
use rand::{CryptoRng, RngCore};
use tracing::debug;

use crate::{
    crypto::{
        ensure_square,
        generate_bounded_matrix,
        generate_integer,
        mod_inverse,
        mod_pow,
        modular::{mat_add_mod, mat_hadamard_mod, mat_mul_mod, to_residues},
        ModularGroup,
    },
    keys::{generate_invertible_matrix, MaskingMatrices, ModularDomain},
    recovery::{recover_mask_exponent, search_bound, DiscreteLogTable},
    scheme::{selected_shares, Contributions, ElGamalConfig, GroupContext, SecureAggregationScheme},
    Participant,
    ParticipantId,
    ParticipantSet,
    ProtocolError,
    PublicKeyShares,
    Result,
    Scoped,
    weights::{dequantize, quantize},
};

/// Recovers `d < bound` with `g^d == value (mod p)`.
///
/// # Errors
/// Fails if there is no such `d` or more than one.
pub fn recover_exponent(group: &ModularGroup, value: &BigUint, bound: u64) -> Result<u64> {
    recover_mask_exponent(group.powers(), value, bound)
}

/// The secrets `x_i, y_i` of a participant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElGamalSecrets {
    /// The participant.
    pub id: ParticipantId,
    x: BigUint,
    y: BigUint,
}

impl Participant for ElGamalSecrets {
    fn id(&self) -> ParticipantId {
        self.id
    }
}

/// The published public key share `(X_i, Y_i)` of a participant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElGamalPublicKeyShare {
    pub x: BigUint,
    pub y: BigUint,
}

/// The collective key `(X, Y)` of a participant set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElGamalCollectiveKey {
    participants: ParticipantSet,
    x: BigUint,
    y: BigUint,
}

impl Scoped for ElGamalCollectiveKey {
    fn participants(&self) -> &ParticipantSet {
        &self.participants
    }
}

/// The masked weights of a participant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElGamalMessage {
    /// `M_i = g^r_i · X^y_i`.
    pub m: Array2<BigUint>,
    /// `H_i = (Y^x_i)^-1`.
    pub h: BigUint,
    /// `S_i = W_i·K + r_i`.
    pub s: Array2<BigUint>,
}

/// The combination `S = ΣS_i`, `C = Π(M_i·H_i)` of all messages of a round.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElGamalCombined {
    s: Array2<BigUint>,
    c: Array2<BigUint>,
}

/// The classic scheme.
#[derive(Clone, Debug)]
pub struct ElGamalScheme {
    config: ElGamalConfig,
    group: ModularGroup,
    blinding: MaskingMatrices<BigUint>,
}

impl ElGamalScheme {
    /// Creates a protocol instance with a fresh prime and blinding matrix.
    ///
    /// # Errors
    /// Fails if the configuration is invalid or no invertible blinding matrix was found.
    pub fn new<R: RngCore + CryptoRng>(config: ElGamalConfig, rng: &mut R) -> Result<Self> {
        config.validate()?;
        let group = ModularGroup::generate(config.prime_bits, config.generator, rng)?;
        Self::with_group(config, group, rng)
    }

    /// Creates a protocol instance over known group parameters.
    ///
    /// # Errors
    /// Fails if the configuration is invalid or no invertible blinding matrix was found.
    pub fn with_group<R: RngCore + CryptoRng>(
        config: ElGamalConfig,
        group: ModularGroup,
        rng: &mut R,
    ) -> Result<Self> {
        config.validate()?;
        let domain = ModularDomain {
            modulus: &group.p,
            min: config.min_val,
            max: config.max_val,
        };
        let blinding = generate_invertible_matrix(&domain, config.matrix_size, rng)?;
        debug!("set up the classic scheme over {}", group);
        Ok(Self {
            config,
            group,
            blinding,
        })
    }

    /// Gets the configuration.
    pub fn config(&self) -> &ElGamalConfig {
        &self.config
    }

    /// Samples an exponent from `[1, p-2]`.
    fn generate_exponent<R: RngCore + CryptoRng>(&self, rng: &mut R) -> BigUint {
        let two = BigUint::from(2_u8);
        generate_integer(rng, &(&self.group.p - two)) + BigUint::one()
    }
}

impl SecureAggregationScheme for ElGamalScheme {
    type Weight = f64;
    type Secrets = ElGamalSecrets;
    type PublicKeyShare = ElGamalPublicKeyShare;
    type CollectiveKey = ElGamalCollectiveKey;
    type SetupMessage = ();
    type RoundKey = ElGamalCollectiveKey;
    type EncodedMessage = ElGamalMessage;
    type Combined = ElGamalCombined;
    type Mask = Array2<u64>;

    fn group_context(&self) -> GroupContext {
        GroupContext::Modular(self.group.clone())
    }

    fn matrix_size(&self) -> usize {
        self.config.matrix_size
    }

    fn generate_participant<R: RngCore + CryptoRng>(&self, id: ParticipantId, rng: &mut R) -> Result<ElGamalSecrets> {
        Ok(ElGamalSecrets {
            id,
            x: self.generate_exponent(rng),
            y: self.generate_exponent(rng),
        })
    }

    fn derive_public_key_share(&self, secrets: &ElGamalSecrets) -> Result<ElGamalPublicKeyShare> {
        Ok(ElGamalPublicKeyShare {
            x: self.group.pow(&secrets.x),
            y: self.group.pow(&secrets.y),
        })
    }

    fn derive_collective_key(
        &self,
        participants: &ParticipantSet,
        shares: &PublicKeyShares<ElGamalPublicKeyShare>,
    ) -> Result<ElGamalCollectiveKey> {
        let p = &self.group.p;
        let selected = selected_shares(participants, shares)?;
        let (x, y) = selected
            .iter()
            .fold((BigUint::one(), BigUint::one()), |(x, y), share| {
                ((x * &share.x) % p, (y * &share.y) % p)
            });
        Ok(ElGamalCollectiveKey {
            participants: participants.clone(),
            x,
            y,
        })
    }

    fn encode_setup<R: RngCore + CryptoRng>(
        &self,
        _secrets: &ElGamalSecrets,
        _key: &ElGamalCollectiveKey,
        _rng: &mut R,
    ) -> Result<()> {
        Ok(())
    }

    fn decode_setup(&self, key: ElGamalCollectiveKey, messages: Contributions<()>) -> Result<ElGamalCollectiveKey> {
        messages.ensure_complete_for(&key)?;
        Ok(key)
    }

    fn encode<R: RngCore + CryptoRng>(
        &self,
        secrets: &ElGamalSecrets,
        key: &ElGamalCollectiveKey,
        weights: &Array2<f64>,
        rng: &mut R,
    ) -> Result<ElGamalMessage> {
        let n = self.config.matrix_size;
        ensure_square(weights, n)?;
        let p = &self.group.p;
        let quantized = quantize(weights, self.config.scale)?;
        let half = p >> 1_usize;
        if quantized.iter().any(|w| BigUint::from(w.unsigned_abs()) >= half) {
            return Err(ProtocolError::WeightOutOfRange);
        }

        let noise = generate_bounded_matrix(rng, n, self.config.min_val, self.config.max_val);
        let x_to_y = mod_pow(&key.x, &secrets.y, p);
        let m = Zip::from(&noise).par_map_collect(|r| (self.group.pow(&BigUint::from(*r)) * &x_to_y) % p);
        let h = mod_inverse(&mod_pow(&key.y, &secrets.x, p), p)?;

        let embedded = quantized.map(|w| self.group.embed(*w));
        let s = mat_add_mod(
            &mat_mul_mod(&embedded, &self.blinding.forward, p)?,
            &to_residues(&noise, p),
            p,
        );
        Ok(ElGamalMessage { m, h, s })
    }

    fn combine(&self, key: &ElGamalCollectiveKey, messages: Contributions<ElGamalMessage>) -> Result<ElGamalCombined> {
        messages.ensure_complete_for(key)?;
        let n = self.config.matrix_size;
        let p = &self.group.p;
        let init = ElGamalCombined {
            s: Array2::from_elem((n, n), BigUint::from(0_u8)),
            c: Array2::from_elem((n, n), BigUint::one()),
        };
        messages.messages().try_fold(init, |combined, message| {
            ensure_square(&message.m, n)?;
            ensure_square(&message.s, n)?;
            if &message.h >= p {
                return Err(ProtocolError::MalformedMessage("H_i is not reduced modulo p"));
            }
            let masked = message.m.map(|m| (m * &message.h) % p);
            Ok(ElGamalCombined {
                s: mat_add_mod(&combined.s, &message.s, p),
                c: mat_hadamard_mod(&combined.c, &masked, p),
            })
        })
    }

    fn recover_mask(&self, key: &ElGamalCollectiveKey, combined: &ElGamalCombined) -> Result<Array2<u64>> {
        let bound = search_bound(self.config.max_val, key.participants.len());
        let table = DiscreteLogTable::new(self.group.powers(), bound);
        table.recover_matrix(&combined.c, BigUint::clone)
    }

    fn reconstruct_sum(
        &self,
        _key: &ElGamalCollectiveKey,
        combined: ElGamalCombined,
        mask: Array2<u64>,
    ) -> Result<Array2<f64>> {
        ensure_square(&mask, self.config.matrix_size)?;
        let p = &self.group.p;
        let unmasked = Zip::from(&combined.s)
            .and(&mask)
            .par_map_collect(|s, r| (s + p - BigUint::from(*r) % p) % p);
        let sum = mat_mul_mod(&unmasked, &self.blinding.inverse, p)?;
        let lifted = sum.iter().map(|cell| self.group.lift(cell)).collect::<Result<Vec<_>>>()?;
        let lifted = Array2::from_shape_vec(sum.dim(), lifted).map_err(|_| ProtocolError::ShapeMismatch {
            expected: self.config.matrix_size,
            rows: sum.nrows(),
            cols: sum.ncols(),
        })?;
        Ok(dequantize(&lifted, self.config.scale))
    }
}
