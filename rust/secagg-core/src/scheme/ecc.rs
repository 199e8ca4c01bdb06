//! The elliptic-curve scheme.
//!
//! # Setup
//! The scheme instance samples an invertible real basis `S`. Every participant samples the
//! scalar key share `(p_i, q_i, c_i, d_i)` and derives its private parameters
//! `m_i = U_i·S` and `n_i = V_i·S⁻¹` for bounded random integer matrices `U_i`, `V_i`. The
//! public key share is `(p_i·G, q_i·G, c_i·G, d_i·G)` and the collective key `(P, Q, C, D)`
//! is the elementwise point sum over the selected participants.
//!
//! # Phase one
//! Every round the participants agree on the blinding matrices `M = Σm_i` and `N = Σn_i`
//! without disclosing their private parameters. Each participant draws fresh `r_i, s_i` and
//! sends
//! ```text
//! A_i = m_i + r_i    R_i = r_i·G + q_i⊙P − p_i⊙Q
//! B_i = n_i + s_i    S_i = s_i·G + c_i⊙D − d_i⊙C
//! ```
//! The cross terms cancel in `ΣR_i = (Σr_i)·G` and `ΣS_i = (Σs_i)·G`, hence the server
//! recovers `Σr_i`, `Σs_i` by a bounded search and computes `M = ΣA_i − Σr_i`,
//! `N = ΣB_i − Σs_i`.
//!
//! In the [`PhaseOneMode::Short`] variant the participants send `m_i, n_i` directly.
//!
//! # Phase two
//! Each participant masks its weights as `T_i = W_i + m_i⊙N − n_i⊙M`. The masks cancel in the
//! sum `ΣT_i = ΣW_i + M⊙N − N⊙M = ΣW_i`.

use curve25519_dalek::ristretto::RistrettoPoint;
use ndarray::{Array2, Zip};
use rand::{CryptoRng, RngCore};
use tracing::debug;

use crate::{
    crypto::{
        curve::sum_points,
        ensure_square,
        generate_bounded_matrix,
        multiply_point_matrix,
        point_add,
        point_subtract,
        CompressedPointMatrix,
        EccGroup,
        PointMatrix,
    },
    keys::{generate_invertible_matrix, MaskingMatrices, RealDomain},
    recovery::{recover_mask_exponent, search_bound, DiscreteLogTable},
    scheme::{
        selected_shares,
        Contributions,
        EccConfig,
        GroupContext,
        PhaseOneMode,
        SecureAggregationScheme,
    },
    Participant,
    ParticipantId,
    ParticipantSet,
    ProtocolError,
    PublicKeyShares,
    Result,
    Scoped,
};

/// Recovers `d < bound` with `d·G == point`.
///
/// # Errors
/// Fails if there is no such `d`.
pub fn recover_scalar(group: &EccGroup, point: &RistrettoPoint, bound: u64) -> Result<u64> {
    recover_mask_exponent(group.multiples(), point, bound)
}

/// The scalar key share of a participant.
#[derive(Clone, Debug, PartialEq)]
struct KeyShare {
    p: Array2<u64>,
    q: Array2<u64>,
    c: Array2<u64>,
    d: Array2<u64>,
}

/// The private key share and private parameters of a participant.
#[derive(Clone, Debug, PartialEq)]
pub struct EccSecrets {
    /// The participant.
    pub id: ParticipantId,
    key_share: KeyShare,
    m: Array2<f64>,
    n: Array2<f64>,
}

impl Participant for EccSecrets {
    fn id(&self) -> ParticipantId {
        self.id
    }
}

/// The published public key share `(P_i, Q_i, C_i, D_i)` of a participant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EccPublicKeyShare {
    pub p: CompressedPointMatrix,
    pub q: CompressedPointMatrix,
    pub c: CompressedPointMatrix,
    pub d: CompressedPointMatrix,
}

/// The collective key `(P, Q, C, D)` of a participant set.
#[derive(Clone, Debug, PartialEq)]
pub struct EccCollectiveKey {
    participants: ParticipantSet,
    p: PointMatrix,
    q: PointMatrix,
    c: PointMatrix,
    d: PointMatrix,
}

impl Scoped for EccCollectiveKey {
    fn participants(&self) -> &ParticipantSet {
        &self.participants
    }
}

/// The phase one message of a participant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum EccSetupMessage {
    /// The blinded private parameters and the blinding points.
    Full {
        a: Array2<f64>,
        b: Array2<f64>,
        r: CompressedPointMatrix,
        s: CompressedPointMatrix,
    },
    /// The private parameters in the clear.
    Short { m: Array2<f64>, n: Array2<f64> },
}

/// The blinding matrices `M` and `N` of a round.
#[derive(Clone, Debug, PartialEq)]
pub struct EccRoundKey {
    participants: ParticipantSet,
    m: Array2<f64>,
    n: Array2<f64>,
}

impl Scoped for EccRoundKey {
    fn participants(&self) -> &ParticipantSet {
        &self.participants
    }
}

/// The elliptic-curve scheme.
#[derive(Clone, Debug)]
pub struct EccScheme {
    config: EccConfig,
    group: EccGroup,
    basis: MaskingMatrices<f64>,
}

impl EccScheme {
    /// Creates a protocol instance with a fresh basis.
    ///
    /// # Errors
    /// Fails if the configuration is invalid or no invertible basis was found.
    pub fn new<R: RngCore + CryptoRng>(config: EccConfig, rng: &mut R) -> Result<Self> {
        config.validate()?;
        let domain = RealDomain {
            min: config.min_val,
            max: config.max_val,
        };
        let basis = generate_invertible_matrix(&domain, config.matrix_size, rng)?;
        Ok(Self {
            config,
            group: EccGroup::default(),
            basis,
        })
    }

    /// Gets the configuration.
    pub fn config(&self) -> &EccConfig {
        &self.config
    }

    fn bounded_matrix<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Array2<u64> {
        generate_bounded_matrix(rng, self.config.matrix_size, self.config.min_val, self.config.max_val)
    }

    /// Computes `x·G + y⊙Y − z⊙Z`.
    fn blinding_points(
        &self,
        x: &Array2<u64>,
        y: &Array2<u64>,
        big_y: &PointMatrix,
        z: &Array2<u64>,
        big_z: &PointMatrix,
    ) -> Result<PointMatrix> {
        let sum = point_add(&self.group.scalar_multiply(x), &multiply_point_matrix(y, big_y)?)?;
        point_subtract(&sum, &multiply_point_matrix(z, big_z)?)
    }

    /// Recovers `Σx_i` from `Σ(x_i·G)` for each cell.
    fn recover_sums(&self, points: &PointMatrix, participants: usize) -> Result<Array2<u64>> {
        let bound = search_bound(self.config.max_val, participants);
        let table = DiscreteLogTable::new(
            self.group.multiples().map(|point| point.compress().to_bytes()),
            bound,
        );
        table.recover_matrix(points, |point| point.compress().to_bytes())
    }

    fn decode_full_setup(
        &self,
        participants: usize,
        messages: &Contributions<EccSetupMessage>,
    ) -> Result<(Array2<f64>, Array2<f64>)> {
        let n = self.config.matrix_size;
        let mut sum_a = Array2::<f64>::zeros((n, n));
        let mut sum_b = Array2::<f64>::zeros((n, n));
        let mut r_points = Vec::with_capacity(participants);
        let mut s_points = Vec::with_capacity(participants);
        for message in messages.messages() {
            match message {
                EccSetupMessage::Full { a, b, r, s } => {
                    ensure_square(a, n)?;
                    ensure_square(b, n)?;
                    sum_a += a;
                    sum_b += b;
                    r_points.push(r.decompress()?);
                    s_points.push(s.decompress()?);
                }
                EccSetupMessage::Short { .. } => {
                    return Err(ProtocolError::MalformedMessage("expected a full setup message"))
                }
            }
        }
        let sum_r = self.recover_sums(&sum_points(&r_points, n)?, participants)?;
        let sum_s = self.recover_sums(&sum_points(&s_points, n)?, participants)?;
        debug!("recovered the blinding of phase one");
        Ok((subtract_scalars(sum_a, &sum_r), subtract_scalars(sum_b, &sum_s)))
    }

    fn decode_short_setup(&self, messages: &Contributions<EccSetupMessage>) -> Result<(Array2<f64>, Array2<f64>)> {
        let n = self.config.matrix_size;
        let mut sum_m = Array2::<f64>::zeros((n, n));
        let mut sum_n = Array2::<f64>::zeros((n, n));
        for message in messages.messages() {
            match message {
                EccSetupMessage::Short { m, n: n_i } => {
                    ensure_square(m, n)?;
                    ensure_square(n_i, n)?;
                    sum_m += m;
                    sum_n += n_i;
                }
                EccSetupMessage::Full { .. } => {
                    return Err(ProtocolError::MalformedMessage("expected a short setup message"))
                }
            }
        }
        Ok((sum_m, sum_n))
    }
}

fn subtract_scalars(real: Array2<f64>, scalars: &Array2<u64>) -> Array2<f64> {
    Zip::from(&real)
        .and(scalars)
        .par_map_collect(|x, y| x - *y as f64)
}

fn sum_compressed<'a, I>(matrices: I, n: usize) -> Result<PointMatrix>
where
    I: Iterator<Item = &'a CompressedPointMatrix>,
{
    let points = matrices
        .map(CompressedPointMatrix::decompress)
        .collect::<Result<Vec<_>>>()?;
    sum_points(&points, n)
}

fn add_scalars(real: &Array2<f64>, scalars: &Array2<u64>) -> Array2<f64> {
    Zip::from(real)
        .and(scalars)
        .par_map_collect(|x, y| x + *y as f64)
}

impl SecureAggregationScheme for EccScheme {
    type Weight = f64;
    type Secrets = EccSecrets;
    type PublicKeyShare = EccPublicKeyShare;
    type CollectiveKey = EccCollectiveKey;
    type SetupMessage = EccSetupMessage;
    type RoundKey = EccRoundKey;
    type EncodedMessage = Array2<f64>;
    type Combined = Array2<f64>;
    type Mask = ();

    fn group_context(&self) -> GroupContext {
        GroupContext::Ecc(self.group.clone())
    }

    fn matrix_size(&self) -> usize {
        self.config.matrix_size
    }

    fn generate_participant<R: RngCore + CryptoRng>(&self, id: ParticipantId, rng: &mut R) -> Result<EccSecrets> {
        let key_share = KeyShare {
            p: self.bounded_matrix(rng),
            q: self.bounded_matrix(rng),
            c: self.bounded_matrix(rng),
            d: self.bounded_matrix(rng),
        };
        let u = self.bounded_matrix(rng).mapv(|cell| cell as f64);
        let v = self.bounded_matrix(rng).mapv(|cell| cell as f64);
        Ok(EccSecrets {
            id,
            key_share,
            m: u.dot(&self.basis.forward),
            n: v.dot(&self.basis.inverse),
        })
    }

    fn derive_public_key_share(&self, secrets: &EccSecrets) -> Result<EccPublicKeyShare> {
        let KeyShare { p, q, c, d } = &secrets.key_share;
        let public = |scalars: &Array2<u64>| CompressedPointMatrix::from(&self.group.scalar_multiply(scalars));
        Ok(EccPublicKeyShare {
            p: public(p),
            q: public(q),
            c: public(c),
            d: public(d),
        })
    }

    fn derive_collective_key(
        &self,
        participants: &ParticipantSet,
        shares: &PublicKeyShares<EccPublicKeyShare>,
    ) -> Result<EccCollectiveKey> {
        let n = self.config.matrix_size;
        let selected = selected_shares(participants, shares)?;
        Ok(EccCollectiveKey {
            participants: participants.clone(),
            p: sum_compressed(selected.iter().map(|share| &share.p), n)?,
            q: sum_compressed(selected.iter().map(|share| &share.q), n)?,
            c: sum_compressed(selected.iter().map(|share| &share.c), n)?,
            d: sum_compressed(selected.iter().map(|share| &share.d), n)?,
        })
    }

    fn encode_setup<R: RngCore + CryptoRng>(
        &self,
        secrets: &EccSecrets,
        key: &EccCollectiveKey,
        rng: &mut R,
    ) -> Result<EccSetupMessage> {
        if self.config.phase_one == PhaseOneMode::Short {
            return Ok(EccSetupMessage::Short {
                m: secrets.m.clone(),
                n: secrets.n.clone(),
            });
        }
        let KeyShare { p, q, c, d } = &secrets.key_share;
        let r = self.bounded_matrix(rng);
        let s = self.bounded_matrix(rng);
        Ok(EccSetupMessage::Full {
            a: add_scalars(&secrets.m, &r),
            b: add_scalars(&secrets.n, &s),
            r: CompressedPointMatrix::from(&self.blinding_points(&r, q, &key.p, p, &key.q)?),
            s: CompressedPointMatrix::from(&self.blinding_points(&s, c, &key.d, d, &key.c)?),
        })
    }

    fn decode_setup(
        &self,
        key: EccCollectiveKey,
        messages: Contributions<EccSetupMessage>,
    ) -> Result<EccRoundKey> {
        messages.ensure_complete_for(&key)?;
        let (m, n) = match self.config.phase_one {
            PhaseOneMode::Full => self.decode_full_setup(key.participants.len(), &messages)?,
            PhaseOneMode::Short => self.decode_short_setup(&messages)?,
        };
        Ok(EccRoundKey {
            participants: key.participants,
            m,
            n,
        })
    }

    fn encode<R: RngCore + CryptoRng>(
        &self,
        secrets: &EccSecrets,
        key: &EccRoundKey,
        weights: &Array2<f64>,
        _rng: &mut R,
    ) -> Result<Array2<f64>> {
        ensure_square(weights, self.config.matrix_size)?;
        Ok(Zip::from(weights)
            .and(&secrets.m)
            .and(&key.n)
            .and(&secrets.n)
            .and(&key.m)
            .par_map_collect(|w, m_i, n, n_i, m| w + m_i * n - n_i * m))
    }

    fn combine(&self, key: &EccRoundKey, messages: Contributions<Array2<f64>>) -> Result<Array2<f64>> {
        messages.ensure_complete_for(key)?;
        let n = self.config.matrix_size;
        messages
            .messages()
            .try_fold(Array2::zeros((n, n)), |sum, masked| {
                ensure_square(masked, n)?;
                Ok(sum + masked)
            })
    }

    fn recover_mask(&self, _key: &EccRoundKey, _combined: &Array2<f64>) -> Result<()> {
        // the masks cancel in the sum
        Ok(())
    }

    fn reconstruct_sum(&self, _key: &EccRoundKey, combined: Array2<f64>, _mask: ()) -> Result<Array2<f64>> {
        Ok(combined)
    }
}
