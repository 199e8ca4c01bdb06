#![cfg_attr(docsrs, feature(doc_cfg))]
//! # Secure aggregation of federated learning updates
//!
//! A coordinating server computes the sum of many participants' private weight matrices
//! without learning any individual matrix, and without any participant learning another's.
//!
//! The crate ships two interchangeable schemes behind the [`SecureAggregationScheme`]
//! capability:
//!
//! - [`EccScheme`]: additive blinding matrices `M`, `N` agreed upon in a setup phase over the
//!   ristretto255 group; weights are masked as `T_i = W_i + m_i⊙N − n_i⊙M` and the masks
//!   cancel in the sum.
//! - [`ElGamalScheme`]: ElGamal-style masking modulo a prime `p`; weights are quantized to
//!   fixed-point integers and blinded by an invertible matrix `K` plus bounded noise, the
//!   summed noise is recovered by a bounded discrete logarithm search.
//!
//! A round always runs through the same steps:
//!
//! 1. every participant publishes a public key share once;
//! 2. the collective key is derived for *exactly* the participants selected for the round;
//! 3. all selected participants submit a setup message, then an encoded weight matrix;
//! 4. the server combines the contributions, recovers the mask and reconstructs the sum.
//!
//! ```
//! # use std::collections::BTreeMap;
//! # use ndarray::array;
//! # use rand::SeedableRng;
//! # use rand_chacha::ChaCha20Rng;
//! # use secagg_core::{
//! #     round::RoundState,
//! #     scheme::{ElGamalConfig, ElGamalScheme, SecureAggregationScheme},
//! #     NoopObserver, ParticipantId, ParticipantSet,
//! # };
//! let mut rng = ChaCha20Rng::from_seed([0_u8; 32]);
//! let config = ElGamalConfig { matrix_size: 2, prime_bits: 64, ..Default::default() };
//! let scheme = ElGamalScheme::new(config, &mut rng).unwrap();
//!
//! let secrets = (1..=3_u64)
//!     .map(|id| scheme.generate_participant(ParticipantId::from(id), &mut rng).unwrap())
//!     .collect::<Vec<_>>();
//! let shares = secrets
//!     .iter()
//!     .map(|s| (s.id, scheme.derive_public_key_share(s).unwrap()))
//!     .collect::<BTreeMap<_, _>>();
//! let participants: ParticipantSet = shares.keys().copied().collect();
//!
//! let mut round = RoundState::start(1, &scheme, &NoopObserver, participants, &shares).unwrap();
//! for s in &secrets {
//!     let setup = scheme.contribute_setup(s, round.collective_key(), &mut rng).unwrap();
//!     round.submit_setup(setup).unwrap();
//! }
//! let mut round = round.close_setup().unwrap();
//! for (s, w) in secrets.iter().zip(&[array![[1., 2.], [3., 4.]], array![[5., 6.], [7., 8.]], array![[9., 10.], [11., 12.]]]) {
//!     let contribution = scheme.contribute(s, round.round_key(), w, &mut rng).unwrap();
//!     round.submit(contribution).unwrap();
//! }
//! assert_eq!(round.finish().unwrap(), array![[15., 18.], [21., 24.]]);
//! ```

#[macro_use]
extern crate serde;

pub mod crypto;
pub mod error;
pub mod keys;
pub mod observer;
pub mod recovery;
pub mod round;
pub mod scheme;
pub mod weights;

use std::{
    collections::{btree_set, BTreeMap, BTreeSet},
    iter::FromIterator,
};

use derive_more::{Display, From, Into};

pub use self::{
    error::{ProtocolError, Result},
    observer::{NoopObserver, RoundObserver, RoundPhase, TracingObserver},
    scheme::{EccScheme, ElGamalScheme, GroupContext, SecureAggregationScheme},
};

/// A stable identity of a participant.
///
/// It indexes every per-participant map and must be the same across the key derivation,
/// encoding and decoding of a round.
#[derive(
    Clone, Copy, Debug, Display, From, Into, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[display(fmt = "participant {}", _0)]
pub struct ParticipantId(u64);

/// The ordered set of participants taking part in a round.
///
/// Collective keys, round keys and contributions are all scoped to such a set: two of them
/// belong to the same round only if their sets are equal.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParticipantSet(BTreeSet<ParticipantId>);

impl ParticipantSet {
    /// Gets the number of participants.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Checks whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Checks whether the participant belongs to this set.
    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.0.contains(id)
    }

    /// Iterates over the participants in ascending order.
    pub fn iter(&self) -> btree_set::Iter<ParticipantId> {
        self.0.iter()
    }
}

impl FromIterator<ParticipantId> for ParticipantSet {
    fn from_iter<I: IntoIterator<Item = ParticipantId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a ParticipantSet {
    type Item = &'a ParticipantId;
    type IntoIter = btree_set::Iter<'a, ParticipantId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// The published public key shares, indexed by participant.
pub type PublicKeyShares<K> = BTreeMap<ParticipantId, K>;

/// Anything that belongs to a participant.
pub trait Participant {
    /// Gets the id of the participant.
    fn id(&self) -> ParticipantId;
}

/// Anything that is only valid for a fixed participant set.
pub trait Scoped {
    /// Gets the participant set this value was derived for.
    fn participants(&self) -> &ParticipantSet;
}
