//! The secure aggregation schemes.
//!
//! Both schemes implement [`SecureAggregationScheme`]. A scheme instance holds the immutable
//! group context and masking matrices of a protocol instance and is shared read-only by all
//! participants and the server.
//!
//! # Operations
//! The participant side:
//! - [`generate_participant()`] samples the private key share and the private parameters once
//!   per protocol instance.
//! - [`derive_public_key_share()`] computes the share which is published to the server.
//! - [`contribute_setup()`] and [`contribute()`] encode the setup message and the masked weight
//!   matrix of a round.
//!
//! The server side:
//! - [`derive_collective_key()`] combines the public key shares of exactly the participants
//!   selected for a round.
//! - [`decode_setup()`] turns the setup messages into the round key.
//! - [`combine()`], [`recover_mask()`] and [`reconstruct_sum()`] decode the aggregate.
//!
//! Every key and message is stamped with the participant set it was derived for. Mixing
//! values of different participant sets is rejected with [`ProtocolError::StaleCollectiveKey`].
//!
//! [`generate_participant()`]: SecureAggregationScheme::generate_participant
//! [`derive_public_key_share()`]: SecureAggregationScheme::derive_public_key_share
//! [`contribute_setup()`]: SecureAggregationScheme::contribute_setup
//! [`contribute()`]: SecureAggregationScheme::contribute
//! [`derive_collective_key()`]: SecureAggregationScheme::derive_collective_key
//! [`decode_setup()`]: SecureAggregationScheme::decode_setup
//! [`combine()`]: SecureAggregationScheme::combine
//! [`recover_mask()`]: SecureAggregationScheme::recover_mask
//! [`reconstruct_sum()`]: SecureAggregationScheme::reconstruct_sum

pub mod config;
pub mod ecc;
pub mod elgamal;

use std::{
    collections::{btree_map::Entry, BTreeMap},
    fmt,
};

use ndarray::Array2;
use rand::{CryptoRng, RngCore};

pub use self::{
    config::{EccConfig, ElGamalConfig, PhaseOneMode},
    ecc::EccScheme,
    elgamal::ElGamalScheme,
};
use crate::{
    crypto::{EccGroup, ModularGroup},
    weights::Weight,
    Participant,
    ParticipantId,
    ParticipantSet,
    ProtocolError,
    PublicKeyShares,
    Result,
    Scoped,
};

/// The immutable group parameters of a protocol instance.
#[derive(Clone, Debug, PartialEq)]
pub enum GroupContext {
    /// The curve, generator and order of the elliptic-curve scheme.
    Ecc(EccGroup),
    /// The generator and prime modulus of the classic scheme.
    Modular(ModularGroup),
}

impl fmt::Display for GroupContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ecc(group) => write!(f, "elliptic curve {}", group),
            Self::Modular(group) => write!(f, "modular group {}", group),
        }
    }
}

/// A message of a participant, stamped with the participant set of the key it was encoded
/// with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Contribution<M> {
    /// The sender.
    pub sender: ParticipantId,
    /// The participant set of the key the message was encoded with.
    pub participants: ParticipantSet,
    /// The message.
    pub message: M,
}

/// The contributions of a single round phase.
///
/// Every selected participant contributes exactly once. Decoding requires the contributions to
/// be complete.
#[derive(Clone, Debug)]
pub struct Contributions<M> {
    participants: ParticipantSet,
    messages: BTreeMap<ParticipantId, M>,
}

impl<M> Contributions<M> {
    /// Creates an empty collection for the given participant set.
    pub fn new(participants: ParticipantSet) -> Self {
        Self {
            participants,
            messages: BTreeMap::new(),
        }
    }

    /// Adds a contribution.
    ///
    /// # Errors
    /// Fails with
    /// - [`ProtocolError::StaleCollectiveKey`] if the contribution was encoded for another
    ///   participant set;
    /// - [`ProtocolError::UnknownParticipant`] if the sender is not selected;
    /// - [`ProtocolError::DuplicateContribution`] if the sender already contributed.
    pub fn insert(&mut self, contribution: Contribution<M>) -> Result<()> {
        let Contribution {
            sender,
            participants,
            message,
        } = contribution;
        if participants != self.participants {
            return Err(ProtocolError::StaleCollectiveKey);
        }
        if !self.participants.contains(&sender) {
            return Err(ProtocolError::UnknownParticipant(sender));
        }
        match self.messages.entry(sender) {
            Entry::Occupied(_) => Err(ProtocolError::DuplicateContribution(sender)),
            Entry::Vacant(entry) => {
                entry.insert(message);
                Ok(())
            }
        }
    }

    /// Gets the number of contributions so far.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Checks whether nothing was contributed yet.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Checks that every selected participant contributed.
    ///
    /// # Errors
    /// Fails with [`ProtocolError::MissingContribution`] for the first missing participant.
    pub fn ensure_complete(&self) -> Result<()> {
        match self
            .participants
            .iter()
            .find(|id| !self.messages.contains_key(*id))
        {
            Some(id) => Err(ProtocolError::MissingContribution(*id)),
            None => Ok(()),
        }
    }

    /// Iterates over the messages in ascending order of their senders.
    pub fn messages(&self) -> impl Iterator<Item = &M> {
        self.messages.values()
    }

    /// Checks that the contributions are complete and belong to the given key.
    pub(crate) fn ensure_complete_for<K: Scoped>(&self, key: &K) -> Result<()> {
        if key.participants() != &self.participants {
            return Err(ProtocolError::StaleCollectiveKey);
        }
        self.ensure_complete()
    }
}

impl<M> Scoped for Contributions<M> {
    fn participants(&self) -> &ParticipantSet {
        &self.participants
    }
}

/// Looks up the public key shares of the participant set.
///
/// # Errors
/// Fails if the set is empty or a share is missing.
pub(crate) fn selected_shares<'a, K>(
    participants: &ParticipantSet,
    shares: &'a PublicKeyShares<K>,
) -> Result<Vec<&'a K>> {
    if participants.is_empty() {
        return Err(ProtocolError::EmptyParticipantSet);
    }
    participants
        .iter()
        .map(|id| shares.get(id).ok_or(ProtocolError::MissingPublicKey(*id)))
        .collect()
}

/// The capability of a secure aggregation scheme.
///
/// The collective key, the round key and all contributions are scoped to the participant set
/// of a round. A change of the participant set requires a new collective key.
pub trait SecureAggregationScheme: Sync {
    /// The numeric type of the weights.
    type Weight: Weight;
    /// The private key share and private parameters of a participant.
    type Secrets: Participant + Send + Sync;
    /// The published counterpart of a private key share.
    type PublicKeyShare: Clone + Send + Sync;
    /// The combined public key shares of a participant set.
    type CollectiveKey: Scoped + Send + Sync;
    /// The message of a participant in the setup phase.
    type SetupMessage: Send;
    /// The key of a round, derived from the collective key and the setup messages.
    type RoundKey: Scoped + Send + Sync;
    /// The masked weights of a participant.
    type EncodedMessage: Send;
    /// The combination of all encoded messages of a round.
    type Combined: Send;
    /// The recovered masking term of a round.
    type Mask: Send;

    /// Gets the group parameters.
    fn group_context(&self) -> GroupContext;

    /// Gets the dimension `n` of the `n×n` weight matrices.
    fn matrix_size(&self) -> usize;

    /// Samples the private key share and private parameters of a participant.
    fn generate_participant<R: RngCore + CryptoRng>(
        &self,
        id: ParticipantId,
        rng: &mut R,
    ) -> Result<Self::Secrets>;

    /// Derives the public key share of a participant.
    fn derive_public_key_share(&self, secrets: &Self::Secrets) -> Result<Self::PublicKeyShare>;

    /// Combines the public key shares of exactly the given participants.
    ///
    /// # Errors
    /// Fails with [`ProtocolError::EmptyParticipantSet`] for an empty set and with
    /// [`ProtocolError::MissingPublicKey`] if a participant has not published a share.
    fn derive_collective_key(
        &self,
        participants: &ParticipantSet,
        shares: &PublicKeyShares<Self::PublicKeyShare>,
    ) -> Result<Self::CollectiveKey>;

    /// Encodes the setup message of a participant.
    fn encode_setup<R: RngCore + CryptoRng>(
        &self,
        secrets: &Self::Secrets,
        key: &Self::CollectiveKey,
        rng: &mut R,
    ) -> Result<Self::SetupMessage>;

    /// Derives the round key from the complete setup messages.
    fn decode_setup(
        &self,
        key: Self::CollectiveKey,
        messages: Contributions<Self::SetupMessage>,
    ) -> Result<Self::RoundKey>;

    /// Masks the weight matrix of a participant.
    fn encode<R: RngCore + CryptoRng>(
        &self,
        secrets: &Self::Secrets,
        key: &Self::RoundKey,
        weights: &Array2<Self::Weight>,
        rng: &mut R,
    ) -> Result<Self::EncodedMessage>;

    /// Combines the complete encoded messages of a round.
    fn combine(
        &self,
        key: &Self::RoundKey,
        messages: Contributions<Self::EncodedMessage>,
    ) -> Result<Self::Combined>;

    /// Recovers the masking term of the combined messages.
    fn recover_mask(&self, key: &Self::RoundKey, combined: &Self::Combined) -> Result<Self::Mask>;

    /// Removes the masking term and reconstructs the sum of the weight matrices.
    fn reconstruct_sum(
        &self,
        key: &Self::RoundKey,
        combined: Self::Combined,
        mask: Self::Mask,
    ) -> Result<Array2<Self::Weight>>;

    /// Encodes the setup message of a participant and stamps it with the key's participant set.
    ///
    /// # Errors
    /// Fails with [`ProtocolError::UnknownParticipant`] if the participant is not selected.
    fn contribute_setup<R: RngCore + CryptoRng>(
        &self,
        secrets: &Self::Secrets,
        key: &Self::CollectiveKey,
        rng: &mut R,
    ) -> Result<Contribution<Self::SetupMessage>> {
        let sender = ensure_selected(secrets, key)?;
        Ok(Contribution {
            sender,
            participants: key.participants().clone(),
            message: self.encode_setup(secrets, key, rng)?,
        })
    }

    /// Masks the weight matrix of a participant and stamps it with the key's participant set.
    ///
    /// # Errors
    /// Fails with [`ProtocolError::UnknownParticipant`] if the participant is not selected.
    fn contribute<R: RngCore + CryptoRng>(
        &self,
        secrets: &Self::Secrets,
        key: &Self::RoundKey,
        weights: &Array2<Self::Weight>,
        rng: &mut R,
    ) -> Result<Contribution<Self::EncodedMessage>> {
        let sender = ensure_selected(secrets, key)?;
        Ok(Contribution {
            sender,
            participants: key.participants().clone(),
            message: self.encode(secrets, key, weights, rng)?,
        })
    }
}

fn ensure_selected<P: Participant, K: Scoped>(secrets: &P, key: &K) -> Result<ParticipantId> {
    let id = secrets.id();
    if key.participants().contains(&id) {
        Ok(id)
    } else {
        Err(ProtocolError::UnknownParticipant(id))
    }
}
