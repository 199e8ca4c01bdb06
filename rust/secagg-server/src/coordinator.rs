//! Simulated aggregation rounds over registered participants.
//!
//! The [`Coordinator`] registers participants once and then runs rounds over random subsets of
//! them. Every selected participant samples its weights, contributes its setup message and
//! its masked weights in parallel. The reconstructed aggregate is checked against the plain
//! sum of the sampled weights.
//!
//! Selected participants may drop out before submitting their weights. The round then fails
//! at its final barrier and is restarted without them, which derives a fresh collective key.

use std::collections::BTreeMap;

use ndarray::Array2;
use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};
use validator::{Validate, ValidationErrors};

use secagg_core::{
    round::RoundState,
    weights::{matrices_approx_eq, Weight},
    Participant,
    ParticipantId,
    ParticipantSet,
    ProtocolError,
    PublicKeyShares,
    SecureAggregationScheme,
    TracingObserver,
};

use crate::settings::RoundSettings;

/// The bound of the absolute value of the sampled weights.
pub const WEIGHT_BOUND: i64 = 1_000;

/// Errors of the coordinator.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("invalid round settings: {0}")]
    InvalidSettings(#[from] ValidationErrors),
    #[error("registration of {0} failed: {1}")]
    Registration(ParticipantId, #[source] ProtocolError),
    #[error("round {round_id} failed: {source}")]
    Round {
        round_id: u64,
        #[source]
        source: ProtocolError,
    },
    #[error("round {0} reconstructed a wrong aggregate")]
    WrongAggregate(u64),
    #[error("every participant of round {0} dropped out")]
    NoParticipants(u64),
}

/// Runs rounds of a scheme over simulated participants.
pub struct Coordinator<P: SecureAggregationScheme> {
    scheme: P,
    settings: RoundSettings,
    secrets: BTreeMap<ParticipantId, P::Secrets>,
    shares: PublicKeyShares<P::PublicKeyShare>,
    observer: TracingObserver,
    rng: ChaCha20Rng,
}

impl<P> Coordinator<P>
where
    P: SecureAggregationScheme,
{
    /// Creates a coordinator and registers `settings.participants` participants.
    ///
    /// # Errors
    /// Fails if the settings are invalid or if the secrets or the public key share of a
    /// participant can't be generated.
    pub fn new(
        scheme: P,
        settings: RoundSettings,
        mut rng: ChaCha20Rng,
    ) -> Result<Self, CoordinatorError> {
        settings.validate()?;
        let mut secrets = BTreeMap::new();
        let mut shares = BTreeMap::new();
        for id in (1..=settings.participants as u64).map(ParticipantId::from) {
            let (share, secret) = scheme
                .generate_participant(id, &mut rng)
                .and_then(|s| Ok((scheme.derive_public_key_share(&s)?, s)))
                .map_err(|err| CoordinatorError::Registration(id, err))?;
            shares.insert(id, share);
            secrets.insert(secret.id(), secret);
        }
        debug!("registered {} participants", secrets.len());

        Ok(Self {
            scheme,
            settings,
            secrets,
            shares,
            observer: TracingObserver,
            rng,
        })
    }

    /// Gets the scheme.
    pub fn scheme(&self) -> &P {
        &self.scheme
    }

    /// Gets the published public key shares.
    pub fn shares(&self) -> &PublicKeyShares<P::PublicKeyShare> {
        &self.shares
    }

    /// Runs the configured number of rounds.
    pub fn run(&mut self) -> Result<(), CoordinatorError> {
        for round_id in 1..=self.settings.count {
            self.run_round(round_id)?;
        }
        info!("completed {} rounds", self.settings.count);
        Ok(())
    }

    /// Runs a single round over a random selection of participants.
    ///
    /// # Errors
    /// Fails if the round fails for another reason than dropped participants, or if the
    /// aggregate doesn't match the plain sum of the sampled weights.
    pub fn run_round(&mut self, round_id: u64) -> Result<Array2<P::Weight>, CoordinatorError> {
        let mut participants = self.select();
        loop {
            if participants.is_empty() {
                return Err(CoordinatorError::NoParticipants(round_id));
            }
            let dropped = self.sample_dropouts(&participants);
            match self.attempt(round_id, &participants, &dropped) {
                Err(CoordinatorError::Round {
                    source: ProtocolError::MissingContribution(id),
                    ..
                }) if dropped.contains(&id) => {
                    warn!(
                        round_id,
                        "{} of {} participants dropped out, restarting the round",
                        dropped.len(),
                        participants.len()
                    );
                    participants = participants
                        .iter()
                        .filter(|id| !dropped.contains(id))
                        .copied()
                        .collect();
                }
                result => return result,
            }
        }
    }

    fn select(&mut self) -> ParticipantSet {
        let registered = self.secrets.keys().copied().collect::<Vec<_>>();
        registered
            .choose_multiple(&mut self.rng, self.settings.per_round)
            .copied()
            .collect()
    }

    fn sample_dropouts(&mut self, participants: &ParticipantSet) -> ParticipantSet {
        let dropout = self.settings.dropout;
        participants
            .iter()
            .filter(|_| self.rng.gen_bool(dropout))
            .copied()
            .collect()
    }

    fn sample_weights(&mut self) -> Array2<P::Weight> {
        let n = self.scheme.matrix_size();
        let rng = &mut self.rng;
        Array2::from_shape_simple_fn((n, n), || {
            P::Weight::random(&mut *rng, -WEIGHT_BOUND, WEIGHT_BOUND)
        })
    }

    fn attempt(
        &mut self,
        round_id: u64,
        participants: &ParticipantSet,
        dropped: &ParticipantSet,
    ) -> Result<Array2<P::Weight>, CoordinatorError> {
        let round_error = |source| CoordinatorError::Round { round_id, source };

        let mut weights = BTreeMap::new();
        let mut rngs = Vec::with_capacity(participants.len());
        for id in participants {
            if !dropped.contains(id) {
                let sampled = self.sample_weights();
                weights.insert(*id, sampled);
            }
            rngs.push((*id, ChaCha20Rng::from_seed(self.rng.gen())));
        }

        let scheme = &self.scheme;
        let secrets = &self.secrets;
        let secrets_of =
            |id: &ParticipantId| secrets.get(id).ok_or(ProtocolError::UnknownParticipant(*id));

        let mut round = RoundState::start(
            round_id,
            scheme,
            &self.observer,
            participants.clone(),
            &self.shares,
        )
        .map_err(round_error)?;

        let key = round.collective_key();
        let setups = rngs
            .par_iter_mut()
            .map(|(id, rng)| scheme.contribute_setup(secrets_of(id)?, key, rng))
            .collect::<Result<Vec<_>, _>>()
            .map_err(round_error)?;
        for setup in setups {
            round.submit_setup(setup).map_err(round_error)?;
        }
        let mut round = round.close_setup().map_err(round_error)?;

        let key = round.round_key();
        let contributions = rngs
            .par_iter_mut()
            .filter(|(id, _)| weights.contains_key(id))
            .map(|(id, rng)| scheme.contribute(secrets_of(id)?, key, &weights[&*id], rng))
            .collect::<Result<Vec<_>, _>>()
            .map_err(round_error)?;
        for contribution in contributions {
            round.submit(contribution).map_err(round_error)?;
        }
        debug!(round_id, "collected {} contributions", round.contributions());
        let aggregate = round.finish().map_err(round_error)?;

        let n = scheme.matrix_size();
        let plain = weights
            .values()
            .fold(Array2::<P::Weight>::zeros((n, n)), |acc, w| acc + w);
        if matrices_approx_eq(&aggregate, &plain) {
            info!(round_id, "aggregated the weights of {} participants", weights.len());
            Ok(aggregate)
        } else {
            Err(CoordinatorError::WrongAggregate(round_id))
        }
    }
}
