//! The state machine of a single aggregation round.
//!
//! A round moves through the following states, each transition consuming the previous state:
//!
//! ```text
//! start ─► Setup ──close_setup──► Collect ──finish──► aggregate
//!           ▲ submit_setup          ▲ submit
//! ```
//!
//! [`RoundState::start`] derives the collective key for exactly the selected participants.
//! [`close_setup`] and [`finish`] are barriers: they fail with
//! [`ProtocolError::MissingContribution`] unless every selected participant has contributed.
//! [`finish`] then combines the contributions, recovers the mask and reconstructs the sum.
//!
//! Any failure of a barrier discards the round. A round that is dropped before it finished is
//! aborted as well. Neither can be resumed: the next attempt starts over with a collective key
//! derived for its own participant set.
//!
//! [`close_setup`]: RoundState::close_setup
//! [`finish`]: RoundState::finish

use std::time::Instant;

use ndarray::Array2;
use tracing::{debug, info_span, Span};

use crate::{
    observer::{RoundObserver, RoundPhase},
    scheme::{Contribution, Contributions, SecureAggregationScheme},
    ParticipantSet,
    PublicKeyShares,
    Result,
    Scoped,
};

/// The setup phase of a round.
pub struct Setup<P: SecureAggregationScheme> {
    key: P::CollectiveKey,
    messages: Contributions<P::SetupMessage>,
}

/// The collection phase of a round.
pub struct Collect<P: SecureAggregationScheme> {
    key: P::RoundKey,
    messages: Contributions<P::EncodedMessage>,
}

/// A round in the phase `S`.
pub struct RoundState<'a, P, S> {
    round_id: u64,
    scheme: &'a P,
    observer: &'a dyn RoundObserver,
    span: Span,
    phase_started: Instant,
    phase: S,
}

impl<'a, P, S> RoundState<'a, P, S> {
    /// Gets the id of the round.
    pub fn round_id(&self) -> u64 {
        self.round_id
    }

    /// Reports a finished phase and restarts the phase timer.
    fn complete_phase(&mut self, phase: RoundPhase) {
        let elapsed = self.phase_started.elapsed();
        debug!("{} took {:?}", phase, elapsed);
        self.observer.phase_completed(self.round_id, phase, elapsed);
        self.phase_started = Instant::now();
    }

    /// Reports the round as failed if the result is an error.
    fn fail_on_error<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            self.observer.round_finished(self.round_id, Err(err));
        }
        result
    }

    /// Moves the phase data out of the round.
    fn take_phase(self) -> (RoundState<'a, P, ()>, S) {
        let RoundState {
            round_id,
            scheme,
            observer,
            span,
            phase_started,
            phase,
        } = self;
        let round = RoundState {
            round_id,
            scheme,
            observer,
            span,
            phase_started,
            phase: (),
        };
        (round, phase)
    }
}

impl<'a, P> RoundState<'a, P, ()> {
    fn into_phase<T>(self, phase: T) -> RoundState<'a, P, T> {
        RoundState {
            round_id: self.round_id,
            scheme: self.scheme,
            observer: self.observer,
            span: self.span,
            phase_started: self.phase_started,
            phase,
        }
    }
}

impl<'a, P> RoundState<'a, P, Setup<P>>
where
    P: SecureAggregationScheme,
{
    /// Starts a round for the selected participants.
    ///
    /// # Errors
    /// Fails if the collective key can't be derived for the participant set.
    pub fn start(
        round_id: u64,
        scheme: &'a P,
        observer: &'a dyn RoundObserver,
        participants: ParticipantSet,
        shares: &PublicKeyShares<P::PublicKeyShare>,
    ) -> Result<Self> {
        let span = info_span!("round", round_id);
        let entered = span.enter();

        let key = scheme
            .derive_collective_key(&participants, shares)
            .map_err(|err| {
                observer.round_finished(round_id, Err(&err));
                err
            })?;
        observer.round_started(round_id, &participants);
        debug!("derived the collective key for {} participants", participants.len());

        drop(entered);
        Ok(Self {
            round_id,
            scheme,
            observer,
            span,
            phase_started: Instant::now(),
            phase: Setup {
                key,
                messages: Contributions::new(participants),
            },
        })
    }

    /// Gets the participants of the round.
    pub fn participants(&self) -> &ParticipantSet {
        self.phase.key.participants()
    }

    /// Gets the collective key of the round.
    pub fn collective_key(&self) -> &P::CollectiveKey {
        &self.phase.key
    }

    /// Adds the setup message of a participant.
    ///
    /// # Errors
    /// Fails if the contribution is stale, unknown or a duplicate. The round remains open.
    pub fn submit_setup(&mut self, contribution: Contribution<P::SetupMessage>) -> Result<()> {
        self.phase.messages.insert(contribution)
    }

    /// Closes the setup phase and derives the round key.
    ///
    /// # Errors
    /// Fails if a setup message is missing or can't be decoded. The round is discarded.
    pub fn close_setup(mut self) -> Result<RoundState<'a, P, Collect<P>>> {
        let span = self.span.clone();
        let _enter = span.enter();

        self.fail_on_error(self.phase.messages.ensure_complete())?;
        self.complete_phase(RoundPhase::AwaitingSetup);

        let (round, Setup { key, messages }) = self.take_phase();
        let participants = key.participants().clone();
        let round_key = round.fail_on_error(round.scheme.decode_setup(key, messages))?;
        let mut round = round.into_phase(Collect {
            key: round_key,
            messages: Contributions::new(participants),
        });
        round.complete_phase(RoundPhase::RecoveringSetup);
        Ok(round)
    }
}

impl<'a, P> RoundState<'a, P, Collect<P>>
where
    P: SecureAggregationScheme,
{
    /// Gets the participants of the round.
    pub fn participants(&self) -> &ParticipantSet {
        self.phase.key.participants()
    }

    /// Gets the round key.
    pub fn round_key(&self) -> &P::RoundKey {
        &self.phase.key
    }

    /// Adds the encoded weights of a participant.
    ///
    /// # Errors
    /// Fails if the contribution is stale, unknown or a duplicate. The round remains open.
    pub fn submit(&mut self, contribution: Contribution<P::EncodedMessage>) -> Result<()> {
        self.phase.messages.insert(contribution)
    }

    /// Gets the number of contributions so far.
    pub fn contributions(&self) -> usize {
        self.phase.messages.len()
    }

    /// Decodes the aggregate of all contributions.
    ///
    /// # Errors
    /// Fails if a contribution is missing or decoding fails. The round is discarded.
    pub fn finish(mut self) -> Result<Array2<P::Weight>> {
        let span = self.span.clone();
        let _enter = span.enter();

        self.fail_on_error(self.phase.messages.ensure_complete())?;
        self.complete_phase(RoundPhase::AwaitingContributions);

        let (mut round, Collect { key, messages }) = self.take_phase();

        let combined = round.fail_on_error(round.scheme.combine(&key, messages))?;
        round.complete_phase(RoundPhase::Combining);

        let mask = round.fail_on_error(round.scheme.recover_mask(&key, &combined))?;
        round.complete_phase(RoundPhase::RecoveringMask);

        let sum = round.fail_on_error(round.scheme.reconstruct_sum(&key, combined, mask))?;
        round.complete_phase(RoundPhase::Reconstructed);

        round.observer.round_finished(round.round_id, Ok(()));
        Ok(sum)
    }
}
