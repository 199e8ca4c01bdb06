#![allow(dead_code)]

use std::collections::BTreeMap;

use ndarray::Array2;
use rand_chacha::ChaCha20Rng;
use secagg_core::{
    round::RoundState,
    NoopObserver,
    Participant,
    ParticipantId,
    ParticipantSet,
    PublicKeyShares,
    Result,
    SecureAggregationScheme,
};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Installs a subscriber which honours `RUST_LOG`.
pub fn enable_logging() {
    let _fmt_subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_ansi(true)
        .with_test_writer()
        .try_init();
}

/// The registered participants of a protocol instance.
pub struct Registry<P: SecureAggregationScheme> {
    pub secrets: Vec<P::Secrets>,
    pub shares: PublicKeyShares<P::PublicKeyShare>,
}

impl<P: SecureAggregationScheme> Registry<P> {
    pub fn new(scheme: &P, count: u64, rng: &mut ChaCha20Rng) -> Self {
        let secrets = (1..=count)
            .map(|id| scheme.generate_participant(ParticipantId::from(id), rng).unwrap())
            .collect::<Vec<_>>();
        let shares = secrets
            .iter()
            .map(|s| (s.id(), scheme.derive_public_key_share(s).unwrap()))
            .collect::<BTreeMap<_, _>>();
        Self { secrets, shares }
    }

    pub fn all(&self) -> ParticipantSet {
        self.shares.keys().copied().collect()
    }

    pub fn get(&self, id: u64) -> &P::Secrets {
        &self.secrets[id as usize - 1]
    }
}

/// Runs a complete round over the given participants and weights.
pub fn run_round<P: SecureAggregationScheme>(
    scheme: &P,
    registry: &Registry<P>,
    selected: &[u64],
    weights: &[Array2<P::Weight>],
    rng: &mut ChaCha20Rng,
) -> Result<Array2<P::Weight>> {
    let participants = selected.iter().copied().map(ParticipantId::from).collect();
    let mut round = RoundState::start(1, scheme, &NoopObserver, participants, &registry.shares)?;
    for id in selected {
        let setup = scheme.contribute_setup(registry.get(*id), round.collective_key(), rng)?;
        round.submit_setup(setup)?;
    }
    let mut round = round.close_setup()?;
    for (id, w) in selected.iter().zip(weights) {
        let contribution = scheme.contribute(registry.get(*id), round.round_key(), w, rng)?;
        round.submit(contribution)?;
    }
    round.finish()
}
