#![allow(dead_code)]

use std::collections::BTreeMap;

use ndarray::Array2;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use secagg_core::{
    round::{Collect, RoundState},
    scheme::{EccConfig, ElGamalConfig, PhaseOneMode},
    weights::Weight,
    EccScheme,
    ElGamalScheme,
    NoopObserver,
    Participant,
    ParticipantId,
    PublicKeyShares,
    SecureAggregationScheme,
};

pub const PARTICIPANTS: u64 = 5;

pub fn rng() -> ChaCha20Rng {
    ChaCha20Rng::from_seed([0_u8; 32])
}

pub fn ecc_full(matrix_size: usize, rng: &mut ChaCha20Rng) -> EccScheme {
    let config = EccConfig {
        matrix_size,
        ..Default::default()
    };
    EccScheme::new(config, rng).unwrap()
}

pub fn ecc_short(matrix_size: usize, rng: &mut ChaCha20Rng) -> EccScheme {
    let config = EccConfig {
        matrix_size,
        phase_one: PhaseOneMode::Short,
        ..Default::default()
    };
    EccScheme::new(config, rng).unwrap()
}

pub fn elgamal(matrix_size: usize, rng: &mut ChaCha20Rng) -> ElGamalScheme {
    let config = ElGamalConfig {
        matrix_size,
        ..Default::default()
    };
    ElGamalScheme::new(config, rng).unwrap()
}

/// The registered participants and their weights.
pub struct Fixture<P: SecureAggregationScheme> {
    pub secrets: Vec<P::Secrets>,
    pub shares: PublicKeyShares<P::PublicKeyShare>,
    pub weights: Array2<P::Weight>,
}

impl<P: SecureAggregationScheme> Fixture<P> {
    pub fn new(scheme: &P, rng: &mut ChaCha20Rng) -> Self {
        let secrets = (1..=PARTICIPANTS)
            .map(|id| scheme.generate_participant(ParticipantId::from(id), rng).unwrap())
            .collect::<Vec<_>>();
        let shares = secrets
            .iter()
            .map(|s| (s.id(), scheme.derive_public_key_share(s).unwrap()))
            .collect::<BTreeMap<_, _>>();
        let n = scheme.matrix_size();
        let weights = Array2::from_shape_fn((n, n), |(i, j)| P::Weight::from_i64((i * n + j) as i64));
        Self {
            secrets,
            shares,
            weights,
        }
    }

    /// Runs the setup phase of a round over all participants.
    pub fn setup<'a>(
        &'a self,
        scheme: &'a P,
        rng: &mut ChaCha20Rng,
    ) -> RoundState<'a, P, Collect<P>> {
        let participants = self.shares.keys().copied().collect();
        let mut round = RoundState::start(1, scheme, &NoopObserver, participants, &self.shares).unwrap();
        for secrets in &self.secrets {
            let setup = scheme
                .contribute_setup(secrets, round.collective_key(), rng)
                .unwrap();
            round.submit_setup(setup).unwrap();
        }
        round.close_setup().unwrap()
    }
}
