mod common;

use ndarray::{array, Array2};
use num::bigint::BigUint;
use paste::paste;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use secagg_core::{
    crypto::{EccGroup, ModularGroup},
    recovery::search_bound,
    round::RoundState,
    scheme::{
        ecc::recover_scalar,
        elgamal::recover_exponent,
        EccConfig,
        ElGamalConfig,
        PhaseOneMode,
    },
    weights::{matrices_approx_eq, Weight},
    EccScheme,
    ElGamalScheme,
    NoopObserver,
    ParticipantId,
    ParticipantSet,
    ProtocolError,
    SecureAggregationScheme,
};

use common::{enable_logging, run_round, Registry};

fn matrix<W: Weight>(rows: [[i64; 2]; 2]) -> Array2<W> {
    Array2::from_shape_fn((2, 2), |(i, j)| W::from_i64(rows[i][j]))
}

fn set(ids: &[u64]) -> ParticipantSet {
    ids.iter().copied().map(ParticipantId::from).collect()
}

fn ecc_full(rng: &mut ChaCha20Rng) -> EccScheme {
    let config = EccConfig {
        matrix_size: 2,
        ..Default::default()
    };
    EccScheme::new(config, rng).unwrap()
}

fn ecc_short(rng: &mut ChaCha20Rng) -> EccScheme {
    let config = EccConfig {
        matrix_size: 2,
        phase_one: PhaseOneMode::Short,
        ..Default::default()
    };
    EccScheme::new(config, rng).unwrap()
}

fn elgamal(rng: &mut ChaCha20Rng) -> ElGamalScheme {
    let config = ElGamalConfig {
        matrix_size: 2,
        prime_bits: 64,
        ..Default::default()
    };
    ElGamalScheme::new(config, rng).unwrap()
}

macro_rules! aggregation_suite {
    ($name: ident, $make: ident) => {
        paste! {
            #[test]
            fn [<$name _sums_three_participants>]() {
                enable_logging();
                let mut rng = ChaCha20Rng::from_seed([1_u8; 32]);
                let scheme = $make(&mut rng);
                let registry = Registry::new(&scheme, 3, &mut rng);
                let weights = vec![
                    matrix([[1, 2], [3, 4]]),
                    matrix([[5, 6], [7, 8]]),
                    matrix([[9, 10], [11, 12]]),
                ];
                let sum = run_round(&scheme, &registry, &[1, 2, 3], &weights, &mut rng).unwrap();
                assert!(matrices_approx_eq(&sum, &matrix([[15, 18], [21, 24]])));
            }

            #[test]
            fn [<$name _single_participant>]() {
                let mut rng = ChaCha20Rng::from_seed([2_u8; 32]);
                let scheme = $make(&mut rng);
                let registry = Registry::new(&scheme, 1, &mut rng);
                let weights = vec![matrix([[-4, 0], [17, 3]])];
                let sum = run_round(&scheme, &registry, &[1], &weights, &mut rng).unwrap();
                assert!(matrices_approx_eq(&sum, &weights[0]));
            }

            #[test]
            fn [<$name _sum_is_order_independent>]() {
                let mut rng = ChaCha20Rng::from_seed([3_u8; 32]);
                let scheme = $make(&mut rng);
                let registry = Registry::new(&scheme, 4, &mut rng);
                let weights = (0..4)
                    .map(|i| matrix([[i, 2 * i], [-i, 7]]))
                    .collect::<Vec<_>>();
                let mut reversed = weights.clone();
                reversed.reverse();

                let forward = run_round(&scheme, &registry, &[1, 2, 3, 4], &weights, &mut rng).unwrap();
                let backward = run_round(&scheme, &registry, &[4, 3, 2, 1], &reversed, &mut rng).unwrap();
                assert!(matrices_approx_eq(&forward, &backward));
                assert!(matrices_approx_eq(&forward, &matrix([[6, 12], [-6, 28]])));
            }

            #[test]
            fn [<$name _rounds_over_changing_subsets>]() {
                let mut rng = ChaCha20Rng::from_seed([4_u8; 32]);
                let scheme = $make(&mut rng);
                let registry = Registry::new(&scheme, 5, &mut rng);
                let weights = vec![
                    matrix([[1, 1], [1, 1]]),
                    matrix([[2, 2], [2, 2]]),
                    matrix([[3, 3], [3, 3]]),
                ];
                let first = run_round(&scheme, &registry, &[1, 2, 5], &weights, &mut rng).unwrap();
                assert!(matrices_approx_eq(&first, &matrix([[6, 6], [6, 6]])));
                let second = run_round(&scheme, &registry, &[3, 4], &weights[..2], &mut rng).unwrap();
                assert!(matrices_approx_eq(&second, &matrix([[3, 3], [3, 3]])));
            }

            #[test]
            fn [<$name _random_weights_match_plain_sum>]() {
                let mut rng = ChaCha20Rng::from_seed([5_u8; 32]);
                let scheme = $make(&mut rng);
                let registry = Registry::new(&scheme, 6, &mut rng);
                let weights = (0..6)
                    .map(|_| Array2::from_shape_simple_fn((2, 2), || Weight::random(&mut rng, -1000, 1000)))
                    .collect::<Vec<_>>();
                let plain = weights
                    .iter()
                    .fold(Array2::zeros((2, 2)), |acc, w| acc + w);
                let sum = run_round(&scheme, &registry, &[1, 2, 3, 4, 5, 6], &weights, &mut rng).unwrap();
                assert!(matrices_approx_eq(&sum, &plain));
            }

            #[test]
            fn [<$name _key_of_another_set_is_stale>]() {
                let mut rng = ChaCha20Rng::from_seed([6_u8; 32]);
                let scheme = $make(&mut rng);
                let registry = Registry::new(&scheme, 3, &mut rng);
                let stale_key = scheme.derive_collective_key(&registry.all(), &registry.shares).unwrap();

                let mut round = RoundState::start(1, &scheme, &NoopObserver, set(&[1, 2]), &registry.shares).unwrap();
                let setup = scheme.contribute_setup(registry.get(1), &stale_key, &mut rng).unwrap();
                assert_eq!(round.submit_setup(setup).unwrap_err(), ProtocolError::StaleCollectiveKey);
            }

            #[test]
            fn [<$name _rejects_unselected_and_duplicate_contributions>]() {
                let mut rng = ChaCha20Rng::from_seed([7_u8; 32]);
                let scheme = $make(&mut rng);
                let registry = Registry::new(&scheme, 3, &mut rng);

                let mut round = RoundState::start(1, &scheme, &NoopObserver, set(&[1, 2]), &registry.shares).unwrap();
                assert_eq!(
                    scheme
                        .contribute_setup(registry.get(3), round.collective_key(), &mut rng)
                        .unwrap_err(),
                    ProtocolError::UnknownParticipant(ParticipantId::from(3)),
                );
                for id in &[1, 2] {
                    let setup = scheme.contribute_setup(registry.get(*id), round.collective_key(), &mut rng).unwrap();
                    round.submit_setup(setup).unwrap();
                }
                let mut round = round.close_setup().unwrap();
                let weights = matrix([[1, 2], [3, 4]]);
                let first = scheme.contribute(registry.get(1), round.round_key(), &weights, &mut rng).unwrap();
                let second = scheme.contribute(registry.get(1), round.round_key(), &weights, &mut rng).unwrap();
                round.submit(first).unwrap();
                assert_eq!(
                    round.submit(second).unwrap_err(),
                    ProtocolError::DuplicateContribution(ParticipantId::from(1)),
                );
                assert_eq!(
                    round.finish().unwrap_err(),
                    ProtocolError::MissingContribution(ParticipantId::from(2)),
                );
            }

            #[test]
            fn [<$name _empty_round_is_rejected>]() {
                let mut rng = ChaCha20Rng::from_seed([8_u8; 32]);
                let scheme = $make(&mut rng);
                let registry = Registry::new(&scheme, 2, &mut rng);
                assert!(matches!(
                    RoundState::start(1, &scheme, &NoopObserver, set(&[]), &registry.shares),
                    Err(ProtocolError::EmptyParticipantSet)
                ));
            }

            #[test]
            fn [<$name _wrong_matrix_size_is_rejected>]() {
                let mut rng = ChaCha20Rng::from_seed([9_u8; 32]);
                let scheme = $make(&mut rng);
                let registry = Registry::new(&scheme, 1, &mut rng);
                let weights = vec![Array2::from_elem((3, 3), Weight::from_i64(1))];
                assert!(matches!(
                    run_round(&scheme, &registry, &[1], &weights, &mut rng),
                    Err(ProtocolError::ShapeMismatch { expected: 2, rows: 3, cols: 3 })
                ));
            }
        }
    };
}

aggregation_suite!(ecc_full, ecc_full);
aggregation_suite!(ecc_short, ecc_short);
aggregation_suite!(elgamal, elgamal);

#[test]
fn ecc_bounded_recovery() {
    let group = EccGroup::default();
    let bound = search_bound(124, 3);
    let inside = group.scalar_multiply(&array![[372]])[[0, 0]];
    let outside = group.scalar_multiply(&array![[373]])[[0, 0]];
    assert_eq!(recover_scalar(&group, &inside, bound).unwrap(), 372);
    assert_eq!(
        recover_scalar(&group, &outside, bound).unwrap_err(),
        ProtocolError::DiscreteLogNotFound { bound },
    );
}

#[test]
fn elgamal_bounded_recovery() {
    let group = ModularGroup::new(BigUint::from(2_u8), BigUint::from(1_000_000_007_u64)).unwrap();
    let bound = search_bound(10, 3);
    let inside = group.pow(&BigUint::from(30_u8));
    let outside = group.pow(&BigUint::from(31_u8));
    assert_eq!(recover_exponent(&group, &inside, bound).unwrap(), 30);
    assert_eq!(
        recover_exponent(&group, &outside, bound).unwrap_err(),
        ProtocolError::DiscreteLogNotFound { bound },
    );
}

fn assert_key_depends_on_every_share<P>(scheme: &P, rng: &mut ChaCha20Rng)
where
    P: SecureAggregationScheme,
    P::CollectiveKey: PartialEq,
{
    let registry = Registry::new(scheme, 4, rng);
    let other = Registry::new(scheme, 4, rng);
    let all = registry.all();
    let key = scheme.derive_collective_key(&all, &registry.shares).unwrap();
    assert!(scheme.derive_collective_key(&all, &registry.shares).unwrap() == key);

    // same participant set, one share replaced at a time
    for id in &all {
        let mut shares = registry.shares.clone();
        shares.insert(*id, other.shares[id].clone());
        let replaced = scheme.derive_collective_key(&all, &shares).unwrap();
        assert!(replaced != key);
    }
}

#[test]
fn collective_key_depends_on_every_share() {
    let mut rng = ChaCha20Rng::from_seed([10_u8; 32]);
    let elgamal = elgamal(&mut rng);
    assert_key_depends_on_every_share(&elgamal, &mut rng);
    let ecc = ecc_full(&mut rng);
    assert_key_depends_on_every_share(&ecc, &mut rng);
}
