mod utils;

use std::time::Duration;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use paste::paste;

use secagg_core::SecureAggregationScheme;
use utils::{ecc_full, ecc_short, elgamal, rng, Fixture, PARTICIPANTS};

macro_rules! fn_finish {
    ($scheme: ident, $size: literal) => {
        paste! {
            fn [<finish_ $scheme _ $size>](crit: &mut Criterion) {
                let mut rng = rng();
                let scheme = $scheme($size, &mut rng);
                let fixture = Fixture::new(&scheme, &mut rng);

                crit.bench_function(
                    format!(
                        "combine and decode {} contributions of {}x{} weights ({})",
                        PARTICIPANTS, $size, $size, stringify!($scheme),
                    )
                    .as_str(),
                    |bench| {
                        bench.iter_batched(
                            || {
                                let mut round = fixture.setup(&scheme, &mut rng);
                                for secrets in &fixture.secrets {
                                    let contribution = scheme
                                        .contribute(secrets, round.round_key(), &fixture.weights, &mut rng)
                                        .unwrap();
                                    round.submit(contribution).unwrap();
                                }
                                round
                            },
                            |round| round.finish(),
                            BatchSize::SmallInput,
                        )
                    },
                );
            }
        }
    };
}

fn_finish!(ecc_full, 4);
fn_finish!(ecc_short, 4);
fn_finish!(elgamal, 4);

criterion_group!(
    name = bench_finish;
    config = Criterion::default().sample_size(10).measurement_time(Duration::new(10, 0));
    targets =
        finish_ecc_full_4,
        finish_ecc_short_4,
        finish_elgamal_4,
);
criterion_main!(bench_finish);
