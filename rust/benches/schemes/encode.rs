mod utils;

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use paste::paste;

use secagg_core::SecureAggregationScheme;
use utils::{ecc_full, ecc_short, elgamal, rng, Fixture};

macro_rules! fn_encode {
    ($scheme: ident, $size: literal) => {
        paste! {
            fn [<encode_ $scheme _ $size>](crit: &mut Criterion) {
                let mut rng = rng();
                let scheme = $scheme($size, &mut rng);
                let fixture = Fixture::new(&scheme, &mut rng);
                let round = fixture.setup(&scheme, &mut rng);

                crit.bench_function(
                    format!("encode {}x{} weights ({})", $size, $size, stringify!($scheme)).as_str(),
                    |bench| {
                        bench.iter(|| {
                            scheme.encode(
                                &fixture.secrets[0],
                                round.round_key(),
                                black_box(&fixture.weights),
                                &mut rng,
                            )
                        })
                    },
                );
            }
        }
    };
}

fn_encode!(ecc_full, 4);
fn_encode!(ecc_full, 16);
fn_encode!(ecc_short, 4);
fn_encode!(ecc_short, 16);
fn_encode!(elgamal, 4);
fn_encode!(elgamal, 16);

criterion_group!(
    name = bench_encode;
    config = Criterion::default().sample_size(50).measurement_time(Duration::new(10, 0));
    targets =
        encode_ecc_full_4,
        encode_ecc_full_16,
        encode_ecc_short_4,
        encode_ecc_short_16,
        encode_elgamal_4,
        encode_elgamal_16,
);
criterion_main!(bench_encode);
