use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use num::bigint::BigUint;
use paste::paste;

use secagg_core::{
    crypto::ModularGroup,
    recovery::{recover_mask_exponent, DiscreteLogTable},
};

fn group() -> ModularGroup {
    ModularGroup::new(BigUint::from(2_u8), BigUint::from(1_000_000_007_u64)).unwrap()
}

macro_rules! fn_discrete_log {
    ($name: ident, $bound: expr) => {
        paste! {
            #[allow(non_snake_case)]
            fn [<discrete_log $name>](crit: &mut Criterion) {
                let group = group();
                let bound: u64 = $bound;
                // worst case for the linear search
                let target = group.pow(&BigUint::from(bound - 1));
                let name = &stringify!($name)[1..];

                crit.bench_function(
                    format!("linear search below {}", name).as_str(),
                    |bench| {
                        bench.iter(|| recover_mask_exponent(group.powers(), black_box(&target), bound))
                    },
                );

                let table = DiscreteLogTable::new(group.powers(), bound);
                crit.bench_function(
                    format!("table lookup below {}", name).as_str(),
                    |bench| bench.iter(|| table.lookup(black_box(&target))),
                );
            }
        }
    };
}

fn_discrete_log!(_100, 100);

fn_discrete_log!(_1k, 1_000);

fn_discrete_log!(_10k, 10_000);

criterion_group!(
    name = bench_discrete_log;
    config = Criterion::default().sample_size(100).measurement_time(Duration::new(10, 0));
    targets =
        discrete_log_100,
        discrete_log_1k,
        discrete_log_10k,
);
criterion_main!(bench_discrete_log);
