use std::{path::PathBuf, process};

use anyhow::Context;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use structopt::StructOpt;
use tracing::info;
use tracing_subscriber::FmtSubscriber;

use secagg_core::{EccScheme, ElGamalScheme, SecureAggregationScheme};
use secagg_server::{
    coordinator::Coordinator,
    settings::{RoundSettings, SchemeKind, Settings},
};

#[derive(Debug, StructOpt)]
#[structopt(name = "Coordinator")]
struct Opt {
    /// Path of the configuration file
    #[structopt(short, parse(from_os_str))]
    config_path: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let opt = Opt::from_args();

    let settings = Settings::new(opt.config_path).unwrap_or_else(|err| {
        eprintln!("{}", err);
        process::exit(1);
    });
    let Settings { scheme, rounds, log } = settings;

    let _fmt_subscriber = FmtSubscriber::builder()
        .with_env_filter(log.filter)
        .with_ansi(true)
        .init();

    let mut rng = ChaCha20Rng::from_entropy();
    match scheme.kind {
        SchemeKind::Ecc => {
            let scheme = EccScheme::new(scheme.ecc_config(), &mut rng)
                .context("failed to set up the elliptic-curve scheme")?;
            run(scheme, rounds, rng)
        }
        SchemeKind::Elgamal => {
            let scheme = ElGamalScheme::new(scheme.elgamal_config(), &mut rng)
                .context("failed to set up the classic scheme")?;
            run(scheme, rounds, rng)
        }
    }
}

fn run<P: SecureAggregationScheme>(
    scheme: P,
    rounds: RoundSettings,
    rng: ChaCha20Rng,
) -> anyhow::Result<()> {
    info!("{}", scheme.group_context());
    let mut coordinator = Coordinator::new(scheme, rounds, rng)?;
    coordinator.run().context("aggregation failed")
}
