// Entry point: resolves config and flags, runs one ensemble, writes its bundle.
use std::fs;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use lfpsim::cli::{Args, Command};
use lfpsim::config::SimConfig;
use lfpsim::sim::bundle::ResultBundle;
use lfpsim::sim::ensemble::EnsembleRunner;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr so stdout stays clean for the schema and bundle path.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cfg = SimConfig::load_or_default(args.config.as_deref())
        .with_context(|| format!("loading config {:?}", args.config))?;
    let out_dir = args.out_dir.as_deref();

    match &args.command {
        Command::Population(pop) => {
            let job = pop.resolve(&cfg, out_dir).context("resolving population run")?;
            let bundle = EnsembleRunner::new(job.grid, job.seed)
                .with_parallel(job.parallel)
                .run_population(&job.ensemble)
                .context("population ensemble failed")?;
            bundle
                .write_json(&job.out)
                .with_context(|| format!("writing {}", job.out.display()))?;
            println!("{}", job.out.display());
        }
        Command::Kuramoto(kur) => {
            let job = kur.resolve(&cfg, out_dir).context("resolving kuramoto run")?;
            let bundle = EnsembleRunner::new(job.grid, job.seed)
                .with_parallel(job.parallel)
                .run_oscillator(&job.ensemble)
                .context("oscillator ensemble failed")?;
            bundle
                .write_json(&job.out)
                .with_context(|| format!("writing {}", job.out.display()))?;
            println!("{}", job.out.display());
        }
        Command::Schema { out } => {
            let text = serde_json::to_string_pretty(&ResultBundle::schema())?;
            match out {
                Some(path) => fs::write(path, text)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => println!("{text}"),
            }
        }
    }
    Ok(())
}
