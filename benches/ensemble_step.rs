//! Benchmarks for population and oscillator ensembles.
//!
//! Run:
//! - cargo bench

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use lfpsim::core::rng::{SeedRecord, seeded_rng};
use lfpsim::core::timegrid::TimeGrid;
use lfpsim::sim::drive::DriveKind;
use lfpsim::sim::ensemble::{
    EnsembleRunner, JitterSpec, OscillatorEnsembleConfig, PopulationEnsembleConfig,
};
use lfpsim::sim::integrator::IntegratorKind;
use lfpsim::sim::oscillator::{KuramotoParams, OscillatorNetwork};
use lfpsim::sim::population::WilsonCowanParams;

const MEMBER_COUNTS: [usize; 3] = [1, 8, 32];
const NETWORK_SIZES: [usize; 3] = [10, 100, 1000];

fn bench_population(c: &mut Criterion) {
    let grid = TimeGrid::new(1.0, 1e-3).expect("grid");
    let mut group = c.benchmark_group("population_ensemble");
    for &members in &MEMBER_COUNTS {
        let cfg = PopulationEnsembleConfig {
            members,
            drive: DriveKind::Constant { amplitude: 2.0 },
            q: 1.0,
            sigma: 0.05,
            jitter: JitterSpec {
                relative_std: 0.1,
                inhibitory: false,
            },
            params: WilsonCowanParams::default(),
        };
        for parallel in [false, true] {
            let runner =
                EnsembleRunner::new(grid, SeedRecord::resolve(Some(1))).with_parallel(parallel);
            let label = if parallel { "parallel" } else { "sequential" };
            group.bench_with_input(BenchmarkId::new(label, members), &cfg, |b, cfg| {
                b.iter(|| black_box(runner.run_population(cfg).expect("run")));
            });
        }
    }
    group.finish();
}

fn bench_kuramoto(c: &mut Criterion) {
    let grid = TimeGrid::new(0.5, 1e-2).expect("grid");
    let mut group = c.benchmark_group("kuramoto_network");
    for &n in &NETWORK_SIZES {
        for (label, integrator) in [
            ("adaptive", IntegratorKind::default()),
            ("rk4", IntegratorKind::Rk4 { substeps: 4 }),
        ] {
            let params = KuramotoParams {
                n_oscillators: n,
                integrator,
                ..KuramotoParams::default()
            };
            let net = OscillatorNetwork::new(params, &mut seeded_rng(3)).expect("network");
            group.bench_with_input(BenchmarkId::new(label, n), &net, |b, net| {
                b.iter(|| black_box(net.simulate(&grid, &mut seeded_rng(4)).expect("simulate")));
            });
        }
    }
    group.finish();
}

fn bench_oscillator_ensemble(c: &mut Criterion) {
    let grid = TimeGrid::new(0.5, 1e-2).expect("grid");
    let cfg = OscillatorEnsembleConfig {
        members: 8,
        params: KuramotoParams {
            n_oscillators: 100,
            sigma: 0.1,
            p_on: 0.9,
            ..KuramotoParams::default()
        },
    };
    let runner = EnsembleRunner::new(grid, SeedRecord::resolve(Some(2)));
    c.bench_function("oscillator_ensemble_stochastic", |b| {
        b.iter(|| black_box(runner.run_oscillator(&cfg).expect("run")));
    });
}

criterion_group!(benches, bench_population, bench_kuramoto, bench_oscillator_ensemble);
criterion_main!(benches);
