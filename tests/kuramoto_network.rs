use std::f64::consts::PI;

use approx::assert_abs_diff_eq;

use lfpsim::core::phase::shift_pm_pi;
use lfpsim::core::rng::{SeedRecord, seeded_rng};
use lfpsim::core::timegrid::TimeGrid;
use lfpsim::sim::SimError;
use lfpsim::sim::bundle::Traces;
use lfpsim::sim::ensemble::{EnsembleRunner, OscillatorEnsembleConfig};
use lfpsim::sim::integrator::IntegratorKind;
use lfpsim::sim::oscillator::{KuramotoParams, OscillatorNetwork, OscillatorTrajectory};

fn params(n: usize) -> KuramotoParams {
    KuramotoParams {
        n_oscillators: n,
        ..KuramotoParams::default()
    }
}

fn run(params: KuramotoParams, duration: f64, seed: u64) -> OscillatorTrajectory {
    let grid = TimeGrid::new(duration, 1e-2).unwrap();
    let mut rng = seeded_rng(seed);
    let net = OscillatorNetwork::new(params, &mut rng).unwrap();
    net.simulate(&grid, &mut rng).unwrap()
}

#[test]
fn read_out_phases_stay_in_half_open_interval() {
    let traj = run(params(50), 1.0, 1);
    for row in traj.phases.rows() {
        assert!(row.iter().all(|&p| (-PI..PI).contains(&p)));
    }
    let noisy = run(
        KuramotoParams {
            sigma: 0.5,
            p_on: 0.7,
            ..params(50)
        },
        1.0,
        1,
    );
    for row in noisy.phases.rows() {
        assert!(row.iter().all(|&p| (-PI..PI).contains(&p)));
    }
}

#[test]
fn same_seed_same_trajectory() {
    let p = KuramotoParams {
        sigma: 0.3,
        ..params(30)
    };
    assert_eq!(run(p, 0.5, 9), run(p, 0.5, 9));
    assert_ne!(run(p, 0.5, 9).phases, run(p, 0.5, 10).phases);
    assert_eq!(run(params(30), 0.5, 9), run(params(30), 0.5, 9));
}

#[test]
fn strong_coupling_synchronizes() {
    let traj = run(params(200), 6.0, 42);
    assert!(traj.order[0] < 0.5, "initial order {}", traj.order[0]);
    let last = *traj.order.last().unwrap();
    assert!(last > 0.95, "final order {last}");
}

#[test]
fn adaptive_and_rk4_agree() {
    let adaptive = run(params(20), 1.0, 5);
    let rk4 = run(
        KuramotoParams {
            integrator: IntegratorKind::Rk4 { substeps: 20 },
            ..params(20)
        },
        1.0,
        5,
    );
    assert_eq!(adaptive.omegas, rk4.omegas);
    for (a, b) in adaptive.waves.rows().iter().zip(rk4.waves.rows()) {
        for (x, y) in a.iter().zip(b) {
            assert_abs_diff_eq!(*x, *y, epsilon = 1e-5);
        }
    }
}

#[test]
fn fully_gated_network_is_frozen() {
    let traj = run(
        KuramotoParams {
            p_on: 0.0,
            ..params(25)
        },
        0.5,
        3,
    );
    for (row, &th0) in traj.phases.rows().iter().zip(&traj.theta0) {
        let start = shift_pm_pi(th0);
        assert!(row.iter().all(|&p| p == start));
    }
}

#[test]
fn single_network_lfp_is_its_mean_wave() {
    let grid = TimeGrid::new(0.5, 1e-2).unwrap();
    let cfg = OscillatorEnsembleConfig {
        members: 1,
        params: params(40),
    };
    let bundle = EnsembleRunner::new(grid, SeedRecord::resolve(Some(42)))
        .run_oscillator(&cfg)
        .unwrap();
    let Traces::Oscillator { networks, .. } = bundle.traces() else {
        panic!("expected oscillator traces");
    };
    assert_eq!(bundle.lfp(), networks[0].mean_wave().unwrap().as_slice());
}

#[test]
fn networks_of_an_ensemble_are_independent() {
    let grid = TimeGrid::new(0.2, 1e-2).unwrap();
    let cfg = OscillatorEnsembleConfig {
        members: 3,
        params: params(10),
    };
    let runner = EnsembleRunner::new(grid, SeedRecord::resolve(Some(1)));
    let bundle = runner.run_oscillator(&cfg).unwrap();
    let Traces::Oscillator { networks, members, .. } = bundle.traces() else {
        panic!("expected oscillator traces");
    };
    assert_eq!(members.len(), 3);
    assert_ne!(networks[0].omegas, networks[1].omegas);
    assert_ne!(members[0].seed, members[1].seed);

    let seq = runner.with_parallel(false).run_oscillator(&cfg).unwrap();
    assert_eq!(bundle, seq);
}

#[test]
fn invalid_frequency_range_fails_before_running() {
    let grid = TimeGrid::new(0.2, 1e-2).unwrap();
    let cfg = OscillatorEnsembleConfig {
        members: 1,
        params: KuramotoParams {
            omega: 0.5,
            omega_range: 1.0,
            ..params(10)
        },
    };
    let err = EnsembleRunner::new(grid, SeedRecord::resolve(Some(1)))
        .run_oscillator(&cfg)
        .unwrap_err();
    assert!(matches!(err, SimError::InvalidParameter { name: "omega_range", .. }));
}
