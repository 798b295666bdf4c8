use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use meta_sim::{
    BalanceCalculationSettings, GamePhase, MetaSimulation, MetaSimulationConfig, ResourcePool,
};

fn configure_simulation(iterations: u32) -> MetaSimulation {
    let mut settings = BalanceCalculationSettings::default();
    settings.calculation_iterations = iterations;
    MetaSimulation::new(MetaSimulationConfig::builtin().with_settings(settings))
}

fn run_week(sim: &mut MetaSimulation) {
    sim.advance_week();
    for phase in GamePhase::ALL {
        sim.advance_phase(phase);
        sim.advance_time(5.0);
    }
}

fn bench_recalculation(c: &mut Criterion) {
    let mut group = c.benchmark_group("win_rate_recalculation");

    for iterations in [1u32, 3, 10] {
        group.bench_with_input(
            BenchmarkId::new("iterations", iterations),
            &iterations,
            |b, &iterations| {
                b.iter_batched(
                    || configure_simulation(iterations),
                    |mut sim| {
                        sim.recalculate_win_rates();
                    },
                    BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

fn bench_season(c: &mut Criterion) {
    let mut group = c.benchmark_group("season");

    group.bench_function("ten_weeks", |b| {
        b.iter_batched(
            || {
                MetaSimulation::new(
                    MetaSimulationConfig::builtin().with_resources(ResourcePool::new(100, 100)),
                )
            },
            |mut sim| {
                for _ in 0..10 {
                    run_week(&mut sim);
                }
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(recalc_benches, bench_recalculation, bench_season);
criterion_main!(recalc_benches);
