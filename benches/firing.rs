use std::hint::black_box;
use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};
use RustSPN::net::{Multiset, Net};
use RustSPN::sim::{Distributions, Exponential, RunConfig, Simulation, StopCondition};

/// SIR epidemic until extinction; the infect rule has |S|·|I| live matches.
fn bench_sir(c: &mut Criterion) {
    let net = Net::labeled(["S", "I", "R"])
        .unwrap()
        .with_transition(
            "infect",
            Multiset::new().with("S", 1).with("I", 1),
            Multiset::new().with("I", 2),
        )
        .unwrap()
        .with_transition("recover", Multiset::new().with("I", 1), Multiset::new().with("R", 1))
        .unwrap();
    let mut distributions = Distributions::new();
    distributions.insert("infect".into(), Arc::new(Exponential { rate: 0.01 }));
    distributions.insert("recover".into(), Arc::new(Exponential { rate: 0.1 }));
    let initial = Multiset::new().with("S", 200).with("I", 5);
    let config = RunConfig {
        seed: 42,
        stop: StopCondition {
            max_events: Some(10_000),
            max_time: None,
        },
        record_trajectory: false,
    };

    c.bench_function("sir_to_extinction", |b| {
        b.iter(|| {
            let mut sim = Simulation::new(&net, &distributions, &initial, &config).unwrap();
            black_box(sim.run().unwrap())
        })
    });
}

criterion_group!(benches, bench_sir);
criterion_main!(benches);
