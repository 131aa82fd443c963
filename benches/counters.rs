use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::prelude::*;

use freqcount::{CsurosCounter, ExactCounter, LossyCounter};

fn generate_keys(count: usize, distinct: u64) -> Vec<u64> {
    let mut rng = rand::thread_rng();

    let mut workload: Vec<u64> =
        (0..count).map(|i| i as u64 % distinct).collect();

    workload.shuffle(&mut rng);

    workload
}

fn bench_observe(c: &mut Criterion) {
    let workload = generate_keys(2000, 100);

    let mut exact = ExactCounter::new();

    c.bench_function("exact_observe", |b| {
        b.iter(|| {
            for key in &workload {
                exact.observe(*key);
            }
        })
    });

    macro_rules! bench_csuros {
        ($benchname:expr, $base:expr) => {
            let mut counter: CsurosCounter<u64> =
                CsurosCounter::new($base).unwrap();

            c.bench_function($benchname, |b| {
                b.iter(|| {
                    for key in &workload {
                        counter.observe(*key);
                    }
                })
            });
        };
    }

    bench_csuros!["csuros_observe_b15", 1.5];
    bench_csuros!["csuros_observe_b20", 2.0];
    bench_csuros!["csuros_observe_b40", 4.0];

    macro_rules! bench_lossy {
        ($benchname:expr, $epsilon:expr) => {
            let mut counter: LossyCounter<u64> =
                LossyCounter::new($epsilon).unwrap();

            c.bench_function($benchname, |b| {
                b.iter(|| {
                    for key in &workload {
                        counter.observe(*key);
                    }
                })
            });
        };
    }

    bench_lossy!["lossy_observe_w10", 0.1];
    bench_lossy!["lossy_observe_w100", 0.01];
    bench_lossy!["lossy_observe_w1000", 0.001];
}

fn bench_query(c: &mut Criterion) {
    let workload = generate_keys(2000, 100);

    let mut exact = ExactCounter::new();

    for key in &workload {
        exact.observe(*key);
    }

    c.bench_function("exact_most_frequent_10", |b| {
        b.iter(|| {
            let top = exact.most_frequent(10).unwrap();
            black_box(top);
        })
    });

    let mut csuros: CsurosCounter<u64> = CsurosCounter::new(2.0).unwrap();

    for key in &workload {
        csuros.observe(*key);
    }

    c.bench_function("csuros_most_frequent_10", |b| {
        b.iter(|| {
            let top = csuros.most_frequent(10).unwrap();
            black_box(top);
        })
    });

    macro_rules! bench_frequent {
        ($benchname:expr, $epsilon:expr, $support:expr) => {
            let mut counter: LossyCounter<u64> =
                LossyCounter::new($epsilon).unwrap();

            for key in &workload {
                counter.observe(*key);
            }

            c.bench_function($benchname, |b| {
                b.iter(|| {
                    let frequent = counter.frequent($support).unwrap();
                    black_box(frequent);
                })
            });
        };
    }

    bench_frequent!["lossy_frequent_w100", 0.01, 0.02];
    bench_frequent!["lossy_frequent_w1000", 0.001, 0.002];
}

criterion_group!(benches, bench_observe, bench_query);

criterion_main!(benches);
