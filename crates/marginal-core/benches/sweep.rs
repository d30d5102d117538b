use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use marginal_core::engine::driver::InferenceProgram;
use marginal_core::engine::message::{Gaussian, Message};
use marginal_core::engine::observed::{ObservedShape, ObservedValue};
use marginal_core::engine::store::{MemoryArray, MessageStore};

struct SweepState {
    messages: MemoryArray,
    marginal: Gaussian,
}

// A synthetic program shaped like the real learners: one warm-start unit and
// one iterative sweep folding a product over a message array.
fn sweep_program(n: usize) -> InferenceProgram<SweepState> {
    let mut program = InferenceProgram::new(SweepState {
        messages: MemoryArray::new(n, |_| Message::Gaussian(Gaussian::uniform())),
        marginal: Gaussian::uniform(),
    });
    program.declare_observed("data", ObservedShape::Array { len: n }).unwrap();
    program
        .schedule_mut()
        .register_init("initialise", &[], &[], true, |s, _, _| {
            s.marginal = Gaussian::uniform();
            Ok(())
        })
        .unwrap();
    program
        .schedule_mut()
        .register_iterative("sweep", &["data"], &["initialise"], |s, obs, span| {
            let xs = obs.reals("data")?;
            for _ in span {
                for (i, &x) in xs.iter().enumerate() {
                    s.messages
                        .set(i, Message::Gaussian(Gaussian::from_mean_and_precision(x, 1.0)))?;
                }
                let mut folded = Gaussian::uniform();
                for i in 0..s.messages.len() {
                    folded = folded.product(&s.messages.get(i)?.gaussian()?)?;
                }
                s.marginal = folded;
            }
            Ok(())
        })
        .unwrap();
    program
        .register_marginal("posterior", |s| Ok(Message::Gaussian(s.marginal)))
        .unwrap();
    program
}

fn bench_cold_execute(c: &mut Criterion) {
    let mut group = c.benchmark_group("cold_execute");
    for n in [64usize, 1024] {
        let data: Vec<f64> = (0..n).map(|i| i as f64 * 0.01).collect();
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let mut program = sweep_program(n);
                program
                    .set_observed("data", ObservedValue::Reals(data.clone()))
                    .unwrap();
                program.execute(10).unwrap();
                program.marginal("posterior").unwrap()
            })
        });
    }
    group.finish();
}

fn bench_resumed_update(c: &mut Criterion) {
    let n = 1024;
    let data: Vec<f64> = (0..n).map(|i| i as f64 * 0.01).collect();
    let mut program = sweep_program(n);
    program
        .set_observed("data", ObservedValue::Reals(data))
        .unwrap();
    program.execute(1).unwrap();

    c.bench_function("resumed_update", |b| {
        b.iter(|| {
            program.update(1).unwrap();
            program.marginal("posterior").unwrap()
        })
    });
}

fn bench_message_product_fold(c: &mut Criterion) {
    let messages: Vec<Gaussian> = (0..4096)
        .map(|i| Gaussian::from_mean_and_precision(i as f64 * 0.001, 0.5))
        .collect();
    c.bench_function("message_product_fold_4096", |b| {
        b.iter(|| {
            let mut folded = Gaussian::uniform();
            for m in &messages {
                folded = folded.product(m).unwrap();
            }
            folded
        })
    });
}

criterion_group!(
    benches,
    bench_cold_execute,
    bench_resumed_update,
    bench_message_product_fold
);
criterion_main!(benches);
