use criterion::{criterion_group, criterion_main, Criterion};
use itertools::Itertools;
use rand::{thread_rng, Rng};
use switch_lower::asm::Label;
use switch_lower::switch::{BinaryStrategy, Key, SequentialStrategy, SwitchOp, SwitchStrategy};
use switch_lower::target::{CpuFeature, Register, TargetConfig, Width};
use switch_lower::EmitCtx;

fn lower<S: SwitchStrategy>(ctx: &mut EmitCtx, op: &SwitchOp<S>, labels: &[Label]) {
    ctx.reset();
    op.emit_code(ctx).unwrap();
    for &label in labels {
        ctx.asm.nop();
        ctx.asm.bind(label).unwrap();
    }
}

fn setup<S: SwitchStrategy>(
    keys: Vec<Key>,
    strategy: impl FnOnce(Vec<Key>) -> S,
) -> (EmitCtx, SwitchOp<S>, Vec<Label>) {
    let mut ctx = EmitCtx::new(TargetConfig::default().with_feature(CpuFeature::Cbcond));
    let mut labels: Vec<Label> = keys.iter().map(|_| ctx.asm.new_label()).collect();
    let default = ctx.asm.new_label();
    let op = SwitchOp::new(
        Some(Register::l(7)),
        strategy(keys),
        labels.clone(),
        default,
        Register::o(0),
        Register::g(1),
        Width::Xword,
    )
    .unwrap();
    labels.push(default);
    (ctx, op, labels)
}

pub fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("sequential mixed keys", |b| {
        let mut rng = thread_rng();
        let keys: Vec<Key> = (0..128).map(|_| rng.gen()).unique().collect();
        let probabilities: Vec<f64> = keys.iter().map(|_| rng.gen()).collect();
        let (mut ctx, op, labels) = setup(keys, |keys| {
            SequentialStrategy::new(keys, &probabilities).unwrap()
        });
        b.iter(|| {
            lower(&mut ctx, &op, &labels);
            ctx.finish().unwrap()
        })
    });

    c.bench_function("binary simple keys", |b| {
        let mut rng = thread_rng();
        let keys: Vec<Key> = (0..512)
            .map(|_| Key::Simple(rng.gen_range(-4096, 4096)))
            .unique()
            .collect();
        let (mut ctx, op, labels) = setup(keys, |keys| BinaryStrategy::new(keys).unwrap());
        b.iter(|| {
            lower(&mut ctx, &op, &labels);
            ctx.finish().unwrap()
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
