//! Scheduler hot-path benchmarks: cached frames vs full re-cooks.

use criterion::{criterion_group, criterion_main, Criterion};

use vivid_core::{accepts, Chain, Context, Inputs, InputSlots, Operator, OutputKind};
use vivid_gpu::HeadlessBackend;

struct Pass {
    inputs: InputSlots,
    out: f32,
    always_cook: bool,
}

impl Pass {
    fn new(always_cook: bool) -> Self {
        Self {
            inputs: InputSlots::new().slot("in", accepts::VALUE),
            out: 0.0,
            always_cook,
        }
    }
}

impl Operator for Pass {
    fn type_name(&self) -> &'static str {
        "Pass"
    }
    fn output_kind(&self) -> OutputKind {
        OutputKind::Value
    }
    fn inputs(&self) -> Option<&InputSlots> {
        Some(&self.inputs)
    }
    fn inputs_mut(&mut self) -> Option<&mut InputSlots> {
        Some(&mut self.inputs)
    }
    fn process(&mut self, _ctx: &mut Context, inputs: &Inputs) {
        self.out = inputs.value(0).unwrap_or(1.0) * 1.0001;
    }
    fn needs_cook(&self, _ctx: &Context) -> bool {
        self.always_cook
    }
    fn value_output(&self) -> Option<f32> {
        Some(self.out)
    }
}

fn build_chain(len: usize, always_cook: bool) -> Chain {
    let mut chain = Chain::new();
    for i in 0..len {
        chain.add(&format!("op{i}"), Pass::new(always_cook)).unwrap();
        if i > 0 {
            chain
                .connect(&format!("op{i}"), 0, &format!("op{}", i - 1))
                .unwrap();
        }
    }
    chain.set_output(format!("op{}", len - 1));
    chain
}

fn bench_process(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_process");

    for &len in &[16usize, 64, 256] {
        group.bench_function(format!("cook_{len}"), |b| {
            let mut ctx = Context::new(Box::new(HeadlessBackend::new()), 64, 64);
            let mut chain = build_chain(len, true);
            chain.process(&mut ctx);
            b.iter(|| chain.process(&mut ctx));
        });

        group.bench_function(format!("cached_{len}"), |b| {
            let mut ctx = Context::new(Box::new(HeadlessBackend::new()), 64, 64);
            let mut chain = build_chain(len, false);
            chain.process(&mut ctx);
            b.iter(|| chain.process(&mut ctx));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_process);
criterion_main!(benches);
