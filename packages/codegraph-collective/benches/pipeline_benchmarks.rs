//! Benchmarks for pipeline performance
//!
//! Run with: cargo bench --bench pipeline_benchmarks

use codegraph_collective::config::TaintMode;
use codegraph_collective::ir::{Linkage, Type};
use codegraph_collective::{
    analyze, AnalysisConfig, AnalysisSession, CollectiveRegistry, Module, ModuleBuilder,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

/// A chain of `depth` internal functions, each storing into a shared global
/// and calling a barrier under a rank test
fn generate_chain(depth: usize) -> Module {
    let mut mb = ModuleBuilder::new(format!("chain_{depth}"));
    let comm_rank = mb.declare("MPI_Comm_rank", &[Type::Int, Type::Ptr], Type::Int);
    let barrier = mb.declare("MPI_Barrier", &[Type::Int], Type::Int);
    let g = mb.global("state", None);

    let funcs: Vec<_> = (0..depth)
        .map(|i| {
            let f = mb.define(&format!("step_{i}"), &[Type::Int], Type::Void);
            mb.set_linkage(f, Linkage::Internal);
            f
        })
        .collect();
    let main = mb.define("main", &[], Type::Int);

    for (i, &f) in funcs.iter().enumerate() {
        let mut b = mb.body(f);
        let x = b.param(0);
        let zero = b.const_int(0);
        b.store(x, g);
        let loaded = b.load(Type::Int, g);
        let cond = b.cmp(loaded, zero);
        let then = b.block("then");
        let join = b.block("join");
        b.cond_br(cond, then, join);
        b.switch_to(then);
        b.call(barrier, &[zero]);
        b.br(join);
        b.switch_to(join);
        if let Some(&next) = funcs.get(i + 1) {
            b.call(next, &[x]);
        }
        b.ret(None);
    }

    {
        let mut b = mb.body(main);
        let rank = b.alloca("rank");
        let zero = b.const_int(0);
        b.call(comm_rank, &[zero, rank]);
        let r = b.load(Type::Int, rank);
        if let Some(&first) = funcs.first() {
            b.call(first, &[r]);
        }
        b.ret(Some(zero));
    }
    mb.finish()
}

/// Benchmark full analysis
fn bench_analyze(c: &mut Criterion) {
    let mut group = c.benchmark_group("analyze");
    let registry = CollectiveRegistry::standard();

    for depth in [10usize, 50, 200] {
        let module = generate_chain(depth);
        group.throughput(Throughput::Elements(depth as u64));

        for (label, mode) in [
            ("ci", TaintMode::ContextInsensitive),
            ("cs", TaintMode::ContextSensitive),
        ] {
            let config = AnalysisConfig::default().taint(|t| t.mode(mode));
            group.bench_with_input(
                BenchmarkId::new(label, depth),
                &module,
                |b, module| {
                    b.iter(|| analyze(black_box(module), &config, &registry));
                },
            );
        }
    }

    group.finish();
}

/// Benchmark the layers up to memory SSA
fn bench_memory_ssa(c: &mut Criterion) {
    let mut group = c.benchmark_group("memory_ssa");

    for depth in [10usize, 50, 200] {
        let module = generate_chain(depth);
        group.bench_with_input(BenchmarkId::from_parameter(depth), &module, |b, module| {
            b.iter(|| {
                let session = AnalysisSession::new(
                    black_box(module),
                    AnalysisConfig::default(),
                    CollectiveRegistry::standard(),
                )
                .unwrap();
                session.memory_ssa().stats().clone()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_analyze, bench_memory_ssa);
criterion_main!(benches);
