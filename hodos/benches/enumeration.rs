use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hodos::filter::select;
use hodos::prelude::*;

// =============================================================================
// Fixtures
// =============================================================================

/// `depth` chained steps with `width` options each
fn grid(depth: usize, width: usize) -> Graph<u64> {
    let mut graph = Graph::new();
    for step in 0..depth {
        for option in 0..width {
            let salt = (step * width + option) as u64;
            graph
                .add_option(
                    format!("s{step}"),
                    format!("o{option}"),
                    move |inputs: &[u64]| Ok::<_, String>(inputs[0].wrapping_mul(31).wrapping_add(salt)),
                )
                .unwrap();
        }
    }
    graph
}

// =============================================================================
// Enumeration
// =============================================================================

fn bench_enumeration(c: &mut Criterion) {
    let mut group = c.benchmark_group("enumeration");
    let graph = grid(6, 4);

    // 4^6 = 4096 paths
    group.bench_function("include_all", |b| {
        b.iter(|| {
            let selection = select(&graph, &Target::Latest, &OptionPin::Any, &Include::All, None)
                .unwrap();
            black_box(selection.paths.len())
        })
    });

    // Pushdown prunes at the first step, so almost nothing is visited
    let narrow = Include::Filter(Filter::from_iter([("s0", "o1"), ("s1", "o2")]));
    group.bench_function("include_pushdown", |b| {
        b.iter(|| {
            let selection = select(&graph, &Target::Latest, &OptionPin::Any, &narrow, None).unwrap();
            black_box(selection.paths.len())
        })
    });

    let exclude = Filter::from_iter([("s5", "o0")]).or(Assignment::new().with("s2", "o3"));
    group.bench_function("exclude_two_entries", |b| {
        b.iter(|| {
            let selection = select(
                &graph,
                &Target::Latest,
                &OptionPin::Any,
                &Include::All,
                Some(&exclude),
            )
            .unwrap();
            black_box(selection.paths.len())
        })
    });

    group.finish();
}

// =============================================================================
// Execution
// =============================================================================

fn bench_execution(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("execution");
    let graph = grid(4, 3);
    let inputs = Inputs::from(7u64);
    let options = ExecuteOptions::new().all().any_option();

    group.bench_function("depth_first_uncached", |b| {
        let executor = Executor::new(ExecutorConfig::default());
        b.iter(|| rt.block_on(async { black_box(executor.execute(&graph, &inputs, &options).await.unwrap()) }))
    });

    group.bench_function("breadth_first_uncached", |b| {
        let executor = Executor::new(ExecutorConfig::default().with_strategy(Strategy::BreadthFirst));
        b.iter(|| rt.block_on(async { black_box(executor.execute(&graph, &inputs, &options).await.unwrap()) }))
    });

    group.bench_function("depth_first_warm_cache", |b| {
        let executor = Executor::in_memory();
        rt.block_on(executor.execute(&graph, &inputs, &options)).unwrap();
        b.iter(|| rt.block_on(async { black_box(executor.execute(&graph, &inputs, &options).await.unwrap()) }))
    });

    group.finish();
}

criterion_group!(benches, bench_enumeration, bench_execution);
criterion_main!(benches);
