use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use futures_lite::future::block_on;
use futures_lite::prelude::*;
use pipe_concurrency::stage::{Concatenator, Transformer};
use pipe_concurrency::{stream, Context, Descriptor, Item, Pipe};

const ITEMS_PER_PIPE: usize = 10;

fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan-in");
    for pipes in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("merge", pipes), &pipes, |b, &n| {
            b.iter(|| merge_test(black_box(n)))
        });
        group.bench_with_input(BenchmarkId::new("queue", pipes), &pipes, |b, &n| {
            b.iter(|| queue_test(black_box(n)))
        });
    }
    group.finish();

    c.bench_function("stages 100", |b| b.iter(|| stages_test(black_box(100))));
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);

fn pipes(ctx: &Context, n: usize) -> Vec<Pipe> {
    (0..n)
        .map(|i| {
            let items: Vec<Item> = (0..ITEMS_PER_PIPE)
                .map(|j| Item::from_bytes(Descriptor::new(format!("{i}-{j}")), "payload"))
                .collect();
            Pipe::from_items(ctx.clone(), items)
        })
        .collect()
}

async fn count(mut pipe: Pipe) -> usize {
    let mut counter = 0;
    while let Some(item) = pipe.next().await {
        item.release();
        counter += 1;
    }
    counter
}

fn merge_test(n: usize) {
    block_on(async {
        let ctx = Context::background();
        let merged = stream::merge(&ctx, pipes(&ctx, n));
        assert_eq!(count(merged).await, n * ITEMS_PER_PIPE);
    })
}

fn queue_test(n: usize) {
    block_on(async {
        let ctx = Context::background();
        let mut all = pipes(&ctx, n).into_iter();
        let Some(first) = all.next() else { return };
        let queued = stream::queue(first, all);
        assert_eq!(count(queued).await, n * ITEMS_PER_PIPE);
    })
}

fn stages_test(n: usize) {
    block_on(async {
        let ctx = Context::background();
        let merged = stream::merge(&ctx, pipes(&ctx, n));
        let bundle = merged
            .pipe(Transformer::new(|item| item))
            .pipe(Concatenator::new("bundle"));
        assert_eq!(count(bundle).await, 1);
    })
}
