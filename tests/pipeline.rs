use std::time::Duration;

use futures::channel::mpsc;
use futures::SinkExt;
use futures_lite::prelude::*;
use pipe_concurrency::stage::{Concatenator, Inspector, Stage, Transformer};
use pipe_concurrency::{stream, Context, Descriptor, Item, ItemStream, Pipe};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

fn item(name: &str, size: usize) -> Item {
    let descriptor = Descriptor::new(name).with_size(size as u64);
    Item::from_bytes(descriptor, "x".repeat(size))
}

/// Spawns a producer which sends `names` one by one, pausing between items.
fn spawn_producer(ctx: &Context, names: Vec<String>, pause: Duration) -> Pipe {
    let (mut tx, rx) = mpsc::channel(0);
    tokio::spawn(async move {
        for name in names {
            tokio::time::sleep(pause).await;
            if tx.send(item(&name, 1)).await.is_err() {
                break;
            }
        }
    });
    Pipe::new(ctx.clone(), rx)
}

async fn drain(pipe: Pipe) -> Vec<String> {
    pipe.map(|item| {
        let name = item.name().to_owned();
        item.release();
        name
    })
    .collect()
    .await
}

fn names(prefix: &str, n: usize) -> Vec<String> {
    (0..n).map(|i| format!("{prefix}{i}")).collect()
}

#[tokio::test]
async fn merge_yields_every_item_exactly_once() {
    init_tracing();
    let ctx = Context::background();
    let pipes = vec![
        spawn_producer(&ctx, names("a", 5), Duration::from_millis(1)),
        spawn_producer(&ctx, names("b", 3), Duration::from_millis(2)),
        spawn_producer(&ctx, names("c", 4), Duration::ZERO),
    ];

    let mut merged = drain(stream::merge(&ctx, pipes)).await;
    merged.sort();

    let mut expected: Vec<String> = ["a", "b", "c"]
        .iter()
        .zip([5, 3, 4])
        .flat_map(|(prefix, n)| names(prefix, n))
        .collect();
    expected.sort();
    assert_eq!(merged, expected);
}

#[tokio::test]
async fn merge_keeps_per_source_order() {
    init_tracing();
    let ctx = Context::background();
    let pipes = vec![
        spawn_producer(&ctx, names("a", 10), Duration::ZERO),
        spawn_producer(&ctx, names("b", 10), Duration::from_millis(1)),
    ];

    let merged = drain(stream::merge(&ctx, pipes)).await;
    for prefix in ["a", "b"] {
        let from_source: Vec<_> = merged
            .iter()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect();
        assert_eq!(from_source, names(prefix, 10));
    }
}

#[tokio::test]
async fn queue_concatenates_in_order() {
    init_tracing();
    let ctx = Context::background();
    // The later sources are faster, their items still come out last.
    let first = spawn_producer(&ctx, names("a", 3), Duration::from_millis(5));
    let rest = vec![
        spawn_producer(&ctx, names("b", 2), Duration::ZERO),
        spawn_producer(&ctx, names("c", 2), Duration::ZERO),
    ];

    let queued = drain(stream::queue(first, rest)).await;
    assert_eq!(queued, ["a0", "a1", "a2", "b0", "b1", "c0", "c1"]);
}

#[tokio::test]
async fn queue_without_extra_pipes_returns_the_input() {
    let ctx = Context::background();
    let input = Pipe::from_items(ctx.clone(), vec![item("only", 1)]);
    let queued = stream::queue(input, Vec::new());
    assert!(Context::ptr_eq(queued.context(), &ctx));
    assert_eq!(drain(queued).await, ["only"]);
}

#[tokio::test]
async fn concatenates_merged_sources() {
    init_tracing();
    let ctx = Context::background();
    let pipes = vec![
        Pipe::from_items(ctx.clone(), vec![item("a", 10)]),
        Pipe::from_items(ctx.clone(), vec![item("b", 20)]),
        Pipe::from_items(ctx.clone(), vec![item("c", 5)]),
    ];

    let mut bundle = stream::merge(&ctx, pipes).pipe(Concatenator::new("bundle"));
    let mut all = bundle.next().await.unwrap();
    assert_eq!(all.name(), "bundle");
    assert_eq!(all.descriptor().size, 38);

    let mut bytes = Vec::new();
    all.read_to_end(&mut bytes).await.unwrap();
    assert_eq!(bytes.len(), 38);
    assert_eq!(bytes.iter().filter(|b| **b == b'\n').count(), 3);
    all.release();

    assert!(bundle.next().await.is_none());
}

#[tokio::test]
async fn transformer_identity_preserves_items() {
    init_tracing();
    let ctx = Context::background();
    let input = spawn_producer(&ctx, names("x", 3), Duration::ZERO);
    let out = input
        .pipe(Inspector::new("before"))
        .pipe(Transformer::new(|item| item))
        .pipe(Inspector::new("after"));
    assert_eq!(drain(out).await, ["x0", "x1", "x2"]);
}

#[tokio::test]
async fn finished_stage_does_not_cancel_siblings() {
    init_tracing();
    let ctx = Context::background();
    let quick = Pipe::from_items(ctx.clone(), vec![item("q", 1)]).pipe(Transformer::new(|item| item));
    let slow = spawn_producer(&ctx, names("s", 3), Duration::from_millis(10));

    let mut merged = drain(stream::merge(&ctx, [quick, slow])).await;
    merged.sort();
    assert_eq!(merged, ["q", "s0", "s1", "s2"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stages_run_on_spawned_tasks() {
    init_tracing();
    let ctx = Context::background();
    let items: Vec<Item> = names("s", 3).iter().map(|name| item(name, 1)).collect();
    let input: ItemStream = Box::pin(futures_lite::stream::iter(items));
    let (output, received) = mpsc::channel(0);

    let stage = tokio::spawn(Transformer::new(|item| item).execute(ctx.clone(), input, output));
    let forwarded = drain(Pipe::new(ctx, received)).await;

    stage.await.unwrap().unwrap();
    assert_eq!(forwarded, ["s0", "s1", "s2"]);
}
