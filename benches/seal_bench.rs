use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use session_dispatch::core::node::{Marshal, Node, NodeContent};
use session_dispatch::utils::crypto::{IvMode, SessionKeys};

fn bench_seal(c: &mut Criterion) {
    let keys = SessionKeys::new(vec![0x11; 32], vec![0x22; 32]).unwrap();
    let mut group = c.benchmark_group("seal");

    for size in [64usize, 1024, 16 * 1024] {
        let plain = vec![0xABu8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("random_iv", size), &plain, |b, p| {
            b.iter(|| keys.seal(IvMode::Random, p).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("zero_iv", size), &plain, |b, p| {
            b.iter(|| keys.seal(IvMode::ZERO, p).unwrap())
        });

        let sealed = keys.seal(IvMode::Random, &plain).unwrap();
        group.bench_with_input(BenchmarkId::new("open", size), &sealed, |b, s| {
            b.iter(|| keys.open(s).unwrap())
        });
    }

    group.finish();
}

fn bench_node_marshal(c: &mut Criterion) {
    let node = Node::new("action")
        .with_attr("type", "set")
        .with_attr("epoch", "12")
        .with_content(NodeContent::Children(
            (0..16)
                .map(|i| Node::new("read").with_attr("jid", format!("{i}@c.us")))
                .collect(),
        ));

    c.bench_function("node_marshal", |b| b.iter(|| node.marshal().unwrap()));
}

criterion_group!(benches, bench_seal, bench_node_marshal);
criterion_main!(benches);
