use criterion::{self, criterion_group, criterion_main, BenchmarkId};

use hungry::{
    GrpcConnector, InMemoryRegistry, OrderBook, PostcodeValidator, ReplicaNode, Validation,
};
use std::sync::Arc;
use tokio::runtime::Runtime;

struct AcceptAll;

#[tonic::async_trait]
impl PostcodeValidator for AcceptAll {
    async fn validate(&self, _postcode: &str) -> Validation {
        Validation::answered(true)
    }
}

fn lone_replica() -> ReplicaNode {
    ReplicaNode::new(
        "bench",
        OrderBook::demo(),
        Arc::new(InMemoryRegistry::new()),
        Arc::new(GrpcConnector::default()),
        Arc::new(AcceptAll),
    )
}

fn place_order(c: &mut criterion::Criterion) {
    let node = lone_replica();
    let rt = Runtime::new().unwrap();

    c.bench_with_input(BenchmarkId::new("place_order", "replica"), &node, |b, n| {
        b.to_async(&rt).iter(|| async {
            assert!(n.place_order("DH1 3LE", vec!["chips".into()]).await.ok);
        })
    });
}

fn get_orders(c: &mut criterion::Criterion) {
    let node = lone_replica();
    let rt = Runtime::new().unwrap();

    c.bench_with_input(BenchmarkId::new("get_orders", "replica"), &node, |b, n| {
        b.to_async(&rt).iter(|| async {
            assert_eq!(n.get_orders("dh13lg").await.orders.len(), 2);
        })
    });
}

fn snapshot(c: &mut criterion::Criterion) {
    let mut book = OrderBook::demo();
    for i in 0..1_000 {
        book.append(&format!("dh1{i}"), vec!["pizza".into(), "fries".into()]);
    }

    c.bench_with_input(BenchmarkId::new("to_snapshot", "book"), &book, |b, book| {
        b.iter(|| OrderBook::from(book.to_snapshot()))
    });
}

criterion_group!(benches, place_order, get_orders, snapshot);
criterion_main!(benches);
