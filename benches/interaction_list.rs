use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use tapedeck::fingerprint::fingerprint_request;
use tapedeck::matcher::{MatcherRegistry, DEFAULT_MATCHERS};
use tapedeck::replay::{InteractionList, InteractionLookup, NullList};
use tapedeck::{Interaction, Method, Request, Response};

fn interactions(count: usize) -> Vec<Interaction> {
    (0..count)
        .map(|i| {
            Interaction::new(
                Request::new(Method::Get, &format!("http://api.example.com/items/{i}")),
                Response::new(200).with_body(format!("item {i}")),
                Utc::now(),
            )
        })
        .collect()
}

fn bench_response_for(c: &mut Criterion) {
    let mut group = c.benchmark_group("response_for");
    let registry = MatcherRegistry::new();
    let matchers = registry.resolve(&DEFAULT_MATCHERS).unwrap();

    for size in [10, 100, 1_000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let recorded = interactions(size);
            let last = Request::new(
                Method::Get,
                &format!("http://api.example.com/items/{}", size - 1),
            );

            b.iter_batched(
                || {
                    InteractionList::new(
                        recorded.clone(),
                        matchers.clone(),
                        false,
                        NullList::shared(),
                    )
                },
                |list| list.response_for(black_box(&last)),
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_fingerprint_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("fingerprint");

    for size in [100, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let request = Request::new(Method::Post, "http://api.example.com/test")
                .with_header("Content-Type", "application/json")
                .with_body(vec![b'x'; size]);

            b.iter(|| fingerprint_request(black_box(&request)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_response_for, bench_fingerprint_sizes);
criterion_main!(benches);
