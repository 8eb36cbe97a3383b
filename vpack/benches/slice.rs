use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use vpack::{Encoder, Options, Value};

fn document(members: usize) -> Value {
    Value::object((0..members).map(|i| {
        let member = Value::object([
            ("id", Value::UInt(i as u64)),
            ("label", Value::from(format!("vertex number {}", i))),
            ("weights", Value::array([0.5, 1.5, 2.5])),
        ]);
        (format!("member{:04}", i), member)
    }))
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup");
    for members in [4, 64, 1024] {
        let value = document(members);
        let key = format!("member{:04}", members / 2);
        for (layout, threshold) in [("indexed", 0), ("compact", usize::MAX)] {
            let buffer = Encoder::with_options(Options { object_index_threshold: threshold, ..Default::default() }).encode(&value);
            group.bench_with_input(BenchmarkId::new(layout, members), &buffer, |b, buffer| {
                b.iter(|| black_box(buffer.slice().get(&key).and_then(|m| m.get("id")?.as_uint()).unwrap()))
            });
        }
        let buffer = value.encode();
        group.bench_with_input(BenchmarkId::new("materialized", members), &buffer, |b, buffer| {
            b.iter(|| {
                let value = buffer.slice().to_value().unwrap();
                black_box(value.get(&key).and_then(|m| m.get("id")).and_then(Value::as_u64).unwrap())
            })
        });
    }
    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let value = document(256);
    c.bench_function("encode", |b| b.iter(|| black_box(value.encode())));
}

criterion_group!(benches, bench_lookup, bench_encode);
criterion_main!(benches);
