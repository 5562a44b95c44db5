use criterion::{criterion_group, criterion_main, Criterion};
use jsonkit_core::Document;
use std::hint::black_box;

fn sample_document(records: usize) -> String {
    let rows: Vec<String> = (0..records)
        .map(|i| {
            format!(
                r#"{{"id":{i},"name":"user-{i}","score":{}.25,"active":{},"tags":["a","b"]}}"#,
                i % 100,
                i % 2 == 0
            )
        })
        .collect();
    format!(r#"{{"users":[{}],"total":{records}}}"#, rows.join(","))
}

fn bench_parse(c: &mut Criterion) {
    let text = sample_document(1_000);
    c.bench_function("parse_1k_records", |b| {
        b.iter(|| {
            let mut doc = Document::new();
            let h = doc.parse(black_box(&text)).unwrap();
            black_box(h);
        })
    });
}

fn bench_stringify(c: &mut Criterion) {
    let text = sample_document(1_000);
    let mut doc = Document::new();
    let h = doc.parse(&text).unwrap();
    c.bench_function("stringify_1k_records", |b| {
        b.iter(|| black_box(doc.to_json_string(black_box(h)).unwrap()))
    });
}

fn bench_append(c: &mut Criterion) {
    let text = sample_document(100);
    c.bench_function("append_objects", |b| {
        b.iter(|| {
            let mut doc = Document::new();
            let a = doc.parse(&text).unwrap();
            let other = doc.parse(r#"{"total":0,"extra":true}"#).unwrap();
            black_box(doc.append(a, other).unwrap());
        })
    });
}

criterion_group!(benches, bench_parse, bench_stringify, bench_append);
criterion_main!(benches);
