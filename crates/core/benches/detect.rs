// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Benchmarks for normalized conflict detection.

#![allow(clippy::expect_used)]

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use sk_core::value::fields_from_json;
use sk_core::{find_conflicting_fields, Fields};

fn snapshot(width: usize, encoded: bool) -> Fields {
    let mut map = serde_json::Map::new();
    for i in 0..width {
        let value = match (i % 4, encoded) {
            (0, false) => json!(true),
            (0, true) => json!("1"),
            (1, false) => json!(i),
            (1, true) => json!(i.to_string()),
            (2, false) => json!("2024-05-01T10:00:00Z"),
            (2, true) => json!("2024-05-01 10:00:00"),
            _ => json!(format!("text {i}")),
        };
        map.insert(format!("field_{i}"), value);
    }
    fields_from_json(serde_json::Value::Object(map)).expect("object")
}

fn detection(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_conflicting_fields");

    for width in [8, 64, 512] {
        let local = snapshot(width, true);
        let server = snapshot(width, false);
        group.bench_with_input(BenchmarkId::new("equivalent", width), &width, |b, _| {
            b.iter(|| find_conflicting_fields(&local, &server))
        });

        let mut changed = server.clone();
        for (i, value) in changed.values_mut().enumerate() {
            if i % 3 == 0 {
                *value = "changed".into();
            }
        }
        group.bench_with_input(BenchmarkId::new("divergent", width), &width, |b, _| {
            b.iter(|| find_conflicting_fields(&local, &changed))
        });
    }
    group.finish();
}

criterion_group!(benches, detection);
criterion_main!(benches);
