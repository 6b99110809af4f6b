use criterion::{criterion_group, criterion_main, Criterion};
use serde_json::json;
use warden_core::{canonical_json, inputs_hash};

fn sample_context() -> serde_json::Value {
    json!({
        "llm": {"provider": "openai", "model": "gpt-4", "maxTokens": 2000},
        "requester": {"id": "svc-123", "roles": ["engineer", "on-call"]},
        "resource": {"path": "datasets/customer_exports", "tags": ["pii", "restricted"]},
        "metadata": {"trace_id": "abc123", "nested": {"a": 1, "b": [1, 2, 3, 4, 5]}},
    })
}

fn bench_canonical_json(c: &mut Criterion) {
    let value = sample_context();
    c.bench_function("canonical_json", |b| {
        b.iter(|| canonical_json(&value));
    });
}

fn bench_fingerprint(c: &mut Criterion) {
    let value = sample_context();
    c.bench_function("fingerprint", |b| {
        b.iter(|| inputs_hash(&value));
    });
}

criterion_group!(benches, bench_canonical_json, bench_fingerprint);
criterion_main!(benches);
