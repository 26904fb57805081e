//! Criterion benchmarks for the classification hot path.
//!
//! Every physical key transition goes through `KeyStateTracker::apply` on the
//! capture thread and every emitted event through `encode_event` in the
//! broadcaster, so both must stay far below a millisecond.
//!
//! Run with:
//! ```bash
//! cargo bench --package keystream-core --bench classify_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use keystream_core::{encode_event, ClassifiedEvent, Combo, KeyName, KeyStateTracker, KeyTransition};

/// A typing burst: plain keys, a ctrl+shift combo and releases.
fn typing_burst() -> Vec<(KeyName, KeyTransition)> {
    let mut seq = Vec::new();
    for name in ["h", "e", "l", "l", "o", "space"] {
        seq.push((KeyName::new(name), KeyTransition::Down));
        seq.push((KeyName::new(name), KeyTransition::Up));
    }
    for (name, dir) in [
        ("ctrl", KeyTransition::Down),
        ("shift", KeyTransition::Down),
        ("t", KeyTransition::Down),
        ("t", KeyTransition::Up),
        ("shift", KeyTransition::Up),
        ("ctrl", KeyTransition::Up),
    ] {
        seq.push((KeyName::new(name), dir));
    }
    seq
}

fn bench_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("key_state_apply");
    let burst = typing_burst();

    group.bench_function("single_down_up", |b| {
        let key = KeyName::new("a");
        b.iter(|| {
            let mut state = KeyStateTracker::new();
            black_box(state.apply(&key, KeyTransition::Down));
            black_box(state.apply(&key, KeyTransition::Up));
        })
    });

    group.bench_with_input(BenchmarkId::new("burst", burst.len()), &burst, |b, burst| {
        b.iter(|| {
            let mut state = KeyStateTracker::new();
            for (key, dir) in burst {
                black_box(state.apply(black_box(key), *dir));
            }
        })
    });

    group.finish();
}

fn bench_combo(c: &mut Criterion) {
    let mods = [KeyName::new("shift"), KeyName::new("ctrl"), KeyName::new("alt")];
    let key = KeyName::new("delete");
    c.bench_function("combo_canonicalize_3_modifiers", |b| {
        b.iter(|| Combo::new(black_box(&mods), black_box(&key)))
    });
}

fn bench_encode(c: &mut Criterion) {
    let mods = [KeyName::new("ctrl")];
    let events = [
        ClassifiedEvent::Keystroke { key: KeyName::new("a") },
        ClassifiedEvent::Combo {
            keys: Combo::new(&mods, &KeyName::new("c")),
        },
    ];
    let mut group = c.benchmark_group("encode_event");
    for event in &events {
        group.bench_with_input(BenchmarkId::from_parameter(event.kind()), event, |b, e| {
            b.iter(|| encode_event(black_box(e)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_apply, bench_combo, bench_encode);
criterion_main!(benches);
