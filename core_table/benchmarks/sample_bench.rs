use std::collections::BTreeMap;

use core_table::{
    diff, sample, AnimationConfig, AnimationKind, AnimationQueue, AnimationRule, Curve,
    MergePolicy, PathPattern,
};
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use table_schema::{Amount, StateValue};

fn table_state(rng: &mut ChaCha8Rng, players: usize) -> StateValue {
    let mut seats = BTreeMap::new();
    for seat in 0..players {
        let mut player = BTreeMap::new();
        player.insert(
            "stack".to_string(),
            StateValue::Amount(Amount::from_i64(rng.gen_range(0..10_000))),
        );
        player.insert(
            "bet".to_string(),
            StateValue::Amount(Amount::from_i64(rng.gen_range(0..500))),
        );
        player.insert("folded".to_string(), StateValue::Bool(rng.gen_bool(0.3)));
        seats.insert(seat.to_string(), StateValue::Map(player));
    }
    let mut root = BTreeMap::new();
    root.insert("players".to_string(), StateValue::Map(seats));
    root.insert(
        "pot".to_string(),
        StateValue::Amount(Amount::from_i64(rng.gen_range(0..50_000))),
    );
    StateValue::Map(root)
}

fn bench_config() -> AnimationConfig {
    let pattern = |text: &str| PathPattern::parse(text).expect("valid pattern");
    AnimationConfig::uniform(400.0)
        .with_rule(
            AnimationRule::new(pattern("/players/*/stack"))
                .duration_ms(1_000.0)
                .curve(Curve::EaseOut)
                .kind(AnimationKind::Tween),
        )
        .with_rule(
            AnimationRule::new(pattern("/players/*/bet"))
                .duration_ms(300.0)
                .merge(MergePolicy::Chain),
        )
}

fn loaded_queue(players: usize, updates: usize) -> AnimationQueue {
    let mut rng = ChaCha8Rng::seed_from_u64(0x7ab1e);
    let config = bench_config();
    let mut queue = AnimationQueue::new();
    let mut current = table_state(&mut rng, players);
    queue.install_baseline(current.clone(), Some(0));
    for update in 0..updates {
        let next = table_state(&mut rng, players);
        for change in diff(&current, &next) {
            queue.enqueue_at(&change, update as f64 * 100.0, &config, None);
        }
        current = next;
    }
    queue
}

fn bench_sample(c: &mut Criterion) {
    let mut group = c.benchmark_group("sample");

    for players in [2usize, 6, 10] {
        group.bench_with_input(
            BenchmarkId::new("players", players),
            &players,
            |b, &players| {
                let queue = loaded_queue(players, 8);
                b.iter(|| sample(&queue, 550.0));
            },
        );
    }

    group.bench_function("prune", |b| {
        b.iter_batched(
            || loaded_queue(10, 8),
            |mut queue| queue.prune(1_000.0),
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(sample_benches, bench_sample);
criterion_main!(sample_benches);
