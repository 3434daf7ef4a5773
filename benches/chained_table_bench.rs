use chained_table::{ChainedTable, LockSet};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use std::time::Duration;

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

fn key(n: u64) -> String {
    format!("k{:016x}", n)
}

fn filled(buckets: usize, seed: u64, n: usize) -> (ChainedTable<String, u64>, Vec<String>) {
    let mut t = ChainedTable::new(buckets).unwrap();
    let keys: Vec<_> = lcg(seed).take(n).map(key).collect();
    for (i, k) in keys.iter().enumerate() {
        t.update_insert(k.clone(), i as u64).unwrap();
    }
    (t, keys)
}

fn bench_insert(c: &mut Criterion) {
    c.bench_function("chained_table_insert_10k", |b| {
        b.iter_batched(
            || ChainedTable::<String, u64>::new(4096).unwrap(),
            |mut t| {
                for (i, x) in lcg(1).take(10_000).enumerate() {
                    t.update_insert(key(x), i as u64).unwrap();
                }
                black_box(t)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_replace(c: &mut Criterion) {
    c.bench_function("chained_table_replace_hit", |b| {
        let (mut t, keys) = filled(4096, 3, 10_000);
        let mut it = keys.iter().cycle();
        b.iter(|| {
            let k = it.next().unwrap().clone();
            black_box(t.update_insert(k, 0).unwrap());
        })
    });
}

fn bench_find_hit(c: &mut Criterion) {
    c.bench_function("chained_table_find_hit", |b| {
        let (t, keys) = filled(4096, 7, 20_000);
        let mut it = keys.iter().cycle();
        b.iter(|| {
            let k = it.next().unwrap();
            black_box(t.find(k.as_str()).unwrap());
        })
    });
}

fn bench_find_miss(c: &mut Criterion) {
    c.bench_function("chained_table_find_miss", |b| {
        let (t, _) = filled(4096, 11, 10_000);
        let mut miss = lcg(0xdead_beef);
        b.iter(|| {
            let k = key(miss.next().unwrap());
            black_box(t.find(k.as_str()));
        })
    });
}

fn bench_apply_until(c: &mut Criterion) {
    c.bench_function("chained_table_apply_until_full_scan", |b| {
        let (t, _) = filled(4096, 13, 10_000);
        let locks = LockSet::contiguous(t.bucket_count(), 64);
        b.iter(|| {
            let mut sum = 0u64;
            t.apply_until(&locks, |e| {
                sum = sum.wrapping_add(*e.value());
                false
            })
            .unwrap();
            black_box(sum)
        })
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(50)
        .measurement_time(Duration::from_secs(8))
        .warm_up_time(Duration::from_secs(2))
}

criterion_group! {
    name = benches;
    config = bench_config();
    targets = bench_insert, bench_replace, bench_find_hit, bench_find_miss, bench_apply_until
}
criterion_main!(benches);
