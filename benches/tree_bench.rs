//! Performance benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use range_lmsr::cost::{apply_trade, cost_of_buy, TradeSide};
use range_lmsr::{LazyMulTree, WAD};

/// Deterministic pseudo-random ranges (xorshift).
fn ranges(size: u32, count: usize) -> Vec<(u32, u32)> {
    let mut state = 0x9E37_79B9_7F4A_7C15u64;
    (0..count)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let a = (state % u64::from(size)) as u32;
            let b = ((state >> 32) % u64::from(size)) as u32;
            (a.min(b), a.max(b))
        })
        .collect()
}

fn benchmark_tree(c: &mut Criterion) {
    let mut group = c.benchmark_group("range_factor");
    for size in [1_024u32, 1 << 20] {
        let updates = ranges(size, 256);
        group.bench_with_input(BenchmarkId::new("apply", size), &updates, |b, updates| {
            b.iter(|| {
                let mut tree = LazyMulTree::with_size(size).unwrap();
                for (i, &(lo, hi)) in updates.iter().enumerate() {
                    let factor = if i % 2 == 0 { 3 * WAD / 2 } else { 2 * WAD / 3 };
                    tree.apply_range_factor(lo, hi, factor).unwrap();
                }
                black_box(tree.total_sum().unwrap())
            });
        });

        let mut tree = LazyMulTree::with_size(size).unwrap();
        for &(lo, hi) in &updates {
            tree.apply_range_factor(lo, hi, 11 * WAD / 10).unwrap();
        }
        group.bench_with_input(BenchmarkId::new("range_sum", size), &updates, |b, updates| {
            b.iter(|| {
                let mut acc = 0u128;
                for &(lo, hi) in updates {
                    acc = acc.wrapping_add(tree.range_sum(lo, hi).unwrap());
                }
                black_box(acc)
            });
        });
    }
    group.finish();
}

fn benchmark_trades(c: &mut Criterion) {
    let alpha = 100 * WAD;
    let tree = LazyMulTree::with_size(10_000).unwrap();

    c.bench_function("quote_buy_single_chunk", |b| {
        b.iter(|| black_box(cost_of_buy(&tree, 1_000, 4_999, black_box(50 * WAD), alpha).unwrap()));
    });

    c.bench_function("execute_buy_three_chunks", |b| {
        b.iter(|| {
            let mut tree = tree.clone();
            black_box(apply_trade(&mut tree, 1_000, 4_999, TradeSide::Buy, 1_000 * WAD, alpha).unwrap())
        });
    });
}

criterion_group!(benches, benchmark_tree, benchmark_trades);
criterion_main!(benches);
