//! Benchmarks for sub grid tree construction and lookup.

use criterion::{criterion_group, criterion_main, Criterion};
use loam_grid::SubGridTree;
use std::hint::black_box;

fn construct_leaves(c: &mut Criterion) {
    c.bench_function("construct_1000_leaves", |b| {
        b.iter(|| {
            let mut tree = SubGridTree::<u64>::new(6, 0.34);
            for i in 0..1000u32 {
                // Spread addresses so every write creates a distinct leaf.
                *tree.construct_leaf(black_box(i * 32), black_box(i * 32)) = i as u64;
            }
            tree
        });
    });
}

fn locate_leaves(c: &mut Criterion) {
    let mut tree = SubGridTree::<u64>::new(6, 0.34);
    for i in 0..1000u32 {
        *tree.construct_leaf(i * 32, i * 32) = i as u64;
    }
    c.bench_function("locate_1000_leaves", |b| {
        b.iter(|| {
            for i in 0..1000u32 {
                black_box(tree.locate_leaf(black_box(i * 32), black_box(i * 32)));
            }
        });
    });
}

fn clone_and_mutate(c: &mut Criterion) {
    let mut tree = SubGridTree::<u64>::new(6, 0.34);
    for i in 0..1000u32 {
        *tree.construct_leaf(i * 32, i * 32) = i as u64;
    }
    c.bench_function("snapshot_clone_then_single_write", |b| {
        b.iter(|| {
            let mut snapshot = tree.clone();
            *snapshot.construct_leaf(black_box(0), black_box(0)) = 99;
            snapshot
        });
    });
}

criterion_group!(benches, construct_leaves, locate_leaves, clone_and_mutate);
criterion_main!(benches);
