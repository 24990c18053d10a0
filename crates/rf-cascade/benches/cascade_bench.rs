//! Cascade Geometry Benchmarks
//!
//! Matrix parsing, removal dedup and gravity derivation across grid sizes.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rf_cascade::{GridSize, Position, dedup_positions, derive_gravity_moves, parse_matrix};

const GRID_SIZES: &[(usize, usize)] = &[(3, 5), (5, 6), (7, 7), (8, 8)];
const SYMBOLS: &[&str] = &["A", "K", "Q", "J", "10", "W", "S"];

fn build_matrix(size: GridSize) -> String {
    (0..size.rows)
        .map(|row| {
            (0..size.cols)
                .map(|col| SYMBOLS[(row * 3 + col) % SYMBOLS.len()])
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join(";")
}

/// Every third cell, each listed twice (cells shared by two wins)
fn build_removals(size: GridSize) -> Vec<Position> {
    size.positions()
        .filter(|pos| (pos.row + pos.col) % 3 == 0)
        .flat_map(|pos| [pos, pos])
        .collect()
}

fn bench_parse_matrix(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_matrix");

    for &(rows, cols) in GRID_SIZES {
        let size = GridSize::new(rows, cols);
        let matrix = build_matrix(size);
        group.throughput(Throughput::Elements(size.cells() as u64));

        group.bench_with_input(BenchmarkId::from_parameter(size), &matrix, |b, matrix| {
            b.iter(|| black_box(parse_matrix(black_box(matrix))))
        });
    }

    group.finish();
}

fn bench_dedup_and_gravity(c: &mut Criterion) {
    let mut group = c.benchmark_group("dedup_gravity");

    for &(rows, cols) in GRID_SIZES {
        let size = GridSize::new(rows, cols);
        let removed = build_removals(size);
        group.throughput(Throughput::Elements(removed.len() as u64));

        group.bench_with_input(BenchmarkId::from_parameter(size), &removed, |b, removed| {
            b.iter(|| {
                let unique = dedup_positions(black_box(removed));
                black_box(derive_gravity_moves(size, &unique))
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_parse_matrix, bench_dedup_and_gravity);
criterion_main!(benches);
