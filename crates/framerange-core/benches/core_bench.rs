//! Criterion benchmarks for framerange-core.
//!
//! Everything here is pure Rust; the Python bindings are not built.
//!
//! ## Benchmark groups
//!
//! 1. **schema**: DDL init + migration overhead.
//! 2. **normalize**: interval sweep over overlapping and disjoint inputs.
//! 3. **point_query**: cached and uncached `get_labels_at_frame`.
//! 4. **point_update**: `set_labels_at_frame` split / merge on large ranges.
//! 5. **sampled_frames**: `skip_frame` expansion of sampled posts.
//!
//! ## Running
//!
//! ```sh
//! cargo bench --manifest-path crates/framerange-core/Cargo.toml
//! # Run only the point query group:
//! cargo bench --manifest-path crates/framerange-core/Cargo.toml -- point_query
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rusqlite::Connection;

use _framerange_core::models::{FrameLabels, RangeLabel};
use _framerange_core::ops::frames::frames_to_range_labels;
use _framerange_core::range::{normalize, VideoAnnotationRange};
use _framerange_core::store::schema::{migrate_schema, SCHEMA_STATEMENTS};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `n` disjoint intervals of 10 frames with a one-frame gap between them.
fn disjoint_ranges(n: u64) -> Vec<RangeLabel> {
    (0..n)
        .map(|i| {
            let start = i * 11;
            RangeLabel::new(start, start + 9, [format!("label-{}", i % 7)]).unwrap()
        })
        .collect()
}

/// `n` intervals that each overlap the next half of their length, in reverse
/// order, so normalize has to sort and split.
fn overlapping_ranges(n: u64) -> Vec<RangeLabel> {
    (0..n)
        .rev()
        .map(|i| {
            let start = i * 5;
            RangeLabel::new(start, start + 9, [format!("label-{}", i % 3)]).unwrap()
        })
        .collect()
}

fn sampled_frames(n: u64, skip_frame: u64) -> Vec<FrameLabels> {
    (0..n)
        .map(|i| FrameLabels::new(i * skip_frame, [format!("label-{}", i % 4)]))
        .collect()
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

fn bench_schema_init(c: &mut Criterion) {
    c.bench_function("schema_init_and_migrate", |b| {
        b.iter(|| {
            let conn = Connection::open_in_memory().unwrap();
            for stmt in SCHEMA_STATEMENTS {
                conn.execute_batch(stmt).unwrap();
            }
            migrate_schema(&conn).unwrap();
            black_box(&conn);
        });
    });
}

// ---------------------------------------------------------------------------
// Normalize
// ---------------------------------------------------------------------------

fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize");

    for &n in &[10u64, 100, 1_000, 10_000] {
        let disjoint = disjoint_ranges(n);
        group.bench_with_input(BenchmarkId::new("disjoint", n), &disjoint, |b, input| {
            b.iter(|| black_box(normalize(black_box(input))));
        });

        let overlapping = overlapping_ranges(n);
        group.bench_with_input(
            BenchmarkId::new("overlapping", n),
            &overlapping,
            |b, input| {
                b.iter(|| black_box(normalize(black_box(input))));
            },
        );
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Point query
// ---------------------------------------------------------------------------

fn bench_point_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("point_query");

    for &n in &[100u64, 10_000] {
        let range = VideoAnnotationRange::new("bench", disjoint_ranges(n));
        let span = n * 11;

        group.bench_with_input(BenchmarkId::new("cached_frame", n), &range, |b, range| {
            b.iter(|| black_box(range.get_labels_at_frame(black_box(42))));
        });

        // Walk frames with a stride larger than the cache so every lookup misses.
        group.bench_with_input(BenchmarkId::new("uncached_walk", n), &range, |b, range| {
            let mut frame = 0u64;
            b.iter(|| {
                frame = (frame + 37) % span;
                black_box(range.get_labels_at_frame(frame))
            });
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Point update
// ---------------------------------------------------------------------------

fn bench_point_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("point_update");

    for &n in &[100u64, 10_000] {
        let base = VideoAnnotationRange::new("bench", disjoint_ranges(n));
        let middle = (n / 2) * 11 + 4;

        group.bench_with_input(BenchmarkId::new("split_interval", n), &base, |b, base| {
            b.iter_with_setup(
                || base.clone(),
                |mut range| {
                    range.set_labels_at_frame(middle, ["other"]).unwrap();
                    black_box(range)
                },
            );
        });

        group.bench_with_input(BenchmarkId::new("clear_frame", n), &base, |b, base| {
            b.iter_with_setup(
                || base.clone(),
                |mut range| {
                    range
                        .set_labels_at_frame(middle, Vec::<String>::new())
                        .unwrap();
                    black_box(range)
                },
            );
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Sampled frames
// ---------------------------------------------------------------------------

fn bench_sampled_frames(c: &mut Criterion) {
    let mut group = c.benchmark_group("sampled_frames");

    for &skip_frame in &[1u64, 10] {
        let frames = sampled_frames(5_000, skip_frame);
        group.bench_with_input(
            BenchmarkId::new("to_range_labels", skip_frame),
            &frames,
            |b, frames| {
                b.iter(|| black_box(frames_to_range_labels(frames, skip_frame, None).unwrap()));
            },
        );
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Register all benchmark groups
// ---------------------------------------------------------------------------

criterion_group!(
    benches,
    bench_schema_init,
    bench_normalize,
    bench_point_query,
    bench_point_update,
    bench_sampled_frames,
);
criterion_main!(benches);
