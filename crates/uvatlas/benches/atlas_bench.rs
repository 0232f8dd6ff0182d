//! Criterion benchmarks for the full atlas pipeline.
//! Focus shapes: cylinder shells and icospheres at growing detail.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use uvatlas::{create_atlas, shapes, AtlasOptions, MeshDesc};

fn bench_atlas(c: &mut Criterion) {
    let mut group = c.benchmark_group("create_atlas");
    group.sample_size(10);

    for &segments in &[8usize, 16, 32] {
        let (positions, indices) = shapes::cylinder_shell(segments, 2);
        group.bench_with_input(
            BenchmarkId::new("cylinder", segments),
            &segments,
            |b, _| {
                b.iter(|| {
                    let desc = MeshDesc {
                        positions: &positions,
                        indices: &indices,
                        ..MeshDesc::default()
                    };
                    create_atlas(&desc, &AtlasOptions::default(), None).unwrap()
                });
            },
        );
    }

    for &subdivisions in &[0usize, 1] {
        let (positions, indices) = shapes::icosphere(subdivisions);
        group.bench_with_input(
            BenchmarkId::new("icosphere", indices.len() / 3),
            &subdivisions,
            |b, _| {
                b.iter(|| {
                    let desc = MeshDesc {
                        positions: &positions,
                        indices: &indices,
                        ..MeshDesc::default()
                    };
                    create_atlas(&desc, &AtlasOptions::default(), None).unwrap()
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_atlas);
criterion_main!(benches);
