//! Crop Geometry Benchmarks
//!
//! These run on every mouse move while a crop box is dragged.
//!
//! # Running Benchmarks
//! ```bash
//! cargo bench --package namacut-media --bench crop_geometry
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;

use namacut_media::{build_filter_chain, display_geometry, display_to_source, source_to_display};
use namacut_models::{Rect, ResolutionPreset, Rotation, TransformState};

const ROTATIONS: [Rotation; 4] = [
    Rotation::Deg0,
    Rotation::Deg90,
    Rotation::Deg180,
    Rotation::Deg270,
];

fn bench_display_to_source(c: &mut Criterion) {
    let mut group = c.benchmark_group("display_to_source");
    group.warm_up_time(Duration::from_secs(1));
    group.measurement_time(Duration::from_secs(3));

    for rotation in ROTATIONS {
        let geometry = display_geometry(1920, 1080, rotation, 800, 600);
        let transform = TransformState {
            rotation,
            flip_horizontal: true,
            ..Default::default()
        };
        let region = geometry.video_region();
        let rect = Rect::new(
            region.x + region.width * 0.25,
            region.y + region.height * 0.25,
            region.width * 0.5,
            region.height * 0.5,
        );

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(
            BenchmarkId::new("map", rotation.degrees()),
            &rect,
            |b, rect| b.iter(|| black_box(display_to_source(black_box(*rect), &geometry, &transform))),
        );
    }

    group.finish();
}

fn bench_round_trip(c: &mut Criterion) {
    let geometry = display_geometry(3840, 2160, Rotation::Deg90, 1280, 720);
    let transform = TransformState {
        rotation: Rotation::Deg90,
        ..Default::default()
    };
    let rect = Rect::new(600.0, 200.0, 80.0, 300.0);

    c.bench_function("round_trip_90", |b| {
        b.iter(|| {
            let source = display_to_source(black_box(rect), &geometry, &transform);
            black_box(source.and_then(|s| source_to_display(s, &geometry, &transform)))
        })
    });
}

fn bench_filter_chain(c: &mut Criterion) {
    let geometry = display_geometry(1920, 1080, Rotation::Deg270, 960, 540);
    let transform = TransformState {
        rotation: Rotation::Deg270,
        flip_vertical: true,
        crop_rect: Some(Rect::new(400.0, 100.0, 120.0, 300.0)),
        crop_enabled: true,
        ..Default::default()
    };

    c.bench_function("build_filter_chain", |b| {
        b.iter(|| {
            black_box(build_filter_chain(
                black_box(&transform),
                &geometry,
                ResolutionPreset::Hd720,
            ))
        })
    });
}

criterion_group!(
    benches,
    bench_display_to_source,
    bench_round_trip,
    bench_filter_chain
);
criterion_main!(benches);
