use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use peakwave::renderer::{Geometry, WaveformRenderer};
use peakwave::waveform::{
    FillStyles, PeakBuffer, RasterSurface, Surface, TileFeatures, draw_envelope,
};

const COLUMNS: usize = 9_000;

fn peaks() -> PeakBuffer {
    let values: Vec<f64> = (0..COLUMNS)
        .flat_map(|i| {
            let level = ((i as f64) * 0.013).sin().abs();
            [level, -level]
        })
        .collect();
    PeakBuffer::from_peaks(values, 180.0)
}

fn bench_single_surface(c: &mut Criterion) {
    let buffer = peaks();
    let mut surface = RasterSurface::new(4_000, 128);
    c.bench_with_input(
        BenchmarkId::new("draw_envelope", 4_000),
        &buffer,
        |b, buffer| {
            b.iter(|| {
                surface.clear();
                draw_envelope(&mut surface, black_box(buffer), 0, 4_001, 64.0, 0.0)
            });
        },
    );
}

fn bench_full_pass(c: &mut Criterion) {
    let mut renderer = WaveformRenderer::in_memory(
        TileFeatures {
            progress: true,
            restrict: true,
        },
        FillStyles::default(),
    );
    let _ = renderer.set_peaks(peaks());
    renderer
        .set_geometry(Geometry {
            total_width_px: 9_000,
            max_tile_width_px: 4_000,
            height_px: 128,
        })
        .expect("partition tiles");
    renderer.set_progress_seconds(Some(60.0));
    c.bench_function("render_pass_9000px", |b| {
        b.iter(|| renderer.render().expect("render pass"));
    });
}

criterion_group!(benches, bench_single_surface, bench_full_pass);
criterion_main!(benches);
