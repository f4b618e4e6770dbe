//! Benchmarks for per-frame script filter overhead
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use scriptfilter::bridge::{marshal, FrameDescriptor, ScriptBridge};
use scriptfilter::config::{EngineSettings, FilterOptions};
use scriptfilter::pipeline::{PipelineBuilder, ScriptFilterNode, TestPatternSource};
use scriptfilter::{RhaiInterpreter, Rational};
use std::path::PathBuf;

fn fixture_settings() -> EngineSettings {
    EngineSettings::default().with_module_path(
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join("modules"),
    )
}

fn bench_marshal(c: &mut Criterion) {
    let frame = FrameDescriptor {
        pts: Some(90_000),
        time_base: Rational::new(1, 90_000),
        width: 1920,
        height: 1080,
        plane: 0x1000,
    };

    c.bench_function("marshal_to_arguments", |b| {
        b.iter(|| black_box(marshal::to_arguments(black_box(&frame))))
    });
}

/// Hook call overhead with a script that barely touches the plane.
fn bench_hook_call(c: &mut Criterion) {
    let mut bridge = ScriptBridge::<RhaiInterpreter>::start(
        FilterOptions::new("pkg.nested", "filter"),
        &fixture_settings(),
    )
    .expect("fixture module should load");
    let mut plane = vec![0u8; 16 * 16 * 3];

    c.bench_function("filter_hook_call", |b| {
        b.iter(|| {
            let result =
                bridge.process_plane(Some(1), Rational::new(1, 25), &mut plane, 16 * 3, 16, 16);
            black_box(result).ok();
        })
    });
}

/// Whole-frame scripts through the threaded pipeline.
fn bench_invert_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("invert_pipeline");
    group.sample_size(10);

    for size in [16u32, 32, 64].iter() {
        let frames = 10u64;
        group.throughput(Throughput::Bytes(*size as u64 * *size as u64 * 3 * frames));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let source = TestPatternSource::new(size, size, Rational::from_fps(25))
                    .with_frame_count(frames);
                let node = ScriptFilterNode::<RhaiInterpreter>::new(
                    FilterOptions::new("invert", "filter"),
                    fixture_settings(),
                );
                let report = PipelineBuilder::new()
                    .build(source, node)
                    .run(|frame| {
                        black_box(frame);
                    })
                    .expect("pipeline should start");
                black_box(report.frames_delivered)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_marshal, bench_hook_call, bench_invert_pipeline);
criterion_main!(benches);
