//! Benchmarks for the wetness-index stages

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use twi_algorithms::hydrology::{
    flow_accumulation, flow_direction, priority_flood, FlowDirectionParams, PriorityFloodParams,
};
use twi_algorithms::terrain::{slope, SlopeParams};
use twi_algorithms::{Pipeline, PipelineConfig};
use twi_core::{GeoTransform, Raster};

/// Basin DEM: higher edges sloping toward a central depression
fn create_basin_dem(size: usize) -> Raster<f64> {
    let center = size as f64 / 2.0;
    let values: Vec<f64> = (0..size * size)
        .map(|i| {
            let (row, col) = (i / size, i % size);
            let dx = col as f64 - center;
            let dy = row as f64 - center;
            let noise = ((row * 7 + col * 13) % 17) as f64 * 0.01;
            (dx * dx + dy * dy).sqrt() + noise
        })
        .collect();
    let mut dem = Raster::from_vec(values, size, size).unwrap();
    dem.set_transform(GeoTransform::with_cell_size(30.0));
    dem
}

fn bench_priority_flood(c: &mut Criterion) {
    let mut group = c.benchmark_group("hydrology/priority_flood");
    for size in [128, 256, 512, 1024] {
        let dem = create_basin_dem(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| priority_flood(black_box(&dem), PriorityFloodParams::default()).unwrap())
        });
    }
    group.finish();
}

fn bench_flow_direction(c: &mut Criterion) {
    let mut group = c.benchmark_group("hydrology/flow_direction");
    for size in [256, 512, 1024] {
        let filled = priority_flood(&create_basin_dem(size), PriorityFloodParams::default()).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| flow_direction(black_box(&filled), FlowDirectionParams::default()).unwrap())
        });
    }
    group.finish();
}

fn bench_flow_accumulation(c: &mut Criterion) {
    let mut group = c.benchmark_group("hydrology/flow_accumulation");
    for size in [256, 512, 1024] {
        let filled = priority_flood(&create_basin_dem(size), PriorityFloodParams::default()).unwrap();
        let fdir = flow_direction(&filled, FlowDirectionParams::default()).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| flow_accumulation(black_box(&filled), black_box(&fdir)).unwrap())
        });
    }
    group.finish();
}

fn bench_slope(c: &mut Criterion) {
    let mut group = c.benchmark_group("terrain/slope");
    for size in [256, 512, 1024] {
        let dem = create_basin_dem(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| slope(black_box(&dem), SlopeParams::default()).unwrap())
        });
    }
    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline/run");
    group.sample_size(10);
    let pipeline = Pipeline::new(PipelineConfig::default());
    for size in [256, 512] {
        let dem = create_basin_dem(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| pipeline.run(black_box(&dem)).unwrap())
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_priority_flood,
    bench_flow_direction,
    bench_flow_accumulation,
    bench_slope,
    bench_pipeline,
);
criterion_main!(benches);
