//! Benchmarks de préparation des parcelles (reprojection + surface)

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use landuse_pg::calculator::area_hectares;
use landuse_pg::reproject::SmartReprojector;
use landuse_pg::ParcelCalculator;
use landuse_shp::SourceParcel;

/// Polygone régulier de `vertices` sommets autour de Séville
fn parcel(index: usize, vertices: usize) -> SourceParcel {
    let (cx, cy, r) = (-5.98, 37.39, 0.01);
    let mut coords: Vec<Coord> = (0..vertices)
        .map(|i| {
            let a = std::f64::consts::TAU * i as f64 / vertices as f64;
            Coord {
                x: cx + r * a.cos(),
                y: cy + r * a.sin(),
            }
        })
        .collect();
    coords.push(coords[0]);

    SourceParcel {
        index,
        class: "forest".into(),
        name: None,
        geometry: MultiPolygon::new(vec![Polygon::new(LineString::new(coords), vec![])]),
    }
}

fn bench_prepare(c: &mut Criterion) {
    let calculator = ParcelCalculator::new(4326, 25830, 4326).unwrap();

    let mut group = c.benchmark_group("prepare");
    for vertices in [8, 64, 512] {
        group.throughput(Throughput::Elements(vertices as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(vertices),
            &vertices,
            |b, &vertices| {
                let source = parcel(0, vertices);
                b.iter(|| black_box(calculator.prepare(black_box(source.clone())).unwrap()))
            },
        );
    }
    group.finish();
}

fn bench_reproject(c: &mut Criterion) {
    let reprojector = SmartReprojector::new(4326, 25830).unwrap();
    let geometry = parcel(0, 512).geometry;

    c.bench_function("reproject_4326_to_25830", |b| {
        b.iter(|| black_box(reprojector.transform(black_box(&geometry)).unwrap()))
    });

    let projected = reprojector.transform(&geometry).unwrap();
    c.bench_function("area_hectares", |b| {
        b.iter(|| black_box(area_hectares(black_box(&projected))))
    });
}

criterion_group!(benches, bench_prepare, bench_reproject);
criterion_main!(benches);
