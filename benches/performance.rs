//! Performance benchmarks for track-filter-lib
//!
//! Run with: cargo bench
//!
//! Reduced benchmark suite covering the pipeline shapes that dominate real
//! conversions: the default pack, a chronological merge, an interval split,
//! and the segmenting denoiser.

use chrono::DateTime;
use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use track_filter_lib::{process, FilterOptions, Track, TrackStore, Waypoint};

/// Generate a realistic track with the specified number of points, one
/// point per second.
fn generate_track(num_points: usize, base_lat: f64, base_lon: f64, base_secs: i64) -> Track {
    let mut track = Track::new(format!("bench-{base_secs}"));
    for i in 0..num_points {
        let t = i as f64 / num_points as f64;
        let lat = base_lat + t * 0.1 + (t * 50.0).sin() * 0.001;
        let lon = base_lon + t * 0.1 + (t * 30.0).cos() * 0.001;
        let mut wpt = Waypoint::new(lat, lon);
        wpt.time = DateTime::from_timestamp(base_secs + i as i64, 0);
        track.push_waypoint(wpt);
    }
    track
}

/// Generate a store of non-overlapping tracks.
fn generate_store(num_tracks: usize, points_per_track: usize) -> TrackStore {
    let mut store = TrackStore::new();
    for i in 0..num_tracks {
        let lat_offset = (i % 10) as f64 * 0.1;
        let lon_offset = (i / 10) as f64 * 0.1;
        // Leave a gap between tracks so pack's overlap check passes.
        let base_secs = (i * points_per_track * 2) as i64;
        store.add_track(generate_track(
            points_per_track,
            51.5 + lat_offset,
            -0.1 + lon_offset,
            base_secs,
        ));
    }
    store
}

fn bench_pack(c: &mut Criterion) {
    let mut group = c.benchmark_group("pack");
    let store = generate_store(100, 1_000);
    group.throughput(Throughput::Elements(100 * 1_000));

    group.bench_function("100_tracks_1k_each", |b| {
        let options = FilterOptions::default();
        b.iter(|| {
            let mut store = store.clone();
            process(&mut store, &options).unwrap();
        });
    });

    group.finish();
}

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");
    group.sample_size(20);

    // Interleaved tracks: merge has to sort the full point set.
    let mut store = TrackStore::new();
    for i in 0..10_i64 {
        let mut track = generate_track(10_000, 51.5, -0.1, i);
        for wpt in track.waypoints_mut() {
            wpt.time = wpt.time.map(|t| t + chrono::Duration::seconds(i * 7));
        }
        store.add_track(track);
    }
    group.throughput(Throughput::Elements(10 * 10_000));

    group.bench_function("10_tracks_10k_each", |b| {
        let options = FilterOptions {
            merge: Some(String::new()),
            ..FilterOptions::default()
        };
        b.iter(|| {
            let mut store = store.clone();
            process(&mut store, &options).unwrap();
        });
    });

    group.finish();
}

fn bench_split_interval(c: &mut Criterion) {
    let mut group = c.benchmark_group("split");

    // One long track with a gap every 1000 points.
    let mut store = TrackStore::new();
    let mut track = Track::new("long");
    for i in 0..50_000_usize {
        let mut wpt = Waypoint::new(51.5 + i as f64 * 1e-6, -0.1);
        let gaps = (i / 1_000) as i64;
        wpt.time = DateTime::from_timestamp(i as i64 + gaps * 7_200, 0);
        track.push_waypoint(wpt);
    }
    store.add_track(track);
    group.throughput(Throughput::Elements(50_000));

    group.bench_function("50k_points_1h_interval", |b| {
        let options = FilterOptions {
            split: Some("1h".to_string()),
            ..FilterOptions::default()
        };
        b.iter(|| {
            let mut store = store.clone();
            process(&mut store, &options).unwrap();
        });
    });

    group.finish();
}

fn bench_segment(c: &mut Criterion) {
    let mut group = c.benchmark_group("segment");

    // Points ~55 m apart: moving data, nothing for the denoiser to delete.
    let mut store = TrackStore::new();
    let mut track = Track::new("spread");
    for i in 0..50_000_usize {
        let mut wpt = Waypoint::new(51.5, -0.1 + i as f64 * 0.0005);
        wpt.time = DateTime::from_timestamp(i as i64, 0);
        track.push_waypoint(wpt);
    }
    store.add_track(track);
    group.throughput(Throughput::Elements(50_000));

    group.bench_function("50k_points", |b| {
        let options = FilterOptions {
            segment: Some(String::new()),
            ..FilterOptions::default()
        };
        b.iter(|| {
            let mut store = store.clone();
            process(&mut store, &options).unwrap();
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_pack,
    bench_merge,
    bench_split_interval,
    bench_segment,
);

criterion_main!(benches);
