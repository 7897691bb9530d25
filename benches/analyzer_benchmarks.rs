//! Analyzer performance benchmarks
//!
//! Container reading, bit distribution and overlay compositing at common
//! picture sizes.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::io::Cursor;
use zva_lib::analyzer::{BitDistributor, Compositor, DecodeSession, SymbolFilter, ViewState};
use zva_lib::codec::accounting::LAYER_MOTION;
use zva_lib::codec::raw::{header_packet, picture_size};
use zva_lib::codec::{AccountingLog, FrameGeometry, MetadataGrids, Picture, RawVideoCodec};
use zva_lib::format::OggWriter;

const SIZES: &[(usize, usize)] = &[(320, 240), (640, 480), (1280, 720)];

/// Ogg stream of `count` raw 4:2:0 pictures
fn raw_stream(width: usize, height: usize, count: usize) -> Vec<u8> {
    let mut writer = OggWriter::new(Vec::new(), 1);
    writer
        .write_packet(&header_packet(width as u32, height as u32, 1, 1), 0, false)
        .unwrap();
    let size = picture_size(width, height, 1, 1);
    for n in 0..count {
        let data: Vec<u8> = (0..size).map(|i| (i + n) as u8).collect();
        writer.write_packet(&data, n as i64 + 1, n + 1 == count).unwrap();
    }
    writer.into_inner().unwrap()
}

/// Accounting log with one symbol per 4x4 block of every plane
fn dense_log(geometry: &FrameGeometry) -> AccountingLog {
    let mut log = AccountingLog::new();
    for plane in 0..3u8 {
        for y in (0..geometry.frame_height as i32 / 4).step_by(2) {
            for x in (0..geometry.frame_width as i32 / 4).step_by(2) {
                log.record("coeff", plane, 1, x, y, 40);
            }
        }
    }
    for y in 0..geometry.frame_height as i32 / 16 {
        for x in 0..geometry.frame_width as i32 / 16 {
            log.record("mv", LAYER_MOTION, 2 + ((x + y) & 1) as u8, x * 2, y * 2, 90);
        }
    }
    log
}

fn bench_session_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("session_step");

    for &(width, height) in SIZES {
        let bytes = raw_stream(width, height, 8);
        group.throughput(Throughput::Elements(8));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}", width, height)),
            &bytes,
            |b, bytes| {
                b.iter(|| {
                    let mut session = DecodeSession::new(Box::new(RawVideoCodec), false);
                    session.open(Cursor::new(bytes.clone())).unwrap();
                    while session.step().is_ok() {}
                    black_box(session.picture_count())
                });
            },
        );
    }

    group.finish();
}

fn bench_bit_distribution(c: &mut Criterion) {
    let mut group = c.benchmark_group("bit_distribution");

    for &(width, height) in SIZES {
        let geometry = FrameGeometry::new(width, height).unwrap();
        let log = dense_log(&geometry);
        let mut distributor = BitDistributor::new(&geometry).unwrap();
        let filter = SymbolFilter::default();

        group.throughput(Throughput::Elements(log.len() as u64));
        group.bench_function(BenchmarkId::from_parameter(format!("{}x{}", width, height)), |b| {
            b.iter(|| black_box(distributor.distribute(black_box(&log), &filter, 0)));
        });
    }

    group.finish();
}

fn bench_compositor_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("compositor_render");

    for &(width, height) in SIZES {
        let geometry = FrameGeometry::new(width, height).unwrap();
        let picture = Picture::new(&geometry, 1, 1).unwrap();
        let grids = MetadataGrids::allocate(&geometry).unwrap();
        let mut distributor = BitDistributor::new(&geometry).unwrap();
        distributor.distribute(&dense_log(&geometry), &SymbolFilter::default(), 0);

        let mut view = ViewState::default();
        view.show_blocks = true;
        view.show_skip = true;
        view.show_bits = true;
        let mut compositor = Compositor::new(view);
        compositor.set_geometry(geometry).unwrap();

        group.throughput(Throughput::Elements((width * height) as u64));
        group.bench_function(BenchmarkId::new("overlays", format!("{}x{}", width, height)), |b| {
            b.iter(|| {
                compositor
                    .render(&picture, &grids, Some(distributor.map()))
                    .unwrap();
                black_box(compositor.pixels().len())
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_session_step,
    bench_bit_distribution,
    bench_compositor_render,
);

criterion_main!(benches);
