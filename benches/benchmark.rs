#[macro_use]
extern crate criterion;
extern crate lazperf;

use criterion::Criterion;

use lazperf::record::{PointRecordCompressor, PointRecordDecompressor};
use lazperf::{compress_buffer, decompress_buffer, DimensionKind, LazVlr, RecordSchema};
use std::io::Cursor;

const NUM_POINTS: usize = 10_000;

fn raw_points(schema: &RecordSchema) -> Vec<u8> {
    let mut state = 0x2545F4914F6CDD1Du64;
    (0..NUM_POINTS * schema.total_size())
        .map(|i| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            // mostly slowly varying bytes, some noise
            if i % 5 == 0 {
                state as u8
            } else {
                (i / 97) as u8
            }
        })
        .collect()
}

fn schema_of_point_format(point_format_id: u8) -> RecordSchema {
    RecordSchema::for_point_format(point_format_id, 0).unwrap()
}

fn user_dimensions_schema() -> RecordSchema {
    let mut schema = RecordSchema::new();
    schema
        .add_dimension("X", DimensionKind::Floating, 8)
        .unwrap()
        .add_dimension("Y", DimensionKind::Floating, 8)
        .unwrap()
        .add_dimension("Z", DimensionKind::Floating, 8)
        .unwrap()
        .add_dimension("Intensity", DimensionKind::Unsigned, 2)
        .unwrap();
    schema
}

fn record_compression_benchmark(c: &mut Criterion, name: &str, schema: RecordSchema) {
    let points = raw_points(&schema);
    let record_size = schema.total_size();
    let mut record_compressor =
        PointRecordCompressor::new(Cursor::new(Vec::<u8>::new()), &schema).unwrap();

    c.bench_function(name, move |b| {
        let mut raw_pts_iter = points.chunks_exact(record_size).cycle();
        b.iter(|| record_compressor.compress_next(raw_pts_iter.next().unwrap()));
    });
}

fn record_decompression_benchmark(c: &mut Criterion, name: &str, schema: RecordSchema) {
    let points = raw_points(&schema);
    let mut record_compressor =
        PointRecordCompressor::new(Cursor::new(Vec::<u8>::new()), &schema).unwrap();
    record_compressor.compress_many(&points).unwrap();
    record_compressor.done().unwrap();
    let compressed = record_compressor.into_stream().into_inner();

    c.bench_function(name, move |b| {
        let mut out = vec![0u8; points.len()];
        b.iter(|| {
            let mut record_decompressor =
                PointRecordDecompressor::new(Cursor::new(&compressed), &schema).unwrap();
            record_decompressor.decompress_many(&mut out).unwrap();
        });
    });
}

fn point_0_compression_benchmark(c: &mut Criterion) {
    record_compression_benchmark(c, "point_0_compression", schema_of_point_format(0));
}

fn point_3_compression_benchmark(c: &mut Criterion) {
    record_compression_benchmark(c, "point_3_compression", schema_of_point_format(3));
}

fn user_dimensions_compression_benchmark(c: &mut Criterion) {
    record_compression_benchmark(c, "user_dimensions_compression", user_dimensions_schema());
}

fn point_3_decompression_benchmark(c: &mut Criterion) {
    record_decompression_benchmark(c, "point_3_decompression", schema_of_point_format(3));
}

fn point_7_compression_benchmark(c: &mut Criterion) {
    record_compression_benchmark(c, "point_7_compression", schema_of_point_format(7));
}

fn point_7_decompression_benchmark(c: &mut Criterion) {
    record_decompression_benchmark(c, "point_7_decompression", schema_of_point_format(7));
}

fn user_dimensions_decompression_benchmark(c: &mut Criterion) {
    record_decompression_benchmark(
        c,
        "user_dimensions_decompression",
        user_dimensions_schema(),
    );
}

fn chunked_round_trip_benchmark(c: &mut Criterion) {
    let schema = schema_of_point_format(3);
    let points = raw_points(&schema);
    let vlr = LazVlr::from_schema(&schema);

    c.bench_function("point_3_chunked_round_trip", move |b| {
        let mut out = vec![0u8; points.len()];
        b.iter(|| {
            let mut compressed = Cursor::new(Vec::<u8>::new());
            compress_buffer(&mut compressed, &points, vlr.clone()).unwrap();
            decompress_buffer(compressed.get_ref(), &mut out, vlr.clone()).unwrap();
        });
    });
}

criterion_group!(
    benches,
    point_0_compression_benchmark,
    point_3_compression_benchmark,
    user_dimensions_compression_benchmark,
    point_3_decompression_benchmark,
    point_7_compression_benchmark,
    point_7_decompression_benchmark,
    user_dimensions_decompression_benchmark,
    chunked_round_trip_benchmark
);
criterion_main!(benches);
