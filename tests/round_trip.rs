use std::io::Cursor;

use lazperf::{
    compress_buffer, decompress_buffer, CompressorType, DimensionKind, LasZipCompressor,
    LasZipDecompressor, LazVlr, LazVlrBuilder, RecordSchema,
};

mod common;
use common::{make_points, point_format_schema};

fn compress(vlr: &LazVlr, points: &[u8]) -> Vec<u8> {
    let mut output = Cursor::new(Vec::<u8>::new());
    compress_buffer(&mut output, points, vlr.clone()).unwrap();
    output.into_inner()
}

fn round_trip(schema: &RecordSchema, chunk_size: u32, num_points: usize) {
    let points = make_points(schema, num_points, u64::from(chunk_size) + num_points as u64);
    let vlr = LazVlrBuilder::from_schema(schema)
        .with_chunk_size(chunk_size)
        .build();
    let compressed = compress(&vlr, &points);

    let mut decompressed = vec![0u8; points.len()];
    decompress_buffer(&compressed, &mut decompressed, vlr).unwrap();
    assert_eq!(decompressed, points);
}

#[test]
fn test_las_point_formats() {
    for point_format_id in 0..=10 {
        for &num_extra_bytes in &[0u16, 27] {
            let schema = point_format_schema(point_format_id, num_extra_bytes);
            round_trip(&schema, LazVlr::DEFAULT_CHUNK_SIZE, 1_000);
        }
    }
}

#[test]
fn test_every_dimension_kind_and_size() {
    let dimensions = [
        (DimensionKind::Signed, 1),
        (DimensionKind::Signed, 2),
        (DimensionKind::Signed, 4),
        (DimensionKind::Signed, 8),
        (DimensionKind::Unsigned, 1),
        (DimensionKind::Unsigned, 2),
        (DimensionKind::Unsigned, 4),
        (DimensionKind::Unsigned, 8),
        (DimensionKind::Floating, 4),
        (DimensionKind::Floating, 8),
    ];
    for &(kind, size) in &dimensions {
        let mut schema = RecordSchema::new();
        schema.add_dimension("Value", kind, size).unwrap();
        round_trip(&schema, 100, 333);
    }

    let mut all = RecordSchema::new();
    for (i, &(kind, size)) in dimensions.iter().enumerate() {
        all.add_dimension(format!("Value{}", i), kind, size).unwrap();
    }
    round_trip(&all, 100, 333);
}

#[test]
fn test_mixed_las_groups_and_user_dimensions() {
    let mut schema = RecordSchema::new();
    schema.add_point().add_gps_time().add_rgb().add_extra_bytes(3);
    schema
        .add_dimension("Deviation", DimensionKind::Floating, 4)
        .unwrap();
    schema
        .add_dimension("EchoWidth", DimensionKind::Unsigned, 2)
        .unwrap();
    round_trip(&schema, 250, 1_000);
}

#[test]
fn test_chunk_boundaries() {
    let schema = point_format_schema(3, 0);
    // one point per chunk
    round_trip(&schema, 1, 10);
    // exactly one full chunk
    round_trip(&schema, 64, 64);
    // a multiple of the chunk size
    round_trip(&schema, 64, 64 * 5);
    // a partial last chunk
    round_trip(&schema, 64, 64 * 5 + 1);
    // fewer points than a chunk
    round_trip(&schema, 64, 3);
}

#[test]
fn test_single_point() {
    for point_format_id in 0..=10 {
        round_trip(&point_format_schema(point_format_id, 0), 50_000, 1);
    }
}

#[test]
fn test_zero_points() {
    let schema = point_format_schema(1, 0);
    let vlr = LazVlr::from_schema(&schema);
    let compressed = compress(&vlr, &[]);

    let mut decompressor = LasZipDecompressor::new(Cursor::new(&compressed), vlr).unwrap();
    assert_eq!(decompressor.chunk_table().map(|t| t.len()), Some(0));
    let mut point = vec![0u8; schema.total_size()];
    assert!(decompressor.decompress_one(&mut point).is_err());
}

#[test]
fn test_compression_is_deterministic() {
    let schema = point_format_schema(3, 5);
    let points = make_points(&schema, 2_000, 7);
    let vlr = LazVlrBuilder::from_schema(&schema)
        .with_chunk_size(300)
        .build();
    assert_eq!(compress(&vlr, &points), compress(&vlr, &points));
}

#[test]
fn test_compression_reduces_size() {
    let schema = point_format_schema(3, 0);
    let points = make_points(&schema, 5_000, 3);
    let compressed = compress(&LazVlr::from_schema(&schema), &points);
    assert!(compressed.len() < points.len());
}

#[test]
fn test_point_by_point_matches_buffer() {
    let schema = point_format_schema(1, 2);
    let points = make_points(&schema, 500, 11);
    let vlr = LazVlrBuilder::from_schema(&schema)
        .with_chunk_size(128)
        .build();

    let mut compressor = LasZipCompressor::new(Cursor::new(Vec::new()), vlr.clone()).unwrap();
    for point in points.chunks_exact(schema.total_size()) {
        compressor.compress_one(point).unwrap();
    }
    compressor.done().unwrap();
    let compressed = compressor.into_inner().into_inner();
    assert_eq!(compressed, compress(&vlr, &points));

    let mut decompressor = LasZipDecompressor::new(Cursor::new(&compressed), vlr).unwrap();
    let mut point = vec![0u8; schema.total_size()];
    for expected in points.chunks_exact(schema.total_size()) {
        decompressor.decompress_one(&mut point).unwrap();
        assert_eq!(&point[..], expected);
    }
}

#[test]
fn test_variable_size_chunks() {
    let schema = point_format_schema(3, 0);
    let point_size = schema.total_size();
    let chunk_sizes = [1usize, 2, 3, 4, 5, 6, 5, 4, 3, 2, 1];
    let total: usize = chunk_sizes.iter().sum();
    let points = make_points(&schema, total, 5);

    let vlr = LazVlrBuilder::from_schema(&schema)
        .with_variable_chunk_size()
        .build();
    let mut compressor = LasZipCompressor::new(Cursor::new(Vec::new()), vlr.clone()).unwrap();
    let mut start = 0;
    for size in &chunk_sizes {
        let end = start + size * point_size;
        compressor.compress_many(&points[start..end]).unwrap();
        compressor.finish_current_chunk().unwrap();
        start = end;
    }
    compressor.done().unwrap();
    let counts: Vec<u64> = compressor
        .chunk_table()
        .into_iter()
        .map(|entry| entry.point_count)
        .collect();
    assert_eq!(
        counts,
        chunk_sizes.iter().map(|&s| s as u64).collect::<Vec<_>>()
    );
    let compressed = compressor.into_inner().into_inner();

    let mut decompressed = vec![0u8; points.len()];
    decompress_buffer(&compressed, &mut decompressed, vlr.clone()).unwrap();
    assert_eq!(decompressed, points);

    // each chunk can be decompressed on its own
    let mut decompressor = LasZipDecompressor::new(Cursor::new(&compressed), vlr).unwrap();
    let mut start = 0;
    for (index, size) in chunk_sizes.iter().enumerate().rev() {
        let chunk_start: usize = chunk_sizes[..index].iter().sum::<usize>() * point_size;
        let mut chunk = vec![0u8; size * point_size];
        decompressor.decompress_chunk(index, &mut chunk).unwrap();
        assert_eq!(&chunk[..], &points[chunk_start..chunk_start + chunk.len()]);
        start += chunk.len();
    }
    assert_eq!(start, points.len());
}

#[test]
fn test_fourteen_user_dimensions() {
    use DimensionKind::*;
    let dimensions = [
        ("X", Floating, 8),
        ("Y", Floating, 8),
        ("Z", Floating, 8),
        ("Origin", Unsigned, 8),
        ("Intensity", Unsigned, 2),
        ("ReturnNumber", Unsigned, 1),
        ("NumberOfReturns", Unsigned, 1),
        ("ScanDirectionFlag", Unsigned, 1),
        ("EdgeOfFlightLine", Unsigned, 1),
        ("Classification", Unsigned, 1),
        ("ScanAngleRank", Floating, 4),
        ("UserData", Unsigned, 1),
        ("PointSourceId", Unsigned, 2),
        ("GpsTime", Floating, 8),
    ];
    let mut schema = RecordSchema::new();
    for &(name, kind, size) in &dimensions {
        schema.add_dimension(name, kind, size).unwrap();
    }
    assert_eq!(schema.iter_dimensions().count(), 14);
    assert_eq!(schema.total_size(), 54);
    round_trip(&schema, LazVlr::DEFAULT_CHUNK_SIZE, 1_002);

    // the vlr describes each dimension as its own item
    let vlr = LazVlr::from_schema(&schema);
    assert_eq!(vlr.data_size(), 34 + 6 * 14);
    let parsed = LazVlr::from_buffer(&vlr.data()).unwrap();
    assert_eq!(parsed, vlr);
    assert!(parsed.schema().unwrap().has_same_layout(&schema));

    // 8 byte dimensions are coded as two 4 byte halves, 4 byte floats as signed integers
    let mut expanded = RecordSchema::new();
    for &(name, kind, size) in &dimensions {
        match (kind, size) {
            (_, 8) => {
                expanded
                    .add_dimension(format!("{}Low", name), Unsigned, 4)
                    .unwrap()
                    .add_dimension(format!("{}High", name), Unsigned, 4)
                    .unwrap();
            }
            (Floating, 4) => {
                expanded.add_dimension(name, Signed, 4).unwrap();
            }
            _ => {
                expanded.add_dimension(name, kind, size).unwrap();
            }
        }
    }
    assert_eq!(expanded.total_size(), 54);
    let points = make_points(&schema, 1_002, 14);
    assert_eq!(
        compress(&vlr, &points),
        compress(&LazVlr::from_schema(&expanded), &points)
    );
}

#[test]
fn test_every_point_format_with_small_chunks() {
    for point_format_id in 0..=10 {
        let schema = point_format_schema(point_format_id, 3);
        round_trip(&schema, 100, 1_050);
    }
}

#[test]
fn test_layered_formats_use_the_layered_compressor() {
    for point_format_id in 6..=10 {
        let schema = point_format_schema(point_format_id, 0);
        assert!(schema.is_layered());
        assert_eq!(
            LazVlr::from_schema(&schema).compressor(),
            CompressorType::LayeredChunked
        );
    }
    for point_format_id in 0..=5 {
        let schema = point_format_schema(point_format_id, 0);
        assert_eq!(
            LazVlr::from_schema(&schema).compressor(),
            CompressorType::PointWiseChunked
        );
    }
}

#[test]
fn test_layered_variable_size_chunks() {
    let schema = point_format_schema(10, 2);
    let point_size = schema.total_size();
    let chunk_sizes = [7usize, 1, 20, 3];
    let total: usize = chunk_sizes.iter().sum();
    let points = make_points(&schema, total, 21);

    let vlr = LazVlrBuilder::from_schema(&schema)
        .with_variable_chunk_size()
        .build();
    let mut compressor = LasZipCompressor::new(Cursor::new(Vec::new()), vlr.clone()).unwrap();
    let mut start = 0;
    for size in &chunk_sizes {
        let end = start + size * point_size;
        compressor.compress_many(&points[start..end]).unwrap();
        compressor.finish_current_chunk().unwrap();
        start = end;
    }
    compressor.done().unwrap();
    let compressed = compressor.into_inner().into_inner();

    let mut decompressor = LasZipDecompressor::new(Cursor::new(&compressed), vlr).unwrap();
    let mut decompressed = vec![0u8; points.len()];
    decompressor.decompress_many(&mut decompressed).unwrap();
    assert_eq!(decompressed, points);

    let mut chunk = vec![0u8; 20 * point_size];
    decompressor.decompress_chunk(2, &mut chunk).unwrap();
    assert_eq!(&chunk[..], &points[8 * point_size..28 * point_size]);
}
