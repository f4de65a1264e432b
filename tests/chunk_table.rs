use std::io::{Cursor, Seek, SeekFrom, Write};

use lazperf::{
    ChunkTable, DimensionKind, LasZipCompressor, LasZipDecompressor, LasZipError, LazVlr,
    LazVlrBuilder, RecordSchema,
};

mod common;
use common::{make_points, point_format_schema};

fn read_offset(data: &[u8]) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[..8]);
    i64::from_le_bytes(bytes) as u64
}

#[test]
fn test_vlr_data_size() {
    let vlr = LazVlr::from_schema(&point_format_schema(3, 0));
    assert_eq!(vlr.data().len(), 52);
    assert_eq!(vlr.data_size(), 52);

    let vlr = LazVlr::from_schema(&point_format_schema(3, 27));
    assert_eq!(vlr.data().len(), 58);
    assert_eq!(vlr.items_size(), 34 + 27);
}

#[test]
fn test_vlr_survives_serialization() {
    let mut schema = point_format_schema(1, 4);
    schema
        .add_dimension("Range", DimensionKind::Floating, 8)
        .unwrap();
    let vlr = LazVlrBuilder::from_schema(&schema)
        .with_chunk_size(1234)
        .build();

    let read = LazVlr::from_buffer(&vlr.data()).unwrap();
    assert_eq!(read.chunk_size(), 1234);
    assert_eq!(read.items(), vlr.items());
    assert!(read.schema().unwrap().has_same_layout(&schema));
}

#[test]
fn test_table_is_consistent_with_data() {
    let schema = point_format_schema(3, 0);
    let points = make_points(&schema, 1_000, 1);
    let vlr = LazVlrBuilder::from_schema(&schema)
        .with_chunk_size(150)
        .build();

    let mut compressor = LasZipCompressor::new(Cursor::new(Vec::new()), vlr.clone()).unwrap();
    compressor.compress_many(&points).unwrap();
    compressor.done().unwrap();
    let data = compressor.into_inner().into_inner();

    let table = ChunkTable::from_buffer(&data, &vlr, 0).unwrap();
    assert_eq!(table.len(), 7);
    assert_eq!(table.total_byte_count() + 8, read_offset(&data));
    for entry in &table {
        assert_eq!(entry.point_count, 150);
        assert!(entry.byte_count > 0);
    }
}

#[test]
fn test_data_written_after_a_header() {
    // the compressed data is written after some bytes, like in a LAS file,
    // the offset stored is then counted from the start of the file
    let schema = point_format_schema(2, 0);
    let points = make_points(&schema, 300, 2);
    let vlr = LazVlrBuilder::from_schema(&schema)
        .with_chunk_size(100)
        .build();

    let mut output = Cursor::new(Vec::<u8>::new());
    output.write_all(&[0xAB; 375]).unwrap();
    {
        let mut compressor = LasZipCompressor::new(&mut output, vlr.clone()).unwrap();
        compressor.compress_many(&points).unwrap();
        compressor.done().unwrap();
    }
    let data = output.into_inner();
    let offset = read_offset(&data[375..]);
    let table = ChunkTable::from_buffer(&data[375..], &vlr, 375).unwrap();
    assert_eq!(table.len(), 3);

    let mut source = Cursor::new(&data);
    source.seek(SeekFrom::Start(375)).unwrap();
    let table = ChunkTable::read_from(&mut source, &vlr, 375).unwrap();
    assert_eq!(375 + 8 + table.total_byte_count(), offset);

    source.seek(SeekFrom::Start(375)).unwrap();
    let mut decompressor = LasZipDecompressor::new_with_stream_offset(source, vlr, 375).unwrap();
    let mut decompressed = vec![0u8; points.len()];
    decompressor.decompress_many(&mut decompressed).unwrap();
    assert_eq!(decompressed, points);
}

#[test]
fn test_seek_to_any_point() {
    let schema = point_format_schema(1, 0);
    let point_size = schema.total_size();
    let points = make_points(&schema, 450, 9);
    let vlr = LazVlrBuilder::from_schema(&schema)
        .with_chunk_size(100)
        .build();
    let mut output = Cursor::new(Vec::<u8>::new());
    lazperf::compress_buffer(&mut output, &points, vlr.clone()).unwrap();

    let mut decompressor = LasZipDecompressor::new(output, vlr).unwrap();
    let mut point = vec![0u8; point_size];
    for &index in &[0usize, 99, 100, 101, 449, 250, 3] {
        decompressor.seek(index as u64).unwrap();
        decompressor.decompress_one(&mut point).unwrap();
        assert_eq!(&point[..], &points[index * point_size..(index + 1) * point_size]);
    }

    // entries of fixed-size chunks all count chunk_size points
    match decompressor.seek(500) {
        Err(LasZipError::ChunkIndexOutOfBounds { .. }) => {}
        other => panic!("unexpected result {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_random_chunk_access() {
    let mut schema = RecordSchema::new();
    schema.add_point().add_gps_time();
    schema
        .add_dimension("Amplitude", DimensionKind::Signed, 2)
        .unwrap();
    let point_size = schema.total_size();
    let points = make_points(&schema, 1_050, 4);
    let vlr = LazVlrBuilder::from_schema(&schema)
        .with_chunk_size(200)
        .build();
    let mut output = Cursor::new(Vec::<u8>::new());
    lazperf::compress_buffer(&mut output, &points, vlr.clone()).unwrap();

    let mut decompressor = LasZipDecompressor::new(output, vlr).unwrap();
    assert_eq!(decompressor.chunk_table().map(ChunkTable::len), Some(6));

    // the last chunk holds the 50 remaining points
    let mut last = vec![0u8; 50 * point_size];
    decompressor.decompress_chunk(5, &mut last).unwrap();
    assert_eq!(&last[..], &points[1_000 * point_size..]);

    let mut chunk = vec![0u8; 200 * point_size];
    decompressor.decompress_chunk(2, &mut chunk).unwrap();
    assert_eq!(&chunk[..], &points[400 * point_size..600 * point_size]);

    // reading goes on with the chunk after
    let mut point = vec![0u8; point_size];
    decompressor.decompress_one(&mut point).unwrap();
    assert_eq!(&point[..], &points[600 * point_size..601 * point_size]);

    match decompressor.decompress_chunk(6, &mut chunk) {
        Err(LasZipError::ChunkIndexOutOfBounds { index: 6, count: 6 }) => {}
        other => panic!("unexpected result {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_fixed_chunks_without_table() {
    let schema = point_format_schema(0, 0);
    let points = make_points(&schema, 250, 6);
    let vlr = LazVlrBuilder::from_schema(&schema)
        .with_chunk_size(100)
        .build();

    let mut output = Cursor::new(Vec::<u8>::new());
    lazperf::compress_buffer(&mut output, &points, vlr.clone()).unwrap();
    let mut data = output.into_inner();
    // drop the table and clear the offset, as a writer that was interrupted would
    let offset = read_offset(&data) as usize;
    data.truncate(offset);
    data[..8].copy_from_slice(&(-1i64).to_le_bytes());

    let mut decompressor = LasZipDecompressor::new(Cursor::new(&data), vlr).unwrap();
    assert!(decompressor.chunk_table().is_none());
    let mut decompressed = vec![0u8; points.len()];
    decompressor.decompress_many(&mut decompressed).unwrap();
    assert_eq!(decompressed, points);

    let mut point = vec![0u8; schema.total_size()];
    match decompressor.decompress_chunk(0, &mut point) {
        Err(LasZipError::MissingChunkTable) => {}
        other => panic!("unexpected result {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_variable_chunks_need_the_table() {
    let schema = point_format_schema(0, 0);
    let vlr = LazVlrBuilder::from_schema(&schema)
        .with_variable_chunk_size()
        .build();
    let mut data = (-1i64).to_le_bytes().to_vec();
    data.extend_from_slice(&[0u8; 40]);
    match LasZipDecompressor::new(Cursor::new(&data), vlr) {
        Err(LasZipError::MissingChunkTable) => {}
        other => panic!("unexpected result {:?}", other.map(|_| ())),
    }
}
