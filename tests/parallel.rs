#![cfg(feature = "parallel")]

use std::io::Cursor;

use lazperf::{
    compress_buffer, decompress_buffer, par_compress_buffer, par_decompress_buffer, DimensionKind,
    LasZipError, LazVlrBuilder,
};

mod common;
use common::{make_points, point_format_schema};

#[test]
fn test_par_compress_matches_sequential() {
    for point_format_id in 0..=10 {
        let mut schema = point_format_schema(point_format_id, 3);
        if !schema.is_layered() {
            schema
                .add_dimension("Offset", DimensionKind::Signed, 8)
                .unwrap();
        }
        let points = make_points(&schema, 2_345, 17);
        let vlr = LazVlrBuilder::from_schema(&schema)
            .with_chunk_size(500)
            .build();

        let mut sequential = Cursor::new(Vec::<u8>::new());
        compress_buffer(&mut sequential, &points, vlr.clone()).unwrap();
        let mut parallel = Cursor::new(Vec::<u8>::new());
        par_compress_buffer(&mut parallel, &points, &vlr).unwrap();
        assert_eq!(sequential.get_ref(), parallel.get_ref());

        let mut out = vec![0u8; points.len()];
        par_decompress_buffer(parallel.get_ref(), &mut out, &vlr).unwrap();
        assert_eq!(out, points);
    }
}

#[test]
fn test_par_decompress_less_than_chunk_size() {
    let schema = point_format_schema(3, 0);
    let points = make_points(&schema, 1_000, 2);
    let vlr = LazVlrBuilder::from_schema(&schema)
        .with_chunk_size(300)
        .build();
    let mut data = Cursor::new(Vec::<u8>::new());
    compress_buffer(&mut data, &points, vlr.clone()).unwrap();

    for &num_points in &[1usize, 299, 300, 301, 950, 1_000] {
        let mut out = vec![0u8; num_points * schema.total_size()];
        par_decompress_buffer(data.get_ref(), &mut out, &vlr).unwrap();
        assert_eq!(&out[..], &points[..out.len()]);
    }
}

#[test]
fn test_variable_chunk_size_is_a_single_chunk() {
    let schema = point_format_schema(1, 0);
    let points = make_points(&schema, 700, 5);
    let vlr = LazVlrBuilder::from_schema(&schema)
        .with_variable_chunk_size()
        .build();
    let mut data = Cursor::new(Vec::<u8>::new());
    par_compress_buffer(&mut data, &points, &vlr).unwrap();

    let mut out = vec![0u8; points.len()];
    decompress_buffer(data.get_ref(), &mut out, vlr).unwrap();
    assert_eq!(out, points);
}

#[test]
fn test_par_decompress_requires_the_table() {
    let schema = point_format_schema(0, 0);
    let points = make_points(&schema, 100, 1);
    let vlr = LazVlrBuilder::from_schema(&schema)
        .with_chunk_size(30)
        .build();
    let mut data = Cursor::new(Vec::<u8>::new());
    par_compress_buffer(&mut data, &points, &vlr).unwrap();
    let mut data = data.into_inner();
    let mut offset = [0u8; 8];
    offset.copy_from_slice(&data[..8]);
    data.truncate(i64::from_le_bytes(offset) as usize);
    data[..8].copy_from_slice(&(-1i64).to_le_bytes());

    let mut out = vec![0u8; points.len()];
    match par_decompress_buffer(&data, &mut out, &vlr) {
        Err(LasZipError::MissingChunkTable) => {}
        other => panic!("unexpected result {:?}", other),
    }
}
