//! Compression of a single chunk, independently of any other.
use std::io::Cursor;

use crate::record::{PointRecordCompressor, PointRecordDecompressor};
use crate::{LasZipError, RecordSchema};

/// Number of bytes a decoded chunk may leave unread.
///
/// The decoder reads exactly what the encoder wrote.
pub const CHUNK_PADDING_TOLERANCE: usize = 0;

pub(crate) fn check_buffer_len(buffer_len: usize, record_size: usize) -> crate::Result<()> {
    if record_size == 0 || buffer_len % record_size != 0 {
        Err(LasZipError::InsufficientInput {
            buffer_len,
            record_size,
        })
    } else {
        Ok(())
    }
}

/// Compresses the records in `points` as one chunk.
///
/// No bytes are produced when there are no points.
pub fn encode_chunk(schema: &RecordSchema, points: &[u8]) -> crate::Result<Vec<u8>> {
    let mut compressor = PointRecordCompressor::new(Cursor::new(Vec::<u8>::new()), schema)?;
    check_buffer_len(points.len(), compressor.record_size())?;
    if points.is_empty() {
        return Ok(vec![]);
    }
    compressor.compress_many(points)?;
    compressor.done()?;
    Ok(compressor.into_stream().into_inner())
}

/// Decompresses the chunk in `bytes`, which holds `expected_point_count` records,
/// into `out`.
///
/// Fails with `CorruptStream` if the bytes end before the points are decoded,
/// or if bytes are left once they are.
pub fn decode_chunk(
    schema: &RecordSchema,
    bytes: &[u8],
    expected_point_count: usize,
    out: &mut [u8],
) -> crate::Result<()> {
    let mut decompressor = PointRecordDecompressor::new(Cursor::new(bytes), schema)?;
    let record_size = decompressor.record_size();
    check_buffer_len(out.len(), record_size)?;
    if out.len() / record_size != expected_point_count {
        return Err(LasZipError::InsufficientInput {
            buffer_len: out.len(),
            record_size,
        });
    }

    decompressor.decompress_many(out)?;
    let consumed = decompressor.get_ref().position() as usize;
    if bytes.len() - consumed > CHUNK_PADDING_TOLERANCE {
        return Err(LasZipError::CorruptStream(
            "bytes are left after the last point of the chunk",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::DimensionKind;

    fn schema() -> RecordSchema {
        let mut schema = RecordSchema::new();
        schema.add_point().add_gps_time();
        schema
            .add_dimension("Reflectance", DimensionKind::Floating, 4)
            .unwrap();
        schema
    }

    fn points(schema: &RecordSchema, count: usize) -> Vec<u8> {
        (0..count * schema.total_size())
            .map(|i| ((i * 31) ^ (i >> 3)) as u8)
            .collect()
    }

    #[test]
    fn test_round_trip() {
        let schema = schema();
        let points = points(&schema, 100);
        let bytes = encode_chunk(&schema, &points).unwrap();

        let mut out = vec![0u8; points.len()];
        decode_chunk(&schema, &bytes, 100, &mut out).unwrap();
        assert_eq!(out, points);
    }

    #[test]
    fn test_single_point_chunk() {
        let schema = schema();
        let points = points(&schema, 1);
        let bytes = encode_chunk(&schema, &points).unwrap();
        assert_eq!(bytes.len(), schema.total_size() + 4);
        assert_eq!(&bytes[..points.len()], &points[..]);
    }

    #[test]
    fn test_empty_chunk() {
        let schema = schema();
        assert!(encode_chunk(&schema, &[]).unwrap().is_empty());
        decode_chunk(&schema, &[], 0, &mut []).unwrap();
    }

    #[test]
    fn test_deterministic() {
        let schema = schema();
        let points = points(&schema, 50);
        assert_eq!(
            encode_chunk(&schema, &points).unwrap(),
            encode_chunk(&schema, &points).unwrap()
        );
    }

    #[test]
    fn test_insufficient_input() {
        let schema = schema();
        let points = points(&schema, 3);
        match encode_chunk(&schema, &points[1..]) {
            Err(LasZipError::InsufficientInput { record_size, .. }) => {
                assert_eq!(record_size, schema.total_size())
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_truncated_and_padded_chunks() {
        let schema = schema();
        let points = points(&schema, 20);
        let bytes = encode_chunk(&schema, &points).unwrap();
        let mut out = vec![0u8; points.len()];

        match decode_chunk(&schema, &bytes[..bytes.len() - 1], 20, &mut out) {
            Err(LasZipError::CorruptStream(_)) => {}
            other => panic!("unexpected result {:?}", other),
        }

        let mut padded = bytes.clone();
        padded.push(0);
        match decode_chunk(&schema, &padded, 20, &mut out) {
            Err(LasZipError::CorruptStream(_)) => {}
            other => panic!("unexpected result {:?}", other),
        }
    }
}
