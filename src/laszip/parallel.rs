//! Compression and decompression of whole buffers using multiple threads.
//!
//! Chunks share nothing, so each one is handled on the rayon pool
//! with its own codecs.
use std::convert::TryFrom;
use std::io::{Cursor, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, WriteBytesExt};
use log::debug;
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use super::chunk::{check_buffer_len, decode_chunk, encode_chunk};
use super::chunk_table::{update_chunk_table_offset, ChunkTable, ChunkTableEntry, OFFSET_SIZE};
use super::LazVlr;
use crate::byteslice::{ChunksIrregular, ChunksIrregularMut};
use crate::record::PointRecordDecompressor;
use crate::{LasZipError, RecordSchema};

/// Compresses all points in parallel
///
/// Just like [`compress_buffer`] but the compression is done in multiple threads,
/// the data written is the same.
///
/// With variable-size chunks, all the points form a single chunk.
///
/// # Note
///
/// Point order [is conserved](https://github.com/rayon-rs/rayon/issues/551)
///
/// [`compress_buffer`]: super::compress_buffer
pub fn par_compress_buffer<W: Write + Seek>(
    dst: &mut W,
    uncompressed_points: &[u8],
    laz_vlr: &LazVlr,
) -> crate::Result<()> {
    let start_pos = dst.seek(SeekFrom::Current(0))?;
    // Reserve the bytes for the chunk table offset that will be updated later
    dst.write_i64::<LittleEndian>(-1)?;

    let chunk_table = par_compress(dst, uncompressed_points, laz_vlr)?;

    update_chunk_table_offset(dst, SeekFrom::Start(start_pos), 0)?;
    chunk_table.write_to(dst, laz_vlr)?;
    Ok(())
}

/// Compresses the points contained in `uncompressed_points` writing the result in the `dst`
/// and returns the entries of the chunks written.
///
/// Does not write nor update the offset to the chunk table
/// And does not write the chunk table
pub fn par_compress<W: Write>(
    dst: &mut W,
    uncompressed_points: &[u8],
    laz_vlr: &LazVlr,
) -> crate::Result<ChunkTable> {
    laz_vlr.check_supported()?;
    let schema = laz_vlr.schema()?;
    schema.validate()?;
    let record_size = schema.total_size();
    check_buffer_len(uncompressed_points.len(), record_size)?;
    if uncompressed_points.is_empty() {
        return Ok(ChunkTable::default());
    }

    let chunk_size_in_bytes = usize::try_from(laz_vlr.num_bytes_in_decompressed_chunk())
        .unwrap_or(usize::max_value());
    // The last chunk may not have the same size,
    // the chunks() method takes care of that for us
    let all_slices = uncompressed_points
        .chunks(chunk_size_in_bytes)
        .collect::<Vec<_>>();
    debug!(
        "compressing {} chunks of at most {} bytes",
        all_slices.len(),
        chunk_size_in_bytes
    );

    let chunks = all_slices
        .into_par_iter()
        .map(|slc| -> crate::Result<(u64, Vec<u8>)> {
            let bytes = encode_chunk(&schema, slc)?;
            Ok(((slc.len() / record_size) as u64, bytes))
        })
        .collect::<Vec<crate::Result<(u64, Vec<u8>)>>>();

    let mut chunk_table = ChunkTable::with_capacity(chunks.len());
    for chunk_result in chunks {
        let (point_count, bytes) = chunk_result?;
        dst.write_all(&bytes)?;
        chunk_table.push(ChunkTableEntry {
            point_count,
            byte_count: bytes.len() as u64,
        });
    }
    Ok(chunk_table)
}

/// Decompresses all points from the buffer in parallel.
///
/// Each chunk is sent for decompression in a thread.
///
/// Just like [`decompress_buffer`] but the decompression is done using multiple threads,
/// with the addition that the chunk table _IS_ mandatory.
///
/// [`decompress_buffer`]: super::decompress_buffer
pub fn par_decompress_buffer(
    compressed_points_data: &[u8],
    decompressed_points: &mut [u8],
    laz_vlr: &LazVlr,
) -> crate::Result<()> {
    laz_vlr.check_supported()?;
    let schema = laz_vlr.schema()?;
    schema.validate()?;
    let record_size = schema.total_size();
    check_buffer_len(decompressed_points.len(), record_size)?;

    let chunk_table = ChunkTable::from_buffer(compressed_points_data, laz_vlr, 0)?;
    let data_start = OFFSET_SIZE as usize;
    let data_end = data_start + chunk_table.total_byte_count() as usize;
    par_decompress(
        &compressed_points_data[data_start..data_end],
        decompressed_points,
        &schema,
        &chunk_table,
    )
}

/// Actual the parallel decompression
///
/// `compressed_points` must contains only the bytes corresponding to the points
/// (so no offset, no chunk_table)
fn par_decompress(
    compressed_points: &[u8],
    decompressed_points: &mut [u8],
    schema: &RecordSchema,
    chunk_table: &ChunkTable,
) -> crate::Result<()> {
    let record_size = schema.total_size();

    let input_sizes = chunk_table
        .into_iter()
        .map(|entry| entry.byte_count as usize)
        .collect::<Vec<usize>>();
    // the last chunk may only be partially decompressed
    let mut output_sizes = Vec::<usize>::with_capacity(chunk_table.len());
    let mut complete = Vec::<bool>::with_capacity(chunk_table.len());
    let mut remaining = decompressed_points.len();
    for entry in chunk_table {
        if remaining == 0 {
            break;
        }
        let chunk_len = (entry.point_count as usize).saturating_mul(record_size);
        output_sizes.push(chunk_len.min(remaining));
        complete.push(chunk_len <= remaining);
        remaining -= chunk_len.min(remaining);
    }
    if remaining != 0 {
        return Err(LasZipError::CorruptStream(
            "more points requested than the data holds",
        ));
    }

    let decompression_jobs: Vec<(&[u8], &mut [u8], bool)> =
        ChunksIrregular::new(compressed_points, &input_sizes)
            .zip(ChunksIrregularMut::new(decompressed_points, &output_sizes))
            .zip(complete.iter().copied())
            .map(|((chunk_in, chunk_out), is_complete)| (chunk_in, chunk_out, is_complete))
            .collect();
    debug!("decompressing {} chunks", decompression_jobs.len());

    decompression_jobs
        .into_par_iter()
        .map(|(chunk_in, chunk_out, is_complete)| {
            if is_complete {
                decode_chunk(schema, chunk_in, chunk_out.len() / record_size, chunk_out)
            } else {
                let mut decompressor = PointRecordDecompressor::new(Cursor::new(chunk_in), schema)?;
                decompressor.decompress_many(chunk_out)?;
                Ok(())
            }
        })
        .collect::<crate::Result<()>>()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{compress_buffer, LazVlrBuilder};

    fn vlr(chunk_size: u32) -> LazVlr {
        let mut schema = RecordSchema::new();
        schema.add_point().add_rgb();
        LazVlrBuilder::from_schema(&schema)
            .with_chunk_size(chunk_size)
            .build()
    }

    fn points(count: usize) -> Vec<u8> {
        (0..count * 26).map(|i| ((i * 5) % 253) as u8).collect()
    }

    #[test]
    fn test_same_output_as_sequential() {
        let vlr = vlr(7);
        let points = points(50);

        let mut sequential = Cursor::new(Vec::<u8>::new());
        compress_buffer(&mut sequential, &points, vlr.clone()).unwrap();
        let mut parallel = Cursor::new(Vec::<u8>::new());
        par_compress_buffer(&mut parallel, &points, &vlr).unwrap();
        assert_eq!(sequential.get_ref(), parallel.get_ref());
    }

    #[test]
    fn test_partial_decompression() {
        let vlr = vlr(7);
        let points = points(20);
        let mut data = Cursor::new(Vec::<u8>::new());
        par_compress_buffer(&mut data, &points, &vlr).unwrap();

        let mut out = vec![0u8; 10 * 26];
        par_decompress_buffer(data.get_ref(), &mut out, &vlr).unwrap();
        assert_eq!(&out[..], &points[..out.len()]);

        // the entries of fixed-size chunks count 7 points each
        let mut too_many = vec![0u8; 22 * 26];
        assert!(par_decompress_buffer(data.get_ref(), &mut too_many, &vlr).is_err());
    }
}
