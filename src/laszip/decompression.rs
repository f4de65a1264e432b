use std::io::{Read, Seek, SeekFrom};

use log::debug;

use super::chunk::{check_buffer_len, decode_chunk};
use super::chunk_table::{ChunkTable, OFFSET_SIZE};
use super::LazVlr;
use crate::record::PointRecordDecompressor;
use crate::{LasZipError, RecordSchema};

/// Struct that handles the decompression of the points written by a
/// [`LasZipCompressor`](super::LasZipCompressor)
pub struct LasZipDecompressor<R: Read + Seek> {
    vlr: LazVlr,
    schema: RecordSchema,
    record_decompressor: PointRecordDecompressor<R>,
    /// Position of the first chunk in the source
    data_start: u64,
    chunk_table: Option<ChunkTable>,
    current_chunk: usize,
    chunk_points_read: u64,
    /// 0 until the first point of a chunk is read
    num_points_in_chunk: u64,
    chunk_start_pos: u64,
}

impl<R: Read + Seek> LasZipDecompressor<R> {
    /// Creates a new instance from a data source of compressed points
    /// and the LazVlr describing the compressed data
    ///
    /// The source must be positioned at the start of the compressed data,
    /// and the offset to the chunk table is expected to be relative to that position.
    pub fn new(source: R, vlr: LazVlr) -> crate::Result<Self> {
        Self::new_with_stream_offset(source, vlr, 0)
    }

    /// Same as [`new`](Self::new), but the offset to the chunk table stored in the data is
    /// relative to a position `stream_offset` bytes before the start of the source.
    pub fn new_with_stream_offset(
        mut source: R,
        vlr: LazVlr,
        stream_offset: u64,
    ) -> crate::Result<Self> {
        vlr.check_supported()?;
        let schema = vlr.schema()?;

        let start = source.seek(SeekFrom::Current(0))?;
        let chunk_table = match ChunkTable::read_from(&mut source, &vlr, stream_offset) {
            Ok(chunk_table) => Some(chunk_table),
            // Fixed-size chunks can still be read sequentially without the table
            Err(LasZipError::MissingChunkTable) if !vlr.uses_variably_sized_chunks() => {
                debug!("no chunk table found, reading sequentially");
                None
            }
            Err(e) => return Err(e),
        };
        let data_start = source.seek(SeekFrom::Start(start + OFFSET_SIZE))?;

        let record_decompressor = PointRecordDecompressor::new(source, &schema)?;
        Ok(Self {
            vlr,
            schema,
            record_decompressor,
            data_start,
            chunk_table,
            current_chunk: 0,
            chunk_points_read: 0,
            num_points_in_chunk: 0,
            chunk_start_pos: data_start,
        })
    }

    /// Creates a new instance from a data source of compressed points
    /// and the `record data` of the laszip vlr
    pub fn new_with_record_data(source: R, laszip_vlr_record_data: &[u8]) -> crate::Result<Self> {
        let vlr = LazVlr::from_buffer(laszip_vlr_record_data)?;
        Self::new(source, vlr)
    }

    /// Decompress the next point and write the uncompressed data to the out buffer.
    ///
    /// - The buffer should have at least enough byte to store the decompressed data
    /// - The data is written in the buffer exactly as it was given to the compressor
    pub fn decompress_one(&mut self, out: &mut [u8]) -> crate::Result<()> {
        if self.num_points_in_chunk != 0 && self.chunk_points_read == self.num_points_in_chunk {
            self.end_chunk()?;
        }
        if self.num_points_in_chunk == 0 {
            self.begin_chunk()?;
        }

        self.record_decompressor.decompress_next(out)?;
        self.chunk_points_read += 1;
        self.check_chunk_end()
    }

    /// Decompress as many points as the `out` slice can hold
    ///
    /// # Note
    ///
    /// If the `out` slice contains more space than there are points
    /// the function will still decompress and thus and error will occur
    pub fn decompress_many(&mut self, out: &mut [u8]) -> crate::Result<()> {
        let record_size = self.record_decompressor.record_size();
        check_buffer_len(out.len(), record_size)?;
        for point in out.chunks_exact_mut(record_size) {
            self.decompress_one(point)?;
        }
        Ok(())
    }

    pub fn vlr(&self) -> &LazVlr {
        &self.vlr
    }

    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    pub fn chunk_table(&self) -> Option<&ChunkTable> {
        self.chunk_table.as_ref()
    }

    /// Seeks to the point designed by the index
    ///
    /// # Important
    ///
    /// Seeking in compressed data has a higher cost than non compressed data
    /// because the stream has to be moved to the start of the chunk
    /// and then we have to decompress points in the chunk until we reach the
    /// one we want.
    pub fn seek(&mut self, point_idx: u64) -> crate::Result<()> {
        let chunk_table = self
            .chunk_table
            .as_ref()
            .ok_or(LasZipError::MissingChunkTable)?;

        let mut chunk_of_point = chunk_table.len();
        let mut first_point_of_chunk = 0u64;
        for (i, entry) in chunk_table.into_iter().enumerate() {
            if point_idx < first_point_of_chunk + entry.point_count {
                chunk_of_point = i;
                break;
            }
            first_point_of_chunk += entry.point_count;
        }
        if chunk_of_point == chunk_table.len() {
            return Err(LasZipError::ChunkIndexOutOfBounds {
                index: chunk_of_point,
                count: chunk_table.len(),
            });
        }

        self.move_to_chunk(chunk_of_point)?;
        let mut tmp_out = vec![0u8; self.record_decompressor.record_size()];
        for _ in first_point_of_chunk..point_idx {
            self.decompress_one(&mut tmp_out)?;
        }
        Ok(())
    }

    /// Decompresses the chunk at `index` into `out`, without decompressing
    /// the chunks before it.
    ///
    /// With fixed-size chunks, `out` must hold exactly the number of points
    /// of the chunk, `chunk_size` except for the last one.
    ///
    /// Afterwards, sequential decompression continues at the next chunk.
    pub fn decompress_chunk(&mut self, index: usize, out: &mut [u8]) -> crate::Result<()> {
        let chunk_table = self
            .chunk_table
            .as_ref()
            .ok_or(LasZipError::MissingChunkTable)?;
        let entry = chunk_table.entry(index)?;
        let record_size = self.record_decompressor.record_size();
        check_buffer_len(out.len(), record_size)?;
        let point_count = if self.vlr.uses_variably_sized_chunks() {
            entry.point_count as usize
        } else {
            out.len() / record_size
        };

        self.move_to_chunk(index)?;
        let mut bytes = vec![0u8; entry.byte_count as usize];
        self.record_decompressor.get_mut().read_exact(&mut bytes)?;
        decode_chunk(&self.schema, &bytes, point_count, out)?;

        self.current_chunk = index + 1;
        self.chunk_start_pos += entry.byte_count;
        Ok(())
    }

    /// Places the source at the start of the chunk and resets the decompression state
    fn move_to_chunk(&mut self, index: usize) -> crate::Result<()> {
        let start = match &self.chunk_table {
            Some(chunk_table) => self.data_start + chunk_table.chunk_start(index),
            None => return Err(LasZipError::MissingChunkTable),
        };
        self.record_decompressor
            .get_mut()
            .seek(SeekFrom::Start(start))?;
        self.record_decompressor.reset();
        self.current_chunk = index;
        self.chunk_points_read = 0;
        self.num_points_in_chunk = 0;
        self.chunk_start_pos = start;
        Ok(())
    }

    fn begin_chunk(&mut self) -> crate::Result<()> {
        self.num_points_in_chunk = match &self.chunk_table {
            Some(chunk_table) => {
                let entry = chunk_table.entry(self.current_chunk).map_err(|_| {
                    LasZipError::CorruptStream("more points requested than the data holds")
                })?;
                entry.point_count
            }
            None => u64::from(self.vlr.chunk_size()),
        };
        if self.num_points_in_chunk == 0 {
            return Err(LasZipError::CorruptStream("the chunk table holds an empty chunk"));
        }
        self.chunk_start_pos = self
            .record_decompressor
            .get_mut()
            .seek(SeekFrom::Current(0))?;
        Ok(())
    }

    /// Fails if the points read so far used more bytes than the chunk table gives the chunk.
    ///
    /// The last of fixed-size chunks may hold fewer points than the chunk size,
    /// reading past them goes into the bytes that follow.
    fn check_chunk_end(&mut self) -> crate::Result<()> {
        if let Some(chunk_table) = &self.chunk_table {
            let chunk_end = self.chunk_start_pos + chunk_table[self.current_chunk].byte_count;
            let current_pos = self.record_decompressor.get_mut().stream_position()?;
            if current_pos > chunk_end {
                return Err(LasZipError::CorruptStream(
                    "more points requested than the chunk holds",
                ));
            }
        }
        Ok(())
    }

    fn end_chunk(&mut self) -> crate::Result<()> {
        if let Some(chunk_table) = &self.chunk_table {
            let expected = chunk_table[self.current_chunk].byte_count;
            let current_pos = self
                .record_decompressor
                .get_mut()
                .seek(SeekFrom::Current(0))?;
            if current_pos - self.chunk_start_pos != expected {
                return Err(LasZipError::CorruptStream(
                    "the chunk size disagrees with the chunk table",
                ));
            }
        }
        self.record_decompressor.reset();
        self.current_chunk += 1;
        self.chunk_points_read = 0;
        self.num_points_in_chunk = 0;
        Ok(())
    }

    pub fn into_inner(self) -> R {
        self.record_decompressor.into_stream()
    }

    pub fn get_mut(&mut self) -> &mut R {
        self.record_decompressor.get_mut()
    }

    pub fn get(&self) -> &R {
        self.record_decompressor.get_ref()
    }
}

/// Decompresses all points from the buffer
///
/// The `compressed_points_data` slice must contain all the laszip data
/// that means:
///   1) The offset to the chunk table (i64)
///   2) the compressed points
///   3) the chunk table (optional for fixed-size chunks)
///
/// This fn will decompress as many points as the `decompress_points` can hold.
///
/// # Important
///
/// The chunk table offset is expected to be counted from the start of
/// the buffer, use [`LasZipDecompressor::new_with_stream_offset`] otherwise.
pub fn decompress_buffer(
    compressed_points_data: &[u8],
    decompressed_points: &mut [u8],
    laz_vlr: LazVlr,
) -> crate::Result<()> {
    let src = std::io::Cursor::new(compressed_points_data);
    let mut decompressor = LasZipDecompressor::new(src, laz_vlr)?;
    decompressor.decompress_many(decompressed_points)
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use super::*;
    use crate::laszip::chunk_table::ChunkTableEntry;
    use crate::{compress_buffer, LasZipCompressor, LazVlrBuilder};

    fn compressed(vlr: &LazVlr, points: &[u8]) -> Vec<u8> {
        let mut dst = Cursor::new(Vec::<u8>::new());
        compress_buffer(&mut dst, points, vlr.clone()).unwrap();
        dst.into_inner()
    }

    fn extra_bytes_vlr(chunk_size: u32) -> LazVlr {
        let mut schema = RecordSchema::new();
        schema.add_extra_bytes(3);
        LazVlrBuilder::from_schema(&schema)
            .with_chunk_size(chunk_size)
            .build()
    }

    #[test]
    fn test_seek() {
        let vlr = extra_bytes_vlr(4);
        let points: Vec<u8> = (0..3 * 10).map(|i| (i * i) as u8).collect();
        let data = compressed(&vlr, &points);

        let mut decompressor = LasZipDecompressor::new(Cursor::new(&data), vlr).unwrap();
        let mut point = [0u8; 3];
        for &index in &[5usize, 0, 9, 4, 3] {
            decompressor.seek(index as u64).unwrap();
            decompressor.decompress_one(&mut point).unwrap();
            assert_eq!(&point, &points[index * 3..index * 3 + 3]);
        }
    }

    #[test]
    fn test_decompress_chunk() {
        let vlr = extra_bytes_vlr(4);
        let points: Vec<u8> = (0..3 * 10).map(|i| (i * 7) as u8).collect();
        let data = compressed(&vlr, &points);

        let mut decompressor = LasZipDecompressor::new(Cursor::new(&data), vlr).unwrap();
        let mut out = vec![0u8; 2 * 3];
        decompressor.decompress_chunk(2, &mut out).unwrap();
        assert_eq!(&out, &points[24..]);

        let mut out = vec![0u8; 4 * 3];
        decompressor.decompress_chunk(1, &mut out).unwrap();
        assert_eq!(&out, &points[12..24]);

        // continues with chunk 2
        let mut point = [0u8; 3];
        decompressor.decompress_one(&mut point).unwrap();
        assert_eq!(&point, &points[24..27]);

        match decompressor.decompress_chunk(3, &mut out) {
            Err(LasZipError::ChunkIndexOutOfBounds { index: 3, count: 3 }) => {}
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_chunk_size_disagreeing_with_table() {
        let mut schema = RecordSchema::new();
        schema.add_extra_bytes(3);
        let vlr = LazVlrBuilder::from_schema(&schema)
            .with_variable_chunk_size()
            .build();
        let points: Vec<u8> = (0..3 * 6).map(|i| (i * 13) as u8).collect();

        let mut compressor = LasZipCompressor::new(Cursor::new(vec![]), vlr.clone()).unwrap();
        compressor.compress_many(&points[..3]).unwrap();
        compressor.finish_current_chunk().unwrap();
        compressor.compress_many(&points[3..]).unwrap();
        compressor.done().unwrap();
        let table = compressor.chunk_table().clone();
        let mut data = compressor.into_inner().into_inner();

        // same point counts, byte counts swapped
        let mut swapped = ChunkTable::default();
        swapped.push(ChunkTableEntry {
            point_count: table[0].point_count,
            byte_count: table[1].byte_count,
        });
        swapped.push(ChunkTableEntry {
            point_count: table[1].point_count,
            byte_count: table[0].byte_count,
        });
        data.truncate(8 + table.total_byte_count() as usize);
        swapped.write_to(&mut data, &vlr).unwrap();

        let mut decompressor = LasZipDecompressor::new(Cursor::new(&data), vlr).unwrap();
        let mut out = vec![0u8; points.len()];
        match decompressor.decompress_many(&mut out) {
            Err(LasZipError::CorruptStream(_)) => {}
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_reading_past_the_last_fixed_size_chunk_fails() {
        let schema = RecordSchema::for_point_format(1, 0).unwrap();
        let vlr = LazVlrBuilder::from_schema(&schema).with_chunk_size(4).build();
        let rs = schema.total_size();
        let points: Vec<u8> = (0..rs * 10).map(|i| (i * 7919 % 251) as u8).collect();
        let data = compressed(&vlr, &points);

        let mut decompressor = LasZipDecompressor::new(Cursor::new(&data), vlr.clone()).unwrap();
        let mut out = vec![0u8; points.len()];
        decompressor.decompress_many(&mut out).unwrap();
        assert_eq!(out, points);
        let mut point = vec![0u8; rs];
        match decompressor.decompress_one(&mut point) {
            Err(LasZipError::CorruptStream(_)) => {}
            other => panic!("unexpected result {:?}", other),
        }

        let mut decompressor = LasZipDecompressor::new(Cursor::new(&data), vlr).unwrap();
        decompressor.seek(9).unwrap();
        decompressor.decompress_one(&mut point).unwrap();
        assert_eq!(&point[..], &points[9 * rs..]);
        match decompressor.seek(11) {
            Err(LasZipError::CorruptStream(_)) => {}
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_layered_chunks() {
        let schema = RecordSchema::for_point_format(7, 2).unwrap();
        let vlr = LazVlrBuilder::from_schema(&schema).with_chunk_size(5).build();
        let rs = schema.total_size();
        let points: Vec<u8> = (0..rs * 12).map(|i| (i * 13 % 241) as u8).collect();
        let data = compressed(&vlr, &points);

        let mut decompressor = LasZipDecompressor::new(Cursor::new(&data), vlr).unwrap();
        let mut out = vec![0u8; points.len()];
        decompressor.decompress_many(&mut out).unwrap();
        assert_eq!(out, points);

        let mut point = vec![0u8; rs];
        decompressor.seek(7).unwrap();
        decompressor.decompress_one(&mut point).unwrap();
        assert_eq!(&point[..], &points[7 * rs..8 * rs]);

        decompressor.seek(11).unwrap();
        decompressor.decompress_one(&mut point).unwrap();
        match decompressor.decompress_one(&mut point) {
            Err(LasZipError::CorruptStream(_)) => {}
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_layered_compressor_with_point_wise_items_is_rejected() {
        let vlr = extra_bytes_vlr(2);
        let mut record_data = vlr.data();
        record_data[0] = 3;
        let data = compressed(&vlr, &[0u8; 6]);
        match LasZipDecompressor::new_with_record_data(Cursor::new(&data), &record_data) {
            Err(LasZipError::UnsupportedCompressorType(_)) => {}
            Err(e) => panic!("unexpected error {}", e),
            Ok(_) => panic!("layered data was accepted"),
        }
    }
}
