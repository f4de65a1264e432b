//! Buffer oriented handles, meant to be wrapped by bindings.
//!
//! [`Compressor`] / [`Decompressor`] handle a single point-wise stream:
//! no chunks, no offset, no chunk table.
//!
//! [`VlrCompressor`] / [`VlrDecompressor`] handle the chunked LAZ point data
//! described by a laszip vlr.
//!
//! ```
//! use lazperf::{RecordSchema, VlrCompressor, VlrDecompressor};
//!
//! # fn main() -> lazperf::Result<()> {
//! let mut schema = RecordSchema::new();
//! schema.add_point().add_gps_time();
//! let points = vec![0u8; schema.total_size() * 10];
//!
//! let mut compressor = VlrCompressor::new(&schema, 0)?.with_chunk_size(4)?;
//! compressor.compress(&points)?;
//! let vlr_data = compressor.vlr().data();
//! let compressed = compressor.done()?;
//!
//! let mut decompressor = VlrDecompressor::new(&compressed, schema.total_size(), &vlr_data)?;
//! assert_eq!(decompressor.decompress(points.len())?, points);
//! # Ok(())
//! # }
//! ```

use std::io::Cursor;

use crate::laszip::chunk::check_buffer_len;
use crate::laszip::{ChunkTable, LasZipCompressor, LasZipDecompressor, LazVlr, LazVlrBuilder};
use crate::record::{PointRecordCompressor, PointRecordDecompressor};
use crate::RecordSchema;

/// Compresses points into a single stream
pub struct Compressor {
    record_compressor: PointRecordCompressor<Cursor<Vec<u8>>>,
}

impl Compressor {
    pub fn new(schema: &RecordSchema) -> crate::Result<Self> {
        Ok(Self {
            record_compressor: PointRecordCompressor::new(Cursor::new(Vec::new()), schema)?,
        })
    }

    pub fn record_size(&self) -> usize {
        self.record_compressor.record_size()
    }

    /// Compresses the points, can be called multiple times
    pub fn compress_many(&mut self, points: &[u8]) -> crate::Result<()> {
        check_buffer_len(points.len(), self.record_size())?;
        self.record_compressor.compress_many(points)?;
        Ok(())
    }

    /// Ends the stream and returns it
    pub fn done(mut self) -> crate::Result<Vec<u8>> {
        self.record_compressor.done()?;
        Ok(self.record_compressor.into_stream().into_inner())
    }

    /// Compresses all the points and returns the stream
    pub fn compress(mut self, points: &[u8]) -> crate::Result<Vec<u8>> {
        self.compress_many(points)?;
        self.done()
    }
}

/// Decompresses a stream produced by a [`Compressor`]
pub struct Decompressor<'a> {
    record_decompressor: PointRecordDecompressor<Cursor<&'a [u8]>>,
}

impl<'a> Decompressor<'a> {
    pub fn new(compressed: &'a [u8], schema: &RecordSchema) -> crate::Result<Self> {
        Ok(Self {
            record_decompressor: PointRecordDecompressor::new(Cursor::new(compressed), schema)?,
        })
    }

    pub fn record_size(&self) -> usize {
        self.record_decompressor.record_size()
    }

    /// Decompresses `output_byte_count` bytes of points,
    /// continuing where the previous call stopped.
    pub fn decompress(&mut self, output_byte_count: usize) -> crate::Result<Vec<u8>> {
        let mut out = vec![0u8; output_byte_count];
        self.decompress_into(&mut out)?;
        Ok(out)
    }

    /// Decompresses as many points as `out` can hold
    pub fn decompress_into(&mut self, out: &mut [u8]) -> crate::Result<()> {
        check_buffer_len(out.len(), self.record_size())?;
        self.record_decompressor.decompress_many(out)?;
        Ok(())
    }
}

/// Compresses points into chunked LAZ point data
pub struct VlrCompressor {
    schema: RecordSchema,
    point_data_start_offset: u64,
    compressor: LasZipCompressor<Cursor<Vec<u8>>>,
}

impl VlrCompressor {
    /// `point_data_start_offset` is the position where the compressed data will
    /// be written in the final file, the chunk table offset is made absolute with it.
    pub fn new(schema: &RecordSchema, point_data_start_offset: u64) -> crate::Result<Self> {
        let vlr = LazVlr::from_schema(schema);
        Self::with_vlr(schema.clone(), point_data_start_offset, vlr)
    }

    fn with_vlr(
        schema: RecordSchema,
        point_data_start_offset: u64,
        vlr: LazVlr,
    ) -> crate::Result<Self> {
        let compressor = LasZipCompressor::new(Cursor::new(Vec::new()), vlr)?
            .with_stream_offset(point_data_start_offset);
        Ok(Self {
            schema,
            point_data_start_offset,
            compressor,
        })
    }

    /// Sets the number of points per chunk, to be called before compressing.
    ///
    /// [`LazVlr::VARIABLE_CHUNK_SIZE`] makes chunks end on calls to
    /// [`finish_current_chunk`](Self::finish_current_chunk).
    pub fn with_chunk_size(self, chunk_size: u32) -> crate::Result<Self> {
        let vlr = LazVlrBuilder::from_schema(&self.schema)
            .with_chunk_size(chunk_size)
            .build();
        Self::with_vlr(self.schema, self.point_data_start_offset, vlr)
    }

    pub fn compress(&mut self, points: &[u8]) -> crate::Result<()> {
        self.compressor.compress_many(points)
    }

    pub fn finish_current_chunk(&mut self) -> crate::Result<()> {
        self.compressor.finish_current_chunk()
    }

    /// Writes the chunk table and returns the compressed data
    pub fn done(mut self) -> crate::Result<Vec<u8>> {
        self.compressor.done()?;
        Ok(self.compressor.into_inner().into_inner())
    }

    pub fn vlr(&self) -> &LazVlr {
        self.compressor.vlr()
    }
}

/// Decompresses chunked LAZ point data
///
/// The chunk table is read on the first call that needs it.
pub struct VlrDecompressor<'a> {
    compressed: &'a [u8],
    vlr: LazVlr,
    record_size: usize,
    point_data_start_offset: u64,
    decompressor: Option<LasZipDecompressor<Cursor<&'a [u8]>>>,
}

impl<'a> VlrDecompressor<'a> {
    /// Creates the decompressor for records of `record_size` bytes,
    /// using the record data of the laszip vlr.
    ///
    /// `compressed` must start with the 8 bytes of the offset to the chunk table,
    /// followed by the chunks, as produced by [`VlrCompressor::done`].
    ///
    /// Bytes of the records the vlr items do not describe are handled as extra bytes.
    pub fn new(compressed: &'a [u8], record_size: usize, vlr_data: &[u8]) -> crate::Result<Self> {
        let file_vlr = LazVlr::from_buffer(vlr_data)?;
        file_vlr.check_supported()?;
        let schema = file_vlr.schema_for_record_size(record_size)?;
        schema.validate()?;
        let vlr = LazVlrBuilder::from_schema(&schema)
            .with_chunk_size(file_vlr.chunk_size())
            .build();
        Ok(Self {
            compressed,
            vlr,
            record_size,
            point_data_start_offset: 0,
            decompressor: None,
        })
    }

    /// Sets the position at which the compressed data starts in the file,
    /// which the chunk table offset stored in the data is relative to.
    ///
    /// Decompression restarts from the first point.
    pub fn with_point_data_start_offset(mut self, offset: u64) -> Self {
        self.point_data_start_offset = offset;
        self.decompressor = None;
        self
    }

    fn decompressor(&mut self) -> crate::Result<&mut LasZipDecompressor<Cursor<&'a [u8]>>> {
        let decompressor = match self.decompressor.take() {
            Some(decompressor) => decompressor,
            None => LasZipDecompressor::new_with_stream_offset(
                Cursor::new(self.compressed),
                self.vlr.clone(),
                self.point_data_start_offset,
            )?,
        };
        Ok(self.decompressor.get_or_insert(decompressor))
    }

    pub fn record_size(&self) -> usize {
        self.record_size
    }

    pub fn vlr(&self) -> &LazVlr {
        &self.vlr
    }

    /// Returns the chunk table, `None` if the data has none
    pub fn chunk_table(&mut self) -> crate::Result<Option<&ChunkTable>> {
        Ok(self.decompressor()?.chunk_table())
    }

    /// Decompresses `output_byte_count` bytes of points,
    /// continuing where the previous call stopped.
    pub fn decompress(&mut self, output_byte_count: usize) -> crate::Result<Vec<u8>> {
        let mut out = vec![0u8; output_byte_count];
        self.decompress_into(&mut out)?;
        Ok(out)
    }

    pub fn decompress_into(&mut self, out: &mut [u8]) -> crate::Result<()> {
        self.decompressor()?.decompress_many(out)
    }

    /// Decompresses the `point_count` points of the chunk at `index`
    pub fn decompress_chunk(&mut self, index: usize, point_count: usize) -> crate::Result<Vec<u8>> {
        let mut out = vec![0u8; point_count * self.record_size];
        self.decompressor()?.decompress_chunk(index, &mut out)?;
        Ok(out)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{DimensionKind, LasZipError};

    fn schema() -> RecordSchema {
        let mut schema = RecordSchema::new();
        schema.add_point().add_rgb();
        schema
            .add_dimension("Temperature", DimensionKind::Floating, 8)
            .unwrap();
        schema
    }

    fn points(schema: &RecordSchema, count: usize) -> Vec<u8> {
        (0..count * schema.total_size())
            .map(|i| ((i / 3) % 256) as u8)
            .collect()
    }

    #[test]
    fn test_point_wise_round_trip() {
        let schema = schema();
        let points = points(&schema, 30);
        let compressed = Compressor::new(&schema).unwrap().compress(&points).unwrap();

        let mut decompressor = Decompressor::new(&compressed, &schema).unwrap();
        let half = 15 * schema.total_size();
        let mut out = decompressor.decompress(half).unwrap();
        out.extend(decompressor.decompress(half).unwrap());
        assert_eq!(out, points);
    }

    #[test]
    fn test_point_wise_has_no_offset() {
        let schema = schema();
        let points = points(&schema, 1);
        let compressed = Compressor::new(&schema).unwrap().compress(&points).unwrap();
        assert_eq!(&compressed[..points.len()], &points[..]);
    }

    #[test]
    fn test_vlr_round_trip() {
        let schema = schema();
        let points = points(&schema, 25);

        let mut compressor = VlrCompressor::new(&schema, 1_000)
            .unwrap()
            .with_chunk_size(10)
            .unwrap();
        compressor.compress(&points).unwrap();
        let vlr_data = compressor.vlr().data();
        let compressed = compressor.done().unwrap();

        let mut decompressor = VlrDecompressor::new(&compressed, schema.total_size(), &vlr_data)
            .unwrap()
            .with_point_data_start_offset(1_000);
        assert_eq!(
            decompressor.chunk_table().unwrap().map(ChunkTable::len),
            Some(3)
        );
        assert_eq!(decompressor.decompress(points.len()).unwrap(), points);

        let rs = schema.total_size();
        let chunk = decompressor.decompress_chunk(1, 10).unwrap();
        assert_eq!(&chunk[..], &points[10 * rs..20 * rs]);
    }

    #[test]
    fn test_insufficient_input() {
        let schema = schema();
        let mut compressor = Compressor::new(&schema).unwrap();
        match compressor.compress_many(&[0u8; 5]) {
            Err(LasZipError::InsufficientInput { buffer_len: 5, .. }) => {}
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_decompress_into_checks_the_buffer_len() {
        let schema = schema();
        let points = points(&schema, 4);
        let compressed = Compressor::new(&schema).unwrap().compress(&points).unwrap();
        let mut decompressor = Decompressor::new(&compressed, &schema).unwrap();
        let mut out = vec![0u8; schema.total_size() + 1];
        match decompressor.decompress_into(&mut out) {
            Err(LasZipError::InsufficientInput { record_size, .. }) => {
                assert_eq!(record_size, schema.total_size())
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_vlr_data_starts_with_the_chunk_table_offset() {
        let schema = schema();
        let points = points(&schema, 7);
        let mut compressor = VlrCompressor::new(&schema, 500).unwrap();
        compressor.compress(&points).unwrap();
        let vlr_data = compressor.vlr().data();
        let compressed = compressor.done().unwrap();

        let mut decompressor =
            VlrDecompressor::new(&compressed, schema.total_size(), &vlr_data)
                .unwrap()
                .with_point_data_start_offset(500);
        let chunk_bytes = decompressor
            .chunk_table()
            .unwrap()
            .map(ChunkTable::total_byte_count)
            .unwrap();
        let mut offset = [0u8; 8];
        offset.copy_from_slice(&compressed[..8]);
        assert_eq!(i64::from_le_bytes(offset), 500 + 8 + chunk_bytes as i64);
        assert_eq!(decompressor.decompress(points.len()).unwrap(), points);
    }
}

