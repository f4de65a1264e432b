use std::io::{Seek, SeekFrom, Write};

use byteorder::{LittleEndian, WriteBytesExt};
use log::debug;

use super::chunk::check_buffer_len;
use super::chunk_table::{update_chunk_table_offset, ChunkTable, ChunkTableEntry, OFFSET_SIZE};
use super::LazVlr;
use crate::record::PointRecordCompressor;
use crate::RecordSchema;

/// Struct that handles the compression of the points into the given destination
///
/// The data written is organized like this:
///  1) offset to the chunk_table (i64)
///  2) the compressed chunks
///  3) the chunk table
pub struct LasZipCompressor<W: Write + Seek> {
    vlr: LazVlr,
    /// compressor used for the current chunk
    record_compressor: PointRecordCompressor<W>,
    /// How many points in the current chunk
    chunk_point_written: u64,
    /// Entries of the chunks written so far
    chunk_table: ChunkTable,
    /// Position (offset from beginning)
    /// where the current chunk started
    chunk_start_pos: u64,
    /// Position where LasZipCompressor started
    start_pos: u64,
    /// Absolute position of the start of the destination
    stream_offset: u64,
    offset_reserved: bool,
}

impl<W: Write + Seek> LasZipCompressor<W> {
    /// Creates a compressor using the provided vlr.
    pub fn new(output: W, vlr: LazVlr) -> crate::Result<Self> {
        vlr.check_supported()?;
        let schema = vlr.schema()?;
        let record_compressor = PointRecordCompressor::new(output, &schema)?;
        Ok(Self {
            vlr,
            record_compressor,
            chunk_point_written: 0,
            chunk_table: ChunkTable::default(),
            chunk_start_pos: 0,
            start_pos: 0,
            stream_offset: 0,
            offset_reserved: false,
        })
    }

    /// Creates a new LasZipCompressor for records of the given schema,
    /// using the default chunk size.
    pub fn from_schema(output: W, schema: &RecordSchema) -> crate::Result<Self> {
        Self::new(output, LazVlr::from_schema(schema))
    }

    /// Sets the absolute position at which the destination starts,
    /// so that the chunk table offset written is absolute (e.g. from the start of a LAS file).
    pub fn with_stream_offset(mut self, offset: u64) -> Self {
        self.stream_offset = offset;
        self
    }

    /// Reserves and prepares the offset to chunk table that will be
    /// updated when [done] is called.
    ///
    /// This method will automatically be called on the first point being compressed,
    /// but for some scenarios, manually calling this might be useful.
    ///
    /// [done]: Self::done
    pub fn reserve_offset_to_chunk_table(&mut self) -> std::io::Result<()> {
        let stream = self.record_compressor.get_mut();
        self.start_pos = stream.seek(SeekFrom::Current(0))?;
        stream.write_i64::<LittleEndian>(-1)?;
        self.chunk_start_pos = self.start_pos + OFFSET_SIZE;
        self.offset_reserved = true;
        Ok(())
    }

    /// Compress the point and write the compressed data to the destination given when
    /// the compressor was constructed
    ///
    /// The data is expected to be laid out as the schema of the vlr says,
    /// in Little Endian order.
    pub fn compress_one(&mut self, input: &[u8]) -> crate::Result<()> {
        if !self.offset_reserved {
            self.reserve_offset_to_chunk_table()?;
        }

        if !self.vlr.uses_variably_sized_chunks()
            && self.chunk_point_written == u64::from(self.vlr.chunk_size())
        {
            self.finish_current_chunk()?;
        }

        self.record_compressor.compress_next(input)?;
        self.chunk_point_written += 1;
        Ok(())
    }

    /// Compress all the points contained in the `input` slice
    pub fn compress_many(&mut self, input: &[u8]) -> crate::Result<()> {
        let record_size = self.record_compressor.record_size();
        check_buffer_len(input.len(), record_size)?;
        for point in input.chunks_exact(record_size) {
            self.compress_one(point)?;
        }
        Ok(())
    }

    /// Closes the current chunk, the next point will start a new one.
    ///
    /// This is how chunks are delimited when the vlr uses variable-size chunks.
    /// With fixed-size chunks, every chunk except the last must hold exactly
    /// `chunk_size` points for the data to be readable.
    ///
    /// Does nothing if no point was compressed since the last chunk was closed.
    pub fn finish_current_chunk(&mut self) -> crate::Result<()> {
        if self.chunk_point_written == 0 {
            return Ok(());
        }
        self.record_compressor.done()?;
        let current_pos = self
            .record_compressor
            .get_mut()
            .seek(SeekFrom::Current(0))?;
        let entry = ChunkTableEntry {
            point_count: self.chunk_point_written,
            byte_count: current_pos - self.chunk_start_pos,
        };
        debug!(
            "closed chunk {} ({} points, {} bytes)",
            self.chunk_table.len(),
            entry.point_count,
            entry.byte_count
        );
        self.chunk_table.push(entry);
        self.record_compressor.reset();
        self.chunk_start_pos = current_pos;
        self.chunk_point_written = 0;
        Ok(())
    }

    /// Must be called when you have compressed all your points
    /// using the [`compress_one`] method
    ///
    /// [`compress_one`]: #method.compress_one
    pub fn done(&mut self) -> crate::Result<()> {
        if !self.offset_reserved {
            self.reserve_offset_to_chunk_table()?;
        }
        self.finish_current_chunk()?;
        let stream = self.record_compressor.get_mut();
        update_chunk_table_offset(stream, SeekFrom::Start(self.start_pos), self.stream_offset)?;
        self.chunk_table.write_to(stream, &self.vlr)?;
        debug!(
            "wrote chunk table of {} entries at offset {}",
            self.chunk_table.len(),
            self.stream_offset + self.chunk_start_pos
        );
        Ok(())
    }

    /// Returns the vlr used by this compressor
    pub fn vlr(&self) -> &LazVlr {
        &self.vlr
    }

    /// Returns the entries of the chunks closed so far
    pub fn chunk_table(&self) -> &ChunkTable {
        &self.chunk_table
    }

    pub fn into_inner(self) -> W {
        self.record_compressor.into_stream()
    }

    pub fn get_mut(&mut self) -> &mut W {
        self.record_compressor.get_mut()
    }

    pub fn get(&self) -> &W {
        self.record_compressor.get_ref()
    }
}

/// Compresses all points
///
/// The data written will be a standard LAZ file data
/// that means its organized like this:
///  1) offset to the chunk_table (i64)
///  2) the points data compressed
///  3) the chunk table
///
/// `dst`: Where the compressed data will be written
///
/// `uncompressed_points`: byte slice of the uncompressed points to be compressed
pub fn compress_buffer<W: Write + Seek>(
    dst: &mut W,
    uncompressed_points: &[u8],
    laz_vlr: LazVlr,
) -> crate::Result<()> {
    let mut compressor = LasZipCompressor::new(dst, laz_vlr)?;
    compressor.compress_many(uncompressed_points)?;
    compressor.done()?;
    Ok(())
}
