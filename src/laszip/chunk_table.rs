//! Module with all the things related to LAZ chunk tables
use std::io::{Read, Seek, SeekFrom, Write};
use std::ops::Index;
use std::slice::SliceIndex;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::{debug, trace};

use crate::compressors::IntegerCompressorBuilder;
use crate::decoders::ArithmeticDecoder;
use crate::decompressors::IntegerDecompressorBuilder;
use crate::encoders::ArithmeticEncoder;
use crate::{LasZipError, LazVlr};

/// Size of the offset to the chunk table that precedes the first chunk
pub(crate) const OFFSET_SIZE: u64 = std::mem::size_of::<i64>() as u64;

/// Where the offset to the chunk table was found
#[derive(Copy, Clone, Debug)]
enum TableLocation {
    /// before the first chunk
    Header(u64),
    /// in the last 8 bytes of the data
    Trailer(u64),
}

impl TableLocation {
    fn position(self) -> u64 {
        match self {
            TableLocation::Header(position) | TableLocation::Trailer(position) => position,
        }
    }
}

/// An entry describe one chunk and contains 2 information:
///
/// - The number of points in the compressed chunk
/// - The number of bytes of the compressed chunk
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ChunkTableEntry {
    pub point_count: u64,
    pub byte_count: u64,
}

/// The ChunkTable contains chunk entries for a LAZ stream.
///
/// The ChunkTable has two ways of being stored
/// depending on if the chunks are fixed-size variable-sized
///
/// fixed-size chunks -> Only the number of bytes of the chunk is stored
/// variable-size chunks -> Both the number of points and the number of bytes are stored
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ChunkTable(Vec<ChunkTableEntry>);

impl ChunkTable {
    /// Reads the chunk table from the source
    ///
    /// The source position **must** be at the start of the point data, that is
    /// on the offset to the chunk table, and `stream_start_offset` is the absolute
    /// position of that offset (the one stored offsets are relative to).
    ///
    /// On success the source is positioned where the first chunk starts
    /// (that is, after the chunk table offset).
    ///
    /// # Important
    ///
    /// When the chunks are `fixed-size`, each entry will have the same number of points,
    /// the `chunk_size` registered in the `vlr`.
    /// This means that for the **last** chunk, the [ChunkTableEntry]'s `point_count`
    /// may be more than what it actually holds.
    pub fn read_from<R: Read + Seek>(
        mut src: R,
        vlr: &LazVlr,
        stream_start_offset: u64,
    ) -> crate::Result<Self> {
        let data_start = src.seek(SeekFrom::Current(0))?;
        let stream_end = src.seek(SeekFrom::End(0))?;
        src.seek(SeekFrom::Start(data_start))?;

        let location = Self::read_offset(&mut src, data_start, stream_end, stream_start_offset)?
            .ok_or(LasZipError::MissingChunkTable)?;
        match (Self::read_at(&mut src, vlr, data_start, location.position()), location) {
            (Err(e), TableLocation::Trailer(_)) => {
                debug!("no chunk table at the trailing offset: {}", e);
                Err(LasZipError::MissingChunkTable)
            }
            (result, _) => result,
        }
    }

    /// Reads the table that starts at `table_start`, then places the source
    /// where the first chunk starts.
    fn read_at<R: Read + Seek>(
        src: &mut R,
        vlr: &LazVlr,
        data_start: u64,
        table_start: u64,
    ) -> crate::Result<Self> {
        src.seek(SeekFrom::Start(table_start))?;

        let variable = vlr.uses_variably_sized_chunks();
        let data_len = table_start - data_start - OFFSET_SIZE;
        let mut chunk_table = Self::read(src, variable, vlr.items_size() as u64, data_len)?;
        if !variable {
            for entry in &mut chunk_table.0 {
                entry.point_count = u64::from(vlr.chunk_size());
            }
        }

        let byte_sum: u64 = chunk_table.0.iter().map(|e| e.byte_count).sum();
        if byte_sum != data_len {
            return Err(LasZipError::CorruptStream(
                "the chunk sizes do not add up to the chunk table offset",
            ));
        }
        debug!(
            "read chunk table of {} entries at offset {}",
            chunk_table.len(),
            table_start
        );
        src.seek(SeekFrom::Start(data_start + OFFSET_SIZE))?;
        Ok(chunk_table)
    }

    /// Same as [read_from](Self::read_from) on a buffer that starts with the
    /// offset to the chunk table.
    pub fn from_buffer(
        bytes: &[u8],
        vlr: &LazVlr,
        stream_start_offset: u64,
    ) -> crate::Result<Self> {
        Self::read_from(std::io::Cursor::new(bytes), vlr, stream_start_offset)
    }

    /// Reads the offset to the chunk table and returns the position
    /// of the table in the source.
    ///
    /// Writers that cannot seek back leave the offset unset and append it
    /// after the table, in that case the last 8 bytes are used.
    fn read_offset<R: Read + Seek>(
        src: &mut R,
        data_start: u64,
        stream_end: u64,
        stream_start_offset: u64,
    ) -> crate::Result<Option<TableLocation>> {
        let to_position = |offset: i64| -> Option<u64> {
            let relative = (offset as u64).checked_sub(stream_start_offset)?;
            let position = data_start.checked_add(relative)?;
            if offset < 0 || relative < OFFSET_SIZE || position > stream_end {
                None
            } else {
                Some(position)
            }
        };

        let offset_to_chunk_table = src.read_i64::<LittleEndian>()?;
        if let Some(position) = to_position(offset_to_chunk_table) {
            return Ok(Some(TableLocation::Header(position)));
        }

        trace!(
            "chunk table offset {} is invalid, looking at the end of the data",
            offset_to_chunk_table
        );
        if stream_end < data_start + 2 * OFFSET_SIZE {
            return Ok(None);
        }
        src.seek(SeekFrom::End(-(OFFSET_SIZE as i64)))?;
        let offset_to_chunk_table = src.read_i64::<LittleEndian>()?;
        Ok(to_position(offset_to_chunk_table).map(TableLocation::Trailer))
    }

    /// Actual implementation of the reading of the chunk table.
    fn read<R: Read>(
        mut src: &mut R,
        contains_point_count: bool,
        record_size: u64,
        data_len: u64,
    ) -> crate::Result<Self> {
        let _version = src.read_u32::<LittleEndian>()?;
        let number_of_chunks = u64::from(src.read_u32::<LittleEndian>()?);

        // the smallest chunk is a raw record followed by the 4 bytes of the encoder
        if number_of_chunks * (record_size + 4) > data_len {
            return Err(LasZipError::CorruptStream(
                "the chunk table declares more chunks than the data can hold",
            ));
        }

        let mut decompressor = IntegerDecompressorBuilder::new()
            .bits(32)
            .contexts(2)
            .build_initialized();
        let mut decoder = ArithmeticDecoder::new(&mut src);
        decoder.read_init_bytes()?;

        let mut chunk_table = ChunkTable::with_capacity(number_of_chunks as usize);
        let mut last_entry = ChunkTableEntry::default();
        for _ in 0..number_of_chunks {
            let mut current_entry = ChunkTableEntry::default();
            if contains_point_count {
                current_entry.point_count = u64::from(decompressor.decompress(
                    &mut decoder,
                    last_entry.point_count as i32,
                    0,
                )? as u32);
            }
            current_entry.byte_count = u64::from(decompressor.decompress(
                &mut decoder,
                last_entry.byte_count as i32,
                1,
            )? as u32);

            chunk_table.0.push(current_entry);
            last_entry = current_entry;
        }
        Ok(chunk_table)
    }

    /// Writes the chunk table
    ///
    /// The point count of the entries is only written for
    /// variable-size chunks.
    pub fn write_to<W: Write>(&self, mut dst: &mut W, vlr: &LazVlr) -> std::io::Result<()> {
        // Write header
        dst.write_u32::<LittleEndian>(0)?;
        dst.write_u32::<LittleEndian>(self.0.len() as u32)?;

        let mut encoder = ArithmeticEncoder::new(&mut dst);
        let mut compressor = IntegerCompressorBuilder::new()
            .bits(32)
            .contexts(2)
            .build_initialized();

        let variable = vlr.uses_variably_sized_chunks();
        let mut last_entry = ChunkTableEntry::default();
        for entry in &self.0 {
            if variable {
                compressor.compress(
                    &mut encoder,
                    last_entry.point_count as i32,
                    entry.point_count as i32,
                    0,
                )?;
            }
            compressor.compress(
                &mut encoder,
                last_entry.byte_count as i32,
                entry.byte_count as i32,
                1,
            )?;
            last_entry = *entry;
        }
        encoder.done()?;
        Ok(())
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    pub(crate) fn push(&mut self, entry: ChunkTableEntry) {
        self.0.push(entry);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Position of the chunk relative to the first chunk
    pub fn chunk_start(&self, index: usize) -> u64 {
        self.0[..index].iter().map(|e| e.byte_count).sum()
    }

    /// Sum of the byte count of all the chunks
    pub fn total_byte_count(&self) -> u64 {
        self.chunk_start(self.0.len())
    }

    /// Returns the entry, failing with `ChunkIndexOutOfBounds`
    pub fn entry(&self, index: usize) -> crate::Result<ChunkTableEntry> {
        self.0
            .get(index)
            .copied()
            .ok_or(LasZipError::ChunkIndexOutOfBounds {
                index,
                count: self.0.len(),
            })
    }
}

impl AsRef<[ChunkTableEntry]> for ChunkTable {
    fn as_ref(&self) -> &[ChunkTableEntry] {
        &self.0
    }
}

impl<'a> IntoIterator for &'a ChunkTable {
    type Item = <std::slice::Iter<'a, ChunkTableEntry> as Iterator>::Item;
    type IntoIter = std::slice::Iter<'a, ChunkTableEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<I> Index<I> for ChunkTable
where
    I: SliceIndex<[ChunkTableEntry]>,
{
    type Output = <I as SliceIndex<[ChunkTableEntry]>>::Output;

    fn index(&self, index: I) -> &Self::Output {
        &self.0[index]
    }
}

/// Updates the 'chunk table offset'
///
/// It is the first 8 byte (i64) of a Laszip compressed data
///
/// This function expects the position of the destination to be at the start of the chunk_table
/// (whether it is written or not).
///
/// This function also expects the i64 to have been already written/reserved
/// (even if its garbage bytes / 0s)
///
/// `stream_offset` is added to the position, to make the offset absolute.
///
/// The position of the destination is untouched
pub(crate) fn update_chunk_table_offset<W: Write + Seek>(
    dst: &mut W,
    offset_pos: SeekFrom,
    stream_offset: u64,
) -> std::io::Result<()> {
    let start_of_chunk_table_pos = dst.seek(SeekFrom::Current(0))?;
    dst.seek(offset_pos)?;
    dst.write_i64::<LittleEndian>((stream_offset + start_of_chunk_table_pos) as i64)?;
    dst.seek(SeekFrom::Start(start_of_chunk_table_pos))?;
    Ok(())
}
