use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::schema::{Dimension, DimensionKind, RecordItem, RecordSchema};
use crate::LasZipError;

/// Version of the point-wise item codecs this crate reads and writes
const POINT_WISE_VERSION: u16 = 2;
/// The wave packet of the point formats 4 and 5 has a single codec version
const WAVE_PACKET_13_VERSION: u16 = 1;
/// Version of the layered item codecs
const LAYERED_VERSION: u16 = 3;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
struct Version {
    major: u8,
    minor: u8,
    revision: u16,
}

impl Version {
    fn read_from<R: Read>(src: &mut R) -> std::io::Result<Self> {
        Ok(Self {
            major: src.read_u8()?,
            minor: src.read_u8()?,
            revision: src.read_u16::<LittleEndian>()?,
        })
    }

    fn write_to<W: Write>(&self, dst: &mut W) -> std::io::Result<()> {
        dst.write_u8(self.major)?;
        dst.write_u8(self.minor)?;
        dst.write_u16::<LittleEndian>(self.revision)?;
        Ok(())
    }
}

impl Default for Version {
    fn default() -> Self {
        Self {
            major: 3,
            minor: 4,
            revision: 3,
        }
    }
}

/// The different type of data / fields found in the laszip vlr
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LazItemType {
    /// ExtraBytes for LAS versions <= 1.3 & point format <= 5
    Byte(u16),
    /// Point10 is the Point format id 0 of LAS for versions <= 1.3 & point format <= 5
    Point10,
    /// GpsTime for LAS versions <= 1.3 & point format <= 5
    GpsTime,
    /// RGB for LAS versions <= 1.3 & point format <= 5
    RGB12,
    /// Wave packet for LAS versions <= 1.3 & point format <= 5
    WavePacket13,
    /// Point14 is the Point format id 6 of LAS for versions >= 1.4 & point format >= 6
    Point14,
    /// RGB for LAS versions >= 1.4
    RGB14,
    /// RGB + Nir for LAS versions >= 1.4
    RGBNIR14,
    /// Wave packet for LAS versions >= 1.4
    WavePacket14,
    /// ExtraBytes for LAS versions >= 1.4
    Byte14(u16),
    /// A single user dimension
    Dimension(DimensionKind, u8),
}

impl LazItemType {
    fn size(&self) -> u16 {
        match self {
            LazItemType::Byte(size) | LazItemType::Byte14(size) => *size,
            LazItemType::Point10 => RecordItem::POINT10_SIZE as u16,
            LazItemType::GpsTime => RecordItem::GPS_TIME_SIZE as u16,
            LazItemType::RGB12 | LazItemType::RGB14 => RecordItem::RGB12_SIZE as u16,
            LazItemType::WavePacket13 | LazItemType::WavePacket14 => {
                RecordItem::WAVE_PACKET_SIZE as u16
            }
            LazItemType::Point14 => RecordItem::POINT14_SIZE as u16,
            LazItemType::RGBNIR14 => RecordItem::RGBNIR14_SIZE as u16,
            LazItemType::Dimension(_, size) => u16::from(*size),
        }
    }

    /// The codec version written for the item
    fn version(&self) -> u16 {
        match self {
            LazItemType::WavePacket13 => WAVE_PACKET_13_VERSION,
            LazItemType::Point14
            | LazItemType::RGB14
            | LazItemType::RGBNIR14
            | LazItemType::WavePacket14
            | LazItemType::Byte14(_) => LAYERED_VERSION,
            _ => POINT_WISE_VERSION,
        }
    }

    fn supports_version(&self, version: u16) -> bool {
        match self {
            LazItemType::WavePacket13 => version == 1 || version == 2,
            _ => version == self.version(),
        }
    }
}

impl From<LazItemType> for u16 {
    fn from(t: LazItemType) -> Self {
        match t {
            LazItemType::Byte(_) => 0,
            LazItemType::Point10 => 6,
            LazItemType::GpsTime => 7,
            LazItemType::RGB12 => 8,
            LazItemType::WavePacket13 => 9,
            LazItemType::Point14 => 10,
            LazItemType::RGB14 => 11,
            LazItemType::RGBNIR14 => 12,
            LazItemType::WavePacket14 => 13,
            LazItemType::Byte14(_) => 14,
            LazItemType::Dimension(kind, size) => kind.type_code() | u16::from(size),
        }
    }
}

impl From<&RecordItem> for LazItemType {
    fn from(item: &RecordItem) -> Self {
        match item {
            RecordItem::Point10 => LazItemType::Point10,
            RecordItem::GpsTime => LazItemType::GpsTime,
            RecordItem::Rgb12 => LazItemType::RGB12,
            RecordItem::WavePacket13 => LazItemType::WavePacket13,
            RecordItem::ExtraBytes(count) => LazItemType::Byte(*count),
            RecordItem::Point14 => LazItemType::Point14,
            RecordItem::Rgb14 => LazItemType::RGB14,
            RecordItem::RgbNir14 => LazItemType::RGBNIR14,
            RecordItem::WavePacket14 => LazItemType::WavePacket14,
            RecordItem::Byte14(count) => LazItemType::Byte14(*count),
            RecordItem::Dimension(dimension) => {
                LazItemType::Dimension(dimension.kind(), dimension.size())
            }
        }
    }
}

/// Struct stored as part of the laszip's vlr record_data
///
/// This gives information about the dimension compressed
/// and the version used for the compression.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct LazItem {
    // coded on a u16
    pub(crate) item_type: LazItemType,
    pub(crate) size: u16,
    pub(crate) version: u16,
}

impl LazItem {
    /// Creates the item with the codec version this crate writes for its type
    pub fn from_type(item_type: LazItemType) -> Self {
        Self::new(item_type, item_type.version())
    }

    pub fn new(item_type: LazItemType, version: u16) -> Self {
        let size = item_type.size();
        Self {
            item_type,
            size,
            version,
        }
    }

    pub fn item_type(&self) -> LazItemType {
        self.item_type
    }

    pub fn size(&self) -> u16 {
        self.size
    }

    pub fn version(&self) -> u16 {
        self.version
    }

    fn read_from<R: Read>(src: &mut R) -> crate::Result<Self> {
        let code = src.read_u16::<LittleEndian>()?;
        let size = src.read_u16::<LittleEndian>()?;
        let item_type = match code {
            0 => LazItemType::Byte(size),
            6 => LazItemType::Point10,
            7 => LazItemType::GpsTime,
            8 => LazItemType::RGB12,
            9 => LazItemType::WavePacket13,
            10 => LazItemType::Point14,
            11 => LazItemType::RGB14,
            12 => LazItemType::RGBNIR14,
            13 => LazItemType::WavePacket14,
            14 => LazItemType::Byte14(size),
            _ => match DimensionKind::from_type_code(code) {
                Some(kind) if code & 0xFF == size => {
                    Dimension::new("", kind, size as u8)
                        .map_err(|_| LasZipError::UnknownLazItem(code))?;
                    LazItemType::Dimension(kind, size as u8)
                }
                Some(_) => {
                    return Err(LasZipError::FormatMismatch {
                        expected: usize::from(code & 0xFF),
                        actual: usize::from(size),
                    })
                }
                None => return Err(LasZipError::UnknownLazItem(code)),
            },
        };
        Ok(Self {
            item_type,
            size,
            version: src.read_u16::<LittleEndian>()?,
        })
    }

    fn write_to<W: Write>(&self, dst: &mut W) -> std::io::Result<()> {
        dst.write_u16::<LittleEndian>(self.item_type.into())?;
        dst.write_u16::<LittleEndian>(self.size)?;
        dst.write_u16::<LittleEndian>(self.version)?;
        Ok(())
    }

    /// Returns the schema item this laz item describes.
    ///
    /// `index` is used to name user dimensions, their names are not stored.
    fn to_record_item(&self, index: usize) -> crate::Result<RecordItem> {
        if !self.item_type.supports_version(self.version) {
            return Err(LasZipError::UnsupportedLazItemVersion(
                self.item_type,
                self.version,
            ));
        }
        if self.size != self.item_type.size() {
            return Err(LasZipError::FormatMismatch {
                expected: usize::from(self.item_type.size()),
                actual: usize::from(self.size),
            });
        }
        match self.item_type {
            LazItemType::Byte(count) => Ok(RecordItem::ExtraBytes(count)),
            LazItemType::Point10 => Ok(RecordItem::Point10),
            LazItemType::GpsTime => Ok(RecordItem::GpsTime),
            LazItemType::RGB12 => Ok(RecordItem::Rgb12),
            LazItemType::WavePacket13 => Ok(RecordItem::WavePacket13),
            LazItemType::Point14 => Ok(RecordItem::Point14),
            LazItemType::RGB14 => Ok(RecordItem::Rgb14),
            LazItemType::RGBNIR14 => Ok(RecordItem::RgbNir14),
            LazItemType::WavePacket14 => Ok(RecordItem::WavePacket14),
            LazItemType::Byte14(count) => Ok(RecordItem::Byte14(count)),
            LazItemType::Dimension(kind, size) => Ok(RecordItem::Dimension(Dimension::new(
                format!("Dimension{}", index),
                kind,
                size,
            )?)),
        }
    }
}

fn read_laz_items_from<R: Read>(mut src: &mut R) -> crate::Result<Vec<LazItem>> {
    let num_items = src.read_u16::<LittleEndian>()?;
    let mut items = Vec::<LazItem>::with_capacity(num_items as usize);
    for _ in 0..num_items {
        items.push(LazItem::read_from(&mut src)?)
    }
    Ok(items)
}

fn write_laz_items_to<W: Write>(laz_items: &[LazItem], mut dst: &mut W) -> std::io::Result<()> {
    dst.write_u16::<LittleEndian>(laz_items.len() as u16)?;
    for item in laz_items {
        item.write_to(&mut dst)?;
    }
    Ok(())
}

/// The possibilities for how the compressed data is organized.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CompressorType {
    None = 0,
    /// No chunks, or rather only 1 chunk with all the points
    PointWise = 1,
    /// Compress points into chunks with chunk_size points in each chunks
    PointWiseChunked = 2,
    /// Compress points into chunk, but also separate the different point dimension / fields
    /// into layers. This CompressorType is only use for point 6,7,8,9,10
    LayeredChunked = 3,
}

impl CompressorType {
    fn from_u16(t: u16) -> Option<Self> {
        match t {
            0 => Some(CompressorType::None),
            1 => Some(CompressorType::PointWise),
            2 => Some(CompressorType::PointWiseChunked),
            3 => Some(CompressorType::LayeredChunked),
            _ => None,
        }
    }
}

impl Default for CompressorType {
    fn default() -> Self {
        CompressorType::PointWiseChunked
    }
}

/// The data stored in the record_data of the Laszip Vlr
///
/// This vlr contains information needed to compress or decompress
/// LAZ data. Such as the points per chunk, the fields & version
/// of the compression/decompression algorithm.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct LazVlr {
    // coded on u16
    compressor: CompressorType,
    // 0 means ArithmeticCoder, its the only choice
    coder: u16,

    version: Version,
    options: u32,
    /// Number of points per chunk
    chunk_size: u32,

    // -1 if unused
    number_of_special_evlrs: i64,
    // -1 if unused
    offset_to_special_evlrs: i64,

    items: Vec<LazItem>,
}

impl LazVlr {
    /// The user id of the LasZip VLR header.
    pub const USER_ID: &'static str = "laszip encoded";
    /// The record id of the LasZip VLR header.
    pub const RECORD_ID: u16 = 22204;
    /// The description of the LasZip VLR header.
    pub const DESCRIPTION: &'static str = "http://laszip.org";
    /// Sentinel value to indicate that chunks have a variable size.
    pub const VARIABLE_CHUNK_SIZE: u32 = u32::MAX;
    pub const DEFAULT_CHUNK_SIZE: u32 = 50_000;

    /// Size of the record data without the items
    const FIXED_SIZE: usize = 34;
    const ITEM_SIZE: usize = 6;

    /// Creates the vlr describing the compression of records having the given schema
    ///
    /// Schemas starting with a `Point14` are compressed in layers.
    pub fn from_schema(schema: &RecordSchema) -> Self {
        let items = schema
            .items()
            .iter()
            .map(|item| LazItem::from_type(LazItemType::from(item)))
            .collect();
        let compressor = if schema.is_layered() {
            CompressorType::LayeredChunked
        } else {
            CompressorType::PointWiseChunked
        };
        Self {
            compressor,
            items,
            ..Default::default()
        }
    }

    /// Tries to read the Vlr information from the record_data buffer
    ///
    /// The buffer must be exactly the record data, that is 34 bytes
    /// and 6 bytes for each item.
    pub fn from_buffer(record_data: &[u8]) -> crate::Result<Self> {
        if record_data.len() < Self::FIXED_SIZE {
            return Err(LasZipError::FormatMismatch {
                expected: Self::FIXED_SIZE,
                actual: record_data.len(),
            });
        }
        let num_items = u16::from_le_bytes([
            record_data[Self::FIXED_SIZE - 2],
            record_data[Self::FIXED_SIZE - 1],
        ]);
        let expected = Self::FIXED_SIZE + Self::ITEM_SIZE * usize::from(num_items);
        if record_data.len() != expected {
            return Err(LasZipError::FormatMismatch {
                expected,
                actual: record_data.len(),
            });
        }
        let mut cursor = std::io::Cursor::new(record_data);
        Self::read_from(&mut cursor)
    }

    /// Tries to read the Vlr information from the record_data source
    pub fn read_from<R: Read>(mut src: &mut R) -> crate::Result<Self> {
        let compressor_type = src.read_u16::<LittleEndian>()?;
        let compressor = match CompressorType::from_u16(compressor_type) {
            Some(c) => c,
            None => return Err(LasZipError::UnknownCompressorType(compressor_type)),
        };

        Ok(Self {
            compressor,
            coder: src.read_u16::<LittleEndian>()?,
            version: Version::read_from(&mut src)?,
            options: src.read_u32::<LittleEndian>()?,
            chunk_size: src.read_u32::<LittleEndian>()?,
            number_of_special_evlrs: src.read_i64::<LittleEndian>()?,
            offset_to_special_evlrs: src.read_i64::<LittleEndian>()?,
            items: read_laz_items_from(&mut src)?,
        })
    }

    /// Writes the Vlr to the source, this only write the 'record_data' the
    /// header should be written before-hand
    pub fn write_to<W: Write>(&self, mut dst: &mut W) -> std::io::Result<()> {
        dst.write_u16::<LittleEndian>(self.compressor as u16)?;
        dst.write_u16::<LittleEndian>(self.coder)?;
        self.version.write_to(&mut dst)?;
        dst.write_u32::<LittleEndian>(self.options)?;
        dst.write_u32::<LittleEndian>(self.chunk_size)?;
        dst.write_i64::<LittleEndian>(self.number_of_special_evlrs)?;
        dst.write_i64::<LittleEndian>(self.offset_to_special_evlrs)?;
        write_laz_items_to(&self.items, &mut dst)?;
        Ok(())
    }

    /// Returns the record data of the vlr
    pub fn data(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(self.data_size());
        // writing to a Vec cannot fail
        let _ = self.write_to(&mut data);
        data
    }

    /// Size in bytes of the record data
    pub fn data_size(&self) -> usize {
        Self::FIXED_SIZE + Self::ITEM_SIZE * self.items.len()
    }

    pub fn uses_variably_sized_chunks(&self) -> bool {
        self.chunk_size == Self::VARIABLE_CHUNK_SIZE
    }

    /// Returns the chunk size, that is, the number of points
    /// in each chunk.
    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    pub fn compressor(&self) -> CompressorType {
        self.compressor
    }

    /// Returns the items compressed by this VLR
    pub fn items(&self) -> &[LazItem] {
        &self.items
    }

    /// Returns the sum of the size of the laz_items, which should correspond to the
    /// expected size of points (uncompressed).
    pub fn items_size(&self) -> usize {
        self.items.iter().map(|item| usize::from(item.size)).sum()
    }

    /// Returns the schema of the records described by the items
    pub fn schema(&self) -> crate::Result<RecordSchema> {
        let mut schema = RecordSchema::new();
        for (index, item) in self.items.iter().enumerate() {
            schema.push_item(item.to_record_item(index)?);
        }
        Ok(schema)
    }

    /// Returns the schema for records of `record_size` bytes.
    ///
    /// Bytes the items do not describe are handled as extra bytes,
    /// a record smaller than the items is an error.
    pub fn schema_for_record_size(&self, record_size: usize) -> crate::Result<RecordSchema> {
        let mut schema = self.schema()?;
        let items_size = schema.total_size();
        if record_size < items_size {
            return Err(LasZipError::FormatMismatch {
                expected: items_size,
                actual: record_size,
            });
        }
        let mut missing = record_size - items_size;
        while missing > 0 {
            let count = missing.min(usize::from(u16::max_value()));
            if schema.is_layered() {
                schema.add_byte14(count as u16);
            } else {
                schema.add_extra_bytes(count as u16);
            }
            missing -= count;
        }
        Ok(schema)
    }

    /// Checks that the compressed data this vlr describes can be handled
    ///
    /// Layered items go with the layered compressor, the others with the point-wise one.
    pub(crate) fn check_supported(&self) -> crate::Result<()> {
        let expected = if self.schema()?.is_layered() {
            CompressorType::LayeredChunked
        } else {
            CompressorType::PointWiseChunked
        };
        if self.compressor != expected {
            return Err(LasZipError::UnsupportedCompressorType(self.compressor));
        }
        if self.chunk_size == 0 {
            return Err(LasZipError::InvalidChunkSize(self.chunk_size));
        }
        Ok(())
    }

    /// returns how many bytes a decompressed chunk contains
    #[cfg(feature = "parallel")]
    pub(crate) fn num_bytes_in_decompressed_chunk(&self) -> u64 {
        u64::from(self.chunk_size) * self.items_size() as u64
    }
}

impl Default for LazVlr {
    fn default() -> Self {
        Self {
            compressor: Default::default(),
            coder: 0,
            version: Default::default(),
            options: 0,
            chunk_size: Self::DEFAULT_CHUNK_SIZE,
            number_of_special_evlrs: -1,
            offset_to_special_evlrs: -1,
            items: vec![],
        }
    }
}

/// Builder struct to personalize the LazVlr
#[derive(Debug, Default)]
pub struct LazVlrBuilder {
    laz_vlr: LazVlr,
}

impl LazVlrBuilder {
    pub fn new() -> Self {
        Self {
            laz_vlr: Default::default(),
        }
    }

    pub fn from_schema(schema: &RecordSchema) -> Self {
        Self {
            laz_vlr: LazVlr::from_schema(schema),
        }
    }

    /// Replaces the items with the ones of the schema
    pub fn with_schema(mut self, schema: &RecordSchema) -> Self {
        self.laz_vlr.items = LazVlr::from_schema(schema).items;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: u32) -> Self {
        self.laz_vlr.chunk_size = chunk_size;
        self
    }

    /// Chunks will be closed by the caller, each one having its own number of points
    pub fn with_variable_chunk_size(self) -> Self {
        self.with_chunk_size(LazVlr::VARIABLE_CHUNK_SIZE)
    }

    pub fn build(self) -> LazVlr {
        self.laz_vlr
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn point3_schema() -> RecordSchema {
        let mut schema = RecordSchema::new();
        schema.add_point().add_gps_time().add_rgb();
        schema
    }

    #[test]
    fn test_data_size() {
        let mut schema = point3_schema();
        assert_eq!(LazVlr::from_schema(&schema).data().len(), 52);
        assert_eq!(LazVlr::from_schema(&schema).data_size(), 52);

        schema.add_extra_bytes(27);
        let vlr = LazVlr::from_schema(&schema);
        assert_eq!(vlr.data().len(), 58);
        assert_eq!(vlr.items_size(), 20 + 8 + 6 + 27);
    }

    #[test]
    fn test_layout() {
        let vlr = LazVlrBuilder::from_schema(&point3_schema())
            .with_chunk_size(1234)
            .build();
        let data = vlr.data();
        assert_eq!(&data[0..2], &2u16.to_le_bytes());
        assert_eq!(&data[2..4], &0u16.to_le_bytes());
        assert_eq!(&data[4..8], &[3, 4, 3, 0]);
        assert_eq!(&data[12..16], &1234u32.to_le_bytes());
        assert_eq!(&data[16..24], &(-1i64).to_le_bytes());
        assert_eq!(&data[32..34], &3u16.to_le_bytes());
        // Point10 item
        assert_eq!(&data[34..40], &[6, 0, 20, 0, 2, 0]);
    }

    #[test]
    fn test_round_trip_with_user_dimensions() {
        let mut schema = point3_schema();
        schema
            .add_dimension("Amplitude", DimensionKind::Floating, 4)
            .unwrap()
            .add_dimension("Id", DimensionKind::Unsigned, 8)
            .unwrap()
            .add_dimension("Offset", DimensionKind::Signed, 2)
            .unwrap();
        let vlr = LazVlrBuilder::new()
            .with_schema(&schema)
            .with_variable_chunk_size()
            .build();

        let parsed = LazVlr::from_buffer(&vlr.data()).unwrap();
        assert_eq!(parsed, vlr);
        assert!(parsed.uses_variably_sized_chunks());

        let parsed_schema = parsed.schema().unwrap();
        assert!(parsed_schema.has_same_layout(&schema));
        assert_eq!(parsed_schema.items()[..3], schema.items()[..3]);
    }

    #[test]
    fn test_format_mismatch() {
        let data = LazVlr::from_schema(&point3_schema()).data();
        match LazVlr::from_buffer(&data[..data.len() - 1]) {
            Err(LasZipError::FormatMismatch { expected, actual }) => {
                assert_eq!(expected, 52);
                assert_eq!(actual, 51);
            }
            other => panic!("unexpected result {:?}", other),
        }
        assert!(LazVlr::from_buffer(&data[..10]).is_err());
    }

    #[test]
    fn test_unknown_codes() {
        let mut data = LazVlr::from_schema(&point3_schema()).data();
        data[34] = 99;
        match LazVlr::from_buffer(&data) {
            Err(LasZipError::UnknownLazItem(99)) => {}
            other => panic!("unexpected result {:?}", other),
        }

        let mut data = LazVlr::from_schema(&point3_schema()).data();
        data[0] = 7;
        match LazVlr::from_buffer(&data) {
            Err(LasZipError::UnknownCompressorType(7)) => {}
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_compressor_must_match_the_items() {
        let mut data = LazVlr::from_schema(&point3_schema()).data();
        data[0] = 3;
        let vlr = LazVlr::from_buffer(&data).unwrap();
        match vlr.check_supported() {
            Err(LasZipError::UnsupportedCompressorType(CompressorType::LayeredChunked)) => {}
            other => panic!("unexpected result {:?}", other),
        }

        let schema = RecordSchema::for_point_format(7, 0).unwrap();
        let mut data = LazVlr::from_schema(&schema).data();
        assert_eq!(&data[0..2], &3u16.to_le_bytes());
        LazVlr::from_buffer(&data).unwrap().check_supported().unwrap();
        data[0] = 2;
        match LazVlr::from_buffer(&data).unwrap().check_supported() {
            Err(LasZipError::UnsupportedCompressorType(CompressorType::PointWiseChunked)) => {}
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_layered_items() {
        let schema = RecordSchema::for_point_format(10, 4).unwrap();
        let vlr = LazVlr::from_schema(&schema);
        assert_eq!(vlr.compressor(), CompressorType::LayeredChunked);
        let data = vlr.data();
        // Point14, RGBNIR14, Wavepacket14, Byte14
        assert_eq!(&data[34..40], &[10, 0, 30, 0, 3, 0]);
        assert_eq!(&data[40..46], &[12, 0, 8, 0, 3, 0]);
        assert_eq!(&data[46..52], &[13, 0, 29, 0, 3, 0]);
        assert_eq!(&data[52..58], &[14, 0, 4, 0, 3, 0]);
        assert_eq!(vlr.items_size(), schema.total_size());

        let parsed = LazVlr::from_buffer(&data).unwrap();
        assert_eq!(parsed.schema().unwrap(), schema);
        assert_eq!(
            parsed.schema_for_record_size(schema.total_size() + 2).unwrap().items().last(),
            Some(&RecordItem::Byte14(2))
        );
    }

    #[test]
    fn test_wave_packet_13_versions() {
        let schema = RecordSchema::for_point_format(4, 0).unwrap();
        let mut data = LazVlr::from_schema(&schema).data();
        // Point10, GpsTime, Wavepacket13 v1
        assert_eq!(&data[46..52], &[9, 0, 29, 0, 1, 0]);
        assert_eq!(LazVlr::from_buffer(&data).unwrap().schema().unwrap(), schema);

        data[50] = 2;
        assert_eq!(LazVlr::from_buffer(&data).unwrap().schema().unwrap(), schema);

        data[50] = 3;
        match LazVlr::from_buffer(&data).unwrap().schema() {
            Err(LasZipError::UnsupportedLazItemVersion(LazItemType::WavePacket13, 3)) => {}
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_schema_for_record_size() {
        let vlr = LazVlr::from_schema(&point3_schema());
        let schema = vlr.schema_for_record_size(34 + 5).unwrap();
        assert_eq!(schema.total_size(), 39);
        assert_eq!(schema.items().last(), Some(&RecordItem::ExtraBytes(5)));

        assert_eq!(vlr.schema_for_record_size(34).unwrap(), point3_schema());
        assert!(vlr.schema_for_record_size(30).is_err());
    }
}
