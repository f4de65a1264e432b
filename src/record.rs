//! Composition of the item codecs into codecs of whole records.
//!
//! A record is compressed by running, in schema order, the codec of each
//! of its items on the slice of the record the item occupies.
//!
//! Point-wise schemas give sequential chunks, organized as follow:
//!
//! 1) 1 raw record, written as is
//! 2) n records, arithmetic coded in a single stream
//!
//! Schemas starting with a [`RecordItem::Point14`] give layered chunks:
//!
//! 1) 1 raw record, written as is
//! 2) the number of records in the chunk (u32)
//! 3) the size in bytes of each layer of each item (u32)
//! 4) the layers

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::decoders::ArithmeticDecoder;
use crate::encoders::ArithmeticEncoder;
use crate::field::{DimensionCompressor, DimensionDecompressor};
use crate::las::{v2, v3};
use crate::schema::{RecordItem, RecordSchema};
use crate::LasZipError;

/***************************************************************************************************
                    Field Traits
***************************************************************************************************/

pub trait FieldCompressor<W: Write> {
    fn size_of_field(&self) -> usize;

    fn compress_first(&mut self, dst: &mut W, buf: &[u8]) -> std::io::Result<()>;

    fn compress_with(
        &mut self,
        encoder: &mut ArithmeticEncoder<W>,
        buf: &[u8],
    ) -> std::io::Result<()>;
}

pub trait FieldDecompressor<R: Read> {
    fn size_of_field(&self) -> usize;

    fn decompress_first(&mut self, src: &mut R, first_point: &mut [u8]) -> std::io::Result<()>;

    fn decompress_with(
        &mut self,
        decoder: &mut ArithmeticDecoder<R>,
        buf: &mut [u8],
    ) -> std::io::Result<()>;
}

/// Compressor of a field of a layered record.
///
/// The `context` is the scanner channel of the record being compressed,
/// it is set by the point compressor and read by the others.
pub trait LayeredFieldCompressor<W: Write> {
    fn size_of_field(&self) -> usize;

    fn init_first_point(
        &mut self,
        dst: &mut W,
        first_point: &[u8],
        context: &mut usize,
    ) -> std::io::Result<()>;

    fn compress_field_with(
        &mut self,
        current_point: &[u8],
        context: &mut usize,
    ) -> std::io::Result<()>;

    fn write_layers_sizes(&mut self, dst: &mut W) -> std::io::Result<()>;

    fn write_layers(&mut self, dst: &mut W) -> std::io::Result<()>;
}

pub trait LayeredFieldDecompressor<R: Read> {
    fn size_of_field(&self) -> usize;

    fn init_first_point(
        &mut self,
        src: &mut R,
        first_point: &mut [u8],
        context: &mut usize,
    ) -> std::io::Result<()>;

    fn decompress_field_with(
        &mut self,
        current_point: &mut [u8],
        context: &mut usize,
    ) -> std::io::Result<()>;

    fn read_layers_sizes(&mut self, src: &mut R) -> std::io::Result<()>;

    fn read_layers(&mut self, src: &mut R) -> std::io::Result<()>;
}

/***************************************************************************************************
                    Item dispatch
***************************************************************************************************/

fn not_point_wise(item: &RecordItem) -> LasZipError {
    LasZipError::InvalidSchema(format!("{:?} can only be compressed in layers", item))
}

fn not_layered(item: &RecordItem) -> LasZipError {
    LasZipError::InvalidSchema(format!("{:?} cannot be compressed in layers", item))
}

/// The compressor of one point-wise [`RecordItem`]
pub enum ItemCompressor {
    Point10(v2::Point10Compressor),
    GpsTime(v2::GpsTimeCompressor),
    Rgb12(v2::RGBCompressor),
    WavePacket13(v2::WavePacketCompressor),
    ExtraBytes(v2::ExtraBytesCompressor),
    Dimension(DimensionCompressor),
}

impl ItemCompressor {
    pub fn new(item: &RecordItem) -> crate::Result<Self> {
        Ok(match item {
            RecordItem::Point10 => ItemCompressor::Point10(Default::default()),
            RecordItem::GpsTime => ItemCompressor::GpsTime(Default::default()),
            RecordItem::Rgb12 => ItemCompressor::Rgb12(Default::default()),
            RecordItem::WavePacket13 => ItemCompressor::WavePacket13(Default::default()),
            RecordItem::ExtraBytes(count) => {
                ItemCompressor::ExtraBytes(v2::ExtraBytesCompressor::new(usize::from(*count)))
            }
            RecordItem::Dimension(dimension) => {
                ItemCompressor::Dimension(DimensionCompressor::new(dimension))
            }
            _ => return Err(not_point_wise(item)),
        })
    }
}

impl<W: Write> FieldCompressor<W> for ItemCompressor {
    fn size_of_field(&self) -> usize {
        match self {
            ItemCompressor::Point10(c) => FieldCompressor::<W>::size_of_field(c),
            ItemCompressor::GpsTime(c) => FieldCompressor::<W>::size_of_field(c),
            ItemCompressor::Rgb12(c) => FieldCompressor::<W>::size_of_field(c),
            ItemCompressor::WavePacket13(c) => FieldCompressor::<W>::size_of_field(c),
            ItemCompressor::ExtraBytes(c) => FieldCompressor::<W>::size_of_field(c),
            ItemCompressor::Dimension(c) => FieldCompressor::<W>::size_of_field(c),
        }
    }

    fn compress_first(&mut self, dst: &mut W, buf: &[u8]) -> std::io::Result<()> {
        match self {
            ItemCompressor::Point10(c) => c.compress_first(dst, buf),
            ItemCompressor::GpsTime(c) => c.compress_first(dst, buf),
            ItemCompressor::Rgb12(c) => c.compress_first(dst, buf),
            ItemCompressor::WavePacket13(c) => c.compress_first(dst, buf),
            ItemCompressor::ExtraBytes(c) => c.compress_first(dst, buf),
            ItemCompressor::Dimension(c) => c.compress_first(dst, buf),
        }
    }

    fn compress_with(
        &mut self,
        encoder: &mut ArithmeticEncoder<W>,
        buf: &[u8],
    ) -> std::io::Result<()> {
        match self {
            ItemCompressor::Point10(c) => c.compress_with(encoder, buf),
            ItemCompressor::GpsTime(c) => c.compress_with(encoder, buf),
            ItemCompressor::Rgb12(c) => c.compress_with(encoder, buf),
            ItemCompressor::WavePacket13(c) => c.compress_with(encoder, buf),
            ItemCompressor::ExtraBytes(c) => c.compress_with(encoder, buf),
            ItemCompressor::Dimension(c) => c.compress_with(encoder, buf),
        }
    }
}

/// The decompressor of one point-wise [`RecordItem`]
pub enum ItemDecompressor {
    Point10(v2::Point10Decompressor),
    GpsTime(v2::GpsTimeDecompressor),
    Rgb12(v2::RGBDecompressor),
    WavePacket13(v2::WavePacketDecompressor),
    ExtraBytes(v2::ExtraBytesDecompressor),
    Dimension(DimensionDecompressor),
}

impl ItemDecompressor {
    pub fn new(item: &RecordItem) -> crate::Result<Self> {
        Ok(match item {
            RecordItem::Point10 => ItemDecompressor::Point10(Default::default()),
            RecordItem::GpsTime => ItemDecompressor::GpsTime(Default::default()),
            RecordItem::Rgb12 => ItemDecompressor::Rgb12(Default::default()),
            RecordItem::WavePacket13 => ItemDecompressor::WavePacket13(Default::default()),
            RecordItem::ExtraBytes(count) => ItemDecompressor::ExtraBytes(
                v2::ExtraBytesDecompressor::new(usize::from(*count)),
            ),
            RecordItem::Dimension(dimension) => {
                ItemDecompressor::Dimension(DimensionDecompressor::new(dimension))
            }
            _ => return Err(not_point_wise(item)),
        })
    }
}

impl<R: Read> FieldDecompressor<R> for ItemDecompressor {
    fn size_of_field(&self) -> usize {
        match self {
            ItemDecompressor::Point10(d) => FieldDecompressor::<R>::size_of_field(d),
            ItemDecompressor::GpsTime(d) => FieldDecompressor::<R>::size_of_field(d),
            ItemDecompressor::Rgb12(d) => FieldDecompressor::<R>::size_of_field(d),
            ItemDecompressor::WavePacket13(d) => FieldDecompressor::<R>::size_of_field(d),
            ItemDecompressor::ExtraBytes(d) => FieldDecompressor::<R>::size_of_field(d),
            ItemDecompressor::Dimension(d) => FieldDecompressor::<R>::size_of_field(d),
        }
    }

    fn decompress_first(&mut self, src: &mut R, first_point: &mut [u8]) -> std::io::Result<()> {
        match self {
            ItemDecompressor::Point10(d) => d.decompress_first(src, first_point),
            ItemDecompressor::GpsTime(d) => d.decompress_first(src, first_point),
            ItemDecompressor::Rgb12(d) => d.decompress_first(src, first_point),
            ItemDecompressor::WavePacket13(d) => d.decompress_first(src, first_point),
            ItemDecompressor::ExtraBytes(d) => d.decompress_first(src, first_point),
            ItemDecompressor::Dimension(d) => d.decompress_first(src, first_point),
        }
    }

    fn decompress_with(
        &mut self,
        decoder: &mut ArithmeticDecoder<R>,
        buf: &mut [u8],
    ) -> std::io::Result<()> {
        match self {
            ItemDecompressor::Point10(d) => d.decompress_with(decoder, buf),
            ItemDecompressor::GpsTime(d) => d.decompress_with(decoder, buf),
            ItemDecompressor::Rgb12(d) => d.decompress_with(decoder, buf),
            ItemDecompressor::WavePacket13(d) => d.decompress_with(decoder, buf),
            ItemDecompressor::ExtraBytes(d) => d.decompress_with(decoder, buf),
            ItemDecompressor::Dimension(d) => d.decompress_with(decoder, buf),
        }
    }
}

/// The compressor of one field of a layered [`RecordItem`],
/// a [`RecordItem::RgbNir14`] has two fields.
pub enum LayeredItemCompressor {
    Point14(v3::Point14Compressor),
    Rgb14(v3::RGBCompressor),
    Nir14(v3::NirCompressor),
    WavePacket14(v3::WavePacketCompressor),
    Byte14(v3::ExtraBytesCompressor),
}

impl LayeredItemCompressor {
    pub fn for_item(item: &RecordItem) -> crate::Result<Vec<Self>> {
        Ok(match item {
            RecordItem::Point14 => vec![LayeredItemCompressor::Point14(Default::default())],
            RecordItem::Rgb14 => vec![LayeredItemCompressor::Rgb14(Default::default())],
            RecordItem::RgbNir14 => vec![
                LayeredItemCompressor::Rgb14(Default::default()),
                LayeredItemCompressor::Nir14(Default::default()),
            ],
            RecordItem::WavePacket14 => {
                vec![LayeredItemCompressor::WavePacket14(Default::default())]
            }
            RecordItem::Byte14(count) => vec![LayeredItemCompressor::Byte14(
                v3::ExtraBytesCompressor::new(usize::from(*count)),
            )],
            _ => return Err(not_layered(item)),
        })
    }
}

impl<W: Write> LayeredFieldCompressor<W> for LayeredItemCompressor {
    fn size_of_field(&self) -> usize {
        match self {
            LayeredItemCompressor::Point14(c) => LayeredFieldCompressor::<W>::size_of_field(c),
            LayeredItemCompressor::Rgb14(c) => LayeredFieldCompressor::<W>::size_of_field(c),
            LayeredItemCompressor::Nir14(c) => LayeredFieldCompressor::<W>::size_of_field(c),
            LayeredItemCompressor::WavePacket14(c) => {
                LayeredFieldCompressor::<W>::size_of_field(c)
            }
            LayeredItemCompressor::Byte14(c) => LayeredFieldCompressor::<W>::size_of_field(c),
        }
    }

    fn init_first_point(
        &mut self,
        dst: &mut W,
        first_point: &[u8],
        context: &mut usize,
    ) -> std::io::Result<()> {
        match self {
            LayeredItemCompressor::Point14(c) => c.init_first_point(dst, first_point, context),
            LayeredItemCompressor::Rgb14(c) => c.init_first_point(dst, first_point, context),
            LayeredItemCompressor::Nir14(c) => c.init_first_point(dst, first_point, context),
            LayeredItemCompressor::WavePacket14(c) => {
                c.init_first_point(dst, first_point, context)
            }
            LayeredItemCompressor::Byte14(c) => c.init_first_point(dst, first_point, context),
        }
    }

    fn compress_field_with(
        &mut self,
        current_point: &[u8],
        context: &mut usize,
    ) -> std::io::Result<()> {
        match self {
            LayeredItemCompressor::Point14(c) => {
                LayeredFieldCompressor::<W>::compress_field_with(c, current_point, context)
            }
            LayeredItemCompressor::Rgb14(c) => {
                LayeredFieldCompressor::<W>::compress_field_with(c, current_point, context)
            }
            LayeredItemCompressor::Nir14(c) => {
                LayeredFieldCompressor::<W>::compress_field_with(c, current_point, context)
            }
            LayeredItemCompressor::WavePacket14(c) => {
                LayeredFieldCompressor::<W>::compress_field_with(c, current_point, context)
            }
            LayeredItemCompressor::Byte14(c) => {
                LayeredFieldCompressor::<W>::compress_field_with(c, current_point, context)
            }
        }
    }

    fn write_layers_sizes(&mut self, dst: &mut W) -> std::io::Result<()> {
        match self {
            LayeredItemCompressor::Point14(c) => c.write_layers_sizes(dst),
            LayeredItemCompressor::Rgb14(c) => c.write_layers_sizes(dst),
            LayeredItemCompressor::Nir14(c) => c.write_layers_sizes(dst),
            LayeredItemCompressor::WavePacket14(c) => c.write_layers_sizes(dst),
            LayeredItemCompressor::Byte14(c) => c.write_layers_sizes(dst),
        }
    }

    fn write_layers(&mut self, dst: &mut W) -> std::io::Result<()> {
        match self {
            LayeredItemCompressor::Point14(c) => c.write_layers(dst),
            LayeredItemCompressor::Rgb14(c) => c.write_layers(dst),
            LayeredItemCompressor::Nir14(c) => c.write_layers(dst),
            LayeredItemCompressor::WavePacket14(c) => c.write_layers(dst),
            LayeredItemCompressor::Byte14(c) => c.write_layers(dst),
        }
    }
}

/// The decompressor of one field of a layered [`RecordItem`]
pub enum LayeredItemDecompressor {
    Point14(v3::Point14Decompressor),
    Rgb14(v3::RGBDecompressor),
    Nir14(v3::NirDecompressor),
    WavePacket14(v3::WavePacketDecompressor),
    Byte14(v3::ExtraBytesDecompressor),
}

impl LayeredItemDecompressor {
    pub fn for_item(item: &RecordItem) -> crate::Result<Vec<Self>> {
        Ok(match item {
            RecordItem::Point14 => vec![LayeredItemDecompressor::Point14(Default::default())],
            RecordItem::Rgb14 => vec![LayeredItemDecompressor::Rgb14(Default::default())],
            RecordItem::RgbNir14 => vec![
                LayeredItemDecompressor::Rgb14(Default::default()),
                LayeredItemDecompressor::Nir14(Default::default()),
            ],
            RecordItem::WavePacket14 => {
                vec![LayeredItemDecompressor::WavePacket14(Default::default())]
            }
            RecordItem::Byte14(count) => vec![LayeredItemDecompressor::Byte14(
                v3::ExtraBytesDecompressor::new(usize::from(*count)),
            )],
            _ => return Err(not_layered(item)),
        })
    }
}

impl<R: Read> LayeredFieldDecompressor<R> for LayeredItemDecompressor {
    fn size_of_field(&self) -> usize {
        match self {
            LayeredItemDecompressor::Point14(d) => LayeredFieldDecompressor::<R>::size_of_field(d),
            LayeredItemDecompressor::Rgb14(d) => LayeredFieldDecompressor::<R>::size_of_field(d),
            LayeredItemDecompressor::Nir14(d) => LayeredFieldDecompressor::<R>::size_of_field(d),
            LayeredItemDecompressor::WavePacket14(d) => {
                LayeredFieldDecompressor::<R>::size_of_field(d)
            }
            LayeredItemDecompressor::Byte14(d) => LayeredFieldDecompressor::<R>::size_of_field(d),
        }
    }

    fn init_first_point(
        &mut self,
        src: &mut R,
        first_point: &mut [u8],
        context: &mut usize,
    ) -> std::io::Result<()> {
        match self {
            LayeredItemDecompressor::Point14(d) => d.init_first_point(src, first_point, context),
            LayeredItemDecompressor::Rgb14(d) => d.init_first_point(src, first_point, context),
            LayeredItemDecompressor::Nir14(d) => d.init_first_point(src, first_point, context),
            LayeredItemDecompressor::WavePacket14(d) => {
                d.init_first_point(src, first_point, context)
            }
            LayeredItemDecompressor::Byte14(d) => d.init_first_point(src, first_point, context),
        }
    }

    fn decompress_field_with(
        &mut self,
        current_point: &mut [u8],
        context: &mut usize,
    ) -> std::io::Result<()> {
        match self {
            LayeredItemDecompressor::Point14(d) => {
                LayeredFieldDecompressor::<R>::decompress_field_with(d, current_point, context)
            }
            LayeredItemDecompressor::Rgb14(d) => {
                LayeredFieldDecompressor::<R>::decompress_field_with(d, current_point, context)
            }
            LayeredItemDecompressor::Nir14(d) => {
                LayeredFieldDecompressor::<R>::decompress_field_with(d, current_point, context)
            }
            LayeredItemDecompressor::WavePacket14(d) => {
                LayeredFieldDecompressor::<R>::decompress_field_with(d, current_point, context)
            }
            LayeredItemDecompressor::Byte14(d) => {
                LayeredFieldDecompressor::<R>::decompress_field_with(d, current_point, context)
            }
        }
    }

    fn read_layers_sizes(&mut self, src: &mut R) -> std::io::Result<()> {
        match self {
            LayeredItemDecompressor::Point14(d) => d.read_layers_sizes(src),
            LayeredItemDecompressor::Rgb14(d) => d.read_layers_sizes(src),
            LayeredItemDecompressor::Nir14(d) => d.read_layers_sizes(src),
            LayeredItemDecompressor::WavePacket14(d) => d.read_layers_sizes(src),
            LayeredItemDecompressor::Byte14(d) => d.read_layers_sizes(src),
        }
    }

    fn read_layers(&mut self, src: &mut R) -> std::io::Result<()> {
        match self {
            LayeredItemDecompressor::Point14(d) => d.read_layers(src),
            LayeredItemDecompressor::Rgb14(d) => d.read_layers(src),
            LayeredItemDecompressor::Nir14(d) => d.read_layers(src),
            LayeredItemDecompressor::WavePacket14(d) => d.read_layers(src),
            LayeredItemDecompressor::Byte14(d) => d.read_layers(src),
        }
    }
}

fn check_record_len(buffer_len: usize, record_size: usize) -> crate::Result<()> {
    if buffer_len < record_size {
        Err(LasZipError::InsufficientInput {
            buffer_len,
            record_size,
        })
    } else {
        Ok(())
    }
}

fn layered_compressors_of(items: &[RecordItem]) -> crate::Result<Vec<LayeredItemCompressor>> {
    let mut compressors = Vec::with_capacity(items.len());
    for item in items {
        compressors.extend(LayeredItemCompressor::for_item(item)?);
    }
    Ok(compressors)
}

fn layered_decompressors_of(items: &[RecordItem]) -> crate::Result<Vec<LayeredItemDecompressor>> {
    let mut decompressors = Vec::with_capacity(items.len());
    for item in items {
        decompressors.extend(LayeredItemDecompressor::for_item(item)?);
    }
    Ok(decompressors)
}

/***************************************************************************************************
                    Record Compressors
***************************************************************************************************/

/// Compresses the records of one chunk into a single arithmetic coded stream
pub struct SequentialPointRecordCompressor<W: Write> {
    is_first_compression: bool,
    items: Vec<RecordItem>,
    field_compressors: Vec<ItemCompressor>,
    encoder: ArithmeticEncoder<W>,
    record_size: usize,
}

impl<W: Write> SequentialPointRecordCompressor<W> {
    pub fn new(output: W, schema: &RecordSchema) -> crate::Result<Self> {
        schema.validate()?;
        let items = schema.items().to_vec();
        let field_compressors = items
            .iter()
            .map(ItemCompressor::new)
            .collect::<crate::Result<Vec<_>>>()?;
        Ok(Self {
            is_first_compression: true,
            items,
            field_compressors,
            encoder: ArithmeticEncoder::new(output),
            record_size: schema.total_size(),
        })
    }

    pub fn record_size(&self) -> usize {
        self.record_size
    }

    pub fn compress_next(&mut self, input: &[u8]) -> crate::Result<()> {
        check_record_len(input.len(), self.record_size)?;
        let mut field_start = 0;
        if self.is_first_compression {
            for field in &mut self.field_compressors {
                let field_end = field_start + FieldCompressor::<W>::size_of_field(field);
                field.compress_first(self.encoder.out_stream(), &input[field_start..field_end])?;
                field_start = field_end;
            }
            self.is_first_compression = false;
        } else {
            for field in &mut self.field_compressors {
                let field_end = field_start + FieldCompressor::<W>::size_of_field(field);
                field.compress_with(&mut self.encoder, &input[field_start..field_end])?;
                field_start = field_end;
            }
        }
        Ok(())
    }

    /// Flushes the arithmetic encoder, ending the stream of the current chunk
    pub fn done(&mut self) -> crate::Result<()> {
        self.encoder.done()?;
        Ok(())
    }

    /// Puts every codec back in its untrained state so that
    /// the next record starts a new chunk.
    pub fn reset(&mut self) {
        self.is_first_compression = true;
        self.encoder.reset();
        // the items were accepted by new
        self.field_compressors = self
            .items
            .iter()
            .filter_map(|item| ItemCompressor::new(item).ok())
            .collect();
    }

    pub fn get_mut(&mut self) -> &mut W {
        self.encoder.out_stream()
    }

    pub fn get_ref(&self) -> &W {
        self.encoder.get_ref()
    }

    pub fn into_stream(self) -> W {
        self.encoder.into_stream()
    }
}

/// Compresses the records of one chunk into layers,
/// written when the chunk is done.
pub struct LayeredPointRecordCompressor<W: Write> {
    items: Vec<RecordItem>,
    field_compressors: Vec<LayeredItemCompressor>,
    dst: W,
    point_count: u32,
    context: usize,
    record_size: usize,
}

impl<W: Write> LayeredPointRecordCompressor<W> {
    pub fn new(dst: W, schema: &RecordSchema) -> crate::Result<Self> {
        schema.validate()?;
        let items = schema.items().to_vec();
        let field_compressors = layered_compressors_of(&items)?;
        Ok(Self {
            items,
            field_compressors,
            dst,
            point_count: 0,
            context: 0,
            record_size: schema.total_size(),
        })
    }

    pub fn record_size(&self) -> usize {
        self.record_size
    }

    pub fn compress_next(&mut self, point: &[u8]) -> crate::Result<()> {
        check_record_len(point.len(), self.record_size)?;
        let mut field_start = 0;
        if self.point_count == 0 {
            for field in &mut self.field_compressors {
                let field_end = field_start + LayeredFieldCompressor::<W>::size_of_field(field);
                field.init_first_point(
                    &mut self.dst,
                    &point[field_start..field_end],
                    &mut self.context,
                )?;
                field_start = field_end;
            }
        } else {
            for field in &mut self.field_compressors {
                let field_end = field_start + LayeredFieldCompressor::<W>::size_of_field(field);
                LayeredFieldCompressor::<W>::compress_field_with(
                    field,
                    &point[field_start..field_end],
                    &mut self.context,
                )?;
                field_start = field_end;
            }
        }
        self.point_count += 1;
        Ok(())
    }

    /// Writes the point count, the layer sizes and the layers.
    ///
    /// Nothing is written for a chunk without points.
    pub fn done(&mut self) -> crate::Result<()> {
        if self.point_count == 0 {
            return Ok(());
        }
        self.dst.write_u32::<LittleEndian>(self.point_count)?;
        for field in &mut self.field_compressors {
            field.write_layers_sizes(&mut self.dst)?;
        }
        for field in &mut self.field_compressors {
            field.write_layers(&mut self.dst)?;
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        self.point_count = 0;
        self.context = 0;
        self.field_compressors = layered_compressors_of(&self.items).unwrap_or_default();
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.dst
    }

    pub fn get_ref(&self) -> &W {
        &self.dst
    }

    pub fn into_stream(self) -> W {
        self.dst
    }
}

/// Compresses records as sequential or layered chunks,
/// depending on the items of the schema.
pub enum PointRecordCompressor<W: Write> {
    Sequential(SequentialPointRecordCompressor<W>),
    Layered(LayeredPointRecordCompressor<W>),
}

impl<W: Write> PointRecordCompressor<W> {
    /// Creates the compressor, failing if the schema cannot be compressed
    pub fn new(output: W, schema: &RecordSchema) -> crate::Result<Self> {
        if schema.is_layered() {
            LayeredPointRecordCompressor::new(output, schema).map(PointRecordCompressor::Layered)
        } else {
            SequentialPointRecordCompressor::new(output, schema)
                .map(PointRecordCompressor::Sequential)
        }
    }

    pub fn record_size(&self) -> usize {
        match self {
            PointRecordCompressor::Sequential(c) => c.record_size(),
            PointRecordCompressor::Layered(c) => c.record_size(),
        }
    }

    pub fn compress_next(&mut self, input: &[u8]) -> crate::Result<()> {
        match self {
            PointRecordCompressor::Sequential(c) => c.compress_next(input),
            PointRecordCompressor::Layered(c) => c.compress_next(input),
        }
    }

    pub fn compress_many(&mut self, input: &[u8]) -> crate::Result<()> {
        let record_size = self.record_size();
        for record in input.chunks_exact(record_size) {
            self.compress_next(record)?;
        }
        Ok(())
    }

    /// Ends the current chunk
    pub fn done(&mut self) -> crate::Result<()> {
        match self {
            PointRecordCompressor::Sequential(c) => c.done(),
            PointRecordCompressor::Layered(c) => c.done(),
        }
    }

    /// Puts every codec back in its untrained state so that
    /// the next record starts a new chunk.
    pub fn reset(&mut self) {
        match self {
            PointRecordCompressor::Sequential(c) => c.reset(),
            PointRecordCompressor::Layered(c) => c.reset(),
        }
    }

    pub fn get_mut(&mut self) -> &mut W {
        match self {
            PointRecordCompressor::Sequential(c) => c.get_mut(),
            PointRecordCompressor::Layered(c) => c.get_mut(),
        }
    }

    pub fn get_ref(&self) -> &W {
        match self {
            PointRecordCompressor::Sequential(c) => c.get_ref(),
            PointRecordCompressor::Layered(c) => c.get_ref(),
        }
    }

    pub fn into_stream(self) -> W {
        match self {
            PointRecordCompressor::Sequential(c) => c.into_stream(),
            PointRecordCompressor::Layered(c) => c.into_stream(),
        }
    }
}

/***************************************************************************************************
                    Record Decompressors
***************************************************************************************************/

/// Decompresses the records of a chunk produced by a [`SequentialPointRecordCompressor`]
pub struct SequentialPointRecordDecompressor<R: Read> {
    is_first_decompression: bool,
    items: Vec<RecordItem>,
    field_decompressors: Vec<ItemDecompressor>,
    decoder: ArithmeticDecoder<R>,
    record_size: usize,
}

impl<R: Read> SequentialPointRecordDecompressor<R> {
    pub fn new(input: R, schema: &RecordSchema) -> crate::Result<Self> {
        schema.validate()?;
        let items = schema.items().to_vec();
        let field_decompressors = items
            .iter()
            .map(ItemDecompressor::new)
            .collect::<crate::Result<Vec<_>>>()?;
        Ok(Self {
            is_first_decompression: true,
            items,
            field_decompressors,
            decoder: ArithmeticDecoder::new(input),
            record_size: schema.total_size(),
        })
    }

    pub fn record_size(&self) -> usize {
        self.record_size
    }

    pub fn decompress_next(&mut self, out: &mut [u8]) -> crate::Result<()> {
        check_record_len(out.len(), self.record_size)?;
        let mut field_start = 0;
        if self.is_first_decompression {
            for field in &mut self.field_decompressors {
                let field_end = field_start + FieldDecompressor::<R>::size_of_field(field);
                field.decompress_first(self.decoder.in_stream(), &mut out[field_start..field_end])?;
                field_start = field_end;
            }
            self.is_first_decompression = false;

            // the init bytes of the arithmetic coded part
            // come after the raw first record
            self.decoder.read_init_bytes()?;
        } else {
            for field in &mut self.field_decompressors {
                let field_end = field_start + FieldDecompressor::<R>::size_of_field(field);
                field.decompress_with(&mut self.decoder, &mut out[field_start..field_end])?;
                field_start = field_end;
            }
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        self.is_first_decompression = true;
        self.decoder.reset();
        self.field_decompressors = self
            .items
            .iter()
            .filter_map(|item| ItemDecompressor::new(item).ok())
            .collect();
    }

    pub fn get_mut(&mut self) -> &mut R {
        self.decoder.in_stream()
    }

    pub fn get_ref(&self) -> &R {
        self.decoder.get_ref()
    }

    pub fn into_stream(self) -> R {
        self.decoder.into_stream()
    }
}

/// Decompresses the records of a chunk produced by a [`LayeredPointRecordCompressor`]
///
/// All the layers of the chunk are read with its first record.
pub struct LayeredPointRecordDecompressor<R: Read> {
    items: Vec<RecordItem>,
    field_decompressors: Vec<LayeredItemDecompressor>,
    input: R,
    /// 0 until the first record of the chunk is read
    point_count: u32,
    points_read: u32,
    context: usize,
    record_size: usize,
}

impl<R: Read> LayeredPointRecordDecompressor<R> {
    pub fn new(input: R, schema: &RecordSchema) -> crate::Result<Self> {
        schema.validate()?;
        let items = schema.items().to_vec();
        let field_decompressors = layered_decompressors_of(&items)?;
        Ok(Self {
            items,
            field_decompressors,
            input,
            point_count: 0,
            points_read: 0,
            context: 0,
            record_size: schema.total_size(),
        })
    }

    pub fn record_size(&self) -> usize {
        self.record_size
    }

    pub fn decompress_next(&mut self, out: &mut [u8]) -> crate::Result<()> {
        check_record_len(out.len(), self.record_size)?;
        let mut field_start = 0;
        if self.points_read == 0 {
            for field in &mut self.field_decompressors {
                let field_end = field_start + LayeredFieldDecompressor::<R>::size_of_field(field);
                field.init_first_point(
                    &mut self.input,
                    &mut out[field_start..field_end],
                    &mut self.context,
                )?;
                field_start = field_end;
            }

            self.point_count = self.input.read_u32::<LittleEndian>()?;
            if self.point_count == 0 {
                return Err(LasZipError::CorruptStream(
                    "a layered chunk declares no points",
                ));
            }
            for field in &mut self.field_decompressors {
                field.read_layers_sizes(&mut self.input)?;
            }
            for field in &mut self.field_decompressors {
                field.read_layers(&mut self.input)?;
            }
        } else {
            if self.points_read >= self.point_count {
                return Err(LasZipError::CorruptStream(
                    "more points requested than the layered chunk holds",
                ));
            }
            for field in &mut self.field_decompressors {
                let field_end = field_start + LayeredFieldDecompressor::<R>::size_of_field(field);
                LayeredFieldDecompressor::<R>::decompress_field_with(
                    field,
                    &mut out[field_start..field_end],
                    &mut self.context,
                )?;
                field_start = field_end;
            }
        }
        self.points_read += 1;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.point_count = 0;
        self.points_read = 0;
        self.context = 0;
        self.field_decompressors = layered_decompressors_of(&self.items).unwrap_or_default();
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.input
    }

    pub fn get_ref(&self) -> &R {
        &self.input
    }

    pub fn into_stream(self) -> R {
        self.input
    }
}

/// Decompresses the chunks of a [`PointRecordCompressor`]
pub enum PointRecordDecompressor<R: Read> {
    Sequential(SequentialPointRecordDecompressor<R>),
    Layered(LayeredPointRecordDecompressor<R>),
}

impl<R: Read> PointRecordDecompressor<R> {
    pub fn new(input: R, schema: &RecordSchema) -> crate::Result<Self> {
        if schema.is_layered() {
            LayeredPointRecordDecompressor::new(input, schema)
                .map(PointRecordDecompressor::Layered)
        } else {
            SequentialPointRecordDecompressor::new(input, schema)
                .map(PointRecordDecompressor::Sequential)
        }
    }

    pub fn record_size(&self) -> usize {
        match self {
            PointRecordDecompressor::Sequential(d) => d.record_size(),
            PointRecordDecompressor::Layered(d) => d.record_size(),
        }
    }

    pub fn decompress_next(&mut self, out: &mut [u8]) -> crate::Result<()> {
        match self {
            PointRecordDecompressor::Sequential(d) => d.decompress_next(out),
            PointRecordDecompressor::Layered(d) => d.decompress_next(out),
        }
    }

    pub fn decompress_many(&mut self, out: &mut [u8]) -> crate::Result<()> {
        let record_size = self.record_size();
        for record in out.chunks_exact_mut(record_size) {
            self.decompress_next(record)?;
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        match self {
            PointRecordDecompressor::Sequential(d) => d.reset(),
            PointRecordDecompressor::Layered(d) => d.reset(),
        }
    }

    pub fn get_mut(&mut self) -> &mut R {
        match self {
            PointRecordDecompressor::Sequential(d) => d.get_mut(),
            PointRecordDecompressor::Layered(d) => d.get_mut(),
        }
    }

    pub fn get_ref(&self) -> &R {
        match self {
            PointRecordDecompressor::Sequential(d) => d.get_ref(),
            PointRecordDecompressor::Layered(d) => d.get_ref(),
        }
    }

    pub fn into_stream(self) -> R {
        match self {
            PointRecordDecompressor::Sequential(d) => d.into_stream(),
            PointRecordDecompressor::Layered(d) => d.into_stream(),
        }
    }
}
