//! Codecs for the user dimensions of a record.
//!
//! Every integer dimension is coded as a correction to the previous value
//! of the same dimension, floating dimensions are coded through their bits.
//! 64 bit values are split in two 32 bit halves, each half having its own
//! predictor, the low half comes first.

use std::io::{Read, Write};

use num_traits::{AsPrimitive, Zero};

use crate::compressors::{IntegerCompressor, IntegerCompressorBuilder};
use crate::decoders::ArithmeticDecoder;
use crate::decompressors::{IntegerDecompressor, IntegerDecompressorBuilder};
use crate::encoders::ArithmeticEncoder;
use crate::packers::Packable;
use crate::record::{FieldCompressor, FieldDecompressor};
use crate::schema::{Dimension, DimensionKind};

/// Compresses an integer of `T::SIZE` bytes using the previous one as prediction
pub struct IntegerFieldCompressor<T> {
    compressor: IntegerCompressor,
    last: T,
}

impl<T: Packable + Zero> IntegerFieldCompressor<T> {
    pub fn new() -> Self {
        Self {
            compressor: IntegerCompressorBuilder::new()
                .bits(T::SIZE as u32 * 8)
                .build_initialized(),
            last: T::zero(),
        }
    }
}

impl<T: Packable + Zero> Default for IntegerFieldCompressor<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, W> FieldCompressor<W> for IntegerFieldCompressor<T>
where
    T: Packable + Copy + AsPrimitive<i32>,
    W: Write,
{
    fn size_of_field(&self) -> usize {
        T::SIZE
    }

    fn compress_first(&mut self, dst: &mut W, buf: &[u8]) -> std::io::Result<()> {
        self.last = T::unpack_from(buf);
        dst.write_all(&buf[..T::SIZE])
    }

    fn compress_with(
        &mut self,
        encoder: &mut ArithmeticEncoder<W>,
        buf: &[u8],
    ) -> std::io::Result<()> {
        let current = T::unpack_from(buf);
        self.compressor
            .compress(encoder, self.last.as_(), current.as_(), 0)?;
        self.last = current;
        Ok(())
    }
}

pub struct IntegerFieldDecompressor<T> {
    decompressor: IntegerDecompressor,
    last: T,
}

impl<T: Packable + Zero> IntegerFieldDecompressor<T> {
    pub fn new() -> Self {
        Self {
            decompressor: IntegerDecompressorBuilder::new()
                .bits(T::SIZE as u32 * 8)
                .build_initialized(),
            last: T::zero(),
        }
    }
}

impl<T: Packable + Zero> Default for IntegerFieldDecompressor<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, R> FieldDecompressor<R> for IntegerFieldDecompressor<T>
where
    T: Packable + Copy + AsPrimitive<i32> + 'static,
    i32: AsPrimitive<T>,
    R: Read,
{
    fn size_of_field(&self) -> usize {
        T::SIZE
    }

    fn decompress_first(&mut self, src: &mut R, first_point: &mut [u8]) -> std::io::Result<()> {
        src.read_exact(&mut first_point[..T::SIZE])?;
        self.last = T::unpack_from(first_point);
        Ok(())
    }

    fn decompress_with(
        &mut self,
        decoder: &mut ArithmeticDecoder<R>,
        buf: &mut [u8],
    ) -> std::io::Result<()> {
        let value: T = self
            .decompressor
            .decompress(decoder, self.last.as_(), 0)?
            .as_();
        value.pack_into(buf);
        self.last = value;
        Ok(())
    }
}

/// Compresses a 64 bit value as two independent 32 bit halves of type `T`
pub struct SplitFieldCompressor<T> {
    low: IntegerFieldCompressor<T>,
    high: IntegerFieldCompressor<T>,
}

impl<T: Packable + Zero> SplitFieldCompressor<T> {
    pub fn new() -> Self {
        Self {
            low: IntegerFieldCompressor::new(),
            high: IntegerFieldCompressor::new(),
        }
    }
}

impl<T, W> FieldCompressor<W> for SplitFieldCompressor<T>
where
    T: Packable + Copy + AsPrimitive<i32>,
    W: Write,
{
    fn size_of_field(&self) -> usize {
        2 * T::SIZE
    }

    fn compress_first(&mut self, dst: &mut W, buf: &[u8]) -> std::io::Result<()> {
        let (low, high) = buf.split_at(T::SIZE);
        self.low.compress_first(dst, low)?;
        self.high.compress_first(dst, high)
    }

    fn compress_with(
        &mut self,
        encoder: &mut ArithmeticEncoder<W>,
        buf: &[u8],
    ) -> std::io::Result<()> {
        let (low, high) = buf.split_at(T::SIZE);
        self.low.compress_with(encoder, low)?;
        self.high.compress_with(encoder, high)
    }
}

pub struct SplitFieldDecompressor<T> {
    low: IntegerFieldDecompressor<T>,
    high: IntegerFieldDecompressor<T>,
}

impl<T: Packable + Zero> SplitFieldDecompressor<T> {
    pub fn new() -> Self {
        Self {
            low: IntegerFieldDecompressor::new(),
            high: IntegerFieldDecompressor::new(),
        }
    }
}

impl<T, R> FieldDecompressor<R> for SplitFieldDecompressor<T>
where
    T: Packable + Copy + AsPrimitive<i32> + 'static,
    i32: AsPrimitive<T>,
    R: Read,
{
    fn size_of_field(&self) -> usize {
        2 * T::SIZE
    }

    fn decompress_first(&mut self, src: &mut R, first_point: &mut [u8]) -> std::io::Result<()> {
        let (low, high) = first_point.split_at_mut(T::SIZE);
        self.low.decompress_first(src, low)?;
        self.high.decompress_first(src, high)
    }

    fn decompress_with(
        &mut self,
        decoder: &mut ArithmeticDecoder<R>,
        buf: &mut [u8],
    ) -> std::io::Result<()> {
        let (low, high) = buf.split_at_mut(T::SIZE);
        self.low.decompress_with(decoder, low)?;
        self.high.decompress_with(decoder, high)
    }
}

/// The codec of one user dimension, chosen by its kind and size.
///
/// 4 byte floats use the i32 codec, 8 byte floats the unsigned 64 one.
pub enum DimensionCompressor {
    I8(IntegerFieldCompressor<i8>),
    U8(IntegerFieldCompressor<u8>),
    I16(IntegerFieldCompressor<i16>),
    U16(IntegerFieldCompressor<u16>),
    I32(IntegerFieldCompressor<i32>),
    U32(IntegerFieldCompressor<u32>),
    I64(SplitFieldCompressor<i32>),
    U64(SplitFieldCompressor<u32>),
}

impl DimensionCompressor {
    pub fn new(dimension: &Dimension) -> Self {
        use DimensionKind::*;
        match (dimension.kind(), dimension.size()) {
            (Signed, 1) => DimensionCompressor::I8(IntegerFieldCompressor::new()),
            (Unsigned, 1) => DimensionCompressor::U8(IntegerFieldCompressor::new()),
            (Signed, 2) => DimensionCompressor::I16(IntegerFieldCompressor::new()),
            (Unsigned, 2) => DimensionCompressor::U16(IntegerFieldCompressor::new()),
            (Signed, 4) | (Floating, 4) => DimensionCompressor::I32(IntegerFieldCompressor::new()),
            (Unsigned, 4) => DimensionCompressor::U32(IntegerFieldCompressor::new()),
            (Signed, 8) => DimensionCompressor::I64(SplitFieldCompressor::new()),
            // unsigned or floating 8 bytes, Dimension::new rejects other sizes
            _ => DimensionCompressor::U64(SplitFieldCompressor::new()),
        }
    }
}

impl<W: Write> FieldCompressor<W> for DimensionCompressor {
    fn size_of_field(&self) -> usize {
        match self {
            DimensionCompressor::I8(c) => FieldCompressor::<W>::size_of_field(c),
            DimensionCompressor::U8(c) => FieldCompressor::<W>::size_of_field(c),
            DimensionCompressor::I16(c) => FieldCompressor::<W>::size_of_field(c),
            DimensionCompressor::U16(c) => FieldCompressor::<W>::size_of_field(c),
            DimensionCompressor::I32(c) => FieldCompressor::<W>::size_of_field(c),
            DimensionCompressor::U32(c) => FieldCompressor::<W>::size_of_field(c),
            DimensionCompressor::I64(c) => FieldCompressor::<W>::size_of_field(c),
            DimensionCompressor::U64(c) => FieldCompressor::<W>::size_of_field(c),
        }
    }

    fn compress_first(&mut self, dst: &mut W, buf: &[u8]) -> std::io::Result<()> {
        match self {
            DimensionCompressor::I8(c) => c.compress_first(dst, buf),
            DimensionCompressor::U8(c) => c.compress_first(dst, buf),
            DimensionCompressor::I16(c) => c.compress_first(dst, buf),
            DimensionCompressor::U16(c) => c.compress_first(dst, buf),
            DimensionCompressor::I32(c) => c.compress_first(dst, buf),
            DimensionCompressor::U32(c) => c.compress_first(dst, buf),
            DimensionCompressor::I64(c) => c.compress_first(dst, buf),
            DimensionCompressor::U64(c) => c.compress_first(dst, buf),
        }
    }

    fn compress_with(
        &mut self,
        encoder: &mut ArithmeticEncoder<W>,
        buf: &[u8],
    ) -> std::io::Result<()> {
        match self {
            DimensionCompressor::I8(c) => c.compress_with(encoder, buf),
            DimensionCompressor::U8(c) => c.compress_with(encoder, buf),
            DimensionCompressor::I16(c) => c.compress_with(encoder, buf),
            DimensionCompressor::U16(c) => c.compress_with(encoder, buf),
            DimensionCompressor::I32(c) => c.compress_with(encoder, buf),
            DimensionCompressor::U32(c) => c.compress_with(encoder, buf),
            DimensionCompressor::I64(c) => c.compress_with(encoder, buf),
            DimensionCompressor::U64(c) => c.compress_with(encoder, buf),
        }
    }
}

pub enum DimensionDecompressor {
    I8(IntegerFieldDecompressor<i8>),
    U8(IntegerFieldDecompressor<u8>),
    I16(IntegerFieldDecompressor<i16>),
    U16(IntegerFieldDecompressor<u16>),
    I32(IntegerFieldDecompressor<i32>),
    U32(IntegerFieldDecompressor<u32>),
    I64(SplitFieldDecompressor<i32>),
    U64(SplitFieldDecompressor<u32>),
}

impl DimensionDecompressor {
    pub fn new(dimension: &Dimension) -> Self {
        use DimensionKind::*;
        match (dimension.kind(), dimension.size()) {
            (Signed, 1) => DimensionDecompressor::I8(IntegerFieldDecompressor::new()),
            (Unsigned, 1) => DimensionDecompressor::U8(IntegerFieldDecompressor::new()),
            (Signed, 2) => DimensionDecompressor::I16(IntegerFieldDecompressor::new()),
            (Unsigned, 2) => DimensionDecompressor::U16(IntegerFieldDecompressor::new()),
            (Signed, 4) | (Floating, 4) => {
                DimensionDecompressor::I32(IntegerFieldDecompressor::new())
            }
            (Unsigned, 4) => DimensionDecompressor::U32(IntegerFieldDecompressor::new()),
            (Signed, 8) => DimensionDecompressor::I64(SplitFieldDecompressor::new()),
            _ => DimensionDecompressor::U64(SplitFieldDecompressor::new()),
        }
    }
}

impl<R: Read> FieldDecompressor<R> for DimensionDecompressor {
    fn size_of_field(&self) -> usize {
        match self {
            DimensionDecompressor::I8(d) => FieldDecompressor::<R>::size_of_field(d),
            DimensionDecompressor::U8(d) => FieldDecompressor::<R>::size_of_field(d),
            DimensionDecompressor::I16(d) => FieldDecompressor::<R>::size_of_field(d),
            DimensionDecompressor::U16(d) => FieldDecompressor::<R>::size_of_field(d),
            DimensionDecompressor::I32(d) => FieldDecompressor::<R>::size_of_field(d),
            DimensionDecompressor::U32(d) => FieldDecompressor::<R>::size_of_field(d),
            DimensionDecompressor::I64(d) => FieldDecompressor::<R>::size_of_field(d),
            DimensionDecompressor::U64(d) => FieldDecompressor::<R>::size_of_field(d),
        }
    }

    fn decompress_first(&mut self, src: &mut R, first_point: &mut [u8]) -> std::io::Result<()> {
        match self {
            DimensionDecompressor::I8(d) => d.decompress_first(src, first_point),
            DimensionDecompressor::U8(d) => d.decompress_first(src, first_point),
            DimensionDecompressor::I16(d) => d.decompress_first(src, first_point),
            DimensionDecompressor::U16(d) => d.decompress_first(src, first_point),
            DimensionDecompressor::I32(d) => d.decompress_first(src, first_point),
            DimensionDecompressor::U32(d) => d.decompress_first(src, first_point),
            DimensionDecompressor::I64(d) => d.decompress_first(src, first_point),
            DimensionDecompressor::U64(d) => d.decompress_first(src, first_point),
        }
    }

    fn decompress_with(
        &mut self,
        decoder: &mut ArithmeticDecoder<R>,
        buf: &mut [u8],
    ) -> std::io::Result<()> {
        match self {
            DimensionDecompressor::I8(d) => d.decompress_with(decoder, buf),
            DimensionDecompressor::U8(d) => d.decompress_with(decoder, buf),
            DimensionDecompressor::I16(d) => d.decompress_with(decoder, buf),
            DimensionDecompressor::U16(d) => d.decompress_with(decoder, buf),
            DimensionDecompressor::I32(d) => d.decompress_with(decoder, buf),
            DimensionDecompressor::U32(d) => d.decompress_with(decoder, buf),
            DimensionDecompressor::I64(d) => d.decompress_with(decoder, buf),
            DimensionDecompressor::U64(d) => d.decompress_with(decoder, buf),
        }
    }
}
