/*
===============================================================================

  PROGRAMMERS:

    martin.isenburg@rapidlasso.com  -  http://rapidlasso.com
    uday.karan@gmail.com - Hobu, Inc.

  COPYRIGHT:

    (c) 2007-2014, martin isenburg, rapidlasso - tools to catch reality
    (c) 2014, Uday Verma, Hobu, Inc.
    (c) 2019, Thomas Montaigu

    This is free software; you can redistribute and/or modify it under the
    terms of the GNU Lesser General Licence as published by the Free Software
    Foundation. See the COPYING file for more information.

    This software is distributed WITHOUT ANY WARRANTY and without even the
    implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.

  CHANGE HISTORY:
    6 June 2019: Translated to Rust
    17 October 2026: Reworked for run time record schemas

===============================================================================
*/

//! The wave packet of the LAS point formats 4, 5, 9 and 10.
//!
//! The f32 fields are coded through their bit patterns.

use std::io::{Read, Write};

use crate::compressors::{IntegerCompressor, IntegerCompressorBuilder};
use crate::decoders::ArithmeticDecoder;
use crate::decompressors::{IntegerDecompressor, IntegerDecompressorBuilder};
use crate::encoders::ArithmeticEncoder;
use crate::models::{ArithmeticModel, ArithmeticModelBuilder};
use crate::packers::Packable;

const DX_CONTEXT: u32 = 0;
const DY_CONTEXT: u32 = 1;
const DZ_CONTEXT: u32 = 2;

#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct WavePacket {
    pub descriptor_index: u8,
    /// offset in bytes to the waveform data
    pub offset: u64,
    /// in bytes
    pub size: u32,
    pub return_point: f32,
    pub dx: f32,
    pub dy: f32,
    pub dz: f32,
}

impl Packable for WavePacket {
    const SIZE: usize = 29;

    fn unpack_from(input: &[u8]) -> Self {
        Self {
            descriptor_index: input[0],
            offset: u64::unpack_from(&input[1..9]),
            size: u32::unpack_from(&input[9..13]),
            return_point: f32::from_bits(u32::unpack_from(&input[13..17])),
            dx: f32::from_bits(u32::unpack_from(&input[17..21])),
            dy: f32::from_bits(u32::unpack_from(&input[21..25])),
            dz: f32::from_bits(u32::unpack_from(&input[25..29])),
        }
    }

    fn pack_into(&self, output: &mut [u8]) {
        output[0] = self.descriptor_index;
        self.offset.pack_into(&mut output[1..9]);
        self.size.pack_into(&mut output[9..13]);
        self.return_point.to_bits().pack_into(&mut output[13..17]);
        self.dx.to_bits().pack_into(&mut output[17..21]);
        self.dy.to_bits().pack_into(&mut output[21..25]);
        self.dz.to_bits().pack_into(&mut output[25..29]);
    }
}

#[inline]
fn bits_of(v: f32) -> i32 {
    v.to_bits() as i32
}

#[inline]
fn from_bits(v: i32) -> f32 {
    f32::from_bits(v as u32)
}

fn offset_diff_models() -> [ArithmeticModel; 4] {
    [
        ArithmeticModelBuilder::new(4).build(),
        ArithmeticModelBuilder::new(4).build(),
        ArithmeticModelBuilder::new(4).build(),
        ArithmeticModelBuilder::new(4).build(),
    ]
}

/// Models and last value used to compress a sequence of wave packets
struct WavePacketCompressionContext {
    last: WavePacket,
    last_offset_diff: i32,
    last_sym_offset_diff: u32,

    packet_index: ArithmeticModel,
    offset_diff: [ArithmeticModel; 4],

    ic_offset_diff: IntegerCompressor,
    ic_packet_size: IntegerCompressor,
    ic_return_point: IntegerCompressor,
    ic_xyz: IntegerCompressor,
}

impl WavePacketCompressionContext {
    fn new(last: WavePacket) -> Self {
        Self {
            last,
            last_offset_diff: 0,
            last_sym_offset_diff: 0,
            packet_index: ArithmeticModelBuilder::new(256).build(),
            offset_diff: offset_diff_models(),
            ic_offset_diff: IntegerCompressorBuilder::new().bits(32).build_initialized(),
            ic_packet_size: IntegerCompressorBuilder::new().bits(32).build_initialized(),
            ic_return_point: IntegerCompressorBuilder::new().bits(32).build_initialized(),
            ic_xyz: IntegerCompressorBuilder::new()
                .bits(32)
                .contexts(3)
                .build_initialized(),
        }
    }

    fn compress_with<W: Write>(
        &mut self,
        encoder: &mut ArithmeticEncoder<W>,
        current: &WavePacket,
    ) -> std::io::Result<()> {
        let last = self.last;
        encoder.encode_symbol(&mut self.packet_index, u32::from(current.descriptor_index))?;

        let offset_diff_64 = (current.offset as i64).wrapping_sub(last.offset as i64);
        let offset_diff_32 = offset_diff_64 as i32;
        let model = &mut self.offset_diff[self.last_sym_offset_diff as usize];
        if offset_diff_64 == i64::from(offset_diff_32) {
            let sym = if offset_diff_32 == 0 {
                0
            } else if offset_diff_32 == last.size as i32 {
                1
            } else {
                2
            };
            encoder.encode_symbol(model, sym)?;
            if sym == 2 {
                self.ic_offset_diff
                    .compress(encoder, self.last_offset_diff, offset_diff_32, 0)?;
                self.last_offset_diff = offset_diff_32;
            }
            self.last_sym_offset_diff = sym;
        } else {
            encoder.encode_symbol(model, 3)?;
            encoder.write_int64(current.offset)?;
            self.last_sym_offset_diff = 3;
        }

        self.ic_packet_size
            .compress(encoder, last.size as i32, current.size as i32, 0)?;
        self.ic_return_point.compress(
            encoder,
            bits_of(last.return_point),
            bits_of(current.return_point),
            0,
        )?;
        self.ic_xyz
            .compress(encoder, bits_of(last.dx), bits_of(current.dx), DX_CONTEXT)?;
        self.ic_xyz
            .compress(encoder, bits_of(last.dy), bits_of(current.dy), DY_CONTEXT)?;
        self.ic_xyz
            .compress(encoder, bits_of(last.dz), bits_of(current.dz), DZ_CONTEXT)?;
        self.last = *current;
        Ok(())
    }
}

/// Models and last value used to decompress a sequence of wave packets
struct WavePacketDecompressionContext {
    last: WavePacket,
    last_offset_diff: i32,
    last_sym_offset_diff: u32,

    packet_index: ArithmeticModel,
    offset_diff: [ArithmeticModel; 4],

    id_offset_diff: IntegerDecompressor,
    id_packet_size: IntegerDecompressor,
    id_return_point: IntegerDecompressor,
    id_xyz: IntegerDecompressor,
}

impl WavePacketDecompressionContext {
    fn new(last: WavePacket) -> Self {
        Self {
            last,
            last_offset_diff: 0,
            last_sym_offset_diff: 0,
            packet_index: ArithmeticModelBuilder::new(256).build(),
            offset_diff: offset_diff_models(),
            id_offset_diff: IntegerDecompressorBuilder::new()
                .bits(32)
                .build_initialized(),
            id_packet_size: IntegerDecompressorBuilder::new()
                .bits(32)
                .build_initialized(),
            id_return_point: IntegerDecompressorBuilder::new()
                .bits(32)
                .build_initialized(),
            id_xyz: IntegerDecompressorBuilder::new()
                .bits(32)
                .contexts(3)
                .build_initialized(),
        }
    }

    fn decompress_with<R: Read>(
        &mut self,
        decoder: &mut ArithmeticDecoder<R>,
    ) -> std::io::Result<WavePacket> {
        let last = self.last;
        let descriptor_index = decoder.decode_symbol(&mut self.packet_index)? as u8;

        self.last_sym_offset_diff =
            decoder.decode_symbol(&mut self.offset_diff[self.last_sym_offset_diff as usize])?;
        let offset = match self.last_sym_offset_diff {
            0 => last.offset,
            1 => last.offset.wrapping_add(u64::from(last.size)),
            2 => {
                self.last_offset_diff =
                    self.id_offset_diff
                        .decompress(decoder, self.last_offset_diff, 0)?;
                last.offset.wrapping_add(self.last_offset_diff as i64 as u64)
            }
            _ => decoder.read_int64()?,
        };

        let size = self
            .id_packet_size
            .decompress(decoder, last.size as i32, 0)? as u32;
        let return_point =
            from_bits(self
                .id_return_point
                .decompress(decoder, bits_of(last.return_point), 0)?);
        let dx = from_bits(self.id_xyz.decompress(decoder, bits_of(last.dx), DX_CONTEXT)?);
        let dy = from_bits(self.id_xyz.decompress(decoder, bits_of(last.dy), DY_CONTEXT)?);
        let dz = from_bits(self.id_xyz.decompress(decoder, bits_of(last.dz), DZ_CONTEXT)?);

        self.last = WavePacket {
            descriptor_index,
            offset,
            size,
            return_point,
            dx,
            dy,
            dz,
        };
        Ok(self.last)
    }
}

pub mod v1 {
    //! Point-wise coding, used by the point formats 4 and 5.
    use std::io::{Read, Write};

    use crate::decoders::ArithmeticDecoder;
    use crate::encoders::ArithmeticEncoder;
    use crate::packers::Packable;
    use crate::record::{FieldCompressor, FieldDecompressor};

    use super::{WavePacket, WavePacketCompressionContext, WavePacketDecompressionContext};

    pub struct WavePacketCompressor {
        context: WavePacketCompressionContext,
    }

    impl Default for WavePacketCompressor {
        fn default() -> Self {
            Self {
                context: WavePacketCompressionContext::new(WavePacket::default()),
            }
        }
    }

    impl<W: Write> FieldCompressor<W> for WavePacketCompressor {
        fn size_of_field(&self) -> usize {
            WavePacket::SIZE
        }

        fn compress_first(&mut self, dst: &mut W, buf: &[u8]) -> std::io::Result<()> {
            self.context.last = WavePacket::unpack_from(buf);
            dst.write_all(&buf[..WavePacket::SIZE])
        }

        fn compress_with(
            &mut self,
            encoder: &mut ArithmeticEncoder<W>,
            buf: &[u8],
        ) -> std::io::Result<()> {
            self.context
                .compress_with(encoder, &WavePacket::unpack_from(buf))
        }
    }

    pub struct WavePacketDecompressor {
        context: WavePacketDecompressionContext,
    }

    impl Default for WavePacketDecompressor {
        fn default() -> Self {
            Self {
                context: WavePacketDecompressionContext::new(WavePacket::default()),
            }
        }
    }

    impl<R: Read> FieldDecompressor<R> for WavePacketDecompressor {
        fn size_of_field(&self) -> usize {
            WavePacket::SIZE
        }

        fn decompress_first(&mut self, src: &mut R, first_point: &mut [u8]) -> std::io::Result<()> {
            src.read_exact(&mut first_point[..WavePacket::SIZE])?;
            self.context.last = WavePacket::unpack_from(first_point);
            Ok(())
        }

        fn decompress_with(
            &mut self,
            decoder: &mut ArithmeticDecoder<R>,
            buf: &mut [u8],
        ) -> std::io::Result<()> {
            self.context.decompress_with(decoder)?.pack_into(buf);
            Ok(())
        }
    }
}

pub mod v3 {
    //! Layered coding, used by the point formats 9 and 10.
    //!
    //! Each scanner channel has its own models and last wave packet.
    use std::io::{Cursor, Read, Write};

    use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

    use crate::decoders::ArithmeticDecoder;
    use crate::encoders::ArithmeticEncoder;
    use crate::las::utils::{copy_bytes_into_decoder, copy_encoder_content_to, layer_size};
    use crate::packers::Packable;
    use crate::record::{LayeredFieldCompressor, LayeredFieldDecompressor};

    use super::{WavePacket, WavePacketCompressionContext, WavePacketDecompressionContext};

    const NUM_CONTEXTS: usize = 4;

    pub struct WavePacketCompressor {
        encoder: ArithmeticEncoder<Cursor<Vec<u8>>>,
        has_changed: bool,
        contexts: Vec<Option<WavePacketCompressionContext>>,
        current_context: usize,
    }

    impl Default for WavePacketCompressor {
        fn default() -> Self {
            Self {
                encoder: ArithmeticEncoder::new(Cursor::new(Vec::<u8>::new())),
                has_changed: false,
                contexts: (0..NUM_CONTEXTS).map(|_| None).collect(),
                current_context: 0,
            }
        }
    }

    impl<W: Write> LayeredFieldCompressor<W> for WavePacketCompressor {
        fn size_of_field(&self) -> usize {
            WavePacket::SIZE
        }

        fn init_first_point(
            &mut self,
            dst: &mut W,
            first_point: &[u8],
            context: &mut usize,
        ) -> std::io::Result<()> {
            self.contexts = (0..NUM_CONTEXTS).map(|_| None).collect();
            self.contexts[*context] = Some(WavePacketCompressionContext::new(
                WavePacket::unpack_from(first_point),
            ));
            self.current_context = *context;
            dst.write_all(&first_point[..WavePacket::SIZE])
        }

        fn compress_field_with(
            &mut self,
            current_point: &[u8],
            context: &mut usize,
        ) -> std::io::Result<()> {
            let last = self.contexts[self.current_context]
                .as_ref()
                .map(|c| c.last)
                .unwrap_or_default();
            self.current_context = *context;
            let the_context = self.contexts[*context]
                .get_or_insert_with(|| WavePacketCompressionContext::new(last));

            let mut last_bytes = [0u8; WavePacket::SIZE];
            the_context.last.pack_into(&mut last_bytes);
            if last_bytes[..] != current_point[..WavePacket::SIZE] {
                self.has_changed = true;
            }
            the_context.compress_with(&mut self.encoder, &WavePacket::unpack_from(current_point))
        }

        fn write_layers_sizes(&mut self, dst: &mut W) -> std::io::Result<()> {
            self.encoder.done()?;
            dst.write_u32::<LittleEndian>(layer_size(self.has_changed, &self.encoder))
        }

        fn write_layers(&mut self, dst: &mut W) -> std::io::Result<()> {
            if self.has_changed {
                copy_encoder_content_to(&self.encoder, dst)?;
            }
            Ok(())
        }
    }

    pub struct WavePacketDecompressor {
        decoder: ArithmeticDecoder<Cursor<Vec<u8>>>,
        has_changed: bool,
        layer_size: u32,
        contexts: Vec<Option<WavePacketDecompressionContext>>,
        current_context: usize,
    }

    impl Default for WavePacketDecompressor {
        fn default() -> Self {
            Self {
                decoder: ArithmeticDecoder::new(Cursor::new(Vec::<u8>::new())),
                has_changed: false,
                layer_size: 0,
                contexts: (0..NUM_CONTEXTS).map(|_| None).collect(),
                current_context: 0,
            }
        }
    }

    impl<R: Read> LayeredFieldDecompressor<R> for WavePacketDecompressor {
        fn size_of_field(&self) -> usize {
            WavePacket::SIZE
        }

        fn init_first_point(
            &mut self,
            src: &mut R,
            first_point: &mut [u8],
            context: &mut usize,
        ) -> std::io::Result<()> {
            src.read_exact(&mut first_point[..WavePacket::SIZE])?;
            self.contexts = (0..NUM_CONTEXTS).map(|_| None).collect();
            self.contexts[*context] = Some(WavePacketDecompressionContext::new(
                WavePacket::unpack_from(first_point),
            ));
            self.current_context = *context;
            Ok(())
        }

        fn decompress_field_with(
            &mut self,
            current_point: &mut [u8],
            context: &mut usize,
        ) -> std::io::Result<()> {
            let last = self.contexts[self.current_context]
                .as_ref()
                .map(|c| c.last)
                .unwrap_or_default();
            self.current_context = *context;
            let the_context = self.contexts[*context]
                .get_or_insert_with(|| WavePacketDecompressionContext::new(last));

            if self.has_changed {
                the_context.decompress_with(&mut self.decoder)?;
            }
            the_context.last.pack_into(current_point);
            Ok(())
        }

        fn read_layers_sizes(&mut self, src: &mut R) -> std::io::Result<()> {
            self.layer_size = src.read_u32::<LittleEndian>()?;
            Ok(())
        }

        fn read_layers(&mut self, src: &mut R) -> std::io::Result<()> {
            self.has_changed =
                copy_bytes_into_decoder(self.layer_size as usize, &mut self.decoder, src)?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use super::*;
    use crate::record::{
        FieldCompressor, FieldDecompressor, LayeredFieldCompressor, LayeredFieldDecompressor,
    };

    fn make_wave_packets() -> Vec<WavePacket> {
        let mut offset = 1024u64;
        (0..300u32)
            .map(|i| {
                let size = 256 + (i % 3) * 16;
                // contiguous, repeated, jumping and far away offsets
                offset = match i % 7 {
                    0 => offset,
                    1 => offset.wrapping_add(u64::from(size)) + 3,
                    2 => offset + (1u64 << 40),
                    _ => offset + u64::from(size),
                };
                WavePacket {
                    descriptor_index: (i % 3) as u8,
                    offset,
                    size,
                    return_point: i as f32 * 0.5,
                    dx: -0.25,
                    dy: 0.125 * (i % 4) as f32,
                    dz: 1.0e-3,
                }
            })
            .collect()
    }

    #[test]
    fn test_wave_packet_v1_round_trip() {
        let packets = make_wave_packets();
        let mut buf = [0u8; WavePacket::SIZE];
        let mut compressor = v1::WavePacketCompressor::default();
        let mut encoder = ArithmeticEncoder::new(Cursor::new(Vec::<u8>::new()));
        packets[0].pack_into(&mut buf);
        compressor.compress_first(encoder.out_stream(), &buf).unwrap();
        for packet in &packets[1..] {
            packet.pack_into(&mut buf);
            compressor.compress_with(&mut encoder, &buf).unwrap();
        }
        encoder.done().unwrap();

        let data = encoder.into_stream().into_inner();
        let mut decompressor = v1::WavePacketDecompressor::default();
        let mut decoder = ArithmeticDecoder::new(Cursor::new(data));
        decompressor
            .decompress_first(decoder.in_stream(), &mut buf)
            .unwrap();
        assert_eq!(WavePacket::unpack_from(&buf), packets[0]);
        decoder.read_init_bytes().unwrap();
        for packet in &packets[1..] {
            decompressor.decompress_with(&mut decoder, &mut buf).unwrap();
            assert_eq!(&WavePacket::unpack_from(&buf), packet);
        }
    }

    #[test]
    fn test_wave_packet_v3_round_trip_across_channels() {
        let packets = make_wave_packets();
        let channel_of = |i: usize| (i / 20) % 4;
        let mut buf = [0u8; WavePacket::SIZE];
        let mut out = Cursor::new(Vec::<u8>::new());
        let mut compressor = v3::WavePacketCompressor::default();
        let mut context = channel_of(0);
        packets[0].pack_into(&mut buf);
        compressor
            .init_first_point(&mut out, &buf, &mut context)
            .unwrap();
        for (i, packet) in packets.iter().enumerate().skip(1) {
            let mut context = channel_of(i);
            packet.pack_into(&mut buf);
            LayeredFieldCompressor::<Cursor<Vec<u8>>>::compress_field_with(
                &mut compressor,
                &buf,
                &mut context,
            )
            .unwrap();
        }
        compressor.write_layers_sizes(&mut out).unwrap();
        compressor.write_layers(&mut out).unwrap();

        let mut src = Cursor::new(out.into_inner());
        let mut decompressor = v3::WavePacketDecompressor::default();
        let mut context = channel_of(0);
        decompressor
            .init_first_point(&mut src, &mut buf, &mut context)
            .unwrap();
        decompressor.read_layers_sizes(&mut src).unwrap();
        decompressor.read_layers(&mut src).unwrap();
        for (i, packet) in packets.iter().enumerate().skip(1) {
            let mut context = channel_of(i);
            LayeredFieldDecompressor::<Cursor<Vec<u8>>>::decompress_field_with(
                &mut decompressor,
                &mut buf,
                &mut context,
            )
            .unwrap();
            assert_eq!(&WavePacket::unpack_from(&buf), packet);
        }
    }
}
