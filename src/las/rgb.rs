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

//! The red, green, blue colors of the LAS point formats 2 and 3.

use crate::las::utils::{lower_byte, upper_byte};
use crate::packers::Packable;

#[derive(Default, Copy, Clone, Debug, PartialEq, Eq)]
pub struct RGB {
    pub red: u16,
    pub green: u16,
    pub blue: u16,
}

impl RGB {
    fn is_grey(&self) -> bool {
        self.red == self.green && self.red == self.blue
    }
}

impl Packable for RGB {
    const SIZE: usize = 6;

    fn unpack_from(input: &[u8]) -> Self {
        Self {
            red: u16::unpack_from(&input[0..2]),
            green: u16::unpack_from(&input[2..4]),
            blue: u16::unpack_from(&input[4..6]),
        }
    }

    fn pack_into(&self, output: &mut [u8]) {
        self.red.pack_into(&mut output[0..2]);
        self.green.pack_into(&mut output[2..4]);
        self.blue.pack_into(&mut output[4..6]);
    }
}

/// Bits 0 to 5 tell which bytes changed (red low, red high, green low ...),
/// bit 6 is set when the color is not a grey.
struct ColorDiff(u8);

impl ColorDiff {
    fn from_points(current: &RGB, last: &RGB) -> Self {
        let byte_changed = |a: u16, b: u16| {
            (lower_byte(a) != lower_byte(b)) as u8 | ((upper_byte(a) != upper_byte(b)) as u8) << 1
        };
        ColorDiff(
            byte_changed(last.red, current.red)
                | byte_changed(last.green, current.green) << 2
                | byte_changed(last.blue, current.blue) << 4
                | (!current.is_grey() as u8) << 6,
        )
    }

    fn is_set(&self, bit: u8) -> bool {
        self.0 & (1 << bit) != 0
    }

    fn lower_red_byte_changed(&self) -> bool {
        self.is_set(0)
    }

    fn upper_red_byte_changed(&self) -> bool {
        self.is_set(1)
    }

    fn lower_green_byte_changed(&self) -> bool {
        self.is_set(2)
    }

    fn upper_green_byte_changed(&self) -> bool {
        self.is_set(3)
    }

    fn lower_blue_byte_changed(&self) -> bool {
        self.is_set(4)
    }

    fn upper_blue_byte_changed(&self) -> bool {
        self.is_set(5)
    }

    fn has_color(&self) -> bool {
        self.is_set(6)
    }
}

pub mod v2 {
    use std::io::{Read, Write};

    use crate::decoders::ArithmeticDecoder;
    use crate::encoders::ArithmeticEncoder;
    use crate::las::utils::{lower_byte, u8_clamp, upper_byte};
    use crate::models::{ArithmeticModel, ArithmeticModelBuilder};
    use crate::packers::Packable;
    use crate::record::{FieldCompressor, FieldDecompressor};

    use super::{ColorDiff, RGB};

    pub(crate) struct RGBModels {
        byte_used: ArithmeticModel,
        lower_red_byte: ArithmeticModel,
        upper_red_byte: ArithmeticModel,
        lower_green_byte: ArithmeticModel,
        upper_green_byte: ArithmeticModel,
        lower_blue_byte: ArithmeticModel,
        upper_blue_byte: ArithmeticModel,
    }

    impl Default for RGBModels {
        fn default() -> Self {
            Self {
                byte_used: ArithmeticModelBuilder::new(128).build(),
                lower_red_byte: ArithmeticModelBuilder::new(256).build(),
                upper_red_byte: ArithmeticModelBuilder::new(256).build(),
                lower_green_byte: ArithmeticModelBuilder::new(256).build(),
                upper_green_byte: ArithmeticModelBuilder::new(256).build(),
                lower_blue_byte: ArithmeticModelBuilder::new(256).build(),
                upper_blue_byte: ArithmeticModelBuilder::new(256).build(),
            }
        }
    }

    /// The byte value predicted from the last one and the red/green delta
    fn predict(delta: i32, last: u8) -> u8 {
        u8_clamp(delta + i32::from(last))
    }

    fn encode_byte<W: Write>(
        encoder: &mut ArithmeticEncoder<W>,
        model: &mut ArithmeticModel,
        current: u8,
        predicted: u8,
    ) -> std::io::Result<()> {
        encoder.encode_symbol(model, u32::from(current.wrapping_sub(predicted)))
    }

    fn decode_byte<R: Read>(
        decoder: &mut ArithmeticDecoder<R>,
        model: &mut ArithmeticModel,
        predicted: u8,
    ) -> std::io::Result<u8> {
        Ok((decoder.decode_symbol(model)? as u8).wrapping_add(predicted))
    }

    /// Codes `current` against `last` with the given models
    pub(crate) fn compress_rgb_using<W: Write>(
        encoder: &mut ArithmeticEncoder<W>,
        models: &mut RGBModels,
        current: &RGB,
        last: &RGB,
    ) -> std::io::Result<()> {
        let color_diff = ColorDiff::from_points(current, last);
        encoder.encode_symbol(&mut models.byte_used, u32::from(color_diff.0))?;

        let mut diff_l = 0i32;
        let mut diff_h = 0i32;
        if color_diff.lower_red_byte_changed() {
            diff_l = i32::from(lower_byte(current.red)) - i32::from(lower_byte(last.red));
            encode_byte(
                encoder,
                &mut models.lower_red_byte,
                lower_byte(current.red),
                lower_byte(last.red),
            )?;
        }
        if color_diff.upper_red_byte_changed() {
            diff_h = i32::from(upper_byte(current.red)) - i32::from(upper_byte(last.red));
            encode_byte(
                encoder,
                &mut models.upper_red_byte,
                upper_byte(current.red),
                upper_byte(last.red),
            )?;
        }

        if color_diff.has_color() {
            if color_diff.lower_green_byte_changed() {
                encode_byte(
                    encoder,
                    &mut models.lower_green_byte,
                    lower_byte(current.green),
                    predict(diff_l, lower_byte(last.green)),
                )?;
            }
            if color_diff.lower_blue_byte_changed() {
                diff_l = (diff_l + i32::from(lower_byte(current.green))
                    - i32::from(lower_byte(last.green)))
                    / 2;
                encode_byte(
                    encoder,
                    &mut models.lower_blue_byte,
                    lower_byte(current.blue),
                    predict(diff_l, lower_byte(last.blue)),
                )?;
            }
            if color_diff.upper_green_byte_changed() {
                encode_byte(
                    encoder,
                    &mut models.upper_green_byte,
                    upper_byte(current.green),
                    predict(diff_h, upper_byte(last.green)),
                )?;
            }
            if color_diff.upper_blue_byte_changed() {
                diff_h = (diff_h + i32::from(upper_byte(current.green))
                    - i32::from(upper_byte(last.green)))
                    / 2;
                encode_byte(
                    encoder,
                    &mut models.upper_blue_byte,
                    upper_byte(current.blue),
                    predict(diff_h, upper_byte(last.blue)),
                )?;
            }
        }
        Ok(())
    }

    #[derive(Default)]
    pub struct RGBCompressor {
        last: RGB,
        models: RGBModels,
    }

    impl<W: Write> FieldCompressor<W> for RGBCompressor {
        fn size_of_field(&self) -> usize {
            RGB::SIZE
        }

        fn compress_first(&mut self, dst: &mut W, buf: &[u8]) -> std::io::Result<()> {
            self.last = RGB::unpack_from(buf);
            dst.write_all(&buf[..RGB::SIZE])
        }

        fn compress_with(
            &mut self,
            encoder: &mut ArithmeticEncoder<W>,
            buf: &[u8],
        ) -> std::io::Result<()> {
            let current = RGB::unpack_from(buf);
            compress_rgb_using(encoder, &mut self.models, &current, &self.last)?;
            self.last = current;
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct RGBDecompressor {
        last: RGB,
        models: RGBModels,
    }

    /// Decodes the color following `last` with the given models
    pub(crate) fn decompress_rgb_using<R: Read>(
        decoder: &mut ArithmeticDecoder<R>,
        models: &mut RGBModels,
        last: &RGB,
    ) -> std::io::Result<RGB> {
        let color_diff = ColorDiff(decoder.decode_symbol(&mut models.byte_used)? as u8);

        let mut lower = lower_byte(last.red);
        let mut upper = upper_byte(last.red);
        if color_diff.lower_red_byte_changed() {
            lower = decode_byte(decoder, &mut models.lower_red_byte, lower)?;
        }
        if color_diff.upper_red_byte_changed() {
            upper = decode_byte(decoder, &mut models.upper_red_byte, upper)?;
        }
        let red = u16::from(lower) | u16::from(upper) << 8;

        if !color_diff.has_color() {
            return Ok(RGB {
                red,
                green: red,
                blue: red,
            });
        }

        let mut diff = i32::from(lower_byte(red)) - i32::from(lower_byte(last.red));
        let mut green_lower = lower_byte(last.green);
        if color_diff.lower_green_byte_changed() {
            green_lower = decode_byte(
                decoder,
                &mut models.lower_green_byte,
                predict(diff, lower_byte(last.green)),
            )?;
        }
        let mut blue_lower = lower_byte(last.blue);
        if color_diff.lower_blue_byte_changed() {
            diff = (diff + i32::from(green_lower) - i32::from(lower_byte(last.green))) / 2;
            blue_lower = decode_byte(
                decoder,
                &mut models.lower_blue_byte,
                predict(diff, lower_byte(last.blue)),
            )?;
        }

        let mut diff = i32::from(upper_byte(red)) - i32::from(upper_byte(last.red));
        let mut green_upper = upper_byte(last.green);
        if color_diff.upper_green_byte_changed() {
            green_upper = decode_byte(
                decoder,
                &mut models.upper_green_byte,
                predict(diff, upper_byte(last.green)),
            )?;
        }
        let mut blue_upper = upper_byte(last.blue);
        if color_diff.upper_blue_byte_changed() {
            diff = (diff + i32::from(green_upper) - i32::from(upper_byte(last.green))) / 2;
            blue_upper = decode_byte(
                decoder,
                &mut models.upper_blue_byte,
                predict(diff, upper_byte(last.blue)),
            )?;
        }

        Ok(RGB {
            red,
            green: u16::from(green_lower) | u16::from(green_upper) << 8,
            blue: u16::from(blue_lower) | u16::from(blue_upper) << 8,
        })
    }

    impl<R: Read> FieldDecompressor<R> for RGBDecompressor {
        fn size_of_field(&self) -> usize {
            RGB::SIZE
        }

        fn decompress_first(&mut self, src: &mut R, first_point: &mut [u8]) -> std::io::Result<()> {
            src.read_exact(&mut first_point[..RGB::SIZE])?;
            self.last = RGB::unpack_from(first_point);
            Ok(())
        }

        fn decompress_with(
            &mut self,
            decoder: &mut ArithmeticDecoder<R>,
            buf: &mut [u8],
        ) -> std::io::Result<()> {
            self.last = decompress_rgb_using(decoder, &mut self.models, &self.last)?;
            self.last.pack_into(buf);
            Ok(())
        }
    }

    #[cfg(test)]
    mod test {
        use std::io::Cursor;

        use super::*;

        #[test]
        fn test_rgb_v2_round_trip() {
            let mut colors: Vec<RGB> = (0..400u16)
                .map(|i| RGB {
                    red: i.wrapping_mul(611),
                    green: i.wrapping_mul(611).wrapping_add(i % 9),
                    blue: 65535 - i * 3,
                })
                .collect();
            colors.extend((0..50u16).map(|i| RGB {
                red: i * 1000,
                green: i * 1000,
                blue: i * 1000,
            }));

            let mut buf = [0u8; RGB::SIZE];
            let mut compressor = RGBCompressor::default();
            let mut encoder = ArithmeticEncoder::new(Cursor::new(Vec::<u8>::new()));
            colors[0].pack_into(&mut buf);
            compressor.compress_first(encoder.out_stream(), &buf).unwrap();
            for color in &colors[1..] {
                color.pack_into(&mut buf);
                compressor.compress_with(&mut encoder, &buf).unwrap();
            }
            encoder.done().unwrap();

            let data = encoder.into_stream().into_inner();
            let mut decompressor = RGBDecompressor::default();
            let mut decoder = ArithmeticDecoder::new(Cursor::new(data));
            decompressor
                .decompress_first(decoder.in_stream(), &mut buf)
                .unwrap();
            decoder.read_init_bytes().unwrap();
            for color in &colors[1..] {
                decompressor.decompress_with(&mut decoder, &mut buf).unwrap();
                assert_eq!(&RGB::unpack_from(&buf), color);
            }
        }
    }
}

pub mod v3 {
    //! Same coding as the version 2 in its own layer, with one set of
    //! models per scanner channel.
    use std::io::{Cursor, Read, Write};

    use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

    use crate::decoders::ArithmeticDecoder;
    use crate::encoders::ArithmeticEncoder;
    use crate::las::utils::{
        copy_bytes_into_decoder, copy_encoder_content_to, layer_size, switch_context,
    };
    use crate::packers::Packable;
    use crate::record::{LayeredFieldCompressor, LayeredFieldDecompressor};

    use super::v2::{compress_rgb_using, decompress_rgb_using, RGBModels};
    use super::RGB;

    pub struct RGBCompressor {
        encoder: ArithmeticEncoder<Cursor<Vec<u8>>>,
        has_changed: bool,
        contexts: [Option<RGBModels>; 4],
        last_rgbs: [RGB; 4],
        last_context_used: usize,
    }

    impl Default for RGBCompressor {
        fn default() -> Self {
            Self {
                encoder: ArithmeticEncoder::new(Cursor::new(Vec::<u8>::new())),
                has_changed: false,
                contexts: [None, None, None, None],
                last_rgbs: [RGB::default(); 4],
                last_context_used: 0,
            }
        }
    }

    impl<W: Write> LayeredFieldCompressor<W> for RGBCompressor {
        fn size_of_field(&self) -> usize {
            RGB::SIZE
        }

        fn init_first_point(
            &mut self,
            dst: &mut W,
            first_point: &[u8],
            context: &mut usize,
        ) -> std::io::Result<()> {
            self.contexts = [None, None, None, None];
            self.contexts[*context] = Some(RGBModels::default());
            self.last_rgbs[*context] = RGB::unpack_from(first_point);
            self.last_context_used = *context;
            dst.write_all(&first_point[..RGB::SIZE])
        }

        fn compress_field_with(
            &mut self,
            current_point: &[u8],
            context: &mut usize,
        ) -> std::io::Result<()> {
            let current = RGB::unpack_from(current_point);
            let last_index = switch_context(
                &mut self.contexts,
                &mut self.last_rgbs,
                &mut self.last_context_used,
                *context,
                RGBModels::default,
            );
            let last = &mut self.last_rgbs[last_index];
            if *last != current {
                self.has_changed = true;
            }
            let models = self.contexts[*context].get_or_insert_with(RGBModels::default);
            compress_rgb_using(&mut self.encoder, models, &current, last)?;
            *last = current;
            Ok(())
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

    pub struct RGBDecompressor {
        decoder: ArithmeticDecoder<Cursor<Vec<u8>>>,
        has_changed: bool,
        layer_size: u32,
        contexts: [Option<RGBModels>; 4],
        last_rgbs: [RGB; 4],
        last_context_used: usize,
    }

    impl Default for RGBDecompressor {
        fn default() -> Self {
            Self {
                decoder: ArithmeticDecoder::new(Cursor::new(Vec::<u8>::new())),
                has_changed: false,
                layer_size: 0,
                contexts: [None, None, None, None],
                last_rgbs: [RGB::default(); 4],
                last_context_used: 0,
            }
        }
    }

    impl<R: Read> LayeredFieldDecompressor<R> for RGBDecompressor {
        fn size_of_field(&self) -> usize {
            RGB::SIZE
        }

        fn init_first_point(
            &mut self,
            src: &mut R,
            first_point: &mut [u8],
            context: &mut usize,
        ) -> std::io::Result<()> {
            src.read_exact(&mut first_point[..RGB::SIZE])?;
            self.contexts = [None, None, None, None];
            self.contexts[*context] = Some(RGBModels::default());
            self.last_rgbs[*context] = RGB::unpack_from(first_point);
            self.last_context_used = *context;
            Ok(())
        }

        fn decompress_field_with(
            &mut self,
            current_point: &mut [u8],
            context: &mut usize,
        ) -> std::io::Result<()> {
            let last_index = switch_context(
                &mut self.contexts,
                &mut self.last_rgbs,
                &mut self.last_context_used,
                *context,
                RGBModels::default,
            );
            let last = &mut self.last_rgbs[last_index];
            if self.has_changed {
                let models = self.contexts[*context].get_or_insert_with(RGBModels::default);
                *last = decompress_rgb_using(&mut self.decoder, models, last)?;
            }
            last.pack_into(current_point);
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

    #[cfg(test)]
    mod test {
        use super::*;

        fn round_trip(colors: &[(usize, RGB)]) -> Vec<u8> {
            let mut buf = [0u8; RGB::SIZE];
            let mut out = Cursor::new(Vec::<u8>::new());
            let mut compressor = RGBCompressor::default();
            let (mut context, first) = colors[0];
            first.pack_into(&mut buf);
            compressor
                .init_first_point(&mut out, &buf, &mut context)
                .unwrap();
            for (channel, color) in &colors[1..] {
                let mut context = *channel;
                color.pack_into(&mut buf);
                LayeredFieldCompressor::<Cursor<Vec<u8>>>::compress_field_with(
                    &mut compressor,
                    &buf,
                    &mut context,
                )
                .unwrap();
            }
            compressor.write_layers_sizes(&mut out).unwrap();
            compressor.write_layers(&mut out).unwrap();
            let data = out.into_inner();

            let mut src = Cursor::new(data.clone());
            let mut decompressor = RGBDecompressor::default();
            let mut context = colors[0].0;
            decompressor
                .init_first_point(&mut src, &mut buf, &mut context)
                .unwrap();
            assert_eq!(RGB::unpack_from(&buf), colors[0].1);
            decompressor.read_layers_sizes(&mut src).unwrap();
            decompressor.read_layers(&mut src).unwrap();
            for (channel, color) in &colors[1..] {
                let mut context = *channel;
                LayeredFieldDecompressor::<Cursor<Vec<u8>>>::decompress_field_with(
                    &mut decompressor,
                    &mut buf,
                    &mut context,
                )
                .unwrap();
                assert_eq!(&RGB::unpack_from(&buf), color);
            }
            data
        }

        #[test]
        fn test_rgb_v3_round_trip_across_channels() {
            let colors: Vec<(usize, RGB)> = (0..600u16)
                .map(|i| {
                    (
                        usize::from(i / 25 % 4),
                        RGB {
                            red: i.wrapping_mul(97),
                            green: i.wrapping_mul(89),
                            blue: 65535 - i,
                        },
                    )
                })
                .collect();
            round_trip(&colors);
        }

        #[test]
        fn test_constant_color_has_empty_layer() {
            let color = RGB {
                red: 10,
                green: 20,
                blue: 30,
            };
            let colors: Vec<(usize, RGB)> = (0..20).map(|i| (i % 2, color)).collect();
            let data = round_trip(&colors);
            assert_eq!(data.len(), RGB::SIZE + 4);
            assert_eq!(&data[RGB::SIZE..], &[0u8, 0, 0, 0]);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_color_diff_bits() {
        let black = RGB::default();
        let lower_red = RGB {
            red: 1,
            ..RGB::default()
        };
        assert_eq!(ColorDiff::from_points(&black, &lower_red).0, 0b0000_0001);
        assert_eq!(ColorDiff::from_points(&lower_red, &black).0, 0b0100_0001);

        let upper_blue = RGB {
            blue: 256,
            ..RGB::default()
        };
        assert_eq!(ColorDiff::from_points(&black, &upper_blue).0, 0b0010_0000);
        assert_eq!(ColorDiff::from_points(&upper_blue, &black).0, 0b0110_0000);
    }

    #[test]
    fn test_grey_has_no_color_bit() {
        let grey = RGB {
            red: 300,
            green: 300,
            blue: 300,
        };
        let diff = ColorDiff::from_points(&grey, &RGB::default());
        assert!(!diff.has_color());
        assert!(diff.lower_red_byte_changed() && diff.upper_red_byte_changed());
        assert!(diff.lower_green_byte_changed() && diff.upper_blue_byte_changed());
    }
}
