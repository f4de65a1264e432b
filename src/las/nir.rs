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

//! The near infrared channel of the LAS point formats 8 and 10.
//!
//! It follows the red, green, blue of the same item and has its own layer.

pub const NIR_SIZE: usize = 2;

pub mod v3 {
    use std::io::{Cursor, Read, Write};

    use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

    use crate::decoders::ArithmeticDecoder;
    use crate::encoders::ArithmeticEncoder;
    use crate::las::utils::{
        copy_bytes_into_decoder, copy_encoder_content_to, layer_size, lower_byte, switch_context,
        upper_byte,
    };
    use crate::models::{ArithmeticModel, ArithmeticModelBuilder};
    use crate::packers::Packable;
    use crate::record::{LayeredFieldCompressor, LayeredFieldDecompressor};

    use super::NIR_SIZE;

    struct NirModels {
        bytes_used: ArithmeticModel,
        diff_0: ArithmeticModel,
        diff_1: ArithmeticModel,
    }

    impl Default for NirModels {
        fn default() -> Self {
            Self {
                bytes_used: ArithmeticModelBuilder::new(4).build(),
                diff_0: ArithmeticModelBuilder::new(256).build(),
                diff_1: ArithmeticModelBuilder::new(256).build(),
            }
        }
    }

    pub struct NirCompressor {
        encoder: ArithmeticEncoder<Cursor<Vec<u8>>>,
        has_changed: bool,
        contexts: [Option<NirModels>; 4],
        last_nirs: [u16; 4],
        last_context_used: usize,
    }

    impl Default for NirCompressor {
        fn default() -> Self {
            Self {
                encoder: ArithmeticEncoder::new(Cursor::new(Vec::<u8>::new())),
                has_changed: false,
                contexts: [None, None, None, None],
                last_nirs: [0; 4],
                last_context_used: 0,
            }
        }
    }

    impl<W: Write> LayeredFieldCompressor<W> for NirCompressor {
        fn size_of_field(&self) -> usize {
            NIR_SIZE
        }

        fn init_first_point(
            &mut self,
            dst: &mut W,
            first_point: &[u8],
            context: &mut usize,
        ) -> std::io::Result<()> {
            self.contexts = [None, None, None, None];
            self.contexts[*context] = Some(NirModels::default());
            self.last_nirs[*context] = u16::unpack_from(first_point);
            self.last_context_used = *context;
            dst.write_all(&first_point[..NIR_SIZE])
        }

        fn compress_field_with(
            &mut self,
            current_point: &[u8],
            context: &mut usize,
        ) -> std::io::Result<()> {
            let current = u16::unpack_from(current_point);
            let last_index = switch_context(
                &mut self.contexts,
                &mut self.last_nirs,
                &mut self.last_context_used,
                *context,
                NirModels::default,
            );
            let last = &mut self.last_nirs[last_index];
            let models = self.contexts[*context].get_or_insert_with(NirModels::default);

            let lower_changed = lower_byte(*last) != lower_byte(current);
            let upper_changed = upper_byte(*last) != upper_byte(current);
            let sym = lower_changed as u32 | (upper_changed as u32) << 1;
            self.encoder.encode_symbol(&mut models.bytes_used, sym)?;
            if lower_changed {
                let diff = lower_byte(current).wrapping_sub(lower_byte(*last));
                self.encoder
                    .encode_symbol(&mut models.diff_0, u32::from(diff))?;
            }
            if upper_changed {
                let diff = upper_byte(current).wrapping_sub(upper_byte(*last));
                self.encoder
                    .encode_symbol(&mut models.diff_1, u32::from(diff))?;
            }
            self.has_changed |= sym != 0;
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

    pub struct NirDecompressor {
        decoder: ArithmeticDecoder<Cursor<Vec<u8>>>,
        has_changed: bool,
        layer_size: u32,
        contexts: [Option<NirModels>; 4],
        last_nirs: [u16; 4],
        last_context_used: usize,
    }

    impl Default for NirDecompressor {
        fn default() -> Self {
            Self {
                decoder: ArithmeticDecoder::new(Cursor::new(Vec::<u8>::new())),
                has_changed: false,
                layer_size: 0,
                contexts: [None, None, None, None],
                last_nirs: [0; 4],
                last_context_used: 0,
            }
        }
    }

    impl<R: Read> LayeredFieldDecompressor<R> for NirDecompressor {
        fn size_of_field(&self) -> usize {
            NIR_SIZE
        }

        fn init_first_point(
            &mut self,
            src: &mut R,
            first_point: &mut [u8],
            context: &mut usize,
        ) -> std::io::Result<()> {
            src.read_exact(&mut first_point[..NIR_SIZE])?;
            self.contexts = [None, None, None, None];
            self.contexts[*context] = Some(NirModels::default());
            self.last_nirs[*context] = u16::unpack_from(first_point);
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
                &mut self.last_nirs,
                &mut self.last_context_used,
                *context,
                NirModels::default,
            );
            let last = &mut self.last_nirs[last_index];
            if self.has_changed {
                let models = self.contexts[*context].get_or_insert_with(NirModels::default);
                let sym = self.decoder.decode_symbol(&mut models.bytes_used)?;
                let mut lower = lower_byte(*last);
                let mut upper = upper_byte(*last);
                if sym & 1 != 0 {
                    let diff = self.decoder.decode_symbol(&mut models.diff_0)? as u8;
                    lower = lower.wrapping_add(diff);
                }
                if sym & 2 != 0 {
                    let diff = self.decoder.decode_symbol(&mut models.diff_1)? as u8;
                    upper = upper.wrapping_add(diff);
                }
                *last = u16::from(lower) | u16::from(upper) << 8;
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

}
