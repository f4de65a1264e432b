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

//! Opaque bytes at the end of a record.

pub mod v2 {
    //! Each byte is coded as the difference to the same byte of
    //! the previous record, with one model per byte position.
    use std::io::{Read, Write};

    use crate::decoders::ArithmeticDecoder;
    use crate::encoders::ArithmeticEncoder;
    use crate::models::{models_of, ArithmeticModel};
    use crate::record::{FieldCompressor, FieldDecompressor};

    pub struct ExtraBytesCompressor {
        last_bytes: Vec<u8>,
        models: Vec<ArithmeticModel>,
    }

    impl ExtraBytesCompressor {
        pub fn new(count: usize) -> Self {
            Self {
                last_bytes: vec![0u8; count],
                models: models_of(count, 256),
            }
        }
    }

    impl<W: Write> FieldCompressor<W> for ExtraBytesCompressor {
        fn size_of_field(&self) -> usize {
            self.last_bytes.len()
        }

        fn compress_first(&mut self, dst: &mut W, buf: &[u8]) -> std::io::Result<()> {
            let count = self.last_bytes.len();
            self.last_bytes.copy_from_slice(&buf[..count]);
            dst.write_all(&buf[..count])
        }

        fn compress_with(
            &mut self,
            encoder: &mut ArithmeticEncoder<W>,
            buf: &[u8],
        ) -> std::io::Result<()> {
            for ((last, current), model) in self
                .last_bytes
                .iter_mut()
                .zip(buf.iter())
                .zip(self.models.iter_mut())
            {
                encoder.encode_symbol(model, u32::from(current.wrapping_sub(*last)))?;
                *last = *current;
            }
            Ok(())
        }
    }

    pub struct ExtraBytesDecompressor {
        last_bytes: Vec<u8>,
        models: Vec<ArithmeticModel>,
    }

    impl ExtraBytesDecompressor {
        pub fn new(count: usize) -> Self {
            Self {
                last_bytes: vec![0u8; count],
                models: models_of(count, 256),
            }
        }
    }

    impl<R: Read> FieldDecompressor<R> for ExtraBytesDecompressor {
        fn size_of_field(&self) -> usize {
            self.last_bytes.len()
        }

        fn decompress_first(&mut self, src: &mut R, first_point: &mut [u8]) -> std::io::Result<()> {
            let count = self.last_bytes.len();
            src.read_exact(&mut first_point[..count])?;
            self.last_bytes.copy_from_slice(&first_point[..count]);
            Ok(())
        }

        fn decompress_with(
            &mut self,
            decoder: &mut ArithmeticDecoder<R>,
            buf: &mut [u8],
        ) -> std::io::Result<()> {
            for ((last, out), model) in self
                .last_bytes
                .iter_mut()
                .zip(buf.iter_mut())
                .zip(self.models.iter_mut())
            {
                let diff = decoder.decode_symbol(model)? as u8;
                *last = last.wrapping_add(diff);
                *out = *last;
            }
            Ok(())
        }
    }

}

pub mod v3 {
    //! Each byte has its own layer, models are kept per scanner channel.
    use std::io::{Cursor, Read, Write};

    use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

    use crate::decoders::ArithmeticDecoder;
    use crate::encoders::ArithmeticEncoder;
    use crate::las::utils::{
        copy_bytes_into_decoder, copy_encoder_content_to, layer_size, switch_context,
    };
    use crate::models::{models_of, ArithmeticModel};
    use crate::record::{LayeredFieldCompressor, LayeredFieldDecompressor};

    const NUM_CONTEXTS: usize = 4;

    pub struct ExtraBytesCompressor {
        encoders: Vec<ArithmeticEncoder<Cursor<Vec<u8>>>>,
        has_byte_changed: Vec<bool>,
        contexts: Vec<Option<Vec<ArithmeticModel>>>,
        last_bytes: Vec<Vec<u8>>,
        last_context_used: usize,
        count: usize,
    }

    impl ExtraBytesCompressor {
        pub fn new(count: usize) -> Self {
            Self {
                encoders: (0..count)
                    .map(|_| ArithmeticEncoder::new(Cursor::new(Vec::<u8>::new())))
                    .collect(),
                has_byte_changed: vec![false; count],
                contexts: (0..NUM_CONTEXTS).map(|_| None).collect(),
                last_bytes: vec![vec![0u8; count]; NUM_CONTEXTS],
                last_context_used: 0,
                count,
            }
        }
    }

    impl<W: Write> LayeredFieldCompressor<W> for ExtraBytesCompressor {
        fn size_of_field(&self) -> usize {
            self.count
        }

        fn init_first_point(
            &mut self,
            dst: &mut W,
            first_point: &[u8],
            context: &mut usize,
        ) -> std::io::Result<()> {
            let count = self.count;
            self.contexts = (0..NUM_CONTEXTS).map(|_| None).collect();
            self.contexts[*context] = Some(models_of(count, 256));
            self.last_bytes[*context].copy_from_slice(&first_point[..count]);
            self.last_context_used = *context;
            dst.write_all(&first_point[..count])
        }

        fn compress_field_with(
            &mut self,
            current_point: &[u8],
            context: &mut usize,
        ) -> std::io::Result<()> {
            let count = self.count;
            let last_index = switch_context(
                &mut self.contexts,
                &mut self.last_bytes,
                &mut self.last_context_used,
                *context,
                || models_of(count, 256),
            );
            let models = self.contexts[*context].get_or_insert_with(|| models_of(count, 256));
            let last = &mut self.last_bytes[last_index];
            for i in 0..count {
                let current = current_point[i];
                let diff = current.wrapping_sub(last[i]);
                self.encoders[i].encode_symbol(&mut models[i], u32::from(diff))?;
                if diff != 0 {
                    self.has_byte_changed[i] = true;
                    last[i] = current;
                }
            }
            Ok(())
        }

        fn write_layers_sizes(&mut self, dst: &mut W) -> std::io::Result<()> {
            for (encoder, changed) in self.encoders.iter_mut().zip(&self.has_byte_changed) {
                encoder.done()?;
                dst.write_u32::<LittleEndian>(layer_size(*changed, encoder))?;
            }
            Ok(())
        }

        fn write_layers(&mut self, dst: &mut W) -> std::io::Result<()> {
            for (encoder, changed) in self.encoders.iter().zip(&self.has_byte_changed) {
                if *changed {
                    copy_encoder_content_to(encoder, dst)?;
                }
            }
            Ok(())
        }
    }

    pub struct ExtraBytesDecompressor {
        decoders: Vec<ArithmeticDecoder<Cursor<Vec<u8>>>>,
        has_byte_changed: Vec<bool>,
        layers_sizes: Vec<u32>,
        contexts: Vec<Option<Vec<ArithmeticModel>>>,
        last_bytes: Vec<Vec<u8>>,
        last_context_used: usize,
        count: usize,
    }

    impl ExtraBytesDecompressor {
        pub fn new(count: usize) -> Self {
            Self {
                decoders: (0..count)
                    .map(|_| ArithmeticDecoder::new(Cursor::new(Vec::<u8>::new())))
                    .collect(),
                has_byte_changed: vec![false; count],
                layers_sizes: vec![0; count],
                contexts: (0..NUM_CONTEXTS).map(|_| None).collect(),
                last_bytes: vec![vec![0u8; count]; NUM_CONTEXTS],
                last_context_used: 0,
                count,
            }
        }
    }

    impl<R: Read> LayeredFieldDecompressor<R> for ExtraBytesDecompressor {
        fn size_of_field(&self) -> usize {
            self.count
        }

        fn init_first_point(
            &mut self,
            src: &mut R,
            first_point: &mut [u8],
            context: &mut usize,
        ) -> std::io::Result<()> {
            let count = self.count;
            src.read_exact(&mut first_point[..count])?;
            self.contexts = (0..NUM_CONTEXTS).map(|_| None).collect();
            self.contexts[*context] = Some(models_of(count, 256));
            self.last_bytes[*context].copy_from_slice(&first_point[..count]);
            self.last_context_used = *context;
            Ok(())
        }

        fn decompress_field_with(
            &mut self,
            current_point: &mut [u8],
            context: &mut usize,
        ) -> std::io::Result<()> {
            let count = self.count;
            let last_index = switch_context(
                &mut self.contexts,
                &mut self.last_bytes,
                &mut self.last_context_used,
                *context,
                || models_of(count, 256),
            );
            let models = self.contexts[*context].get_or_insert_with(|| models_of(count, 256));
            let last = &mut self.last_bytes[last_index];
            for i in 0..count {
                if self.has_byte_changed[i] {
                    let diff = self.decoders[i].decode_symbol(&mut models[i])? as u8;
                    last[i] = last[i].wrapping_add(diff);
                }
            }
            current_point[..count].copy_from_slice(last);
            Ok(())
        }

        fn read_layers_sizes(&mut self, src: &mut R) -> std::io::Result<()> {
            for size in &mut self.layers_sizes {
                *size = src.read_u32::<LittleEndian>()?;
            }
            Ok(())
        }

        fn read_layers(&mut self, src: &mut R) -> std::io::Result<()> {
            for i in 0..self.count {
                self.has_byte_changed[i] = copy_bytes_into_decoder(
                    self.layers_sizes[i] as usize,
                    &mut self.decoders[i],
                    src,
                )?;
            }
            Ok(())
        }
    }

    #[cfg(test)]
    mod test {
        use super::*;

        #[test]
        fn test_extra_bytes_v3_round_trip() {
            // byte 1 never changes and gets an empty layer
            let records: Vec<(usize, Vec<u8>)> = (0..300u32)
                .map(|i| ((i / 30 % 4) as usize, vec![i as u8, 7, (i * 31 % 256) as u8]))
                .collect();

            let mut out = Cursor::new(Vec::<u8>::new());
            let mut compressor = ExtraBytesCompressor::new(3);
            let mut context = records[0].0;
            compressor
                .init_first_point(&mut out, &records[0].1, &mut context)
                .unwrap();
            for (channel, record) in &records[1..] {
                let mut context = *channel;
                LayeredFieldCompressor::<Cursor<Vec<u8>>>::compress_field_with(
                    &mut compressor,
                    record,
                    &mut context,
                )
                .unwrap();
            }
            compressor.write_layers_sizes(&mut out).unwrap();
            compressor.write_layers(&mut out).unwrap();
            let data = out.into_inner();
            assert_eq!(&data[7..11], &[0u8, 0, 0, 0]);

            let mut src = Cursor::new(data);
            let mut decompressor = ExtraBytesDecompressor::new(3);
            let mut buf = [0u8; 3];
            let mut context = records[0].0;
            decompressor
                .init_first_point(&mut src, &mut buf, &mut context)
                .unwrap();
            decompressor.read_layers_sizes(&mut src).unwrap();
            decompressor.read_layers(&mut src).unwrap();
            for (channel, record) in &records[1..] {
                let mut context = *channel;
                LayeredFieldDecompressor::<Cursor<Vec<u8>>>::decompress_field_with(
                    &mut decompressor,
                    &mut buf,
                    &mut context,
                )
                .unwrap();
                assert_eq!(&buf[..], &record[..]);
            }
        }
    }
}
