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

//! The 20 bytes core shared by the LAS point formats 0 to 5.

use crate::packers::Packable;

#[derive(Default, Copy, Clone, PartialEq, Eq, Debug)]
pub struct Point10 {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub intensity: u16,
    // return number (3 bits), number of returns (3 bits),
    // scan direction flag (1 bit), edge of flight line (1 bit)
    pub bit_fields: u8,
    pub classification: u8,
    pub scan_angle_rank: i8,
    pub user_data: u8,
    pub point_source_id: u16,
}

impl Point10 {
    pub fn return_number(&self) -> u8 {
        self.bit_fields & 0x7
    }

    pub fn number_of_returns_of_given_pulse(&self) -> u8 {
        (self.bit_fields >> 3) & 0x7
    }

    pub fn scan_direction_flag(&self) -> bool {
        ((self.bit_fields >> 6) & 0x1) != 0
    }

    pub fn edge_of_flight_line(&self) -> bool {
        ((self.bit_fields >> 7) & 0x1) != 0
    }
}

impl Packable for Point10 {
    const SIZE: usize = 20;

    fn unpack_from(input: &[u8]) -> Self {
        Self {
            x: i32::unpack_from(&input[0..4]),
            y: i32::unpack_from(&input[4..8]),
            z: i32::unpack_from(&input[8..12]),
            intensity: u16::unpack_from(&input[12..14]),
            bit_fields: input[14],
            classification: input[15],
            scan_angle_rank: input[16] as i8,
            user_data: input[17],
            point_source_id: u16::unpack_from(&input[18..20]),
        }
    }

    fn pack_into(&self, output: &mut [u8]) {
        self.x.pack_into(&mut output[0..4]);
        self.y.pack_into(&mut output[4..8]);
        self.z.pack_into(&mut output[8..12]);
        self.intensity.pack_into(&mut output[12..14]);
        output[14] = self.bit_fields;
        output[15] = self.classification;
        output[16] = self.scan_angle_rank as u8;
        output[17] = self.user_data;
        self.point_source_id.pack_into(&mut output[18..20]);
    }
}

pub mod v2 {
    use std::io::{Read, Write};

    use crate::compressors::{IntegerCompressor, IntegerCompressorBuilder};
    use crate::decoders::ArithmeticDecoder;
    use crate::decompressors::{IntegerDecompressor, IntegerDecompressorBuilder};
    use crate::encoders::ArithmeticEncoder;
    use crate::las::utils::{self, StreamingMedian};
    use crate::models::{models_of, ArithmeticModel, ArithmeticModelBuilder};
    use crate::packers::Packable;
    use crate::record::{FieldCompressor, FieldDecompressor};

    use super::Point10;

    /// 6 bits telling which of the non coordinate fields changed
    struct ChangedValues(u32);

    impl ChangedValues {
        fn from_points(current: &Point10, last: &Point10, last_intensity: u16) -> Self {
            let value = ((last.bit_fields != current.bit_fields) as u32) << 5
                | ((last_intensity != current.intensity) as u32) << 4
                | ((last.classification != current.classification) as u32) << 3
                | ((last.scan_angle_rank != current.scan_angle_rank) as u32) << 2
                | ((last.user_data != current.user_data) as u32) << 1
                | (last.point_source_id != current.point_source_id) as u32;
            ChangedValues(value)
        }

        fn bit_fields_changed(&self) -> bool {
            utils::is_nth_bit_set(self.0, 5)
        }

        fn intensity_changed(&self) -> bool {
            utils::is_nth_bit_set(self.0, 4)
        }

        fn classification_changed(&self) -> bool {
            utils::is_nth_bit_set(self.0, 3)
        }

        fn scan_angle_rank_changed(&self) -> bool {
            utils::is_nth_bit_set(self.0, 2)
        }

        fn user_data_changed(&self) -> bool {
            utils::is_nth_bit_set(self.0, 1)
        }

        fn point_source_id_changed(&self) -> bool {
            utils::is_nth_bit_set(self.0, 0)
        }
    }

    /// Contexts of a point, derived from its return number `r`
    /// and its number of returns `n`
    #[derive(Copy, Clone)]
    struct ReturnContexts {
        n: u8,
        m: usize,
        l: usize,
    }

    impl ReturnContexts {
        fn of(point: &Point10) -> Self {
            let r = point.return_number() as usize;
            let n = point.number_of_returns_of_given_pulse();
            Self {
                n,
                m: usize::from(utils::NUMBER_RETURN_MAP[n as usize][r]),
                l: usize::from(utils::NUMBER_RETURN_LEVEL[n as usize][r]),
            }
        }

        fn intensity_context(&self) -> u32 {
            if self.m < 3 {
                self.m as u32
            } else {
                3
            }
        }

        fn dx_context(&self) -> u32 {
            (self.n == 1) as u32
        }

        fn dy_context(&self, dx_k: u32) -> u32 {
            self.dx_context() + if dx_k < 20 { utils::u32_zero_bit(dx_k) } else { 20 }
        }

        fn z_context(&self, k: u32) -> u32 {
            self.dx_context() + if k < 18 { utils::u32_zero_bit(k) } else { 18 }
        }
    }

    /// Prediction state and models common to the compressor and decompressor
    struct Common {
        last_intensity: [u16; 16],
        last_x_diff_median: [StreamingMedian<i32>; 16],
        last_y_diff_median: [StreamingMedian<i32>; 16],
        last_height: [i32; 8],

        changed_values: ArithmeticModel,
        scan_angle_rank: Vec<ArithmeticModel>,
        bit_byte: Vec<ArithmeticModel>,
        classification: Vec<ArithmeticModel>,
        user_data: Vec<ArithmeticModel>,
    }

    impl Common {
        fn new() -> Self {
            Self {
                last_intensity: [0u16; 16],
                last_x_diff_median: [StreamingMedian::new(); 16],
                last_y_diff_median: [StreamingMedian::new(); 16],
                last_height: [0i32; 8],
                changed_values: ArithmeticModelBuilder::new(64).build(),
                scan_angle_rank: models_of(2, 256),
                bit_byte: models_of(256, 256),
                classification: models_of(256, 256),
                user_data: models_of(256, 256),
            }
        }
    }

    pub struct Point10Compressor {
        last_point: Point10,
        ic_intensity: IntegerCompressor,
        ic_point_source_id: IntegerCompressor,
        ic_dx: IntegerCompressor,
        ic_dy: IntegerCompressor,
        ic_z: IntegerCompressor,
        common: Common,
    }

    impl Default for Point10Compressor {
        fn default() -> Self {
            Self {
                last_point: Point10::default(),
                ic_intensity: IntegerCompressorBuilder::new()
                    .bits(16)
                    .contexts(4)
                    .build_initialized(),
                ic_point_source_id: IntegerCompressorBuilder::new().bits(16).build_initialized(),
                ic_dx: IntegerCompressorBuilder::new()
                    .bits(32)
                    .contexts(2)
                    .build_initialized(),
                ic_dy: IntegerCompressorBuilder::new()
                    .bits(32)
                    .contexts(22)
                    .build_initialized(),
                ic_z: IntegerCompressorBuilder::new()
                    .bits(32)
                    .contexts(20)
                    .build_initialized(),
                common: Common::new(),
            }
        }
    }

    impl<W: Write> FieldCompressor<W> for Point10Compressor {
        fn size_of_field(&self) -> usize {
            Point10::SIZE
        }

        fn compress_first(&mut self, dst: &mut W, buf: &[u8]) -> std::io::Result<()> {
            self.last_point = Point10::unpack_from(buf);
            dst.write_all(&buf[..Point10::SIZE])
        }

        fn compress_with(
            &mut self,
            encoder: &mut ArithmeticEncoder<W>,
            buf: &[u8],
        ) -> std::io::Result<()> {
            let current = Point10::unpack_from(buf);
            let contexts = ReturnContexts::of(&current);
            let m = contexts.m;

            let changed_values = ChangedValues::from_points(
                &current,
                &self.last_point,
                self.common.last_intensity[m],
            );
            encoder.encode_symbol(&mut self.common.changed_values, changed_values.0)?;

            if changed_values.bit_fields_changed() {
                encoder.encode_symbol(
                    &mut self.common.bit_byte[usize::from(self.last_point.bit_fields)],
                    u32::from(current.bit_fields),
                )?;
            }

            if changed_values.intensity_changed() {
                self.ic_intensity.compress(
                    encoder,
                    i32::from(self.common.last_intensity[m]),
                    i32::from(current.intensity),
                    contexts.intensity_context(),
                )?;
                self.common.last_intensity[m] = current.intensity;
            }

            if changed_values.classification_changed() {
                encoder.encode_symbol(
                    &mut self.common.classification[usize::from(self.last_point.classification)],
                    u32::from(current.classification),
                )?;
            }

            if changed_values.scan_angle_rank_changed() {
                // the difference must go through u8 to stay in 0..256
                let diff = current
                    .scan_angle_rank
                    .wrapping_sub(self.last_point.scan_angle_rank) as u8;
                encoder.encode_symbol(
                    &mut self.common.scan_angle_rank[current.scan_direction_flag() as usize],
                    u32::from(diff),
                )?;
            }

            if changed_values.user_data_changed() {
                encoder.encode_symbol(
                    &mut self.common.user_data[usize::from(self.last_point.user_data)],
                    u32::from(current.user_data),
                )?;
            }

            if changed_values.point_source_id_changed() {
                self.ic_point_source_id.compress(
                    encoder,
                    i32::from(self.last_point.point_source_id),
                    i32::from(current.point_source_id),
                    0,
                )?;
            }

            // x
            let median = self.common.last_x_diff_median[m].get();
            let diff = current.x.wrapping_sub(self.last_point.x);
            self.ic_dx
                .compress(encoder, median, diff, contexts.dx_context())?;
            self.common.last_x_diff_median[m].add(diff);

            // y
            let median = self.common.last_y_diff_median[m].get();
            let diff = current.y.wrapping_sub(self.last_point.y);
            let context = contexts.dy_context(self.ic_dx.k());
            self.ic_dy.compress(encoder, median, diff, context)?;
            self.common.last_y_diff_median[m].add(diff);

            // z
            let k_bits = (self.ic_dx.k() + self.ic_dy.k()) / 2;
            self.ic_z.compress(
                encoder,
                self.common.last_height[contexts.l],
                current.z,
                contexts.z_context(k_bits),
            )?;
            self.common.last_height[contexts.l] = current.z;

            self.last_point = current;
            Ok(())
        }
    }

    pub struct Point10Decompressor {
        last_point: Point10,
        ic_intensity: IntegerDecompressor,
        ic_point_source_id: IntegerDecompressor,
        ic_dx: IntegerDecompressor,
        ic_dy: IntegerDecompressor,
        ic_z: IntegerDecompressor,
        common: Common,
    }

    impl Default for Point10Decompressor {
        fn default() -> Self {
            Self {
                last_point: Point10::default(),
                ic_intensity: IntegerDecompressorBuilder::new()
                    .bits(16)
                    .contexts(4)
                    .build_initialized(),
                ic_point_source_id: IntegerDecompressorBuilder::new()
                    .bits(16)
                    .build_initialized(),
                ic_dx: IntegerDecompressorBuilder::new()
                    .bits(32)
                    .contexts(2)
                    .build_initialized(),
                ic_dy: IntegerDecompressorBuilder::new()
                    .bits(32)
                    .contexts(22)
                    .build_initialized(),
                ic_z: IntegerDecompressorBuilder::new()
                    .bits(32)
                    .contexts(20)
                    .build_initialized(),
                common: Common::new(),
            }
        }
    }

    impl<R: Read> FieldDecompressor<R> for Point10Decompressor {
        fn size_of_field(&self) -> usize {
            Point10::SIZE
        }

        fn decompress_first(&mut self, src: &mut R, first_point: &mut [u8]) -> std::io::Result<()> {
            src.read_exact(&mut first_point[..Point10::SIZE])?;
            self.last_point = Point10::unpack_from(first_point);
            // the intensity of the next points is predicted from last_intensity
            self.last_point.intensity = 0;
            Ok(())
        }

        fn decompress_with(
            &mut self,
            decoder: &mut ArithmeticDecoder<R>,
            buf: &mut [u8],
        ) -> std::io::Result<()> {
            let changed_values =
                ChangedValues(decoder.decode_symbol(&mut self.common.changed_values)?);

            if changed_values.bit_fields_changed() {
                let last_b = usize::from(self.last_point.bit_fields);
                self.last_point.bit_fields =
                    decoder.decode_symbol(&mut self.common.bit_byte[last_b])? as u8;
            }

            let contexts = ReturnContexts::of(&self.last_point);
            let m = contexts.m;

            if changed_values.intensity_changed() {
                let intensity = self.ic_intensity.decompress(
                    decoder,
                    i32::from(self.common.last_intensity[m]),
                    contexts.intensity_context(),
                )? as u16;
                self.common.last_intensity[m] = intensity;
            }
            self.last_point.intensity = self.common.last_intensity[m];

            if changed_values.classification_changed() {
                let last_c = usize::from(self.last_point.classification);
                self.last_point.classification =
                    decoder.decode_symbol(&mut self.common.classification[last_c])? as u8;
            }

            if changed_values.scan_angle_rank_changed() {
                let diff = decoder.decode_symbol(
                    &mut self.common.scan_angle_rank
                        [self.last_point.scan_direction_flag() as usize],
                )? as u8 as i8;
                self.last_point.scan_angle_rank = self.last_point.scan_angle_rank.wrapping_add(diff);
            }

            if changed_values.user_data_changed() {
                let last_u = usize::from(self.last_point.user_data);
                self.last_point.user_data =
                    decoder.decode_symbol(&mut self.common.user_data[last_u])? as u8;
            }

            if changed_values.point_source_id_changed() {
                self.last_point.point_source_id = self.ic_point_source_id.decompress(
                    decoder,
                    i32::from(self.last_point.point_source_id),
                    0,
                )? as u16;
            }

            // x
            let median = self.common.last_x_diff_median[m].get();
            let diff = self
                .ic_dx
                .decompress(decoder, median, contexts.dx_context())?;
            self.last_point.x = self.last_point.x.wrapping_add(diff);
            self.common.last_x_diff_median[m].add(diff);

            // y
            let median = self.common.last_y_diff_median[m].get();
            let context = contexts.dy_context(self.ic_dx.k());
            let diff = self.ic_dy.decompress(decoder, median, context)?;
            self.last_point.y = self.last_point.y.wrapping_add(diff);
            self.common.last_y_diff_median[m].add(diff);

            // z
            let k_bits = (self.ic_dx.k() + self.ic_dy.k()) / 2;
            self.last_point.z = self.ic_z.decompress(
                decoder,
                self.common.last_height[contexts.l],
                contexts.z_context(k_bits),
            )?;
            self.common.last_height[contexts.l] = self.last_point.z;

            self.last_point.pack_into(buf);
            Ok(())
        }
    }

    #[cfg(test)]
    mod test {
        use std::io::Cursor;

        use super::*;

        fn make_points() -> Vec<Point10> {
            (0..300)
                .map(|i: i32| Point10 {
                    x: 1_000_000 + i * 13 - (i % 7) * 5,
                    y: -2_000_000 + i * 3,
                    z: 500 + (i % 17) * 40,
                    intensity: (i * 37 % 4096) as u16,
                    bit_fields: ((i % 3 + 1) as u8) | (3 << 3) | (((i / 50) % 2) as u8) << 6,
                    classification: (i % 5) as u8,
                    scan_angle_rank: (i % 60 - 30) as i8,
                    user_data: if i % 11 == 0 { 7 } else { 0 },
                    point_source_id: (i / 100) as u16,
                })
                .collect()
        }

        #[test]
        fn test_point10_pack_unpack() {
            let point = make_points()[42];
            let mut buf = [0u8; Point10::SIZE];
            point.pack_into(&mut buf);
            assert_eq!(Point10::unpack_from(&buf), point);
            assert_eq!(point.return_number(), 1);
            assert_eq!(point.number_of_returns_of_given_pulse(), 3);
            assert!(!point.edge_of_flight_line());
        }

        #[test]
        fn test_point10_v2_round_trip() {
            let points = make_points();
            let mut buf = [0u8; Point10::SIZE];

            let mut compressor = Point10Compressor::default();
            let mut encoder = ArithmeticEncoder::new(Cursor::new(Vec::<u8>::new()));
            points[0].pack_into(&mut buf);
            compressor.compress_first(encoder.out_stream(), &buf).unwrap();
            for point in &points[1..] {
                point.pack_into(&mut buf);
                compressor.compress_with(&mut encoder, &buf).unwrap();
            }
            encoder.done().unwrap();
            let data = encoder.into_stream().into_inner();
            assert!(data.len() < points.len() * Point10::SIZE);

            let mut decompressor = Point10Decompressor::default();
            let mut decoder = ArithmeticDecoder::new(Cursor::new(data));
            decompressor
                .decompress_first(decoder.in_stream(), &mut buf)
                .unwrap();
            assert_eq!(Point10::unpack_from(&buf), points[0]);
            decoder.read_init_bytes().unwrap();
            for expected in &points[1..] {
                decompressor.decompress_with(&mut decoder, &mut buf).unwrap();
                assert_eq!(&Point10::unpack_from(&buf), expected);
            }
        }
    }
}
