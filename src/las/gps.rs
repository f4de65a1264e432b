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

//! The gps time of the LAS point formats 1 and 3.
//!
//! The f64 is handled through its bit pattern, reinterpreted as an i64.

use crate::packers::Packable;

const GPS_TIME_MULTI: i32 = 500;
const GPS_TIME_MULTI_MINUS: i32 = -10;
const GPS_TIME_MULTI_UNCHANGED: i32 = GPS_TIME_MULTI - GPS_TIME_MULTI_MINUS + 1;
const GPS_TIME_MULTI_CODE_FULL: i32 = GPS_TIME_MULTI - GPS_TIME_MULTI_MINUS + 2;
const GPS_TIME_MULTI_TOTAL: i32 = GPS_TIME_MULTI - GPS_TIME_MULTI_MINUS + 6;

#[derive(Default, Copy, Clone, Debug, PartialEq, Eq)]
pub struct GpsTime {
    pub value: i64,
}

impl From<f64> for GpsTime {
    fn from(v: f64) -> Self {
        Self {
            value: v.to_bits() as i64,
        }
    }
}

impl From<GpsTime> for f64 {
    fn from(gps: GpsTime) -> Self {
        f64::from_bits(gps.value as u64)
    }
}

impl Packable for GpsTime {
    const SIZE: usize = 8;

    fn unpack_from(input: &[u8]) -> Self {
        Self {
            value: i64::unpack_from(input),
        }
    }

    fn pack_into(&self, output: &mut [u8]) {
        self.value.pack_into(output)
    }
}

/// Returns the difference if it fits in 32 bits
pub(crate) fn diff_32(current: GpsTime, other: GpsTime) -> Option<i32> {
    let diff_64 = current.value.wrapping_sub(other.value);
    let diff_32 = diff_64 as i32;
    if diff_64 == i64::from(diff_32) {
        Some(diff_32)
    } else {
        None
    }
}

pub mod v2 {
    use std::io::{Read, Write};

    use crate::compressors::{IntegerCompressor, IntegerCompressorBuilder};
    use crate::decoders::ArithmeticDecoder;
    use crate::decompressors::{IntegerDecompressor, IntegerDecompressorBuilder};
    use crate::encoders::ArithmeticEncoder;
    use crate::las::utils::i32_quantize;
    use crate::models::{ArithmeticModel, ArithmeticModelBuilder};
    use crate::packers::Packable;
    use crate::record::{FieldCompressor, FieldDecompressor};

    use super::{
        diff_32, GpsTime, GPS_TIME_MULTI, GPS_TIME_MULTI_CODE_FULL, GPS_TIME_MULTI_MINUS,
        GPS_TIME_MULTI_TOTAL, GPS_TIME_MULTI_UNCHANGED,
    };

    /// Up to 4 interleaved time sequences are tracked, `last` is the one
    /// the previous point belonged to.
    struct Common {
        gps_time_multi: ArithmeticModel,
        gps_time_0_diff: ArithmeticModel,
        last: usize,
        next: usize,
        last_gps_times: [GpsTime; 4],
        last_gps_time_diffs: [i32; 4],
        multi_extreme_counters: [i32; 4],
    }

    impl Common {
        fn new() -> Self {
            Self {
                gps_time_multi: ArithmeticModelBuilder::new(GPS_TIME_MULTI_TOTAL as u32).build(),
                gps_time_0_diff: ArithmeticModelBuilder::new(6).build(),
                last: 0,
                next: 0,
                last_gps_times: [GpsTime::default(); 4],
                last_gps_time_diffs: [0i32; 4],
                multi_extreme_counters: [0i32; 4],
            }
        }

        fn last_time(&self) -> GpsTime {
            self.last_gps_times[self.last]
        }

        fn last_diff(&self) -> i32 {
            self.last_gps_time_diffs[self.last]
        }

        /// After 4 consecutive extreme multipliers the diff becomes the new reference
        fn count_extreme(&mut self, diff: i32) {
            let counter = &mut self.multi_extreme_counters[self.last];
            *counter += 1;
            if *counter > 3 {
                self.last_gps_time_diffs[self.last] = diff;
                *counter = 0;
            }
        }

        /// Starts a new sequence in the next slot
        fn start_sequence(&mut self, time: GpsTime) {
            self.next = (self.next + 1) & 3;
            self.last = self.next;
            self.last_gps_times[self.last] = time;
            self.last_gps_time_diffs[self.last] = 0;
            self.multi_extreme_counters[self.last] = 0;
        }

        /// Index offset (1 to 3) of another sequence the time is close to
        fn other_sequence(&self, time: GpsTime) -> Option<usize> {
            (1..4).find(|i| diff_32(time, self.last_gps_times[(self.last + i) & 3]).is_some())
        }
    }

    pub struct GpsTimeCompressor {
        ic_gps_time: IntegerCompressor,
        common: Common,
    }

    impl Default for GpsTimeCompressor {
        fn default() -> Self {
            Self {
                ic_gps_time: IntegerCompressorBuilder::new()
                    .bits(32)
                    .contexts(9)
                    .build_initialized(),
                common: Common::new(),
            }
        }
    }

    impl GpsTimeCompressor {
        /// Codes the full 64 bits of a time that starts a new sequence
        fn compress_full<W: Write>(
            &mut self,
            encoder: &mut ArithmeticEncoder<W>,
            time: GpsTime,
        ) -> std::io::Result<()> {
            self.ic_gps_time.compress(
                encoder,
                (self.common.last_time().value >> 32) as i32,
                (time.value >> 32) as i32,
                8,
            )?;
            encoder.write_int(time.value as u32)?;
            self.common.start_sequence(time);
            Ok(())
        }

        fn compress_multiplied<W: Write>(
            &mut self,
            encoder: &mut ArithmeticEncoder<W>,
            diff: i32,
        ) -> std::io::Result<()> {
            let last_diff = self.common.last_diff();
            let multi = i32_quantize(diff as f32 / last_diff as f32);
            let model = &mut self.common.gps_time_multi;

            if multi == 1 {
                // regularly spaced pulses
                encoder.encode_symbol(model, 1)?;
                self.ic_gps_time.compress(encoder, last_diff, diff, 1)?;
                self.common.multi_extreme_counters[self.common.last] = 0;
            } else if multi > 0 {
                if multi < GPS_TIME_MULTI {
                    encoder.encode_symbol(model, multi as u32)?;
                    let context = if multi < 10 { 2 } else { 3 };
                    self.ic_gps_time
                        .compress(encoder, multi.wrapping_mul(last_diff), diff, context)?;
                } else {
                    encoder.encode_symbol(model, GPS_TIME_MULTI as u32)?;
                    self.ic_gps_time.compress(
                        encoder,
                        GPS_TIME_MULTI.wrapping_mul(last_diff),
                        diff,
                        4,
                    )?;
                    self.common.count_extreme(diff);
                }
            } else if multi < 0 {
                if multi > GPS_TIME_MULTI_MINUS {
                    encoder.encode_symbol(model, (GPS_TIME_MULTI - multi) as u32)?;
                    self.ic_gps_time
                        .compress(encoder, multi.wrapping_mul(last_diff), diff, 5)?;
                } else {
                    encoder
                        .encode_symbol(model, (GPS_TIME_MULTI - GPS_TIME_MULTI_MINUS) as u32)?;
                    self.ic_gps_time.compress(
                        encoder,
                        GPS_TIME_MULTI_MINUS.wrapping_mul(last_diff),
                        diff,
                        6,
                    )?;
                    self.common.count_extreme(diff);
                }
            } else {
                encoder.encode_symbol(model, 0)?;
                self.ic_gps_time.compress(encoder, 0, diff, 7)?;
                self.common.count_extreme(diff);
            }
            Ok(())
        }
    }

    impl<W: Write> FieldCompressor<W> for GpsTimeCompressor {
        fn size_of_field(&self) -> usize {
            GpsTime::SIZE
        }

        fn compress_first(&mut self, dst: &mut W, buf: &[u8]) -> std::io::Result<()> {
            self.common.last_gps_times[0] = GpsTime::unpack_from(buf);
            dst.write_all(&buf[..GpsTime::SIZE])
        }

        fn compress_with(
            &mut self,
            encoder: &mut ArithmeticEncoder<W>,
            buf: &[u8],
        ) -> std::io::Result<()> {
            let current = GpsTime::unpack_from(buf);
            let last_diff_is_zero = self.common.last_diff() == 0;

            if current == self.common.last_time() {
                if last_diff_is_zero {
                    encoder.encode_symbol(&mut self.common.gps_time_0_diff, 0)?;
                } else {
                    encoder.encode_symbol(
                        &mut self.common.gps_time_multi,
                        GPS_TIME_MULTI_UNCHANGED as u32,
                    )?;
                }
                return Ok(());
            }

            match diff_32(current, self.common.last_time()) {
                Some(diff) if last_diff_is_zero => {
                    encoder.encode_symbol(&mut self.common.gps_time_0_diff, 1)?;
                    self.ic_gps_time.compress(encoder, 0, diff, 0)?;
                    self.common.last_gps_time_diffs[self.common.last] = diff;
                    self.common.multi_extreme_counters[self.common.last] = 0;
                }
                Some(diff) => self.compress_multiplied(encoder, diff)?,
                None => {
                    if let Some(i) = self.common.other_sequence(current) {
                        let (model, symbol) = if last_diff_is_zero {
                            (&mut self.common.gps_time_0_diff, i as u32 + 2)
                        } else {
                            (
                                &mut self.common.gps_time_multi,
                                (GPS_TIME_MULTI_CODE_FULL + i as i32) as u32,
                            )
                        };
                        encoder.encode_symbol(model, symbol)?;
                        self.common.last = (self.common.last + i) & 3;
                        return self.compress_with(encoder, buf);
                    }
                    if last_diff_is_zero {
                        encoder.encode_symbol(&mut self.common.gps_time_0_diff, 2)?;
                    } else {
                        encoder.encode_symbol(
                            &mut self.common.gps_time_multi,
                            GPS_TIME_MULTI_CODE_FULL as u32,
                        )?;
                    }
                    self.compress_full(encoder, current)?;
                }
            }
            self.common.last_gps_times[self.common.last] = current;
            Ok(())
        }
    }

    pub struct GpsTimeDecompressor {
        ic_gps_time: IntegerDecompressor,
        common: Common,
    }

    impl Default for GpsTimeDecompressor {
        fn default() -> Self {
            Self {
                ic_gps_time: IntegerDecompressorBuilder::new()
                    .bits(32)
                    .contexts(9)
                    .build_initialized(),
                common: Common::new(),
            }
        }
    }

    impl GpsTimeDecompressor {
        fn decompress_full<R: Read>(
            &mut self,
            decoder: &mut ArithmeticDecoder<R>,
        ) -> std::io::Result<()> {
            let high = self.ic_gps_time.decompress(
                decoder,
                (self.common.last_time().value >> 32) as i32,
                8,
            )?;
            let low = decoder.read_int()?;
            self.common
                .start_sequence(GpsTime::from_halves(high, low));
            Ok(())
        }

        fn decompress_multiplied<R: Read>(
            &mut self,
            decoder: &mut ArithmeticDecoder<R>,
            multi: i32,
        ) -> std::io::Result<i32> {
            let last_diff = self.common.last_diff();
            let diff = if multi == 0 {
                let diff = self.ic_gps_time.decompress(decoder, 0, 7)?;
                self.common.count_extreme(diff);
                diff
            } else if multi < GPS_TIME_MULTI {
                let context = if multi < 10 { 2 } else { 3 };
                self.ic_gps_time
                    .decompress(decoder, multi.wrapping_mul(last_diff), context)?
            } else if multi == GPS_TIME_MULTI {
                let diff =
                    self.ic_gps_time
                        .decompress(decoder, multi.wrapping_mul(last_diff), 4)?;
                self.common.count_extreme(diff);
                diff
            } else {
                let multi = GPS_TIME_MULTI - multi;
                if multi > GPS_TIME_MULTI_MINUS {
                    self.ic_gps_time
                        .decompress(decoder, multi.wrapping_mul(last_diff), 5)?
                } else {
                    let diff = self.ic_gps_time.decompress(
                        decoder,
                        GPS_TIME_MULTI_MINUS.wrapping_mul(last_diff),
                        6,
                    )?;
                    self.common.count_extreme(diff);
                    diff
                }
            };
            Ok(diff)
        }

        fn add_to_last_time(&mut self, diff: i32) {
            let last = &mut self.common.last_gps_times[self.common.last];
            last.value = last.value.wrapping_add(i64::from(diff));
        }

        fn decompress_time<R: Read>(
            &mut self,
            decoder: &mut ArithmeticDecoder<R>,
        ) -> std::io::Result<()> {
            if self.common.last_diff() == 0 {
                let symbol = decoder.decode_symbol(&mut self.common.gps_time_0_diff)?;
                match symbol {
                    0 => {}
                    1 => {
                        let diff = self.ic_gps_time.decompress(decoder, 0, 0)?;
                        self.common.last_gps_time_diffs[self.common.last] = diff;
                        self.add_to_last_time(diff);
                        self.common.multi_extreme_counters[self.common.last] = 0;
                    }
                    2 => self.decompress_full(decoder)?,
                    _ => {
                        self.common.last = (self.common.last + symbol as usize - 2) & 3;
                        self.decompress_time(decoder)?;
                    }
                }
            } else {
                let multi = decoder.decode_symbol(&mut self.common.gps_time_multi)? as i32;
                if multi == 1 {
                    let diff =
                        self.ic_gps_time
                            .decompress(decoder, self.common.last_diff(), 1)?;
                    self.add_to_last_time(diff);
                    self.common.multi_extreme_counters[self.common.last] = 0;
                } else if multi < GPS_TIME_MULTI_UNCHANGED {
                    let diff = self.decompress_multiplied(decoder, multi)?;
                    self.add_to_last_time(diff);
                } else if multi == GPS_TIME_MULTI_CODE_FULL {
                    self.decompress_full(decoder)?;
                } else if multi > GPS_TIME_MULTI_CODE_FULL {
                    self.common.last =
                        (self.common.last + (multi - GPS_TIME_MULTI_CODE_FULL) as usize) & 3;
                    self.decompress_time(decoder)?;
                }
            }
            Ok(())
        }
    }

    impl<R: Read> FieldDecompressor<R> for GpsTimeDecompressor {
        fn size_of_field(&self) -> usize {
            GpsTime::SIZE
        }

        fn decompress_first(&mut self, src: &mut R, first_point: &mut [u8]) -> std::io::Result<()> {
            src.read_exact(&mut first_point[..GpsTime::SIZE])?;
            self.common.last_gps_times[0] = GpsTime::unpack_from(first_point);
            Ok(())
        }

        fn decompress_with(
            &mut self,
            decoder: &mut ArithmeticDecoder<R>,
            buf: &mut [u8],
        ) -> std::io::Result<()> {
            self.decompress_time(decoder)?;
            self.common.last_time().pack_into(buf);
            Ok(())
        }
    }

    impl GpsTime {
        fn from_halves(high: i32, low: u32) -> Self {
            Self {
                value: (i64::from(high) << 32) | i64::from(low),
            }
        }
    }

    #[cfg(test)]
    mod test {
        use std::io::Cursor;

        use super::*;

        fn round_trip(times: &[f64]) {
            let mut buf = [0u8; GpsTime::SIZE];
            let mut compressor = GpsTimeCompressor::default();
            let mut encoder = ArithmeticEncoder::new(Cursor::new(Vec::<u8>::new()));
            GpsTime::from(times[0]).pack_into(&mut buf);
            compressor.compress_first(encoder.out_stream(), &buf).unwrap();
            for t in &times[1..] {
                GpsTime::from(*t).pack_into(&mut buf);
                compressor.compress_with(&mut encoder, &buf).unwrap();
            }
            encoder.done().unwrap();

            let data = encoder.into_stream().into_inner();
            let mut decompressor = GpsTimeDecompressor::default();
            let mut decoder = ArithmeticDecoder::new(Cursor::new(data));
            decompressor
                .decompress_first(decoder.in_stream(), &mut buf)
                .unwrap();
            decoder.read_init_bytes().unwrap();
            for t in &times[1..] {
                decompressor.decompress_with(&mut decoder, &mut buf).unwrap();
                let decoded = f64::from(GpsTime::unpack_from(&buf));
                assert_eq!(decoded.to_bits(), t.to_bits());
            }
        }

        #[test]
        fn test_regular_pulses() {
            let times: Vec<f64> = (0..500).map(|i| 1000.0 + f64::from(i) * 0.00001).collect();
            round_trip(&times);
        }

        #[test]
        fn test_repeated_and_irregular_times() {
            let mut times = vec![];
            for i in 0..200 {
                let t = 250_000.0 + f64::from(i / 3) * 0.5 + f64::from(i % 7) * 1e-6;
                times.push(t);
                if i % 13 == 0 {
                    times.push(t);
                }
            }
            round_trip(&times);
        }

        #[test]
        fn test_interleaved_sequences_and_jumps() {
            let mut times = vec![];
            for i in 0..300 {
                let base = match i % 3 {
                    0 => 10.0,
                    1 => 5.0e8,
                    _ => -3.0e5,
                };
                times.push(base + f64::from(i) * 0.001);
            }
            times.push(0.0);
            times.push(-0.0);
            times.push(std::f64::MAX);
            round_trip(&times);
        }
    }
}
