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

//! The 30 bytes core shared by the LAS point formats 6 to 10.

use crate::las::gps::GpsTime;
use crate::packers::Packable;

#[derive(Default, Copy, Clone, PartialEq, Eq, Debug)]
pub struct Point14 {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub intensity: u16,
    // return number (4 bits), number of returns (4 bits)
    pub bit_fields: u8,
    // classification flags (4 bits), scanner channel (2 bits),
    // scan direction flag (1 bit), edge of flight line (1 bit)
    pub flags: u8,
    pub classification: u8,
    pub user_data: u8,
    pub scan_angle: i16,
    pub point_source_id: u16,
    pub gps_time: GpsTime,
}

impl Point14 {
    pub fn return_number(&self) -> u8 {
        self.bit_fields & 0x0F
    }

    pub fn number_of_returns(&self) -> u8 {
        self.bit_fields >> 4
    }

    pub fn set_return_number(&mut self, value: u8) {
        self.bit_fields = (self.bit_fields & 0xF0) | (value & 0x0F);
    }

    pub fn set_number_of_returns(&mut self, value: u8) {
        self.bit_fields = (self.bit_fields & 0x0F) | (value << 4);
    }

    pub fn classification_flags(&self) -> u8 {
        self.flags & 0x0F
    }

    pub fn scanner_channel(&self) -> u8 {
        (self.flags >> 4) & 0x3
    }

    pub fn set_scanner_channel(&mut self, channel: u8) {
        self.flags = (self.flags & 0b1100_1111) | ((channel & 0x3) << 4);
    }

    pub fn scan_direction_flag(&self) -> bool {
        (self.flags >> 6) & 0x1 != 0
    }

    pub fn edge_of_flight_line(&self) -> bool {
        (self.flags >> 7) & 0x1 != 0
    }

    /// The flags without the scanner channel, as coded: classification flags,
    /// scan direction flag (bit 4) and edge of flight line (bit 5)
    fn coded_flags(&self) -> u8 {
        self.classification_flags()
            | (self.scan_direction_flag() as u8) << 4
            | (self.edge_of_flight_line() as u8) << 5
    }

    fn set_coded_flags(&mut self, sym: u8) {
        self.flags = (sym & 0x0F)
            | (self.scanner_channel() << 4)
            | ((sym >> 4) & 0x1) << 6
            | ((sym >> 5) & 0x1) << 7;
    }
}

impl Packable for Point14 {
    const SIZE: usize = 30;

    fn unpack_from(input: &[u8]) -> Self {
        Self {
            x: i32::unpack_from(&input[0..4]),
            y: i32::unpack_from(&input[4..8]),
            z: i32::unpack_from(&input[8..12]),
            intensity: u16::unpack_from(&input[12..14]),
            bit_fields: input[14],
            flags: input[15],
            classification: input[16],
            user_data: input[17],
            scan_angle: i16::unpack_from(&input[18..20]),
            point_source_id: u16::unpack_from(&input[20..22]),
            gps_time: GpsTime::unpack_from(&input[22..30]),
        }
    }

    fn pack_into(&self, output: &mut [u8]) {
        self.x.pack_into(&mut output[0..4]);
        self.y.pack_into(&mut output[4..8]);
        self.z.pack_into(&mut output[8..12]);
        self.intensity.pack_into(&mut output[12..14]);
        output[14] = self.bit_fields;
        output[15] = self.flags;
        output[16] = self.classification;
        output[17] = self.user_data;
        self.scan_angle.pack_into(&mut output[18..20]);
        self.point_source_id.pack_into(&mut output[20..22]);
        self.gps_time.pack_into(&mut output[22..30]);
    }
}

pub mod v3 {
    //! Each scanner channel has its own context, and each group of
    //! fields is coded in its own layer so that a reader can skip
    //! the layers it does not need.
    //!
    //! The x, y, returns and channel layer is always present,
    //! the other layers are left out of a chunk when the field
    //! never changes in it.
    use std::io::{Cursor, Read, Write};

    use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

    use crate::compressors::{IntegerCompressor, IntegerCompressorBuilder};
    use crate::decoders::ArithmeticDecoder;
    use crate::decompressors::{IntegerDecompressor, IntegerDecompressorBuilder};
    use crate::encoders::ArithmeticEncoder;
    use crate::las::gps::{diff_32, GpsTime};
    use crate::las::utils::{
        copy_bytes_into_decoder, copy_encoder_content_to, i32_quantize, layer_size,
        u32_zero_bit, StreamingMedian, NUMBER_RETURN_LEVEL_8CT, NUMBER_RETURN_MAP_6CTX,
    };
    use crate::models::{ArithmeticModel, ArithmeticModelBuilder};
    use crate::packers::Packable;
    use crate::record::{LayeredFieldCompressor, LayeredFieldDecompressor};

    use super::Point14;

    const NUM_CONTEXTS: usize = 4;

    const GPS_TIME_MULTI: i32 = 500;
    const GPS_TIME_MULTI_MINUS: i32 = -10;
    const GPS_TIME_MULTI_CODE_FULL: i32 = GPS_TIME_MULTI - GPS_TIME_MULTI_MINUS + 1;
    const GPS_TIME_MULTI_TOTAL: i32 = GPS_TIME_MULTI - GPS_TIME_MULTI_MINUS + 5;

    // bits of the changed values symbol
    const CHANNEL_CHANGED: u32 = 1 << 6;
    const POINT_SOURCE_CHANGED: u32 = 1 << 5;
    const GPS_TIME_CHANGED: u32 = 1 << 4;
    const SCAN_ANGLE_CHANGED: u32 = 1 << 3;
    const NUMBER_OF_RETURNS_CHANGED: u32 = 1 << 2;

    /// single (3) / first (1) / last (2) / intermediate (0) return
    /// of the last point, plus 4 when its gps time changed
    fn last_point_return(last: &Point14, gps_time_change: bool) -> usize {
        let r = last.return_number();
        let n = last.number_of_returns();
        (r == 1) as usize + ((r >= n) as usize) * 2 + (gps_time_change as usize) * 4
    }

    /// single (3) / first (2) / last (1) / intermediate (0) return
    fn current_point_return(r: u8, n: u8) -> u32 {
        ((r == 1) as u32) * 2 + (r >= n) as u32
    }

    fn y_context(n: u8, k_bits: u32) -> u32 {
        (n == 1) as u32 + if k_bits < 20 { u32_zero_bit(k_bits) } else { 20 }
    }

    fn z_context(n: u8, k_bits: u32) -> u32 {
        (n == 1) as u32 + if k_bits < 18 { u32_zero_bit(k_bits) } else { 18 }
    }

    fn lazy_model(slot: &mut Option<ArithmeticModel>, symbols: u32) -> &mut ArithmeticModel {
        slot.get_or_insert_with(|| ArithmeticModelBuilder::new(symbols).build())
    }

    /// Up to 4 interleaved gps time sequences
    struct GpsSequences {
        last: usize,
        next: usize,
        last_gps_times: [GpsTime; 4],
        last_gps_diffs: [i32; 4],
        multi_extreme_counters: [i32; 4],
        multi: ArithmeticModel,
        no_diff: ArithmeticModel,
    }

    impl GpsSequences {
        fn new(time: GpsTime) -> Self {
            let mut last_gps_times = [GpsTime::default(); 4];
            last_gps_times[0] = time;
            Self {
                last: 0,
                next: 0,
                last_gps_times,
                last_gps_diffs: [0; 4],
                multi_extreme_counters: [0; 4],
                multi: ArithmeticModelBuilder::new(GPS_TIME_MULTI_TOTAL as u32).build(),
                no_diff: ArithmeticModelBuilder::new(5).build(),
            }
        }

        fn last_time(&self) -> GpsTime {
            self.last_gps_times[self.last]
        }

        fn last_diff(&self) -> i32 {
            self.last_gps_diffs[self.last]
        }

        fn count_extreme(&mut self, diff: i32) {
            let counter = &mut self.multi_extreme_counters[self.last];
            *counter += 1;
            if *counter > 3 {
                self.last_gps_diffs[self.last] = diff;
                *counter = 0;
            }
        }

        fn start_sequence(&mut self, time: GpsTime) {
            self.next = (self.next + 1) & 3;
            self.last = self.next;
            self.last_gps_times[self.last] = time;
            self.last_gps_diffs[self.last] = 0;
            self.multi_extreme_counters[self.last] = 0;
        }

        fn other_sequence(&self, time: GpsTime) -> Option<usize> {
            (1..4).find(|i| diff_32(time, self.last_gps_times[(self.last + i) & 3]).is_some())
        }
    }

    /// Prediction state and models of one scanner channel
    struct ChannelState {
        unused: bool,
        last_point: Point14,
        gps_time_change: bool,
        last_intensities: [u16; 8],
        last_x_diff_median5: [StreamingMedian<i32>; 12],
        last_y_diff_median5: [StreamingMedian<i32>; 12],
        last_z: [i32; 8],

        changed_values: Vec<ArithmeticModel>,
        scanner_channel: ArithmeticModel,
        number_of_returns: Vec<Option<ArithmeticModel>>,
        return_number: Vec<Option<ArithmeticModel>>,
        return_number_gps_same: ArithmeticModel,
        classification: Vec<Option<ArithmeticModel>>,
        flags: Vec<Option<ArithmeticModel>>,
        user_data: Vec<Option<ArithmeticModel>>,

        gps: GpsSequences,
    }

    impl ChannelState {
        fn from_last_point(point: &Point14) -> Self {
            Self {
                unused: false,
                last_point: *point,
                gps_time_change: false,
                last_intensities: [point.intensity; 8],
                last_x_diff_median5: [StreamingMedian::new(); 12],
                last_y_diff_median5: [StreamingMedian::new(); 12],
                last_z: [point.z; 8],
                changed_values: (0..8)
                    .map(|_| ArithmeticModelBuilder::new(128).build())
                    .collect(),
                scanner_channel: ArithmeticModelBuilder::new(3).build(),
                number_of_returns: (0..16).map(|_| None).collect(),
                return_number: (0..16).map(|_| None).collect(),
                return_number_gps_same: ArithmeticModelBuilder::new(13).build(),
                classification: (0..64).map(|_| None).collect(),
                flags: (0..64).map(|_| None).collect(),
                user_data: (0..64).map(|_| None).collect(),
                gps: GpsSequences::new(point.gps_time),
            }
        }
    }

    macro_rules! layers {
        ($name:ident, $coder:ident) => {
            struct $name {
                channel_returns_xy: $coder<Cursor<Vec<u8>>>,
                z: $coder<Cursor<Vec<u8>>>,
                classification: $coder<Cursor<Vec<u8>>>,
                flags: $coder<Cursor<Vec<u8>>>,
                intensity: $coder<Cursor<Vec<u8>>>,
                scan_angle: $coder<Cursor<Vec<u8>>>,
                user_data: $coder<Cursor<Vec<u8>>>,
                point_source: $coder<Cursor<Vec<u8>>>,
                gps_time: $coder<Cursor<Vec<u8>>>,
            }

            impl Default for $name {
                fn default() -> Self {
                    Self {
                        channel_returns_xy: $coder::new(Cursor::new(Vec::<u8>::new())),
                        z: $coder::new(Cursor::new(Vec::<u8>::new())),
                        classification: $coder::new(Cursor::new(Vec::<u8>::new())),
                        flags: $coder::new(Cursor::new(Vec::<u8>::new())),
                        intensity: $coder::new(Cursor::new(Vec::<u8>::new())),
                        scan_angle: $coder::new(Cursor::new(Vec::<u8>::new())),
                        user_data: $coder::new(Cursor::new(Vec::<u8>::new())),
                        point_source: $coder::new(Cursor::new(Vec::<u8>::new())),
                        gps_time: $coder::new(Cursor::new(Vec::<u8>::new())),
                    }
                }
            }
        };
    }

    layers!(Point14Encoders, ArithmeticEncoder);
    layers!(Point14Decoders, ArithmeticDecoder);

    /// Which optional layers hold data
    #[derive(Copy, Clone, Default, Debug)]
    struct ChangedLayers {
        z: bool,
        classification: bool,
        flags: bool,
        intensity: bool,
        scan_angle: bool,
        user_data: bool,
        point_source: bool,
        gps_time: bool,
    }

    /***********************************************************************************************
                        Compression
    ***********************************************************************************************/

    struct ChannelCompressor {
        state: ChannelState,
        ic_dx: IntegerCompressor,
        ic_dy: IntegerCompressor,
        ic_z: IntegerCompressor,
        ic_intensity: IntegerCompressor,
        ic_scan_angle: IntegerCompressor,
        ic_point_source: IntegerCompressor,
        ic_gps_time: IntegerCompressor,
    }

    impl ChannelCompressor {
        fn from_last_point(point: &Point14) -> Self {
            Self {
                state: ChannelState::from_last_point(point),
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
                ic_intensity: IntegerCompressorBuilder::new()
                    .bits(16)
                    .contexts(4)
                    .build_initialized(),
                ic_scan_angle: IntegerCompressorBuilder::new()
                    .bits(16)
                    .contexts(2)
                    .build_initialized(),
                ic_point_source: IntegerCompressorBuilder::new()
                    .bits(16)
                    .build_initialized(),
                ic_gps_time: IntegerCompressorBuilder::new()
                    .bits(32)
                    .contexts(9)
                    .build_initialized(),
            }
        }

        fn unused() -> Self {
            let mut me = Self::from_last_point(&Point14::default());
            me.state.unused = true;
            me
        }

        fn write_gps_time(
            &mut self,
            encoder: &mut ArithmeticEncoder<Cursor<Vec<u8>>>,
            time: GpsTime,
        ) -> std::io::Result<()> {
            loop {
                let gps = &mut self.state.gps;
                let ic = &mut self.ic_gps_time;
                let diff = diff_32(time, gps.last_time());
                if gps.last_diff() == 0 {
                    match diff {
                        Some(diff) => {
                            encoder.encode_symbol(&mut gps.no_diff, 0)?;
                            ic.compress(encoder, 0, diff, 0)?;
                            gps.last_gps_diffs[gps.last] = diff;
                            gps.multi_extreme_counters[gps.last] = 0;
                        }
                        None => {
                            if let Some(i) = gps.other_sequence(time) {
                                encoder.encode_symbol(&mut gps.no_diff, (i + 1) as u32)?;
                                gps.last = (gps.last + i) & 3;
                                continue;
                            }
                            encoder.encode_symbol(&mut gps.no_diff, 1)?;
                            ic.compress(
                                encoder,
                                (gps.last_time().value >> 32) as i32,
                                (time.value >> 32) as i32,
                                8,
                            )?;
                            encoder.write_int(time.value as u32)?;
                            gps.start_sequence(time);
                        }
                    }
                } else {
                    match diff {
                        Some(diff) => {
                            let last_diff = gps.last_diff();
                            let multi = i32_quantize(diff as f32 / last_diff as f32);
                            if multi == 1 {
                                encoder.encode_symbol(&mut gps.multi, 1)?;
                                ic.compress(encoder, last_diff, diff, 1)?;
                                gps.multi_extreme_counters[gps.last] = 0;
                            } else if multi > 0 {
                                if multi < GPS_TIME_MULTI {
                                    encoder.encode_symbol(&mut gps.multi, multi as u32)?;
                                    let context = if multi < 10 { 2 } else { 3 };
                                    ic.compress(
                                        encoder,
                                        multi.wrapping_mul(last_diff),
                                        diff,
                                        context,
                                    )?;
                                } else {
                                    encoder.encode_symbol(&mut gps.multi, GPS_TIME_MULTI as u32)?;
                                    ic.compress(
                                        encoder,
                                        GPS_TIME_MULTI.wrapping_mul(last_diff),
                                        diff,
                                        4,
                                    )?;
                                    gps.count_extreme(diff);
                                }
                            } else if multi < 0 {
                                if multi > GPS_TIME_MULTI_MINUS {
                                    encoder.encode_symbol(
                                        &mut gps.multi,
                                        (GPS_TIME_MULTI - multi) as u32,
                                    )?;
                                    ic.compress(encoder, multi.wrapping_mul(last_diff), diff, 5)?;
                                } else {
                                    encoder.encode_symbol(
                                        &mut gps.multi,
                                        (GPS_TIME_MULTI - GPS_TIME_MULTI_MINUS) as u32,
                                    )?;
                                    ic.compress(
                                        encoder,
                                        GPS_TIME_MULTI_MINUS.wrapping_mul(last_diff),
                                        diff,
                                        6,
                                    )?;
                                    gps.count_extreme(diff);
                                }
                            } else {
                                encoder.encode_symbol(&mut gps.multi, 0)?;
                                ic.compress(encoder, 0, diff, 7)?;
                                gps.count_extreme(diff);
                            }
                        }
                        None => {
                            if let Some(i) = gps.other_sequence(time) {
                                encoder.encode_symbol(
                                    &mut gps.multi,
                                    (GPS_TIME_MULTI_CODE_FULL as usize + i) as u32,
                                )?;
                                gps.last = (gps.last + i) & 3;
                                continue;
                            }
                            encoder.encode_symbol(&mut gps.multi, GPS_TIME_MULTI_CODE_FULL as u32)?;
                            ic.compress(
                                encoder,
                                (gps.last_time().value >> 32) as i32,
                                (time.value >> 32) as i32,
                                8,
                            )?;
                            encoder.write_int(time.value as u32)?;
                            gps.start_sequence(time);
                        }
                    }
                }
                gps.last_gps_times[gps.last] = time;
                return Ok(());
            }
        }
    }

    pub struct Point14Compressor {
        encoders: Point14Encoders,
        changed: ChangedLayers,
        current_context: usize,
        contexts: Vec<ChannelCompressor>,
    }

    impl Default for Point14Compressor {
        fn default() -> Self {
            Self {
                encoders: Point14Encoders::default(),
                changed: ChangedLayers::default(),
                current_context: 0,
                contexts: (0..NUM_CONTEXTS).map(|_| ChannelCompressor::unused()).collect(),
            }
        }
    }

    impl<W: Write> LayeredFieldCompressor<W> for Point14Compressor {
        fn size_of_field(&self) -> usize {
            Point14::SIZE
        }

        fn init_first_point(
            &mut self,
            dst: &mut W,
            first_point: &[u8],
            context: &mut usize,
        ) -> std::io::Result<()> {
            let point = Point14::unpack_from(first_point);
            for context in &mut self.contexts {
                context.state.unused = true;
            }
            self.current_context = point.scanner_channel() as usize;
            *context = self.current_context;
            self.contexts[self.current_context] = ChannelCompressor::from_last_point(&point);
            dst.write_all(&first_point[..Point14::SIZE])
        }

        fn compress_field_with(
            &mut self,
            current_point: &[u8],
            context: &mut usize,
        ) -> std::io::Result<()> {
            let current = Point14::unpack_from(current_point);
            let previous_context = self.current_context;
            let channel = current.scanner_channel() as usize;

            if channel != previous_context && self.contexts[channel].state.unused {
                let last_point = self.contexts[previous_context].state.last_point;
                self.contexts[channel] = ChannelCompressor::from_last_point(&last_point);
            }

            let base = self.contexts[channel].state.last_point;
            let n = current.number_of_returns();
            let r = current.return_number();
            let last_n = base.number_of_returns();
            let last_r = base.return_number();
            let gps_time_changed = current.gps_time != base.gps_time;
            let scan_angle_changed = current.scan_angle != base.scan_angle;
            let point_source_changed = current.point_source_id != base.point_source_id;

            let mut changed_values = 0u32;
            if channel != previous_context {
                changed_values |= CHANNEL_CHANGED;
            }
            if point_source_changed {
                changed_values |= POINT_SOURCE_CHANGED;
            }
            if gps_time_changed {
                changed_values |= GPS_TIME_CHANGED;
            }
            if scan_angle_changed {
                changed_values |= SCAN_ANGLE_CHANGED;
            }
            if n != last_n {
                changed_values |= NUMBER_OF_RETURNS_CHANGED;
            }
            if r != last_r {
                changed_values |= if r == (last_r + 1) % 16 {
                    1
                } else if r == (last_r + 15) % 16 {
                    2
                } else {
                    3
                };
            }

            {
                let previous = &mut self.contexts[previous_context].state;
                let lpr = last_point_return(&previous.last_point, previous.gps_time_change);
                let encoder = &mut self.encoders.channel_returns_xy;
                encoder.encode_symbol(&mut previous.changed_values[lpr], changed_values)?;
                if channel != previous_context {
                    let diff = (channel + NUM_CONTEXTS - previous_context - 1) % NUM_CONTEXTS;
                    encoder.encode_symbol(&mut previous.scanner_channel, diff as u32)?;
                }
            }
            self.current_context = channel;
            *context = channel;

            let encoders = &mut self.encoders;
            let changed = &mut self.changed;
            let the_context = &mut self.contexts[channel];
            let state = &mut the_context.state;

            if n != last_n {
                encoders.channel_returns_xy.encode_symbol(
                    lazy_model(&mut state.number_of_returns[last_n as usize], 16),
                    u32::from(n),
                )?;
            }

            if changed_values & 3 == 3 {
                if gps_time_changed {
                    encoders.channel_returns_xy.encode_symbol(
                        lazy_model(&mut state.return_number[last_r as usize], 16),
                        u32::from(r),
                    )?;
                } else {
                    let sym = (u32::from(r) + 16 - u32::from(last_r)) % 16 - 2;
                    encoders
                        .channel_returns_xy
                        .encode_symbol(&mut state.return_number_gps_same, sym)?;
                }
            }

            let m = usize::from(NUMBER_RETURN_MAP_6CTX[n as usize][r as usize]);
            let l = usize::from(NUMBER_RETURN_LEVEL_8CT[n as usize][r as usize]);
            let cpr = current_point_return(r, n);
            let idx = (m << 1) | gps_time_changed as usize;

            let diff = current.x.wrapping_sub(base.x);
            the_context.ic_dx.compress(
                &mut encoders.channel_returns_xy,
                state.last_x_diff_median5[idx].get(),
                diff,
                (n == 1) as u32,
            )?;
            state.last_x_diff_median5[idx].add(diff);

            let diff = current.y.wrapping_sub(base.y);
            the_context.ic_dy.compress(
                &mut encoders.channel_returns_xy,
                state.last_y_diff_median5[idx].get(),
                diff,
                y_context(n, the_context.ic_dx.k()),
            )?;
            state.last_y_diff_median5[idx].add(diff);

            let k_bits = (the_context.ic_dx.k() + the_context.ic_dy.k()) / 2;
            the_context.ic_z.compress(
                &mut encoders.z,
                state.last_z[l],
                current.z,
                z_context(n, k_bits),
            )?;
            state.last_z[l] = current.z;
            changed.z |= current.z != base.z;

            let ccc = (((base.classification & 0x1F) << 1) + (cpr == 3) as u8) as usize;
            encoders.classification.encode_symbol(
                lazy_model(&mut state.classification[ccc], 256),
                u32::from(current.classification),
            )?;
            changed.classification |= current.classification != base.classification;

            let last_flags = base.coded_flags();
            let flags = current.coded_flags();
            encoders.flags.encode_symbol(
                lazy_model(&mut state.flags[last_flags as usize], 64),
                u32::from(flags),
            )?;
            changed.flags |= flags != last_flags;

            let idx = ((cpr << 1) | gps_time_changed as u32) as usize;
            the_context.ic_intensity.compress(
                &mut encoders.intensity,
                i32::from(state.last_intensities[idx]),
                i32::from(current.intensity),
                cpr,
            )?;
            state.last_intensities[idx] = current.intensity;
            changed.intensity |= current.intensity != base.intensity;

            if scan_angle_changed {
                the_context.ic_scan_angle.compress(
                    &mut encoders.scan_angle,
                    i32::from(base.scan_angle),
                    i32::from(current.scan_angle),
                    gps_time_changed as u32,
                )?;
                changed.scan_angle = true;
            }

            encoders.user_data.encode_symbol(
                lazy_model(&mut state.user_data[(base.user_data / 4) as usize], 256),
                u32::from(current.user_data),
            )?;
            changed.user_data |= current.user_data != base.user_data;

            if point_source_changed {
                the_context.ic_point_source.compress(
                    &mut encoders.point_source,
                    i32::from(base.point_source_id),
                    i32::from(current.point_source_id),
                    0,
                )?;
                changed.point_source = true;
            }

            if gps_time_changed {
                the_context.write_gps_time(&mut encoders.gps_time, current.gps_time)?;
                changed.gps_time = true;
            }

            the_context.state.last_point = current;
            the_context.state.gps_time_change = gps_time_changed;
            Ok(())
        }

        fn write_layers_sizes(&mut self, dst: &mut W) -> std::io::Result<()> {
            let encoders = &mut self.encoders;
            encoders.channel_returns_xy.done()?;
            encoders.z.done()?;
            encoders.classification.done()?;
            encoders.flags.done()?;
            encoders.intensity.done()?;
            encoders.scan_angle.done()?;
            encoders.user_data.done()?;
            encoders.point_source.done()?;
            encoders.gps_time.done()?;

            let changed = &self.changed;
            dst.write_u32::<LittleEndian>(layer_size(true, &encoders.channel_returns_xy))?;
            dst.write_u32::<LittleEndian>(layer_size(changed.z, &encoders.z))?;
            dst.write_u32::<LittleEndian>(layer_size(
                changed.classification,
                &encoders.classification,
            ))?;
            dst.write_u32::<LittleEndian>(layer_size(changed.flags, &encoders.flags))?;
            dst.write_u32::<LittleEndian>(layer_size(changed.intensity, &encoders.intensity))?;
            dst.write_u32::<LittleEndian>(layer_size(changed.scan_angle, &encoders.scan_angle))?;
            dst.write_u32::<LittleEndian>(layer_size(changed.user_data, &encoders.user_data))?;
            dst.write_u32::<LittleEndian>(layer_size(
                changed.point_source,
                &encoders.point_source,
            ))?;
            dst.write_u32::<LittleEndian>(layer_size(changed.gps_time, &encoders.gps_time))?;
            Ok(())
        }

        fn write_layers(&mut self, dst: &mut W) -> std::io::Result<()> {
            let encoders = &self.encoders;
            let changed = &self.changed;
            copy_encoder_content_to(&encoders.channel_returns_xy, dst)?;
            let optional_layers = [
                (changed.z, &encoders.z),
                (changed.classification, &encoders.classification),
                (changed.flags, &encoders.flags),
                (changed.intensity, &encoders.intensity),
                (changed.scan_angle, &encoders.scan_angle),
                (changed.user_data, &encoders.user_data),
                (changed.point_source, &encoders.point_source),
                (changed.gps_time, &encoders.gps_time),
            ];
            for (is_changed, encoder) in optional_layers.iter() {
                if *is_changed {
                    copy_encoder_content_to(encoder, dst)?;
                }
            }
            Ok(())
        }
    }

    /***********************************************************************************************
                        Decompression
    ***********************************************************************************************/

    struct ChannelDecompressor {
        state: ChannelState,
        id_dx: IntegerDecompressor,
        id_dy: IntegerDecompressor,
        id_z: IntegerDecompressor,
        id_intensity: IntegerDecompressor,
        id_scan_angle: IntegerDecompressor,
        id_point_source: IntegerDecompressor,
        id_gps_time: IntegerDecompressor,
    }

    impl ChannelDecompressor {
        fn from_last_point(point: &Point14) -> Self {
            Self {
                state: ChannelState::from_last_point(point),
                id_dx: IntegerDecompressorBuilder::new()
                    .bits(32)
                    .contexts(2)
                    .build_initialized(),
                id_dy: IntegerDecompressorBuilder::new()
                    .bits(32)
                    .contexts(22)
                    .build_initialized(),
                id_z: IntegerDecompressorBuilder::new()
                    .bits(32)
                    .contexts(20)
                    .build_initialized(),
                id_intensity: IntegerDecompressorBuilder::new()
                    .bits(16)
                    .contexts(4)
                    .build_initialized(),
                id_scan_angle: IntegerDecompressorBuilder::new()
                    .bits(16)
                    .contexts(2)
                    .build_initialized(),
                id_point_source: IntegerDecompressorBuilder::new()
                    .bits(16)
                    .build_initialized(),
                id_gps_time: IntegerDecompressorBuilder::new()
                    .bits(32)
                    .contexts(9)
                    .build_initialized(),
            }
        }

        fn unused() -> Self {
            let mut me = Self::from_last_point(&Point14::default());
            me.state.unused = true;
            me
        }

        fn read_gps_time(
            &mut self,
            decoder: &mut ArithmeticDecoder<Cursor<Vec<u8>>>,
        ) -> std::io::Result<GpsTime> {
            let gps = &mut self.state.gps;
            let id = &mut self.id_gps_time;
            loop {
                if gps.last_diff() == 0 {
                    let multi = decoder.decode_symbol(&mut gps.no_diff)?;
                    if multi == 0 {
                        let diff = id.decompress(decoder, 0, 0)?;
                        gps.last_gps_diffs[gps.last] = diff;
                        gps.last_gps_times[gps.last].value =
                            gps.last_time().value.wrapping_add(i64::from(diff));
                        gps.multi_extreme_counters[gps.last] = 0;
                    } else if multi == 1 {
                        let time = read_full_time(gps, id, decoder)?;
                        gps.start_sequence(time);
                    } else {
                        gps.last = (gps.last + multi as usize - 1) & 3;
                        continue;
                    }
                } else {
                    let multi = decoder.decode_symbol(&mut gps.multi)? as i32;
                    let last_diff = gps.last_diff();
                    if multi == 1 {
                        let diff = id.decompress(decoder, last_diff, 1)?;
                        gps.last_gps_times[gps.last].value =
                            gps.last_time().value.wrapping_add(i64::from(diff));
                        gps.multi_extreme_counters[gps.last] = 0;
                    } else if multi < GPS_TIME_MULTI_CODE_FULL {
                        let diff = if multi == 0 {
                            let diff = id.decompress(decoder, 0, 7)?;
                            gps.count_extreme(diff);
                            diff
                        } else if multi < GPS_TIME_MULTI {
                            let context = if multi < 10 { 2 } else { 3 };
                            id.decompress(decoder, multi.wrapping_mul(last_diff), context)?
                        } else if multi == GPS_TIME_MULTI {
                            let diff = id.decompress(
                                decoder,
                                GPS_TIME_MULTI.wrapping_mul(last_diff),
                                4,
                            )?;
                            gps.count_extreme(diff);
                            diff
                        } else {
                            let multi = GPS_TIME_MULTI - multi;
                            if multi > GPS_TIME_MULTI_MINUS {
                                id.decompress(decoder, multi.wrapping_mul(last_diff), 5)?
                            } else {
                                let diff = id.decompress(
                                    decoder,
                                    GPS_TIME_MULTI_MINUS.wrapping_mul(last_diff),
                                    6,
                                )?;
                                gps.count_extreme(diff);
                                diff
                            }
                        };
                        gps.last_gps_times[gps.last].value =
                            gps.last_time().value.wrapping_add(i64::from(diff));
                    } else if multi == GPS_TIME_MULTI_CODE_FULL {
                        let time = read_full_time(gps, id, decoder)?;
                        gps.start_sequence(time);
                    } else {
                        gps.last = (gps.last + (multi - GPS_TIME_MULTI_CODE_FULL) as usize) & 3;
                        continue;
                    }
                }
                return Ok(gps.last_time());
            }
        }
    }

    /// The 64 bits of a time starting a new sequence
    fn read_full_time(
        gps: &GpsSequences,
        id: &mut IntegerDecompressor,
        decoder: &mut ArithmeticDecoder<Cursor<Vec<u8>>>,
    ) -> std::io::Result<GpsTime> {
        let high = id.decompress(decoder, (gps.last_time().value >> 32) as i32, 8)?;
        let low = decoder.read_int()?;
        Ok(GpsTime {
            value: (i64::from(high) << 32) | i64::from(low),
        })
    }

    /// Size in bytes of each layer of a chunk
    #[derive(Copy, Clone, Default, Debug)]
    struct LayerSizes {
        channel_returns_xy: usize,
        z: usize,
        classification: usize,
        flags: usize,
        intensity: usize,
        scan_angle: usize,
        user_data: usize,
        point_source: usize,
        gps_time: usize,
    }

    impl LayerSizes {
        fn read_from<R: Read>(src: &mut R) -> std::io::Result<Self> {
            Ok(Self {
                channel_returns_xy: src.read_u32::<LittleEndian>()? as usize,
                z: src.read_u32::<LittleEndian>()? as usize,
                classification: src.read_u32::<LittleEndian>()? as usize,
                flags: src.read_u32::<LittleEndian>()? as usize,
                intensity: src.read_u32::<LittleEndian>()? as usize,
                scan_angle: src.read_u32::<LittleEndian>()? as usize,
                user_data: src.read_u32::<LittleEndian>()? as usize,
                point_source: src.read_u32::<LittleEndian>()? as usize,
                gps_time: src.read_u32::<LittleEndian>()? as usize,
            })
        }
    }

    pub struct Point14Decompressor {
        decoders: Point14Decoders,
        changed: ChangedLayers,
        layers_sizes: LayerSizes,
        current_context: usize,
        contexts: Vec<ChannelDecompressor>,
    }

    impl Default for Point14Decompressor {
        fn default() -> Self {
            Self {
                decoders: Point14Decoders::default(),
                changed: ChangedLayers::default(),
                layers_sizes: LayerSizes::default(),
                current_context: 0,
                contexts: (0..NUM_CONTEXTS)
                    .map(|_| ChannelDecompressor::unused())
                    .collect(),
            }
        }
    }

    impl<R: Read> LayeredFieldDecompressor<R> for Point14Decompressor {
        fn size_of_field(&self) -> usize {
            Point14::SIZE
        }

        fn init_first_point(
            &mut self,
            src: &mut R,
            first_point: &mut [u8],
            context: &mut usize,
        ) -> std::io::Result<()> {
            src.read_exact(&mut first_point[..Point14::SIZE])?;
            let point = Point14::unpack_from(first_point);
            for context in &mut self.contexts {
                context.state.unused = true;
            }
            self.current_context = point.scanner_channel() as usize;
            *context = self.current_context;
            self.contexts[self.current_context] = ChannelDecompressor::from_last_point(&point);
            Ok(())
        }

        fn decompress_field_with(
            &mut self,
            current_point: &mut [u8],
            context: &mut usize,
        ) -> std::io::Result<()> {
            let changed_values = {
                let previous = &mut self.contexts[self.current_context].state;
                let lpr = last_point_return(&previous.last_point, previous.gps_time_change);
                self.decoders
                    .channel_returns_xy
                    .decode_symbol(&mut previous.changed_values[lpr])?
            };

            if changed_values & CHANNEL_CHANGED != 0 {
                let diff = self.decoders.channel_returns_xy.decode_symbol(
                    &mut self.contexts[self.current_context].state.scanner_channel,
                )?;
                let channel = (self.current_context + diff as usize + 1) % NUM_CONTEXTS;
                if self.contexts[channel].state.unused {
                    let last_point = self.contexts[self.current_context].state.last_point;
                    self.contexts[channel] = ChannelDecompressor::from_last_point(&last_point);
                }
                self.current_context = channel;
            }
            *context = self.current_context;

            let point_source_changed = changed_values & POINT_SOURCE_CHANGED != 0;
            let gps_time_changed = changed_values & GPS_TIME_CHANGED != 0;
            let scan_angle_changed = changed_values & SCAN_ANGLE_CHANGED != 0;

            let decoders = &mut self.decoders;
            let changed = &self.changed;
            let the_context = &mut self.contexts[self.current_context];
            let state = &mut the_context.state;
            let last_point = &mut state.last_point;
            last_point.set_scanner_channel(self.current_context as u8);

            let last_n = last_point.number_of_returns();
            let last_r = last_point.return_number();

            let n = if changed_values & NUMBER_OF_RETURNS_CHANGED != 0 {
                decoders
                    .channel_returns_xy
                    .decode_symbol(lazy_model(&mut state.number_of_returns[last_n as usize], 16))?
                    as u8
            } else {
                last_n
            };
            last_point.set_number_of_returns(n);

            let r = match changed_values & 3 {
                0 => last_r,
                1 => (last_r + 1) % 16,
                2 => (last_r + 15) % 16,
                _ => {
                    if gps_time_changed {
                        decoders.channel_returns_xy.decode_symbol(lazy_model(
                            &mut state.return_number[last_r as usize],
                            16,
                        ))? as u8
                    } else {
                        let sym = decoders
                            .channel_returns_xy
                            .decode_symbol(&mut state.return_number_gps_same)?;
                        ((u32::from(last_r) + sym + 2) % 16) as u8
                    }
                }
            };
            last_point.set_return_number(r);

            let m = usize::from(NUMBER_RETURN_MAP_6CTX[n as usize][r as usize]);
            let l = usize::from(NUMBER_RETURN_LEVEL_8CT[n as usize][r as usize]);
            let cpr = current_point_return(r, n);
            let idx = (m << 1) | gps_time_changed as usize;

            let diff = the_context.id_dx.decompress(
                &mut decoders.channel_returns_xy,
                state.last_x_diff_median5[idx].get(),
                (n == 1) as u32,
            )?;
            last_point.x = last_point.x.wrapping_add(diff);
            state.last_x_diff_median5[idx].add(diff);

            let diff = the_context.id_dy.decompress(
                &mut decoders.channel_returns_xy,
                state.last_y_diff_median5[idx].get(),
                y_context(n, the_context.id_dx.k()),
            )?;
            last_point.y = last_point.y.wrapping_add(diff);
            state.last_y_diff_median5[idx].add(diff);

            if changed.z {
                let k_bits = (the_context.id_dx.k() + the_context.id_dy.k()) / 2;
                last_point.z = the_context.id_z.decompress(
                    &mut decoders.z,
                    state.last_z[l],
                    z_context(n, k_bits),
                )?;
                state.last_z[l] = last_point.z;
            }

            if changed.classification {
                let ccc = (((last_point.classification & 0x1F) << 1) + (cpr == 3) as u8) as usize;
                last_point.classification = decoders
                    .classification
                    .decode_symbol(lazy_model(&mut state.classification[ccc], 256))?
                    as u8;
            }

            if changed.flags {
                let last_flags = last_point.coded_flags() as usize;
                let flags = decoders
                    .flags
                    .decode_symbol(lazy_model(&mut state.flags[last_flags], 64))?;
                last_point.set_coded_flags(flags as u8);
            }

            if changed.intensity {
                let idx = ((cpr << 1) | gps_time_changed as u32) as usize;
                last_point.intensity = the_context.id_intensity.decompress(
                    &mut decoders.intensity,
                    i32::from(state.last_intensities[idx]),
                    cpr,
                )? as u16;
                state.last_intensities[idx] = last_point.intensity;
            }

            if changed.scan_angle && scan_angle_changed {
                last_point.scan_angle = the_context.id_scan_angle.decompress(
                    &mut decoders.scan_angle,
                    i32::from(last_point.scan_angle),
                    gps_time_changed as u32,
                )? as i16;
            }

            if changed.user_data {
                let model = lazy_model(&mut state.user_data[(last_point.user_data / 4) as usize], 256);
                last_point.user_data = decoders.user_data.decode_symbol(model)? as u8;
            }

            if changed.point_source && point_source_changed {
                last_point.point_source_id = the_context.id_point_source.decompress(
                    &mut decoders.point_source,
                    i32::from(last_point.point_source_id),
                    0,
                )? as u16;
            }

            the_context.state.gps_time_change = gps_time_changed;
            if changed.gps_time && gps_time_changed {
                let time = the_context.read_gps_time(&mut decoders.gps_time)?;
                the_context.state.last_point.gps_time = time;
            }

            the_context.state.last_point.pack_into(current_point);
            Ok(())
        }

        fn read_layers_sizes(&mut self, src: &mut R) -> std::io::Result<()> {
            self.layers_sizes = LayerSizes::read_from(src)?;
            Ok(())
        }

        fn read_layers(&mut self, src: &mut R) -> std::io::Result<()> {
            let sizes = self.layers_sizes;
            let decoders = &mut self.decoders;
            copy_bytes_into_decoder(sizes.channel_returns_xy, &mut decoders.channel_returns_xy, src)?;
            self.changed = ChangedLayers {
                z: copy_bytes_into_decoder(sizes.z, &mut decoders.z, src)?,
                classification: copy_bytes_into_decoder(
                    sizes.classification,
                    &mut decoders.classification,
                    src,
                )?,
                flags: copy_bytes_into_decoder(sizes.flags, &mut decoders.flags, src)?,
                intensity: copy_bytes_into_decoder(sizes.intensity, &mut decoders.intensity, src)?,
                scan_angle: copy_bytes_into_decoder(
                    sizes.scan_angle,
                    &mut decoders.scan_angle,
                    src,
                )?,
                user_data: copy_bytes_into_decoder(sizes.user_data, &mut decoders.user_data, src)?,
                point_source: copy_bytes_into_decoder(
                    sizes.point_source,
                    &mut decoders.point_source,
                    src,
                )?,
                gps_time: copy_bytes_into_decoder(sizes.gps_time, &mut decoders.gps_time, src)?,
            };
            Ok(())
        }
    }

    #[cfg(test)]
    mod test {
        use super::*;

        fn make_point(i: u32) -> Point14 {
            let mut point = Point14 {
                x: (i * 13) as i32 - 500,
                y: 100_000 - (i * 7) as i32,
                z: ((i * 31) % 400) as i32,
                intensity: (i * 97 % 4096) as u16,
                bit_fields: 0,
                flags: (i % 3) as u8,
                classification: (i / 50 % 4) as u8 + 1,
                user_data: (i / 200) as u8,
                scan_angle: (i % 11) as i16 * 300 - 1500,
                point_source_id: 7 + (i / 300) as u16,
                gps_time: GpsTime::from(1000.0 + f64::from(i / 2) * 0.000_25),
            };
            let n = (i % 4) as u8 + 1;
            point.set_number_of_returns(n);
            point.set_return_number((i % u32::from(n)) as u8 + 1);
            point.set_scanner_channel(((i / 37) % 4) as u8);
            if i % 17 == 0 {
                point.flags |= 0b1100_0000;
            }
            if i == 400 {
                // a jump that needs a full 64 bits time
                point.gps_time = GpsTime::from(5.0e8);
            }
            point
        }

        fn compress(points: &[Point14]) -> Vec<u8> {
            let mut compressor = Point14Compressor::default();
            let mut out = Cursor::new(Vec::<u8>::new());
            let mut buf = [0u8; Point14::SIZE];
            let mut context = 0usize;
            points[0].pack_into(&mut buf);
            compressor
                .init_first_point(&mut out, &buf, &mut context)
                .unwrap();
            for point in &points[1..] {
                point.pack_into(&mut buf);
                LayeredFieldCompressor::<Cursor<Vec<u8>>>::compress_field_with(
                    &mut compressor,
                    &buf,
                    &mut context,
                )
                .unwrap();
                assert_eq!(context, point.scanner_channel() as usize);
            }
            compressor.write_layers_sizes(&mut out).unwrap();
            compressor.write_layers(&mut out).unwrap();
            out.into_inner()
        }

        fn decompress(data: Vec<u8>, count: usize) -> Vec<Point14> {
            let mut decompressor = Point14Decompressor::default();
            let mut src = Cursor::new(data);
            let mut buf = [0u8; Point14::SIZE];
            let mut context = 0usize;
            decompressor
                .init_first_point(&mut src, &mut buf, &mut context)
                .unwrap();
            decompressor.read_layers_sizes(&mut src).unwrap();
            decompressor.read_layers(&mut src).unwrap();
            assert_eq!(src.position() as usize, src.get_ref().len());

            let mut points = vec![Point14::unpack_from(&buf)];
            for _ in 1..count {
                LayeredFieldDecompressor::<Cursor<Vec<u8>>>::decompress_field_with(
                    &mut decompressor,
                    &mut buf,
                    &mut context,
                )
                .unwrap();
                points.push(Point14::unpack_from(&buf));
            }
            points
        }

        #[test]
        fn test_point14_round_trip() {
            let points: Vec<Point14> = (0..1000).map(make_point).collect();
            let data = compress(&points);
            assert_eq!(decompress(data, points.len()), points);
        }

        #[test]
        fn test_unchanged_fields_leave_empty_layers() {
            let points: Vec<Point14> = (0..50)
                .map(|i| Point14 {
                    x: i,
                    y: -i,
                    z: 12,
                    intensity: 100,
                    bit_fields: 0x11,
                    classification: 2,
                    gps_time: GpsTime::from(7.0),
                    ..Default::default()
                })
                .collect();
            let data = compress(&points);
            let sizes: Vec<u32> = data[Point14::SIZE..Point14::SIZE + 36]
                .chunks_exact(4)
                .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect();
            assert!(sizes[0] > 0);
            assert!(sizes[1..].iter().all(|size| *size == 0));
            assert_eq!(data.len(), Point14::SIZE + 36 + sizes[0] as usize);
            assert_eq!(decompress(data, points.len()), points);
        }

        #[test]
        fn test_coded_flags() {
            let mut point = Point14::default();
            point.flags = 0b1110_0101;
            assert_eq!(point.scanner_channel(), 2);
            assert_eq!(point.coded_flags(), 0b0011_0101);

            let mut other = Point14::default();
            other.set_scanner_channel(2);
            other.set_coded_flags(point.coded_flags());
            assert_eq!(other.flags, point.flags);
        }
    }
}
