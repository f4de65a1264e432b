/*
===============================================================================

  CONTENTS:

    Integer decompressor

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

use std::io::Read;

use crate::compressors::{CorrectorRange, DEFAULT_BITS, DEFAULT_BITS_HIGH, DEFAULT_CONTEXTS, DEFAULT_RANGE};
use crate::decoders::ArithmeticDecoder;
use crate::models::{ArithmeticBitModel, ArithmeticModel};

/// Inverse of the [`IntegerCompressor`](../compressors/struct.IntegerCompressor.html)
#[derive(Debug, Clone)]
pub struct IntegerDecompressor {
    k: u32,

    contexts: u32,
    bits_high: u32,
    corrector_range: CorrectorRange,

    m_bits: Vec<ArithmeticModel>,
    m_corrector0: ArithmeticBitModel,
    m_corrector: Vec<ArithmeticModel>,
}

impl IntegerDecompressor {
    pub fn new(bits: u32, contexts: u32, bits_high: u32, range: u32) -> Self {
        Self {
            k: 0,
            contexts,
            bits_high,
            corrector_range: CorrectorRange::new(bits, range),
            m_bits: vec![],
            m_corrector0: ArithmeticBitModel::new(),
            m_corrector: vec![],
        }
    }

    pub fn k(&self) -> u32 {
        self.k
    }

    pub fn init(&mut self) {
        if self.m_bits.is_empty() {
            let (m_bits, m_corrector) = self.corrector_range.models(self.contexts, self.bits_high);
            self.m_bits = m_bits;
            self.m_corrector = m_corrector;
        }
    }

    pub fn decompress<T: Read>(
        &mut self,
        dec: &mut ArithmeticDecoder<T>,
        pred: i32,
        context: u32,
    ) -> std::io::Result<i32> {
        debug_assert!(!self.m_bits.is_empty(), "decompressor used before init");
        let corr = self.read_corrector(dec, context as usize)?;
        let range = self.corrector_range.range as i32;
        let mut real = pred.wrapping_add(corr);
        if real < 0 {
            real = real.wrapping_add(range);
        } else if real >= range {
            real = real.wrapping_sub(range);
        }
        Ok(real)
    }

    fn read_corrector<T: Read>(
        &mut self,
        dec: &mut ArithmeticDecoder<T>,
        context: usize,
    ) -> std::io::Result<i32> {
        // decode within which interval the corrector is falling
        self.k = dec.decode_symbol(&mut self.m_bits[context])?;

        if self.k == 0 {
            // then c is 0 or 1
            return Ok(dec.decode_bit(&mut self.m_corrector0)? as i32);
        }

        if self.k >= 32 {
            return Ok(self.corrector_range.min);
        }

        let model = &mut self.m_corrector[(self.k - 1) as usize];
        let mut c = if self.k <= self.bits_high {
            // for small k we can do this in one step
            dec.decode_symbol(model)? as i32
        } else {
            // for larger k the higher bits come from the model, the lower ones are raw
            let k1 = self.k - self.bits_high;
            let high = dec.decode_symbol(model)? as i32;
            let low = dec.read_bits(k1)?;
            (high << k1 as i32) | low as i32
        };

        // translate c back into its correct interval
        if c >= (1u32 << (self.k - 1)) as i32 {
            // [ 2^(k-1) + 1  ...  2^k ]
            c += 1;
        } else {
            // [ - (2^k - 1)  ...  - (2^(k-1)) ]
            c -= ((1u32 << self.k) - 1) as i32;
        }
        Ok(c)
    }
}

pub struct IntegerDecompressorBuilder {
    bits: u32,
    contexts: u32,
    bits_high: u32,
    range: u32,
}

impl IntegerDecompressorBuilder {
    pub fn new() -> Self {
        Self {
            bits: DEFAULT_BITS,
            contexts: DEFAULT_CONTEXTS,
            bits_high: DEFAULT_BITS_HIGH,
            range: DEFAULT_RANGE,
        }
    }

    pub fn bits(&mut self, bits: u32) -> &mut Self {
        self.bits = bits;
        self
    }

    pub fn contexts(&mut self, contexts: u32) -> &mut Self {
        self.contexts = contexts;
        self
    }

    pub fn build(&self) -> IntegerDecompressor {
        IntegerDecompressor::new(self.bits, self.contexts, self.bits_high, self.range)
    }

    pub fn build_initialized(&self) -> IntegerDecompressor {
        let mut idc = self.build();
        idc.init();
        idc
    }
}

impl Default for IntegerDecompressorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use crate::compressors::IntegerCompressorBuilder;
    use crate::decoders::ArithmeticDecoder;
    use crate::encoders::ArithmeticEncoder;

    use super::*;

    fn round_trip(bits: u32, values: &[(i32, i32)]) {
        let mut encoder = ArithmeticEncoder::new(Cursor::new(Vec::<u8>::new()));
        let mut ic = IntegerCompressorBuilder::new()
            .bits(bits)
            .contexts(2)
            .build_initialized();
        for (i, (pred, real)) in values.iter().enumerate() {
            ic.compress(&mut encoder, *pred, *real, (i % 2) as u32).unwrap();
        }
        encoder.done().unwrap();
        let data = encoder.into_stream().into_inner();

        let mut decoder = ArithmeticDecoder::new(Cursor::new(data));
        decoder.read_init_bytes().unwrap();
        let mut idc = IntegerDecompressorBuilder::new()
            .bits(bits)
            .contexts(2)
            .build_initialized();
        for (i, (pred, real)) in values.iter().enumerate() {
            let decompressed = idc.decompress(&mut decoder, *pred, (i % 2) as u32).unwrap();
            assert_eq!(decompressed, *real, "value #{}", i);
        }
    }

    #[test]
    fn test_32_bits_extremes() {
        round_trip(
            32,
            &[
                (0, 0),
                (0, 1),
                (0, -1),
                (i32::MAX, i32::MIN),
                (i32::MIN, i32::MAX),
                (-5, 1 << 30),
                (17, 17),
                (1000, -1000),
            ],
        );
    }

    #[test]
    fn test_16_bits_unsigned_values() {
        round_trip(
            16,
            &[(0, 65535), (65535, 0), (40000, 12), (12, 12), (300, 301)],
        );
    }

    #[test]
    fn test_8_bits_values() {
        let values: Vec<(i32, i32)> = (0..600).map(|i| ((i * 3) % 256, (i * 7) % 256)).collect();
        round_trip(8, &values);
    }
}
