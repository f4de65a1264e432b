/*
===============================================================================

  CONTENTS:

    Integer compressor

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

use std::io::Write;

use crate::encoders::ArithmeticEncoder;
use crate::models::{ArithmeticBitModel, ArithmeticModel, ArithmeticModelBuilder};

pub const DEFAULT_BITS: u32 = 16;
pub const DEFAULT_CONTEXTS: u32 = 1;
pub const DEFAULT_BITS_HIGH: u32 = 8;
pub const DEFAULT_RANGE: u32 = 0;

/// Interval the corrector (real - predicted) is folded into.
#[derive(Debug, Copy, Clone, PartialEq)]
pub(crate) struct CorrectorRange {
    pub(crate) bits: u32,
    pub(crate) range: u32,
    pub(crate) min: i32,
    pub(crate) max: i32,
}

impl CorrectorRange {
    pub(crate) fn new(bits: u32, mut range: u32) -> Self {
        if range != 0 {
            let corr_range = range;
            let mut corr_bits = 0u32;
            while range != 0 {
                range >>= 1;
                corr_bits += 1;
            }
            if corr_range == (1u32 << (corr_bits - 1)) {
                corr_bits -= 1;
            }
            let min = -((corr_range / 2) as i32);
            Self {
                bits: corr_bits,
                range: corr_range,
                min,
                max: min + (corr_range - 1) as i32,
            }
        } else if bits >= 1 && bits < 32 {
            let corr_range = 1u32 << bits;
            let min = -((corr_range / 2) as i32);
            Self {
                bits,
                range: corr_range,
                min,
                max: min + (corr_range - 1) as i32,
            }
        } else {
            Self {
                bits: 32,
                range: 0,
                min: i32::MIN,
                max: i32::MAX,
            }
        }
    }

    /// The models used to code `k` (one per context) and the
    /// models used to code the corrector inside each k-interval.
    pub(crate) fn models(&self, contexts: u32, bits_high: u32) -> (Vec<ArithmeticModel>, Vec<ArithmeticModel>) {
        let k_models = (0..contexts)
            .map(|_| ArithmeticModelBuilder::new(self.bits + 1).build())
            .collect();
        let corrector_models = (1..=self.bits)
            .map(|i| {
                let symbols = if i <= bits_high {
                    1 << i
                } else {
                    1 << bits_high
                };
                ArithmeticModelBuilder::new(symbols).build()
            })
            .collect();
        (k_models, corrector_models)
    }
}

/// Compresses integers as a correction to a prediction
#[derive(Debug, Clone)]
pub struct IntegerCompressor {
    k: u32,

    contexts: u32,
    bits_high: u32,
    corrector_range: CorrectorRange,

    m_bits: Vec<ArithmeticModel>,
    m_corrector_0: ArithmeticBitModel,
    m_corrector: Vec<ArithmeticModel>,
}

impl IntegerCompressor {
    pub fn new(bits: u32, contexts: u32, bits_high: u32, range: u32) -> Self {
        Self {
            k: 0,
            contexts,
            bits_high,
            corrector_range: CorrectorRange::new(bits, range),
            m_bits: vec![],
            m_corrector_0: ArithmeticBitModel::new(),
            m_corrector: vec![],
        }
    }

    /// Number of bits of the last corrector, used by callers to pick contexts.
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

    pub fn compress<T: Write>(
        &mut self,
        encoder: &mut ArithmeticEncoder<T>,
        pred: i32,
        real: i32,
        context: u32,
    ) -> std::io::Result<()> {
        debug_assert!(!self.m_bits.is_empty(), "compressor used before init");
        let range = self.corrector_range;
        // the corrector will be within the interval [ - (corr_range - 1)  ...  + (corr_range - 1) ]
        let mut corr = real.wrapping_sub(pred);
        // we fold the corrector into the interval [ corr_min  ...  corr_max ]
        if corr < range.min {
            corr = corr.wrapping_add(range.range as i32);
        } else if corr > range.max {
            corr = corr.wrapping_sub(range.range as i32);
        }
        self.write_corrector(encoder, corr, context as usize)
    }

    fn write_corrector<T: Write>(
        &mut self,
        encoder: &mut ArithmeticEncoder<T>,
        mut c: i32,
        context: usize,
    ) -> std::io::Result<()> {
        // find the tightest interval [ - (2^k - 1)  ...  + (2^k) ] that contains c
        // by checking the absolute value of c (adjusted for the case that c is 2^k)
        let mut c1 = if c <= 0 { c.wrapping_neg() } else { c - 1 } as u32;
        self.k = 0;
        while c1 != 0 {
            c1 >>= 1;
            self.k += 1;
        }

        // the number k is between 0 and corr_bits and describes the interval the corrector
        encoder.encode_symbol(&mut self.m_bits[context], self.k)?;

        if self.k == 0 {
            // then c is 0 or 1
            debug_assert!(c == 0 || c == 1);
            return encoder.encode_bit(&mut self.m_corrector_0, c as u32);
        }

        if self.k < 32 {
            // translate the corrector c into the k-bit interval [ 0 ... 2^k - 1 ]
            if c >= 0 {
                // into [ 2^(k-1) ...  + 2^k - 1 ]
                c -= 1;
            } else {
                // into [ 0 ...  + 2^(k-1) - 1 ]
                c += ((1u32 << self.k) - 1) as i32;
            }

            let model = &mut self.m_corrector[(self.k - 1) as usize];
            if self.k <= self.bits_high {
                // small k: code the interval in one step
                encoder.encode_symbol(model, c as u32)?;
            } else {
                // large k: high bits with the model, the k1 lower bits raw
                let k1 = self.k - self.bits_high;
                let low = (c & ((1u32 << k1) - 1) as i32) as u32;
                c >>= k1 as i32;
                encoder.encode_symbol(model, c as u32)?;
                encoder.write_bits(k1, low)?;
            }
        }
        Ok(())
    }
}

pub struct IntegerCompressorBuilder {
    bits: u32,
    contexts: u32,
    bits_high: u32,
    range: u32,
}

impl IntegerCompressorBuilder {
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

    pub fn build(&self) -> IntegerCompressor {
        IntegerCompressor::new(self.bits, self.contexts, self.bits_high, self.range)
    }

    pub fn build_initialized(&self) -> IntegerCompressor {
        let mut ic = self.build();
        ic.init();
        ic
    }
}

impl Default for IntegerCompressorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_corrector_range_from_bits() {
        let r = CorrectorRange::new(8, 0);
        assert_eq!(r, CorrectorRange { bits: 8, range: 256, min: -128, max: 127 });

        let r = CorrectorRange::new(32, 0);
        assert_eq!(r.range, 0);
        assert_eq!((r.min, r.max), (i32::MIN, i32::MAX));
    }

    #[test]
    fn test_corrector_range_from_range() {
        // a power of two range needs one bit less
        let r = CorrectorRange::new(16, 256);
        assert_eq!(r.bits, 8);
        let r = CorrectorRange::new(16, 300);
        assert_eq!(r.bits, 9);
        assert_eq!(r.min, -150);
        assert_eq!(r.max, 149);
    }
}
