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

//! Little endian (un)packing of the values found in point records.
//!
//! Callers always hand slices of exactly the right size,
//! the record layer slices the point buffer using the item sizes.

/// Types that can be read from / written to a little endian byte slice.
pub trait Packable: Sized {
    /// Number of bytes taken by the packed value
    const SIZE: usize;

    fn unpack_from(input: &[u8]) -> Self;
    fn pack_into(&self, output: &mut [u8]);
}

macro_rules! impl_packable_for_primitive {
    ($($t:ty),*) => {
        $(
            impl Packable for $t {
                const SIZE: usize = std::mem::size_of::<$t>();

                #[inline]
                fn unpack_from(input: &[u8]) -> Self {
                    let mut bytes = [0u8; std::mem::size_of::<$t>()];
                    bytes.copy_from_slice(&input[..Self::SIZE]);
                    <$t>::from_le_bytes(bytes)
                }

                #[inline]
                fn pack_into(&self, output: &mut [u8]) {
                    output[..Self::SIZE].copy_from_slice(&self.to_le_bytes());
                }
            }
        )*
    };
}

impl_packable_for_primitive!(u8, i8, u16, i16, u32, i32, u64, i64);
