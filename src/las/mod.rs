//! Codecs of the LAS items (point formats 0 to 10 and extra bytes).
//!
//! The items of the point formats 0 to 5 are coded point-wise,
//! with version 2 of their codecs (version 1 for the wave packet, which has no other).
//! The items of the point formats 6 to 10 are coded in layers, with version 3.

pub mod extra_bytes;
pub mod gps;
pub mod nir;
pub mod point10;
pub mod point14;
pub mod rgb;
pub mod wavepacket;

pub(crate) mod utils;

pub use gps::GpsTime;
pub use point10::Point10;
pub use point14::Point14;
pub use rgb::RGB;
pub use wavepacket::WavePacket;

pub mod v2 {
    pub use crate::las::extra_bytes::v2::{ExtraBytesCompressor, ExtraBytesDecompressor};
    pub use crate::las::gps::v2::{GpsTimeCompressor, GpsTimeDecompressor};
    pub use crate::las::point10::v2::{Point10Compressor, Point10Decompressor};
    pub use crate::las::rgb::v2::{RGBCompressor, RGBDecompressor};
    pub use crate::las::wavepacket::v1::{WavePacketCompressor, WavePacketDecompressor};
}

pub mod v3 {
    pub use crate::las::extra_bytes::v3::{ExtraBytesCompressor, ExtraBytesDecompressor};
    pub use crate::las::nir::v3::{NirCompressor, NirDecompressor};
    pub use crate::las::point14::v3::{Point14Compressor, Point14Decompressor};
    pub use crate::las::rgb::v3::{RGBCompressor, RGBDecompressor};
    pub use crate::las::wavepacket::v3::{WavePacketCompressor, WavePacketDecompressor};
}
