//! Schema driven LASzip point compression.
//!
//! Point records are described at run time by a [`RecordSchema`]:
//! the LAS items (point core, gps time, rgb, wave packet, extra bytes
//! and their LAS 1.4 counterparts) and user dimensions of any numeric kind.
//! The codecs are built from the schema and produce the same bytes as LASzip
//! for the LAS point formats 0 to 10.
//!
//! [`LasZipCompressor`] and [`LasZipDecompressor`] are the two types
//! that user wishing to compress and / or decompress chunked LAZ point data should use.
//! Buffer oriented handles, easier to wrap in bindings, are in the [`api`] module.
//!
//! # LasZipCompressor Examples
//!
//! ```
//! use lazperf::{LasZipCompressor, RecordSchema};
//!
//! # fn main() -> lazperf::Result<()> {
//! // Here we use a Cursor but a std::fs::File will work just fine
//! let mut compressed_output = std::io::Cursor::new(vec![]);
//!
//! let mut schema = RecordSchema::new();
//! schema.add_point().add_rgb();
//! let mut compressor = LasZipCompressor::from_schema(&mut compressed_output, &schema)?;
//!
//! let point = vec![0u8; 26];
//! compressor.compress_one(&point)?;
//! compressor.done()?; // don't forget to call done when you are...done compressing
//!
//! # Ok(())
//! # }
//! ```
//!
//! LasZipCompressors can also be constructed from a LazVlr if you need to change the chunk size
//! or if you have the LazVlr from the original LAZ file that you want to write back
//! ```
//! use lazperf::{DimensionKind, LasZipCompressor, LazVlrBuilder, RecordSchema};
//!
//! # fn main() -> lazperf::Result<()> {
//! let mut compressed_output = std::io::Cursor::new(vec![]);
//! let mut schema = RecordSchema::new();
//! schema.add_point().add_gps_time();
//! schema.add_dimension("Reflectance", DimensionKind::Floating, 4)?;
//!
//! let vlr = LazVlrBuilder::from_schema(&schema)
//!           .with_chunk_size(5_000)
//!           .build();
//!
//! let mut compressor = LasZipCompressor::new(&mut compressed_output, vlr)?;
//!
//! let point = vec![0u8; 32];
//! compressor.compress_one(&point)?;
//! compressor.done()?;
//! # Ok(())
//! # }
//! ```
//!
//! To create a [`LasZipDecompressor`] you need the laszip vlr that was used to compress.
//!
//! # LasZipDecompressor Examples
//!
//! ```
//! use lazperf::{compress_buffer, LasZipDecompressor, LazVlr, RecordSchema};
//! use std::io::Cursor;
//!
//! # fn main() -> lazperf::Result<()> {
//! let schema = RecordSchema::for_point_format(3, 0)?;
//! let points: Vec<u8> = (0..34 * 100).map(|i| (i % 251) as u8).collect();
//!
//! let vlr = LazVlr::from_schema(&schema);
//! let mut laz_data = Cursor::new(Vec::<u8>::new());
//! compress_buffer(&mut laz_data, &points, vlr.clone())?;
//!
//! // the vlr is stored in the file as bytes
//! let vlr = LazVlr::from_buffer(&vlr.data())?;
//! laz_data.set_position(0);
//! let mut decompressor = LasZipDecompressor::new(laz_data, vlr)?;
//!
//! let mut decompressed = vec![0u8; points.len()];
//! decompressor.decompress_many(&mut decompressed)?;
//! assert_eq!(decompressed, points);
//! # Ok(())
//! # }
//! ```
//!
//! # Parallelism
//!
//! This crates has an optional feature 'parallel'.
//! When using this feature, additional `par_` methods are exposed.
//!
//! - `par_compress_buffer`
//! - `par_decompress_buffer`

pub(crate) mod compressors;
pub(crate) mod decoders;
pub(crate) mod decompressors;
pub(crate) mod encoders;
pub(crate) mod models;

#[cfg(feature = "parallel")]
mod byteslice;

pub mod api;
pub mod errors;
pub mod field;
pub mod las;
pub mod laszip;
pub mod packers;
pub mod record;
pub mod schema;

pub use api::{Compressor, Decompressor, VlrCompressor, VlrDecompressor};
pub use errors::LasZipError;
#[cfg(feature = "parallel")]
pub use laszip::{par_compress, par_compress_buffer, par_decompress_buffer};
pub use laszip::{
    compress_buffer, decode_chunk, decompress_buffer, encode_chunk, ChunkTable, ChunkTableEntry,
    CompressorType, LasZipCompressor, LasZipDecompressor, LazItem, LazItemType, LazVlr,
    LazVlrBuilder, CHUNK_PADDING_TOLERANCE,
};
pub use schema::{Dimension, DimensionKind, RecordItem, RecordSchema};

/// Result type of the fallible operations of this crate
pub type Result<T> = std::result::Result<T, LasZipError>;
