//! Module with the important struct that people wishing
//! to compress or decompress LAZ point data can use
//!
//! It defines the LaszipCompressor & LaszipDecompressor,
//! the chunk table that indexes their chunks
//! as well as the Laszip VLR data and how to build it
pub use chunk::{decode_chunk, encode_chunk, CHUNK_PADDING_TOLERANCE};
pub use chunk_table::{ChunkTable, ChunkTableEntry};
pub use compression::{compress_buffer, LasZipCompressor};
pub use decompression::{decompress_buffer, LasZipDecompressor};
#[cfg(feature = "parallel")]
pub use parallel::{par_compress, par_compress_buffer, par_decompress_buffer};
pub use vlr::{CompressorType, LazItem, LazItemType, LazVlr, LazVlrBuilder};

pub(crate) mod chunk;
mod chunk_table;
mod compression;
mod decompression;
#[cfg(feature = "parallel")]
mod parallel;
mod vlr;
