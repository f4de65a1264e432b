//! Definitions of error related things.

use crate::laszip::{CompressorType, LazItemType};
use std::fmt;

/// Errors of this crate
#[derive(Debug)]
#[non_exhaustive]
pub enum LasZipError {
    /// A dimension or a whole schema cannot be handled by the codecs
    InvalidSchema(String),
    /// The compressed bytes do not decode to what they claim to hold
    CorruptStream(&'static str),
    /// The length of a points buffer is not a whole number of records
    InsufficientInput { buffer_len: usize, record_size: usize },
    /// A chunk size of 0 points was requested
    InvalidChunkSize(u32),
    /// The laszip vlr data size disagrees with what it declares
    FormatMismatch { expected: usize, actual: usize },
    /// The Laz item is not known
    UnknownLazItem(u16),
    /// The compression version used for the item is not supported
    UnsupportedLazItemVersion(LazItemType, u16),
    /// The type of compressor used is not known
    UnknownCompressorType(u16),
    /// The type of compressor exists but it is not supported
    UnsupportedCompressorType(CompressorType),
    /// The chunk table could not be found in the data
    /// and it is required for the operation.
    MissingChunkTable,
    /// A chunk was requested that is not in the chunk table
    ChunkIndexOutOfBounds { index: usize, count: usize },
    /// Wrapper around an io error from the std lib
    IoError(std::io::Error),
}

impl From<std::io::Error> for LasZipError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            LasZipError::CorruptStream("unexpected end of compressed data")
        } else {
            LasZipError::IoError(e)
        }
    }
}

impl fmt::Display for LasZipError {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match self {
            LasZipError::InvalidSchema(reason) => write!(f, "Invalid schema: {}", reason),
            LasZipError::CorruptStream(reason) => write!(f, "Corrupt stream: {}", reason),
            LasZipError::InsufficientInput {
                buffer_len: bl,
                record_size: rs,
            } => write!(
                f,
                "The len of the buffer ({}) is not a multiple of the record size {}",
                bl, rs
            ),
            LasZipError::InvalidChunkSize(size) => {
                write!(f, "Chunk size {} is not valid, chunks hold at least 1 point", size)
            }
            LasZipError::FormatMismatch { expected, actual } => write!(
                f,
                "Format mismatch: expected {} bytes, got {}",
                expected, actual
            ),
            LasZipError::UnknownLazItem(t) => write!(f, "Item with type code: {} is unknown", t),
            LasZipError::UnsupportedLazItemVersion(item_type, version) => write!(
                f,
                "Item {:?} with compression version: {} is not supported",
                item_type, version
            ),
            LasZipError::UnknownCompressorType(compressor_type) => {
                write!(f, "Compressor type {} is not valid", compressor_type)
            }
            LasZipError::UnsupportedCompressorType(compressor_type) => {
                write!(f, "Compressor type {:?} is not supported", compressor_type)
            }
            LasZipError::MissingChunkTable => write!(f, "The chunk table could not be found"),
            LasZipError::ChunkIndexOutOfBounds { index, count } => write!(
                f,
                "Chunk {} requested but there are only {} chunks",
                index, count
            ),
            LasZipError::IoError(e) => write!(f, "IoError: {}", e),
        }
    }
}

impl std::error::Error for LasZipError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LasZipError::IoError(e) => Some(e),
            _ => None,
        }
    }
}
