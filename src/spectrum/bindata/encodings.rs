use std::fmt::Display;
use std::io::{self, Write};

use flate2::write::{ZlibDecoder, ZlibEncoder};
use flate2::Compression;
use thiserror::{self, Error};

pub type Bytes = Vec<u8>;

pub(crate) const fn is_target_little_endian() -> bool {
    u16::from_ne_bytes([1, 0]) == 1
}

/// The kinds of signal channels a spectrum's binary data may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ArrayType {
    #[default]
    Unknown,
    MZArray,
    IntensityArray,
    SignalToNoiseArray,
    /// A single array of alternating m/z and intensity values
    InterleavedArray,
}

impl Display for ArrayType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The floating point widths the supported formats may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BinaryDataArrayType {
    #[default]
    Unknown,
    Float16,
    Float32,
    Float64,
}

impl Display for BinaryDataArrayType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl BinaryDataArrayType {
    /// Get the size in bytes of a single value of this type
    pub const fn size_of(&self) -> usize {
        match self {
            Self::Unknown => 1,
            Self::Float16 => 2,
            Self::Float32 => 4,
            Self::Float64 => 8,
        }
    }

    pub const fn bits(&self) -> u32 {
        match self {
            Self::Unknown => 0,
            Self::Float16 => 16,
            Self::Float32 => 32,
            Self::Float64 => 64,
        }
    }

    /// Resolve a declared precision in bits
    pub fn from_bits(bits: u32) -> Result<Self, ArrayRetrievalError> {
        match bits {
            16 => Ok(Self::Float16),
            32 => Ok(Self::Float32),
            64 => Ok(Self::Float64),
            _ => Err(ArrayRetrievalError::UnsupportedPrecision(bits)),
        }
    }
}

/// The byte order of encoded values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ByteOrder {
    Big,
    Little,
    /// Whatever the host uses
    #[default]
    Native,
}

impl ByteOrder {
    /// Interpret a document's byte order label. `network` is big-endian.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "network" | "big" => Some(Self::Big),
            "little" => Some(Self::Little),
            _ => None,
        }
    }

    /// Whether values in this order must be byte swapped on the current target
    pub const fn needs_swap(&self) -> bool {
        match self {
            Self::Big => is_target_little_endian(),
            Self::Little => !is_target_little_endian(),
            Self::Native => false,
        }
    }
}

/// The compression applied to the bytes before base64 encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BinaryCompressionType {
    #[default]
    NoCompression,
    Zlib,
}

impl BinaryCompressionType {
    /// Interpret a document's compression label
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "zlib" => Some(Self::Zlib),
            "none" | "" => Some(Self::NoCompression),
            _ => None,
        }
    }
}

impl Display for BinaryCompressionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A high level set of failure modes that decoding a spectrum's packed signal
/// arrays may encounter.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ArrayRetrievalError {
    #[error("Array type {0:?} not found")]
    NotFound(ArrayType),
    #[error("An error occurred while decompressing: {0}")]
    DecompressionError(String),
    #[error("An error occurred while decoding base64 text: {0}")]
    Base64Error(String),
    #[error("The requested data type does not match the number of bytes available in the buffer")]
    DataTypeSizeMismatch,
    #[error("{0}-bit values are not supported")]
    UnsupportedPrecision(u32),
    #[error("Signal arrays have mismatched lengths ({0} vs {1})")]
    LengthMismatch(usize, usize),
}

impl From<bytemuck::PodCastError> for ArrayRetrievalError {
    fn from(_: bytemuck::PodCastError) -> Self {
        Self::DataTypeSizeMismatch
    }
}

impl From<ArrayRetrievalError> for io::Error {
    fn from(value: ArrayRetrievalError) -> Self {
        match value {
            ArrayRetrievalError::NotFound(_) => io::Error::new(io::ErrorKind::NotFound, value),
            ArrayRetrievalError::UnsupportedPrecision(_) => {
                io::Error::new(io::ErrorKind::Unsupported, value)
            }
            _ => io::Error::new(io::ErrorKind::InvalidData, value),
        }
    }
}

/// Decode base64 text, ignoring any whitespace an XML serializer wrapped it in
pub fn decode_base64(text: &[u8]) -> Result<Bytes, ArrayRetrievalError> {
    if text.iter().any(|b| b.is_ascii_whitespace()) {
        let compact: Bytes = text
            .iter()
            .copied()
            .filter(|b| !b.is_ascii_whitespace())
            .collect();
        base64_simd::STANDARD
            .decode_type::<Bytes>(&compact)
            .map_err(|e| ArrayRetrievalError::Base64Error(e.to_string()))
    } else {
        base64_simd::STANDARD
            .decode_type::<Bytes>(text)
            .map_err(|e| ArrayRetrievalError::Base64Error(e.to_string()))
    }
}

pub fn decompress_zlib(bytestring: &[u8]) -> Result<Bytes, ArrayRetrievalError> {
    let result = Bytes::new();
    let mut decompressor = ZlibDecoder::new(result);
    decompressor
        .write_all(bytestring)
        .map_err(|e| ArrayRetrievalError::DecompressionError(e.to_string()))?;
    decompressor
        .finish()
        .map_err(|e| ArrayRetrievalError::DecompressionError(e.to_string()))
}

pub fn compress_zlib(bytestring: &[u8]) -> io::Result<Bytes> {
    let result = Bytes::new();
    let mut compressor = ZlibEncoder::new(result, Compression::best());
    compressor.write_all(bytestring)?;
    compressor.finish()
}
