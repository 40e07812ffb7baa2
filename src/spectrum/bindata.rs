//! Decoding of the packed numeric peak arrays carried by the XML dialects
mod array;
mod conversion;
mod encodings;

pub use array::{decode_floats, DataArray};
#[cfg(test)]
pub(crate) use array::encode_array;
pub use conversion::{build_peaks, deinterleave, zip_channels, PeakData, PeakTuple};
pub use encodings::{
    compress_zlib, decode_base64, decompress_zlib, ArrayRetrievalError, ArrayType,
    BinaryCompressionType, BinaryDataArrayType, ByteOrder, Bytes,
};
