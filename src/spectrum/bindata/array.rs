use std::fmt::{self, Formatter};

use bytemuck::Pod;
use num_traits::{AsPrimitive, PrimInt};

use super::encodings::{
    decode_base64, decompress_zlib, ArrayRetrievalError, ArrayType, BinaryCompressionType,
    BinaryDataArrayType, ByteOrder, Bytes,
};

/// Represents a single encoded signal channel along with the tags needed to
/// decode it.
///
/// The buffer holds the text the document carried (base64), so nothing is
/// decoded until [`DataArray::decode`] is called. Readers that discard a scan
/// never pay for decoding its arrays.
#[derive(Default, Clone)]
pub struct DataArray {
    pub data: Bytes,
    pub dtype: BinaryDataArrayType,
    pub byte_order: ByteOrder,
    pub compression: BinaryCompressionType,
    pub name: ArrayType,
}

impl fmt::Debug for DataArray {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataArray")
            .field("name", &self.name)
            .field("data size", &self.data.len())
            .field("dtype", &self.dtype)
            .field("byte_order", &self.byte_order)
            .field("compression", &self.compression)
            .finish()
    }
}

impl DataArray {
    pub fn new() -> DataArray {
        DataArray {
            ..Default::default()
        }
    }

    pub fn from_name(name: ArrayType) -> DataArray {
        DataArray {
            name,
            ..Default::default()
        }
    }

    pub fn wrap(
        name: ArrayType,
        dtype: BinaryDataArrayType,
        byte_order: ByteOrder,
        compression: BinaryCompressionType,
        data: Bytes,
    ) -> DataArray {
        DataArray {
            data,
            dtype,
            byte_order,
            compression,
            name,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.iter().all(|b| b.is_ascii_whitespace())
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Strip the base64 envelope and undo any compression
    pub fn decode_bytes(&self) -> Result<Bytes, ArrayRetrievalError> {
        if self.is_empty() {
            return Ok(Bytes::new());
        }
        let bytes = decode_base64(&self.data)?;
        match self.compression {
            BinaryCompressionType::NoCompression => Ok(bytes),
            BinaryCompressionType::Zlib => decompress_zlib(&bytes),
        }
    }

    /// Decode the channel into `f64` values, regardless of the stored width
    pub fn decode(&self) -> Result<Vec<f64>, ArrayRetrievalError> {
        let bytes = self.decode_bytes()?;
        decode_floats(&bytes, self.dtype, self.byte_order)
    }
}

fn read_values<U, F>(bytes: &[u8], swap: bool, convert: F) -> Vec<f64>
where
    U: PrimInt + Pod,
    F: Fn(U) -> f64,
{
    bytes
        .chunks_exact(std::mem::size_of::<U>())
        .map(|chunk| {
            let raw: U = bytemuck::pod_read_unaligned(chunk);
            convert(if swap { raw.swap_bytes() } else { raw })
        })
        .collect()
}

/// Reinterpret a dense byte buffer as IEEE floats of the given width and order
pub fn decode_floats(
    bytes: &[u8],
    dtype: BinaryDataArrayType,
    byte_order: ByteOrder,
) -> Result<Vec<f64>, ArrayRetrievalError> {
    let swap = byte_order.needs_swap();
    match dtype {
        BinaryDataArrayType::Float32 | BinaryDataArrayType::Float64 => {
            if bytes.len() % dtype.size_of() != 0 {
                return Err(ArrayRetrievalError::DataTypeSizeMismatch);
            }
        }
        BinaryDataArrayType::Float16 | BinaryDataArrayType::Unknown => {
            return Err(ArrayRetrievalError::UnsupportedPrecision(dtype.bits()))
        }
    }
    let values = if matches!(dtype, BinaryDataArrayType::Float32) {
        read_values(bytes, swap, |raw: u32| f32::from_bits(raw).as_())
    } else {
        read_values(bytes, swap, f64::from_bits)
    };
    Ok(values)
}

/// Pack values the way a document writer would. Only used to build fixtures.
#[cfg(test)]
pub(crate) fn encode_array(
    values: &[f64],
    dtype: BinaryDataArrayType,
    byte_order: ByteOrder,
    compression: BinaryCompressionType,
) -> Bytes {
    let mut bytes = Bytes::with_capacity(values.len() * dtype.size_of());
    for v in values {
        match (dtype, byte_order) {
            (BinaryDataArrayType::Float32, ByteOrder::Big) => {
                bytes.extend((*v as f32).to_be_bytes())
            }
            (BinaryDataArrayType::Float32, ByteOrder::Little) => {
                bytes.extend((*v as f32).to_le_bytes())
            }
            (BinaryDataArrayType::Float32, ByteOrder::Native) => {
                bytes.extend((*v as f32).to_ne_bytes())
            }
            (BinaryDataArrayType::Float64, ByteOrder::Big) => bytes.extend(v.to_be_bytes()),
            (BinaryDataArrayType::Float64, ByteOrder::Little) => bytes.extend(v.to_le_bytes()),
            (BinaryDataArrayType::Float64, ByteOrder::Native) => bytes.extend(v.to_ne_bytes()),
            (BinaryDataArrayType::Float16, _) => bytes.extend([0u8; 2]),
            (BinaryDataArrayType::Unknown, _) => {}
        }
    }
    let bytes = match compression {
        BinaryCompressionType::NoCompression => bytes,
        BinaryCompressionType::Zlib => super::encodings::compress_zlib(&bytes).unwrap(),
    };
    base64_simd::STANDARD.encode_type::<Bytes>(&bytes)
}
