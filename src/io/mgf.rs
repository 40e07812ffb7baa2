//! Read [MGF](https://www.matrixscience.com/help/data_file_help.html#GEN) peak lists.
//!
//! **Requires the `mgf` feature, enabled by default**
mod reader;

pub use reader::{
    parse_charge, MGFError, MGFParser, MGFParserState, MGFReader, MGFReaderType,
    MGFSpectrumBuilder,
};

/// Whether a buffer looks like the start of an MGF document
pub fn is_mgf(buf: &[u8]) -> bool {
    let needle = b"BEGIN IONS";
    buf.windows(needle.len()).any(|window| window == needle)
}
