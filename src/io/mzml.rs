//! Implements a parser for the PSI-MS mzML XML file format for representing
//! raw and processed mass spectra.

mod reader;
mod reading_shared;

pub use crate::io::mzml::reader::{
    parse_scan_number, MzMLReader, MzMLReaderType, MzMLSAXParser,
};
pub use crate::io::mzml::reading_shared::{
    MzMLParserError, MzMLParserState, MzMLSpectrumBuilder, ParserResult,
};
