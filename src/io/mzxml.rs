//! Reading the legacy nested mzXML dialect.
//!
//! Derived scans nest inside the scan they were acquired from, so the parent
//! scan number is taken from the enclosing element rather than declared.
mod reader;

pub use reader::{
    parse_retention_time, MzXMLHandler, MzXMLParserError, MzXMLParserResult, MzXMLParserState, MzXMLReader,
    MzXMLReaderType, MzXMLSAXParser, MzXMLSpectrumBuilder,
};
