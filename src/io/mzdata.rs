//! Reading the legacy mzData dialect, which stores m/z and intensity as two
//! separate big-endian arrays by default.
mod reader;

pub use reader::{
    MzDataHandler, MzDataParserError, MzDataParserResult, MzDataParserState, MzDataReader,
    MzDataReaderType, MzDataSAXParser, MzDataSpectrumBuilder,
};
