//! Reading mass spectrometry data file formats and the abstractions shared
//! between them.
//!
//! Every format reader implements [`ScanSource`], which offers three
//! operations: iterate over scan headers, iterate over full scans, and fetch
//! a single scan by number. Each call makes a fresh forward-only pass over the
//! underlying document, so nothing is held open between calls.
//!
//! [`open_file`] picks the right reader for a path.
#[cfg(any(feature = "mzml", feature = "mzxml", feature = "mzdata"))]
mod xml;
mod summary;
pub mod traits;
mod utils;

#[cfg(any(
    feature = "mzml",
    feature = "mzxml",
    feature = "mzdata",
    feature = "mgf",
    feature = "xy"
))]
mod infer_format;

#[cfg(feature = "mgf")]
pub mod mgf;
#[cfg(feature = "mzdata")]
pub mod mzdata;
#[cfg(feature = "mzml")]
pub mod mzml;
#[cfg(feature = "mzxml")]
pub mod mzxml;
#[cfg(feature = "thermo")]
pub mod thermo;
#[cfg(feature = "xy")]
pub mod xy;

#[cfg(any(
    feature = "mzml",
    feature = "mzxml",
    feature = "mzdata",
    feature = "mgf",
    feature = "xy"
))]
pub use crate::io::infer_format::{
    infer_format, infer_from_bytes, infer_from_path, open_file, MZReader, MZReaderType,
    MassSpectrometryFormat,
};

#[cfg(feature = "mgf")]
pub use crate::io::mgf::{MGFError, MGFReader};
#[cfg(feature = "mzdata")]
pub use crate::io::mzdata::{MzDataParserError, MzDataReader};
#[cfg(feature = "mzml")]
pub use crate::io::mzml::{MzMLParserError, MzMLReader};
#[cfg(feature = "mzxml")]
pub use crate::io::mzxml::{MzXMLParserError, MzXMLReader};
#[cfg(feature = "thermo")]
pub use crate::io::thermo::{RawFileAccess, ThermoReader};
#[cfg(feature = "xy")]
pub use crate::io::xy::{XyParserError, XyReader};

pub use crate::io::summary::{LevelSummary, RunSummary};
pub use crate::io::traits::{ScanAccessError, ScanFilter, ScanSource};
pub use crate::io::utils::{DetailLevel, FileSource, MemorySource, ReaderSource};
