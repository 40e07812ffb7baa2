//! `mzread` reads mass spectrometry data files into one canonical scan model.
//!
//! ```no_run
//! use mzread::prelude::*;
//! use mzread::io::open_file;
//!
//! # fn main() -> Result<(), mzread::io::ScanAccessError> {
//! let mut reader = open_file("./test/data/small.mzML")?;
//! for header in reader.headers(ScanFilter::new().with_ms_level(2))? {
//!     let header = header?;
//!     println!("{:?} -> {:?}", header.scan_number, header.parent_scan_number);
//! }
//! let scan = reader.scan(Some(1), SpectrumKind::Centroid)?;
//! println!("{} centroids", scan.centroids.len());
//! #    Ok(())
//! # }
//! ```
pub mod io;
pub mod lineage;
pub mod meta;
pub mod params;
pub mod prelude;
pub mod spectrum;
pub mod vocabulary;

#[cfg(feature = "mgf")]
pub use crate::io::mgf::MGFReader;
#[cfg(feature = "mzdata")]
pub use crate::io::mzdata::MzDataReader;
#[cfg(feature = "mzml")]
pub use crate::io::mzml::MzMLReader;
#[cfg(feature = "mzxml")]
pub use crate::io::mzxml::MzXMLReader;
#[cfg(feature = "xy")]
pub use crate::io::xy::XyReader;

pub use crate::spectrum::{Centroid, Masslist, Scan, ScanHeader};
