//! The canonical representation every reader produces, and the codec that
//! unpacks binary peak arrays into it.
pub mod bindata;
pub mod centroid;
pub mod header;
pub mod masslist;
pub mod scan;
pub mod scan_properties;

pub use bindata::{ArrayRetrievalError, ArrayType, BinaryCompressionType, BinaryDataArrayType, ByteOrder, DataArray};
pub use centroid::{Centroid, ExtensionData};
pub use header::{HeaderError, HeaderField, HeaderValue, ScanHeader};
pub use masslist::Masslist;
pub use scan::{ProfilePoint, Scan};
pub use scan_properties::{IsolationWindow, IsolationWindowState, ScanPolarity, SpectrumKind};
