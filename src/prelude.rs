pub use crate::io::traits::{ScanAccessError, ScanFilter, ScanSource};
pub use crate::io::ReaderSource;
pub use crate::spectrum::{Scan, ScanHeader, ScanPolarity, SpectrumKind};
#[cfg(feature = "thermo")]
pub use crate::io::thermo::RawFileAccess;
