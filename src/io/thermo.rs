//! Reader implementation for Thermo RAW acquisitions, [`ThermoReader`].
//!
//! **Requires the `thermo` feature**
//!
//! RAW files can only be decoded by the vendor's own library, so this module
//! does not open files itself. A binding to that library implements
//! [`RawFileAccess`], and [`ThermoReader`] turns what it reports into the
//! canonical scan model, recovering parent scans with a
//! [`LineageResolver`](crate::lineage::LineageResolver) along the way.
mod reader;

pub use reader::{
    FilterHints, LabelPeak, PrecursorInfo, RawFileAccess, ThermoHeaders, ThermoReader,
    ThermoScans,
};
