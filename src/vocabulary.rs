//! Tables that turn a dialect's controlled vocabulary terms into typed
//! assignments on the canonical model.
//!
//! Every mapping function is pure: the same `(context, code, value, unit)`
//! always maps to the same [`MappedField`], and codes a table does not know
//! map to nothing.
use std::str::FromStr;

use log::debug;

use crate::meta::{DissociationMethod, IonizationSource, MassAnalyzer};
use crate::spectrum::bindata::{ArrayType, BinaryCompressionType, BinaryDataArrayType};
use crate::spectrum::{IsolationWindow, IsolationWindowState, ScanHeader, ScanPolarity, SpectrumKind};

mod mzdata;
mod mzml;

pub use mzdata::map_mzdata_param;
pub use mzml::map_mzml_param;

/// The element a parameter was declared under, which decides how its code
/// is read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CvContext {
    Spectrum,
    Precursor,
    BinaryArray,
    InstrumentConfiguration,
}

/// A single typed assignment produced by a vocabulary table
#[derive(Debug, Clone, PartialEq)]
pub enum MappedField {
    MsLevel(u8),
    Polarity(ScanPolarity),
    SpectrumKind(SpectrumKind),
    Tic(f64),
    BasepeakMz(f64),
    BasepeakIntensity(f64),
    LowMz(f64),
    HighMz(f64),
    /// Always in seconds
    RetentionTime(f64),
    Resolution(u32),
    MassAnalyzer(MassAnalyzer),
    IonizationSource(IonizationSource),

    PrecursorMz(f64),
    PrecursorIntensity(f64),
    PrecursorCharge(i32),
    DissociationMethod(DissociationMethod),
    ActivationEnergy(f64),

    IsolationTarget(f64),
    IsolationLow(f64),
    IsolationHigh(f64),
    IsolationLowerOffset(f64),
    IsolationUpperOffset(f64),
    IsolationWidth(f64),

    ScanFilter(String),
    /// Milliseconds
    InjectionTime(f64),

    ArrayPrecision(BinaryDataArrayType),
    ArrayCompression(BinaryCompressionType),
    ArrayKind(ArrayType),
}

impl MappedField {
    /// Whether this assignment describes a binary array rather than the scan
    pub const fn is_array_tag(&self) -> bool {
        matches!(
            self,
            Self::ArrayPrecision(_) | Self::ArrayCompression(_) | Self::ArrayKind(_)
        )
    }

    /// Apply this assignment to the scan being built.
    ///
    /// Header fields overwrite whatever was there, so the last declaration
    /// wins. Binary array tags have no home on the header and are handed
    /// back to the caller.
    pub fn apply(self, header: &mut ScanHeader, window: &mut IsolationWindow) -> Option<Self> {
        match self {
            Self::MsLevel(v) => header.ms_level = Some(v),
            Self::Polarity(v) => header.polarity = v,
            Self::SpectrumKind(v) => header.spectrum_kind = v,
            Self::Tic(v) => header.tic = Some(v),
            Self::BasepeakMz(v) => header.basepeak_mz = Some(v),
            Self::BasepeakIntensity(v) => header.basepeak_intensity = Some(v),
            Self::LowMz(v) => header.low_mz = Some(v),
            Self::HighMz(v) => header.high_mz = Some(v),
            Self::RetentionTime(v) => header.retention_time = Some(v),
            Self::Resolution(v) => header.resolution = Some(v),
            Self::MassAnalyzer(v) => header.mass_analyzer = Some(v),
            Self::IonizationSource(v) => header.ionization_source = Some(v),
            Self::PrecursorMz(v) => header.precursor_mz = Some(v),
            Self::PrecursorIntensity(v) => header.precursor_intensity = Some(v),
            Self::PrecursorCharge(v) => header.precursor_charge = Some(v),
            Self::DissociationMethod(v) => header.dissociation_method = Some(v),
            Self::ActivationEnergy(v) => header.activation_energy = Some(v),
            Self::IsolationTarget(v) => {
                window.target = Some(v);
                window.flags = IsolationWindowState::Offset;
            }
            Self::IsolationLowerOffset(v) => {
                window.lower_offset = Some(v);
                window.flags = IsolationWindowState::Offset;
            }
            Self::IsolationUpperOffset(v) => {
                window.upper_offset = Some(v);
                window.flags = IsolationWindowState::Offset;
            }
            Self::IsolationWidth(v) => {
                window.width = Some(v);
                window.flags = IsolationWindowState::Offset;
            }
            Self::IsolationLow(v) => {
                window.lower_bound = Some(v);
                window.flags = IsolationWindowState::Explicit;
            }
            Self::IsolationHigh(v) => {
                window.upper_bound = Some(v);
                window.flags = IsolationWindowState::Explicit;
            }
            Self::ScanFilter(v) => header.insert_custom("scan_filter", v),
            Self::InjectionTime(v) => header.insert_custom("injection_time", v.to_string()),
            Self::ArrayPrecision(_) | Self::ArrayCompression(_) | Self::ArrayKind(_) => {
                return Some(self)
            }
        }
        None
    }
}

/// Parse a parameter value, logging and discarding anything unreadable
pub(crate) fn parse_value<T: FromStr>(code: &str, value: &str) -> Option<T> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    match value.parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            debug!("Ignoring unparsable value {value:?} for {code}");
            None
        }
    }
}
