use crate::meta::{DissociationMethod, IonizationSource, MassAnalyzer};
use crate::params::{ControlledVocabulary, Unit, CURIE};
use crate::spectrum::bindata::{ArrayType, BinaryCompressionType, BinaryDataArrayType};
use crate::spectrum::{ScanPolarity, SpectrumKind};

use super::{parse_value, CvContext, MappedField};

fn binary_param(accession: u32) -> Option<MappedField> {
    let field = match accession {
        1000523 => MappedField::ArrayPrecision(BinaryDataArrayType::Float64),
        1000521 => MappedField::ArrayPrecision(BinaryDataArrayType::Float32),
        1000520 => MappedField::ArrayPrecision(BinaryDataArrayType::Float16),
        1000574 => MappedField::ArrayCompression(BinaryCompressionType::Zlib),
        1000576 => MappedField::ArrayCompression(BinaryCompressionType::NoCompression),
        1000514 => MappedField::ArrayKind(ArrayType::MZArray),
        1000515 => MappedField::ArrayKind(ArrayType::IntensityArray),
        1000517 => MappedField::ArrayKind(ArrayType::SignalToNoiseArray),
        _ => return None,
    };
    Some(field)
}

fn spectrum_param(accession: u32, code: &str, value: &str, unit: Unit) -> Option<MappedField> {
    match accession {
        1000127 => Some(MappedField::SpectrumKind(SpectrumKind::Centroid)),
        1000128 => Some(MappedField::SpectrumKind(SpectrumKind::Profile)),
        1000130 => Some(MappedField::Polarity(ScanPolarity::Positive)),
        1000129 => Some(MappedField::Polarity(ScanPolarity::Negative)),
        1000511 => parse_value(code, value).map(MappedField::MsLevel),
        1000285 => parse_value(code, value).map(|v: f64| MappedField::Tic(v.max(0.0))),
        1000504 => parse_value(code, value).map(MappedField::BasepeakMz),
        1000505 => {
            parse_value(code, value).map(|v: f64| MappedField::BasepeakIntensity(v.max(0.0)))
        }
        1000501 => parse_value(code, value).map(MappedField::LowMz),
        1000500 => parse_value(code, value).map(MappedField::HighMz),
        1000016 => parse_value(code, value).map(|v: f64| match unit {
            Unit::Second => MappedField::RetentionTime(v),
            _ => MappedField::RetentionTime(v * 60.0),
        }),
        1000800 => parse_value(code, value).map(|v: f64| MappedField::Resolution(v as u32)),
        1000512 if !value.is_empty() => Some(MappedField::ScanFilter(value.to_string())),
        1000927 if unit == Unit::Millisecond => {
            parse_value(code, value).map(MappedField::InjectionTime)
        }
        _ => None,
    }
}

fn precursor_param(accession: u32, code: &str, value: &str, unit: Unit) -> Option<MappedField> {
    if let Some(method) = DissociationMethod::from_accession(accession) {
        return Some(MappedField::DissociationMethod(method));
    }
    match accession {
        1000744 => parse_value(code, value).map(MappedField::PrecursorMz),
        1000827 => parse_value(code, value).map(MappedField::IsolationTarget),
        1000793 => parse_value(code, value).map(MappedField::IsolationLow),
        1000794 => parse_value(code, value).map(MappedField::IsolationHigh),
        1000828 => parse_value(code, value).map(MappedField::IsolationLowerOffset),
        1000829 => parse_value(code, value).map(MappedField::IsolationUpperOffset),
        1000023 if unit == Unit::MZ => parse_value(code, value).map(MappedField::IsolationWidth),
        1000042 if unit == Unit::DetectorCounts => {
            parse_value(code, value).map(MappedField::PrecursorIntensity)
        }
        1000041 | 1000633 => parse_value(code, value).map(MappedField::PrecursorCharge),
        1000509 | 1000045 if unit == Unit::Electronvolt => {
            parse_value(code, value).map(MappedField::ActivationEnergy)
        }
        _ => None,
    }
}

fn instrument_param(accession: u32, code: &str, value: &str) -> Option<MappedField> {
    if accession == 1000028 {
        return parse_value(code, value).map(|v: f64| MappedField::Resolution(v as u32));
    }
    IonizationSource::from_accession(accession)
        .map(MappedField::IonizationSource)
        .or_else(|| MassAnalyzer::from_accession(accession).map(MappedField::MassAnalyzer))
}

/// Map a PSI-MS term from an mzML document.
///
/// Only `MS` accessions carry meaning here; everything else, and every
/// accession the table does not list for `context`, maps to `None`.
pub fn map_mzml_param(
    context: CvContext,
    accession: CURIE,
    value: &str,
    unit: Unit,
) -> Option<MappedField> {
    if accession.controlled_vocabulary != ControlledVocabulary::MS {
        return None;
    }
    let code = accession.to_string();
    let acc = accession.accession;
    match context {
        CvContext::BinaryArray => binary_param(acc),
        CvContext::Spectrum => spectrum_param(acc, &code, value, unit),
        CvContext::Precursor => precursor_param(acc, &code, value, unit),
        CvContext::InstrumentConfiguration => instrument_param(acc, &code, value),
    }
}
