use crate::meta::DissociationMethod;
use crate::params::{ControlledVocabulary, CURIE};
use crate::spectrum::ScanPolarity;

use super::{parse_value, CvContext, MappedField};

/// Map a legacy `PSI:` term from an mzData document.
///
/// mzData documents carry no unit annotations, so retention time is always read
/// as minutes.
pub fn map_mzdata_param(context: CvContext, accession: CURIE, value: &str) -> Option<MappedField> {
    if accession.controlled_vocabulary != ControlledVocabulary::PSI {
        return None;
    }
    let code = accession.to_string();
    match (context, accession.accession) {
        (CvContext::Spectrum, 1000037) => match value.trim() {
            "Positive" => Some(MappedField::Polarity(ScanPolarity::Positive)),
            "Negative" => Some(MappedField::Polarity(ScanPolarity::Negative)),
            _ => None,
        },
        (CvContext::Spectrum, 1000038) => {
            parse_value(&code, value).map(|v: f64| MappedField::RetentionTime(v * 60.0))
        }
        (CvContext::Precursor, 1000040) => parse_value(&code, value).map(MappedField::PrecursorMz),
        (CvContext::Precursor, 1000042) => {
            parse_value(&code, value).map(MappedField::PrecursorIntensity)
        }
        (CvContext::Precursor, 1000041) => {
            parse_value(&code, value).map(MappedField::PrecursorCharge)
        }
        (CvContext::Precursor, 1000044) if !value.trim().is_empty() => value
            .trim()
            .parse::<DissociationMethod>()
            .ok()
            .map(MappedField::DissociationMethod),
        _ => None,
    }
}
