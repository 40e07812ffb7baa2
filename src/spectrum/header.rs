use std::fmt::Display;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use thiserror::Error;

use crate::meta::{DissociationMethod, IonizationSource, MassAnalyzer};

use super::centroid::ExtensionData;
use super::scan_properties::{ScanPolarity, SpectrumKind};

/**
The metadata describing a single acquisition.

Every field is optional; readers fill in only what their format records. The
polarity and spectrum kind use their `Unknown` variants to mean "absent".
*/
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ScanHeader {
    pub scan_number: Option<u32>,
    pub parent_scan_number: Option<u32>,
    pub acquisition_timestamp: Option<DateTime<FixedOffset>>,
    pub instrument_name: Option<String>,
    pub instrument_model: Option<String>,
    pub title: Option<String>,
    pub ms_level: Option<u8>,
    pub polarity: ScanPolarity,
    pub spectrum_kind: SpectrumKind,
    pub mass_analyzer: Option<MassAnalyzer>,
    pub ionization_source: Option<IonizationSource>,
    pub resolution: Option<u32>,
    /// Retention time in seconds
    pub retention_time: Option<f64>,
    pub low_mz: Option<f64>,
    pub high_mz: Option<f64>,
    pub points_count: Option<usize>,
    pub tic: Option<f64>,
    pub basepeak_mz: Option<f64>,
    pub basepeak_intensity: Option<f64>,
    pub precursor_mz: Option<f64>,
    pub precursor_intensity: Option<f64>,
    pub precursor_charge: Option<i32>,
    pub precursor_low_mz: Option<f64>,
    pub precursor_high_mz: Option<f64>,
    pub dissociation_method: Option<DissociationMethod>,
    pub activation_energy: Option<f64>,
    pub activation_energies: Option<Vec<f64>>,
    pub custom_data: Option<ExtensionData>,
}

/// The settable fields of a [`ScanHeader`], by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderField {
    ScanNumber,
    ParentScanNumber,
    AcquisitionTimestamp,
    InstrumentName,
    InstrumentModel,
    Title,
    MsLevel,
    Polarity,
    SpectrumKind,
    MassAnalyzer,
    IonizationSource,
    Resolution,
    RetentionTime,
    LowMz,
    HighMz,
    PointsCount,
    Tic,
    BasepeakMz,
    BasepeakIntensity,
    PrecursorMz,
    PrecursorIntensity,
    PrecursorCharge,
    PrecursorLowMz,
    PrecursorHighMz,
    DissociationMethod,
    ActivationEnergy,
    ActivationEnergies,
    CustomData,
}

impl HeaderField {
    pub const ALL: [HeaderField; 28] = [
        Self::ScanNumber,
        Self::ParentScanNumber,
        Self::AcquisitionTimestamp,
        Self::InstrumentName,
        Self::InstrumentModel,
        Self::Title,
        Self::MsLevel,
        Self::Polarity,
        Self::SpectrumKind,
        Self::MassAnalyzer,
        Self::IonizationSource,
        Self::Resolution,
        Self::RetentionTime,
        Self::LowMz,
        Self::HighMz,
        Self::PointsCount,
        Self::Tic,
        Self::BasepeakMz,
        Self::BasepeakIntensity,
        Self::PrecursorMz,
        Self::PrecursorIntensity,
        Self::PrecursorCharge,
        Self::PrecursorLowMz,
        Self::PrecursorHighMz,
        Self::DissociationMethod,
        Self::ActivationEnergy,
        Self::ActivationEnergies,
        Self::CustomData,
    ];

    pub const fn name(&self) -> &'static str {
        match self {
            Self::ScanNumber => "scan_number",
            Self::ParentScanNumber => "parent_scan_number",
            Self::AcquisitionTimestamp => "acquisition_timestamp",
            Self::InstrumentName => "instrument_name",
            Self::InstrumentModel => "instrument_model",
            Self::Title => "title",
            Self::MsLevel => "ms_level",
            Self::Polarity => "polarity",
            Self::SpectrumKind => "spectrum_type",
            Self::MassAnalyzer => "mass_analyzer",
            Self::IonizationSource => "ionization_source",
            Self::Resolution => "resolution",
            Self::RetentionTime => "retention_time",
            Self::LowMz => "low_mz",
            Self::HighMz => "high_mz",
            Self::PointsCount => "points_count",
            Self::Tic => "tic",
            Self::BasepeakMz => "basepeak_mz",
            Self::BasepeakIntensity => "basepeak_intensity",
            Self::PrecursorMz => "precursor_mz",
            Self::PrecursorIntensity => "precursor_intensity",
            Self::PrecursorCharge => "precursor_charge",
            Self::PrecursorLowMz => "precursor_low_mz",
            Self::PrecursorHighMz => "precursor_high_mz",
            Self::DissociationMethod => "dissociation_method",
            Self::ActivationEnergy => "activation_energy",
            Self::ActivationEnergies => "activation_energies",
            Self::CustomData => "custom_data",
        }
    }
}

impl Display for HeaderField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HeaderField {
    type Err = HeaderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|field| field.name() == s)
            .copied()
            .ok_or_else(|| HeaderError::UnknownField(s.to_string()))
    }
}

/// A dynamically typed value for [`ScanHeader::set`]
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    Absent,
    Int(i64),
    Float(f64),
    Text(String),
    Floats(Vec<f64>),
    Timestamp(DateTime<FixedOffset>),
    Polarity(ScanPolarity),
    Kind(SpectrumKind),
    Analyzer(MassAnalyzer),
    Source(IonizationSource),
    Method(DissociationMethod),
    Extension(ExtensionData),
}

macro_rules! header_value_from {
    ($t:ty, $variant:ident) => {
        impl From<$t> for HeaderValue {
            fn from(value: $t) -> Self {
                Self::$variant(value.into())
            }
        }
    };
}

header_value_from!(i64, Int);
header_value_from!(i32, Int);
header_value_from!(u32, Int);
header_value_from!(u8, Int);
header_value_from!(f64, Float);
header_value_from!(String, Text);
header_value_from!(&str, Text);
header_value_from!(Vec<f64>, Floats);
header_value_from!(DateTime<FixedOffset>, Timestamp);
header_value_from!(ScanPolarity, Polarity);
header_value_from!(SpectrumKind, Kind);
header_value_from!(MassAnalyzer, Analyzer);
header_value_from!(IonizationSource, Source);
header_value_from!(DissociationMethod, Method);
header_value_from!(ExtensionData, Extension);

impl<T: Into<HeaderValue>> From<Option<T>> for HeaderValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Absent)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum HeaderError {
    #[error("{0:?} is not a scan header field")]
    UnknownField(String),
    #[error("Cannot store {1:?} in scan header field {0}")]
    TypeMismatch(HeaderField, HeaderValue),
}

impl HeaderValue {
    fn into_int<T: TryFrom<i64>>(self, field: HeaderField) -> Result<Option<T>, HeaderError> {
        match self {
            Self::Absent => Ok(None),
            Self::Int(v) => T::try_from(v)
                .map(Some)
                .map_err(|_| HeaderError::TypeMismatch(field, Self::Int(v))),
            other => Err(HeaderError::TypeMismatch(field, other)),
        }
    }

    fn into_float(self, field: HeaderField) -> Result<Option<f64>, HeaderError> {
        match self {
            Self::Absent => Ok(None),
            Self::Float(v) => Ok(Some(v)),
            Self::Int(v) => Ok(Some(v as f64)),
            other => Err(HeaderError::TypeMismatch(field, other)),
        }
    }

    fn into_text(self, field: HeaderField) -> Result<Option<String>, HeaderError> {
        match self {
            Self::Absent => Ok(None),
            Self::Text(v) => Ok(Some(v)),
            other => Err(HeaderError::TypeMismatch(field, other)),
        }
    }
}

impl ScanHeader {
    /// Build a header from `(field name, value)` pairs.
    ///
    /// An unrecognized field name or a value of the wrong shape is an error.
    pub fn from_fields<I, K, V>(fields: I) -> Result<Self, HeaderError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<HeaderValue>,
    {
        let mut header = Self::default();
        for (name, value) in fields {
            let field: HeaderField = name.as_ref().parse()?;
            header.set(field, value.into())?;
        }
        Ok(header)
    }

    /// Assign a single field. [`HeaderValue::Absent`] clears it.
    pub fn set(&mut self, field: HeaderField, value: HeaderValue) -> Result<(), HeaderError> {
        match field {
            HeaderField::ScanNumber => self.scan_number = value.into_int(field)?,
            HeaderField::ParentScanNumber => self.parent_scan_number = value.into_int(field)?,
            HeaderField::MsLevel => self.ms_level = value.into_int(field)?,
            HeaderField::Resolution => self.resolution = value.into_int(field)?,
            HeaderField::PointsCount => self.points_count = value.into_int(field)?,
            HeaderField::PrecursorCharge => self.precursor_charge = value.into_int(field)?,
            HeaderField::InstrumentName => self.instrument_name = value.into_text(field)?,
            HeaderField::InstrumentModel => self.instrument_model = value.into_text(field)?,
            HeaderField::Title => self.title = value.into_text(field)?,
            HeaderField::RetentionTime => self.retention_time = value.into_float(field)?,
            HeaderField::LowMz => self.low_mz = value.into_float(field)?,
            HeaderField::HighMz => self.high_mz = value.into_float(field)?,
            HeaderField::Tic => self.tic = value.into_float(field)?,
            HeaderField::BasepeakMz => self.basepeak_mz = value.into_float(field)?,
            HeaderField::BasepeakIntensity => self.basepeak_intensity = value.into_float(field)?,
            HeaderField::PrecursorMz => self.precursor_mz = value.into_float(field)?,
            HeaderField::PrecursorIntensity => {
                self.precursor_intensity = value.into_float(field)?
            }
            HeaderField::PrecursorLowMz => self.precursor_low_mz = value.into_float(field)?,
            HeaderField::PrecursorHighMz => self.precursor_high_mz = value.into_float(field)?,
            HeaderField::ActivationEnergy => self.activation_energy = value.into_float(field)?,
            HeaderField::AcquisitionTimestamp => {
                self.acquisition_timestamp = match value {
                    HeaderValue::Absent => None,
                    HeaderValue::Timestamp(ts) => Some(ts),
                    HeaderValue::Text(s) => Some(
                        DateTime::parse_from_rfc3339(&s)
                            .map_err(|_| HeaderError::TypeMismatch(field, HeaderValue::Text(s)))?,
                    ),
                    other => return Err(HeaderError::TypeMismatch(field, other)),
                }
            }
            HeaderField::Polarity => {
                self.polarity = match value {
                    HeaderValue::Absent => ScanPolarity::Unknown,
                    HeaderValue::Polarity(p) => p,
                    HeaderValue::Int(1) => ScanPolarity::Positive,
                    HeaderValue::Int(-1) => ScanPolarity::Negative,
                    other => return Err(HeaderError::TypeMismatch(field, other)),
                }
            }
            HeaderField::SpectrumKind => {
                self.spectrum_kind = match value {
                    HeaderValue::Absent => SpectrumKind::Unknown,
                    HeaderValue::Kind(k) => k,
                    other => return Err(HeaderError::TypeMismatch(field, other)),
                }
            }
            HeaderField::MassAnalyzer => {
                self.mass_analyzer = match value {
                    HeaderValue::Absent => None,
                    HeaderValue::Analyzer(a) => Some(a),
                    HeaderValue::Text(s) => Some(MassAnalyzer::Other(s)),
                    other => return Err(HeaderError::TypeMismatch(field, other)),
                }
            }
            HeaderField::IonizationSource => {
                self.ionization_source = match value {
                    HeaderValue::Absent => None,
                    HeaderValue::Source(s) => Some(s),
                    other => return Err(HeaderError::TypeMismatch(field, other)),
                }
            }
            HeaderField::DissociationMethod => {
                self.dissociation_method = match value {
                    HeaderValue::Absent => None,
                    HeaderValue::Method(m) => Some(m),
                    HeaderValue::Text(s) => s.parse().ok(),
                    other => return Err(HeaderError::TypeMismatch(field, other)),
                }
            }
            HeaderField::ActivationEnergies => {
                self.activation_energies = match value {
                    HeaderValue::Absent => None,
                    HeaderValue::Floats(v) => Some(v),
                    other => return Err(HeaderError::TypeMismatch(field, other)),
                }
            }
            HeaderField::CustomData => {
                self.custom_data = match value {
                    HeaderValue::Absent => None,
                    HeaderValue::Extension(v) => Some(v),
                    other => return Err(HeaderError::TypeMismatch(field, other)),
                }
            }
        }
        Ok(())
    }

    /// Store a value in the extension payload
    pub fn insert_custom<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.custom_data
            .get_or_insert_with(ExtensionData::default)
            .insert(key.into(), value.into());
    }

    pub fn custom(&self, key: &str) -> Option<&str> {
        self.custom_data
            .as_ref()
            .and_then(|data| data.get(key))
            .map(|v| v.as_str())
    }
}

impl Display for ScanHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.scan_number {
            Some(n) => write!(f, "#{n}")?,
            None => f.write_str("#?")?,
        }
        if let Some(level) = self.ms_level {
            write!(f, " MS{level}")?;
        }
        if !matches!(self.polarity, ScanPolarity::Unknown) {
            write!(f, " ({})", self.polarity)?;
        }
        if let Some(rt) = self.retention_time {
            write!(f, " RT: {:.2} min", rt / 60.0)?;
        }
        if let Some(mz) = self.precursor_mz {
            write!(f, " Precursor: {mz:.4}")?;
            if let Some(z) = self.precursor_charge {
                write!(f, " ({z})")?;
            }
        }
        if let Some(parent) = self.parent_scan_number {
            write!(f, " Parent: #{parent}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_from_fields() -> Result<(), HeaderError> {
        let header = ScanHeader::from_fields([
            ("scan_number", HeaderValue::from(12u32)),
            ("ms_level", 2u8.into()),
            ("retention_time", 65.5f64.into()),
            ("polarity", ScanPolarity::Negative.into()),
            ("dissociation_method", "HCD".into()),
            ("activation_energies", vec![25.0f64, 30.0].into()),
        ])?;
        assert_eq!(header.scan_number, Some(12));
        assert_eq!(header.ms_level, Some(2));
        assert_eq!(header.retention_time, Some(65.5));
        assert_eq!(header.polarity, ScanPolarity::Negative);
        assert_eq!(header.dissociation_method, Some(DissociationMethod::HCD));
        assert_eq!(header.activation_energies.as_deref(), Some(&[25.0, 30.0][..]));
        assert!(header.precursor_mz.is_none());
        Ok(())
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = ScanHeader::from_fields([("scan_numbr", 1i64)]).unwrap_err();
        assert_eq!(err, HeaderError::UnknownField("scan_numbr".into()));

        let err = ScanHeader::from_fields([("ms_level", "two")]).unwrap_err();
        assert!(matches!(err, HeaderError::TypeMismatch(HeaderField::MsLevel, _)));

        let err = ScanHeader::from_fields([("ms_level", -3i64)]).unwrap_err();
        assert!(matches!(err, HeaderError::TypeMismatch(HeaderField::MsLevel, _)));
    }

    #[test]
    fn test_field_names_round_trip() {
        for field in HeaderField::ALL {
            assert_eq!(field.name().parse::<HeaderField>().unwrap(), field);
        }
    }

    #[test]
    fn test_equality_and_clear() {
        let mut a = ScanHeader::default();
        a.set(HeaderField::PrecursorMz, 500.0f64.into()).unwrap();
        let mut b = a.clone();
        assert_eq!(a, b);
        b.set(HeaderField::PrecursorMz, HeaderValue::Absent).unwrap();
        assert_ne!(a, b);
        assert_eq!(b, ScanHeader::default());
        b.insert_custom("scan_filter", "FTMS + p ESI Full ms");
        assert_eq!(b.custom("scan_filter"), Some("FTMS + p ESI Full ms"));
    }
}
