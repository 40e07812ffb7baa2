//! Controlled vocabulary parameters as they appear in the XML dialects.
use std::borrow::Cow;
use std::fmt::Display;
use std::str::{self, FromStr};

/// Split a `CV:accession` string into its vocabulary and numeric accession.
///
/// The legacy `PSI` prefix is recognized alongside `MS` and `UO`.
pub fn curie_to_num(curie: &str) -> (Option<ControlledVocabulary>, Option<u32>) {
    let mut parts = curie.splitn(2, ':');
    let prefix = parts
        .next()
        .and_then(|v| v.parse::<ControlledVocabulary>().ok())
        .and_then(|cv| cv.as_option());
    match parts.next().map(|k| k.trim().parse::<u32>()) {
        Some(Ok(v)) => (prefix, Some(v)),
        _ => (prefix, None),
    }
}

/// A compact `(vocabulary, accession)` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CURIE {
    pub controlled_vocabulary: ControlledVocabulary,
    pub accession: u32,
}

impl CURIE {
    pub const fn new(cv_id: ControlledVocabulary, accession: u32) -> Self {
        Self {
            controlled_vocabulary: cv_id,
            accession,
        }
    }
}

impl Display for CURIE {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{:07}",
            self.controlled_vocabulary.prefix(),
            self.accession
        )
    }
}

impl FromStr for CURIE {
    type Err = ParamParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match curie_to_num(s) {
            (Some(cv), Some(accession)) => Ok(CURIE::new(cv, accession)),
            _ => Err(ParamParseError::MalformedCURIE(s.to_string())),
        }
    }
}

#[macro_export]
macro_rules! curie {
    (MS:$acc:literal) => {
        $crate::params::CURIE {
            controlled_vocabulary: $crate::params::ControlledVocabulary::MS,
            accession: $acc,
        }
    };
    (UO:$acc:literal) => {
        $crate::params::CURIE {
            controlled_vocabulary: $crate::params::ControlledVocabulary::UO,
            accession: $acc,
        }
    };
    (PSI:$acc:literal) => {
        $crate::params::CURIE {
            controlled_vocabulary: $crate::params::ControlledVocabulary::PSI,
            accession: $acc,
        }
    };
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParamParseError {
    #[error("Malformed CURIE {0}")]
    MalformedCURIE(String),
}

/// A single `<cvParam>` read out of a document. The text fields borrow from the
/// XML event when possible.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CvParam<'a> {
    pub name: Cow<'a, str>,
    pub value: Cow<'a, str>,
    pub accession: Option<CURIE>,
    pub unit: Unit,
}

impl<'a> CvParam<'a> {
    pub fn new(
        name: Cow<'a, str>,
        value: Cow<'a, str>,
        accession: Option<CURIE>,
        unit: Unit,
    ) -> Self {
        Self {
            name,
            value,
            accession,
            unit,
        }
    }

    pub fn coerce<T: str::FromStr>(&self) -> Result<T, T::Err> {
        self.value.trim().parse::<T>()
    }

    pub fn is_controlled(&self) -> bool {
        self.accession.is_some()
    }

    pub fn into_owned(self) -> CvParam<'static> {
        CvParam {
            name: Cow::Owned(self.name.into_owned()),
            value: Cow::Owned(self.value.into_owned()),
            accession: self.accession,
            unit: self.unit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlledVocabulary {
    MS,
    UO,
    /// The vocabulary prefix used by mzData documents
    PSI,
    Unknown,
}

const MS_CV: &str = "MS";
const UO_CV: &str = "UO";
const PSI_CV: &str = "PSI";

impl ControlledVocabulary {
    pub fn prefix(&self) -> Cow<'static, str> {
        match &self {
            Self::MS => Cow::Borrowed(MS_CV),
            Self::UO => Cow::Borrowed(UO_CV),
            Self::PSI => Cow::Borrowed(PSI_CV),
            Self::Unknown => Cow::Borrowed("?"),
        }
    }

    pub fn as_option(&self) -> Option<Self> {
        match self {
            Self::Unknown => None,
            _ => Some(*self),
        }
    }
}

impl FromStr for ControlledVocabulary {
    type Err = ParamParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MS" | "PSI-MS" => Ok(Self::MS),
            "UO" => Ok(Self::UO),
            "PSI" => Ok(Self::PSI),
            _ => Ok(Self::Unknown),
        }
    }
}

/// The units a parameter value may be reported in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Unit {
    // Mass
    MZ,
    Mass,

    // Time
    Minute,
    Second,
    Millisecond,

    // Intensity
    DetectorCounts,
    PercentBasePeak,

    // Collision Energy
    Electronvolt,
    PercentElectronVolt,

    #[default]
    Unknown,
}

impl Unit {
    pub const fn curie(&self) -> Option<CURIE> {
        match self {
            Self::Millisecond => Some(curie!(UO:28)),
            Self::Second => Some(curie!(UO:10)),
            Self::Minute => Some(curie!(UO:31)),
            Self::MZ => Some(curie!(MS:1000040)),
            Self::Mass => Some(curie!(UO:221)),
            Self::DetectorCounts => Some(curie!(MS:1000131)),
            Self::PercentBasePeak => Some(curie!(MS:1000132)),
            Self::Electronvolt => Some(curie!(UO:266)),
            Self::PercentElectronVolt => Some(curie!(UO:187)),
            Self::Unknown => None,
        }
    }

    pub fn from_name(name: &str) -> Unit {
        match name {
            "millisecond" => Self::Millisecond,
            "second" => Self::Second,
            "minute" => Self::Minute,

            "m/z" => Self::MZ,
            "dalton" => Self::Mass,

            "number of detector counts" => Self::DetectorCounts,
            "percent of base peak" => Self::PercentBasePeak,

            "electronvolt" => Self::Electronvolt,
            "percent" => Self::PercentElectronVolt,
            _ => Unit::Unknown,
        }
    }

    pub fn from_accession(acc: &str) -> Unit {
        match acc.parse::<CURIE>() {
            Ok(curie) => Self::from_curie(&curie),
            Err(_) => Unit::Unknown,
        }
    }

    pub fn from_curie(acc: &CURIE) -> Unit {
        match acc {
            x if Some(*x) == Self::Millisecond.curie() => Self::Millisecond,
            x if Some(*x) == Self::Second.curie() => Self::Second,
            x if Some(*x) == Self::Minute.curie() => Self::Minute,
            x if Some(*x) == Self::MZ.curie() => Self::MZ,
            x if Some(*x) == Self::Mass.curie() => Self::Mass,
            x if Some(*x) == Self::DetectorCounts.curie() => Self::DetectorCounts,
            x if Some(*x) == Self::PercentBasePeak.curie() => Self::PercentBasePeak,
            x if Some(*x) == Self::Electronvolt.curie() => Self::Electronvolt,
            x if Some(*x) == Self::PercentElectronVolt.curie() => Self::PercentElectronVolt,
            _ => Unit::Unknown,
        }
    }

    pub const fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }
}
