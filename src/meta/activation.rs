use std::fmt::Display;
use std::str::FromStr;

/// A method used for dissociation or fragmentation.
///
/// The controlled vocabulary terms of the modern XML dialect and the labels
/// reported by vendor scan filters both land here. Free text that matches
/// neither is kept verbatim in [`DissociationMethod::Other`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DissociationMethod {
    CID,
    PD,
    PSD,
    SID,
    BIRD,
    ECD,
    IRMPD,
    SORI,
    HCD,
    LCD,
    MPD,
    PQD,
    ETD,
    SA,
    PTR,
    NETD,
    NPTR,
    Any,
    Unknown,
    Other(String),
}

impl DissociationMethod {
    /// Look up the method for a PSI-MS accession number
    pub fn from_accession(accession: u32) -> Option<Self> {
        let method = match accession {
            1000133 => Self::CID,
            1000134 => Self::PD,
            1000135 => Self::PSD,
            1000136 => Self::SID,
            1000242 => Self::BIRD,
            1000250 => Self::ECD,
            1000262 => Self::IRMPD,
            1000282 => Self::SORI,
            1000422 => Self::HCD,
            1000433 => Self::LCD,
            _ => return None,
        };
        Some(method)
    }

    /// The vendor method table, indexed by the activation flag the raw file reports
    pub fn from_vendor_index(index: usize) -> Self {
        match index {
            0 => Self::CID,
            1 => Self::MPD,
            2 => Self::ECD,
            3 => Self::PQD,
            4 => Self::ETD,
            5 => Self::HCD,
            6 => Self::Any,
            7 => Self::SA,
            8 => Self::PTR,
            9 => Self::NETD,
            10 => Self::NPTR,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::CID => "CID",
            Self::PD => "PD",
            Self::PSD => "PSD",
            Self::SID => "SID",
            Self::BIRD => "BIRD",
            Self::ECD => "ECD",
            Self::IRMPD => "IRMPD",
            Self::SORI => "SORI",
            Self::HCD => "HCD",
            Self::LCD => "LCD",
            Self::MPD => "MPD",
            Self::PQD => "PQD",
            Self::ETD => "ETD",
            Self::SA => "SA",
            Self::PTR => "PTR",
            Self::NETD => "NETD",
            Self::NPTR => "NPTR",
            Self::Any => "Any",
            Self::Unknown => "Unknown",
            Self::Other(label) => label.as_str(),
        }
    }
}

impl Display for DissociationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DissociationMethod {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let method = match s.trim() {
            "CID" | "cid" => Self::CID,
            "PD" => Self::PD,
            "PSD" => Self::PSD,
            "SID" => Self::SID,
            "BIRD" => Self::BIRD,
            "ECD" | "ecd" => Self::ECD,
            "IRMPD" => Self::IRMPD,
            "SORI" => Self::SORI,
            "HCD" | "hcd" => Self::HCD,
            "LCD" => Self::LCD,
            "MPD" | "mpd" => Self::MPD,
            "PQD" | "pqd" => Self::PQD,
            "ETD" | "etd" => Self::ETD,
            "SA" | "sa" => Self::SA,
            "PTR" | "ptr" => Self::PTR,
            "NETD" | "netd" => Self::NETD,
            "NPTR" | "nptr" => Self::NPTR,
            "Any" => Self::Any,
            "Unknown" => Self::Unknown,
            other => Self::Other(other.to_string()),
        };
        Ok(method)
    }
}
