use std::fmt::Display;

/// The ionization source an instrument configuration declares
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IonizationSource {
    /// Chemical ionization
    CI,
    /// Electrospray ionization
    ESI,
    /// Fast atom bombardment
    FAB,
    /// Multiphoton ionization
    MPI,
    /// Atmospheric pressure ionization
    API,
    /// Desorption ionization
    DI,
    /// Flowing afterglow
    FIB,
    /// Field ionization
    FI,
    /// Photoionization
    PI,
    /// Resonance enhanced multiphoton ionization
    REMPI,
}

impl IonizationSource {
    pub const fn from_accession(accession: u32) -> Option<Self> {
        let source = match accession {
            1000071 => Self::CI,
            1000073 => Self::ESI,
            1000074 => Self::FAB,
            1000227 => Self::MPI,
            1000240 => Self::API,
            1000247 => Self::DI,
            1000446 => Self::FIB,
            1000258 => Self::FI,
            1000273 => Self::PI,
            1000276 => Self::REMPI,
            _ => return None,
        };
        Some(source)
    }
}

impl Display for IonizationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The kind of mass analyzer that produced a scan
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MassAnalyzer {
    FTICR,
    Sector,
    Quadrupole,
    TOF,
    IonTrap,
    SWIFT,
    Orbitrap,
    /// Vendor analyzer labels (`FTMS`, ...) that carry no vocabulary term
    Other(String),
}

impl MassAnalyzer {
    pub fn from_accession(accession: u32) -> Option<Self> {
        let analyzer = match accession {
            1000079 => Self::FTICR,
            1000080 => Self::Sector,
            1000081 => Self::Quadrupole,
            1000084 => Self::TOF,
            1000264 => Self::IonTrap,
            1000284 => Self::SWIFT,
            1000484 => Self::Orbitrap,
            _ => return None,
        };
        Some(analyzer)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::FTICR => "FTICR",
            Self::Sector => "Sector",
            Self::Quadrupole => "Quadrupole",
            Self::TOF => "TOF",
            Self::IonTrap => "IT",
            Self::SWIFT => "SWIFT",
            Self::Orbitrap => "Orbitrap",
            Self::Other(label) => label.as_str(),
        }
    }
}

impl Display for MassAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
