use std::fmt::Display;
use std::str::FromStr;

/**
Describes the polarity of a mass spectrum. A spectrum is either `Positive` (1+), `Negative` (-1)
or `Unknown` (0). The `Unknown` state is the default.
*/
#[repr(i8)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Eq, Hash, Default)]
pub enum ScanPolarity {
    #[default]
    Unknown = 0,
    Positive = 1,
    Negative = -1,
}

impl ScanPolarity {
    /// The sign to apply to charges observed under this polarity. Unknown
    /// polarity leaves charges unsigned.
    pub const fn sign(&self) -> i32 {
        match self {
            Self::Negative => -1,
            _ => 1,
        }
    }

    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::Positive => "+",
            Self::Negative => "-",
            Self::Unknown => "?",
        }
    }
}

impl FromStr for ScanPolarity {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "positive" | "Positive" | "+" => Self::Positive,
            "negative" | "Negative" | "-" => Self::Negative,
            _ => Self::Unknown,
        })
    }
}

impl Display for ScanPolarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

/**
Describes the initial representation of the signal of a spectrum.

Though most formats explicitly have a method of either conveying a processing level
or an assumed level, the `Unknown` option is retained for partial initialization.
*/
#[repr(u8)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Eq, Hash, Default)]
pub enum SpectrumKind {
    #[default]
    Unknown = 0,
    Centroid = 3,
    Profile = 5,
}

impl SpectrumKind {
    /// Resolve the kind to decode a scan with. A kind declared by the document
    /// always wins over the caller's `fallback`.
    pub fn or_fallback(self, fallback: SpectrumKind) -> SpectrumKind {
        match self {
            Self::Unknown => fallback,
            declared => declared,
        }
    }

    pub const fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }
}

impl Display for SpectrumKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/**
Describe the initialization stage of an isolation window
*/
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[repr(i8)]
pub enum IsolationWindowState {
    #[default]
    Unknown = 0,
    Offset,
    Explicit,
    Complete,
}

/// The interval around the precursor ion that was isolated in the precursor scan,
/// accumulated while a document declares it piece by piece.
///
/// Documents may give explicit bounds, a target with offsets, or a target with a
/// total width. [`IsolationWindow::bounds`] resolves whichever was given.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Default, Debug, Clone, PartialEq)]
pub struct IsolationWindow {
    pub target: Option<f64>,
    pub lower_offset: Option<f64>,
    pub upper_offset: Option<f64>,
    pub width: Option<f64>,
    pub lower_bound: Option<f64>,
    pub upper_bound: Option<f64>,
    pub flags: IsolationWindowState,
}

impl IsolationWindow {
    /// Compute the `(low, high)` isolation bounds.
    ///
    /// `precursor_mz` stands in for the target when none was declared. A declared
    /// width replaces both offsets with half of it. When a target is known the
    /// bounds are derived from the offsets, otherwise explicit bounds are returned
    /// as they were read.
    pub fn bounds(&self, precursor_mz: Option<f64>) -> (Option<f64>, Option<f64>) {
        let target = self.target.or(precursor_mz);
        let (lower_offset, upper_offset) = match self.width {
            Some(width) => (Some(width / 2.0), Some(width / 2.0)),
            None => (self.lower_offset, self.upper_offset),
        };
        match target {
            Some(target) if lower_offset.is_some() || upper_offset.is_some() => (
                lower_offset.map(|off| target - off).or(self.lower_bound),
                upper_offset.map(|off| target + off).or(self.upper_bound),
            ),
            _ => (self.lower_bound, self.upper_bound),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.flags, IsolationWindowState::Unknown)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_kind_fallback() {
        assert_eq!(
            SpectrumKind::Unknown.or_fallback(SpectrumKind::Profile),
            SpectrumKind::Profile
        );
        assert_eq!(
            SpectrumKind::Centroid.or_fallback(SpectrumKind::Profile),
            SpectrumKind::Centroid
        );
    }

    #[test]
    fn test_isolation_window_bounds() {
        let mut window = IsolationWindow::default();
        assert_eq!(window.bounds(Some(500.0)), (None, None));

        window.width = Some(2.0);
        window.flags = IsolationWindowState::Offset;
        assert_eq!(window.bounds(Some(500.0)), (Some(499.0), Some(501.0)));

        window.width = None;
        window.target = Some(600.0);
        window.lower_offset = Some(0.5);
        window.upper_offset = Some(1.5);
        assert_eq!(window.bounds(Some(500.0)), (Some(599.5), Some(601.5)));

        let explicit = IsolationWindow {
            lower_bound: Some(10.0),
            upper_bound: Some(12.0),
            flags: IsolationWindowState::Explicit,
            ..Default::default()
        };
        assert_eq!(explicit.bounds(None), (Some(10.0), Some(12.0)));
    }

    #[test]
    fn test_polarity_labels() {
        assert_eq!("Positive".parse::<ScanPolarity>().unwrap(), ScanPolarity::Positive);
        assert_eq!("-".parse::<ScanPolarity>().unwrap(), ScanPolarity::Negative);
        assert_eq!("any".parse::<ScanPolarity>().unwrap(), ScanPolarity::Unknown);
        assert_eq!(ScanPolarity::Negative.sign(), -1);
    }
}
