use std::cmp::Ordering;
use std::fmt::Display;

use indexmap::IndexMap;

/// An opaque bag of values a reader could not place in a canonical field.
pub type ExtensionData = IndexMap<String, String>;

/**
A single resolved peak.

Only the acquired values are stored; the corrected intensity, signal-to-noise and
resolution are derived on demand so they can never disagree with the fields
they are computed from.
*/
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Default, Clone)]
pub struct Centroid {
    /// The mass-to-charge ratio of the peak apex
    pub mz: f64,
    /// The acquired (absolute) intensity
    pub ai: f64,
    /// The baseline intensity under the peak
    pub base: f64,
    /// The width of the noise band at this m/z
    pub noise: Option<f64>,
    pub area: Option<f64>,
    /// Full width at half maximum
    pub fwhm: Option<f64>,
    pub charge: Option<i32>,
    pub custom_data: Option<ExtensionData>,
}

impl Centroid {
    pub fn new(mz: f64, ai: f64) -> Self {
        Self {
            mz,
            ai,
            ..Default::default()
        }
    }

    pub fn with_baseline(mz: f64, ai: f64, base: f64, noise: Option<f64>) -> Self {
        Self {
            mz,
            ai,
            base,
            noise,
            ..Default::default()
        }
    }

    /// The baseline corrected intensity
    #[inline]
    pub fn intensity(&self) -> f64 {
        self.ai - self.base
    }

    /// The signal-to-noise ratio, absent when there is no usable noise value
    pub fn sn(&self) -> Option<f64> {
        match self.noise {
            Some(noise) if noise != 0.0 => Some(self.intensity() / noise),
            _ => None,
        }
    }

    /// The peak resolution `mz / fwhm`, absent when the width is unknown
    pub fn resolution(&self) -> Option<f64> {
        match self.fwhm {
            Some(fwhm) if fwhm != 0.0 => Some(self.mz / fwhm),
            _ => None,
        }
    }

    #[inline]
    pub(crate) fn cmp_mz(&self, other: &Self) -> Ordering {
        self.mz.total_cmp(&other.mz)
    }
}

impl PartialEq for Centroid {
    fn eq(&self, other: &Self) -> bool {
        self.mz == other.mz
            && self.ai == other.ai
            && self.base == other.base
            && self.noise == other.noise
            && self.area == other.area
            && self.fwhm == other.fwhm
            && self.charge == other.charge
    }
}

impl Display for Centroid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Centroid(mz={:.5}, ai={:.1}", self.mz, self.ai)?;
        if let Some(z) = self.charge {
            write!(f, ", z={z}")?;
        }
        f.write_str(")")
    }
}

impl From<(f64, f64)> for Centroid {
    fn from((mz, ai): (f64, f64)) -> Self {
        Self::new(mz, ai)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_derived_values() {
        let peak = Centroid::with_baseline(500.0, 1200.0, 200.0, Some(50.0));
        assert_eq!(peak.intensity(), 1000.0);
        assert_eq!(peak.sn(), Some(20.0));
        assert_eq!(peak.resolution(), None);

        let peak = Centroid::new(100.0, 250.0);
        assert_eq!(peak.intensity(), 250.0);
        assert_eq!(peak.sn(), None);

        let mut peak = Centroid::with_baseline(100.0, 250.0, 0.0, Some(0.0));
        assert_eq!(peak.sn(), None);
        peak.fwhm = Some(0.01);
        assert!((peak.resolution().unwrap() - 10000.0).abs() < 1e-6);
        peak.fwhm = Some(0.0);
        assert_eq!(peak.resolution(), None);
    }

    #[test]
    fn test_equality_ignores_extension() {
        let a = Centroid::new(100.0, 1.0);
        let mut b = a.clone();
        b.custom_data = Some(ExtensionData::from([("k".to_string(), "v".to_string())]));
        assert_eq!(a, b);
        b.charge = Some(2);
        assert_ne!(a, b);
    }
}
