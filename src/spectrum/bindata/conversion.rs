use crate::spectrum::centroid::Centroid;
use crate::spectrum::scan::ProfilePoint;
use crate::spectrum::scan_properties::SpectrumKind;

use super::encodings::ArrayRetrievalError;

/// A decoded `(m/z, acquired intensity, third channel)` tuple
pub type PeakTuple = (f64, f64, f64);

/// The two shapes decoded signal may take
#[derive(Debug, Clone, PartialEq)]
pub enum PeakData {
    Centroids(Vec<Centroid>),
    Profile(Vec<ProfilePoint>),
}

impl PeakData {
    pub fn len(&self) -> usize {
        match self {
            Self::Centroids(c) => c.len(),
            Self::Profile(p) => p.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Zip parallel channels into fixed-width tuples.
///
/// The third channel is optional and padded with zeros when it is absent or
/// shorter than the others.
pub fn zip_channels(
    mz: &[f64],
    intensity: &[f64],
    third: Option<&[f64]>,
) -> Result<Vec<PeakTuple>, ArrayRetrievalError> {
    if mz.len() != intensity.len() {
        return Err(ArrayRetrievalError::LengthMismatch(mz.len(), intensity.len()));
    }
    let third = third.unwrap_or(&[]);
    Ok(mz
        .iter()
        .zip(intensity.iter())
        .enumerate()
        .map(|(i, (mz, int))| (*mz, *int, third.get(i).copied().unwrap_or(0.0)))
        .collect())
}

/// Split an interleaved `[mz0, int0, mz1, int1, ...]` array
pub fn deinterleave(values: &[f64]) -> Result<Vec<PeakTuple>, ArrayRetrievalError> {
    if values.len() % 2 != 0 {
        return Err(ArrayRetrievalError::LengthMismatch(
            values.len() / 2 + 1,
            values.len() / 2,
        ));
    }
    Ok(values
        .chunks_exact(2)
        .map(|pair| (pair[0], pair[1], 0.0))
        .collect())
}

/// Turn decoded tuples into the representation `kind` calls for.
///
/// When `sn_channel` is set the third value is a signal-to-noise ratio and the
/// noise band is recovered as `ai / sn`; a ratio of zero means no noise.
pub fn build_peaks(points: Vec<PeakTuple>, kind: SpectrumKind, sn_channel: bool) -> PeakData {
    match kind {
        SpectrumKind::Profile => PeakData::Profile(
            points
                .into_iter()
                .map(|(mz, ai, _)| ProfilePoint::new(mz, ai))
                .collect(),
        ),
        // A kind that is still unknown here has no better answer than centroids
        SpectrumKind::Centroid | SpectrumKind::Unknown => PeakData::Centroids(
            points
                .into_iter()
                .map(|(mz, ai, third)| {
                    let noise = if sn_channel && third != 0.0 {
                        Some(ai / third)
                    } else {
                        None
                    };
                    Centroid::with_baseline(mz, ai, 0.0, noise)
                })
                .collect(),
        ),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_zip_channels() {
        let mz = [100.0, 200.0, 300.0];
        let int = [10.0, 20.0, 30.0];
        let tuples = zip_channels(&mz, &int, Some(&[5.0])).unwrap();
        assert_eq!(tuples, vec![(100.0, 10.0, 5.0), (200.0, 20.0, 0.0), (300.0, 30.0, 0.0)]);

        let tuples = zip_channels(&mz, &int, None).unwrap();
        assert!(tuples.iter().all(|t| t.2 == 0.0));

        assert_eq!(
            zip_channels(&mz, &int[..2], None),
            Err(ArrayRetrievalError::LengthMismatch(3, 2))
        );
    }

    #[test]
    fn test_deinterleave() {
        let tuples = deinterleave(&[100.0, 1.0, 200.0, 2.0]).unwrap();
        assert_eq!(tuples, vec![(100.0, 1.0, 0.0), (200.0, 2.0, 0.0)]);
        assert!(deinterleave(&[100.0, 1.0, 200.0]).is_err());
        assert!(deinterleave(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_build_peaks() {
        let points = vec![(100.0, 50.0, 10.0), (200.0, 80.0, 0.0)];
        match build_peaks(points.clone(), SpectrumKind::Centroid, true) {
            PeakData::Centroids(peaks) => {
                assert_eq!(peaks[0].noise, Some(5.0));
                assert_eq!(peaks[0].sn(), Some(10.0));
                assert_eq!(peaks[1].noise, None);
                assert_eq!(peaks[1].sn(), None);
            }
            other => panic!("Expected centroids, got {other:?}"),
        }
        match build_peaks(points.clone(), SpectrumKind::Centroid, false) {
            PeakData::Centroids(peaks) => assert!(peaks.iter().all(|p| p.noise.is_none())),
            other => panic!("Expected centroids, got {other:?}"),
        }
        match build_peaks(points, SpectrumKind::Profile, true) {
            PeakData::Profile(trace) => {
                assert_eq!(trace, vec![ProfilePoint::new(100.0, 50.0), ProfilePoint::new(200.0, 80.0)])
            }
            other => panic!("Expected profile, got {other:?}"),
        }
    }
}
