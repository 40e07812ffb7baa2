use std::cmp::Ordering;
use std::ops::Index;
use std::slice;

use super::centroid::Centroid;

/**
An owned collection of [`Centroid`]s kept in ascending m/z order.

Every mutation restores the ordering, so lookups may binary search. Peaks with
identical m/z may appear in any relative order.
*/
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Masslist {
    peaks: Vec<Centroid>,
}

impl Masslist {
    pub fn new(mut peaks: Vec<Centroid>) -> Self {
        peaks.sort_by(Centroid::cmp_mz);
        Self { peaks }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            peaks: Vec::with_capacity(capacity),
        }
    }

    /// Add a peak and restore the m/z ordering
    pub fn add(&mut self, peak: Centroid) {
        let i = self
            .peaks
            .partition_point(|p| p.cmp_mz(&peak) != Ordering::Greater);
        self.peaks.insert(i, peak);
    }

    pub fn extend<I: IntoIterator<Item = Centroid>>(&mut self, peaks: I) {
        self.peaks.extend(peaks);
        self.peaks.sort_by(Centroid::cmp_mz);
    }

    /// The most intense peak by baseline corrected intensity
    pub fn basepeak(&self) -> Option<&Centroid> {
        self.peaks
            .iter()
            .max_by(|a, b| a.intensity().total_cmp(&b.intensity()))
    }

    /// The total ion current, the sum of corrected intensities
    pub fn tic(&self) -> f64 {
        self.peaks.iter().map(|p| p.intensity()).sum()
    }

    /// Find the peak closest to `mz`
    pub fn nearest(&self, mz: f64) -> Option<&Centroid> {
        if self.peaks.is_empty() {
            return None;
        }
        let i = self.peaks.partition_point(|p| p.mz < mz);
        let after = self.peaks.get(i);
        let before = i.checked_sub(1).and_then(|j| self.peaks.get(j));
        match (before, after) {
            (Some(b), Some(a)) => {
                if (mz - b.mz).abs() <= (a.mz - mz).abs() {
                    Some(b)
                } else {
                    Some(a)
                }
            }
            (Some(b), None) => Some(b),
            (None, a) => a,
        }
    }

    /// All peaks with `low <= mz <= high`
    pub fn in_range(&self, low: f64, high: f64) -> &[Centroid] {
        let start = self.peaks.partition_point(|p| p.mz < low);
        let end = self.peaks.partition_point(|p| p.mz <= high);
        if start >= end {
            &[]
        } else {
            &self.peaks[start..end]
        }
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, Centroid> {
        self.peaks.iter()
    }

    pub fn as_slice(&self) -> &[Centroid] {
        &self.peaks
    }

    pub fn into_inner(self) -> Vec<Centroid> {
        self.peaks
    }
}

impl Index<usize> for Masslist {
    type Output = Centroid;

    fn index(&self, index: usize) -> &Self::Output {
        &self.peaks[index]
    }
}

impl FromIterator<Centroid> for Masslist {
    fn from_iter<T: IntoIterator<Item = Centroid>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl From<Vec<Centroid>> for Masslist {
    fn from(value: Vec<Centroid>) -> Self {
        Self::new(value)
    }
}

impl IntoIterator for Masslist {
    type Item = Centroid;
    type IntoIter = std::vec::IntoIter<Centroid>;

    fn into_iter(self) -> Self::IntoIter {
        self.peaks.into_iter()
    }
}

impl<'a> IntoIterator for &'a Masslist {
    type Item = &'a Centroid;
    type IntoIter = slice::Iter<'a, Centroid>;

    fn into_iter(self) -> Self::IntoIter {
        self.peaks.iter()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn is_sorted(peaks: &Masslist) -> bool {
        peaks.as_slice().windows(2).all(|w| w[0].mz <= w[1].mz)
    }

    #[test]
    fn test_sorted_after_add() {
        let mut peaks = Masslist::default();
        for mz in [500.0, 100.0, 300.0, 300.0, 50.0, 1000.0, 299.9] {
            peaks.add(Centroid::new(mz, mz / 10.0));
            assert!(is_sorted(&peaks));
        }
        peaks.extend([Centroid::new(1.0, 1.0), Centroid::new(700.0, 2.0)]);
        assert!(is_sorted(&peaks));
        assert_eq!(peaks.len(), 9);
        assert_eq!(peaks[0].mz, 1.0);
    }

    #[test]
    fn test_add_matches_sort() {
        let values = [300.0, f64::NAN, 100.0, -0.0, 0.0, 200.0];
        let mut added = Masslist::default();
        for mz in values {
            added.add(Centroid::new(mz, 1.0));
        }
        let sorted = Masslist::new(values.iter().map(|mz| Centroid::new(*mz, 1.0)).collect());
        let bits = |peaks: &Masslist| -> Vec<u64> { peaks.iter().map(|p| p.mz.to_bits()).collect() };
        assert_eq!(bits(&added), bits(&sorted));
        assert!(added[added.len() - 1].mz.is_nan());
    }

    #[test]
    fn test_basepeak_and_tic() {
        let peaks = Masslist::default();
        assert!(peaks.basepeak().is_none());
        assert_eq!(peaks.tic(), 0.0);

        let peaks: Masslist = vec![
            Centroid::with_baseline(200.0, 150.0, 100.0, None),
            Centroid::new(100.0, 80.0),
            Centroid::new(300.0, 20.0),
        ]
        .into_iter()
        .collect();
        let bp = peaks.basepeak().unwrap();
        assert_eq!(bp.mz, 100.0);
        assert_eq!(peaks.tic(), 150.0);
    }

    #[test]
    fn test_lookup() {
        let peaks: Masslist = [100.0, 200.0, 300.0, 400.0]
            .into_iter()
            .map(|mz| Centroid::new(mz, 1.0))
            .collect();
        assert_eq!(peaks.nearest(240.0).unwrap().mz, 200.0);
        assert_eq!(peaks.nearest(260.0).unwrap().mz, 300.0);
        assert_eq!(peaks.nearest(5000.0).unwrap().mz, 400.0);
        assert_eq!(peaks.nearest(0.0).unwrap().mz, 100.0);
        assert_eq!(peaks.in_range(150.0, 300.0).len(), 2);
        assert!(peaks.in_range(450.0, 500.0).is_empty());
        assert!(Masslist::default().nearest(1.0).is_none());
    }
}
