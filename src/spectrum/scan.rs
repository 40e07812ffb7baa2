use std::fmt::Display;

use super::centroid::Centroid;
use super::header::ScanHeader;
use super::masslist::Masslist;

/// A raw `(m/z, intensity)` point of a continuous profile trace
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ProfilePoint {
    pub mz: f64,
    pub intensity: f64,
}

impl ProfilePoint {
    pub const fn new(mz: f64, intensity: f64) -> Self {
        Self { mz, intensity }
    }
}

impl From<(f64, f64)> for ProfilePoint {
    fn from((mz, intensity): (f64, f64)) -> Self {
        Self::new(mz, intensity)
    }
}

/**
A single mass spectrum. It owns its header, its profile trace and its
centroids; either signal representation may be empty.
*/
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Scan {
    pub header: ScanHeader,
    pub profile: Vec<ProfilePoint>,
    pub centroids: Masslist,
}

impl Scan {
    pub fn new(header: ScanHeader, profile: Vec<ProfilePoint>, centroids: Masslist) -> Self {
        Self {
            header,
            profile,
            centroids,
        }
    }

    pub fn from_centroids(header: ScanHeader, centroids: Vec<Centroid>) -> Self {
        Self::new(header, Vec::new(), Masslist::new(centroids))
    }

    pub fn from_profile(header: ScanHeader, profile: Vec<ProfilePoint>) -> Self {
        Self::new(header, profile, Masslist::default())
    }

    pub fn has_profile(&self) -> bool {
        !self.profile.is_empty()
    }

    pub fn has_centroids(&self) -> bool {
        !self.centroids.is_empty()
    }

    pub fn scan_number(&self) -> Option<u32> {
        self.header.scan_number
    }
}

impl Display for Scan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{} profile points, {} centroids]",
            self.header,
            self.profile.len(),
            self.centroids.len()
        )
    }
}
