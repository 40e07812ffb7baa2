use std::io::{self, BufRead, BufReader, Read};
use std::num::ParseFloatError;
use std::path::PathBuf;

use lazy_static::lazy_static;
use log::warn;
use regex::Regex;
use thiserror::Error;

use crate::io::traits::{ScanAccessError, ScanFilter, ScanSource};
use crate::io::utils::{FileSource, ReaderSource};
use crate::spectrum::bindata::{build_peaks, PeakData, PeakTuple};
use crate::spectrum::{Scan, ScanHeader, SpectrumKind};

lazy_static! {
    static ref COLUMNS: Regex =
        Regex::new(r"^([-0-9.eE+]+)[ \t]*[;,]?[ \t]*([-0-9.eE+]*)$").unwrap();
}

const BUFFER_SIZE: usize = 8192;

/// The number every XY spectrum is known by
pub const XY_SCAN_NUMBER: u32 = 0;

#[derive(Debug, Error)]
pub enum XyParserError {
    #[error("Could not parse a number on line {0:?}: {1}")]
    InvalidNumber(String, #[source] ParseFloatError),
    #[error("Line {0:?} does not hold one or two columns")]
    MissingColumns(String),
    #[error("An IO error occurred: {0}")]
    IOError(
        #[from]
        #[source]
        io::Error,
    ),
}

impl From<XyParserError> for io::Error {
    fn from(value: XyParserError) -> Self {
        match value {
            XyParserError::IOError(e) => e,
            e => io::Error::new(io::ErrorKind::InvalidData, e),
        }
    }
}

fn parse_line(line: &str) -> Result<PeakTuple, XyParserError> {
    let caps = COLUMNS
        .captures(line)
        .ok_or_else(|| XyParserError::MissingColumns(line.to_string()))?;
    let invalid = |e| XyParserError::InvalidNumber(line.to_string(), e);
    let mz: f64 = caps[1].parse().map_err(invalid)?;
    let intensity = match caps.get(2).map(|m| m.as_str()) {
        Some(text) if !text.is_empty() => text.parse().map_err(invalid)?,
        _ => 0.0,
    };
    Ok((mz, intensity, 0.0))
}

/// Read every point of an XY stream. Blank lines, `#` comments and a leading
/// `m/z` column title are skipped.
pub fn read_points<R: Read>(stream: R) -> Result<Vec<PeakTuple>, XyParserError> {
    let mut handle = BufReader::with_capacity(BUFFER_SIZE, stream);
    let mut points = Vec::new();
    let mut line = String::new();
    loop {
        line.clear();
        if handle.read_line(&mut line)? == 0 {
            break;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("m/z") {
            continue;
        }
        points.push(parse_line(trimmed)?);
    }
    Ok(points)
}

fn xy_header() -> ScanHeader {
    ScanHeader {
        scan_number: Some(XY_SCAN_NUMBER),
        ..Default::default()
    }
}

/**
A reader for plain two column `<m/z> <intensity>` text files.

These files hold a single spectrum with no metadata, known by scan number 0.
A line that cannot be read leaves the spectrum empty rather than failing.
*/
#[derive(Debug, Clone)]
pub struct XyReaderType<S: ReaderSource> {
    source: S,
}

pub type XyReader = XyReaderType<FileSource>;

impl XyReaderType<FileSource> {
    pub fn open_path<P: Into<PathBuf>>(path: P) -> Result<Self, ScanAccessError> {
        Ok(Self::new(FileSource::new(path)?))
    }
}

impl<S: ReaderSource> XyReaderType<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    fn read_scan(&self, default_kind: SpectrumKind) -> Result<Scan, ScanAccessError> {
        let points = match read_points(self.source.open_stream()?) {
            Ok(points) => points,
            Err(XyParserError::IOError(e)) => return Err(e.into()),
            Err(e) => {
                warn!("Discarding the points of {:?}: {e}", self.source);
                Vec::new()
            }
        };
        let mut header = xy_header();
        header.spectrum_kind = default_kind;
        header.points_count = Some(points.len());
        Ok(match build_peaks(points, default_kind, false) {
            PeakData::Centroids(centroids) => Scan::from_centroids(header, centroids),
            PeakData::Profile(profile) => Scan::from_profile(header, profile),
        })
    }
}

impl<S: ReaderSource> ScanSource for XyReaderType<S> {
    type HeaderIter<'a> = std::option::IntoIter<Result<ScanHeader, ScanAccessError>> where Self: 'a;
    type ScanIter<'a> = std::option::IntoIter<Result<Scan, ScanAccessError>> where Self: 'a;

    fn headers(&mut self, filter: ScanFilter) -> Result<Self::HeaderIter<'_>, ScanAccessError> {
        let header = xy_header();
        Ok(filter.matches(&header).then_some(Ok(header)).into_iter())
    }

    fn scans(
        &mut self,
        filter: ScanFilter,
        default_kind: SpectrumKind,
    ) -> Result<Self::ScanIter<'_>, ScanAccessError> {
        if !filter.matches(&xy_header()) {
            return Ok(None.into_iter());
        }
        Ok(Some(self.read_scan(default_kind)).into_iter())
    }

    fn scan(
        &mut self,
        scan_number: Option<u32>,
        default_kind: SpectrumKind,
    ) -> Result<Scan, ScanAccessError> {
        match scan_number {
            None | Some(XY_SCAN_NUMBER) => self.read_scan(default_kind),
            Some(_) => Err(ScanAccessError::ScanNotFound(scan_number)),
        }
    }
}
