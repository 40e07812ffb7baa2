use std::io::{self, prelude::*, BufReader};
use std::mem;
use std::path::PathBuf;

use log::{debug, trace, warn};
use thiserror::Error;

use crate::io::traits::{
    first_scan, ElementSource, HeaderCursor, ScanAccessError, ScanCursor, ScanFilter, ScanSource,
    Selection, SpectrumBuilding,
};
use crate::io::utils::{DetailLevel, FileSource, ReaderSource};
use crate::spectrum::bindata::{build_peaks, ArrayRetrievalError, PeakData, PeakTuple};
use crate::spectrum::{Scan, ScanHeader, SpectrumKind};

const BUFFER_SIZE: usize = 8192;

/// Intensity given to a peak line that only lists an m/z
const DEFAULT_INTENSITY: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MGFParserState {
    Start,
    ScanHeaders,
    Peaks,
    /// Discarding the rest of a block that failed to parse
    Recovering,
    Between,
    Done,
}

#[derive(Debug, Error)]
pub enum MGFError {
    #[error("Encountered a malformed peak line: {0}")]
    MalformedPeakLine(String),
    #[error("Encountered a malformed header line: {0}")]
    MalformedHeaderLine(String),
    #[error("Encountered an IO error: {0}")]
    IOError(
        #[from]
        #[source]
        io::Error,
    ),
}

impl From<MGFError> for io::Error {
    fn from(value: MGFError) -> Self {
        match value {
            MGFError::IOError(e) => e,
            e => io::Error::new(io::ErrorKind::InvalidData, e),
        }
    }
}

/// Everything read from one `BEGIN IONS` block
#[derive(Debug, Default, Clone)]
pub struct MGFSpectrumBuilder {
    pub header: ScanHeader,
    points: Vec<PeakTuple>,
    charges: Vec<Option<i32>>,
}

impl SpectrumBuilding for MGFSpectrumBuilder {
    fn header(&self) -> &ScanHeader {
        &self.header
    }

    fn into_header(self) -> ScanHeader {
        self.header
    }

    fn into_scan(self, default_kind: SpectrumKind) -> Result<Scan, ArrayRetrievalError> {
        let kind = self.header.spectrum_kind.or_fallback(default_kind);
        let mut header = self.header;
        header.spectrum_kind = kind;
        header.points_count = Some(self.points.len());
        Ok(match build_peaks(self.points, kind, false) {
            PeakData::Centroids(mut centroids) => {
                for (centroid, charge) in centroids.iter_mut().zip(self.charges) {
                    centroid.charge = charge;
                }
                Scan::from_centroids(header, centroids)
            }
            PeakData::Profile(profile) => Scan::from_profile(header, profile),
        })
    }
}

/// Read a charge written as `2+`, `3-`, `+2` or `2`. Only the first of a
/// list such as `2+ and 3+` is kept.
pub fn parse_charge(value: &str) -> Option<i32> {
    let token = value
        .split(|c: char| c == ',' || c.is_whitespace())
        .find(|t| !t.is_empty())?;
    let (sign, digits) = if let Some(stripped) = token.strip_suffix('+') {
        (1, stripped)
    } else if let Some(stripped) = token.strip_suffix('-') {
        (-1, stripped)
    } else {
        (1, token)
    };
    if digits.len() != token.len() && digits.starts_with(['-', '+']) {
        return None;
    }
    digits.parse::<i32>().ok().map(|z| z * sign)
}

/// The first number of a value that may be a range such as `10-12`
fn first_of_range(value: &str) -> &str {
    value.split('-').next().unwrap_or(value).trim()
}

/// A single forward pass over an MGF stream.
///
/// A block that fails to parse is reported once and skipped; the pass then
/// continues with the next `BEGIN IONS`.
pub struct MGFParser<R: Read> {
    handle: BufReader<R>,
    state: MGFParserState,
    selection: Selection,
    detail_level: DetailLevel,
    line: String,
    line_number: usize,
    builder: MGFSpectrumBuilder,
    skip: bool,
}

impl<R: Read> std::fmt::Debug for MGFParser<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MGFParser")
            .field("state", &self.state)
            .field("line_number", &self.line_number)
            .finish()
    }
}

impl<R: Read> MGFParser<R> {
    pub(crate) fn new(stream: R, selection: Selection, detail_level: DetailLevel) -> Self {
        Self {
            handle: BufReader::with_capacity(BUFFER_SIZE, stream),
            state: MGFParserState::Start,
            selection,
            detail_level,
            line: String::new(),
            line_number: 0,
            builder: MGFSpectrumBuilder::default(),
            skip: false,
        }
    }

    pub fn state(&self) -> MGFParserState {
        self.state
    }

    fn begin_block(&mut self) {
        if matches!(self.state, MGFParserState::ScanHeaders | MGFParserState::Peaks) {
            warn!("BEGIN IONS at line {} inside an open block", self.line_number);
        }
        self.builder = MGFSpectrumBuilder::default();
        self.skip = false;
        self.state = MGFParserState::ScanHeaders;
    }

    fn handle_header(&mut self, key: &str, value: &str) -> Result<(), MGFError> {
        let header = &mut self.builder.header;
        let malformed = || MGFError::MalformedHeaderLine(format!("{key}={value}"));
        match key {
            "TITLE" => header.title = Some(value.to_string()),
            "SCANS" => {
                header.scan_number = Some(first_of_range(value).parse().map_err(|_| malformed())?)
            }
            "RTINSECONDS" => {
                header.retention_time =
                    Some(first_of_range(value).parse().map_err(|_| malformed())?)
            }
            "PEPMASS" => {
                let mut parts = value.split_ascii_whitespace();
                let mz = parts.next().ok_or_else(malformed)?;
                header.precursor_mz = Some(mz.parse().map_err(|_| malformed())?);
                header.ms_level = Some(2);
                if let Some(intensity) = parts.next() {
                    match intensity.parse::<f64>() {
                        Ok(intensity) => header.precursor_intensity = Some(intensity),
                        Err(e) => debug!("Ignoring PEPMASS intensity {intensity:?}: {e}"),
                    }
                }
                if let Some(charge) = parts.next() {
                    header.precursor_charge = Some(parse_charge(charge).ok_or_else(malformed)?);
                }
            }
            "CHARGE" => header.precursor_charge = Some(parse_charge(value).ok_or_else(malformed)?),
            _ => header.insert_custom(key.to_lowercase(), value),
        }
        Ok(())
    }

    fn handle_peak(&mut self, line: &str) -> Result<(), MGFError> {
        if self.state == MGFParserState::ScanHeaders {
            self.state = MGFParserState::Peaks;
            // Headers always precede the peaks, so the filters can be checked now
            if !self.selection.accepts(&self.builder.header) {
                trace!("Skipping block {:?}", self.builder.header.scan_number);
                self.skip = true;
            }
        }
        if self.skip {
            return Ok(());
        }
        let malformed = || MGFError::MalformedPeakLine(line.to_string());
        let mut tokens = line.split_ascii_whitespace();
        let mz: f64 = tokens
            .next()
            .ok_or_else(malformed)?
            .parse()
            .map_err(|_| malformed())?;
        let intensity = match tokens.next() {
            Some(token) => token.parse().map_err(|_| malformed())?,
            None => DEFAULT_INTENSITY,
        };
        let charge = match tokens.next() {
            Some(token) => Some(parse_charge(token).ok_or_else(malformed)?),
            None => None,
        };
        if self.detail_level.keeps_signal() {
            self.builder.points.push((mz, intensity, 0.0));
            self.builder.charges.push(charge);
        }
        self.builder.header.points_count = Some(self.builder.header.points_count.unwrap_or(0) + 1);
        Ok(())
    }

    fn handle_block_line(&mut self, line: &str) -> Result<(), MGFError> {
        let starts_numeric = line
            .chars()
            .next()
            .map(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.'))
            .unwrap_or(false);
        if starts_numeric {
            return self.handle_peak(line);
        }
        match line.split_once('=') {
            Some((key, value)) if self.state == MGFParserState::ScanHeaders => {
                self.handle_header(key.trim(), value.trim())
            }
            Some(_) => Err(MGFError::MalformedPeakLine(line.to_string())),
            None => Err(MGFError::MalformedHeaderLine(format!(
                "No '=' in header line {line:?}"
            ))),
        }
    }

    fn end_block(&mut self) -> Option<MGFSpectrumBuilder> {
        self.state = MGFParserState::Between;
        let builder = mem::take(&mut self.builder);
        if self.skip || !self.selection.accepts(&builder.header) {
            return None;
        }
        Some(builder)
    }

    /// Read lines until a block is completed, a block fails, or the stream ends
    pub fn read_next(&mut self) -> Option<Result<MGFSpectrumBuilder, MGFError>> {
        loop {
            if self.state == MGFParserState::Done {
                return None;
            }
            self.line.clear();
            match self.handle.read_line(&mut self.line) {
                Ok(0) => {
                    if matches!(self.state, MGFParserState::ScanHeaders | MGFParserState::Peaks) {
                        warn!("Discarding a block left open at the end of the stream");
                    }
                    self.state = MGFParserState::Done;
                    return None;
                }
                Ok(_) => {}
                Err(e) => {
                    self.state = MGFParserState::Done;
                    return Some(Err(MGFError::IOError(e)));
                }
            }
            self.line_number += 1;
            let line = mem::take(&mut self.line);
            let trimmed = line.trim();
            let result = self.handle_line(trimmed);
            self.line = line;
            match result {
                Ok(Some(builder)) => return Some(Ok(builder)),
                Ok(None) => {}
                Err(e) => {
                    debug!("Line {}: {e}", self.line_number);
                    self.state = MGFParserState::Recovering;
                    return Some(Err(e));
                }
            }
        }
    }

    fn handle_line(&mut self, line: &str) -> Result<Option<MGFSpectrumBuilder>, MGFError> {
        if line.is_empty() || line.starts_with(['#', ';', '!', '/']) {
            return Ok(None);
        }
        if line == "BEGIN IONS" {
            self.begin_block();
            return Ok(None);
        }
        match self.state {
            MGFParserState::ScanHeaders | MGFParserState::Peaks => {
                if line == "END IONS" {
                    Ok(self.end_block())
                } else {
                    self.handle_block_line(line).map(|_| None)
                }
            }
            MGFParserState::Recovering => {
                if line == "END IONS" {
                    self.state = MGFParserState::Between;
                }
                Ok(None)
            }
            // File level parameters apply to no particular block
            MGFParserState::Start | MGFParserState::Between | MGFParserState::Done => Ok(None),
        }
    }
}

impl<R: Read> ElementSource for MGFParser<R> {
    type Builder = MGFSpectrumBuilder;

    fn next_element(&mut self) -> Option<Result<Self::Builder, ScanAccessError>> {
        let result = self.read_next()?;
        // A failed block is still the current one
        let scan = self.builder.header.scan_number;
        Some(result.map_err(|e| match e {
            MGFError::IOError(e) => ScanAccessError::IOError(e),
            e => ScanAccessError::InvalidScan {
                scan,
                source: Box::new(e),
            },
        }))
    }
}

/// A reader for MGF (Mascot Generic Format) peak lists
#[derive(Debug, Clone)]
pub struct MGFReaderType<S: ReaderSource> {
    source: S,
}

pub type MGFReader = MGFReaderType<FileSource>;

impl MGFReaderType<FileSource> {
    pub fn open_path<P: Into<PathBuf>>(path: P) -> Result<Self, ScanAccessError> {
        Ok(Self::new(FileSource::new(path)?))
    }
}

impl<S: ReaderSource> MGFReaderType<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    fn open_parser(
        &self,
        selection: Selection,
        detail_level: DetailLevel,
    ) -> Result<MGFParser<S::Stream>, ScanAccessError> {
        Ok(MGFParser::new(
            self.source.open_stream()?,
            selection,
            detail_level,
        ))
    }
}

impl<S: ReaderSource> ScanSource for MGFReaderType<S> {
    type HeaderIter<'a> = HeaderCursor<MGFParser<S::Stream>> where Self: 'a;
    type ScanIter<'a> = ScanCursor<MGFParser<S::Stream>> where Self: 'a;

    fn headers(&mut self, filter: ScanFilter) -> Result<Self::HeaderIter<'_>, ScanAccessError> {
        let parser = self.open_parser(Selection::filtered(filter), DetailLevel::MetadataOnly)?;
        Ok(HeaderCursor::new(parser))
    }

    fn scans(
        &mut self,
        filter: ScanFilter,
        default_kind: SpectrumKind,
    ) -> Result<Self::ScanIter<'_>, ScanAccessError> {
        let parser = self.open_parser(Selection::filtered(filter), DetailLevel::Full)?;
        Ok(ScanCursor::new(parser, default_kind))
    }

    fn scan(
        &mut self,
        scan_number: Option<u32>,
        default_kind: SpectrumKind,
    ) -> Result<Scan, ScanAccessError> {
        let parser = self.open_parser(Selection::by_number(scan_number), DetailLevel::Full)?;
        first_scan(ScanCursor::new(parser, default_kind), scan_number)
    }
}
