use std::error::Error as StdError;
use std::io;

use thiserror::Error;

use crate::spectrum::bindata::ArrayRetrievalError;
use crate::spectrum::{Scan, ScanHeader, ScanPolarity, SpectrumKind};

use super::summary::RunSummary;

/// Early filters applied to every scan before any binary data is decoded.
///
/// A criterion left as `None` accepts everything. A criterion that is set
/// rejects any header that does not record the corresponding field.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ScanFilter {
    /// Minimum retention time in seconds
    pub min_rt: Option<f64>,
    /// Maximum retention time in seconds
    pub max_rt: Option<f64>,
    pub ms_level: Option<u8>,
    pub polarity: Option<ScanPolarity>,
}

impl ScanFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rt_range(mut self, min_rt: Option<f64>, max_rt: Option<f64>) -> Self {
        self.min_rt = min_rt;
        self.max_rt = max_rt;
        self
    }

    pub fn with_ms_level(mut self, ms_level: u8) -> Self {
        self.ms_level = Some(ms_level);
        self
    }

    pub fn with_polarity(mut self, polarity: ScanPolarity) -> Self {
        self.polarity = Some(polarity);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.min_rt.is_none()
            && self.max_rt.is_none()
            && self.ms_level.is_none()
            && self.polarity.is_none()
    }

    pub fn matches(&self, header: &ScanHeader) -> bool {
        if let Some(min_rt) = self.min_rt {
            match header.retention_time {
                Some(rt) if rt >= min_rt => {}
                _ => return false,
            }
        }
        if let Some(max_rt) = self.max_rt {
            match header.retention_time {
                Some(rt) if rt <= max_rt => {}
                _ => return false,
            }
        }
        if let Some(level) = self.ms_level {
            if header.ms_level != Some(level) {
                return false;
            }
        }
        if let Some(polarity) = self.polarity {
            if header.polarity != polarity {
                return false;
            }
        }
        true
    }
}

/// What a single pass over a source should emit
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub(crate) struct Selection {
    pub filter: ScanFilter,
    /// Only accept the scan with this number
    pub scan_number: Option<u32>,
}

impl Selection {
    pub fn filtered(filter: ScanFilter) -> Self {
        Self {
            filter,
            scan_number: None,
        }
    }

    pub fn by_number(scan_number: Option<u32>) -> Self {
        Self {
            filter: ScanFilter::default(),
            scan_number,
        }
    }

    pub fn accepts(&self, header: &ScanHeader) -> bool {
        if let Some(number) = self.scan_number {
            if header.scan_number != Some(number) {
                return false;
            }
        }
        self.filter.matches(header)
    }
}

/// Errors that may occur when reading scans from a [`ScanSource`]
#[derive(Debug, Error)]
pub enum ScanAccessError {
    /// The requested scan was not found, or the source holds no scans
    #[error("The requested scan {0:?} was not found")]
    ScanNotFound(Option<u32>),
    /// The source could not be opened or read
    #[error("I/O error occurred while reading: {0}")]
    IOError(#[from] io::Error),
    /// The document is malformed beyond recovery. The pass that produced
    /// this error yields nothing further.
    #[error("Failed to parse the document: {0}")]
    ParserError(#[source] Box<dyn StdError + Send + Sync + 'static>),
    /// One scan's signal could not be decoded. Later scans are unaffected.
    #[error("Failed to decode the signal of scan {scan:?}: {source}")]
    DecodeError {
        scan: Option<u32>,
        #[source]
        source: ArrayRetrievalError,
    },
    /// One scan's record is malformed. Later scans are unaffected.
    #[error("Scan {scan:?} is malformed: {source}")]
    InvalidScan {
        scan: Option<u32>,
        #[source]
        source: Box<dyn StdError + Send + Sync + 'static>,
    },
    /// The format does not support the requested operation
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),
}

impl ScanAccessError {
    pub(crate) fn parser<E: StdError + Send + Sync + 'static>(err: E) -> Self {
        Self::ParserError(Box::new(err))
    }

    /// The scan a per-scan error refers to
    pub fn scan_number(&self) -> Option<u32> {
        match self {
            Self::ScanNotFound(scan)
            | Self::DecodeError { scan, .. }
            | Self::InvalidScan { scan, .. } => *scan,
            _ => None,
        }
    }

    /// Whether the pass that produced this error can keep going
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::DecodeError { .. } | Self::InvalidScan { .. })
    }
}

impl From<ScanAccessError> for io::Error {
    fn from(value: ScanAccessError) -> Self {
        match value {
            ScanAccessError::IOError(e) => e,
            ScanAccessError::ScanNotFound(_) => io::Error::new(io::ErrorKind::NotFound, value),
            ScanAccessError::UnsupportedOperation(_) => {
                io::Error::new(io::ErrorKind::Unsupported, value)
            }
            _ => io::Error::new(io::ErrorKind::InvalidData, value),
        }
    }
}

/// The uniform reading contract every format implements.
///
/// Each call starts a fresh forward-only pass over the source. Dropping the
/// returned cursor releases whatever handle the pass opened.
pub trait ScanSource {
    type HeaderIter<'a>: Iterator<Item = Result<ScanHeader, ScanAccessError>>
    where
        Self: 'a;
    type ScanIter<'a>: Iterator<Item = Result<Scan, ScanAccessError>>
    where
        Self: 'a;

    /// Iterate over the headers of every scan passing `filter`, without
    /// touching peak data
    fn headers(&mut self, filter: ScanFilter) -> Result<Self::HeaderIter<'_>, ScanAccessError>;

    /// Iterate over every scan passing `filter`. `default_kind` decides how
    /// points are read when the document does not declare a spectrum kind.
    fn scans(
        &mut self,
        filter: ScanFilter,
        default_kind: SpectrumKind,
    ) -> Result<Self::ScanIter<'_>, ScanAccessError>;

    /// Read the scan numbered `scan_number`, or the first scan when `None`
    fn scan(
        &mut self,
        scan_number: Option<u32>,
        default_kind: SpectrumKind,
    ) -> Result<Scan, ScanAccessError>;

    /// Collect a [`RunSummary`] from a single pass over all headers
    fn summary(&mut self) -> Result<RunSummary, ScanAccessError> {
        let mut summary = RunSummary::default();
        for header in self.headers(ScanFilter::default())? {
            summary.add(&header?);
        }
        Ok(summary)
    }
}

/// The parse output for a single scan element, before its signal is decoded
pub trait SpectrumBuilding: Sized {
    fn header(&self) -> &ScanHeader;

    fn into_header(self) -> ScanHeader;

    fn into_scan(self, default_kind: SpectrumKind) -> Result<Scan, ArrayRetrievalError>;
}

/// A dialect parser that produces one accepted element at a time
pub trait ElementSource {
    type Builder: SpectrumBuilding;

    /// Advance to the next element the pass's [`Selection`] accepts.
    ///
    /// An error here ends the pass unless it is recoverable.
    fn next_element(&mut self) -> Option<Result<Self::Builder, ScanAccessError>>;
}

/// A pull cursor over the headers an [`ElementSource`] produces
#[derive(Debug)]
pub struct HeaderCursor<P> {
    parser: P,
    done: bool,
}

impl<P> HeaderCursor<P> {
    pub(crate) fn new(parser: P) -> Self {
        Self {
            parser,
            done: false,
        }
    }
}

impl<P: ElementSource> Iterator for HeaderCursor<P> {
    type Item = Result<ScanHeader, ScanAccessError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.parser.next_element() {
            Some(Ok(builder)) => Some(Ok(builder.into_header())),
            Some(Err(e)) => {
                self.done = !e.is_recoverable();
                Some(Err(e))
            }
            None => {
                self.done = true;
                None
            }
        }
    }
}

/// A pull cursor over the fully decoded scans an [`ElementSource`] produces
#[derive(Debug)]
pub struct ScanCursor<P> {
    parser: P,
    default_kind: SpectrumKind,
    done: bool,
}

impl<P> ScanCursor<P> {
    pub(crate) fn new(parser: P, default_kind: SpectrumKind) -> Self {
        Self {
            parser,
            default_kind,
            done: false,
        }
    }
}

impl<P: ElementSource> Iterator for ScanCursor<P> {
    type Item = Result<Scan, ScanAccessError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.parser.next_element() {
            Some(Ok(builder)) => {
                let scan = builder.header().scan_number;
                Some(builder.into_scan(self.default_kind).map_err(|source| {
                    log::warn!("Failed to decode scan {scan:?}: {source}");
                    ScanAccessError::DecodeError { scan, source }
                }))
            }
            Some(Err(e)) => {
                self.done = !e.is_recoverable();
                Some(Err(e))
            }
            None => {
                self.done = true;
                None
            }
        }
    }
}

/// Take the first scan a cursor yields, turning exhaustion into
/// [`ScanAccessError::ScanNotFound`]
pub(crate) fn first_scan<I>(iter: I, scan_number: Option<u32>) -> Result<Scan, ScanAccessError>
where
    I: Iterator<Item = Result<Scan, ScanAccessError>>,
{
    for item in iter {
        match item {
            // Another record failed while looking for this one
            Err(e) if scan_number.is_some() && e.is_recoverable() && e.scan_number() != scan_number => {
                continue
            }
            item => return item,
        }
    }
    Err(ScanAccessError::ScanNotFound(scan_number))
}

#[cfg(test)]
mod test {
    use super::*;

    fn header(rt: Option<f64>, level: Option<u8>, polarity: ScanPolarity) -> ScanHeader {
        ScanHeader {
            retention_time: rt,
            ms_level: level,
            polarity,
            ..Default::default()
        }
    }

    #[test]
    fn test_filter() {
        let h = header(Some(120.0), Some(2), ScanPolarity::Positive);
        assert!(ScanFilter::default().matches(&h));
        assert!(ScanFilter::new().with_rt_range(Some(60.0), Some(120.0)).matches(&h));
        assert!(!ScanFilter::new().with_rt_range(Some(121.0), None).matches(&h));
        assert!(!ScanFilter::new().with_rt_range(None, Some(119.0)).matches(&h));
        assert!(ScanFilter::new().with_ms_level(2).matches(&h));
        assert!(!ScanFilter::new().with_ms_level(1).matches(&h));
        assert!(!ScanFilter::new()
            .with_polarity(ScanPolarity::Negative)
            .matches(&h));
    }

    #[test]
    fn test_filter_absent_fields() {
        let h = header(None, None, ScanPolarity::Unknown);
        assert!(ScanFilter::default().matches(&h));
        assert!(!ScanFilter::new().with_rt_range(Some(0.0), None).matches(&h));
        assert!(!ScanFilter::new().with_ms_level(1).matches(&h));
        assert!(!ScanFilter::new()
            .with_polarity(ScanPolarity::Positive)
            .matches(&h));
    }

    #[test]
    fn test_selection_by_number() {
        let mut h = header(Some(1.0), Some(1), ScanPolarity::Positive);
        h.scan_number = Some(5);
        assert!(Selection::by_number(None).accepts(&h));
        assert!(Selection::by_number(Some(5)).accepts(&h));
        assert!(!Selection::by_number(Some(6)).accepts(&h));
    }

    #[test]
    fn test_error_recoverable() {
        let err = ScanAccessError::DecodeError {
            scan: Some(1),
            source: ArrayRetrievalError::DataTypeSizeMismatch,
        };
        assert!(err.is_recoverable());
        let err: io::Error = ScanAccessError::ScanNotFound(Some(3)).into();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
