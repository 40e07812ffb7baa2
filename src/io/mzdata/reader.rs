use std::io;
use std::mem;
use std::path::PathBuf;

use log::{debug, trace};
use quick_xml::events::{BytesEnd, BytesStart, BytesText};
use quick_xml::Error as XMLError;
use thiserror::Error;

use crate::io::traits::{
    first_scan, HeaderCursor, ScanAccessError, ScanCursor, ScanFilter, ScanSource, Selection,
    SpectrumBuilding,
};
use crate::io::utils::{DetailLevel, FileSource, ReaderSource};
use crate::io::xml::{attribute, parse_attribute, parse_cv_param, XmlEventReader, XmlSAX};
use crate::spectrum::bindata::{
    build_peaks, zip_channels, ArrayRetrievalError, ArrayType, BinaryDataArrayType, ByteOrder,
    DataArray, PeakData,
};
use crate::spectrum::{IsolationWindow, Scan, ScanHeader, SpectrumKind};
use crate::vocabulary::{map_mzdata_param, CvContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd)]
pub enum MzDataParserState {
    Start = 0,
    Description,
    Instrument,
    InstrumentName,

    SpectrumList,
    Spectrum,
    SpectrumDesc,
    SpectrumSettings,
    SpectrumInstrument,
    PrecursorList,
    Precursor,

    MzArrayBinary,
    IntenArrayBinary,
    MzData,
    IntenData,

    SpectrumDone,
    SpectrumListDone,
    ParserError,
}

impl MzDataParserState {
    const fn in_spectrum(&self) -> bool {
        matches!(
            self,
            Self::Spectrum
                | Self::SpectrumDesc
                | Self::SpectrumSettings
                | Self::SpectrumInstrument
                | Self::PrecursorList
                | Self::Precursor
                | Self::MzArrayBinary
                | Self::IntenArrayBinary
                | Self::MzData
                | Self::IntenData
        )
    }
}

/// All the ways that mzData parsing can go wrong
#[derive(Debug, Error)]
pub enum MzDataParserError {
    #[error("An incomplete spectrum was parsed")]
    IncompleteSpectrum,
    #[error("An XML error {1:?} was encountered in {0:?}")]
    XMLError(MzDataParserState, #[source] XMLError),
    #[error("An IO error {1} was encountered in {0:?}")]
    IOError(MzDataParserState, #[source] io::Error),
}

impl From<MzDataParserError> for io::Error {
    fn from(value: MzDataParserError) -> Self {
        match value {
            MzDataParserError::IOError(_, ref e) => io::Error::new(e.kind(), value),
            _ => io::Error::new(io::ErrorKind::InvalidData, value),
        }
    }
}

pub type MzDataParserResult = Result<MzDataParserState, MzDataParserError>;

/// One packed array and the precision it declared, which is only checked
/// when the array is decoded
#[derive(Debug, Clone)]
struct PendingArray {
    array: DataArray,
    precision: u32,
}

impl PendingArray {
    fn new(name: ArrayType) -> Self {
        Self {
            array: DataArray::from_name(name),
            precision: 32,
        }
    }

    fn decode(&self) -> Result<Vec<f64>, ArrayRetrievalError> {
        let mut array = self.array.clone();
        array.dtype = BinaryDataArrayType::from_bits(self.precision)?;
        array.decode()
    }
}

/// Everything read from one `<spectrum>` element before its arrays are decoded
#[derive(Debug, Clone)]
pub struct MzDataSpectrumBuilder {
    pub header: ScanHeader,
    mz: PendingArray,
    intensity: PendingArray,
}

impl Default for MzDataSpectrumBuilder {
    fn default() -> Self {
        Self {
            header: ScanHeader::default(),
            mz: PendingArray::new(ArrayType::MZArray),
            intensity: PendingArray::new(ArrayType::IntensityArray),
        }
    }
}

impl MzDataSpectrumBuilder {
    fn discard_arrays(&mut self) {
        self.mz.array.clear();
        self.intensity.array.clear();
    }
}

impl SpectrumBuilding for MzDataSpectrumBuilder {
    fn header(&self) -> &ScanHeader {
        &self.header
    }

    fn into_header(self) -> ScanHeader {
        self.header
    }

    fn into_scan(self, default_kind: SpectrumKind) -> Result<Scan, ArrayRetrievalError> {
        let kind = self.header.spectrum_kind.or_fallback(default_kind);
        let points = if self.mz.array.is_empty() || self.intensity.array.is_empty() {
            Vec::new()
        } else {
            zip_channels(&self.mz.decode()?, &self.intensity.decode()?, None)?
        };
        let mut header = self.header;
        header.spectrum_kind = kind;
        header.points_count = Some(points.len());
        Ok(match build_peaks(points, kind, false) {
            PeakData::Centroids(centroids) => Scan::from_centroids(header, centroids),
            PeakData::Profile(profile) => Scan::from_profile(header, profile),
        })
    }
}

/// The SAX handler for one pass over an mzData document
#[derive(Debug, Default)]
pub struct MzDataHandler {
    selection: Selection,
    detail_level: DetailLevel,
    instrument_name: Option<String>,
    builder: MzDataSpectrumBuilder,
    skip: bool,
    finished: Option<MzDataSpectrumBuilder>,
}

impl MzDataHandler {
    pub(crate) fn new(selection: Selection, detail_level: DetailLevel) -> Self {
        Self {
            selection,
            detail_level,
            ..Default::default()
        }
    }

    fn handle_param(&mut self, event: &BytesStart, state: MzDataParserState) -> Result<(), XMLError> {
        let context = match state {
            MzDataParserState::SpectrumInstrument => CvContext::Spectrum,
            MzDataParserState::Precursor => CvContext::Precursor,
            _ => return Ok(()),
        };
        let param = parse_cv_param(event)?;
        let Some(accession) = param.accession else {
            return Ok(());
        };
        if let Some(field) = map_mzdata_param(context, accession, &param.value) {
            // Legacy documents never declare an isolation window
            let mut window = IsolationWindow::default();
            field.apply(&mut self.builder.header, &mut window);
        }
        Ok(())
    }

    fn start_spectrum(&mut self, event: &BytesStart) -> Result<(), XMLError> {
        self.builder = MzDataSpectrumBuilder::default();
        self.skip = false;
        let header = &mut self.builder.header;
        header.scan_number = parse_attribute(event, "id")?;
        header.instrument_name = self.instrument_name.clone();
        if let Some(wanted) = self.selection.scan_number {
            self.skip = header.scan_number != Some(wanted);
        }
        Ok(())
    }

    fn start_spectrum_instrument(&mut self, event: &BytesStart) -> Result<(), XMLError> {
        let header = &mut self.builder.header;
        header.ms_level = Some(parse_attribute(event, "msLevel")?.unwrap_or(1));
        header.low_mz = parse_attribute(event, "mzRangeStart")?;
        header.high_mz = parse_attribute(event, "mzRangeStop")?;
        Ok(())
    }

    fn start_data(&mut self, event: &BytesStart, state: MzDataParserState) -> Result<(), XMLError> {
        let pending = match state {
            MzDataParserState::MzArrayBinary => &mut self.builder.mz,
            _ => &mut self.builder.intensity,
        };
        let endian = attribute(event, "endian")?;
        pending.array.byte_order = endian
            .as_deref()
            .and_then(ByteOrder::from_label)
            .unwrap_or(ByteOrder::Big);
        pending.precision = parse_attribute(event, "precision")?.unwrap_or(32);
        if let Some(length) = parse_attribute(event, "length")? {
            self.builder.header.points_count = Some(length);
        }
        Ok(())
    }

    /// The description block precedes the arrays, so the filters can be checked
    /// before any signal is stored
    fn check_header(&mut self) {
        if !self.skip && !self.selection.accepts(&self.builder.header) {
            trace!(
                "Skipping spectrum {:?} before its arrays",
                self.builder.header.scan_number
            );
            self.skip = true;
        }
    }

    fn finish_spectrum(&mut self) {
        let mut builder = mem::take(&mut self.builder);
        if self.skip || !self.selection.accepts(&builder.header) {
            return;
        }
        if !self.detail_level.keeps_signal() {
            builder.discard_arrays();
        }
        self.finished = Some(builder);
    }

    fn handle_start(
        &mut self,
        event: &BytesStart,
        state: MzDataParserState,
    ) -> Result<MzDataParserState, XMLError> {
        let next = match event.local_name().as_ref() {
            b"cvParam" => {
                self.handle_param(event, state)?;
                state
            }
            b"description" => MzDataParserState::Description,
            b"instrument" if state == MzDataParserState::Description => {
                MzDataParserState::Instrument
            }
            b"instrumentName" if state == MzDataParserState::Instrument => {
                MzDataParserState::InstrumentName
            }
            b"spectrumList" => MzDataParserState::SpectrumList,
            b"spectrum" => {
                self.start_spectrum(event)?;
                MzDataParserState::Spectrum
            }
            b"spectrumDesc" => MzDataParserState::SpectrumDesc,
            b"spectrumSettings" => MzDataParserState::SpectrumSettings,
            b"acqSpecification" => {
                match attribute(event, "spectrumType")?.as_deref().map(str::trim) {
                    Some("discrete") => self.builder.header.spectrum_kind = SpectrumKind::Centroid,
                    Some("continuous") => {
                        self.builder.header.spectrum_kind = SpectrumKind::Profile
                    }
                    _ => {}
                }
                state
            }
            b"spectrumInstrument" => {
                self.start_spectrum_instrument(event)?;
                MzDataParserState::SpectrumInstrument
            }
            b"precursorList" => MzDataParserState::PrecursorList,
            b"precursor" => {
                if let Some(parent) = parse_attribute(event, "spectrumRef")? {
                    self.builder.header.parent_scan_number = Some(parent);
                }
                MzDataParserState::Precursor
            }
            b"mzArrayBinary" => {
                self.check_header();
                MzDataParserState::MzArrayBinary
            }
            b"intenArrayBinary" => {
                self.check_header();
                MzDataParserState::IntenArrayBinary
            }
            b"data" => match state {
                MzDataParserState::MzArrayBinary => {
                    self.start_data(event, state)?;
                    MzDataParserState::MzData
                }
                MzDataParserState::IntenArrayBinary => {
                    self.start_data(event, state)?;
                    MzDataParserState::IntenData
                }
                _ => state,
            },
            _ => state,
        };
        Ok(next)
    }
}

impl XmlSAX for MzDataHandler {
    type State = MzDataParserState;
    type Error = MzDataParserError;
    type Output = MzDataSpectrumBuilder;

    fn start_element(&mut self, event: &BytesStart, state: MzDataParserState) -> MzDataParserResult {
        self.handle_start(event, state)
            .map_err(|e| self.handle_xml_error(e, state))
    }

    fn empty_element(&mut self, event: &BytesStart, state: MzDataParserState) -> MzDataParserResult {
        match event.local_name().as_ref() {
            b"cvParam" | b"acqSpecification" | b"precursor" | b"spectrumInstrument" => {
                self.handle_start(event, state)
                    .map_err(|e| self.handle_xml_error(e, state))?;
                Ok(state)
            }
            _ => Ok(state),
        }
    }

    fn end_element(&mut self, event: &BytesEnd, state: MzDataParserState) -> MzDataParserResult {
        let next = match event.local_name().as_ref() {
            b"instrumentName" => MzDataParserState::Instrument,
            b"instrument" => MzDataParserState::Description,
            b"description" => MzDataParserState::Start,
            b"spectrum" => {
                self.finish_spectrum();
                MzDataParserState::SpectrumDone
            }
            b"spectrumList" => MzDataParserState::SpectrumListDone,
            b"spectrumDesc" | b"mzArrayBinary" | b"intenArrayBinary" => {
                MzDataParserState::Spectrum
            }
            b"spectrumSettings" | b"precursorList" => MzDataParserState::SpectrumDesc,
            b"spectrumInstrument" => MzDataParserState::SpectrumSettings,
            b"precursor" => MzDataParserState::PrecursorList,
            b"data" => match state {
                MzDataParserState::MzData => MzDataParserState::MzArrayBinary,
                MzDataParserState::IntenData => MzDataParserState::IntenArrayBinary,
                _ => state,
            },
            _ => state,
        };
        Ok(next)
    }

    fn text(&mut self, event: &BytesText, state: MzDataParserState) -> MzDataParserResult {
        match state {
            MzDataParserState::InstrumentName => {
                let name = event
                    .unescape()
                    .map_err(|e| MzDataParserError::XMLError(state, e))?;
                let name = name.trim();
                if !name.is_empty() {
                    debug!("Instrument name {name:?}");
                    self.instrument_name = Some(name.to_string());
                }
            }
            MzDataParserState::MzData | MzDataParserState::IntenData
                if !self.skip && self.detail_level.keeps_signal() =>
            {
                let pending = if state == MzDataParserState::MzData {
                    &mut self.builder.mz
                } else {
                    &mut self.builder.intensity
                };
                pending.array.data.extend_from_slice(event);
            }
            _ => {}
        }
        Ok(state)
    }

    fn take_finished(&mut self) -> Option<MzDataSpectrumBuilder> {
        self.finished.take()
    }

    fn handle_xml_error(&self, error: XMLError, state: MzDataParserState) -> MzDataParserError {
        match error {
            XMLError::Io(e) => {
                MzDataParserError::IOError(state, io::Error::new(e.kind(), e.to_string()))
            }
            e => MzDataParserError::XMLError(state, e),
        }
    }

    fn finish(&mut self, state: MzDataParserState) -> Result<(), MzDataParserError> {
        if state.in_spectrum() {
            Err(MzDataParserError::IncompleteSpectrum)
        } else {
            Ok(())
        }
    }
}

/// The streaming SAX parser for one pass over an mzData document
pub type MzDataSAXParser<R> = XmlEventReader<R, MzDataHandler>;

/// A reader for the legacy mzData dialect
#[derive(Debug, Clone)]
pub struct MzDataReaderType<S: ReaderSource> {
    source: S,
}

pub type MzDataReader = MzDataReaderType<FileSource>;

impl MzDataReaderType<FileSource> {
    pub fn open_path<P: Into<PathBuf>>(path: P) -> Result<Self, ScanAccessError> {
        Ok(Self::new(FileSource::new(path)?))
    }
}

impl<S: ReaderSource> MzDataReaderType<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    fn open_parser(
        &self,
        selection: Selection,
        detail_level: DetailLevel,
    ) -> Result<MzDataSAXParser<S::Stream>, ScanAccessError> {
        Ok(XmlEventReader::new(
            self.source.open_stream()?,
            MzDataHandler::new(selection, detail_level),
            MzDataParserState::Start,
        ))
    }
}

impl<S: ReaderSource> ScanSource for MzDataReaderType<S> {
    type HeaderIter<'a> = HeaderCursor<MzDataSAXParser<S::Stream>> where Self: 'a;
    type ScanIter<'a> = ScanCursor<MzDataSAXParser<S::Stream>> where Self: 'a;

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
