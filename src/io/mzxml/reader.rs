use std::io;
use std::path::PathBuf;

use lazy_static::lazy_static;
use log::{debug, trace};
use quick_xml::events::{BytesEnd, BytesStart, BytesText};
use quick_xml::Error as XMLError;
use regex::Regex;
use thiserror::Error;

use crate::io::traits::{
    first_scan, HeaderCursor, ScanAccessError, ScanCursor, ScanFilter, ScanSource, Selection,
    SpectrumBuilding,
};
use crate::io::utils::{DetailLevel, FileSource, ReaderSource};
use crate::io::xml::{attribute, parse_attribute, XmlEventReader, XmlSAX};
use crate::meta::DissociationMethod;
use crate::spectrum::bindata::{
    build_peaks, deinterleave, ArrayRetrievalError, ArrayType, BinaryCompressionType,
    BinaryDataArrayType, ByteOrder, DataArray, PeakData,
};
use crate::spectrum::{Scan, ScanHeader, ScanPolarity, SpectrumKind};

lazy_static! {
    static ref RETENTION_TIME: Regex =
        Regex::new(r"^PT((\d*\.?\d*)M)?((\d*\.?\d*)S)?$").unwrap();
}

/// Convert an ISO-8601 duration such as `PT1M30.5S` to seconds
pub fn parse_retention_time(text: &str) -> Option<f64> {
    let caps = RETENTION_TIME.captures(text.trim())?;
    let mut seconds = 0.0;
    if let Some(minutes) = caps.get(2).and_then(|m| m.as_str().parse::<f64>().ok()) {
        seconds += minutes * 60.0;
    }
    if let Some(secs) = caps.get(4).and_then(|m| m.as_str().parse::<f64>().ok()) {
        seconds += secs;
    }
    Some(seconds)
}

/// The states the mzXML parser moves through
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd)]
pub enum MzXMLParserState {
    Start = 0,
    MsRun,
    MsInstrument,
    DataProcessing,
    Scan,
    PrecursorMz,
    Peaks,
    MsRunDone,
    ParserError,
}

/// All the ways that mzXML parsing can go wrong
#[derive(Debug, Error)]
pub enum MzXMLParserError {
    #[error("An incomplete scan was parsed")]
    IncompleteScan,
    #[error("An XML error {1:?} was encountered in {0:?}")]
    XMLError(MzXMLParserState, #[source] XMLError),
    #[error("An IO error {1} was encountered in {0:?}")]
    IOError(MzXMLParserState, #[source] io::Error),
}

impl From<MzXMLParserError> for io::Error {
    fn from(value: MzXMLParserError) -> Self {
        match value {
            MzXMLParserError::IOError(_, ref e) => io::Error::new(e.kind(), value),
            _ => io::Error::new(io::ErrorKind::InvalidData, value),
        }
    }
}

pub type MzXMLParserResult = Result<MzXMLParserState, MzXMLParserError>;

/// Everything read from one `<scan>` element before its peaks are decoded
#[derive(Debug, Clone)]
pub struct MzXMLSpectrumBuilder {
    pub header: ScanHeader,
    peaks: DataArray,
    precision: u32,
    skip: bool,
}

impl Default for MzXMLSpectrumBuilder {
    fn default() -> Self {
        Self {
            header: ScanHeader::default(),
            peaks: DataArray::from_name(ArrayType::InterleavedArray),
            precision: 32,
            skip: false,
        }
    }
}

impl SpectrumBuilding for MzXMLSpectrumBuilder {
    fn header(&self) -> &ScanHeader {
        &self.header
    }

    fn into_header(self) -> ScanHeader {
        self.header
    }

    fn into_scan(self, default_kind: SpectrumKind) -> Result<Scan, ArrayRetrievalError> {
        let kind = self.header.spectrum_kind.or_fallback(default_kind);
        let points = if self.peaks.is_empty() {
            Vec::new()
        } else {
            let mut peaks = self.peaks;
            peaks.dtype = BinaryDataArrayType::from_bits(self.precision)?;
            deinterleave(&peaks.decode()?)?
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

/// The SAX handler for one pass over an mzXML document.
///
/// Scans nest inside the scan they were derived from, so the open scans are
/// kept on a stack and each is finished when its own closing tag arrives.
/// A child is therefore emitted before its parent.
#[derive(Debug, Default)]
pub struct MzXMLHandler {
    selection: Selection,
    detail_level: DetailLevel,
    spectrum_kind: SpectrumKind,
    instrument_name: Option<String>,
    instrument_model: Option<String>,
    stack: Vec<MzXMLSpectrumBuilder>,
    finished: Option<MzXMLSpectrumBuilder>,
}

impl MzXMLHandler {
    pub(crate) fn new(selection: Selection, detail_level: DetailLevel) -> Self {
        Self {
            selection,
            detail_level,
            ..Default::default()
        }
    }

    fn start_scan(&mut self, event: &BytesStart) -> Result<(), XMLError> {
        let mut builder = MzXMLSpectrumBuilder::default();
        let header = &mut builder.header;
        header.scan_number = parse_attribute(event, "num")?;
        header.parent_scan_number = self.stack.last().and_then(|p| p.header.scan_number);
        header.ms_level = Some(parse_attribute(event, "msLevel")?.unwrap_or(1));
        header.points_count = parse_attribute(event, "peaksCount")?;
        if let Some(polarity) = attribute(event, "polarity")? {
            header.polarity = polarity.parse().unwrap_or_default();
        }
        if let Some(rt) = attribute(event, "retentionTime")? {
            header.retention_time = parse_retention_time(&rt);
            if header.retention_time.is_none() {
                debug!("Ignoring unparsable retention time {rt:?}");
            }
        }
        header.low_mz = parse_attribute(event, "lowMz")?;
        header.high_mz = parse_attribute(event, "highMz")?;
        header.basepeak_mz = parse_attribute(event, "basePeakMz")?;
        header.basepeak_intensity =
            parse_attribute::<f64>(event, "basePeakIntensity")?.map(|v| v.max(0.0));
        header.tic = parse_attribute::<f64>(event, "totalIonCurrent")?.map(|v| v.max(0.0));
        header.activation_energy = parse_attribute(event, "collisionEnergy")?;
        header.spectrum_kind = self.spectrum_kind;
        header.instrument_name = self.instrument_name.clone();
        header.instrument_model = self.instrument_model.clone();

        if let Some(wanted) = self.selection.scan_number {
            builder.skip = builder.header.scan_number != Some(wanted);
        }
        self.stack.push(builder);
        Ok(())
    }

    fn start_precursor(&mut self, event: &BytesStart) -> Result<(), XMLError> {
        let Some(builder) = self.stack.last_mut() else {
            return Ok(());
        };
        let header = &mut builder.header;
        header.precursor_intensity =
            parse_attribute::<f64>(event, "precursorIntensity")?.map(|v| v.max(0.0));
        header.precursor_charge = parse_attribute(event, "precursorCharge")?;
        if let Some(method) = attribute(event, "activationMethod")? {
            if let Ok(method) = method.parse::<DissociationMethod>() {
                header.dissociation_method = Some(method);
            }
        }
        Ok(())
    }

    fn start_peaks(&mut self, event: &BytesStart) -> Result<(), XMLError> {
        let selection = self.selection;
        let Some(builder) = self.stack.last_mut() else {
            return Ok(());
        };
        if !builder.skip && !selection.accepts(&builder.header) {
            trace!("Skipping scan {:?} before its peaks", builder.header.scan_number);
            builder.skip = true;
        }
        let byte_order = attribute(event, "byteOrder")?;
        builder.peaks.byte_order = byte_order
            .as_deref()
            .and_then(ByteOrder::from_label)
            .unwrap_or(ByteOrder::Big);
        builder.precision = parse_attribute(event, "precision")?.unwrap_or(32);
        let compression = attribute(event, "compressionType")?;
        builder.peaks.compression = compression
            .as_deref()
            .and_then(BinaryCompressionType::from_label)
            .unwrap_or(BinaryCompressionType::NoCompression);
        Ok(())
    }

    fn end_scan(&mut self) {
        let Some(mut builder) = self.stack.pop() else {
            return;
        };
        if builder.skip || !self.selection.accepts(&builder.header) {
            return;
        }
        if !self.detail_level.keeps_signal() {
            builder.peaks.clear();
        }
        self.finished = Some(builder);
    }

    fn handle_start(&mut self, event: &BytesStart, state: MzXMLParserState) -> Result<MzXMLParserState, XMLError> {
        let next = match event.local_name().as_ref() {
            b"msRun" => MzXMLParserState::MsRun,
            b"msInstrument" => MzXMLParserState::MsInstrument,
            b"msManufacturer" if state == MzXMLParserState::MsInstrument => {
                self.instrument_name = attribute(event, "value")?.map(|v| v.into_owned());
                state
            }
            b"msModel" if state == MzXMLParserState::MsInstrument => {
                self.instrument_model = attribute(event, "value")?.map(|v| v.into_owned());
                state
            }
            b"dataProcessing" => {
                match attribute(event, "centroided")?.as_deref().map(str::trim) {
                    Some("1") => self.spectrum_kind = SpectrumKind::Centroid,
                    Some("0") => self.spectrum_kind = SpectrumKind::Profile,
                    _ => {}
                }
                MzXMLParserState::DataProcessing
            }
            b"scan" => {
                self.start_scan(event)?;
                MzXMLParserState::Scan
            }
            b"precursorMz" => {
                self.start_precursor(event)?;
                MzXMLParserState::PrecursorMz
            }
            b"peaks" => {
                self.start_peaks(event)?;
                MzXMLParserState::Peaks
            }
            _ => state,
        };
        Ok(next)
    }
}

impl XmlSAX for MzXMLHandler {
    type State = MzXMLParserState;
    type Error = MzXMLParserError;
    type Output = MzXMLSpectrumBuilder;

    fn start_element(&mut self, event: &BytesStart, state: MzXMLParserState) -> MzXMLParserResult {
        self.handle_start(event, state)
            .map_err(|e| self.handle_xml_error(e, state))
    }

    fn empty_element(&mut self, event: &BytesStart, state: MzXMLParserState) -> MzXMLParserResult {
        let next = self
            .handle_start(event, state)
            .map_err(|e| self.handle_xml_error(e, state))?;
        // An empty element is closed as soon as it opens
        match next {
            MzXMLParserState::Scan => {
                self.end_scan();
                Ok(if self.stack.is_empty() {
                    MzXMLParserState::MsRun
                } else {
                    MzXMLParserState::Scan
                })
            }
            MzXMLParserState::PrecursorMz | MzXMLParserState::Peaks => {
                Ok(MzXMLParserState::Scan)
            }
            _ => Ok(state),
        }
    }

    fn end_element(&mut self, event: &BytesEnd, state: MzXMLParserState) -> MzXMLParserResult {
        let next = match event.local_name().as_ref() {
            b"scan" => {
                self.end_scan();
                if self.stack.is_empty() {
                    MzXMLParserState::MsRun
                } else {
                    MzXMLParserState::Scan
                }
            }
            b"precursorMz" | b"peaks" => MzXMLParserState::Scan,
            b"msInstrument" | b"dataProcessing" => MzXMLParserState::MsRun,
            b"msRun" => MzXMLParserState::MsRunDone,
            _ => state,
        };
        Ok(next)
    }

    fn text(&mut self, event: &BytesText, state: MzXMLParserState) -> MzXMLParserResult {
        let keep_signal = self.detail_level.keeps_signal();
        let Some(builder) = self.stack.last_mut() else {
            return Ok(state);
        };
        match state {
            MzXMLParserState::PrecursorMz => {
                let text = event
                    .unescape()
                    .map_err(|e| MzXMLParserError::XMLError(state, e))?;
                match text.trim().parse::<f64>() {
                    Ok(mz) => builder.header.precursor_mz = Some(mz),
                    Err(_) => debug!("Ignoring unparsable precursor m/z {text:?}"),
                }
            }
            MzXMLParserState::Peaks if keep_signal && !builder.skip => {
                builder.peaks.data.extend_from_slice(event);
            }
            _ => {}
        }
        Ok(state)
    }

    fn take_finished(&mut self) -> Option<MzXMLSpectrumBuilder> {
        self.finished.take()
    }

    fn handle_xml_error(&self, error: XMLError, state: MzXMLParserState) -> MzXMLParserError {
        match error {
            XMLError::Io(e) => {
                MzXMLParserError::IOError(state, io::Error::new(e.kind(), e.to_string()))
            }
            e => MzXMLParserError::XMLError(state, e),
        }
    }

    fn finish(&mut self, _state: MzXMLParserState) -> Result<(), MzXMLParserError> {
        if self.stack.is_empty() {
            Ok(())
        } else {
            Err(MzXMLParserError::IncompleteScan)
        }
    }
}

/// The streaming SAX parser for one pass over an mzXML document
pub type MzXMLSAXParser<R> = XmlEventReader<R, MzXMLHandler>;

/// A reader for mzXML documents
#[derive(Debug, Clone)]
pub struct MzXMLReaderType<S: ReaderSource> {
    source: S,
}

/// An mzXML reader over a file on disk
pub type MzXMLReader = MzXMLReaderType<FileSource>;

impl MzXMLReaderType<FileSource> {
    pub fn open_path<P: Into<PathBuf>>(path: P) -> Result<Self, ScanAccessError> {
        Ok(Self::new(FileSource::new(path)?))
    }
}

impl<S: ReaderSource> MzXMLReaderType<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    fn open_parser(
        &self,
        selection: Selection,
        detail_level: DetailLevel,
    ) -> Result<MzXMLSAXParser<S::Stream>, ScanAccessError> {
        Ok(XmlEventReader::new(
            self.source.open_stream()?,
            MzXMLHandler::new(selection, detail_level),
            MzXMLParserState::Start,
        ))
    }
}

impl<S: ReaderSource> ScanSource for MzXMLReaderType<S> {
    type HeaderIter<'a> = HeaderCursor<MzXMLSAXParser<S::Stream>> where Self: 'a;
    type ScanIter<'a> = ScanCursor<MzXMLSAXParser<S::Stream>> where Self: 'a;

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

#[cfg(test)]
mod test {
    use super::*;
    use crate::io::utils::MemorySource;
    use crate::spectrum::bindata::encode_array;

    fn peaks(values: &[f64], compression: BinaryCompressionType, precision: u32) -> String {
        let dtype = BinaryDataArrayType::from_bits(precision).unwrap();
        let text = encode_array(values, dtype, ByteOrder::Big, compression);
        let label = match compression {
            BinaryCompressionType::Zlib => "zlib",
            BinaryCompressionType::NoCompression => "none",
        };
        format!(
            r#"<peaks precision="{precision}" byteOrder="network" pairOrder="m/z-int" compressionType="{label}">{}</peaks>"#,
            String::from_utf8_lossy(&text)
        )
    }

    fn document(centroided: &str) -> String {
        let p5 = peaks(&[100.0, 10.0, 200.0, 20.0], BinaryCompressionType::Zlib, 64);
        let p6 = peaks(&[150.0, 5.0], BinaryCompressionType::NoCompression, 32);
        let p7 = peaks(&[300.0, 7.0], BinaryCompressionType::NoCompression, 32);
        format!(
            r#"<?xml version="1.0" encoding="ISO-8859-1"?>
<mzXML xmlns="http://sashimi.sourceforge.net/schema_revision/mzXML_3.2">
 <msRun scanCount="3" startTime="PT0S" endTime="PT120S">
  <msInstrument>
   <msManufacturer category="msManufacturer" value="Thermo Scientific"/>
   <msModel category="msModel" value="LTQ Orbitrap"/>
  </msInstrument>
  <dataProcessing centroided="{centroided}">
   <software type="conversion" name="ReAdW" version="4.0"/>
  </dataProcessing>
  <scan num="5" msLevel="1" peaksCount="2" polarity="+" retentionTime="PT1M30.5S" lowMz="100" highMz="2000" basePeakMz="200" basePeakIntensity="20" totalIonCurrent="30">
   {p5}
   <scan num="6" msLevel="2" peaksCount="1" polarity="+" retentionTime="PT91S" collisionEnergy="35">
    <precursorMz precursorIntensity="1200.5" precursorCharge="2" activationMethod="CID">445.34</precursorMz>
    {p6}
   </scan>
  </scan>
  <scan num="7" msLevel="1" peaksCount="1" polarity="-" retentionTime="PT2M">
   {p7}
  </scan>
 </msRun>
</mzXML>"#
        )
    }

    fn open(centroided: &str) -> MzXMLReaderType<MemorySource> {
        MzXMLReaderType::new(MemorySource::from(document(centroided).as_str()))
    }

    #[test]
    fn test_parse_retention_time() {
        assert_eq!(parse_retention_time("PT1M30.5S"), Some(90.5));
        assert_eq!(parse_retention_time("PT2M"), Some(120.0));
        assert_eq!(parse_retention_time("PT45.25S"), Some(45.25));
        assert_eq!(parse_retention_time("1.5"), None);
    }

    #[test_log::test]
    fn test_nested_parent() -> Result<(), ScanAccessError> {
        let mut reader = open("1");
        let headers: Vec<ScanHeader> = reader
            .headers(ScanFilter::default())?
            .collect::<Result<_, _>>()?;
        let numbers: Vec<_> = headers.iter().map(|h| h.scan_number).collect();
        assert_eq!(numbers, vec![Some(6), Some(5), Some(7)]);

        let child = &headers[0];
        assert_eq!(child.parent_scan_number, Some(5));
        assert_eq!(child.ms_level, Some(2));
        assert_eq!(child.precursor_mz, Some(445.34));
        assert_eq!(child.precursor_intensity, Some(1200.5));
        assert_eq!(child.precursor_charge, Some(2));
        assert_eq!(child.activation_energy, Some(35.0));
        assert_eq!(child.dissociation_method, Some(DissociationMethod::CID));

        let parent = &headers[1];
        assert_eq!(parent.parent_scan_number, None);
        assert_eq!(parent.retention_time, Some(90.5));
        assert_eq!(parent.polarity, ScanPolarity::Positive);
        assert_eq!(parent.spectrum_kind, SpectrumKind::Centroid);
        assert_eq!(parent.instrument_model.as_deref(), Some("LTQ Orbitrap"));
        assert_eq!(parent.instrument_name.as_deref(), Some("Thermo Scientific"));
        assert_eq!(headers[2].polarity, ScanPolarity::Negative);
        assert_eq!(headers[2].retention_time, Some(120.0));
        Ok(())
    }

    #[test_log::test]
    fn test_interleaved_peaks() -> Result<(), ScanAccessError> {
        let mut reader = open("1");
        let scan = reader.scan(Some(5), SpectrumKind::Profile)?;
        assert_eq!(scan.centroids.len(), 2);
        assert_eq!(scan.centroids[1].mz, 200.0);
        assert_eq!(scan.centroids[1].ai, 20.0);
        assert_eq!(scan.centroids.basepeak().map(|c| c.mz), Some(200.0));

        let scan = reader.scan(Some(6), SpectrumKind::Profile)?;
        assert_eq!(scan.centroids.len(), 1);
        assert_eq!(scan.header.parent_scan_number, Some(5));
        Ok(())
    }

    #[test_log::test]
    fn test_global_kind() -> Result<(), ScanAccessError> {
        let mut reader = open("0");
        let scan = reader.scan(Some(7), SpectrumKind::Centroid)?;
        assert!(scan.has_profile());
        assert_eq!(scan.profile[0].mz, 300.0);

        // An absent flag leaves the choice to the caller
        let mut reader = open("");
        let scan = reader.scan(Some(7), SpectrumKind::Centroid)?;
        assert!(scan.has_centroids());
        Ok(())
    }

    #[test_log::test]
    fn test_filter_nested() -> Result<(), ScanAccessError> {
        let mut reader = open("1");
        let numbers: Vec<_> = reader
            .scans(ScanFilter::new().with_ms_level(1), SpectrumKind::Centroid)?
            .map(|s| s.map(|s| s.scan_number()))
            .collect::<Result<_, _>>()?;
        assert_eq!(numbers, vec![Some(5), Some(7)]);

        let numbers: Vec<_> = reader
            .headers(ScanFilter::new().with_rt_range(Some(91.0), Some(100.0)))?
            .map(|s| s.map(|s| s.scan_number))
            .collect::<Result<_, _>>()?;
        assert_eq!(numbers, vec![Some(6)]);
        Ok(())
    }

    #[test_log::test]
    fn test_filtered_scans_not_decoded() -> Result<(), ScanAccessError> {
        // Break the peaks of both MS1 scans, one bad base64 and one bad precision
        let mut text = document("1").replacen(
            r#"compressionType="zlib">"#,
            r#"compressionType="zlib">@@@@"#,
            1,
        );
        let at = text.rfind(r#"precision="32""#).unwrap();
        text.replace_range(at..at + 14, r#"precision="16""#);

        let mut reader = MzXMLReaderType::new(MemorySource::from(text.as_str()));
        let results: Vec<_> = reader
            .scans(ScanFilter::new().with_ms_level(2), SpectrumKind::Centroid)?
            .collect();
        assert_eq!(results.len(), 1);
        assert!(results.iter().all(|r| r.is_ok()));

        let results: Vec<_> = reader
            .scans(ScanFilter::default(), SpectrumKind::Centroid)?
            .collect();
        assert_eq!(results.iter().filter(|r| r.is_err()).count(), 2);
        Ok(())
    }

    #[test_log::test]
    fn test_unsupported_precision() -> Result<(), ScanAccessError> {
        let text = document("1").replacen(r#"precision="32""#, r#"precision="16""#, 1);
        let mut reader = MzXMLReaderType::new(MemorySource::from(text.as_str()));
        match reader.scan(Some(6), SpectrumKind::Centroid) {
            Err(ScanAccessError::DecodeError { scan, source }) => {
                assert_eq!(scan, Some(6));
                assert_eq!(source, ArrayRetrievalError::UnsupportedPrecision(16));
            }
            other => panic!("Expected a decode error, got {other:?}"),
        }
        Ok(())
    }

    #[test_log::test]
    fn test_read_file() -> Result<(), ScanAccessError> {
        let mut reader = MzXMLReader::open_path("./test/data/small.mzXML")?;
        let scan = reader.scan(None, SpectrumKind::Centroid)?;
        assert!(scan.has_centroids() || scan.has_profile());
        Ok(())
    }
}
