use std::collections::HashMap;
use std::io;
use std::mem;
use std::path::PathBuf;

use chrono::{DateTime, FixedOffset};
use lazy_static::lazy_static;
use log::{debug, trace};
use quick_xml::events::{BytesEnd, BytesStart, BytesText};
use quick_xml::Error as XMLError;
use regex::Regex;

use crate::io::traits::{
    first_scan, HeaderCursor, ScanAccessError, ScanCursor, ScanFilter, ScanSource, Selection,
};
use crate::io::utils::{DetailLevel, FileSource, ReaderSource};
use crate::io::xml::{attribute, parse_attribute, parse_cv_param, XmlEventReader, XmlSAX};
use crate::meta::{IonizationSource, MassAnalyzer};
use crate::params::CvParam;
use crate::spectrum::{Scan, ScanHeader, SpectrumKind};
use crate::vocabulary::{map_mzml_param, CvContext, MappedField};

use super::reading_shared::{
    MzMLParserError, MzMLParserState, MzMLSpectrumBuilder, ParserResult,
};

lazy_static! {
    static ref SCAN_NUMBER: Regex = Regex::new(r"scan=(\d+)").unwrap();
}

/// Extract the scan number from a native id such as
/// `controllerType=0 controllerNumber=1 scan=42`
pub fn parse_scan_number(native_id: &str) -> Option<u32> {
    SCAN_NUMBER
        .captures(native_id)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[derive(Debug, Default, Clone, PartialEq)]
struct InstrumentConfig {
    resolution: Option<u32>,
    ionization_source: Option<IonizationSource>,
    mass_analyzer: Option<MassAnalyzer>,
}

impl InstrumentConfig {
    fn update(&mut self, field: MappedField) {
        match field {
            MappedField::Resolution(v) => self.resolution = Some(v),
            MappedField::IonizationSource(v) => self.ionization_source = Some(v),
            MappedField::MassAnalyzer(v) => self.mass_analyzer = Some(v),
            _ => {}
        }
    }

    fn apply(&self, header: &mut ScanHeader) {
        if self.resolution.is_some() {
            header.resolution = self.resolution;
        }
        if self.ionization_source.is_some() {
            header.ionization_source = self.ionization_source;
        }
        if self.mass_analyzer.is_some() {
            header.mass_analyzer = self.mass_analyzer.clone();
        }
    }
}

fn context_of(state: MzMLParserState) -> Option<CvContext> {
    match state {
        MzMLParserState::Spectrum
        | MzMLParserState::ScanList
        | MzMLParserState::Scan
        | MzMLParserState::ScanWindowList
        | MzMLParserState::ScanWindow => Some(CvContext::Spectrum),
        MzMLParserState::Precursor
        | MzMLParserState::IsolationWindow
        | MzMLParserState::SelectedIonList
        | MzMLParserState::SelectedIon
        | MzMLParserState::Activation => Some(CvContext::Precursor),
        MzMLParserState::BinaryDataArray => Some(CvContext::BinaryArray),
        MzMLParserState::InstrumentConfiguration => Some(CvContext::InstrumentConfiguration),
        _ => None,
    }
}

/// The SAX handler for one pass over an mzML document.
///
/// Holds the tables declared ahead of the spectrum list and the spectrum
/// currently being read.
#[derive(Debug, Default)]
pub struct MzMLHandler {
    selection: Selection,
    detail_level: DetailLevel,
    param_groups: HashMap<String, Vec<CvParam<'static>>>,
    instrument_configs: HashMap<String, InstrumentConfig>,
    current_group: Option<String>,
    current_config: Option<String>,
    default_config: Option<String>,
    start_timestamp: Option<DateTime<FixedOffset>>,
    builder: MzMLSpectrumBuilder,
    skip: bool,
    finished: Option<MzMLSpectrumBuilder>,
}

impl MzMLHandler {
    pub(crate) fn new(selection: Selection, detail_level: DetailLevel) -> Self {
        Self {
            selection,
            detail_level,
            ..Default::default()
        }
    }

    fn handle_param(&mut self, param: &CvParam, state: MzMLParserState) {
        if state == MzMLParserState::ReferenceParamGroup {
            if let Some(id) = &self.current_group {
                self.param_groups
                    .entry(id.clone())
                    .or_default()
                    .push(param.clone().into_owned());
            }
            return;
        }
        let (Some(context), Some(accession)) = (context_of(state), param.accession) else {
            return;
        };
        let Some(field) = map_mzml_param(context, accession, &param.value, param.unit) else {
            return;
        };
        if context == CvContext::InstrumentConfiguration {
            if let Some(id) = &self.current_config {
                if let Some(config) = self.instrument_configs.get_mut(id) {
                    config.update(field);
                }
            }
            return;
        }
        let builder = &mut self.builder;
        if !field.is_array_tag() {
            field.apply(&mut builder.header, &mut builder.window);
            return;
        }
        match field {
            MappedField::ArrayPrecision(dtype) => builder.current_array.dtype = dtype,
            MappedField::ArrayCompression(compression) => {
                builder.current_array.compression = compression
            }
            MappedField::ArrayKind(name) => builder.current_array.name = name,
            _ => {}
        }
    }

    fn handle_group_ref(&mut self, event: &BytesStart, state: MzMLParserState) -> ParserResult {
        let group_id = attribute(event, "ref")
            .map_err(|e| MzMLParserError::XMLError(state, e))?
            .map(|v| v.into_owned());
        if let Some(params) = group_id.and_then(|id| self.param_groups.get(&id).cloned()) {
            for param in params.iter() {
                self.handle_param(param, state);
            }
        }
        Ok(state)
    }

    fn apply_config(&mut self, config_id: &str) {
        if let Some(config) = self.instrument_configs.get(config_id) {
            config.apply(&mut self.builder.header);
        } else {
            debug!("Unknown instrument configuration {config_id}");
        }
    }

    fn start_spectrum(&mut self, event: &BytesStart) -> Result<(), XMLError> {
        self.builder = MzMLSpectrumBuilder::default();
        self.skip = false;

        let index: Option<usize> = parse_attribute(event, "index")?;
        let scan_number = attribute(event, "id")?
            .and_then(|id| parse_scan_number(&id))
            .or_else(|| index.map(|i| i as u32 + 1));
        self.builder.index = index;
        self.builder.header.scan_number = scan_number;
        self.builder.header.points_count = parse_attribute(event, "defaultArrayLength")?;
        self.builder.header.acquisition_timestamp = self.start_timestamp;

        if let Some(config_id) = self.default_config.clone() {
            self.apply_config(&config_id);
        }
        if let Some(wanted) = self.selection.scan_number {
            if scan_number != Some(wanted) {
                self.skip = true;
            }
        }
        Ok(())
    }

    /// The header is complete once the arrays begin, so the filters can be
    /// checked before any signal is stored
    fn check_header(&mut self) {
        if self.skip {
            return;
        }
        self.builder.finish_header();
        if !self.selection.accepts(&self.builder.header) {
            trace!(
                "Skipping spectrum {:?} before its arrays",
                self.builder.header.scan_number
            );
            self.skip = true;
        }
    }

    fn finish_spectrum(&mut self) {
        let mut builder = mem::take(&mut self.builder);
        builder.finish_header();
        if self.skip || !self.selection.accepts(&builder.header) {
            return;
        }
        if !self.detail_level.keeps_signal() {
            builder.discard_arrays();
        }
        self.finished = Some(builder);
    }

    fn handle_start(&mut self, event: &BytesStart, state: MzMLParserState) -> Result<MzMLParserState, XMLError> {
        let next = match event.local_name().as_ref() {
            b"cvParam" => {
                self.handle_param(&parse_cv_param(event)?, state);
                state
            }
            b"referenceableParamGroupList" => MzMLParserState::ReferenceParamGroupList,
            b"referenceableParamGroup" => {
                self.current_group = attribute(event, "id")?.map(|v| v.into_owned());
                MzMLParserState::ReferenceParamGroup
            }
            b"instrumentConfigurationList" => MzMLParserState::InstrumentConfigurationList,
            b"instrumentConfiguration" => {
                let config_id = attribute(event, "id")?.map(|v| v.into_owned());
                if let Some(config_id) = &config_id {
                    self.instrument_configs
                        .insert(config_id.clone(), InstrumentConfig::default());
                }
                self.current_config = config_id;
                MzMLParserState::InstrumentConfiguration
            }
            b"run" => {
                self.default_config =
                    attribute(event, "defaultInstrumentConfigurationRef")?.map(|v| v.into_owned());
                if let Some(stamp) = attribute(event, "startTimeStamp")? {
                    match DateTime::parse_from_rfc3339(stamp.trim()) {
                        Ok(dt) => self.start_timestamp = Some(dt),
                        Err(e) => debug!("Ignoring unparsable start time stamp {stamp:?}: {e}"),
                    }
                }
                MzMLParserState::Run
            }
            b"spectrumList" => MzMLParserState::SpectrumList,
            b"spectrum" => {
                self.start_spectrum(event)?;
                MzMLParserState::Spectrum
            }
            b"scanList" => MzMLParserState::ScanList,
            b"scan" => {
                self.handle_scan(event)?;
                MzMLParserState::Scan
            }
            b"scanWindowList" => MzMLParserState::ScanWindowList,
            b"scanWindow" => MzMLParserState::ScanWindow,
            b"precursorList" => MzMLParserState::PrecursorList,
            b"precursor" => {
                if let Some(parent) = attribute(event, "spectrumRef")? {
                    self.builder.header.parent_scan_number = parse_scan_number(&parent);
                }
                MzMLParserState::Precursor
            }
            b"isolationWindow" => MzMLParserState::IsolationWindow,
            b"selectedIonList" => MzMLParserState::SelectedIonList,
            b"selectedIon" => MzMLParserState::SelectedIon,
            b"activation" => MzMLParserState::Activation,
            b"productList" => MzMLParserState::ProductList,
            b"binaryDataArrayList" => {
                self.check_header();
                MzMLParserState::BinaryDataArrayList
            }
            b"binaryDataArray" => {
                self.builder.start_array();
                MzMLParserState::BinaryDataArray
            }
            b"binary" => MzMLParserState::Binary,
            b"chromatogram" => MzMLParserState::Chromatogram,
            _ => state,
        };
        Ok(next)
    }

    fn handle_scan(&mut self, event: &BytesStart) -> Result<(), XMLError> {
        if let Some(config_id) = attribute(event, "instrumentConfigurationRef")? {
            let config_id = config_id.into_owned();
            self.apply_config(&config_id);
        }
        Ok(())
    }
}

impl XmlSAX for MzMLHandler {
    type State = MzMLParserState;
    type Error = MzMLParserError;
    type Output = MzMLSpectrumBuilder;

    fn start_element(&mut self, event: &BytesStart, state: MzMLParserState) -> ParserResult {
        // Nothing inside these is part of the canonical model
        if matches!(state, MzMLParserState::Chromatogram | MzMLParserState::ProductList) {
            return Ok(state);
        }
        self.handle_start(event, state)
            .map_err(|e| self.handle_xml_error(e, state))
    }

    fn empty_element(&mut self, event: &BytesStart, state: MzMLParserState) -> ParserResult {
        if matches!(state, MzMLParserState::Chromatogram | MzMLParserState::ProductList) {
            return Ok(state);
        }
        match event.local_name().as_ref() {
            b"cvParam" => {
                let param = parse_cv_param(event).map_err(|e| self.handle_xml_error(e, state))?;
                self.handle_param(&param, state);
                Ok(state)
            }
            b"referenceableParamGroupRef" => self.handle_group_ref(event, state),
            b"scan" => {
                self.handle_scan(event)
                    .map_err(|e| self.handle_xml_error(e, state))?;
                Ok(state)
            }
            b"precursor" => {
                self.handle_start(event, state)
                    .map_err(|e| self.handle_xml_error(e, state))?;
                Ok(state)
            }
            _ => Ok(state),
        }
    }

    fn end_element(&mut self, event: &BytesEnd, state: MzMLParserState) -> ParserResult {
        let elt_name = event.local_name();
        let name = elt_name.as_ref();
        match state {
            MzMLParserState::Chromatogram => {
                return Ok(if name == b"chromatogram" {
                    MzMLParserState::Run
                } else {
                    state
                })
            }
            MzMLParserState::ProductList => {
                return Ok(if name == b"productList" {
                    MzMLParserState::Spectrum
                } else {
                    state
                })
            }
            _ => {}
        }
        let next = match name {
            b"referenceableParamGroup" => {
                self.current_group = None;
                MzMLParserState::ReferenceParamGroupList
            }
            b"referenceableParamGroupList" | b"instrumentConfigurationList" => {
                MzMLParserState::Start
            }
            b"instrumentConfiguration" => {
                self.current_config = None;
                MzMLParserState::InstrumentConfigurationList
            }
            b"spectrum" => {
                self.finish_spectrum();
                MzMLParserState::SpectrumDone
            }
            b"spectrumList" => MzMLParserState::SpectrumListDone,
            b"scanList" | b"precursorList" | b"binaryDataArrayList" => MzMLParserState::Spectrum,
            b"scan" => MzMLParserState::ScanList,
            b"scanWindowList" => MzMLParserState::Scan,
            b"scanWindow" => MzMLParserState::ScanWindowList,
            b"precursor" => MzMLParserState::PrecursorList,
            b"isolationWindow" | b"selectedIonList" | b"activation" => MzMLParserState::Precursor,
            b"selectedIon" => MzMLParserState::SelectedIonList,
            b"binaryDataArray" => {
                if self.skip {
                    self.builder.current_array.clear();
                } else {
                    self.builder.finish_array();
                }
                MzMLParserState::BinaryDataArrayList
            }
            b"binary" => MzMLParserState::BinaryDataArray,
            _ => state,
        };
        Ok(next)
    }

    fn text(&mut self, event: &BytesText, state: MzMLParserState) -> ParserResult {
        if state == MzMLParserState::Binary && !self.skip && self.detail_level.keeps_signal() {
            self.builder.current_array.data.extend_from_slice(event);
        }
        Ok(state)
    }

    fn take_finished(&mut self) -> Option<MzMLSpectrumBuilder> {
        self.finished.take()
    }

    fn handle_xml_error(&self, error: XMLError, state: MzMLParserState) -> MzMLParserError {
        match error {
            XMLError::Io(e) => MzMLParserError::IOError(state, io::Error::new(e.kind(), e.to_string())),
            e => MzMLParserError::XMLError(state, e),
        }
    }

    fn finish(&mut self, state: MzMLParserState) -> Result<(), MzMLParserError> {
        match state {
            MzMLParserState::Spectrum
            | MzMLParserState::ScanList
            | MzMLParserState::Scan
            | MzMLParserState::ScanWindowList
            | MzMLParserState::ScanWindow
            | MzMLParserState::PrecursorList
            | MzMLParserState::Precursor
            | MzMLParserState::IsolationWindow
            | MzMLParserState::SelectedIonList
            | MzMLParserState::SelectedIon
            | MzMLParserState::Activation
            | MzMLParserState::ProductList
            | MzMLParserState::BinaryDataArrayList
            | MzMLParserState::BinaryDataArray
            | MzMLParserState::Binary => Err(MzMLParserError::IncompleteSpectrum),
            MzMLParserState::ReferenceParamGroup => Err(MzMLParserError::IncompleteElementError(
                "referenceableParamGroup".into(),
                state,
            )),
            MzMLParserState::InstrumentConfiguration => Err(
                MzMLParserError::IncompleteElementError("instrumentConfiguration".into(), state),
            ),
            _ => Ok(()),
        }
    }
}

/// The streaming SAX parser for one pass over an mzML document
pub type MzMLSAXParser<R> = XmlEventReader<R, MzMLHandler>;

/**
A reader for mzML documents.

Every call to [`ScanSource::headers`], [`ScanSource::scans`] or
[`ScanSource::scan`] reopens the source and reads forward once, so the
instrument configurations and parameter groups declared ahead of the
spectra are always current for that pass.
*/
#[derive(Debug, Clone)]
pub struct MzMLReaderType<S: ReaderSource> {
    source: S,
}

/// An mzML reader over a file on disk
pub type MzMLReader = MzMLReaderType<FileSource>;

impl MzMLReaderType<FileSource> {
    /// Open the mzML file at `path`. A missing file fails here.
    pub fn open_path<P: Into<PathBuf>>(path: P) -> Result<Self, ScanAccessError> {
        Ok(Self::new(FileSource::new(path)?))
    }
}

impl<S: ReaderSource> MzMLReaderType<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn open_parser(
        &self,
        selection: Selection,
        detail_level: DetailLevel,
    ) -> Result<MzMLSAXParser<S::Stream>, ScanAccessError> {
        let stream = self.source.open_stream()?;
        Ok(XmlEventReader::new(
            stream,
            MzMLHandler::new(selection, detail_level),
            MzMLParserState::Start,
        ))
    }
}

impl<S: ReaderSource> ScanSource for MzMLReaderType<S> {
    type HeaderIter<'a> = HeaderCursor<MzMLSAXParser<S::Stream>> where Self: 'a;
    type ScanIter<'a> = ScanCursor<MzMLSAXParser<S::Stream>> where Self: 'a;

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
    use crate::meta::DissociationMethod;
    use crate::spectrum::bindata::{
        encode_array, BinaryCompressionType, BinaryDataArrayType, ByteOrder,
    };
    use crate::spectrum::ScanPolarity;

    fn binary_array(
        values: &[f64],
        dtype: BinaryDataArrayType,
        compression: BinaryCompressionType,
        kind: &str,
    ) -> String {
        let text = encode_array(values, dtype, ByteOrder::Little, compression);
        let precision = match dtype {
            BinaryDataArrayType::Float64 => "MS:1000523",
            _ => "MS:1000521",
        };
        let compression = match compression {
            BinaryCompressionType::Zlib => "MS:1000574",
            BinaryCompressionType::NoCompression => "MS:1000576",
        };
        format!(
            r#"<binaryDataArray encodedLength="{len}">
  <cvParam cvRef="MS" accession="{precision}" name="precision" value=""/>
  <cvParam cvRef="MS" accession="{compression}" name="compression" value=""/>
  <cvParam cvRef="MS" accession="{kind}" name="array" value=""/>
  <binary>{text}</binary>
</binaryDataArray>"#,
            len = text.len(),
            text = String::from_utf8_lossy(&text),
        )
    }

    fn document() -> String {
        let ms1 = [
            binary_array(
                &[400.0, 500.0, 600.0],
                BinaryDataArrayType::Float64,
                BinaryCompressionType::Zlib,
                "MS:1000514",
            ),
            binary_array(
                &[10.0, 20.0, 30.0],
                BinaryDataArrayType::Float32,
                BinaryCompressionType::NoCompression,
                "MS:1000515",
            ),
        ]
        .join("\n");
        // m/z uncompressed 32-bit and intensity zlib 64-bit on the same scan
        let ms2 = [
            binary_array(
                &[150.5, 250.25],
                BinaryDataArrayType::Float32,
                BinaryCompressionType::NoCompression,
                "MS:1000514",
            ),
            binary_array(
                &[1000.0, 2000.0],
                BinaryDataArrayType::Float64,
                BinaryCompressionType::Zlib,
                "MS:1000515",
            ),
            binary_array(
                &[10.0, 0.0],
                BinaryDataArrayType::Float32,
                BinaryCompressionType::NoCompression,
                "MS:1000517",
            ),
        ]
        .join("\n");
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<mzML xmlns="http://psi.hupo.org/ms/mzml" version="1.1.0">
 <referenceableParamGroupList count="1">
  <referenceableParamGroup id="CommonMS1SpectrumParams">
   <cvParam cvRef="MS" accession="MS:1000130" name="positive scan" value=""/>
  </referenceableParamGroup>
 </referenceableParamGroupList>
 <instrumentConfigurationList count="1">
  <instrumentConfiguration id="IC1">
   <componentList count="2">
    <source order="1"><cvParam cvRef="MS" accession="MS:1000073" name="electrospray ionization" value=""/></source>
    <analyzer order="2"><cvParam cvRef="MS" accession="MS:1000484" name="orbitrap" value=""/></analyzer>
   </componentList>
  </instrumentConfiguration>
 </instrumentConfigurationList>
 <run id="run1" defaultInstrumentConfigurationRef="IC1" startTimeStamp="2009-08-06T14:31:22Z">
  <spectrumList count="3">
   <spectrum index="0" id="controllerType=0 controllerNumber=1 scan=1" defaultArrayLength="3">
    <referenceableParamGroupRef ref="CommonMS1SpectrumParams"/>
    <cvParam cvRef="MS" accession="MS:1000511" name="ms level" value="1"/>
    <cvParam cvRef="MS" accession="MS:1000128" name="profile spectrum" value=""/>
    <scanList count="1">
     <scan instrumentConfigurationRef="IC1">
      <cvParam cvRef="MS" accession="MS:1000016" name="scan start time" value="1.0" unitCvRef="UO" unitAccession="UO:0000031" unitName="minute"/>
      <cvParam cvRef="MS" accession="MS:1000512" name="filter string" value="FTMS + p ESI Full ms [400.00-2000.00]"/>
      <scanWindowList count="1">
       <scanWindow>
        <cvParam cvRef="MS" accession="MS:1000501" name="scan window lower limit" value="400" unitCvRef="MS" unitAccession="MS:1000040" unitName="m/z"/>
        <cvParam cvRef="MS" accession="MS:1000500" name="scan window upper limit" value="2000" unitCvRef="MS" unitAccession="MS:1000040" unitName="m/z"/>
       </scanWindow>
      </scanWindowList>
     </scan>
    </scanList>
    <binaryDataArrayList count="2">
{ms1}
    </binaryDataArrayList>
   </spectrum>
   <spectrum index="1" id="controllerType=0 controllerNumber=1 scan=2" defaultArrayLength="2">
    <cvParam cvRef="MS" accession="MS:1000511" name="ms level" value="2"/>
    <cvParam cvRef="MS" accession="MS:1000127" name="centroid spectrum" value=""/>
    <cvParam cvRef="MS" accession="MS:1000129" name="negative scan" value=""/>
    <scanList count="1">
     <scan>
      <cvParam cvRef="MS" accession="MS:1000016" name="scan start time" value="66" unitCvRef="UO" unitAccession="UO:0000010" unitName="second"/>
     </scan>
    </scanList>
    <precursorList count="1">
     <precursor spectrumRef="controllerType=0 controllerNumber=1 scan=1">
      <isolationWindow>
       <cvParam cvRef="MS" accession="MS:1000827" name="isolation window target m/z" value="445.3" unitCvRef="MS" unitAccession="MS:1000040" unitName="m/z"/>
       <cvParam cvRef="MS" accession="MS:1000828" name="isolation window lower offset" value="1.0" unitCvRef="MS" unitAccession="MS:1000040" unitName="m/z"/>
       <cvParam cvRef="MS" accession="MS:1000829" name="isolation window upper offset" value="1.5" unitCvRef="MS" unitAccession="MS:1000040" unitName="m/z"/>
      </isolationWindow>
      <selectedIonList count="1">
       <selectedIon>
        <cvParam cvRef="MS" accession="MS:1000744" name="selected ion m/z" value="445.34" unitCvRef="MS" unitAccession="MS:1000040" unitName="m/z"/>
        <cvParam cvRef="MS" accession="MS:1000041" name="charge state" value="2"/>
       </selectedIon>
      </selectedIonList>
      <activation>
       <cvParam cvRef="MS" accession="MS:1000133" name="collision-induced dissociation" value=""/>
       <cvParam cvRef="MS" accession="MS:1000045" name="collision energy" value="35" unitCvRef="UO" unitAccession="UO:0000266" unitName="electronvolt"/>
      </activation>
     </precursor>
    </precursorList>
    <productList count="1">
     <product>
      <isolationWindow>
       <cvParam cvRef="MS" accession="MS:1000827" name="isolation window target m/z" value="100.0"/>
      </isolationWindow>
     </product>
    </productList>
    <binaryDataArrayList count="3">
{ms2}
    </binaryDataArrayList>
   </spectrum>
   <spectrum index="2" id="sample=1 period=1 cycle=3" defaultArrayLength="0">
    <cvParam cvRef="MS" accession="MS:1000511" name="ms level" value="2"/>
    <binaryDataArrayList count="0"/>
   </spectrum>
  </spectrumList>
  <chromatogramList count="1">
   <chromatogram index="0" id="TIC" defaultArrayLength="0">
    <binaryDataArrayList count="0"/>
   </chromatogram>
  </chromatogramList>
 </run>
</mzML>"#
        )
    }

    fn reader() -> MzMLReaderType<MemorySource> {
        MzMLReaderType::new(MemorySource::from(document().as_str()))
    }

    #[test_log::test]
    fn test_parse_scan_number() {
        assert_eq!(
            parse_scan_number("controllerType=0 controllerNumber=1 scan=42"),
            Some(42)
        );
        assert_eq!(parse_scan_number("index=3"), None);
    }

    #[test_log::test]
    fn test_headers() -> Result<(), ScanAccessError> {
        let mut reader = reader();
        let headers: Vec<ScanHeader> = reader
            .headers(ScanFilter::default())?
            .collect::<Result<_, _>>()?;
        assert_eq!(headers.len(), 3);

        let ms1 = &headers[0];
        assert_eq!(ms1.scan_number, Some(1));
        assert_eq!(ms1.ms_level, Some(1));
        assert_eq!(ms1.polarity, ScanPolarity::Positive);
        assert_eq!(ms1.spectrum_kind, SpectrumKind::Profile);
        assert_eq!(ms1.retention_time, Some(60.0));
        assert_eq!(ms1.low_mz, Some(400.0));
        assert_eq!(ms1.high_mz, Some(2000.0));
        assert_eq!(ms1.mass_analyzer, Some(MassAnalyzer::Orbitrap));
        assert_eq!(ms1.ionization_source, Some(IonizationSource::ESI));
        assert_eq!(ms1.custom("scan_filter"), Some("FTMS + p ESI Full ms [400.00-2000.00]"));
        assert!(ms1.acquisition_timestamp.is_some());

        let ms2 = &headers[1];
        assert_eq!(ms2.scan_number, Some(2));
        assert_eq!(ms2.parent_scan_number, Some(1));
        assert_eq!(ms2.polarity, ScanPolarity::Negative);
        assert_eq!(ms2.retention_time, Some(66.0));
        assert_eq!(ms2.precursor_mz, Some(445.34));
        assert_eq!(ms2.precursor_charge, Some(2));
        assert_eq!(ms2.precursor_low_mz, Some(444.3));
        assert_eq!(ms2.precursor_high_mz, Some(446.8));
        assert_eq!(ms2.dissociation_method, Some(DissociationMethod::CID));
        assert_eq!(ms2.activation_energy, Some(35.0));

        // No scan number in the id, so the position stands in
        assert_eq!(headers[2].scan_number, Some(3));
        assert_eq!(headers[2].spectrum_kind, SpectrumKind::Unknown);
        Ok(())
    }

    #[test_log::test]
    fn test_filters() -> Result<(), ScanAccessError> {
        let mut reader = reader();
        let numbers: Vec<Option<u32>> = reader
            .headers(ScanFilter::new().with_ms_level(2))?
            .map(|h| h.map(|h| h.scan_number))
            .collect::<Result<_, _>>()?;
        assert_eq!(numbers, vec![Some(2), Some(3)]);

        // The third spectrum records no retention time, so it fails any RT bound
        let numbers: Vec<Option<u32>> = reader
            .headers(ScanFilter::new().with_rt_range(Some(61.0), None))?
            .map(|h| h.map(|h| h.scan_number))
            .collect::<Result<_, _>>()?;
        assert_eq!(numbers, vec![Some(2)]);

        let count = reader
            .scans(
                ScanFilter::new().with_polarity(ScanPolarity::Positive),
                SpectrumKind::Centroid,
            )?
            .count();
        assert_eq!(count, 1);
        Ok(())
    }

    #[test_log::test]
    fn test_arrays_decode_independently() -> Result<(), ScanAccessError> {
        let mut reader = reader();
        let scan = reader.scan(Some(2), SpectrumKind::Profile)?;
        assert!(scan.has_centroids());
        assert!(!scan.has_profile());
        assert_eq!(scan.centroids.len(), 2);
        assert_eq!(scan.centroids[0].mz, 150.5);
        assert_eq!(scan.centroids[0].ai, 1000.0);
        assert_eq!(scan.centroids[0].noise, Some(100.0));
        assert_eq!(scan.centroids[0].sn(), Some(10.0));
        assert_eq!(scan.centroids[1].mz, 250.25);
        assert_eq!(scan.centroids[1].noise, None);
        Ok(())
    }

    #[test_log::test]
    fn test_declared_kind_wins() -> Result<(), ScanAccessError> {
        let mut reader = reader();
        let scan = reader.scan(Some(1), SpectrumKind::Centroid)?;
        assert!(scan.has_profile());
        assert_eq!(scan.profile.len(), 3);
        assert_eq!(scan.profile[1].mz, 500.0);
        assert_eq!(scan.profile[1].intensity, 20.0);

        let scan = reader.scan(None, SpectrumKind::Centroid)?;
        assert_eq!(scan.scan_number(), Some(1));

        let scan = reader.scan(Some(3), SpectrumKind::Profile)?;
        assert_eq!(scan.header.spectrum_kind, SpectrumKind::Profile);
        assert!(!scan.has_profile() && !scan.has_centroids());

        assert!(matches!(
            reader.scan(Some(99), SpectrumKind::Centroid),
            Err(ScanAccessError::ScanNotFound(Some(99)))
        ));
        Ok(())
    }

    #[test_log::test]
    fn test_corrupt_array_fails_one_scan() -> Result<(), ScanAccessError> {
        let text = document().replacen("<binary>", "<binary>AAAA", 1);
        let mut reader = MzMLReaderType::new(MemorySource::from(text.as_str()));
        let results: Vec<_> = reader
            .scans(ScanFilter::default(), SpectrumKind::Centroid)?
            .collect();
        assert_eq!(results.len(), 3);
        assert!(matches!(
            results[0],
            Err(ScanAccessError::DecodeError { scan: Some(1), .. })
        ));
        assert!(results[1].is_ok());
        assert!(results[2].is_ok());
        Ok(())
    }

    #[test_log::test]
    fn test_filtered_scan_not_decoded() -> Result<(), ScanAccessError> {
        let text = document().replacen("<binary>", "<binary>AAAA", 1);
        let mut reader = MzMLReaderType::new(MemorySource::from(text.as_str()));
        let results: Vec<_> = reader
            .scans(ScanFilter::new().with_ms_level(2), SpectrumKind::Centroid)?
            .collect();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(results[0].as_ref().unwrap().scan_number(), Some(2));
        Ok(())
    }

    #[test_log::test]
    fn test_truncated_document() -> Result<(), ScanAccessError> {
        let text = document();
        let cut = text.find("<spectrum index=\"1\"").unwrap() + 200;
        let mut reader = MzMLReaderType::new(MemorySource::from(&text[..cut]));
        let results: Vec<_> = reader.headers(ScanFilter::default())?.collect();
        assert!(results[0].is_ok());
        assert!(matches!(
            results.last(),
            Some(Err(ScanAccessError::ParserError(_)))
        ));
        Ok(())
    }

    #[test_log::test]
    fn test_read_file() -> Result<(), ScanAccessError> {
        let mut reader = MzMLReader::open_path("./test/data/small.mzML")?;
        let summary = reader.summary()?;
        assert_eq!(summary.scan_count(), 3);
        assert_eq!(summary.scan_number_range, Some((1, 3)));

        assert!(matches!(
            MzMLReader::open_path("./test/data/missing.mzML"),
            Err(ScanAccessError::IOError(_))
        ));
        Ok(())
    }
}
