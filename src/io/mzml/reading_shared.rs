use std::io;

use quick_xml::Error as XMLError;
use thiserror::Error;

use crate::io::traits::SpectrumBuilding;
use crate::spectrum::bindata::{
    build_peaks, zip_channels, ArrayRetrievalError, ArrayType, BinaryDataArrayType, ByteOrder,
    DataArray, PeakData,
};
use crate::spectrum::{IsolationWindow, Scan, ScanHeader, SpectrumKind};

/**
The different states the mzML parser can enter while parsing
different phases of the document. This information is really only
needed by the module consumer to determine where in the document an
error occurred.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd)]
pub enum MzMLParserState {
    Start = 0,

    ReferenceParamGroupList,
    ReferenceParamGroup,

    InstrumentConfigurationList,
    InstrumentConfiguration,

    Run,

    SpectrumList,
    Spectrum,
    SpectrumDone,
    SpectrumListDone,

    ScanList,
    Scan,
    ScanWindowList,
    ScanWindow,

    PrecursorList,
    Precursor,
    IsolationWindow,
    SelectedIonList,
    SelectedIon,
    Activation,

    ProductList,

    BinaryDataArrayList,
    BinaryDataArray,
    Binary,

    Chromatogram,

    ParserError,
}

/**
All the ways that mzML parsing can go wrong
*/
#[derive(Debug, Error)]
pub enum MzMLParserError {
    #[error("An incomplete spectrum was parsed")]
    IncompleteSpectrum,
    #[error("An incomplete element {0} was encountered in {1:?}")]
    IncompleteElementError(String, MzMLParserState),
    #[error("An XML error {1:?} was encountered in {0:?}")]
    XMLError(MzMLParserState, #[source] XMLError),
    #[error("An IO error {1} was encountered in {0:?}")]
    IOError(MzMLParserState, #[source] io::Error),
}

impl From<MzMLParserError> for io::Error {
    fn from(value: MzMLParserError) -> Self {
        match value {
            MzMLParserError::IOError(_, ref e) => io::Error::new(e.kind(), value),
            _ => io::Error::new(io::ErrorKind::InvalidData, value),
        }
    }
}

pub type ParserResult = Result<MzMLParserState, MzMLParserError>;

/// Everything read from one `<spectrum>` element before its arrays are decoded
#[derive(Debug, Default, Clone)]
pub struct MzMLSpectrumBuilder {
    pub header: ScanHeader,
    pub(crate) window: IsolationWindow,
    pub(crate) arrays: Vec<DataArray>,
    pub(crate) current_array: DataArray,
    /// The 0-based position of the spectrum in the list
    pub index: Option<usize>,
}

impl MzMLSpectrumBuilder {
    pub(crate) fn start_array(&mut self) {
        // mzML arrays are always little endian and default to 32-bit floats
        self.current_array = DataArray::wrap(
            ArrayType::Unknown,
            BinaryDataArrayType::Float32,
            ByteOrder::Little,
            Default::default(),
            Vec::new(),
        );
    }

    pub(crate) fn finish_array(&mut self) {
        let array = std::mem::take(&mut self.current_array);
        match array.name {
            ArrayType::MZArray | ArrayType::IntensityArray | ArrayType::SignalToNoiseArray => {
                self.arrays.push(array)
            }
            _ => {}
        }
    }

    pub(crate) fn discard_arrays(&mut self) {
        self.arrays.clear();
        self.current_array.clear();
    }

    /// Resolve the precursor isolation window into the header's bounds
    pub(crate) fn finish_header(&mut self) {
        if !self.window.is_empty() {
            let (low, high) = self.window.bounds(self.header.precursor_mz);
            if low.is_some() {
                self.header.precursor_low_mz = low;
            }
            if high.is_some() {
                self.header.precursor_high_mz = high;
            }
        }
    }

    fn array(&self, name: ArrayType) -> Option<&DataArray> {
        self.arrays.iter().rev().find(|a| a.name == name)
    }
}

impl SpectrumBuilding for MzMLSpectrumBuilder {
    fn header(&self) -> &ScanHeader {
        &self.header
    }

    fn into_header(self) -> ScanHeader {
        self.header
    }

    fn into_scan(self, default_kind: SpectrumKind) -> Result<Scan, ArrayRetrievalError> {
        let kind = self.header.spectrum_kind.or_fallback(default_kind);
        let (mz, intensity) = match (
            self.array(ArrayType::MZArray),
            self.array(ArrayType::IntensityArray),
        ) {
            (Some(mz), Some(intensity)) if !mz.is_empty() && !intensity.is_empty() => {
                (mz.decode()?, intensity.decode()?)
            }
            _ => (Vec::new(), Vec::new()),
        };
        let sn = match self.array(ArrayType::SignalToNoiseArray) {
            Some(sn) if !sn.is_empty() => Some(sn.decode()?),
            _ => None,
        };
        let points = zip_channels(&mz, &intensity, sn.as_deref())?;

        let mut header = self.header;
        header.spectrum_kind = kind;
        header.points_count = Some(points.len());
        let scan = match build_peaks(points, kind, sn.is_some()) {
            PeakData::Centroids(centroids) => Scan::from_centroids(header, centroids),
            PeakData::Profile(profile) => Scan::from_profile(header, profile),
        };
        Ok(scan)
    }
}
