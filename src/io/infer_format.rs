use std::fmt::Debug;
use std::fs;
use std::io::{self, prelude::*};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use log::debug;

use crate::io::traits::{ScanAccessError, ScanFilter, ScanSource};
use crate::io::utils::{FileSource, ReaderSource};
use crate::spectrum::{Scan, ScanHeader, SpectrumKind};

#[cfg(feature = "mgf")]
use crate::io::mgf::{is_mgf, MGFReaderType};
#[cfg(feature = "mzdata")]
use crate::io::mzdata::MzDataReaderType;
#[cfg(feature = "mzml")]
use crate::io::mzml::MzMLReaderType;
#[cfg(feature = "mzxml")]
use crate::io::mzxml::MzXMLReaderType;
#[cfg(feature = "xy")]
use crate::io::xy::{is_xy, XyReaderType};

/// Mass spectrometry file formats that [`mzread`](crate) recognizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MassSpectrometryFormat {
    MzData,
    MzXML,
    MzML,
    MGF,
    XY,
    ThermoRaw,
    Unknown,
}

impl MassSpectrometryFormat {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "mzdata" => Self::MzData,
            "mzxml" => Self::MzXML,
            "mzml" => Self::MzML,
            "mgf" => Self::MGF,
            "xy" | "txt" | "csv" | "tsv" => Self::XY,
            "raw" => Self::ThermoRaw,
            _ => Self::Unknown,
        }
    }
}

fn is_gzipped(header: &[u8]) -> bool {
    header.starts_with(b"\x1f\x8b")
}

fn contains(buf: &[u8], needle: &[u8]) -> bool {
    buf.windows(needle.len()).any(|window| window == needle)
}

/// Given a path, infer the file format from its extension and whether or not
/// the file is GZIP compressed. A path without an extension is taken to be
/// a plain XY text file.
pub fn infer_from_path<P: AsRef<Path>>(path: P) -> (MassSpectrometryFormat, bool) {
    let path = path.as_ref();
    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
        return (MassSpectrometryFormat::XY, false);
    };
    if ext.eq_ignore_ascii_case("gz") {
        let inner = path.with_extension("");
        let format = inner
            .extension()
            .and_then(|ext| ext.to_str())
            .map(MassSpectrometryFormat::from_extension)
            .unwrap_or(MassSpectrometryFormat::Unknown);
        return (format, true);
    }
    (MassSpectrometryFormat::from_extension(ext), false)
}

/// Given the first bytes of a stream, infer the file format and whether or
/// not the stream is GZIP compressed
pub fn infer_from_bytes(buf: &[u8]) -> (MassSpectrometryFormat, bool) {
    if is_gzipped(buf) {
        return (MassSpectrometryFormat::Unknown, true);
    }
    let format = if contains(buf, b"<mzML") || contains(buf, b"<indexedmzML") {
        MassSpectrometryFormat::MzML
    } else if contains(buf, b"<mzXML") || contains(buf, b"<msRun") {
        MassSpectrometryFormat::MzXML
    } else if contains(buf, b"<mzData") {
        MassSpectrometryFormat::MzData
    } else if buf.len() > 18 && buf[2..18].chunks(2).map(|c| c[0]).eq(*b"Finnigan") {
        MassSpectrometryFormat::ThermoRaw
    } else {
        sniff_text(buf)
    };
    (format, false)
}

#[allow(unused)]
fn sniff_text(buf: &[u8]) -> MassSpectrometryFormat {
    #[cfg(feature = "mgf")]
    if is_mgf(buf) {
        return MassSpectrometryFormat::MGF;
    }
    #[cfg(feature = "xy")]
    if is_xy(buf) {
        return MassSpectrometryFormat::XY;
    }
    MassSpectrometryFormat::Unknown
}

const SNIFF_LENGTH: u64 = 512;

/// Given a path, infer the file format and whether or not it is GZIP
/// compressed, using the file name first and reading the file's leading bytes
/// when the name is not conclusive. The leading bytes of a GZIP compressed
/// file are decompressed before they are inspected.
pub fn infer_format<P: AsRef<Path>>(path: P) -> io::Result<(MassSpectrometryFormat, bool)> {
    let path = path.as_ref();
    let (format, is_gzipped) = infer_from_path(path);
    if format != MassSpectrometryFormat::Unknown {
        return Ok((format, is_gzipped));
    }
    let mut buf = Vec::with_capacity(SNIFF_LENGTH as usize);
    fs::File::open(path)?.take(SNIFF_LENGTH).read_to_end(&mut buf)?;
    let (mut format, sniffed_gzip) = infer_from_bytes(&buf);
    if sniffed_gzip {
        buf.clear();
        MultiGzDecoder::new(io::BufReader::new(fs::File::open(path)?))
            .take(SNIFF_LENGTH)
            .read_to_end(&mut buf)?;
        format = infer_from_bytes(&buf).0;
    }
    debug!("Inferred {format:?} from the content of {}", path.display());
    Ok((format, is_gzipped || sniffed_gzip))
}

/// An explicit file format dispatching type that provides the complete
/// [`ScanSource`] API over whichever format a file holds.
///
/// The preferred means of creating an instance is through [`open_file`].
/// Formats whose feature is disabled have no variant.
#[non_exhaustive]
#[derive(Debug)]
pub enum MZReaderType<S: ReaderSource> {
    #[cfg(feature = "mzdata")]
    MzData(MzDataReaderType<S>),
    #[cfg(feature = "mzxml")]
    MzXML(MzXMLReaderType<S>),
    #[cfg(feature = "mzml")]
    MzML(MzMLReaderType<S>),
    #[cfg(feature = "mgf")]
    MGF(MGFReaderType<S>),
    #[cfg(feature = "xy")]
    XY(XyReaderType<S>),
}

pub type MZReader = MZReaderType<FileSource>;

macro_rules! msfmt_dispatch {
    ($d:ident, $r:ident, $e:expr) => {
        match $d {
            #[cfg(feature = "mzdata")]
            MZReaderType::MzData($r) => $e,
            #[cfg(feature = "mzxml")]
            MZReaderType::MzXML($r) => $e,
            #[cfg(feature = "mzml")]
            MZReaderType::MzML($r) => $e,
            #[cfg(feature = "mgf")]
            MZReaderType::MGF($r) => $e,
            #[cfg(feature = "xy")]
            MZReaderType::XY($r) => $e,
        }
    };
}

impl<S: ReaderSource> MZReaderType<S> {
    /// Wrap `source` in the reader for `format`
    pub fn new(format: MassSpectrometryFormat, source: S) -> Result<Self, ScanAccessError> {
        let reader = match format {
            #[cfg(feature = "mzdata")]
            MassSpectrometryFormat::MzData => Self::MzData(MzDataReaderType::new(source)),
            #[cfg(feature = "mzxml")]
            MassSpectrometryFormat::MzXML => Self::MzXML(MzXMLReaderType::new(source)),
            #[cfg(feature = "mzml")]
            MassSpectrometryFormat::MzML => Self::MzML(MzMLReaderType::new(source)),
            #[cfg(feature = "mgf")]
            MassSpectrometryFormat::MGF => Self::MGF(MGFReaderType::new(source)),
            #[cfg(feature = "xy")]
            MassSpectrometryFormat::XY => Self::XY(XyReaderType::new(source)),
            MassSpectrometryFormat::ThermoRaw => {
                return Err(ScanAccessError::UnsupportedOperation(
                    "Thermo RAW files are read through a RawFileAccess binding".to_string(),
                ))
            }
            #[allow(unreachable_patterns)]
            _ => {
                return Err(ScanAccessError::UnsupportedOperation(format!(
                    "{format:?} files are not supported"
                )))
            }
        };
        Ok(reader)
    }

    /// Get the file format for this reader
    pub fn as_format(&self) -> MassSpectrometryFormat {
        match self {
            #[cfg(feature = "mzdata")]
            Self::MzData(_) => MassSpectrometryFormat::MzData,
            #[cfg(feature = "mzxml")]
            Self::MzXML(_) => MassSpectrometryFormat::MzXML,
            #[cfg(feature = "mzml")]
            Self::MzML(_) => MassSpectrometryFormat::MzML,
            #[cfg(feature = "mgf")]
            Self::MGF(_) => MassSpectrometryFormat::MGF,
            #[cfg(feature = "xy")]
            Self::XY(_) => MassSpectrometryFormat::XY,
        }
    }
}

impl MZReaderType<FileSource> {
    /// Infer the format of the file at `path` and open it for reading
    pub fn open_path<P: Into<PathBuf>>(path: P) -> Result<Self, ScanAccessError> {
        let path = path.into();
        let (format, is_gzipped) = infer_format(&path)?;
        if is_gzipped {
            debug!("Decompressing {} while reading", path.display());
        }
        Self::new(format, FileSource::new(path)?.with_gzip(is_gzipped))
    }
}

impl<S: ReaderSource> ScanSource for MZReaderType<S> {
    type HeaderIter<'a> = Box<dyn Iterator<Item = Result<ScanHeader, ScanAccessError>> + 'a> where Self: 'a;
    type ScanIter<'a> = Box<dyn Iterator<Item = Result<Scan, ScanAccessError>> + 'a> where Self: 'a;

    fn headers(&mut self, filter: ScanFilter) -> Result<Self::HeaderIter<'_>, ScanAccessError> {
        msfmt_dispatch!(self, reader, Ok(Box::new(reader.headers(filter)?)))
    }

    fn scans(
        &mut self,
        filter: ScanFilter,
        default_kind: SpectrumKind,
    ) -> Result<Self::ScanIter<'_>, ScanAccessError> {
        msfmt_dispatch!(
            self,
            reader,
            Ok(Box::new(reader.scans(filter, default_kind)?))
        )
    }

    fn scan(
        &mut self,
        scan_number: Option<u32>,
        default_kind: SpectrumKind,
    ) -> Result<Scan, ScanAccessError> {
        msfmt_dispatch!(self, reader, reader.scan(scan_number, default_kind))
    }
}

/// Given a local file system path, infer the file format, and attempt to open it
/// for reading.
///
/// GZIP compressed files are decompressed as they are read. Thermo RAW files
/// report [`ScanAccessError::UnsupportedOperation`].
pub fn open_file<P: Into<PathBuf>>(path: P) -> Result<MZReader, ScanAccessError> {
    MZReader::open_path(path)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_infer_from_path() {
        assert_eq!(
            infer_from_path("./test/data/small.mzML"),
            (MassSpectrometryFormat::MzML, false)
        );
        assert_eq!(
            infer_from_path("run.MZXML"),
            (MassSpectrometryFormat::MzXML, false)
        );
        assert_eq!(
            infer_from_path("run.mzData"),
            (MassSpectrometryFormat::MzData, false)
        );
        assert_eq!(infer_from_path("run.mgf.gz"), (MassSpectrometryFormat::MGF, true));
        assert_eq!(infer_from_path("spectrum"), (MassSpectrometryFormat::XY, false));
        assert_eq!(
            infer_from_path("run.RAW"),
            (MassSpectrometryFormat::ThermoRaw, false)
        );
        assert_eq!(
            infer_from_path("run.bin"),
            (MassSpectrometryFormat::Unknown, false)
        );
    }

    #[test]
    fn test_infer_from_bytes() {
        assert_eq!(
            infer_from_bytes(b"<?xml version=\"1.0\"?>\n<indexedmzML>").0,
            MassSpectrometryFormat::MzML
        );
        assert_eq!(
            infer_from_bytes(b"<?xml version=\"1.0\"?>\n<mzXML>").0,
            MassSpectrometryFormat::MzXML
        );
        assert_eq!(
            infer_from_bytes(b"<mzData version=\"1.05\">").0,
            MassSpectrometryFormat::MzData
        );
        assert_eq!(
            infer_from_bytes(b"BEGIN IONS\nTITLE=a\n").0,
            MassSpectrometryFormat::MGF
        );
        assert_eq!(infer_from_bytes(b"100.0 20\n").0, MassSpectrometryFormat::XY);
        assert_eq!(infer_from_bytes(b"\x1f\x8b\x08"), (MassSpectrometryFormat::Unknown, true));
    }

    #[test_log::test]
    fn test_open_file() -> Result<(), ScanAccessError> {
        let mut reader = open_file("./test/data/small.mzML")?;
        assert_eq!(reader.as_format(), MassSpectrometryFormat::MzML);
        assert_eq!(reader.headers(ScanFilter::default())?.count(), 3);

        let mut reader = open_file("./test/data/small.mgf")?;
        assert_eq!(reader.as_format(), MassSpectrometryFormat::MGF);
        let scan = reader.scan(None, SpectrumKind::Centroid)?;
        assert!(scan.has_centroids());
        Ok(())
    }

    fn gzip_copy(source: &str, suffix: &str) -> io::Result<tempfile::NamedTempFile> {
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&fs::read(source)?)?;
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile()?;
        file.write_all(&encoder.finish()?)?;
        file.flush()?;
        Ok(file)
    }

    #[test_log::test]
    fn test_open_gzipped() -> Result<(), ScanAccessError> {
        let file = gzip_copy("./test/data/small.mgf", ".mgf.gz")?;
        assert_eq!(infer_format(file.path())?, (MassSpectrometryFormat::MGF, true));
        let mut reader = open_file(file.path())?;
        assert_eq!(reader.as_format(), MassSpectrometryFormat::MGF);
        let scan = reader.scan(None, SpectrumKind::Centroid)?;
        assert!(scan.has_centroids());

        // No inner extension, so the decompressed content decides
        let file = gzip_copy("./test/data/small.mzML", ".gz")?;
        assert_eq!(infer_format(file.path())?, (MassSpectrometryFormat::MzML, true));
        let mut reader = open_file(file.path())?;
        assert_eq!(reader.headers(ScanFilter::default())?.count(), 3);
        Ok(())
    }

    #[test_log::test]
    fn test_open_sniffed_and_unsupported() -> Result<(), ScanAccessError> {
        let mut file = tempfile::Builder::new().suffix(".bin").tempfile()?;
        file.write_all(b"BEGIN IONS\nTITLE=a\nPEPMASS=500.0\n100.0 10.0\nEND IONS\n")?;
        file.flush()?;
        let reader = open_file(file.path())?;
        assert_eq!(reader.as_format(), MassSpectrometryFormat::MGF);

        let raw = tempfile::Builder::new().suffix(".raw").tempfile()?;
        assert!(matches!(
            open_file(raw.path()),
            Err(ScanAccessError::UnsupportedOperation(_))
        ));
        assert!(matches!(
            open_file("./test/data/missing.mzML"),
            Err(ScanAccessError::IOError(_))
        ));
        Ok(())
    }
}
