use std::fmt::Debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use flate2::read::MultiGzDecoder;

/// How much of each element a pass reads
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetailLevel {
    /// Read the header and keep the encoded signal for decoding
    #[default]
    Full,
    /// Read the header only and skip over the signal
    MetadataOnly,
}

impl DetailLevel {
    pub fn keeps_signal(&self) -> bool {
        matches!(self, Self::Full)
    }
}

/// Something a reader can open a fresh stream over, once per pass
pub trait ReaderSource: Debug {
    type Stream: io::Read;

    fn open_stream(&self) -> io::Result<Self::Stream>;

    /// The path this source reads from, when there is one
    fn path(&self) -> Option<&Path> {
        None
    }
}

/// A document on the file system, optionally GZIP compressed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSource {
    path: PathBuf,
    gzipped: bool,
}

impl FileSource {
    /// Check that `path` names a readable file. Nothing is held open between
    /// passes.
    pub fn new<P: Into<PathBuf>>(path: P) -> io::Result<Self> {
        let path = path.into();
        let meta = fs::metadata(&path)?;
        if !meta.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a file", path.display()),
            ));
        }
        Ok(Self {
            path,
            gzipped: false,
        })
    }

    /// Decompress every stream opened over this file
    pub fn with_gzip(mut self, gzipped: bool) -> Self {
        self.gzipped = gzipped;
        self
    }

    pub fn is_gzipped(&self) -> bool {
        self.gzipped
    }
}

/// A stream over a [`FileSource`]
pub enum FileStream {
    Plain(fs::File),
    Gzip(MultiGzDecoder<io::BufReader<fs::File>>),
}

impl io::Read for FileStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Plain(file) => io::Read::read(file, buf),
            Self::Gzip(decoder) => io::Read::read(decoder, buf),
        }
    }
}

impl ReaderSource for FileSource {
    type Stream = FileStream;

    fn open_stream(&self) -> io::Result<Self::Stream> {
        let file = fs::File::open(&self.path)?;
        Ok(if self.gzipped {
            FileStream::Gzip(MultiGzDecoder::new(io::BufReader::new(file)))
        } else {
            FileStream::Plain(file)
        })
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

/// A document held in memory. Clones share the same buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemorySource {
    buffer: Arc<[u8]>,
}

impl MemorySource {
    pub fn new<B: Into<Arc<[u8]>>>(buffer: B) -> Self {
        Self {
            buffer: buffer.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl From<Vec<u8>> for MemorySource {
    fn from(value: Vec<u8>) -> Self {
        Self::new(value)
    }
}

impl From<&str> for MemorySource {
    fn from(value: &str) -> Self {
        Self::new(value.as_bytes())
    }
}

impl From<&[u8]> for MemorySource {
    fn from(value: &[u8]) -> Self {
        Self::new(value)
    }
}

impl ReaderSource for MemorySource {
    type Stream = io::Cursor<Arc<[u8]>>;

    fn open_stream(&self) -> io::Result<Self::Stream> {
        Ok(io::Cursor::new(self.buffer.clone()))
    }
}
