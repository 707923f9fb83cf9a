//! Output destinations for VCF and BGZF writes
//!
//! [`DataSink`] names where output goes; [`SinkWriter`] is the open handle,
//! either plain text or BGZF depending on the path extension or an explicit
//! [`OutputCompression`] override.
//!
//! # Example
//!
//! ```no_run
//! use biometal_vcf::io::DataSink;
//! use std::io::Write;
//!
//! # fn main() -> biometal_vcf::Result<()> {
//! // ".gz" and ".bgz" paths are BGZF-compressed
//! let mut out = DataSink::from_path("calls.vcf.gz").open(None)?;
//! out.write_all(b"##fileformat=VCFv4.3\n")?;
//! out.finish()?;
//! # Ok(())
//! # }
//! ```

use crate::error::Result;
use crate::io::bgzf::BgzfWriter;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Output destination
#[derive(Debug, Clone)]
pub enum DataSink {
    /// Write to a local file path
    ///
    /// `.gz`/`.bgz` paths are BGZF-compressed unless overridden.
    Local(PathBuf),

    /// Write uncompressed text to standard output
    Stdout,
}

/// Compression applied by a [`SinkWriter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputCompression {
    /// Plain text
    None,
    /// BGZF blocks with EOF marker
    Bgzf,
}

impl DataSink {
    /// Create a sink from a file path
    ///
    /// # Example
    ///
    /// ```
    /// use biometal_vcf::io::DataSink;
    ///
    /// let sink = DataSink::from_path("output.vcf.gz");
    /// assert!(sink.is_compressed());
    /// ```
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        Self::Local(path.as_ref().to_path_buf())
    }

    /// Create a sink for standard output
    pub fn stdout() -> Self {
        Self::Stdout
    }

    pub(crate) fn extension(&self) -> Option<&str> {
        match self {
            Self::Local(path) => path.extension().and_then(|s| s.to_str()),
            Self::Stdout => None,
        }
    }

    /// Whether output will be BGZF-compressed by default
    pub fn is_compressed(&self) -> bool {
        matches!(self.extension(), Some("gz") | Some("bgz"))
    }

    /// Open the sink
    ///
    /// `compression` overrides extension-based detection when given.
    pub fn open(&self, compression: Option<OutputCompression>) -> Result<SinkWriter> {
        let compression = compression.unwrap_or(if self.is_compressed() {
            OutputCompression::Bgzf
        } else {
            OutputCompression::None
        });

        let inner: Box<dyn Write> = match self {
            Self::Local(path) => Box::new(File::create(path)?),
            Self::Stdout => Box::new(io::stdout()),
        };

        Ok(match compression {
            OutputCompression::None => SinkWriter::Plain(BufWriter::new(inner)),
            OutputCompression::Bgzf => SinkWriter::Bgzf(BgzfWriter::new(BufWriter::new(inner))),
        })
    }
}

/// Open output handle
pub enum SinkWriter {
    /// Buffered plain text
    Plain(BufWriter<Box<dyn Write>>),
    /// BGZF-compressed
    Bgzf(BgzfWriter<BufWriter<Box<dyn Write>>>),
}

impl SinkWriter {
    /// Flush all data; for BGZF also write the EOF marker
    pub fn finish(&mut self) -> Result<()> {
        match self {
            Self::Plain(w) => w.flush()?,
            Self::Bgzf(w) => w.finish()?,
        }
        Ok(())
    }

    /// Compression in effect
    pub fn compression(&self) -> OutputCompression {
        match self {
            Self::Plain(_) => OutputCompression::None,
            Self::Bgzf(_) => OutputCompression::Bgzf,
        }
    }
}

impl Write for SinkWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(w) => w.write(buf),
            Self::Bgzf(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(w) => w.flush(),
            Self::Bgzf(w) => w.flush(),
        }
    }
}
