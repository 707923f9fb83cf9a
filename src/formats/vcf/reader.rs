//! VCF reader
//!
//! [`Reader`] reads the header eagerly on construction and then yields
//! [`Record`]s one line at a time. Inputs may be plain text, plain gzip or
//! BGZF; BGZF files with a `.tbi` next to them also support region
//! [`fetch`](Reader::fetch).
//!
//! # Example
//!
//! ```no_run
//! use biometal_vcf::formats::vcf::Reader;
//!
//! # fn main() -> biometal_vcf::Result<()> {
//! let mut reader = Reader::from_path("calls.vcf.gz")?;
//! for record in reader.fetch("20", Some(1_110_695), Some(1_230_236))? {
//!     let record = record?;
//!     println!("{}:{} {}", record.chrom, record.pos, record.reference);
//! }
//! for warning in reader.take_warnings() {
//!     eprintln!("warning: {}", warning);
//! }
//! # Ok(())
//! # }
//! ```

use crate::error::{BiometalError, Result};
use crate::formats::index::{Region, TabixFile, TabixIndex, TabixLines};
use crate::formats::vcf::header::{Header, HeaderLine};
use crate::formats::vcf::parser::{
    check_header, parse_samples_line, HeaderParser, RecordChecks, RecordParser,
};
use crate::formats::vcf::record::Record;
use crate::formats::vcf::warning::{Warning, Warnings};
use crate::io::bgzf::{BgzfReader, VirtualOffset, DEFAULT_CACHE_CAPACITY};
use flate2::read::MultiGzDecoder;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Reader configuration
#[derive(Debug, Clone)]
pub struct ReaderOptions {
    /// Decompressed BGZF blocks kept per reader
    pub block_cache_capacity: usize,
    /// Samples to decode; `None` decodes all, others stay unparsed text
    pub parsed_samples: Option<HashSet<String>>,
    /// Optional value-count checks
    pub record_checks: RecordChecks,
    /// Treat a missing BGZF EOF marker as an error instead of a warning
    pub require_eof_marker: bool,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            block_cache_capacity: DEFAULT_CACHE_CAPACITY,
            parsed_samples: None,
            record_checks: RecordChecks::default(),
            require_eof_marker: false,
        }
    }
}

impl ReaderOptions {
    /// Set the block cache capacity
    pub fn with_block_cache_capacity(mut self, capacity: usize) -> Self {
        self.block_cache_capacity = capacity;
        self
    }

    /// Decode only the named samples
    pub fn with_parsed_samples<I, S>(mut self, samples: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parsed_samples = Some(samples.into_iter().map(Into::into).collect());
        self
    }

    /// Enable INFO/FORMAT value-count checks
    pub fn with_record_checks(mut self, checks: RecordChecks) -> Self {
        self.record_checks = checks;
        self
    }

    /// Fail on a missing BGZF EOF marker
    pub fn with_require_eof_marker(mut self, require: bool) -> Self {
        self.require_eof_marker = require;
        self
    }
}

/// Compression detected from the first bytes of an input file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputKind {
    Plain,
    Gzip,
    Bgzf,
}

fn detect_kind(file: &mut File) -> Result<InputKind> {
    let mut magic = [0u8; 16];
    let mut filled = 0;
    while filled < magic.len() {
        let n = file.read(&mut magic[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    file.seek(SeekFrom::Start(0))?;

    if filled < 2 || magic[..2] != [0x1f, 0x8b] {
        return Ok(InputKind::Plain);
    }
    // FEXTRA set and the first subfield is "BC"
    if filled == 16 && magic[3] & 0x04 != 0 && &magic[12..14] == b"BC" {
        Ok(InputKind::Bgzf)
    } else {
        Ok(InputKind::Gzip)
    }
}

fn index_path_for(path: &Path) -> PathBuf {
    let mut index_path = path.as_os_str().to_owned();
    index_path.push(".tbi");
    PathBuf::from(index_path)
}

/// Streaming VCF reader
pub struct Reader {
    source: Box<dyn BufRead>,
    parser: RecordParser,
    warnings: Warnings,
    options: ReaderOptions,
    /// Lines consumed so far (1-based number of the last line read)
    line_no: usize,
    /// First data line, read while checking the end of the header
    pending: Option<String>,
    buf: String,
    /// BGZF path eligible for region queries
    path: Option<PathBuf>,
    tabix: Option<TabixFile<BufReader<File>>>,
}

impl Reader {
    /// Open a VCF file with default options
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_path_with_options(path, ReaderOptions::default())
    }

    /// Open a VCF file, detecting plain text, gzip or BGZF from its magic bytes
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, if its header is
    /// invalid, or (with [`ReaderOptions::require_eof_marker`]) if a BGZF file
    /// lacks the EOF marker.
    pub fn from_path_with_options<P: AsRef<Path>>(path: P, options: ReaderOptions) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path)?;
        let kind = detect_kind(&mut file)?;
        tracing::debug!(path = %path.display(), ?kind, "opening VCF");

        let mut warnings = Warnings::new();
        let source: Box<dyn BufRead> = match kind {
            InputKind::Plain => Box::new(BufReader::new(file)),
            InputKind::Gzip => Box::new(BufReader::new(MultiGzDecoder::new(file))),
            InputKind::Bgzf => {
                let mut reader =
                    BgzfReader::with_cache_capacity(BufReader::new(file), options.block_cache_capacity)?;
                if !reader.has_eof_marker()? {
                    if options.require_eof_marker {
                        return Err(BiometalError::truncated(format!(
                            "BGZF EOF marker missing in {}",
                            path.display()
                        )));
                    }
                    warnings.push(Warning::MissingEofMarker);
                }
                reader.seek(VirtualOffset::from(0))?;
                Box::new(reader)
            }
        };

        let mut reader = Self::build(source, options, warnings)?;
        if kind == InputKind::Bgzf {
            reader.path = Some(path.to_path_buf());
        }
        Ok(reader)
    }

    /// Read uncompressed VCF text from any buffered source
    pub fn from_reader<R: BufRead + 'static>(source: R, options: ReaderOptions) -> Result<Self> {
        Self::build(Box::new(source), options, Warnings::new())
    }

    fn build(source: Box<dyn BufRead>, options: ReaderOptions, warnings: Warnings) -> Result<Self> {
        let mut reader = Reader {
            source,
            parser: RecordParser::new(Header::default(), options.record_checks),
            warnings,
            options,
            line_no: 0,
            pending: None,
            buf: String::new(),
            path: None,
            tabix: None,
        };
        let header = reader.read_header()?;
        reader.parser = RecordParser::new(header, reader.options.record_checks);
        Ok(reader)
    }

    fn next_line(&mut self) -> Result<Option<String>> {
        self.buf.clear();
        if self.source.read_line(&mut self.buf)? == 0 {
            return Ok(None);
        }
        self.line_no += 1;
        Ok(Some(std::mem::take(&mut self.buf)))
    }

    fn read_header(&mut self) -> Result<Header> {
        let parser = HeaderParser::new();
        let mut lines: Vec<HeaderLine> = Vec::new();

        let chrom_line = loop {
            let line = self.next_line()?.ok_or_else(|| BiometalError::InvalidHeader {
                line: self.line_no,
                msg: "unexpected end of file in header".to_string(),
            })?;
            if line.starts_with("##") {
                let parsed = parser
                    .parse_line(&line, &mut self.warnings)
                    .map_err(|e| e.at_line(self.line_no))?;
                lines.push(parsed);
            } else {
                break line;
            }
        };

        let samples = parse_samples_line(
            &chrom_line,
            self.options.parsed_samples.clone(),
            &mut self.warnings,
        )
        .map_err(|e| e.at_line(self.line_no))?;

        if let Some(next) = self.next_line()? {
            if next.starts_with('#') {
                return Err(BiometalError::InvalidHeader {
                    line: self.line_no,
                    msg: "header line found after the #CHROM line".to_string(),
                });
            }
            self.pending = Some(next);
        }

        let header = Header::with_warnings(lines, samples, &mut self.warnings);
        check_header(&header, &mut self.warnings)?;
        tracing::debug!(
            lines = header.lines().len(),
            samples = header.samples().len(),
            "read VCF header"
        );
        Ok(header)
    }

    /// The parsed header
    pub fn header(&self) -> &Header {
        self.parser.header()
    }

    /// Drain warnings recorded so far
    pub fn take_warnings(&mut self) -> Vec<Warning> {
        self.parser.drain_warnings_into(&mut self.warnings);
        self.warnings.take()
    }

    /// Number of the last line read (1-based)
    pub fn line_number(&self) -> usize {
        self.line_no
    }

    /// Records overlapping `chrom` between `begin` and `end`
    ///
    /// A record is kept when `POS + len(REF) - 1 >= begin` and `POS <= end`.
    /// Missing bounds leave that side open.
    ///
    /// # Errors
    ///
    /// [`BiometalError::IncorrectVcfFile`] unless the reader was opened from a
    /// BGZF file with a `.tbi` index, [`BiometalError::UnknownReference`] for a
    /// sequence absent from the index.
    pub fn fetch(
        &mut self,
        chrom: &str,
        begin: Option<u64>,
        end: Option<u64>,
    ) -> Result<RecordFetch<'_>> {
        self.query(Region::with_bounds(chrom, begin, end))
    }

    /// Records overlapping a samtools-style region (`"20"`, `"20:100"`, `"20:100-200"`)
    pub fn fetch_region(&mut self, region: &str) -> Result<RecordFetch<'_>> {
        self.query(Region::parse(region)?)
    }

    fn query(&mut self, region: Region) -> Result<RecordFetch<'_>> {
        if self.tabix.is_none() {
            self.tabix = Some(self.open_tabix()?);
        }
        let Reader {
            tabix,
            parser,
            warnings,
            ..
        } = self;
        let tabix = tabix.as_mut().ok_or_else(|| BiometalError::IncorrectVcfFile {
            msg: "no tabix handle".to_string(),
        })?;
        Ok(RecordFetch {
            lines: tabix.query(region)?,
            parser,
            warnings,
        })
    }

    fn open_tabix(&self) -> Result<TabixFile<BufReader<File>>> {
        let path = self.path.as_ref().ok_or_else(|| BiometalError::IncorrectVcfFile {
            msg: "fetch requires a BGZF-compressed file opened from a path".to_string(),
        })?;
        let index_path = index_path_for(path);
        if !index_path.exists() {
            return Err(BiometalError::IncorrectVcfFile {
                msg: format!("no tabix index found at {}", index_path.display()),
            });
        }
        let index = TabixIndex::from_path(&index_path)?;
        let reader = BgzfReader::with_cache_capacity(
            BufReader::new(File::open(path)?),
            self.options.block_cache_capacity,
        )?;
        tracing::debug!(index = %index_path.display(), "opened tabix index");
        Ok(TabixFile::new(reader, index))
    }
}

impl Iterator for Reader {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.pending.take() {
                Some(line) => line,
                None => match self.next_line() {
                    Ok(Some(line)) => line,
                    Ok(None) => return None,
                    Err(e) => return Some(Err(e)),
                },
            };
            let parsed = self.parser.parse_line(&line);
            self.parser.drain_warnings_into(&mut self.warnings);
            match parsed {
                Ok(Some(record)) => return Some(Ok(record)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e.at_line(self.line_no))),
            }
        }
    }
}

/// Records produced by [`Reader::fetch`]
pub struct RecordFetch<'a> {
    lines: TabixLines<'a, BufReader<File>>,
    parser: &'a mut RecordParser,
    warnings: &'a mut Warnings,
}

impl<'a> Iterator for RecordFetch<'a> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e)),
            };
            let parsed = self.parser.parse_line(&line);
            self.parser.drain_warnings_into(self.warnings);
            match parsed {
                Ok(Some(record)) => return Some(Ok(record)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
