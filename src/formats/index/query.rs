//! Region queries over a tabix-indexed BGZF file
//!
//! A query names a sequence and optional 1-based inclusive bounds. The index
//! turns it into a short, sorted list of virtual-offset chunks; [`TabixLines`]
//! then scans those chunks and yields only lines overlapping the region.
//!
//! Matching is inclusive on both ends: with bounds `start..=end`, a line is
//! kept when its last base is at or after `start` and its first base is at or
//! before `end`. This is how widely deployed tabix tooling answers VCF
//! queries, and it means `fetch("20", 1110696, ..)` also returns a record at
//! POS 1110696.
//!
//! # Example
//!
//! ```no_run
//! use biometal_vcf::formats::index::TabixFile;
//!
//! # fn main() -> biometal_vcf::Result<()> {
//! let mut file = TabixFile::open("calls.vcf.gz")?;
//! for line in file.fetch_region("20:1,110,696-1,230,236")? {
//!     println!("{}", line?);
//! }
//! # Ok(())
//! # }
//! ```

use crate::error::{BiometalError, Result};
use crate::formats::index::tbi::{
    merge_chunks, region_to_bins, Chunk, TabixIndex, TbiReference, MAX_BIN, MAX_COORDINATE,
};
use crate::formats::vcf::line::{parse_line, VcfLine};
use crate::io::bgzf::{BgzfReader, VirtualOffset};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// A sequence name with optional 1-based inclusive bounds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    /// Sequence name
    pub name: String,
    /// First position, 1-based
    pub start: Option<u64>,
    /// Last position, 1-based inclusive
    pub end: Option<u64>,
}

impl Region {
    /// Whole sequence
    pub fn new(name: impl Into<String>) -> Self {
        Region {
            name: name.into(),
            start: None,
            end: None,
        }
    }

    /// Sequence with bounds
    pub fn with_bounds(name: impl Into<String>, start: Option<u64>, end: Option<u64>) -> Self {
        Region {
            name: name.into(),
            start,
            end,
        }
    }

    /// Parse a samtools-style region: `seq`, `seq:start` or `seq:start-end`
    ///
    /// Commas in numbers are ignored.
    ///
    /// ```
    /// use biometal_vcf::formats::index::Region;
    ///
    /// let region = Region::parse("chr1:1,000-2,000").unwrap();
    /// assert_eq!(region.name, "chr1");
    /// assert_eq!((region.start, region.end), (Some(1000), Some(2000)));
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let Some((name, span)) = s.split_once(':') else {
            if s.is_empty() {
                return Err(BiometalError::invalid_query("empty region"));
            }
            return Ok(Region::new(s));
        };

        if name.is_empty() {
            return Err(BiometalError::invalid_query(format!(
                "region '{}' has no sequence name",
                s
            )));
        }

        let (start, end) = match span.split_once('-') {
            Some((start, end)) => (parse_position(start, s)?, Some(parse_position(end, s)?)),
            None => (parse_position(span, s)?, None),
        };

        Ok(Region::with_bounds(name, Some(start), end))
    }

    /// Resolve fetch arguments into a region
    ///
    /// Either `region` or `reference` (with optional bounds) may be given,
    /// never both; bounds without a reference are rejected.
    pub fn from_query(
        reference: Option<&str>,
        start: Option<u64>,
        end: Option<u64>,
        region: Option<&str>,
    ) -> Result<Self> {
        match (reference, region) {
            (Some(_), Some(_)) => Err(BiometalError::invalid_query(
                "cannot specify both region and reference/start/end",
            )),
            (None, Some(_)) | (None, None) if start.is_some() || end.is_some() => Err(
                BiometalError::invalid_query("start or end given without a reference"),
            ),
            (None, Some(region)) => Region::parse(region),
            (Some(reference), None) => Ok(Region::with_bounds(reference, start, end)),
            (None, None) => Err(BiometalError::invalid_query(
                "either a reference or a region is required",
            )),
        }
    }

    /// Whether any bound is set
    pub fn is_bounded(&self) -> bool {
        self.start.is_some() || self.end.is_some()
    }

    /// Inclusive-both-ends overlap test against a record span
    pub fn overlaps(&self, begin: u64, end: u64) -> bool {
        if matches!(self.start, Some(start) if end < start) {
            return false;
        }
        !matches!(self.end, Some(stop) if begin > stop)
    }

    /// 0-based half-open span used to pick candidate bins
    fn bin_span(&self) -> (u64, u64) {
        let begin = self.start.map_or(0, |s| s.saturating_sub(1));
        let end = self.end.unwrap_or(MAX_COORDINATE);
        (begin, end)
    }
}

impl FromStr for Region {
    type Err = BiometalError;

    fn from_str(s: &str) -> Result<Self> {
        Region::parse(s)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(start) = self.start {
            write!(f, ":{}", start)?;
            if let Some(end) = self.end {
                write!(f, "-{}", end)?;
            }
        }
        Ok(())
    }
}

fn parse_position(text: &str, region: &str) -> Result<u64> {
    text.replace(',', "").trim().parse().map_err(|_| {
        BiometalError::invalid_query(format!("bad position '{}' in region '{}'", text, region))
    })
}

/// Chunks to scan for a region of one sequence, sorted and merged
///
/// Unbounded regions take every real chunk of the sequence. Bounded regions
/// take the chunks of all candidate bins, drop those ending before the
/// linear-index floor of the first tile (keeping everything when the tile is
/// past the end of the linear index), then merge.
pub fn select_chunks(reference: &TbiReference, region: &Region) -> Vec<Chunk> {
    let mut chunks: Vec<Chunk> = Vec::new();

    if !region.is_bounded() {
        let mut bins: Vec<_> = reference
            .bins()
            .iter()
            .filter(|b| b.bin_id <= MAX_BIN)
            .collect();
        bins.sort_by(|a, b| b.bin_id.cmp(&a.bin_id));
        chunks.extend(
            bins.iter()
                .flat_map(|b| b.chunks.iter())
                .filter(|c| !c.is_placeholder()),
        );
    } else {
        let (begin, end) = region.bin_span();
        for bin_id in region_to_bins(begin, end) {
            if let Some(bin) = reference.bin(bin_id) {
                chunks.extend(bin.chunks.iter().filter(|c| !c.is_placeholder()));
            }
        }

        if let Some(floor) = reference.min_offset(begin) {
            chunks.retain(|c| c.end >= floor);
        }
    }

    chunks.sort_by_key(|c| c.start);
    merge_chunks(&chunks)
}

impl TabixIndex {
    /// Chunks to scan for a sequence and optional 1-based inclusive bounds
    ///
    /// # Errors
    ///
    /// [`BiometalError::UnknownReference`] if the sequence is not indexed.
    pub fn query(&self, name: &str, start: Option<u64>, end: Option<u64>) -> Result<Vec<Chunk>> {
        let reference = self
            .get_reference(name)
            .ok_or_else(|| BiometalError::UnknownReference {
                name: name.to_string(),
            })?;
        Ok(select_chunks(
            reference,
            &Region::with_bounds(name, start, end),
        ))
    }
}

/// A BGZF file together with its tabix index
pub struct TabixFile<R> {
    reader: BgzfReader<R>,
    index: TabixIndex,
}

impl TabixFile<BufReader<File>> {
    /// Open `path` with its index at `path.tbi`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut index_path = path.as_os_str().to_owned();
        index_path.push(".tbi");
        Self::open_with_index(path, PathBuf::from(index_path))
    }

    /// Open `path` with an explicit index path
    pub fn open_with_index<P: AsRef<Path>, Q: AsRef<Path>>(path: P, index_path: Q) -> Result<Self> {
        let index = TabixIndex::from_path(index_path)?;
        let reader = BgzfReader::from_path(path)?;
        Ok(Self::new(reader, index))
    }
}

impl<R: Read + Seek> TabixFile<R> {
    /// Pair a reader with an index
    pub fn new(reader: BgzfReader<R>, index: TabixIndex) -> Self {
        TabixFile { reader, index }
    }

    /// The index
    pub fn index(&self) -> &TabixIndex {
        &self.index
    }

    /// Lines overlapping `reference` and optional 1-based inclusive bounds
    pub fn fetch(
        &mut self,
        reference: &str,
        start: Option<u64>,
        end: Option<u64>,
    ) -> Result<TabixLines<'_, R>> {
        self.query(Region::with_bounds(reference, start, end))
    }

    /// Lines overlapping a samtools-style region string
    pub fn fetch_region(&mut self, region: &str) -> Result<TabixLines<'_, R>> {
        self.query(Region::parse(region)?)
    }

    /// Lines overlapping a region
    ///
    /// # Errors
    ///
    /// [`BiometalError::UnknownReference`] if the sequence is not indexed.
    pub fn query(&mut self, region: Region) -> Result<TabixLines<'_, R>> {
        let reference = self
            .index
            .get_reference(&region.name)
            .ok_or_else(|| BiometalError::UnknownReference {
                name: region.name.clone(),
            })?;
        let chunks = select_chunks(reference, &region);
        let position = self.index.sequence_position(&region.name).unwrap_or(0);

        tracing::debug!(
            region = %region,
            chunks = chunks.len(),
            "tabix query"
        );

        Ok(TabixLines {
            file: self,
            region,
            position,
            chunks: chunks.into_iter(),
            chunk_end: None,
            buf: Vec::new(),
            finished: false,
        })
    }

    /// Parsed lines overlapping a region, in the intermediate line form
    pub fn fetch_vcf_lines(
        &mut self,
        reference: &str,
        start: Option<u64>,
        end: Option<u64>,
    ) -> Result<impl Iterator<Item = Result<VcfLine>> + '_> {
        let lines = self.fetch(reference, start, end)?;
        Ok(lines.map(|line| line.and_then(|text| parse_line(&text))))
    }

    /// Decompressed bytes in `[start, end)`
    pub fn fetch_bytes_virtual(
        &mut self,
        start: VirtualOffset,
        end: VirtualOffset,
    ) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.reader.seek(start)?;

        loop {
            let here = self.reader.tell();
            if here >= end {
                break;
            }
            let available = self.reader.fill_buf()?;
            if available.is_empty() {
                break;
            }
            let take = if here.block_offset() == end.block_offset() {
                usize::from(end.within_block() - here.within_block()).min(available.len())
            } else {
                available.len()
            };
            out.extend_from_slice(&available[..take]);
            self.reader.consume(take);
        }

        Ok(out)
    }

    /// Release the index and return the BGZF reader
    pub fn into_reader(self) -> BgzfReader<R> {
        self.reader
    }
}

/// Where a candidate line stands relative to the query
enum Verdict {
    Keep,
    Skip,
    Stop,
}

/// Iterator over lines of a [`TabixFile`] overlapping a region
///
/// Lines are yielded without their terminator. Iteration stops early once a
/// line from a later sequence (in index order) or past the region end shows up.
pub struct TabixLines<'a, R> {
    file: &'a mut TabixFile<R>,
    region: Region,
    /// Index-order position of the queried sequence
    position: usize,
    chunks: std::vec::IntoIter<Chunk>,
    chunk_end: Option<VirtualOffset>,
    buf: Vec<u8>,
    finished: bool,
}

impl<'a, R: Read + Seek> TabixLines<'a, R> {
    /// The region being scanned
    pub fn region(&self) -> &Region {
        &self.region
    }

    /// Next raw line inside the current chunk run, loading chunks as needed
    fn next_raw(&mut self) -> Result<Option<String>> {
        loop {
            match self.chunk_end {
                Some(end) if self.file.reader.tell() < end => {}
                _ => match self.chunks.next() {
                    Some(chunk) => {
                        tracing::trace!(chunk = %chunk, "scanning chunk");
                        self.file.reader.seek(chunk.start)?;
                        self.chunk_end = Some(chunk.end);
                        continue;
                    }
                    None => return Ok(None),
                },
            }

            self.buf.clear();
            if self.file.reader.read_line_bytes(&mut self.buf)? == 0 {
                self.chunk_end = None;
                continue;
            }

            let mut line = self.buf.as_slice();
            if let Some(rest) = line.strip_suffix(b"\n") {
                line = rest;
            }
            if let Some(rest) = line.strip_suffix(b"\r") {
                line = rest;
            }
            let text = std::str::from_utf8(line).map_err(|e| BiometalError::InvalidRecord {
                line: 0,
                msg: format!("invalid UTF-8 in indexed line: {}", e),
            })?;
            return Ok(Some(text.to_string()));
        }
    }

    fn verdict(&self, line: &str) -> Verdict {
        let index = &self.file.index;
        let Some((name, begin, end)) = locate(index, line) else {
            tracing::debug!(line, "skipping line without a usable position");
            return Verdict::Skip;
        };

        if name == self.region.name {
            if self.region.overlaps(begin, end) {
                Verdict::Keep
            } else if matches!(self.region.end, Some(stop) if begin > stop) {
                Verdict::Stop
            } else {
                Verdict::Skip
            }
        } else if matches!(index.sequence_position(name), Some(p) if p > self.position) {
            Verdict::Stop
        } else {
            Verdict::Skip
        }
    }
}

impl<'a, R: Read + Seek> Iterator for TabixLines<'a, R> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            let line = match self.next_raw() {
                Ok(Some(line)) => line,
                Ok(None) => {
                    self.finished = true;
                    return None;
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            };

            if line.starts_with(self.file.index.meta_char()) {
                continue;
            }

            match self.verdict(&line) {
                Verdict::Keep => return Some(Ok(line)),
                Verdict::Skip => continue,
                Verdict::Stop => self.finished = true,
            }
        }
        None
    }
}

/// Sequence name and 1-based inclusive span of a data line
///
/// When the index has no separate end column, the span covers the REF
/// allele in column 4.
fn locate<'l>(index: &TabixIndex, line: &'l str) -> Option<(&'l str, u64, u64)> {
    let fields: Vec<&str> = line.split('\t').collect();
    let column = |c: i32| -> Option<&'l str> {
        usize::try_from(c)
            .ok()
            .and_then(|c| c.checked_sub(1))
            .and_then(|c| fields.get(c).copied())
    };

    let name = column(index.col_seq())?;
    let begin: u64 = column(index.col_beg())?.parse().ok()?;
    let end = if index.col_end() == 0 || index.col_end() == index.col_beg() {
        match fields.get(3) {
            Some(reference) => (begin + reference.len() as u64).saturating_sub(1).max(begin),
            None => begin,
        }
    } else {
        column(index.col_end())?.parse().ok()?
    };
    Some((name, begin, end))
}
