//! TBI (Tabix) index format support
//!
//! This module implements reading, writing and building of Tabix index files
//! (.tbi), which enable fast random access to sorted, tab-delimited,
//! BGZF-compressed genomic files.
//!
//! # Format Specification
//!
//! TBI files are gzip-compressed binary indexes with the following structure
//! (all integers little-endian):
//!
//! ## Header
//! - Magic: "TBI\1" (4 bytes)
//! - n_ref: Number of reference sequences (int32)
//! - format: File format (int32: 0=generic, 1=SAM, 2=VCF; upper bits are flags)
//! - col_seq: Column for sequence name (int32, 1-based)
//! - col_beg: Column for start position (int32, 1-based)
//! - col_end: Column for end position (int32, 0 = derive from REF for VCF)
//! - meta: Comment character for header lines (int32)
//! - skip: Number of lines to skip (int32)
//! - l_nm: Length of concatenated sequence names (int32)
//! - names: Sequence names (null-terminated strings)
//!
//! ## Index Data (per reference)
//! - Binning index: n_bin, then per bin a uint32 id, n_chunk and chunk pairs
//! - Linear index: n_intv virtual offsets, one per 16 KiB tile
//!
//! ## Trailer
//! - n_no_coor: optional uint64 count of unplaced records
//!
//! # Binning Scheme
//!
//! UCSC binning, 37,450 bins covering 512 Mbp:
//! - Level 0: 1 bin (512 Mbp)
//! - Level 1: 8 bins (64 Mbp each)
//! - Level 2: 64 bins (8 Mbp each)
//! - Level 3: 512 bins (1 Mbp each)
//! - Level 4: 4096 bins (128 Kbp each)
//! - Level 5: 32768 bins (16 Kbp each)
//!
//! # Example
//!
//! ```no_run
//! use biometal_vcf::formats::index::TabixIndex;
//!
//! # fn main() -> biometal_vcf::Result<()> {
//! let index = TabixIndex::from_path("data.vcf.gz.tbi")?;
//!
//! println!("Format: {:?}", index.format());
//! for name in index.sequence_names() {
//!     println!("{}", name);
//! }
//! # Ok(())
//! # }
//! ```

use crate::error::{BiometalError, Result};
use crate::formats::vcf::line::{parse_line, VcfLine};
use crate::io::bgzf::{BgzfWriter, VirtualOffset};
use crate::io::lines::LineScanner;
use flate2::read::MultiGzDecoder;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// TBI file format magic string
const TBI_MAGIC: &[u8; 4] = b"TBI\x01";

/// Width of a linear-index tile and of the finest bins, as a shift
pub const MIN_SHIFT: u32 = 14;

/// Number of levels below the root bin
pub const DEPTH: u32 = 5;

/// Largest coordinate addressable by the binning scheme
pub const MAX_COORDINATE: u64 = 1 << 29;

/// Largest real bin number; htslib stores metadata in bin 37450
pub const MAX_BIN: u32 = 37449;

/// Low bits of the format field carry the format code
const FORMAT_MASK: i32 = 0xFFFF;

/// File format types recognized by tabix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TbiFormat {
    /// Generic tab-delimited file
    Generic = 0,
    /// SAM format
    Sam = 1,
    /// VCF format
    Vcf = 2,
}

impl TbiFormat {
    /// Parse format from integer
    fn from_i32(value: i32) -> Result<Self> {
        match value {
            0 => Ok(TbiFormat::Generic),
            1 => Ok(TbiFormat::Sam),
            2 => Ok(TbiFormat::Vcf),
            _ => Err(BiometalError::invalid_index(format!(
                "unknown format code {}",
                value
            ))),
        }
    }
}

/// A contiguous virtual-offset range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Chunk {
    /// First byte of the range
    pub start: VirtualOffset,
    /// One past the last byte of the range
    pub end: VirtualOffset,
}

impl Chunk {
    /// Create a chunk
    pub fn new(start: VirtualOffset, end: VirtualOffset) -> Self {
        Chunk { start, end }
    }

    /// Chunks ending at virtual offset 0 carry no data
    pub fn is_placeholder(&self) -> bool {
        self.end.as_raw() == 0
    }
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// A bin in the hierarchical binning index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TbiBin {
    /// Bin number (0-37449)
    pub bin_id: u32,
    /// Chunks of data in this bin
    pub chunks: Vec<Chunk>,
}

impl TbiBin {
    /// Create a new bin
    pub fn new(bin_id: u32) -> Self {
        TbiBin {
            bin_id,
            chunks: Vec::new(),
        }
    }
}

/// Per-sequence index data
///
/// Bins keep their on-disk (or first-seen) order; lookups by bin number go
/// through a side table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TbiReference {
    name: String,
    bins: Vec<TbiBin>,
    intervals: Vec<VirtualOffset>,
    bin_lookup: HashMap<u32, usize>,
}

impl TbiReference {
    /// Create an empty reference
    pub fn new(name: impl Into<String>) -> Self {
        TbiReference {
            name: name.into(),
            bins: Vec::new(),
            intervals: Vec::new(),
            bin_lookup: HashMap::new(),
        }
    }

    /// Sequence name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bins in index order
    pub fn bins(&self) -> &[TbiBin] {
        &self.bins
    }

    /// Linear index: one virtual offset per 16 KiB tile
    pub fn intervals(&self) -> &[VirtualOffset] {
        &self.intervals
    }

    /// Bin by number
    pub fn bin(&self, bin_id: u32) -> Option<&TbiBin> {
        self.bin_lookup.get(&bin_id).map(|&i| &self.bins[i])
    }

    /// Linear-index floor for a 0-based position
    ///
    /// `None` when the tile lies beyond the end of the linear index.
    pub fn min_offset(&self, pos: u64) -> Option<VirtualOffset> {
        let tile = (pos >> MIN_SHIFT) as usize;
        self.intervals.get(tile).copied()
    }

    fn push_bin(&mut self, bin: TbiBin) -> Result<()> {
        if self.bin_lookup.contains_key(&bin.bin_id) {
            return Err(BiometalError::invalid_index(format!(
                "duplicate bin {} for sequence '{}'",
                bin.bin_id, self.name
            )));
        }
        self.bin_lookup.insert(bin.bin_id, self.bins.len());
        self.bins.push(bin);
        Ok(())
    }

    /// Place one record spanning `[start, end]` (0-based, inclusive)
    fn add_record(&mut self, chunk: Chunk, start: u64, end: u64) {
        let bin_id = region_to_bin(start, end);
        let slot = match self.bin_lookup.get(&bin_id) {
            Some(&slot) => slot,
            None => {
                self.bin_lookup.insert(bin_id, self.bins.len());
                self.bins.push(TbiBin::new(bin_id));
                self.bins.len() - 1
            }
        };

        let chunks = &mut self.bins[slot].chunks;
        match chunks.last_mut() {
            Some(last) if last.end == chunk.start => last.end = chunk.end,
            _ => chunks.push(chunk),
        }

        let last_tile = (end >> MIN_SHIFT) as usize;
        while self.intervals.len() <= last_tile {
            self.intervals.push(chunk.start);
        }
    }
}

/// Tabix index
///
/// Immutable once read or built. Sequences keep index order, which is also
/// the order records appear in the indexed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabixIndex {
    /// File format type
    format: TbiFormat,
    /// Upper bits of the on-disk format field
    format_flags: i32,
    /// Column for sequence name (1-based)
    col_seq: i32,
    /// Column for start position (1-based)
    col_beg: i32,
    /// Column for end position (1-based, 0 to derive)
    col_end: i32,
    /// Comment character for header lines
    meta: u8,
    /// Number of header lines to skip
    skip_lines: i32,
    /// Reference sequences
    references: Vec<TbiReference>,
    /// Reference name to index mapping
    ref_map: HashMap<String, usize>,
    /// Unplaced record count, when the file carries one
    n_no_coor: Option<u64>,
}

impl TabixIndex {
    /// Empty VCF-flavoured index: columns 1/2/0, `#` comments, no skipped lines
    fn empty_vcf() -> Self {
        TabixIndex {
            format: TbiFormat::Vcf,
            format_flags: 0,
            col_seq: 1,
            col_beg: 2,
            col_end: 0,
            meta: b'#',
            skip_lines: 0,
            references: Vec::new(),
            ref_map: HashMap::new(),
            n_no_coor: None,
        }
    }

    /// Load TBI index from a file
    ///
    /// Both gzip/BGZF-compressed and raw index files are accepted.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use biometal_vcf::formats::index::TabixIndex;
    ///
    /// # fn main() -> biometal_vcf::Result<()> {
    /// let index = TabixIndex::from_path("data.vcf.gz.tbi")?;
    /// println!("Loaded {} references", index.references().len());
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(BufReader::new(file))
    }

    /// Load TBI index from any reader, detecting gzip by its magic bytes
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut raw = Vec::new();
        reader.read_to_end(&mut raw)?;

        if raw.starts_with(&[0x1f, 0x8b]) {
            // BGZF is a series of gzip members
            let mut data = Vec::new();
            MultiGzDecoder::new(raw.as_slice()).read_to_end(&mut data)?;
            Self::from_bytes(&data)
        } else {
            Self::from_bytes(&raw)
        }
    }

    /// Parse an uncompressed TBI image
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut reader = data;

        let mut magic = [0u8; 4];
        read_exact(&mut reader, &mut magic, "magic")?;
        if &magic != TBI_MAGIC {
            return Err(BiometalError::InvalidMagic {
                context: format!(
                    "expected tabix magic {:?}, got {:?}",
                    TBI_MAGIC, magic
                ),
            });
        }

        // Read header fields
        let n_ref = read_count(&mut reader, "n_ref")?;
        let format_field = read_i32(&mut reader, "format")?;
        let format = TbiFormat::from_i32(format_field & FORMAT_MASK)?;
        let col_seq = read_i32(&mut reader, "col_seq")?;
        let col_beg = read_i32(&mut reader, "col_beg")?;
        let col_end = read_i32(&mut reader, "col_end")?;
        let meta = read_i32(&mut reader, "meta")?;
        let skip = read_i32(&mut reader, "skip")?;
        let l_nm = read_count(&mut reader, "l_nm")?;

        if col_seq < 1 || col_beg < 1 || col_end < 0 {
            return Err(BiometalError::invalid_index(format!(
                "bad column numbers seq={} beg={} end={}",
                col_seq, col_beg, col_end
            )));
        }
        let meta = u8::try_from(meta).map_err(|_| {
            BiometalError::invalid_index(format!("unknown comment marker {}", meta))
        })?;

        // Read sequence names
        let mut names_buf = vec![0u8; l_nm];
        read_exact(&mut reader, &mut names_buf, "sequence names")?;
        let names = parse_sequence_names(&names_buf)?;

        if names.len() != n_ref {
            return Err(BiometalError::invalid_index(format!(
                "header claims {} references but got {} names",
                n_ref,
                names.len()
            )));
        }

        // Parse index data for each reference
        let mut references = Vec::with_capacity(n_ref);
        let mut ref_map = HashMap::with_capacity(n_ref);

        for (idx, name) in names.into_iter().enumerate() {
            let mut reference = TbiReference::new(name.clone());

            // Read binning index
            let n_bin = read_count(&mut reader, "n_bin")?;
            for _ in 0..n_bin {
                let bin_id = read_u32(&mut reader, "bin number")?;
                let n_chunk = read_count(&mut reader, "n_chunk")?;

                let mut bin = TbiBin::new(bin_id);
                for _ in 0..n_chunk {
                    let beg = read_u64(&mut reader, "chunk start")?;
                    let end = read_u64(&mut reader, "chunk end")?;
                    bin.chunks.push(Chunk::new(
                        VirtualOffset::from_raw(beg),
                        VirtualOffset::from_raw(end),
                    ));
                }
                reference.push_bin(bin)?;
            }

            // Read linear index
            let n_intv = read_count(&mut reader, "n_intv")?;
            reference.intervals.reserve(n_intv);
            for _ in 0..n_intv {
                let ioff = read_u64(&mut reader, "linear index")?;
                reference.intervals.push(VirtualOffset::from_raw(ioff));
            }

            if ref_map.insert(name.clone(), idx).is_some() {
                return Err(BiometalError::invalid_index(format!(
                    "duplicate sequence name '{}'",
                    name
                )));
            }
            references.push(reference);
        }

        // Some writers stop here
        let n_no_coor = if reader.len() >= 8 {
            Some(read_u64(&mut reader, "n_no_coor")?)
        } else {
            None
        };

        Ok(TabixIndex {
            format,
            format_flags: format_field & !FORMAT_MASK,
            col_seq,
            col_beg,
            col_end,
            meta,
            skip_lines: skip,
            references,
            ref_map,
            n_no_coor,
        })
    }

    /// Build an index by scanning a BGZF-compressed VCF from its first block
    ///
    /// Comment and meta lines are skipped. Each data line is placed in the
    /// smallest bin containing `[POS-1, POS-1+len(REF)-1]`; consecutive lines
    /// in the same bin share one chunk. Sequences appear in first-seen order.
    /// Lines with CHROM `.` or `*` are not indexed and are counted in
    /// [`n_no_coor`](TabixIndex::n_no_coor).
    pub fn build_from<R: Read>(source: R) -> Result<Self> {
        let mut index = Self::empty_vcf();
        let mut current: Option<usize> = None;
        let mut records = 0usize;
        let mut unplaced = 0u64;

        for (line_no, line) in LineScanner::new(source).enumerate() {
            let line = line?;
            let text = std::str::from_utf8(line.trimmed()).map_err(|e| {
                BiometalError::InvalidRecord {
                    line: line_no + 1,
                    msg: format!("invalid UTF-8: {}", e),
                }
            })?;
            if text.is_empty() {
                continue;
            }

            let data = match parse_line(text).map_err(|e| e.at_line(line_no + 1))? {
                VcfLine::Data(data) => data,
                _ => continue,
            };
            if data.chrom == "." || data.chrom == "*" {
                unplaced += 1;
                continue;
            }

            let slot = match current {
                Some(slot) if index.references[slot].name == data.chrom => slot,
                _ => index.reference_slot(&data.chrom),
            };
            current = Some(slot);

            let start = data.pos.saturating_sub(1);
            let end = (start + data.reference.len() as u64)
                .saturating_sub(1)
                .max(start);
            index.references[slot].add_record(Chunk::new(line.start, line.end), start, end);
            records += 1;
        }

        index.n_no_coor = Some(unplaced);
        tracing::debug!(
            sequences = index.references.len(),
            records,
            unplaced,
            "built tabix index"
        );
        Ok(index)
    }

    /// Build an index for a BGZF-compressed VCF on disk
    pub fn build_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::build_from(BufReader::new(file))
    }

    fn reference_slot(&mut self, name: &str) -> usize {
        if let Some(&slot) = self.ref_map.get(name) {
            return slot;
        }
        let slot = self.references.len();
        self.references.push(TbiReference::new(name));
        self.ref_map.insert(name.to_string(), slot);
        slot
    }

    /// Serialize the uncompressed index image
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        let names: Vec<u8> = self
            .references
            .iter()
            .flat_map(|r| r.name.as_bytes().iter().copied().chain(std::iter::once(0)))
            .collect();

        writer.write_all(TBI_MAGIC)?;
        write_len(writer, self.references.len())?;
        writer.write_all(&(self.format as i32 | self.format_flags).to_le_bytes())?;
        writer.write_all(&self.col_seq.to_le_bytes())?;
        writer.write_all(&self.col_beg.to_le_bytes())?;
        writer.write_all(&self.col_end.to_le_bytes())?;
        writer.write_all(&i32::from(self.meta).to_le_bytes())?;
        writer.write_all(&self.skip_lines.to_le_bytes())?;
        write_len(writer, names.len())?;
        writer.write_all(&names)?;

        for reference in &self.references {
            write_len(writer, reference.bins.len())?;
            for bin in &reference.bins {
                writer.write_all(&bin.bin_id.to_le_bytes())?;
                write_len(writer, bin.chunks.len())?;
                for chunk in &bin.chunks {
                    writer.write_all(&chunk.start.as_raw().to_le_bytes())?;
                    writer.write_all(&chunk.end.as_raw().to_le_bytes())?;
                }
            }

            write_len(writer, reference.intervals.len())?;
            for ioff in &reference.intervals {
                writer.write_all(&ioff.as_raw().to_le_bytes())?;
            }
        }

        if let Some(n) = self.n_no_coor {
            writer.write_all(&n.to_le_bytes())?;
        }
        Ok(())
    }

    /// Uncompressed index image
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_to(&mut out)?;
        Ok(out)
    }

    /// Write the index BGZF-compressed, as tabix does
    pub fn to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())?;
        let mut writer = BgzfWriter::new(BufWriter::new(file));
        self.write_to(&mut writer)?;
        writer.finish()?;
        writer.get_mut().flush()?;
        Ok(())
    }

    /// Get file format type
    pub fn format(&self) -> TbiFormat {
        self.format
    }

    /// Get column for sequence name (1-based)
    pub fn col_seq(&self) -> i32 {
        self.col_seq
    }

    /// Get column for start position (1-based)
    pub fn col_beg(&self) -> i32 {
        self.col_beg
    }

    /// Get column for end position (1-based, 0 to derive from REF)
    pub fn col_end(&self) -> i32 {
        self.col_end
    }

    /// Get comment character
    pub fn meta_char(&self) -> char {
        char::from(self.meta)
    }

    /// Get number of header lines to skip
    pub fn skip_lines(&self) -> i32 {
        self.skip_lines
    }

    /// Unplaced record count, if recorded
    pub fn n_no_coor(&self) -> Option<u64> {
        self.n_no_coor
    }

    /// Get all references
    pub fn references(&self) -> &[TbiReference] {
        &self.references
    }

    /// Sequence names in index order
    pub fn sequence_names(&self) -> Vec<&str> {
        self.references.iter().map(|r| r.name.as_str()).collect()
    }

    /// Position of a sequence in index order
    pub fn sequence_position(&self, name: &str) -> Option<usize> {
        self.ref_map.get(name).copied()
    }

    /// Get reference by name
    pub fn get_reference(&self, name: &str) -> Option<&TbiReference> {
        self.ref_map.get(name).map(|&idx| &self.references[idx])
    }
}

/// Parse null-terminated sequence names from buffer
fn parse_sequence_names(buf: &[u8]) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let mut start = 0;

    for (i, &byte) in buf.iter().enumerate() {
        if byte == 0 {
            if i > start {
                let name = std::str::from_utf8(&buf[start..i])
                    .map_err(|e| {
                        BiometalError::invalid_index(format!(
                            "invalid UTF-8 in sequence name: {}",
                            e
                        ))
                    })?
                    .to_string();
                names.push(name);
            }
            start = i + 1;
        }
    }

    Ok(names)
}

/// Bins that may hold records overlapping `[begin, end)`
///
/// Six levels, finest last in the walk; the result is reversed so that the
/// finest bins come first and the root bin 0 last.
pub fn region_to_bins(begin: u64, end: u64) -> Vec<u32> {
    let end = end.min(MAX_COORDINATE).saturating_sub(1);
    let begin = begin.min(end);

    let mut bins = Vec::new();
    let mut offset = 0u64;
    let mut shift = MIN_SHIFT + 3 * DEPTH;
    for level in 0..=DEPTH {
        for bin in (offset + (begin >> shift))..=(offset + (end >> shift)) {
            bins.push(bin as u32);
        }
        offset += 1 << (3 * level);
        shift -= 3;
    }
    bins.reverse();
    bins
}

/// Smallest bin fully containing `[begin, end]` (0-based, inclusive end)
pub fn region_to_bin(begin: u64, end: u64) -> u32 {
    let bin = if begin >> 14 == end >> 14 {
        ((1 << 15) - 1) / 7 + (begin >> 14)
    } else if begin >> 17 == end >> 17 {
        ((1 << 12) - 1) / 7 + (begin >> 17)
    } else if begin >> 20 == end >> 20 {
        ((1 << 9) - 1) / 7 + (begin >> 20)
    } else if begin >> 23 == end >> 23 {
        ((1 << 6) - 1) / 7 + (begin >> 23)
    } else if begin >> 26 == end >> 26 {
        ((1 << 3) - 1) / 7 + (begin >> 26)
    } else {
        0
    };
    bin as u32
}

/// Level of a bin: 0 for the root, 5 for 16 KiB bins
///
/// `None` for ids past [`MAX_BIN`], such as the 37450 pseudo-bin.
pub fn bin_level(bin: u32) -> Option<u32> {
    if bin > MAX_BIN {
        return None;
    }
    let x = 7 * u64::from(bin) + 1;
    Some((63 - x.leading_zeros()) / 3)
}

/// First 0-based position covered by a bin
pub fn bin_start(bin: u32) -> Option<u64> {
    let level = bin_level(bin)?;
    let first = ((1u64 << (3 * level)) - 1) / 7;
    Some((u64::from(bin) - first) * bin_size(bin)?)
}

/// Number of positions covered by a bin
pub fn bin_size(bin: u32) -> Option<u64> {
    Some(1u64 << (29 - 3 * bin_level(bin)?))
}

/// Merge chunks that overlap or touch; input must be sorted by start
pub fn merge_chunks(chunks: &[Chunk]) -> Vec<Chunk> {
    let mut merged: Vec<Chunk> = Vec::with_capacity(chunks.len());

    for chunk in chunks {
        match merged.last_mut() {
            Some(current) if chunk.start <= current.end => {
                if chunk.end > current.end {
                    current.end = chunk.end;
                }
            }
            _ => merged.push(*chunk),
        }
    }

    merged
}

// Helper functions for reading binary data (little-endian)

fn read_exact(reader: &mut &[u8], buf: &mut [u8], what: &str) -> Result<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => {
            BiometalError::truncated(format!("tabix index ended inside {}", what))
        }
        _ => BiometalError::Io(e),
    })
}

fn read_i32(reader: &mut &[u8], what: &str) -> Result<i32> {
    let mut buf = [0u8; 4];
    read_exact(reader, &mut buf, what)?;
    Ok(i32::from_le_bytes(buf))
}

fn read_u32(reader: &mut &[u8], what: &str) -> Result<u32> {
    let mut buf = [0u8; 4];
    read_exact(reader, &mut buf, what)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(reader: &mut &[u8], what: &str) -> Result<u64> {
    let mut buf = [0u8; 8];
    read_exact(reader, &mut buf, what)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_count(reader: &mut &[u8], what: &str) -> Result<usize> {
    let value = read_i32(reader, what)?;
    usize::try_from(value)
        .map_err(|_| BiometalError::invalid_index(format!("negative {}: {}", what, value)))
}

fn write_len<W: Write>(writer: &mut W, len: usize) -> Result<()> {
    let len = i32::try_from(len)
        .map_err(|_| BiometalError::invalid_index(format!("count {} overflows int32", len)))?;
    writer.write_all(&len.to_le_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::bgzf::write_block;

    fn vo(raw: u64) -> VirtualOffset {
        VirtualOffset::from_raw(raw)
    }

    fn bgzf_text(blocks: &[&str]) -> Vec<u8> {
        let mut out = Vec::new();
        for block in blocks {
            write_block(&mut out, block.as_bytes()).unwrap();
        }
        crate::io::bgzf::write_eof_marker(&mut out).unwrap();
        out
    }

    #[test]
    fn test_region_to_bins_first_tile() {
        assert_eq!(region_to_bins(0, 1), vec![4681, 585, 73, 9, 1, 0]);
    }

    #[test]
    fn test_region_to_bins_spanning_tiles() {
        let bins = region_to_bins(16000, 17000);
        assert!(bins.contains(&4681));
        assert!(bins.contains(&4682));
        assert_eq!(*bins.last().unwrap(), 0);
        for pair in bins.windows(2) {
            assert!(pair[0] > pair[1]);
        }
    }

    #[test]
    fn test_region_to_bins_clamps_end() {
        let bins = region_to_bins(0, u64::MAX);
        assert_eq!(bins.iter().filter(|&&b| b >= 4681).count(), 32768);
        assert!(bins.iter().all(|&b| b <= MAX_BIN));
    }

    #[test]
    fn test_region_to_bin() {
        assert_eq!(region_to_bin(0, 0), 4681);
        assert_eq!(region_to_bin(16384, 16384), 4682);
        assert_eq!(region_to_bin(0, 16384), 585);
        assert_eq!(region_to_bin(0, (1 << 26) - 1), 1);
        assert_eq!(region_to_bin(0, 1 << 26), 0);
    }

    #[test]
    fn test_bin_geometry() {
        assert_eq!(bin_level(0), Some(0));
        assert_eq!(bin_level(1), Some(1));
        assert_eq!(bin_level(585), Some(4));
        assert_eq!(bin_level(4681), Some(5));
        assert_eq!(bin_level(MAX_BIN), Some(5));
        assert_eq!(bin_size(0), Some(1 << 29));
        assert_eq!(bin_size(4681), Some(16384));
        assert_eq!(bin_start(4681), Some(0));
        assert_eq!(bin_start(4682), Some(16384));
        assert_eq!(bin_start(2), Some(1 << 26));
    }

    #[test]
    fn test_bin_geometry_out_of_range() {
        for bin in [MAX_BIN + 1, 37450, 299593, u32::MAX] {
            assert_eq!(bin_level(bin), None);
            assert_eq!(bin_start(bin), None);
            assert_eq!(bin_size(bin), None);
        }
    }

    #[test]
    fn test_parse_sequence_names() {
        let buf = b"chr1\0chr2\0chr3\0";
        let names = parse_sequence_names(buf).unwrap();
        assert_eq!(names, vec!["chr1", "chr2", "chr3"]);
    }

    #[test]
    fn test_merge_chunks() {
        let chunks = vec![
            Chunk::new(vo(100), vo(200)),
            Chunk::new(vo(150), vo(250)),
            Chunk::new(vo(250), vo(260)),
            Chunk::new(vo(300), vo(400)),
        ];

        let merged = merge_chunks(&chunks);
        assert_eq!(
            merged,
            vec![Chunk::new(vo(100), vo(260)), Chunk::new(vo(300), vo(400))]
        );
    }

    #[test]
    fn test_tbi_format_conversion() {
        assert_eq!(TbiFormat::from_i32(0).unwrap(), TbiFormat::Generic);
        assert_eq!(TbiFormat::from_i32(1).unwrap(), TbiFormat::Sam);
        assert_eq!(TbiFormat::from_i32(2).unwrap(), TbiFormat::Vcf);
        assert!(TbiFormat::from_i32(99).is_err());
    }

    #[test]
    fn test_build_merges_contiguous_chunks() {
        let data = bgzf_text(&[
            "##fileformat=VCFv4.3\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n",
            "1\t100\t.\tA\tC\t.\t.\t.\n1\t200\t.\tA\tG\t.\t.\t.\n2\t50\t.\tAT\tA\t.\t.\t.\n",
        ]);
        let index = TabixIndex::build_from(data.as_slice()).unwrap();

        assert_eq!(index.format(), TbiFormat::Vcf);
        assert_eq!(index.sequence_names(), vec!["1", "2"]);
        assert_eq!((index.col_seq(), index.col_beg(), index.col_end()), (1, 2, 0));
        assert_eq!(index.meta_char(), '#');

        let chr1 = index.get_reference("1").unwrap();
        assert_eq!(chr1.bins().len(), 1);
        let bin = chr1.bin(4681).unwrap();
        assert_eq!(bin.chunks.len(), 1);
        assert_eq!(chr1.intervals().len(), 1);
        assert_eq!(chr1.intervals()[0], bin.chunks[0].start);

        let chr2 = index.get_reference("2").unwrap();
        assert_eq!(chr2.bin(4681).unwrap().chunks[0].start, bin.chunks[0].end);
    }

    #[test]
    fn test_build_pads_linear_index() {
        let data = bgzf_text(&["1\t40000\t.\tA\tC\t.\t.\t.\n"]);
        let index = TabixIndex::build_from(data.as_slice()).unwrap();
        let chr1 = index.get_reference("1").unwrap();
        // 39999 >> 14 == 2
        assert_eq!(chr1.intervals().len(), 3);
        assert!(chr1.intervals().iter().all(|&o| o == vo(0)));
        assert_eq!(chr1.min_offset(39999), Some(vo(0)));
        assert_eq!(chr1.min_offset(1 << 20), None);
    }

    #[test]
    fn test_round_trip_bytes() {
        let data = bgzf_text(&["a\t1\t.\tA\tC\t.\t.\t.\nb\t70000\t.\tACGT\tA\t.\t.\t.\n"]);
        let index = TabixIndex::build_from(data.as_slice()).unwrap();
        let bytes = index.to_bytes().unwrap();
        assert_eq!(&bytes[..4], b"TBI\x01");
        assert_eq!(TabixIndex::from_bytes(&bytes).unwrap(), index);
    }

    #[test]
    fn test_invalid_magic() {
        let result = TabixIndex::from_bytes(b"BAI\x01\0\0\0\0");
        assert!(matches!(result, Err(BiometalError::InvalidMagic { .. })));
    }

    #[test]
    fn test_truncated_header() {
        let result = TabixIndex::from_bytes(b"TBI\x01\x01\0");
        assert!(matches!(result, Err(BiometalError::Truncated { .. })));
    }

    #[test]
    fn test_n_no_coor_round_trip() {
        let data = bgzf_text(&[
            "x\t5\t.\tG\tT\t.\t.\t.\n",
            ".\t0\t.\tG\tT\t.\t.\t.\n",
            "*\t0\t.\tA\tC\t.\t.\t.\n",
        ]);
        let index = TabixIndex::build_from(data.as_slice()).unwrap();
        assert_eq!(index.sequence_names(), vec!["x"]);
        assert_eq!(index.n_no_coor(), Some(2));

        let bytes = index.to_bytes().unwrap();
        assert!(bytes.ends_with(&2u64.to_le_bytes()));
        let parsed = TabixIndex::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.n_no_coor(), Some(2));
        assert_eq!(parsed.to_bytes().unwrap(), bytes);

        // Indexes written without the trailing count still load
        let short = TabixIndex::from_bytes(&bytes[..bytes.len() - 8]).unwrap();
        assert_eq!(short.n_no_coor(), None);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(256))]

            #[test]
            fn prop_single_bin_is_candidate(begin in 0u64..(1 << 29) - 1, len in 1u64..(1 << 20)) {
                let end = (begin + len - 1).min((1 << 29) - 1);
                let bin = region_to_bin(begin, end);
                prop_assert!(region_to_bins(begin, end + 1).contains(&bin));
            }

            #[test]
            fn prop_bin_contains_region(begin in 0u64..(1 << 29) - 1, len in 1u64..(1 << 20)) {
                let end = (begin + len - 1).min((1 << 29) - 1);
                let bin = region_to_bin(begin, end);
                let start = bin_start(bin).unwrap();
                prop_assert!(start <= begin);
                prop_assert!(end < start + bin_size(bin).unwrap());
            }
        }
    }
}
