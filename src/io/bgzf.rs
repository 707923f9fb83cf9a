//! BGZF block codec with virtual-offset random access
//!
//! BGZF (Blocked GNU Zip Format) is a series of independent gzip members, each
//! carrying a "BC" extra subfield that records the member's size on disk. Any
//! block can be decompressed on its own, which together with 64-bit virtual
//! offsets gives random access into the uncompressed stream.
//!
//! # Block Structure
//!
//! ```text
//! ID1=31 ID2=139 CM=8 FLG=4 MTIME(4) XFL OS      12 bytes
//! XLEN(2) then XLEN bytes of extra subfields     "BC", SLEN=2, BSIZE(2)
//! raw DEFLATE payload                            BSIZE + 1 - (12 + XLEN) - 8 bytes
//! CRC32(4) ISIZE(4)                              8 bytes
//! ```
//!
//! BSIZE is the total block size minus one. A stream ends with the fixed
//! 28-byte empty block ([`BGZF_EOF_MARKER`]).
//!
//! # Virtual Offsets
//!
//! - High 48 bits: file offset of the block start
//! - Low 16 bits: byte offset inside the decompressed block
//!
//! # Example
//!
//! ```no_run
//! use biometal_vcf::io::bgzf::{BgzfReader, VirtualOffset};
//! use std::io::BufRead;
//!
//! # fn main() -> biometal_vcf::Result<()> {
//! let mut reader = BgzfReader::from_path("variants.vcf.gz")?;
//! let start = reader.tell();
//!
//! let mut line = Vec::new();
//! reader.read_line_bytes(&mut line)?;
//!
//! // Jump back to where we started
//! reader.seek(start)?;
//! # Ok(())
//! # }
//! ```

use crate::error::{BiometalError, Result};
use bytes::Bytes;
use flate2::write::DeflateEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};
use lru::LruCache;
use rayon::prelude::*;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::num::NonZeroUsize;
use std::path::Path;

/// Largest decompressed payload a single block may carry
pub const MAX_BLOCK_CONTENT: usize = 65536;

/// Content size the writer packs into each block
///
/// Slightly below [`MAX_BLOCK_CONTENT`] so incompressible data still fits the
/// 16-bit BSIZE field once framed.
pub const DEFAULT_BLOCK_CONTENT: usize = 65536 - 256;

/// Default number of decompressed blocks kept by [`BgzfReader`]
pub const DEFAULT_CACHE_CAPACITY: usize = 100;

/// Number of blocks the writer compresses in one parallel batch
pub const PARALLEL_BLOCK_COUNT: usize = 8;

/// Canonical empty block terminating a BGZF stream
pub const BGZF_EOF_MARKER: [u8; 28] = [
    31, 139, 8, 4, 0, 0, 0, 0, 0, 255, // gzip header
    6, 0, 66, 67, 2, 0, 27, 0, // XLEN=6, "BC", SLEN=2, BSIZE=27
    3, 0, // empty deflate block
    0, 0, 0, 0, // CRC32
    0, 0, 0, 0, // ISIZE
];

/// Fixed gzip prefix before the extra field (ID1 through XLEN)
const GZIP_PREFIX_SIZE: usize = 12;

/// CRC32 + ISIZE
const TRAILER_SIZE: usize = 8;

/// Header bytes our writer emits (prefix + one 6-byte BC subfield)
const WRITER_HEADER_SIZE: usize = 18;

// ============================================================================
// Virtual offsets
// ============================================================================

/// 64-bit BGZF virtual file offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct VirtualOffset(u64);

impl VirtualOffset {
    /// Exclusive upper bound of the block-start component
    pub const MAX_BLOCK_OFFSET: u64 = 1 << 48;

    /// Exclusive upper bound of the within-block component
    pub const MAX_WITHIN_BLOCK: u64 = 1 << 16;

    /// Combine a block start offset and a within-block offset
    ///
    /// # Errors
    ///
    /// Returns [`BiometalError::InvalidVirtualOffset`] if `block >= 2^48` or
    /// `within >= 65536`.
    ///
    /// # Example
    ///
    /// ```
    /// use biometal_vcf::io::bgzf::VirtualOffset;
    ///
    /// let offset = VirtualOffset::new(1024, 512).unwrap();
    /// assert_eq!(offset.split(), (1024, 512));
    /// assert!(VirtualOffset::new(0, 65536).is_err());
    /// ```
    pub fn new(block: u64, within: u64) -> Result<Self> {
        if block >= Self::MAX_BLOCK_OFFSET || within >= Self::MAX_WITHIN_BLOCK {
            return Err(BiometalError::InvalidVirtualOffset { block, within });
        }
        Ok(VirtualOffset((block << 16) | within))
    }

    /// Create from raw 64-bit value
    pub const fn from_raw(value: u64) -> Self {
        VirtualOffset(value)
    }

    /// Raw 64-bit value
    pub const fn as_raw(self) -> u64 {
        self.0
    }

    /// File offset of the block start (high 48 bits)
    pub const fn block_offset(self) -> u64 {
        self.0 >> 16
    }

    /// Offset inside the decompressed block (low 16 bits)
    pub const fn within_block(self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }

    /// Decompose into `(block_offset, within_block)`
    pub const fn split(self) -> (u64, u16) {
        (self.block_offset(), self.within_block())
    }
}

impl fmt::Display for VirtualOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.block_offset(), self.within_block())
    }
}

impl From<u64> for VirtualOffset {
    fn from(value: u64) -> Self {
        VirtualOffset(value)
    }
}

impl From<VirtualOffset> for u64 {
    fn from(offset: VirtualOffset) -> Self {
        offset.0
    }
}

// ============================================================================
// Block codec
// ============================================================================

/// Parsed BGZF block header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    /// gzip FLG byte (FEXTRA always set)
    pub flags: u8,
    /// gzip MTIME
    pub mtime: u32,
    /// gzip XFL
    pub xfl: u8,
    /// gzip OS
    pub os: u8,
    /// Length of the extra field
    pub xlen: u16,
    /// BSIZE from the "BC" subfield (total block size - 1)
    pub bsize: u16,
}

impl BlockHeader {
    /// Bytes occupied by the header including the extra field
    pub fn header_size(&self) -> usize {
        GZIP_PREFIX_SIZE + self.xlen as usize
    }

    /// Total on-disk size of the block
    pub fn block_size(&self) -> usize {
        self.bsize as usize + 1
    }

    /// Size of the raw DEFLATE payload
    pub fn compressed_len(&self) -> Result<usize> {
        self.block_size()
            .checked_sub(self.header_size() + TRAILER_SIZE)
            .ok_or_else(|| BiometalError::Corrupt {
                offset: 0,
                msg: format!(
                    "BSIZE {} is smaller than header ({}) plus trailer",
                    self.bsize,
                    self.header_size()
                ),
            })
    }
}

/// One fully decoded block
#[derive(Debug, Clone)]
pub struct Block {
    /// Header of the block
    pub header: BlockHeader,
    /// Decompressed payload
    pub data: Vec<u8>,
}

impl Block {
    /// On-disk size of the block
    pub fn raw_len(&self) -> u64 {
        self.header.block_size() as u64
    }

    /// Whether this is an empty block (such as the EOF marker)
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Read as many bytes as are available up to `buf.len()`
fn fill<R: Read + ?Sized>(source: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn read_exact_or_truncated<R: Read + ?Sized>(
    source: &mut R,
    buf: &mut [u8],
    context: &str,
) -> Result<()> {
    let n = fill(source, buf)?;
    if n < buf.len() {
        return Err(BiometalError::truncated(format!(
            "{}: expected {} bytes, got {}",
            context,
            buf.len(),
            n
        )));
    }
    Ok(())
}

fn validate_prefix(prefix: &[u8; GZIP_PREFIX_SIZE]) -> Result<()> {
    if prefix[0] != 31 || prefix[1] != 139 {
        return Err(BiometalError::InvalidMagic {
            context: format!(
                "gzip magic: expected [31, 139], got [{}, {}]",
                prefix[0], prefix[1]
            ),
        });
    }
    if prefix[2] != 8 {
        return Err(BiometalError::InvalidMagic {
            context: format!("compression method: expected 8, got {}", prefix[2]),
        });
    }
    Ok(())
}

fn header_from_prefix<R: Read + ?Sized>(
    source: &mut R,
    prefix: &[u8; GZIP_PREFIX_SIZE],
) -> Result<BlockHeader> {
    validate_prefix(prefix)?;

    let flags = prefix[3];
    if flags & 0x04 == 0 {
        return Err(BiometalError::MissingBcSubfield { offset: 0 });
    }

    let xlen = u16::from_le_bytes([prefix[10], prefix[11]]);
    let mut extra = vec![0u8; xlen as usize];
    read_exact_or_truncated(source, &mut extra, "BGZF extra field")?;

    // Walk the subfields looking for BC with SLEN=2
    let mut bsize = None;
    let mut pos = 0;
    while pos + 4 <= extra.len() {
        let slen = u16::from_le_bytes([extra[pos + 2], extra[pos + 3]]) as usize;
        if extra[pos] == b'B' && extra[pos + 1] == b'C' && slen == 2 && pos + 6 <= extra.len() {
            bsize = Some(u16::from_le_bytes([extra[pos + 4], extra[pos + 5]]));
            break;
        }
        pos += 4 + slen;
    }

    let bsize = bsize.ok_or(BiometalError::MissingBcSubfield { offset: 0 })?;

    Ok(BlockHeader {
        flags,
        mtime: u32::from_le_bytes([prefix[4], prefix[5], prefix[6], prefix[7]]),
        xfl: prefix[8],
        os: prefix[9],
        xlen,
        bsize,
    })
}

/// Read and validate one block header
///
/// Reads the 12-byte gzip prefix and the extra field, requiring the gzip magic,
/// CM=8, the FEXTRA flag and a "BC" subfield with SLEN=2.
///
/// # Errors
///
/// - [`BiometalError::Truncated`] if the source ends early
/// - [`BiometalError::InvalidMagic`] for a wrong ID1/ID2/CM
/// - [`BiometalError::MissingBcSubfield`] without FEXTRA or a BC subfield
pub fn read_header<R: Read + ?Sized>(source: &mut R) -> Result<BlockHeader> {
    let mut prefix = [0u8; GZIP_PREFIX_SIZE];
    read_exact_or_truncated(source, &mut prefix, "BGZF block header")?;
    header_from_prefix(source, &prefix)
}

/// Read the compressed payload of a block and inflate it
///
/// Returns `(compressed, decompressed)`.
///
/// # Errors
///
/// [`BiometalError::Corrupt`] if the payload leaves input unconsumed, does
/// not end the deflate stream, or inflates past [`MAX_BLOCK_CONTENT`].
pub fn read_payload<R: Read + ?Sized>(
    source: &mut R,
    header: &BlockHeader,
) -> Result<(Vec<u8>, Vec<u8>)> {
    let mut compressed = vec![0u8; header.compressed_len()?];
    read_exact_or_truncated(source, &mut compressed, "BGZF compressed payload")?;
    let decompressed = inflate(&compressed)?;
    Ok((compressed, decompressed))
}

/// Inflate a raw DEFLATE payload (no zlib/gzip wrapper)
fn inflate(compressed: &[u8]) -> Result<Vec<u8>> {
    let mut decompressor = Decompress::new(false);
    let mut out = Vec::with_capacity(MAX_BLOCK_CONTENT + 1);

    let status = decompressor
        .decompress_vec(compressed, &mut out, FlushDecompress::Finish)
        .map_err(|e| BiometalError::Corrupt {
            offset: 0,
            msg: format!("deflate error: {}", e),
        })?;

    if status != Status::StreamEnd {
        return Err(BiometalError::Corrupt {
            offset: 0,
            msg: "deflate stream did not terminate inside the block".to_string(),
        });
    }
    if decompressor.total_in() as usize != compressed.len() {
        return Err(BiometalError::Corrupt {
            offset: 0,
            msg: format!(
                "{} bytes of unconsumed compressed input",
                compressed.len() - decompressor.total_in() as usize
            ),
        });
    }
    if out.len() > MAX_BLOCK_CONTENT {
        return Err(BiometalError::Corrupt {
            offset: 0,
            msg: format!("block inflates to {} bytes", out.len()),
        });
    }

    Ok(out)
}

/// Read the 8-byte trailer and optionally verify it against the payload
///
/// # Errors
///
/// [`BiometalError::Corrupt`] when `decompressed` is given and its length or
/// CRC32 differ from the trailer.
pub fn read_trailer<R: Read + ?Sized>(
    source: &mut R,
    decompressed: Option<&[u8]>,
) -> Result<(u32, u32)> {
    let mut buf = [0u8; TRAILER_SIZE];
    read_exact_or_truncated(source, &mut buf, "BGZF block trailer")?;
    let crc = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
    let isize = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);

    if let Some(data) = decompressed {
        if data.len() as u64 != isize as u64 {
            return Err(BiometalError::Corrupt {
                offset: 0,
                msg: format!("ISIZE {} but payload has {} bytes", isize, data.len()),
            });
        }
        let actual = crc32fast::hash(data);
        if actual != crc {
            return Err(BiometalError::Corrupt {
                offset: 0,
                msg: format!("CRC32 mismatch: trailer {:#010x}, payload {:#010x}", crc, actual),
            });
        }
    }

    Ok((crc, isize))
}

/// Read one complete block, or `None` if the source is exhausted
///
/// `offset` is the file position of the block and only feeds error messages.
pub fn read_block<R: Read + ?Sized>(source: &mut R, offset: u64) -> Result<Option<Block>> {
    let mut prefix = [0u8; GZIP_PREFIX_SIZE];
    let n = fill(source, &mut prefix)?;
    if n == 0 {
        return Ok(None);
    }

    let decode = |source: &mut R| -> Result<Block> {
        if n < GZIP_PREFIX_SIZE {
            return Err(BiometalError::truncated(format!(
                "BGZF block header: expected {} bytes, got {}",
                GZIP_PREFIX_SIZE, n
            )));
        }
        let header = header_from_prefix(source, &prefix)?;
        let (_, data) = read_payload(source, &header)?;
        read_trailer(source, Some(&data))?;
        Ok(Block { header, data })
    };

    decode(source).map(Some).map_err(|e| at_block_offset(e, offset))
}

fn at_block_offset(err: BiometalError, offset: u64) -> BiometalError {
    match err {
        BiometalError::Corrupt { msg, .. } => BiometalError::Corrupt { offset, msg },
        BiometalError::MissingBcSubfield { .. } => BiometalError::MissingBcSubfield { offset },
        BiometalError::Truncated { context } => BiometalError::Truncated {
            context: format!("{} (block at offset {})", context, offset),
        },
        other => other,
    }
}

/// Compress `content` into one complete BGZF block
///
/// The block uses the fixed header `1f 8b 08 04 00000000 00 ff 0600 4243 0200`
/// followed by BSIZE = compressed length + 25.
///
/// # Errors
///
/// [`BiometalError::BlockTooLarge`] if `content` exceeds [`MAX_BLOCK_CONTENT`]
/// or does not compress into a block that BSIZE can describe.
pub fn encode_block(content: &[u8]) -> Result<Vec<u8>> {
    if content.len() > MAX_BLOCK_CONTENT {
        return Err(BiometalError::BlockTooLarge {
            size: content.len(),
        });
    }

    let mut deflated = deflate(content, Compression::default())?;
    if deflated.len() + WRITER_HEADER_SIZE + TRAILER_SIZE > u16::MAX as usize + 1 {
        deflated = deflate(content, Compression::none())?;
    }
    let bsize = deflated.len() + WRITER_HEADER_SIZE + TRAILER_SIZE - 1;
    if bsize > u16::MAX as usize {
        return Err(BiometalError::BlockTooLarge {
            size: content.len(),
        });
    }

    let mut block = Vec::with_capacity(bsize + 1);
    block.extend_from_slice(&[31, 139, 8, 4, 0, 0, 0, 0, 0, 255]);
    block.extend_from_slice(&6u16.to_le_bytes());
    block.extend_from_slice(&[b'B', b'C']);
    block.extend_from_slice(&2u16.to_le_bytes());
    block.extend_from_slice(&(bsize as u16).to_le_bytes());
    block.extend_from_slice(&deflated);
    block.extend_from_slice(&crc32fast::hash(content).to_le_bytes());
    block.extend_from_slice(&(content.len() as u32).to_le_bytes());

    Ok(block)
}

fn deflate(content: &[u8], level: Compression) -> Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), level);
    encoder.write_all(content)?;
    Ok(encoder.finish()?)
}

/// Write `content` as one block, returning the number of bytes written
pub fn write_block<W: Write + ?Sized>(sink: &mut W, content: &[u8]) -> Result<usize> {
    let block = encode_block(content)?;
    sink.write_all(&block)?;
    Ok(block.len())
}

/// Write the 28-byte EOF marker block
pub fn write_eof_marker<W: Write + ?Sized>(sink: &mut W) -> Result<()> {
    sink.write_all(&BGZF_EOF_MARKER)?;
    Ok(())
}

// ============================================================================
// Block cache
// ============================================================================

#[derive(Debug, Clone)]
struct CachedBlock {
    data: Bytes,
    raw_len: u64,
}

/// Cache statistics for a [`BgzfReader`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Loads answered from the cache
    pub hits: u64,
    /// Loads that had to decompress
    pub misses: u64,
    /// Blocks currently cached
    pub len: usize,
}

/// Bounded cache of decompressed blocks keyed by block start offset
///
/// A capacity of zero disables caching.
struct BlockCache {
    cache: Option<LruCache<u64, CachedBlock>>,
    hits: u64,
    misses: u64,
}

impl BlockCache {
    fn new(capacity: usize) -> Self {
        Self {
            cache: NonZeroUsize::new(capacity).map(LruCache::new),
            hits: 0,
            misses: 0,
        }
    }

    fn get(&mut self, offset: u64) -> Option<CachedBlock> {
        let found = self.cache.as_mut().and_then(|c| c.get(&offset).cloned());
        if found.is_some() {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        found
    }

    fn put(&mut self, offset: u64, block: CachedBlock) {
        if let Some(cache) = self.cache.as_mut() {
            if let Some((evicted, _)) = cache.push(offset, block) {
                if evicted != offset {
                    tracing::trace!(offset = evicted, "evicted BGZF block from cache");
                }
            }
        }
    }

    fn clear(&mut self) {
        if let Some(cache) = self.cache.as_mut() {
            cache.clear();
        }
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            len: self.cache.as_ref().map_or(0, |c| c.len()),
        }
    }
}

// ============================================================================
// Reader
// ============================================================================

/// Seekable BGZF reader
///
/// Implements [`Read`] and [`BufRead`] over the decompressed stream and adds
/// [`seek`](BgzfReader::seek)/[`tell`](BgzfReader::tell) in virtual offsets.
/// Recently loaded blocks are kept in a bounded cache so repeated seeks into
/// the same block do not decompress it again.
pub struct BgzfReader<R> {
    inner: R,
    /// File offset of the current block
    block_start: u64,
    /// On-disk size of the current block (0 past the last block)
    block_raw_len: u64,
    buffer: Bytes,
    within: usize,
    cache: BlockCache,
}

impl BgzfReader<BufReader<File>> {
    /// Open a BGZF file from a path
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::new(BufReader::new(file))
    }
}

impl<R: Read + Seek> BgzfReader<R> {
    /// Create a reader with the default cache capacity and load the first block
    pub fn new(inner: R) -> Result<Self> {
        Self::with_cache_capacity(inner, DEFAULT_CACHE_CAPACITY)
    }

    /// Create a reader caching at most `capacity` decompressed blocks
    pub fn with_cache_capacity(inner: R, capacity: usize) -> Result<Self> {
        let mut reader = BgzfReader {
            inner,
            block_start: 0,
            block_raw_len: 0,
            buffer: Bytes::new(),
            within: 0,
            cache: BlockCache::new(capacity),
        };
        reader.load_block(0)?;
        Ok(reader)
    }

    /// Make the block starting at `start` current, with the cursor at its start
    fn load_block(&mut self, start: u64) -> Result<()> {
        let cached = match self.cache.get(start) {
            Some(cached) => cached,
            None => {
                self.inner.seek(SeekFrom::Start(start))?;
                match read_block(&mut self.inner, start)? {
                    Some(block) => {
                        tracing::trace!(
                            offset = start,
                            raw_len = block.raw_len(),
                            len = block.data.len(),
                            "loaded BGZF block"
                        );
                        let cached = CachedBlock {
                            raw_len: block.raw_len(),
                            data: Bytes::from(block.data),
                        };
                        self.cache.put(start, cached.clone());
                        cached
                    }
                    None => CachedBlock {
                        raw_len: 0,
                        data: Bytes::new(),
                    },
                }
            }
        };

        // Position only changes once the block is in hand
        self.block_start = start;
        self.within = 0;
        self.buffer = cached.data;
        self.block_raw_len = cached.raw_len;
        Ok(())
    }

    /// Position the reader at a virtual offset
    ///
    /// # Errors
    ///
    /// [`BiometalError::InvalidVirtualOffset`] if the within-block part lies
    /// past the end of the decompressed block.
    pub fn seek(&mut self, offset: VirtualOffset) -> Result<()> {
        let (block, within) = offset.split();
        if block != self.block_start || self.block_raw_len == 0 {
            self.load_block(block)?;
        }
        let within = within as usize;
        if within > self.buffer.len() {
            return Err(BiometalError::InvalidVirtualOffset {
                block,
                within: within as u64,
            });
        }
        self.within = within;
        Ok(())
    }

    /// Current virtual offset
    ///
    /// At the very end of a non-empty block this reports the start of the next
    /// block with a within-block offset of 0, never an offset of 65536.
    pub fn tell(&self) -> VirtualOffset {
        if self.within > 0 && self.within == self.buffer.len() {
            VirtualOffset::from_raw((self.block_start + self.block_raw_len) << 16)
        } else {
            VirtualOffset::from_raw((self.block_start << 16) | self.within as u64)
        }
    }

    /// Advance to the next non-empty block; returns false at end of stream
    fn advance(&mut self) -> Result<bool> {
        while self.within >= self.buffer.len() {
            if self.block_raw_len == 0 {
                return Ok(false);
            }
            self.load_block(self.block_start + self.block_raw_len)?;
        }
        Ok(true)
    }

    /// Read one line including its `\n` terminator into `buf`
    ///
    /// Returns the number of bytes appended, 0 at end of stream. Lines may
    /// span block boundaries.
    pub fn read_line_bytes(&mut self, buf: &mut Vec<u8>) -> Result<usize> {
        let mut total = 0;
        loop {
            if !self.advance()? {
                return Ok(total);
            }
            let available = &self.buffer[self.within..];
            match available.iter().position(|&b| b == b'\n') {
                Some(i) => {
                    buf.extend_from_slice(&available[..=i]);
                    self.within += i + 1;
                    return Ok(total + i + 1);
                }
                None => {
                    buf.extend_from_slice(available);
                    total += available.len();
                    self.within = self.buffer.len();
                }
            }
        }
    }

    /// Check for the 28-byte EOF marker at the physical end of the file
    pub fn has_eof_marker(&mut self) -> Result<bool> {
        let len = self.inner.seek(SeekFrom::End(0))?;
        if len < BGZF_EOF_MARKER.len() as u64 {
            return Ok(false);
        }
        self.inner.seek(SeekFrom::Start(len - BGZF_EOF_MARKER.len() as u64))?;
        let mut tail = [0u8; 28];
        self.inner.read_exact(&mut tail)?;
        Ok(tail == BGZF_EOF_MARKER)
    }

    /// Decompressed bytes of the current block
    pub fn current_block(&self) -> &[u8] {
        &self.buffer
    }

    /// File offset of the current block
    pub fn block_offset(&self) -> u64 {
        self.block_start
    }

    /// Cache hit/miss counters
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop every cached block
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Consume the reader, returning the underlying source
    pub fn into_inner(self) -> R {
        self.inner
    }
}

fn to_io(err: BiometalError) -> io::Error {
    match err {
        BiometalError::Io(e) => e,
        other => io::Error::new(io::ErrorKind::InvalidData, other),
    }
}

impl<R: Read + Seek> Read for BgzfReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl<R: Read + Seek> BufRead for BgzfReader<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if !self.advance().map_err(to_io)? {
            return Ok(&[]);
        }
        Ok(&self.buffer[self.within..])
    }

    fn consume(&mut self, amt: usize) {
        self.within = (self.within + amt).min(self.buffer.len());
    }
}

// ============================================================================
// Writer
// ============================================================================

/// BGZF writer
///
/// Buffers written bytes into blocks of [`DEFAULT_BLOCK_CONTENT`] and
/// compresses full blocks in parallel batches of [`PARALLEL_BLOCK_COUNT`].
/// [`finish`](BgzfWriter::finish) writes the remaining data and the EOF
/// marker; dropping an unfinished writer does the same on a best-effort basis.
///
/// # Example
///
/// ```no_run
/// use biometal_vcf::io::bgzf::BgzfWriter;
/// use std::fs::File;
/// use std::io::Write;
///
/// # fn main() -> biometal_vcf::Result<()> {
/// let mut writer = BgzfWriter::new(File::create("out.txt.gz")?);
/// writer.write_all(b"hello\n")?;
/// writer.finish()?;
/// # Ok(())
/// # }
/// ```
pub struct BgzfWriter<W: Write> {
    inner: W,
    block_size: usize,
    current: Vec<u8>,
    pending: Vec<Vec<u8>>,
    /// Compressed bytes written to `inner` so far
    compressed_offset: u64,
    finished: bool,
}

impl<W: Write> BgzfWriter<W> {
    /// Create a writer with the default block size
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            block_size: DEFAULT_BLOCK_CONTENT,
            current: Vec::with_capacity(DEFAULT_BLOCK_CONTENT),
            pending: Vec::with_capacity(PARALLEL_BLOCK_COUNT),
            compressed_offset: 0,
            finished: false,
        }
    }

    /// Create a writer packing at most `block_size` bytes per block
    ///
    /// # Errors
    ///
    /// [`BiometalError::BlockTooLarge`] for a zero or oversized block size.
    pub fn with_block_size(inner: W, block_size: usize) -> Result<Self> {
        if block_size == 0 || block_size > MAX_BLOCK_CONTENT {
            return Err(BiometalError::BlockTooLarge { size: block_size });
        }
        let mut writer = Self::new(inner);
        writer.block_size = block_size;
        Ok(writer)
    }

    /// Compress and write every queued full block
    fn flush_blocks(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let blocks: Vec<Vec<u8>> = self
            .pending
            .par_iter()
            .map(|content| encode_block(content))
            .collect::<Result<Vec<_>>>()?;

        for block in blocks {
            self.inner.write_all(&block)?;
            self.compressed_offset += block.len() as u64;
        }
        self.pending.clear();
        Ok(())
    }

    /// Move the partially filled block to the queue
    fn seal_current(&mut self) {
        if !self.current.is_empty() {
            let block = std::mem::replace(&mut self.current, Vec::with_capacity(self.block_size));
            self.pending.push(block);
        }
    }

    /// Virtual offset of the next byte to be written
    ///
    /// Forces queued full blocks to disk so the block start is known.
    pub fn tell(&mut self) -> Result<VirtualOffset> {
        self.flush_blocks()?;
        VirtualOffset::new(self.compressed_offset, self.current.len() as u64)
    }

    /// Write all data followed by the EOF marker
    ///
    /// Calling `finish` more than once is a no-op.
    pub fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.seal_current();
        self.flush_blocks()?;
        write_eof_marker(&mut self.inner)?;
        self.compressed_offset += BGZF_EOF_MARKER.len() as u64;
        self.inner.flush()?;
        self.finished = true;
        Ok(())
    }

    /// Reference to the underlying sink
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Mutable reference to the underlying sink
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }
}

impl<W: Write> Write for BgzfWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.finished {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "Cannot write to finished BGZF writer",
            ));
        }

        let mut remaining = buf;
        while !remaining.is_empty() {
            let space = self.block_size - self.current.len();
            let take = remaining.len().min(space);
            self.current.extend_from_slice(&remaining[..take]);
            remaining = &remaining[take..];

            if self.current.len() >= self.block_size {
                self.seal_current();
                if self.pending.len() >= PARALLEL_BLOCK_COUNT {
                    self.flush_blocks().map_err(to_io)?;
                }
            }
        }
        Ok(buf.len())
    }

    /// Writes buffered data as (possibly short) blocks and flushes the sink
    fn flush(&mut self) -> io::Result<()> {
        if self.finished {
            return Ok(());
        }
        self.seal_current();
        self.flush_blocks().map_err(to_io)?;
        self.inner.flush()
    }
}

impl<W: Write> Drop for BgzfWriter<W> {
    fn drop(&mut self) {
        // Best-effort; call finish() to observe errors
        let _ = self.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn bgzf_bytes(blocks: &[&[u8]]) -> Vec<u8> {
        let mut out = Vec::new();
        for content in blocks {
            write_block(&mut out, content).unwrap();
        }
        write_eof_marker(&mut out).unwrap();
        out
    }

    #[test]
    fn test_virtual_offset_components() {
        let offset = VirtualOffset::new(0x1234, 0x56).unwrap();
        assert_eq!(offset.as_raw(), 0x1234_0056);
        assert_eq!(offset.block_offset(), 0x1234);
        assert_eq!(offset.within_block(), 0x56);
        assert!(VirtualOffset::new(1 << 48, 0).is_err());
        assert!(VirtualOffset::new(0, 1 << 16).is_err());
    }

    #[test]
    fn test_eof_marker_decodes_as_empty_block() {
        let mut cursor = Cursor::new(BGZF_EOF_MARKER.to_vec());
        let block = read_block(&mut cursor, 0).unwrap().unwrap();
        assert!(block.is_empty());
        assert_eq!(block.raw_len(), 28);
        assert!(read_block(&mut cursor, 28).unwrap().is_none());
    }

    #[test]
    fn test_encode_block_header_layout() {
        let block = encode_block(b"hello").unwrap();
        assert_eq!(
            &block[..16],
            &[31, 139, 8, 4, 0, 0, 0, 0, 0, 255, 6, 0, b'B', b'C', 2, 0]
        );
        let bsize = u16::from_le_bytes([block[16], block[17]]) as usize;
        assert_eq!(bsize + 1, block.len());
    }

    #[test]
    fn test_encode_empty_block() {
        let block = encode_block(b"").unwrap();
        let mut cursor = Cursor::new(block);
        let decoded = read_block(&mut cursor, 0).unwrap().unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_block_too_large() {
        let content = vec![b'A'; MAX_BLOCK_CONTENT + 1];
        assert!(matches!(
            encode_block(&content),
            Err(BiometalError::BlockTooLarge { .. })
        ));
    }

    #[test]
    fn test_max_block_content_compressible() {
        let content = vec![b'A'; MAX_BLOCK_CONTENT];
        let block = encode_block(&content).unwrap();
        let mut cursor = Cursor::new(block);
        let decoded = read_block(&mut cursor, 0).unwrap().unwrap();
        assert_eq!(decoded.data, content);
    }

    #[test]
    fn test_invalid_magic() {
        let mut data = encode_block(b"abc").unwrap();
        data[0] = 0;
        let err = read_header(&mut Cursor::new(data)).unwrap_err();
        assert!(matches!(err, BiometalError::InvalidMagic { .. }));
    }

    #[test]
    fn test_missing_fextra() {
        let mut data = encode_block(b"abc").unwrap();
        data[3] = 0;
        let err = read_header(&mut Cursor::new(data)).unwrap_err();
        assert!(matches!(err, BiometalError::MissingBcSubfield { .. }));
    }

    #[test]
    fn test_wrong_subfield_tag() {
        let mut data = encode_block(b"abc").unwrap();
        data[12] = b'X';
        let err = read_header(&mut Cursor::new(data)).unwrap_err();
        assert!(matches!(err, BiometalError::MissingBcSubfield { .. }));
    }

    #[test]
    fn test_truncated_header() {
        let data = encode_block(b"abc").unwrap();
        let err = read_header(&mut Cursor::new(&data[..10])).unwrap_err();
        assert!(matches!(err, BiometalError::Truncated { .. }));
    }

    #[test]
    fn test_truncated_payload() {
        let data = encode_block(b"some content").unwrap();
        let cut = data.len() - 12;
        let err = read_block(&mut Cursor::new(&data[..cut]), 0).unwrap_err();
        assert!(matches!(err, BiometalError::Truncated { .. }));
    }

    #[test]
    fn test_crc_mismatch_is_corrupt() {
        let mut data = encode_block(b"checksummed").unwrap();
        let crc_pos = data.len() - 8;
        data[crc_pos] ^= 0xFF;
        let err = read_block(&mut Cursor::new(data), 77).unwrap_err();
        assert!(matches!(err, BiometalError::Corrupt { offset: 77, .. }));
    }

    #[test]
    fn test_isize_mismatch_is_corrupt() {
        let mut data = encode_block(b"sized").unwrap();
        let isize_pos = data.len() - 4;
        data[isize_pos] = 99;
        let err = read_block(&mut Cursor::new(data), 0).unwrap_err();
        assert!(matches!(err, BiometalError::Corrupt { .. }));
    }

    #[test]
    fn test_trailer_without_payload_check() {
        let mut data = Vec::new();
        data.extend_from_slice(&7u32.to_le_bytes());
        data.extend_from_slice(&3u32.to_le_bytes());
        let (crc, isize) = read_trailer(&mut Cursor::new(data), None).unwrap();
        assert_eq!((crc, isize), (7, 3));
    }

    #[test]
    fn test_reader_reads_across_blocks() {
        let data = bgzf_bytes(&[b"line one\nline ", b"two\n"]);
        let mut reader = BgzfReader::new(Cursor::new(data)).unwrap();
        let mut text = String::new();
        reader.read_to_string(&mut text).unwrap();
        assert_eq!(text, "line one\nline two\n");
    }

    #[test]
    fn test_tell_at_block_end_reports_next_block() {
        let first = encode_block(b"abc\n").unwrap();
        let first_len = first.len() as u64;
        let data = bgzf_bytes(&[b"abc\n", b"def\n"]);
        let mut reader = BgzfReader::new(Cursor::new(data)).unwrap();

        assert_eq!(reader.tell(), VirtualOffset::from_raw(0));
        let mut line = Vec::new();
        reader.read_line_bytes(&mut line).unwrap();
        assert_eq!(line, b"abc\n");
        assert_eq!(reader.tell(), VirtualOffset::new(first_len, 0).unwrap());

        line.clear();
        reader.read_line_bytes(&mut line).unwrap();
        assert_eq!(line, b"def\n");
    }

    #[test]
    fn test_seek_and_tell_round_trip() {
        let data = bgzf_bytes(&[b"0123456789", b"abcdefghij"]);
        let mut reader = BgzfReader::new(Cursor::new(data)).unwrap();

        let mut buf = [0u8; 13];
        reader.read_exact(&mut buf).unwrap();
        let mark = reader.tell();
        let mut rest = String::new();
        reader.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "defghij");

        reader.seek(mark).unwrap();
        let mut again = String::new();
        reader.read_to_string(&mut again).unwrap();
        assert_eq!(again, "defghij");
    }

    #[test]
    fn test_seek_past_block_end_fails() {
        let data = bgzf_bytes(&[b"short"]);
        let mut reader = BgzfReader::new(Cursor::new(data)).unwrap();
        let err = reader.seek(VirtualOffset::new(0, 6).unwrap()).unwrap_err();
        assert!(matches!(err, BiometalError::InvalidVirtualOffset { .. }));
        assert!(reader.seek(VirtualOffset::new(0, 5).unwrap()).is_ok());
    }

    #[test]
    fn test_failed_block_load_keeps_position() {
        let data = bgzf_bytes(&[b"0123456789", b"abcdefghij"]);
        let mut reader = BgzfReader::new(Cursor::new(data)).unwrap();

        let mut buf = [0u8; 4];
        reader.read_exact(&mut buf).unwrap();
        let mark = reader.tell();

        // Offset 3 is inside the first block's header, not a block start
        assert!(reader.seek(VirtualOffset::new(3, 0).unwrap()).is_err());
        assert_eq!(reader.tell(), mark);

        let mut rest = String::new();
        reader.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "456789abcdefghij");
    }

    #[test]
    fn test_cache_serves_repeated_seeks() {
        let first_len = encode_block(b"first\n").unwrap().len() as u64;
        let data = bgzf_bytes(&[b"first\n", b"second\n"]);
        let mut reader = BgzfReader::with_cache_capacity(Cursor::new(data), 4).unwrap();

        for _ in 0..3 {
            reader.seek(VirtualOffset::new(first_len, 0).unwrap()).unwrap();
            reader.seek(VirtualOffset::new(0, 0).unwrap()).unwrap();
        }
        let stats = reader.cache_stats();
        assert_eq!(stats.misses, 2);
        assert!(stats.hits >= 5);
        assert!(stats.len <= 4);
    }

    #[test]
    fn test_cache_is_bounded() {
        let contents: Vec<Vec<u8>> = (0..10).map(|i| format!("block {}\n", i).into_bytes()).collect();
        let refs: Vec<&[u8]> = contents.iter().map(|c| c.as_slice()).collect();
        let data = bgzf_bytes(&refs);
        let mut reader = BgzfReader::with_cache_capacity(Cursor::new(data), 3).unwrap();
        let mut text = String::new();
        reader.read_to_string(&mut text).unwrap();
        assert_eq!(text.lines().count(), 10);
        assert!(reader.cache_stats().len <= 3);
    }

    #[test]
    fn test_has_eof_marker() {
        let data = bgzf_bytes(&[b"x"]);
        let mut reader = BgzfReader::new(Cursor::new(data)).unwrap();
        assert!(reader.has_eof_marker().unwrap());

        let truncated = encode_block(b"x").unwrap();
        let mut reader = BgzfReader::new(Cursor::new(truncated)).unwrap();
        assert!(!reader.has_eof_marker().unwrap());
    }

    #[test]
    fn test_writer_splits_blocks_and_appends_eof() {
        let mut out = Vec::new();
        {
            let mut writer = BgzfWriter::with_block_size(&mut out, 16).unwrap();
            writer.write_all(&[b'x'; 40]).unwrap();
            writer.finish().unwrap();
        }
        assert!(out.ends_with(&BGZF_EOF_MARKER));

        let mut cursor = Cursor::new(out);
        let mut sizes = Vec::new();
        let mut offset = 0;
        while let Some(block) = read_block(&mut cursor, offset).unwrap() {
            offset += block.raw_len();
            sizes.push(block.data.len());
        }
        assert_eq!(sizes, vec![16, 16, 8, 0]);
    }

    #[test]
    fn test_writer_tell_matches_reader_offsets() {
        let mut out = Vec::new();
        let mut marks = Vec::new();
        {
            let mut writer = BgzfWriter::with_block_size(&mut out, 8).unwrap();
            for line in ["aaaa\n", "bbbbbb\n", "cc\n"] {
                marks.push(writer.tell().unwrap());
                writer.write_all(line.as_bytes()).unwrap();
            }
            writer.finish().unwrap();
        }

        let mut reader = BgzfReader::new(Cursor::new(out)).unwrap();
        for (mark, expected) in marks.iter().zip(["aaaa\n", "bbbbbb\n", "cc\n"]) {
            reader.seek(*mark).unwrap();
            let mut line = Vec::new();
            reader.read_line_bytes(&mut line).unwrap();
            assert_eq!(line, expected.as_bytes());
        }
    }

    #[test]
    fn test_writer_finish_is_idempotent() {
        let mut out = Vec::new();
        {
            let mut writer = BgzfWriter::new(&mut out);
            writer.write_all(b"data").unwrap();
            writer.finish().unwrap();
            writer.finish().unwrap();
            assert!(writer.write_all(b"more").is_err());
        }
        assert_eq!(
            out.windows(BGZF_EOF_MARKER.len())
                .filter(|w| *w == BGZF_EOF_MARKER)
                .count(),
            1
        );
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Cursor;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn virtual_offset_round_trip(block in 0u64..(1 << 48), within in 0u64..(1 << 16)) {
            let offset = VirtualOffset::new(block, within).unwrap();
            prop_assert_eq!(offset.split(), (block, within as u16));
            prop_assert_eq!(VirtualOffset::from_raw(offset.as_raw()), offset);
        }

        #[test]
        fn virtual_offset_rejects_out_of_range(block in (1u64 << 48)..u64::MAX, within in 0u64..(1 << 16)) {
            prop_assert!(VirtualOffset::new(block, within).is_err());
            prop_assert!(VirtualOffset::new(0, within + (1 << 16)).is_err());
        }

        #[test]
        fn block_round_trip(content in proptest::collection::vec(any::<u8>(), 0..DEFAULT_BLOCK_CONTENT)) {
            let block = encode_block(&content).unwrap();
            let decoded = read_block(&mut Cursor::new(block), 0).unwrap().unwrap();
            prop_assert_eq!(decoded.data, content);
        }

        #[test]
        fn ordering_matches_raw(a in any::<u64>(), b in any::<u64>()) {
            let (va, vb) = (VirtualOffset::from_raw(a), VirtualOffset::from_raw(b));
            prop_assert_eq!(va < vb, a < b);
        }
    }
}
