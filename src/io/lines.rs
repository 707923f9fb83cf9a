//! Line scanning over BGZF blocks
//!
//! [`LineScanner`] walks a BGZF stream block by block and yields every line
//! together with the virtual offsets of its first byte and of the byte just
//! past its terminator. Lines that straddle a block boundary are stitched
//! together through a single carry-over buffer.
//!
//! # Example
//!
//! ```no_run
//! use biometal_vcf::io::LineScanner;
//! use std::fs::File;
//!
//! # fn main() -> biometal_vcf::Result<()> {
//! let scanner = LineScanner::new(File::open("variants.vcf.gz")?);
//! for line in scanner {
//!     let line = line?;
//!     println!("{}..{}: {} bytes", line.start, line.end, line.data.len());
//! }
//! # Ok(())
//! # }
//! ```

use crate::error::Result;
use crate::io::bgzf::{read_block, VirtualOffset};
use std::collections::VecDeque;
use std::io::Read;

/// One line of the decompressed stream with its virtual offsets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedLine {
    /// Line bytes including the `\n` terminator (absent only on a final unterminated line)
    pub data: Vec<u8>,
    /// Virtual offset of the first byte
    pub start: VirtualOffset,
    /// Virtual offset just past the terminator
    pub end: VirtualOffset,
}

impl ScannedLine {
    /// Line content without the trailing `\n` or `\r\n`
    pub fn trimmed(&self) -> &[u8] {
        let mut data = self.data.as_slice();
        if let Some(rest) = data.strip_suffix(b"\n") {
            data = rest;
        }
        if let Some(rest) = data.strip_suffix(b"\r") {
            data = rest;
        }
        data
    }
}

/// Streaming line iterator over a BGZF source
///
/// Needs only [`Read`]: blocks are consumed strictly in order. Iteration ends
/// at the first empty block (the EOF marker) or at the end of the source,
/// flushing an unterminated final line if there is one.
pub struct LineScanner<R> {
    source: R,
    /// File offset of the next block to read
    offset: u64,
    carry: Vec<u8>,
    carry_start: Option<VirtualOffset>,
    ready: VecDeque<ScannedLine>,
    finished: bool,
}

impl<R: Read> LineScanner<R> {
    /// Scan a BGZF stream from its first block
    pub fn new(source: R) -> Self {
        Self {
            source,
            offset: 0,
            carry: Vec::new(),
            carry_start: None,
            ready: VecDeque::new(),
            finished: false,
        }
    }

    /// Flush the carry-over as a final line ending at `end`
    fn flush_carry(&mut self, end: VirtualOffset) {
        if let Some(start) = self.carry_start.take() {
            let data = std::mem::take(&mut self.carry);
            if !data.is_empty() {
                self.ready.push_back(ScannedLine { data, start, end });
            }
        }
    }

    /// Read the next block and split it into lines
    fn scan_block(&mut self) -> Result<()> {
        let block_start = self.offset;
        let block = match read_block(&mut self.source, block_start)? {
            Some(block) => block,
            None => {
                tracing::warn!(
                    offset = block_start,
                    "BGZF stream ended without EOF marker"
                );
                self.flush_carry(VirtualOffset::new(block_start, 0)?);
                self.finished = true;
                return Ok(());
            }
        };

        let next_block = block_start + block.raw_len();
        self.offset = next_block;

        if block.is_empty() {
            self.flush_carry(VirtualOffset::new(block_start, 0)?);
            self.finished = true;
            return Ok(());
        }

        let data = block.data;
        let mut pos = 0;
        while let Some(i) = data[pos..].iter().position(|&b| b == b'\n') {
            let stop = pos + i + 1;
            let end = if stop == data.len() {
                VirtualOffset::new(next_block, 0)?
            } else {
                VirtualOffset::new(block_start, stop as u64)?
            };

            let line = match self.carry_start.take() {
                Some(start) => {
                    let mut joined = std::mem::take(&mut self.carry);
                    joined.extend_from_slice(&data[pos..stop]);
                    ScannedLine {
                        data: joined,
                        start,
                        end,
                    }
                }
                None => ScannedLine {
                    data: data[pos..stop].to_vec(),
                    start: VirtualOffset::new(block_start, pos as u64)?,
                    end,
                },
            };
            self.ready.push_back(line);
            pos = stop;
        }

        if pos < data.len() {
            if self.carry_start.is_none() {
                self.carry_start = Some(VirtualOffset::new(block_start, pos as u64)?);
            }
            self.carry.extend_from_slice(&data[pos..]);
        }

        Ok(())
    }
}

impl<R: Read> Iterator for LineScanner<R> {
    type Item = Result<ScannedLine>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(line) = self.ready.pop_front() {
                return Some(Ok(line));
            }
            if self.finished {
                return None;
            }
            if let Err(e) = self.scan_block() {
                self.finished = true;
                return Some(Err(e));
            }
        }
    }
}
