//! Tabix indexing for BGZF-compressed VCF files
//!
//! - [`tbi`]: the `.tbi` binary format, UCSC binning and index building
//! - [`query`]: region strings, chunk selection and line fetching
//!
//! # Overview
//!
//! A tabix index maps each sequence to a tree of bins (records are placed in
//! the smallest bin that fully contains them) plus a linear index with one
//! virtual offset per 16 KiB tile. A region query collects the chunks of every
//! bin the region touches, prunes them with the linear index and scans what
//! remains.
//!
//! # Example
//!
//! ```no_run
//! use biometal_vcf::formats::index::TabixIndex;
//!
//! # fn main() -> biometal_vcf::Result<()> {
//! let index = TabixIndex::build_from_path("variants.vcf.gz")?;
//! index.to_path("variants.vcf.gz.tbi")?;
//!
//! let chunks = index.query("chr1", Some(1_000_000), Some(2_000_000))?;
//! println!("Found {} chunks for region", chunks.len());
//! # Ok(())
//! # }
//! ```

pub mod query;
pub mod tbi;

pub use query::{select_chunks, Region, TabixFile, TabixLines};
pub use tbi::{
    bin_level, bin_size, bin_start, merge_chunks, region_to_bin, region_to_bins, Chunk,
    TabixIndex, TbiBin, TbiFormat, TbiReference,
};
