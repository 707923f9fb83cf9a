//! biometal-vcf: BGZF, tabix and VCF with random-access region fetch
//!
//! # Overview
//!
//! Three layers that build on each other:
//!
//! - **BGZF** ([`io::bgzf`]): a gzip-compatible block container with 64-bit
//!   virtual offsets (`block_offset << 16 | within_block`) and a bounded cache
//!   of decompressed blocks
//! - **Tabix** ([`formats::index`]): a binning index plus linear index that
//!   maps a genomic region to the few byte ranges worth scanning
//! - **VCF** ([`formats::vcf`]): header and record parsing, typed INFO/FORMAT
//!   values and byte-exact write-back
//!
//! ## Quick Start
//!
//! ```no_run
//! use biometal_vcf::formats::vcf::Reader;
//!
//! # fn main() -> biometal_vcf::Result<()> {
//! // BGZF with variants.vcf.gz.tbi next to it
//! let mut reader = Reader::from_path("variants.vcf.gz")?;
//!
//! for record in reader.fetch_region("20:1,110,696-1,230,237")? {
//!     let record = record?;
//!     println!("{}\t{}\t{}", record.chrom, record.pos, record.reference);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Coordinates
//!
//! VCF positions are 1-based. Tabix bins and the linear index are 0-based
//! half-open. Region matching for fetch is inclusive on both ends so results
//! agree with the widely used tabix tools.
//!
//! ## Module Organization
//!
//! - [`error`]: error type and `Result` alias
//! - [`io`]: BGZF codec, line scanning, output sinks
//! - [`formats`]: tabix index and VCF

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod formats;
pub mod io;

// Re-export commonly used types
pub use error::{BiometalError, Result};
pub use formats::index::{Region, TabixFile, TabixIndex};
pub use formats::vcf::{Header, Reader, ReaderOptions, Record, Warning, Writer, WriterOptions};
pub use io::{BgzfReader, BgzfWriter, VirtualOffset};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
