//! File formats built on the BGZF layer
//!
//! - [`index`]: tabix (`.tbi`) indexes and region queries over BGZF files
//! - [`vcf`]: VCF header/record model, reader and writer
//!
//! Both modules stream: records and index chunks are produced one at a time
//! and only the blocks a query touches are decompressed.

pub mod index;
pub mod vcf;
