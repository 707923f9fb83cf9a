//! VCF (Variant Call Format) reading and writing
//!
//! # Layers
//!
//! - [`line`]: character-driven state machine that splits any VCF line into
//!   an untyped intermediate form (used by the index builder and fetch filter)
//! - [`splitter`] and [`escape`]: header mapping splitting and `%XX` escaping
//! - [`header`] and [`record`]: the typed data model
//! - [`parser`]: header validation and typed record decoding
//! - [`reader`] and [`writer`]: file-level streaming I/O
//!
//! Recoverable problems are reported as [`Warning`]s through a [`Warnings`]
//! collector and logged with `tracing`; structural problems are errors.
//!
//! # Example
//!
//! ```no_run
//! use biometal_vcf::formats::vcf::{Reader, Writer};
//!
//! # fn main() -> biometal_vcf::Result<()> {
//! let mut reader = Reader::from_path("input.vcf.gz")?;
//! let mut writer = Writer::create("copy.vcf", reader.header().clone())?;
//! for record in &mut reader {
//!     writer.write_record(&record?)?;
//! }
//! writer.finish()?;
//! # Ok(())
//! # }
//! ```

pub mod escape;
pub mod header;
pub mod line;
pub mod parser;
pub mod reader;
pub mod record;
pub mod splitter;
pub mod warning;
pub mod writer;

pub use header::{
    FieldInfo, FieldType, Header, HeaderLine, HeaderLineKind, MappingLine, Number, SamplesInfos,
};
pub use line::{parse_line, DataLine, MetaValue, VcfLine};
pub use parser::{process_alt, HeaderParser, RecordChecks, RecordParser};
pub use reader::{Reader, ReaderOptions, RecordFetch};
pub use record::{
    AltRecord, AltType, BreakEnd, Call, FieldValue, GenotypeType, Orientation, Qual, Record,
    SampleCall, Value,
};
pub use warning::{Warning, Warnings};
pub use writer::{Writer, WriterOptions};
