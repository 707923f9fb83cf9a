//! VCF writer with optional BGZF compression
//!
//! # Output format
//!
//! The header is written when the writer is created: every header line as
//! `##key=value`, then the `#CHROM` column line. Records follow one per line.
//! Values are serialized so that reading a file and writing its records back
//! reproduces the original bytes:
//!
//! - empty ID, ALT, FILTER and INFO columns become `.`
//! - INFO flags are written as the bare key, or with the value they were read with
//! - numbers and strings read from a file keep their source text
//! - other strings are percent-escaped only for characters reserved in their column
//! - trailing FORMAT keys missing from a sample stay missing
//! - sample values past the last FORMAT key and unparsed sample columns are
//!   written verbatim
//!
//! # Example
//!
//! ```no_run
//! use biometal_vcf::formats::vcf::{Header, HeaderLine, Record, SamplesInfos, Writer};
//!
//! # fn main() -> biometal_vcf::Result<()> {
//! let header = Header::new(
//!     vec![HeaderLine::plain("fileformat", "VCFv4.3")],
//!     SamplesInfos::default(),
//! );
//!
//! // ".gz" selects BGZF output
//! let mut writer = Writer::create("variants.vcf.gz", header)?;
//! writer.write_record(&Record::new("chr1", 100, "A"))?;
//! writer.finish()?;
//! # Ok(())
//! # }
//! ```

use crate::error::{BiometalError, Result};
use crate::formats::vcf::escape::{escape, Section};
use crate::formats::vcf::header::Header;
use crate::formats::vcf::record::{FieldValue, Record, SampleCall, Value};
use crate::io::sink::{DataSink, OutputCompression, SinkWriter};
use std::io::Write;
use std::path::Path;

/// Writer configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterOptions {
    /// Force plain or BGZF output; `None` decides from the path extension
    pub compression: Option<OutputCompression>,
}

impl WriterOptions {
    /// Force a compression mode
    pub fn with_compression(mut self, compression: OutputCompression) -> Self {
        self.compression = Some(compression);
        self
    }
}

/// VCF writer
///
/// Records must belong to the header the writer was created with; sample
/// columns are written in record order.
pub struct Writer {
    writer: SinkWriter,
    header: Header,
    records_written: usize,
    finished: bool,
}

impl Writer {
    /// Open `sink` and write `header`
    ///
    /// # Errors
    ///
    /// Returns an error if the sink cannot be opened or the header write fails.
    pub fn new(sink: DataSink, header: Header, options: WriterOptions) -> Result<Self> {
        let mut writer = sink.open(options.compression)?;
        write!(writer, "{}", header)?;
        tracing::debug!(
            compression = ?writer.compression(),
            lines = header.lines().len(),
            "wrote VCF header"
        );
        Ok(Self {
            writer,
            header,
            records_written: 0,
            finished: false,
        })
    }

    /// Create a writer for a file path
    ///
    /// `.gz` and `.bgz` paths are BGZF-compressed.
    pub fn create<P: AsRef<Path>>(path: P, header: Header) -> Result<Self> {
        Self::new(DataSink::from_path(path), header, WriterOptions::default())
    }

    /// Create a writer to standard output (plain text)
    pub fn stdout(header: Header) -> Result<Self> {
        Self::new(DataSink::stdout(), header, WriterOptions::default())
    }

    /// The header written at creation
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Write one record
    ///
    /// # Errors
    ///
    /// [`BiometalError::InvalidRecord`] if the record has more calls than the
    /// header has samples, or after [`finish`](Writer::finish); otherwise only
    /// I/O errors.
    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        if self.finished {
            return Err(BiometalError::InvalidRecord {
                line: 0,
                msg: "write after finish".to_string(),
            });
        }
        if record.calls.len() > self.header.samples().len() {
            return Err(BiometalError::InvalidRecord {
                line: 0,
                msg: format!(
                    "record has {} calls but header has {} samples",
                    record.calls.len(),
                    self.header.samples().len()
                ),
            });
        }

        writeln!(self.writer, "{}", format_record(record))?;
        self.records_written += 1;
        Ok(())
    }

    /// Number of records written
    pub fn records_written(&self) -> usize {
        self.records_written
    }

    /// Flush the output; BGZF output also gets its EOF marker
    pub fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.writer.finish()?;
        self.finished = true;
        tracing::debug!(records = self.records_written, "finished VCF output");
        Ok(())
    }
}

/// One record as a tab-separated line (no line break)
pub fn format_record(record: &Record) -> String {
    let mut columns: Vec<String> = vec![
        record.chrom.clone(),
        record.pos.to_string(),
        join_or_dot(&record.ids, ";"),
        record.reference.clone(),
        if record.alts.is_empty() {
            ".".to_string()
        } else {
            record
                .alts
                .iter()
                .map(|alt| alt.serialize())
                .collect::<Vec<_>>()
                .join(",")
        },
        record.qual.to_string(),
        join_or_dot(&record.filters, ";"),
        format_info(&record.info),
    ];

    if !record.format.is_empty() {
        columns.push(record.format.join(":"));
        for call in &record.calls {
            columns.push(format_call(&record.format, call));
        }
    }
    columns.join("\t")
}

fn join_or_dot(items: &[String], sep: &str) -> String {
    if items.is_empty() {
        ".".to_string()
    } else {
        items.join(sep)
    }
}

fn format_info(info: &[(String, FieldValue)]) -> String {
    if info.is_empty() {
        return ".".to_string();
    }
    info.iter()
        .map(|(key, value)| match value {
            FieldValue::Flag => key.clone(),
            _ => format!("{}={}", key, format_value(key, value, Section::Info)),
        })
        .collect::<Vec<_>>()
        .join(";")
}

fn format_call(format: &[String], call: &SampleCall) -> String {
    let call = match call {
        SampleCall::Unparsed { data, .. } => return data.clone(),
        SampleCall::Parsed(call) => call,
    };

    let values: Vec<Option<&FieldValue>> = format.iter().map(|key| call.get(key)).collect();
    let present = if call.surplus.is_empty() {
        match values.iter().rposition(Option::is_some) {
            Some(last) => last + 1,
            None => return ".".to_string(),
        }
    } else {
        values.len()
    };

    format
        .iter()
        .zip(&values)
        .take(present)
        .map(|(key, value)| match value {
            Some(value) => format_value(key, value, Section::Format),
            None => ".".to_string(),
        })
        .chain(call.surplus.iter().cloned())
        .collect::<Vec<_>>()
        .join(":")
}

/// Serialize one INFO or FORMAT value
pub fn format_value(key: &str, value: &FieldValue, section: Section) -> String {
    match value {
        FieldValue::Flag => String::new(),
        FieldValue::FlagWithValue(text) => text.clone(),
        FieldValue::Missing => ".".to_string(),
        FieldValue::Scalar(v) => format_atomic(v, section),
        FieldValue::List(items) if section == Section::Format && key == "FT" => {
            let filters: Vec<String> = items
                .iter()
                .map(|item| match item {
                    Some(v) => format_atomic(v, section),
                    None => ".".to_string(),
                })
                .collect();
            join_or_dot(&filters, ";")
        }
        FieldValue::List(items) => items
            .iter()
            .map(|item| match item {
                Some(v) => format_atomic(v, section),
                None => ".".to_string(),
            })
            .collect::<Vec<_>>()
            .join(","),
    }
}

/// Serialize one scalar, escaping reserved characters in strings
pub fn format_atomic(value: &Value, section: Section) -> String {
    match value {
        Value::String(s) => escape(s, section).into_owned(),
        Value::Verbatim { text, .. } => text.clone(),
        other => other.to_string(),
    }
}
