//! I/O module: BGZF block codec, line scanning and output sinks
//!
//! Reading is random-access through [`BgzfReader`] (virtual-offset seek/tell
//! with a bounded block cache) or sequential through [`LineScanner`], which
//! reports the virtual offsets of every line it yields.

pub mod bgzf;
pub mod lines;
pub mod sink;

pub use bgzf::{BgzfReader, BgzfWriter, VirtualOffset, BGZF_EOF_MARKER};
pub use lines::{LineScanner, ScannedLine};
pub use sink::{DataSink, OutputCompression, SinkWriter};
