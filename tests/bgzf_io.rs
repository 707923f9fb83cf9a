//! Integration tests for the BGZF block codec, reader and line scanner

use biometal_vcf::io::bgzf::{read_block, write_block, write_eof_marker};
use biometal_vcf::io::{BgzfReader, BgzfWriter, DataSink, LineScanner, VirtualOffset, BGZF_EOF_MARKER};
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor, Read, Write};
use tempfile::tempdir;

fn sample_text(lines: usize) -> String {
    (0..lines)
        .map(|i| format!("chr{}\t{}\tline number {}\n", i % 3, i * 17, i))
        .collect()
}

#[test]
fn test_file_round_trip_multiple_blocks() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("data.txt.gz");
    let text = sample_text(2000);

    let mut writer = BgzfWriter::with_block_size(File::create(&path).unwrap(), 4096).unwrap();
    writer.write_all(text.as_bytes()).unwrap();
    writer.finish().unwrap();
    drop(writer);

    let mut reader = BgzfReader::from_path(&path).unwrap();
    assert!(reader.has_eof_marker().unwrap());
    reader.seek(VirtualOffset::from(0)).unwrap();

    let mut decoded = String::new();
    reader.read_to_string(&mut decoded).unwrap();
    assert_eq!(decoded, text);
}

#[test]
fn test_blocks_are_plain_gzip_members() {
    let mut data = Vec::new();
    write_block(&mut data, b"first member\n").unwrap();
    write_block(&mut data, b"second member\n").unwrap();
    write_eof_marker(&mut data).unwrap();

    let mut decoded = String::new();
    flate2::read::MultiGzDecoder::new(data.as_slice())
        .read_to_string(&mut decoded)
        .unwrap();
    assert_eq!(decoded, "first member\nsecond member\n");
}

#[test]
fn test_scanner_offsets_seek_back_to_lines() {
    let text = sample_text(300);
    let mut data = Vec::new();
    {
        let mut writer = BgzfWriter::with_block_size(&mut data, 500).unwrap();
        writer.write_all(text.as_bytes()).unwrap();
        writer.finish().unwrap();
    }

    let scanned: Vec<_> = LineScanner::new(data.as_slice())
        .collect::<biometal_vcf::Result<_>>()
        .unwrap();
    assert_eq!(scanned.len(), 300);
    for pair in scanned.windows(2) {
        assert_eq!(pair[0].end, pair[1].start);
    }

    let mut reader = BgzfReader::new(Cursor::new(data)).unwrap();
    for line in scanned.iter().rev().step_by(37) {
        reader.seek(line.start).unwrap();
        let mut buf = Vec::new();
        reader.read_line_bytes(&mut buf).unwrap();
        assert_eq!(buf, line.data);
    }
}

#[test]
fn test_reader_buf_read_lines() {
    let mut data = Vec::new();
    {
        let mut writer = BgzfWriter::with_block_size(&mut data, 7).unwrap();
        writer.write_all(b"alpha\nbeta\ngamma\n").unwrap();
        writer.finish().unwrap();
    }
    let reader = BgzfReader::new(Cursor::new(data)).unwrap();
    let lines: Vec<String> = reader.lines().map(|l| l.unwrap()).collect();
    assert_eq!(lines, vec!["alpha", "beta", "gamma"]);
}

#[test]
fn test_empty_stream() {
    let mut data = Vec::new();
    write_eof_marker(&mut data).unwrap();
    assert_eq!(data, BGZF_EOF_MARKER);

    let block = read_block(&mut data.as_slice(), 0).unwrap().unwrap();
    assert!(block.is_empty());

    let mut reader = BgzfReader::new(Cursor::new(data)).unwrap();
    let mut out = Vec::new();
    reader.read_to_end(&mut out).unwrap();
    assert!(out.is_empty());
}

#[test]
fn test_sink_output_is_readable() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("out.bgz");

    let mut out = DataSink::from_path(&path).open(None).unwrap();
    out.write_all(b"via sink\n").unwrap();
    out.finish().unwrap();
    drop(out);

    let mut reader = BgzfReader::new(BufReader::new(File::open(&path).unwrap())).unwrap();
    let mut line = String::new();
    reader.read_line(&mut line).unwrap();
    assert_eq!(line, "via sink\n");
}
