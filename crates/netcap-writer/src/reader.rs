//
// MIT License
//
// Copyright (c) 2024 Firelink Data
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.
//
// File created: 2024-11-09
// Last updated: 2024-11-09
//

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use prost::Message;

use netcap_common::error::{Result, SetupError};
use netcap_record::RecordHeader;

/// The underlying byte source a [`RecordReader`] reads through: a plain
/// buffered file, or the same file unwrapped through a gzip decoder. Chosen
/// by sniffing the gzip magic number rather than trusting the path's
/// extension, since a caller may have renamed the file.
enum Source {
    Plain(BufReader<File>),
    Gz(Box<GzDecoder<BufReader<File>>>),
}

impl Read for Source {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Source::Plain(r) => r.read(buf),
            Source::Gz(r) => r.read(buf),
        }
    }
}

/// Reads a typed-binary file back into its header and raw record frames —
/// the read side of [`crate::writer::RecordWriter`]'s `Framing::TypedBinary`
/// output, used by the `dump` and `export` commands to reconstruct records
/// written by a previous capture.
pub struct RecordReader {
    source: Source,
    header: RecordHeader,
}

impl RecordReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| Box::new(SetupError::new(format!("failed to open {}: {}", path.display(), e))))?;
        let mut buffered = BufReader::new(file);

        let is_gzip = {
            let peeked = buffered
                .fill_buf()
                .map_err(|e| Box::new(SetupError::new(format!("failed reading {}: {}", path.display(), e))))?;
            peeked.len() >= 2 && peeked[0] == 0x1f && peeked[1] == 0x8b
        };

        let mut source = if is_gzip {
            Source::Gz(Box::new(GzDecoder::new(buffered)))
        } else {
            Source::Plain(buffered)
        };

        let header_bytes = read_frame(&mut source)?.ok_or_else(|| {
            Box::new(SetupError::new(format!("{} is empty, no header frame found", path.display())))
        })?;
        let header = RecordHeader::decode(header_bytes.as_slice())
            .map_err(|e| Box::new(SetupError::new(format!("failed to decode header: {e}"))))?;

        Ok(Self { source, header })
    }

    pub fn header(&self) -> &RecordHeader {
        &self.header
    }

    /// The next record frame's raw, still-encoded bytes, or `None` at a
    /// clean end of file. Callers decode the frame via
    /// `netcap_record::decode_record(reader.header().record_type.as_str(), &frame)`.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>> {
        read_frame(&mut self.source)
    }
}

fn read_frame<R: Read>(source: &mut R) -> Result<Option<Vec<u8>>> {
    let len = match read_varint(source)? {
        Some(len) => len,
        None => return Ok(None),
    };
    let mut buf = vec![0u8; len as usize];
    source
        .read_exact(&mut buf)
        .map_err(|e| Box::new(SetupError::new(format!("truncated record frame: {e}"))))?;
    Ok(Some(buf))
}

/// Read a single base-128 varint length prefix, the same framing
/// [`crate::writer::RecordWriter::write_record`] writes ahead of each
/// record. Returns `None` only when the stream ends cleanly before the
/// prefix starts; anything else short of a full varint is an error.
fn read_varint<R: Read>(source: &mut R) -> Result<Option<u64>> {
    let mut value: u64 = 0;
    let mut shift = 0u32;
    let mut first = true;
    loop {
        let mut byte = [0u8; 1];
        let n = source
            .read(&mut byte)
            .map_err(|e| Box::new(SetupError::new(format!("failed reading length prefix: {e}"))))?;
        if n == 0 {
            if first {
                return Ok(None);
            }
            return Err(Box::new(SetupError::new("truncated varint length prefix")));
        }
        first = false;
        value |= u64::from(byte[0] & 0x7f) << shift;
        if byte[0] & 0x80 == 0 {
            break;
        }
        shift += 7;
    }
    Ok(Some(value))
}

#[cfg(test)]
mod tests_reader {
    use super::*;
    use crate::writer::{Framing, RecordWriter, RecordWriterProperties};
    use netcap_record::records::EthernetRecord;
    use tempfile::tempdir;

    #[test]
    fn test_reads_header_and_records_back_out() {
        let dir = tempdir().unwrap();
        let properties = RecordWriterProperties::builder()
            .with_name("Ethernet")
            .with_out_dir(dir.path().to_path_buf())
            .with_framing(Framing::TypedBinary)
            .build();
        let mut writer = RecordWriter::builder().with_properties(properties).build();
        writer.write_header("Ethernet", "eth0", "0.1.0").unwrap();
        writer.write_record(&EthernetRecord::new(1_000, [0; 6], [1; 6], 0x0800)).unwrap();
        writer.write_record(&EthernetRecord::new(2_000, [2; 6], [3; 6], 0x0806)).unwrap();
        writer.close().unwrap();

        let mut reader = RecordReader::open(&dir.path().join("Ethernet.bin")).unwrap();
        assert_eq!("Ethernet", reader.header().record_type);
        assert_eq!("eth0", reader.header().source);

        let first = reader.next_frame().unwrap().unwrap();
        let record = netcap_record::decode_record(&reader.header().record_type, &first).unwrap();
        assert_eq!("1000", record.csv_row()[0]);

        let second = reader.next_frame().unwrap().unwrap();
        let record = netcap_record::decode_record(&reader.header().record_type, &second).unwrap();
        assert_eq!("2000", record.csv_row()[0]);

        assert!(reader.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_reads_gzip_compressed_file_by_sniffing_magic_bytes() {
        let dir = tempdir().unwrap();
        let properties = RecordWriterProperties::builder()
            .with_name("Ethernet")
            .with_out_dir(dir.path().to_path_buf())
            .with_compressed(true)
            .build();
        let mut writer = RecordWriter::builder().with_properties(properties).build();
        writer.write_header("Ethernet", "eth0", "0.1.0").unwrap();
        writer.write_record(&EthernetRecord::new(1_000, [0; 6], [1; 6], 0x0800)).unwrap();
        writer.close().unwrap();

        let mut reader = RecordReader::open(&dir.path().join("Ethernet.bin.gz")).unwrap();
        assert_eq!("Ethernet", reader.header().record_type);
        assert!(reader.next_frame().unwrap().is_some());
        assert!(reader.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_open_rejects_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.bin");
        std::fs::write(&path, []).unwrap();
        assert!(RecordReader::open(&path).is_err());
    }
}
