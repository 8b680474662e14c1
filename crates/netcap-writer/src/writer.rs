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
// File created: 2024-11-02
// Last updated: 2024-11-02
//

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use crossbeam_channel::Sender;
use log::warn;
use prost::Message;

use netcap_common::error::{Result, SetupError, WriterIoError};
use netcap_common::time::now_unix_nanos;
use netcap_record::{AuditRecord, RecordHeader};

use crate::csv;
use crate::sink::Sink;

const DEFAULT_MEM_BUF_BYTES: usize = 64 * 1024;

/// How a [`RecordWriter`]'s output stream is framed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    TypedBinary,
    Csv,
}

/// A single logical output artifact: one writer serves one decoder.
pub struct RecordWriterProperties {
    name: String,
    out_dir: PathBuf,
    framing: Framing,
    compressed: bool,
    mem_buf_bytes: usize,
    include_payloads: bool,
}

impl RecordWriterProperties {
    pub fn builder() -> RecordWriterPropertiesBuilder {
        RecordWriterPropertiesBuilder::default()
    }

    /// The path this writer will open: `out_dir/name.{bin|csv}[.gz]`.
    pub fn final_path(&self) -> PathBuf {
        let extension = match self.framing {
            Framing::TypedBinary => "bin",
            Framing::Csv => "csv",
        };
        let mut file_name = format!("{}.{}", self.name, extension);
        if self.compressed {
            file_name.push_str(".gz");
        }
        self.out_dir.join(file_name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }
}

#[derive(Default)]
pub struct RecordWriterPropertiesBuilder {
    name: Option<String>,
    out_dir: Option<PathBuf>,
    framing: Option<Framing>,
    compressed: Option<bool>,
    mem_buf_bytes: Option<usize>,
    include_payloads: Option<bool>,
}

impl RecordWriterPropertiesBuilder {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_out_dir(mut self, out_dir: PathBuf) -> Self {
        self.out_dir = Some(out_dir);
        self
    }

    pub fn with_framing(mut self, framing: Framing) -> Self {
        self.framing = Some(framing);
        self
    }

    pub fn with_compressed(mut self, compressed: bool) -> Self {
        self.compressed = Some(compressed);
        self
    }

    pub fn with_mem_buf_bytes(mut self, mem_buf_bytes: usize) -> Self {
        self.mem_buf_bytes = Some(mem_buf_bytes);
        self
    }

    pub fn with_include_payloads(mut self, include_payloads: bool) -> Self {
        self.include_payloads = Some(include_payloads);
        self
    }

    pub fn try_build(self) -> Result<RecordWriterProperties> {
        let name = self
            .name
            .ok_or_else(|| Box::new(SetupError::new("required field 'name' was not provided")))?;
        let out_dir = self
            .out_dir
            .ok_or_else(|| Box::new(SetupError::new("required field 'out_dir' was not provided")))?;

        Ok(RecordWriterProperties {
            name,
            out_dir,
            framing: self.framing.unwrap_or(Framing::TypedBinary),
            compressed: self.compressed.unwrap_or(false),
            mem_buf_bytes: self.mem_buf_bytes.unwrap_or(DEFAULT_MEM_BUF_BYTES),
            include_payloads: self.include_payloads.unwrap_or(false),
        })
    }

    pub fn build(self) -> RecordWriterProperties {
        self.try_build().unwrap()
    }
}

/// Buffered, optionally compressed output for one decoder's audit records,
/// in either typed-binary or CSV framing. See [`Framing`].
pub struct RecordWriter {
    properties: RecordWriterProperties,
    sink: Option<Sink>,
    share_tx: Option<Sender<Vec<u8>>>,
    header_written: bool,
    csv_header_written: bool,
    poisoned: bool,
    dropped_writes: u64,
    total_bytes: u64,
    close_result: Option<(String, u64)>,
}

impl RecordWriter {
    pub fn builder() -> RecordWriterBuilder {
        RecordWriterBuilder::default()
    }

    pub fn is_csv(&self) -> bool {
        self.properties.framing == Framing::Csv
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    pub fn dropped_writes(&self) -> u64 {
        self.dropped_writes
    }

    pub fn properties(&self) -> &RecordWriterProperties {
        &self.properties
    }

    /// Write the header frame. For typed-binary framing this is a
    /// [`RecordHeader`] message; for CSV framing there is no header frame —
    /// the column-name row is emitted lazily by the first [`Self::write_record`]
    /// call instead. Fails if a header has already been written.
    pub fn write_header(&mut self, record_type: &str, source: &str, tool_version: &str) -> Result<()> {
        if self.header_written {
            return Err(Box::new(SetupError::new(format!(
                "header already written for writer '{}'",
                self.properties.name
            ))));
        }
        self.header_written = true;

        if self.properties.framing == Framing::Csv {
            return Ok(());
        }

        let header = RecordHeader {
            record_type: record_type.to_string(),
            source: source.to_string(),
            tool_version: tool_version.to_string(),
            include_payloads: self.properties.include_payloads,
            written_at_unix_nanos: now_unix_nanos(),
        };
        let mut framed = Vec::new();
        header
            .encode_length_delimited(&mut framed)
            .map_err(|e| Box::new(SetupError::new(format!("failed to encode header: {e}"))))?;
        self.write_framed(&framed)
    }

    /// Write one record. Typed-binary framing appends a length-delimited
    /// protobuf message; CSV framing emits the header row on first call,
    /// then one row per record.
    pub fn write_record(&mut self, record: &dyn AuditRecord) -> Result<()> {
        if self.poisoned {
            self.dropped_writes += 1;
            return Ok(());
        }

        match self.properties.framing {
            Framing::TypedBinary => {
                let bytes = record.encode_typed();
                let mut framed = Vec::with_capacity(bytes.len() + 10);
                prost::encoding::encode_varint(bytes.len() as u64, &mut framed);
                framed.extend_from_slice(&bytes);
                self.write_framed(&framed)
            }
            Framing::Csv => {
                if !self.csv_header_written {
                    let header_line = format!("{}\n", csv::row(
                        &record.csv_header().iter().map(|s| s.to_string()).collect::<Vec<_>>(),
                    ));
                    self.write_framed(header_line.as_bytes())?;
                    self.csv_header_written = true;
                }
                let row_line = format!("{}\n", csv::row(&record.csv_row()));
                self.write_framed(row_line.as_bytes())
            }
        }
    }

    fn write_framed(&mut self, bytes: &[u8]) -> Result<()> {
        if let Some(tx) = &self.share_tx {
            let _ = tx.try_send(bytes.to_vec());
        }

        let sink = self
            .sink
            .as_mut()
            .ok_or_else(|| Box::new(SetupError::new("writer used after close")))?;

        match sink.write_all(bytes) {
            Ok(()) => {
                self.total_bytes += bytes.len() as u64;
                Ok(())
            }
            Err(err) => {
                self.poisoned = true;
                Err(Box::new(WriterIoError::new(format!(
                    "writer '{}': {}",
                    self.properties.name, err
                ))))
            }
        }
    }

    /// Flush, close the compression stream if any, and return the final
    /// file name and total byte count. Safe to call more than once — later
    /// calls return the same result recorded by the first call.
    pub fn close(&mut self) -> Result<(String, u64)> {
        if let Some(result) = &self.close_result {
            return Ok(result.clone());
        }

        if let Some(sink) = self.sink.take() {
            if let Err(err) = sink.finish() {
                warn!(
                    "writer '{}' failed to finish cleanly, returning partial size: {}",
                    self.properties.name, err
                );
            }
        }

        let final_name = self
            .properties
            .final_path()
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.properties.name.clone());

        let result = (final_name, self.total_bytes);
        self.close_result = Some(result.clone());
        Ok(result)
    }
}

#[derive(Default)]
pub struct RecordWriterBuilder {
    properties: Option<RecordWriterProperties>,
    share_tx: Option<Sender<Vec<u8>>>,
}

impl RecordWriterBuilder {
    pub fn with_properties(mut self, properties: RecordWriterProperties) -> Self {
        self.properties = Some(properties);
        self
    }

    pub fn with_share_channel(mut self, share_tx: Sender<Vec<u8>>) -> Self {
        self.share_tx = Some(share_tx);
        self
    }

    pub fn try_build(self) -> Result<RecordWriter> {
        let properties = self
            .properties
            .ok_or_else(|| Box::new(SetupError::new("required field 'properties' was not provided")))?;

        let path = properties.final_path();
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| {
                Box::new(SetupError::new(format!(
                    "failed to open writer output path {}: {}",
                    path.display(),
                    e
                )))
            })?;

        let sink = if properties.compressed {
            Sink::gzip(file, properties.mem_buf_bytes)
        } else {
            Sink::plain(file, properties.mem_buf_bytes)
        };

        Ok(RecordWriter {
            properties,
            sink: Some(sink),
            share_tx: self.share_tx,
            header_written: false,
            csv_header_written: false,
            poisoned: false,
            dropped_writes: 0,
            total_bytes: 0,
            close_result: None,
        })
    }

    pub fn build(self) -> RecordWriter {
        self.try_build().unwrap()
    }
}

#[cfg(test)]
mod tests_writer {
    use super::*;
    use tempfile::tempdir;

    fn sample_ethernet_record() -> netcap_record::records::EthernetRecord {
        netcap_record::records::EthernetRecord::new(1_000, [0; 6], [1; 6], 0x0800)
    }

    #[test]
    fn test_typed_binary_header_then_record_round_trips() {
        let dir = tempdir().unwrap();
        let properties = RecordWriterProperties::builder()
            .with_name("Ethernet")
            .with_out_dir(dir.path().to_path_buf())
            .with_framing(Framing::TypedBinary)
            .build();
        let mut writer = RecordWriter::builder().with_properties(properties).build();

        writer.write_header("Ethernet", "eth0", "0.1.0").unwrap();
        writer.write_record(&sample_ethernet_record()).unwrap();
        let (name, bytes) = writer.close().unwrap();

        assert_eq!("Ethernet.bin", name);
        assert!(bytes > 0);
    }

    #[test]
    fn test_writing_header_twice_fails() {
        let dir = tempdir().unwrap();
        let properties = RecordWriterProperties::builder()
            .with_name("Ethernet")
            .with_out_dir(dir.path().to_path_buf())
            .build();
        let mut writer = RecordWriter::builder().with_properties(properties).build();

        writer.write_header("Ethernet", "eth0", "0.1.0").unwrap();
        assert!(writer.write_header("Ethernet", "eth0", "0.1.0").is_err());
    }

    #[test]
    fn test_csv_mode_emits_header_row_then_data_row() {
        let dir = tempdir().unwrap();
        let properties = RecordWriterProperties::builder()
            .with_name("Ethernet")
            .with_out_dir(dir.path().to_path_buf())
            .with_framing(Framing::Csv)
            .build();
        let mut writer = RecordWriter::builder().with_properties(properties).build();

        writer.write_header("Ethernet", "eth0", "0.1.0").unwrap();
        writer.write_record(&sample_ethernet_record()).unwrap();
        let (name, _bytes) = writer.close().unwrap();
        assert_eq!("Ethernet.csv", name);

        let contents = std::fs::read_to_string(dir.path().join("Ethernet.csv")).unwrap();
        let mut lines = contents.lines();
        assert_eq!("timestamp_unix_nanos,src_mac,dst_mac,ether_type", lines.next().unwrap());
        assert!(lines.next().unwrap().starts_with("1000,"));
    }

    #[test]
    fn test_close_is_idempotent() {
        let dir = tempdir().unwrap();
        let properties = RecordWriterProperties::builder()
            .with_name("Ethernet")
            .with_out_dir(dir.path().to_path_buf())
            .build();
        let mut writer = RecordWriter::builder().with_properties(properties).build();
        writer.write_header("Ethernet", "eth0", "0.1.0").unwrap();

        let first = writer.close().unwrap();
        let second = writer.close().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_gzip_compressed_output_is_valid_gzip() {
        let dir = tempdir().unwrap();
        let properties = RecordWriterProperties::builder()
            .with_name("Ethernet")
            .with_out_dir(dir.path().to_path_buf())
            .with_compressed(true)
            .build();
        let mut writer = RecordWriter::builder().with_properties(properties).build();
        writer.write_header("Ethernet", "eth0", "0.1.0").unwrap();
        writer.write_record(&sample_ethernet_record()).unwrap();
        let (name, _) = writer.close().unwrap();
        assert_eq!("Ethernet.bin.gz", name);

        let raw = std::fs::read(dir.path().join("Ethernet.bin.gz")).unwrap();
        assert_eq!(&raw[0..2], &[0x1f, 0x8b]);
    }

    #[test]
    fn test_fan_out_channel_receives_same_bytes_written_to_disk() {
        let dir = tempdir().unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();
        let properties = RecordWriterProperties::builder()
            .with_name("Ethernet")
            .with_out_dir(dir.path().to_path_buf())
            .build();
        let mut writer = RecordWriter::builder()
            .with_properties(properties)
            .with_share_channel(tx)
            .build();

        writer.write_header("Ethernet", "eth0", "0.1.0").unwrap();
        writer.write_record(&sample_ethernet_record()).unwrap();
        let (_, total_bytes) = writer.close().unwrap();

        let mut tee_bytes = 0u64;
        while let Ok(chunk) = rx.try_recv() {
            tee_bytes += chunk.len() as u64;
        }
        assert_eq!(total_bytes, tee_bytes);
    }

    #[test]
    fn test_write_after_close_is_rejected() {
        let dir = tempdir().unwrap();
        let properties = RecordWriterProperties::builder()
            .with_name("Ethernet")
            .with_out_dir(dir.path().to_path_buf())
            .build();
        let mut writer = RecordWriter::builder().with_properties(properties).build();
        writer.write_header("Ethernet", "eth0", "0.1.0").unwrap();
        writer.close().unwrap();

        assert!(writer.write_record(&sample_ethernet_record()).is_err());
    }
}
