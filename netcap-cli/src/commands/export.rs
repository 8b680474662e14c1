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
use std::io::{self, BufWriter, Write};

use log::error;
use netcap_writer::RecordReader;

use crate::cli::ExportArgs;

/// Re-emit a typed-binary file as CSV, reusing each record's declared
/// column set. Always returns 0, matching `dump`.
pub fn run(args: ExportArgs) -> i32 {
    let mut reader = match RecordReader::open(&args.path) {
        Ok(reader) => reader,
        Err(err) => {
            error!("failed to open {}: {err}", args.path.display());
            return 0;
        }
    };
    let record_type = reader.header().record_type.clone();

    let mut sink: Box<dyn Write> = match &args.out {
        Some(path) => match File::create(path) {
            Ok(file) => Box::new(BufWriter::new(file)),
            Err(err) => {
                error!("failed to create {}: {err}", path.display());
                return 0;
            }
        },
        None => Box::new(io::stdout()),
    };

    let mut wrote_header = false;
    loop {
        match reader.next_frame() {
            Ok(Some(bytes)) => match netcap_record::decode_record(&record_type, &bytes) {
                Ok(record) => {
                    if !wrote_header {
                        let header: Vec<String> = record.csv_header().iter().map(|s| s.to_string()).collect();
                        let _ = writeln!(sink, "{}", netcap_writer::csv::row(&header));
                        wrote_header = true;
                    }
                    let _ = writeln!(sink, "{}", netcap_writer::csv::row(&record.csv_row()));
                }
                Err(err) => error!("failed to decode {record_type} record: {err}"),
            },
            Ok(None) => break,
            Err(err) => {
                error!("failed reading {}: {err}", args.path.display());
                break;
            }
        }
    }

    0
}

#[cfg(test)]
mod tests_export {
    use super::*;
    use netcap_record::records::EthernetRecord;
    use netcap_writer::{Framing, RecordWriter, RecordWriterProperties};
    use tempfile::tempdir;

    #[test]
    fn test_exports_header_then_one_row_per_record() {
        let dir = tempdir().unwrap();
        let properties = RecordWriterProperties::builder()
            .with_name("Ethernet")
            .with_out_dir(dir.path().to_path_buf())
            .with_framing(Framing::TypedBinary)
            .build();
        let mut writer = RecordWriter::builder().with_properties(properties).build();
        writer.write_header("Ethernet", "eth0", "0.1.0").unwrap();
        writer.write_record(&EthernetRecord::new(1_000, [0; 6], [1; 6], 0x0800)).unwrap();
        writer.close().unwrap();

        let out_path = dir.path().join("Ethernet.csv");
        let args = ExportArgs { path: dir.path().join("Ethernet.bin"), out: Some(out_path.clone()) };
        assert_eq!(0, run(args));

        let contents = std::fs::read_to_string(&out_path).unwrap();
        let mut lines = contents.lines();
        assert_eq!("timestamp_unix_nanos,src_mac,dst_mac,ether_type", lines.next().unwrap());
        assert!(lines.next().unwrap().starts_with("1000,00:00:00:00:00:00,"));
    }

    #[test]
    fn test_missing_file_returns_zero() {
        let dir = tempdir().unwrap();
        let args = ExportArgs { path: dir.path().join("missing.bin"), out: None };
        assert_eq!(0, run(args));
    }
}
