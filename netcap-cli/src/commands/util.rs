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

use netcap_decoder::DEFAULT_DECODER_NAMES;
use netcap_writer::RecordReader;

use crate::cli::UtilCommand;

/// Maintenance helpers. None of these run the collector, so none of them
/// touch `MetricsContext` — they read files directly or print constants.
pub fn run(command: UtilCommand) -> i32 {
    match command {
        UtilCommand::ListDecoders => {
            for name in DEFAULT_DECODER_NAMES {
                println!("{name}");
            }
        }
        UtilCommand::Verify { path } => match RecordReader::open(&path) {
            Ok(reader) => println!("pass: {} ({})", path.display(), reader.header().record_type),
            Err(err) => println!("fail: {} ({err})", path.display()),
        },
    }
    0
}

#[cfg(test)]
mod tests_util {
    use super::*;
    use netcap_record::records::EthernetRecord;
    use netcap_writer::{Framing, RecordWriter, RecordWriterProperties};
    use tempfile::tempdir;

    #[test]
    fn test_list_decoders_returns_zero() {
        assert_eq!(0, run(UtilCommand::ListDecoders));
    }

    #[test]
    fn test_verify_passes_on_well_formed_file() {
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

        assert_eq!(0, run(UtilCommand::Verify { path: dir.path().join("Ethernet.bin") }));
    }

    #[test]
    fn test_verify_fails_gracefully_on_missing_file() {
        let dir = tempdir().unwrap();
        assert_eq!(0, run(UtilCommand::Verify { path: dir.path().join("missing.bin") }));
    }
}
