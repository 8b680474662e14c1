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

use log::error;
use netcap_writer::RecordReader;

use crate::cli::DumpArgs;

/// Print every record in a typed-binary file as one JSON line each. Always
/// returns 0 — a read or decode failure is logged to stderr but never fails
/// the process, matching the other read-only diagnostic subcommands.
pub fn run(args: DumpArgs) -> i32 {
    let mut reader = match RecordReader::open(&args.path) {
        Ok(reader) => reader,
        Err(err) => {
            error!("failed to open {}: {err}", args.path.display());
            return 0;
        }
    };
    let record_type = reader.header().record_type.clone();

    loop {
        match reader.next_frame() {
            Ok(Some(bytes)) => match netcap_record::decode_record(&record_type, &bytes) {
                Ok(record) => println!("{}", record.to_json()),
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
