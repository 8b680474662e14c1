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

/// The first message written to every typed-binary output file, through the
/// same length-delimited framing as every record that follows it. Declares
/// the record schema, the tool that wrote the file, and whether payload
/// bytes were captured, so a reader never has to guess the file's shape.
#[derive(Clone, PartialEq, prost::Message)]
pub struct RecordHeader {
    #[prost(string, tag = "1")]
    pub record_type: String,
    #[prost(string, tag = "2")]
    pub source: String,
    #[prost(string, tag = "3")]
    pub tool_version: String,
    #[prost(bool, tag = "4")]
    pub include_payloads: bool,
    #[prost(int64, tag = "5")]
    pub written_at_unix_nanos: i64,
}

#[cfg(test)]
mod tests_header {
    use super::*;
    use prost::Message;

    #[test]
    fn test_record_header_round_trips_through_length_delimited_framing() {
        let header = RecordHeader {
            record_type: "Tcp".to_string(),
            source: "eth0".to_string(),
            tool_version: "0.1.0".to_string(),
            include_payloads: true,
            written_at_unix_nanos: 1_730_000_000_000_000_000,
        };

        let mut buf = Vec::new();
        header.encode_length_delimited(&mut buf).unwrap();

        let decoded = RecordHeader::decode_length_delimited(buf.as_slice()).unwrap();
        assert_eq!(header, decoded);
    }
}
