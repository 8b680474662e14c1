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

use std::sync::Arc;

use netcap_metrics::{MetricsContext, ValueEncoder};
use prost::Message;

use crate::audit::AuditRecord;
use crate::packet::{Layer, PacketContext};

#[derive(Clone, PartialEq, Message)]
struct TcpProto {
    #[prost(int64, tag = "1")]
    timestamp_unix_nanos: i64,
    #[prost(uint32, tag = "2")]
    src_port: u32,
    #[prost(uint32, tag = "3")]
    dst_port: u32,
    #[prost(uint32, tag = "4")]
    sequence_number: u32,
    #[prost(uint32, tag = "5")]
    acknowledgment_number: u32,
    #[prost(bool, tag = "6")]
    syn: bool,
    #[prost(bool, tag = "7")]
    ack: bool,
    #[prost(bool, tag = "8")]
    fin: bool,
    #[prost(bool, tag = "9")]
    rst: bool,
    #[prost(uint32, tag = "10")]
    window_size: u32,
}

/// One decoded TCP segment header (not the reassembled conversation — see
/// [`crate::records::TcpConnectionRecord`] for that).
pub struct TcpRecord {
    proto: TcpProto,
    context: Option<Arc<PacketContext>>,
}

impl TcpRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        timestamp_unix_nanos: i64,
        src_port: u16,
        dst_port: u16,
        sequence_number: u32,
        acknowledgment_number: u32,
        syn: bool,
        ack: bool,
        fin: bool,
        rst: bool,
        window_size: u16,
    ) -> Self {
        Self {
            proto: TcpProto {
                timestamp_unix_nanos,
                src_port: src_port as u32,
                dst_port: dst_port as u32,
                sequence_number,
                acknowledgment_number,
                syn,
                ack,
                fin,
                rst,
                window_size: window_size as u32,
            },
            context: None,
        }
    }

    pub fn from_layer(timestamp_unix_nanos: i64, layer: &Layer) -> Option<Self> {
        match layer {
            Layer::Tcp {
                src_port,
                dst_port,
                sequence_number,
                acknowledgment_number,
                syn,
                ack,
                fin,
                rst,
                window_size,
            } => Some(Self::new(
                timestamp_unix_nanos,
                *src_port,
                *dst_port,
                *sequence_number,
                *acknowledgment_number,
                *syn,
                *ack,
                *fin,
                *rst,
                *window_size,
            )),
            _ => None,
        }
    }

    pub fn is_fin(&self) -> bool {
        self.proto.fin
    }

    pub fn is_rst(&self) -> bool {
        self.proto.rst
    }

    pub fn decode(bytes: &[u8]) -> netcap_common::error::Result<Self> {
        let proto = TcpProto::decode(bytes)?;
        Ok(Self { proto, context: None })
    }
}

impl AuditRecord for TcpRecord {
    fn record_type(&self) -> &'static str {
        "Tcp"
    }

    fn timestamp_unix_nanos(&self) -> i64 {
        self.proto.timestamp_unix_nanos
    }

    fn attach_context(&mut self, ctx: Arc<PacketContext>) {
        self.context = Some(ctx);
    }

    fn context(&self) -> Option<&Arc<PacketContext>> {
        self.context.as_ref()
    }

    fn csv_header(&self) -> &'static [&'static str] {
        &[
            "timestamp_unix_nanos",
            "src_port",
            "dst_port",
            "sequence_number",
            "acknowledgment_number",
            "syn",
            "ack",
            "fin",
            "rst",
            "window_size",
        ]
    }

    fn csv_row(&self) -> Vec<String> {
        vec![
            self.proto.timestamp_unix_nanos.to_string(),
            self.proto.src_port.to_string(),
            self.proto.dst_port.to_string(),
            self.proto.sequence_number.to_string(),
            self.proto.acknowledgment_number.to_string(),
            self.proto.syn.to_string(),
            self.proto.ack.to_string(),
            self.proto.fin.to_string(),
            self.proto.rst.to_string(),
            self.proto.window_size.to_string(),
        ]
    }

    fn encode_typed(&self) -> Vec<u8> {
        self.proto.encode_to_vec()
    }

    fn ml_row(&self, encoder: &ValueEncoder) -> Vec<f64> {
        vec![
            encoder.encode_i32("tcp.src_port", self.proto.src_port as i32),
            encoder.encode_i32("tcp.dst_port", self.proto.dst_port as i32),
            encoder.encode_i32("tcp.window_size", self.proto.window_size as i32),
            if self.proto.syn { 1.0 } else { 0.0 },
            if self.proto.fin { 1.0 } else { 0.0 },
        ]
    }

    fn increment_metrics(&self, metrics: &MetricsContext) {
        metrics.increment_record(self.record_type());
    }
}

#[cfg(test)]
mod tests_tcp {
    use super::*;

    #[test]
    fn test_from_layer_decodes_syn() {
        let layer = Layer::Tcp {
            src_port: 51234,
            dst_port: 443,
            sequence_number: 1,
            acknowledgment_number: 0,
            syn: true,
            ack: false,
            fin: false,
            rst: false,
            window_size: 65535,
        };
        let record = TcpRecord::from_layer(100, &layer).unwrap();
        assert!(!record.is_fin());
        assert!(!record.is_rst());
    }

    #[test]
    fn test_is_fin_detects_terminator() {
        let record = TcpRecord::new(1, 1, 2, 0, 0, false, true, true, false, 0);
        assert!(record.is_fin());
    }
}
