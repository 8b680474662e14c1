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
struct UdpProto {
    #[prost(int64, tag = "1")]
    timestamp_unix_nanos: i64,
    #[prost(uint32, tag = "2")]
    src_port: u32,
    #[prost(uint32, tag = "3")]
    dst_port: u32,
    #[prost(uint32, tag = "4")]
    length: u32,
}

/// One decoded UDP datagram header.
pub struct UdpRecord {
    proto: UdpProto,
    context: Option<Arc<PacketContext>>,
}

impl UdpRecord {
    pub fn new(timestamp_unix_nanos: i64, src_port: u16, dst_port: u16, length: u16) -> Self {
        Self {
            proto: UdpProto {
                timestamp_unix_nanos,
                src_port: src_port as u32,
                dst_port: dst_port as u32,
                length: length as u32,
            },
            context: None,
        }
    }

    pub fn from_layer(timestamp_unix_nanos: i64, layer: &Layer) -> Option<Self> {
        match layer {
            Layer::Udp { src_port, dst_port, length } => {
                Some(Self::new(timestamp_unix_nanos, *src_port, *dst_port, *length))
            }
            _ => None,
        }
    }

    pub fn decode(bytes: &[u8]) -> netcap_common::error::Result<Self> {
        let proto = UdpProto::decode(bytes)?;
        Ok(Self { proto, context: None })
    }
}

impl AuditRecord for UdpRecord {
    fn record_type(&self) -> &'static str {
        "Udp"
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
        &["timestamp_unix_nanos", "src_port", "dst_port", "length"]
    }

    fn csv_row(&self) -> Vec<String> {
        vec![
            self.proto.timestamp_unix_nanos.to_string(),
            self.proto.src_port.to_string(),
            self.proto.dst_port.to_string(),
            self.proto.length.to_string(),
        ]
    }

    fn encode_typed(&self) -> Vec<u8> {
        self.proto.encode_to_vec()
    }

    fn ml_row(&self, encoder: &ValueEncoder) -> Vec<f64> {
        vec![
            encoder.encode_i32("udp.src_port", self.proto.src_port as i32),
            encoder.encode_i32("udp.dst_port", self.proto.dst_port as i32),
            encoder.encode_i32("udp.length", self.proto.length as i32),
        ]
    }

    fn increment_metrics(&self, metrics: &MetricsContext) {
        metrics.increment_record(self.record_type());
    }
}

#[cfg(test)]
mod tests_udp {
    use super::*;

    #[test]
    fn test_from_layer_decodes_matching_variant() {
        let layer = Layer::Udp { src_port: 53, dst_port: 51234, length: 40 };
        let record = UdpRecord::from_layer(1, &layer).unwrap();
        assert_eq!(vec!["1", "53", "51234", "40"], record.csv_row());
    }
}
