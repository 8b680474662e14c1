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
use crate::records::format_mac;

#[derive(Clone, PartialEq, Message)]
struct EthernetProto {
    #[prost(int64, tag = "1")]
    timestamp_unix_nanos: i64,
    #[prost(string, tag = "2")]
    src_mac: String,
    #[prost(string, tag = "3")]
    dst_mac: String,
    #[prost(uint32, tag = "4")]
    ether_type: u32,
}

/// One decoded Ethernet frame header.
pub struct EthernetRecord {
    proto: EthernetProto,
    context: Option<Arc<PacketContext>>,
}

impl EthernetRecord {
    pub fn new(timestamp_unix_nanos: i64, src_mac: [u8; 6], dst_mac: [u8; 6], ether_type: u16) -> Self {
        Self {
            proto: EthernetProto {
                timestamp_unix_nanos,
                src_mac: format_mac(src_mac),
                dst_mac: format_mac(dst_mac),
                ether_type: ether_type as u32,
            },
            context: None,
        }
    }

    pub fn from_layer(timestamp_unix_nanos: i64, layer: &Layer) -> Option<Self> {
        match layer {
            Layer::Ethernet { src_mac, dst_mac, ether_type } => {
                Some(Self::new(timestamp_unix_nanos, *src_mac, *dst_mac, *ether_type))
            }
            _ => None,
        }
    }

    /// Decode a record previously written by [`AuditRecord::encode_typed`] —
    /// the read side used by `dump`/`export`.
    pub fn decode(bytes: &[u8]) -> netcap_common::error::Result<Self> {
        let proto = EthernetProto::decode(bytes)?;
        Ok(Self { proto, context: None })
    }
}

impl AuditRecord for EthernetRecord {
    fn record_type(&self) -> &'static str {
        "Ethernet"
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

    fn src(&self) -> String {
        self.proto.src_mac.clone()
    }

    fn dst(&self) -> String {
        self.proto.dst_mac.clone()
    }

    fn csv_header(&self) -> &'static [&'static str] {
        &["timestamp_unix_nanos", "src_mac", "dst_mac", "ether_type"]
    }

    fn csv_row(&self) -> Vec<String> {
        vec![
            self.proto.timestamp_unix_nanos.to_string(),
            self.proto.src_mac.clone(),
            self.proto.dst_mac.clone(),
            format!("0x{:04x}", self.proto.ether_type),
        ]
    }

    fn encode_typed(&self) -> Vec<u8> {
        self.proto.encode_to_vec()
    }

    fn ml_row(&self, encoder: &ValueEncoder) -> Vec<f64> {
        vec![
            encoder.encode_string("ethernet.src_mac", &self.proto.src_mac) as f64,
            encoder.encode_string("ethernet.dst_mac", &self.proto.dst_mac) as f64,
            encoder.encode_i32("ethernet.ether_type", self.proto.ether_type as i32),
        ]
    }

    fn increment_metrics(&self, metrics: &MetricsContext) {
        metrics.increment_record(self.record_type());
    }
}

#[cfg(test)]
mod tests_ethernet {
    use super::*;

    #[test]
    fn test_from_layer_decodes_matching_variant() {
        let layer = Layer::Ethernet {
            src_mac: [0, 1, 2, 3, 4, 5],
            dst_mac: [6, 7, 8, 9, 10, 11],
            ether_type: 0x0800,
        };
        let record = EthernetRecord::from_layer(1_000, &layer).unwrap();
        assert_eq!("00:01:02:03:04:05", record.src());
        assert_eq!("06:07:08:09:0a:0b", record.dst());
    }

    #[test]
    fn test_from_layer_rejects_other_variants() {
        let layer = Layer::Udp { src_port: 1, dst_port: 2, length: 8 };
        assert!(EthernetRecord::from_layer(1, &layer).is_none());
    }

    #[test]
    fn test_csv_row_matches_header_len() {
        let record = EthernetRecord::new(1, [0; 6], [1; 6], 0x0806);
        assert_eq!(record.csv_header().len(), record.csv_row().len());
    }

    #[test]
    fn test_encode_typed_round_trips() {
        let record = EthernetRecord::new(42, [0; 6], [1; 6], 0x0806);
        let bytes = record.encode_typed();
        let decoded = EthernetProto::decode(bytes.as_slice()).unwrap();
        assert_eq!(42, decoded.timestamp_unix_nanos);
        assert_eq!(0x0806, decoded.ether_type);
    }
}
