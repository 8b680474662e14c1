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
use crate::records::{format_ipv4, format_mac};

#[derive(Clone, PartialEq, Message)]
struct ArpProto {
    #[prost(int64, tag = "1")]
    timestamp_unix_nanos: i64,
    #[prost(string, tag = "2")]
    sender_mac: String,
    #[prost(string, tag = "3")]
    sender_ip: String,
    #[prost(string, tag = "4")]
    target_mac: String,
    #[prost(string, tag = "5")]
    target_ip: String,
    #[prost(uint32, tag = "6")]
    operation: u32,
}

/// One decoded ARP request or reply. Sits at the link/network boundary —
/// there is no transport layer above it.
pub struct ArpRecord {
    proto: ArpProto,
    context: Option<Arc<PacketContext>>,
}

impl ArpRecord {
    pub fn new(
        timestamp_unix_nanos: i64,
        sender_mac: [u8; 6],
        sender_ip: [u8; 4],
        target_mac: [u8; 6],
        target_ip: [u8; 4],
        operation: u16,
    ) -> Self {
        Self {
            proto: ArpProto {
                timestamp_unix_nanos,
                sender_mac: format_mac(sender_mac),
                sender_ip: format_ipv4(sender_ip),
                target_mac: format_mac(target_mac),
                target_ip: format_ipv4(target_ip),
                operation: operation as u32,
            },
            context: None,
        }
    }

    pub fn from_layer(timestamp_unix_nanos: i64, layer: &Layer) -> Option<Self> {
        match layer {
            Layer::Arp { sender_mac, sender_ip, target_mac, target_ip, operation } => Some(
                Self::new(timestamp_unix_nanos, *sender_mac, *sender_ip, *target_mac, *target_ip, *operation),
            ),
            _ => None,
        }
    }

    pub fn decode(bytes: &[u8]) -> netcap_common::error::Result<Self> {
        let proto = ArpProto::decode(bytes)?;
        Ok(Self { proto, context: None })
    }
}

impl AuditRecord for ArpRecord {
    fn record_type(&self) -> &'static str {
        "Arp"
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
        self.proto.sender_ip.clone()
    }

    fn dst(&self) -> String {
        self.proto.target_ip.clone()
    }

    fn csv_header(&self) -> &'static [&'static str] {
        &[
            "timestamp_unix_nanos",
            "sender_mac",
            "sender_ip",
            "target_mac",
            "target_ip",
            "operation",
        ]
    }

    fn csv_row(&self) -> Vec<String> {
        vec![
            self.proto.timestamp_unix_nanos.to_string(),
            self.proto.sender_mac.clone(),
            self.proto.sender_ip.clone(),
            self.proto.target_mac.clone(),
            self.proto.target_ip.clone(),
            self.proto.operation.to_string(),
        ]
    }

    fn encode_typed(&self) -> Vec<u8> {
        self.proto.encode_to_vec()
    }

    fn ml_row(&self, encoder: &ValueEncoder) -> Vec<f64> {
        vec![
            encoder.encode_string("arp.sender_ip", &self.proto.sender_ip) as f64,
            encoder.encode_string("arp.target_ip", &self.proto.target_ip) as f64,
            encoder.encode_i32("arp.operation", self.proto.operation as i32),
        ]
    }

    fn increment_metrics(&self, metrics: &MetricsContext) {
        metrics.increment_record(self.record_type());
    }
}

#[cfg(test)]
mod tests_arp {
    use super::*;

    #[test]
    fn test_from_layer_decodes_request() {
        let layer = Layer::Arp {
            sender_mac: [0; 6],
            sender_ip: [10, 0, 0, 1],
            target_mac: [0; 6],
            target_ip: [10, 0, 0, 2],
            operation: 1,
        };
        let record = ArpRecord::from_layer(5, &layer).unwrap();
        assert_eq!("10.0.0.1", record.src());
        assert_eq!("10.0.0.2", record.dst());
    }

    #[test]
    fn test_csv_row_matches_header_len() {
        let record = ArpRecord::new(1, [0; 6], [10, 0, 0, 1], [0; 6], [10, 0, 0, 2], 2);
        assert_eq!(record.csv_header().len(), record.csv_row().len());
    }
}
