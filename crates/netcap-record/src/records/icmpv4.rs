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
struct Icmpv4Proto {
    #[prost(int64, tag = "1")]
    timestamp_unix_nanos: i64,
    #[prost(uint32, tag = "2")]
    icmp_type: u32,
    #[prost(uint32, tag = "3")]
    icmp_code: u32,
}

/// One decoded ICMPv4 message (echo request/reply, destination unreachable,
/// etc.) — a network-layer control protocol with no transport layer above it.
pub struct Icmpv4Record {
    proto: Icmpv4Proto,
    context: Option<Arc<PacketContext>>,
}

impl Icmpv4Record {
    pub fn new(timestamp_unix_nanos: i64, icmp_type: u8, icmp_code: u8) -> Self {
        Self {
            proto: Icmpv4Proto {
                timestamp_unix_nanos,
                icmp_type: icmp_type as u32,
                icmp_code: icmp_code as u32,
            },
            context: None,
        }
    }

    pub fn from_layer(timestamp_unix_nanos: i64, layer: &Layer) -> Option<Self> {
        match layer {
            Layer::Icmpv4 { icmp_type, icmp_code } => {
                Some(Self::new(timestamp_unix_nanos, *icmp_type, *icmp_code))
            }
            _ => None,
        }
    }

    pub fn decode(bytes: &[u8]) -> netcap_common::error::Result<Self> {
        let proto = Icmpv4Proto::decode(bytes)?;
        Ok(Self { proto, context: None })
    }
}

impl AuditRecord for Icmpv4Record {
    fn record_type(&self) -> &'static str {
        "Icmpv4"
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
        &["timestamp_unix_nanos", "icmp_type", "icmp_code"]
    }

    fn csv_row(&self) -> Vec<String> {
        vec![
            self.proto.timestamp_unix_nanos.to_string(),
            self.proto.icmp_type.to_string(),
            self.proto.icmp_code.to_string(),
        ]
    }

    fn encode_typed(&self) -> Vec<u8> {
        self.proto.encode_to_vec()
    }

    fn ml_row(&self, encoder: &ValueEncoder) -> Vec<f64> {
        vec![
            encoder.encode_i32("icmpv4.icmp_type", self.proto.icmp_type as i32),
            encoder.encode_i32("icmpv4.icmp_code", self.proto.icmp_code as i32),
        ]
    }

    fn increment_metrics(&self, metrics: &MetricsContext) {
        metrics.increment_record(self.record_type());
    }
}

#[cfg(test)]
mod tests_icmpv4 {
    use super::*;

    #[test]
    fn test_from_layer_decodes_echo_request() {
        let layer = Layer::Icmpv4 { icmp_type: 8, icmp_code: 0 };
        let record = Icmpv4Record::from_layer(1, &layer).unwrap();
        assert_eq!(vec!["1", "8", "0"], record.csv_row());
    }
}
