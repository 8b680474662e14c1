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
use crate::records::format_ipv4;

#[derive(Clone, PartialEq, Message)]
struct Ipv4Proto {
    #[prost(int64, tag = "1")]
    timestamp_unix_nanos: i64,
    #[prost(string, tag = "2")]
    src: String,
    #[prost(string, tag = "3")]
    dst: String,
    #[prost(uint32, tag = "4")]
    protocol: u32,
    #[prost(uint32, tag = "5")]
    ttl: u32,
}

/// One decoded IPv4 header.
pub struct Ipv4Record {
    proto: Ipv4Proto,
    context: Option<Arc<PacketContext>>,
}

impl Ipv4Record {
    pub fn new(timestamp_unix_nanos: i64, src: [u8; 4], dst: [u8; 4], protocol: u8, ttl: u8) -> Self {
        Self {
            proto: Ipv4Proto {
                timestamp_unix_nanos,
                src: format_ipv4(src),
                dst: format_ipv4(dst),
                protocol: protocol as u32,
                ttl: ttl as u32,
            },
            context: None,
        }
    }

    pub fn from_layer(timestamp_unix_nanos: i64, layer: &Layer) -> Option<Self> {
        match layer {
            Layer::Ipv4 { src, dst, protocol, ttl } => {
                Some(Self::new(timestamp_unix_nanos, *src, *dst, *protocol, *ttl))
            }
            _ => None,
        }
    }

    pub fn decode(bytes: &[u8]) -> netcap_common::error::Result<Self> {
        let proto = Ipv4Proto::decode(bytes)?;
        Ok(Self { proto, context: None })
    }
}

impl AuditRecord for Ipv4Record {
    fn record_type(&self) -> &'static str {
        "IPv4"
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
        self.proto.src.clone()
    }

    fn dst(&self) -> String {
        self.proto.dst.clone()
    }

    fn csv_header(&self) -> &'static [&'static str] {
        &["timestamp_unix_nanos", "src", "dst", "protocol", "ttl"]
    }

    fn csv_row(&self) -> Vec<String> {
        vec![
            self.proto.timestamp_unix_nanos.to_string(),
            self.proto.src.clone(),
            self.proto.dst.clone(),
            self.proto.protocol.to_string(),
            self.proto.ttl.to_string(),
        ]
    }

    fn encode_typed(&self) -> Vec<u8> {
        self.proto.encode_to_vec()
    }

    fn ml_row(&self, encoder: &ValueEncoder) -> Vec<f64> {
        vec![
            encoder.encode_string("ipv4.src", &self.proto.src) as f64,
            encoder.encode_string("ipv4.dst", &self.proto.dst) as f64,
            encoder.encode_i32("ipv4.protocol", self.proto.protocol as i32),
            encoder.encode_i32("ipv4.ttl", self.proto.ttl as i32),
        ]
    }

    fn increment_metrics(&self, metrics: &MetricsContext) {
        metrics.increment_record(self.record_type());
    }
}
