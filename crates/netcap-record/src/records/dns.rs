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
struct DnsProto {
    #[prost(int64, tag = "1")]
    timestamp_unix_nanos: i64,
    #[prost(uint32, tag = "2")]
    transaction_id: u32,
    #[prost(bool, tag = "3")]
    is_response: bool,
    #[prost(uint32, tag = "4")]
    question_count: u32,
    #[prost(uint32, tag = "5")]
    answer_count: u32,
    #[prost(string, repeated, tag = "6")]
    queries: Vec<String>,
}

/// One decoded DNS message, a single-packet application-layer decode over
/// UDP (no reassembly needed for the query/response shapes captured here).
pub struct DnsRecord {
    proto: DnsProto,
    context: Option<Arc<PacketContext>>,
}

impl DnsRecord {
    pub fn new(
        timestamp_unix_nanos: i64,
        transaction_id: u16,
        is_response: bool,
        question_count: u16,
        answer_count: u16,
        queries: Vec<String>,
    ) -> Self {
        Self {
            proto: DnsProto {
                timestamp_unix_nanos,
                transaction_id: transaction_id as u32,
                is_response,
                question_count: question_count as u32,
                answer_count: answer_count as u32,
                queries,
            },
            context: None,
        }
    }

    pub fn from_layer(timestamp_unix_nanos: i64, layer: &Layer) -> Option<Self> {
        match layer {
            Layer::Dns { transaction_id, is_response, question_count, answer_count, queries } => {
                Some(Self::new(
                    timestamp_unix_nanos,
                    *transaction_id,
                    *is_response,
                    *question_count,
                    *answer_count,
                    queries.clone(),
                ))
            }
            _ => None,
        }
    }

    pub fn decode(bytes: &[u8]) -> netcap_common::error::Result<Self> {
        let proto = DnsProto::decode(bytes)?;
        Ok(Self { proto, context: None })
    }
}

impl AuditRecord for DnsRecord {
    fn record_type(&self) -> &'static str {
        "Dns"
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
            "transaction_id",
            "is_response",
            "question_count",
            "answer_count",
            "queries",
        ]
    }

    fn csv_row(&self) -> Vec<String> {
        vec![
            self.proto.timestamp_unix_nanos.to_string(),
            self.proto.transaction_id.to_string(),
            self.proto.is_response.to_string(),
            self.proto.question_count.to_string(),
            self.proto.answer_count.to_string(),
            self.proto.queries.join(";"),
        ]
    }

    fn encode_typed(&self) -> Vec<u8> {
        self.proto.encode_to_vec()
    }

    fn ml_row(&self, encoder: &ValueEncoder) -> Vec<f64> {
        let mut row = vec![
            encoder.encode_i32("dns.question_count", self.proto.question_count as i32),
            encoder.encode_i32("dns.answer_count", self.proto.answer_count as i32),
            if self.proto.is_response { 1.0 } else { 0.0 },
        ];
        for query in &self.proto.queries {
            row.push(encoder.encode_string("dns.query", query) as f64);
        }
        row
    }

    fn increment_metrics(&self, metrics: &MetricsContext) {
        metrics.increment_record(self.record_type());
    }
}

#[cfg(test)]
mod tests_dns {
    use super::*;

    #[test]
    fn test_from_layer_decodes_query() {
        let layer = Layer::Dns {
            transaction_id: 0xbeef,
            is_response: false,
            question_count: 1,
            answer_count: 0,
            queries: vec!["example.com".to_string()],
        };
        let record = DnsRecord::from_layer(1, &layer).unwrap();
        assert_eq!("example.com", record.csv_row()[5]);
    }

    #[test]
    fn test_csv_row_joins_multiple_queries() {
        let record = DnsRecord::new(1, 1, true, 1, 2, vec!["a.com".to_string(), "b.com".to_string()]);
        assert_eq!("a.com;b.com", record.csv_row()[5]);
    }
}
