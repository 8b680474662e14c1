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
use crate::packet::PacketContext;

#[derive(Clone, PartialEq, Message)]
struct TcpConnectionProto {
    #[prost(string, tag = "1")]
    src_endpoint: String,
    #[prost(string, tag = "2")]
    dst_endpoint: String,
    #[prost(int64, tag = "3")]
    first_timestamp_unix_nanos: i64,
    #[prost(int64, tag = "4")]
    last_timestamp_unix_nanos: i64,
    #[prost(int64, tag = "5")]
    duration_nanos: i64,
    #[prost(uint64, tag = "6")]
    bytes_client_to_server: u64,
    #[prost(uint64, tag = "7")]
    bytes_server_to_client: u64,
    #[prost(uint32, tag = "8")]
    packet_count: u32,
    #[prost(string, tag = "9")]
    terminated_by: String,
}

/// A reassembled TCP conversation, emitted once by the stream decoder when
/// the connection terminates (FIN/RST) or goes idle past its timeout.
pub struct TcpConnectionRecord {
    proto: TcpConnectionProto,
    context: Option<Arc<PacketContext>>,
}

impl TcpConnectionRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        src_endpoint: String,
        dst_endpoint: String,
        first_timestamp_unix_nanos: i64,
        last_timestamp_unix_nanos: i64,
        bytes_client_to_server: u64,
        bytes_server_to_client: u64,
        packet_count: u32,
        terminated_by: &'static str,
    ) -> Self {
        Self {
            proto: TcpConnectionProto {
                src_endpoint,
                dst_endpoint,
                first_timestamp_unix_nanos,
                last_timestamp_unix_nanos,
                duration_nanos: last_timestamp_unix_nanos - first_timestamp_unix_nanos,
                bytes_client_to_server,
                bytes_server_to_client,
                packet_count,
                terminated_by: terminated_by.to_string(),
            },
            context: None,
        }
    }

    pub fn decode(bytes: &[u8]) -> netcap_common::error::Result<Self> {
        let proto = TcpConnectionProto::decode(bytes)?;
        Ok(Self { proto, context: None })
    }
}

impl AuditRecord for TcpConnectionRecord {
    fn record_type(&self) -> &'static str {
        "TcpConnection"
    }

    fn timestamp_unix_nanos(&self) -> i64 {
        self.proto.first_timestamp_unix_nanos
    }

    fn attach_context(&mut self, ctx: Arc<PacketContext>) {
        self.context = Some(ctx);
    }

    fn context(&self) -> Option<&Arc<PacketContext>> {
        self.context.as_ref()
    }

    fn src(&self) -> String {
        self.proto.src_endpoint.clone()
    }

    fn dst(&self) -> String {
        self.proto.dst_endpoint.clone()
    }

    fn csv_header(&self) -> &'static [&'static str] {
        &[
            "src_endpoint",
            "dst_endpoint",
            "first_timestamp_unix_nanos",
            "last_timestamp_unix_nanos",
            "duration_nanos",
            "bytes_client_to_server",
            "bytes_server_to_client",
            "packet_count",
            "terminated_by",
        ]
    }

    fn csv_row(&self) -> Vec<String> {
        vec![
            self.proto.src_endpoint.clone(),
            self.proto.dst_endpoint.clone(),
            self.proto.first_timestamp_unix_nanos.to_string(),
            self.proto.last_timestamp_unix_nanos.to_string(),
            self.proto.duration_nanos.to_string(),
            self.proto.bytes_client_to_server.to_string(),
            self.proto.bytes_server_to_client.to_string(),
            self.proto.packet_count.to_string(),
            self.proto.terminated_by.clone(),
        ]
    }

    fn encode_typed(&self) -> Vec<u8> {
        self.proto.encode_to_vec()
    }

    fn ml_row(&self, encoder: &ValueEncoder) -> Vec<f64> {
        vec![
            encoder.encode_i64("tcp_connection.duration_nanos", self.proto.duration_nanos),
            encoder.encode_i64("tcp_connection.bytes_client_to_server", self.proto.bytes_client_to_server as i64),
            encoder.encode_i64("tcp_connection.bytes_server_to_client", self.proto.bytes_server_to_client as i64),
            encoder.encode_i32("tcp_connection.packet_count", self.proto.packet_count as i32),
            encoder.encode_string("tcp_connection.terminated_by", &self.proto.terminated_by) as f64,
        ]
    }

    fn increment_metrics(&self, metrics: &MetricsContext) {
        metrics.increment_record(self.record_type());
    }
}

#[cfg(test)]
mod tests_tcp_connection {
    use super::*;

    #[test]
    fn test_duration_is_last_minus_first() {
        let record = TcpConnectionRecord::new(
            "10.0.0.1:51234".to_string(),
            "10.0.0.2:443".to_string(),
            1_000,
            5_000,
            120,
            480,
            4,
            "FIN",
        );
        assert_eq!(4_000, record.csv_row()[4].parse::<i64>().unwrap());
        assert_eq!(1_000, record.timestamp_unix_nanos());
    }

    #[test]
    fn test_src_dst_come_from_stored_endpoints_not_context() {
        let record = TcpConnectionRecord::new(
            "10.0.0.1:51234".to_string(),
            "10.0.0.2:443".to_string(),
            0,
            0,
            0,
            0,
            1,
            "RST",
        );
        assert_eq!("10.0.0.1:51234", record.src());
        assert_eq!("10.0.0.2:443", record.dst());
    }
}
