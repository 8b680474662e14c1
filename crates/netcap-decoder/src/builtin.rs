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

use netcap_common::error::{Result, SetupError};
use netcap_metrics::MetricsContext;
use netcap_record::records::{
    ArpRecord, DnsRecord, EthernetRecord, Icmpv4Record, Ipv4Record, Ipv6Record, TcpRecord, UdpRecord,
};
use netcap_record::{AuditRecord, LayerType};
use netcap_writer::RecordWriter;

use crate::layer::{DecodeHandler, LayerDecoder};
use crate::stream::TcpConnectionDecoder;

/// Name, registered in definition order, of every decoder this build ships.
/// `TcpConnection` is last because it is a stream decoder, not a layer
/// decoder, but participates in the same include/exclude selection.
pub const DEFAULT_DECODER_NAMES: &[&str] = &[
    "Ethernet",
    "Arp",
    "IPv4",
    "IPv6",
    "Tcp",
    "Udp",
    "Icmpv4",
    "Dns",
    "TcpConnection",
];

/// The default idle timeout for in-flight TCP reassembly state: 120 seconds.
pub const DEFAULT_IDLE_TIMEOUT_NANOS: i64 = 120 * 1_000_000_000;

/// The default upper bound on concurrently tracked TCP flows.
pub const DEFAULT_MAX_OPEN_FLOWS: usize = 4096;

struct LayerSpec {
    name: &'static str,
    layer_type: LayerType,
    record_type: &'static str,
    description: &'static str,
    handler: fn(i64, &netcap_record::Layer) -> Option<Box<dyn AuditRecord>>,
}

fn layer_spec(name: &str) -> Option<LayerSpec> {
    match name {
        "Ethernet" => Some(LayerSpec {
            name: "Ethernet",
            layer_type: LayerType::Ethernet,
            record_type: "Ethernet",
            description: "link layer frame headers",
            handler: |ts, layer| EthernetRecord::from_layer(ts, layer).map(|r| Box::new(r) as Box<dyn AuditRecord>),
        }),
        "Arp" => Some(LayerSpec {
            name: "Arp",
            layer_type: LayerType::Arp,
            record_type: "Arp",
            description: "address resolution requests and replies",
            handler: |ts, layer| ArpRecord::from_layer(ts, layer).map(|r| Box::new(r) as Box<dyn AuditRecord>),
        }),
        "IPv4" => Some(LayerSpec {
            name: "IPv4",
            layer_type: LayerType::Ipv4,
            record_type: "IPv4",
            description: "IPv4 packet headers",
            handler: |ts, layer| Ipv4Record::from_layer(ts, layer).map(|r| Box::new(r) as Box<dyn AuditRecord>),
        }),
        "IPv6" => Some(LayerSpec {
            name: "IPv6",
            layer_type: LayerType::Ipv6,
            record_type: "IPv6",
            description: "IPv6 packet headers",
            handler: |ts, layer| Ipv6Record::from_layer(ts, layer).map(|r| Box::new(r) as Box<dyn AuditRecord>),
        }),
        "Tcp" => Some(LayerSpec {
            name: "Tcp",
            layer_type: LayerType::Tcp,
            record_type: "Tcp",
            description: "TCP segment headers",
            handler: |ts, layer| TcpRecord::from_layer(ts, layer).map(|r| Box::new(r) as Box<dyn AuditRecord>),
        }),
        "Udp" => Some(LayerSpec {
            name: "Udp",
            layer_type: LayerType::Udp,
            record_type: "Udp",
            description: "UDP datagram headers",
            handler: |ts, layer| UdpRecord::from_layer(ts, layer).map(|r| Box::new(r) as Box<dyn AuditRecord>),
        }),
        "Icmpv4" => Some(LayerSpec {
            name: "Icmpv4",
            layer_type: LayerType::Icmpv4,
            record_type: "Icmpv4",
            description: "ICMPv4 control messages",
            handler: |ts, layer| Icmpv4Record::from_layer(ts, layer).map(|r| Box::new(r) as Box<dyn AuditRecord>),
        }),
        "Dns" => Some(LayerSpec {
            name: "Dns",
            layer_type: LayerType::Dns,
            record_type: "Dns",
            description: "single-packet DNS queries and responses",
            handler: |ts, layer| DnsRecord::from_layer(ts, layer).map(|r| Box::new(r) as Box<dyn AuditRecord>),
        }),
        _ => None,
    }
}

/// Build the layer decoder named `name`, wired to an already-opened writer.
/// Returns a [`SetupError`] for any name other than one of
/// [`DEFAULT_DECODER_NAMES`]'s layer entries (everything but
/// `"TcpConnection"`, which is a stream decoder — see
/// [`build_tcp_connection_decoder`]).
pub fn build_layer_decoder(name: &str, writer: RecordWriter, export: bool, metrics: MetricsContext) -> Result<LayerDecoder> {
    let spec = layer_spec(name).ok_or_else(|| Box::new(SetupError::new(format!("no layer decoder named '{name}'"))))?;
    let handler: Box<DecodeHandler> = Box::new(spec.handler);

    LayerDecoder::builder()
        .with_name(spec.name)
        .with_layer_type(spec.layer_type)
        .with_record_type(spec.record_type)
        .with_description(spec.description)
        .with_handler(handler)
        .with_writer(writer)
        .with_export(export)
        .with_metrics(metrics)
        .try_build()
}

/// Build the `TcpConnection` stream decoder, wired to an already-opened
/// writer.
pub fn build_tcp_connection_decoder(
    writer: RecordWriter,
    max_open_flows: usize,
    idle_timeout_nanos: i64,
    export: bool,
    metrics: MetricsContext,
) -> TcpConnectionDecoder {
    TcpConnectionDecoder::new(writer, max_open_flows, idle_timeout_nanos, export, metrics)
}

#[cfg(test)]
mod tests_builtin {
    use super::*;
    use netcap_record::Layer;
    use netcap_writer::{RecordWriterBuilder, RecordWriterProperties};
    use tempfile::tempdir;

    #[test]
    fn test_default_decoder_names_cover_every_builtin_protocol() {
        assert_eq!(9, DEFAULT_DECODER_NAMES.len());
        assert!(DEFAULT_DECODER_NAMES.contains(&"TcpConnection"));
    }

    #[test]
    fn test_build_layer_decoder_rejects_unknown_name() {
        let dir = tempdir().unwrap();
        let properties = RecordWriterProperties::builder()
            .with_name("Ppp")
            .with_out_dir(dir.path().to_path_buf())
            .build();
        let writer = RecordWriterBuilder::default().with_properties(properties).build();
        assert!(build_layer_decoder("Ppp", writer, false, MetricsContext::noop()).is_err());
    }

    #[test]
    fn test_build_layer_decoder_decodes_matching_layer() {
        let dir = tempdir().unwrap();
        let properties = RecordWriterProperties::builder()
            .with_name("Udp")
            .with_out_dir(dir.path().to_path_buf())
            .build();
        let writer = RecordWriterBuilder::default().with_properties(properties).build();
        let decoder = build_layer_decoder("Udp", writer, false, MetricsContext::noop()).unwrap();
        decoder.write_header("eth0", "0.1.0").unwrap();

        let layer = Layer::Udp {
            src_port: 53,
            dst_port: 12345,
            length: 32,
        };
        decoder.decode(None, 1_000, &layer).unwrap();
        let (_, bytes) = decoder.destroy().unwrap();
        assert!(bytes > 0);
    }
}
