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

use std::fmt;

/// One protocol's worth of parsed data within a packet. Decoders match on
/// the [`LayerType`] they care about and pull out the fields relevant to
/// their record; a packet carries the full stack so a decoder can always
/// look outward (e.g. a TCP decoder reading the enclosing IPv4 addresses).
#[derive(Debug, Clone, PartialEq)]
pub enum Layer {
    Ethernet {
        src_mac: [u8; 6],
        dst_mac: [u8; 6],
        ether_type: u16,
    },
    Arp {
        sender_mac: [u8; 6],
        sender_ip: [u8; 4],
        target_mac: [u8; 6],
        target_ip: [u8; 4],
        operation: u16,
    },
    Ipv4 {
        src: [u8; 4],
        dst: [u8; 4],
        protocol: u8,
        ttl: u8,
    },
    Ipv6 {
        src: [u8; 16],
        dst: [u8; 16],
        next_header: u8,
        hop_limit: u8,
    },
    Tcp {
        src_port: u16,
        dst_port: u16,
        sequence_number: u32,
        acknowledgment_number: u32,
        syn: bool,
        ack: bool,
        fin: bool,
        rst: bool,
        window_size: u16,
    },
    Udp {
        src_port: u16,
        dst_port: u16,
        length: u16,
    },
    Icmpv4 {
        icmp_type: u8,
        icmp_code: u8,
    },
    Dns {
        transaction_id: u16,
        is_response: bool,
        question_count: u16,
        answer_count: u16,
        queries: Vec<String>,
    },
    Payload(Vec<u8>),
}

/// Tag identifying a [`Layer`] variant without its fields, used by the
/// decoder registry's dispatch map and by the include/exclude selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerType {
    Ethernet,
    Arp,
    Ipv4,
    Ipv6,
    Tcp,
    Udp,
    Icmpv4,
    Dns,
    Payload,
}

impl Layer {
    pub fn layer_type(&self) -> LayerType {
        match self {
            Layer::Ethernet { .. } => LayerType::Ethernet,
            Layer::Arp { .. } => LayerType::Arp,
            Layer::Ipv4 { .. } => LayerType::Ipv4,
            Layer::Ipv6 { .. } => LayerType::Ipv6,
            Layer::Tcp { .. } => LayerType::Tcp,
            Layer::Udp { .. } => LayerType::Udp,
            Layer::Icmpv4 { .. } => LayerType::Icmpv4,
            Layer::Dns { .. } => LayerType::Dns,
            Layer::Payload(_) => LayerType::Payload,
        }
    }
}

/// A parsed frame with its stack of layers, immutable once built by the
/// pipeline. Created once per raw capture buffer.
#[derive(Debug, Clone)]
pub struct Packet {
    pub timestamp_unix_nanos: i64,
    pub wire_len: u32,
    pub captured_len: u32,
    pub layers: Vec<Layer>,
}

impl Packet {
    pub fn new(timestamp_unix_nanos: i64, wire_len: u32, captured_len: u32, layers: Vec<Layer>) -> Self {
        Self {
            timestamp_unix_nanos,
            wire_len,
            captured_len,
            layers,
        }
    }

    pub fn layer(&self, layer_type: LayerType) -> Option<&Layer> {
        self.layers.iter().find(|l| l.layer_type() == layer_type)
    }

    pub fn layer_types(&self) -> impl Iterator<Item = LayerType> + '_ {
        self.layers.iter().map(Layer::layer_type)
    }
}

/// A directional conversation identifier: the 5-tuple of source/destination
/// address and port plus the transport protocol number. Endpoints are
/// stored in a canonical (sorted) order so that both directions of the same
/// conversation hash and compare equal — the reassembly state for a TCP
/// connection must be reachable from either direction's packets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlowKey {
    pub low_addr: String,
    pub low_port: u16,
    pub high_addr: String,
    pub high_port: u16,
    pub protocol: u8,
}

impl FlowKey {
    pub fn new(src_addr: &str, src_port: u16, dst_addr: &str, dst_port: u16, protocol: u8) -> Self {
        if (src_addr, src_port) <= (dst_addr, dst_port) {
            Self {
                low_addr: src_addr.to_string(),
                low_port: src_port,
                high_addr: dst_addr.to_string(),
                high_port: dst_port,
                protocol,
            }
        } else {
            Self {
                low_addr: dst_addr.to_string(),
                low_port: dst_port,
                high_addr: src_addr.to_string(),
                high_port: src_port,
                protocol,
            }
        }
    }

    /// Stable hash used to pin a flow to a deterministic worker, independent
    /// of which packet direction produced it.
    pub fn worker_hash(&self) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}<->{}:{}/{}",
            self.low_addr, self.low_port, self.high_addr, self.high_port, self.protocol
        )
    }
}

/// Per-packet metadata shared identically across every decoder that
/// processes the same packet. Built once by the pipeline before fan-out and
/// handed around as an `Arc` so no decoder can observe a copy mutated by
/// another decoder.
#[derive(Debug, Clone)]
pub struct PacketContext {
    pub timestamp_unix_nanos: i64,
    pub wire_len: u32,
    pub captured_len: u32,
    pub src_endpoint: Option<String>,
    pub dst_endpoint: Option<String>,
    pub flow_key: Option<FlowKey>,
}

impl PacketContext {
    pub fn from_packet(packet: &Packet) -> Self {
        let (src_endpoint, dst_endpoint, flow_key) = endpoints_and_flow(packet);
        Self {
            timestamp_unix_nanos: packet.timestamp_unix_nanos,
            wire_len: packet.wire_len,
            captured_len: packet.captured_len,
            src_endpoint,
            dst_endpoint,
            flow_key,
        }
    }

    pub fn src(&self) -> String {
        self.src_endpoint.clone().unwrap_or_default()
    }

    pub fn dst(&self) -> String {
        self.dst_endpoint.clone().unwrap_or_default()
    }
}

fn endpoints_and_flow(packet: &Packet) -> (Option<String>, Option<String>, Option<FlowKey>) {
    let (net_src, net_dst, protocol) = match packet.layer(LayerType::Ipv4) {
        Some(Layer::Ipv4 { src, dst, protocol, .. }) => {
            (Some(ipv4_to_string(*src)), Some(ipv4_to_string(*dst)), Some(*protocol))
        }
        _ => match packet.layer(LayerType::Ipv6) {
            Some(Layer::Ipv6 { src, dst, next_header, .. }) => {
                (Some(ipv6_to_string(*src)), Some(ipv6_to_string(*dst)), Some(*next_header))
            }
            _ => (None, None, None),
        },
    };

    let (src_port, dst_port) = match packet.layer(LayerType::Tcp) {
        Some(Layer::Tcp { src_port, dst_port, .. }) => (Some(*src_port), Some(*dst_port)),
        _ => match packet.layer(LayerType::Udp) {
            Some(Layer::Udp { src_port, dst_port, .. }) => (Some(*src_port), Some(*dst_port)),
            _ => (None, None),
        },
    };

    let (src_endpoint, dst_endpoint) = match (&net_src, &net_dst, src_port, dst_port) {
        (Some(s), Some(d), Some(sp), Some(dp)) => {
            (Some(format!("{s}:{sp}")), Some(format!("{d}:{dp}")))
        }
        (Some(s), Some(d), _, _) => (Some(s.clone()), Some(d.clone())),
        _ => match packet.layer(LayerType::Arp) {
            Some(Layer::Arp { sender_ip, target_ip, .. }) => {
                (Some(ipv4_to_string(*sender_ip)), Some(ipv4_to_string(*target_ip)))
            }
            _ => (None, None),
        },
    };

    let flow_key = match (&net_src, &net_dst, src_port, dst_port, protocol) {
        (Some(s), Some(d), Some(sp), Some(dp), Some(proto)) => {
            Some(FlowKey::new(s, sp, d, dp, proto))
        }
        _ => None,
    };

    (src_endpoint, dst_endpoint, flow_key)
}

fn ipv4_to_string(bytes: [u8; 4]) -> String {
    format!("{}.{}.{}.{}", bytes[0], bytes[1], bytes[2], bytes[3])
}

fn ipv6_to_string(bytes: [u8; 16]) -> String {
    std::net::Ipv6Addr::from(bytes).to_string()
}

#[cfg(test)]
mod tests_packet {
    use super::*;

    fn tcp_packet() -> Packet {
        Packet::new(
            1_000,
            64,
            64,
            vec![
                Layer::Ethernet {
                    src_mac: [0; 6],
                    dst_mac: [1; 6],
                    ether_type: 0x0800,
                },
                Layer::Ipv4 {
                    src: [10, 0, 0, 1],
                    dst: [10, 0, 0, 2],
                    protocol: 6,
                    ttl: 64,
                },
                Layer::Tcp {
                    src_port: 51234,
                    dst_port: 443,
                    sequence_number: 1,
                    acknowledgment_number: 0,
                    syn: true,
                    ack: false,
                    fin: false,
                    rst: false,
                    window_size: 65535,
                },
            ],
        )
    }

    #[test]
    fn test_layer_lookup_finds_matching_variant() {
        let packet = tcp_packet();
        assert!(matches!(packet.layer(LayerType::Tcp), Some(Layer::Tcp { .. })));
        assert!(packet.layer(LayerType::Dns).is_none());
    }

    #[test]
    fn test_flow_key_is_direction_independent() {
        let forward = FlowKey::new("10.0.0.1", 51234, "10.0.0.2", 443, 6);
        let reverse = FlowKey::new("10.0.0.2", 443, "10.0.0.1", 51234, 6);
        assert_eq!(forward, reverse);
        assert_eq!(forward.worker_hash(), reverse.worker_hash());
    }

    #[test]
    fn test_packet_context_builds_flow_and_endpoints() {
        let ctx = PacketContext::from_packet(&tcp_packet());
        assert_eq!("10.0.0.1:51234", ctx.src());
        assert_eq!("10.0.0.2:443", ctx.dst());
        assert!(ctx.flow_key.is_some());
    }

    #[test]
    fn test_packet_context_without_ip_layer_has_empty_endpoints() {
        let packet = Packet::new(
            1,
            14,
            14,
            vec![Layer::Ethernet {
                src_mac: [0; 6],
                dst_mac: [1; 6],
                ether_type: 0x88cc,
            }],
        );
        let ctx = PacketContext::from_packet(&packet);
        assert_eq!("", ctx.src());
        assert_eq!("", ctx.dst());
        assert!(ctx.flow_key.is_none());
    }
}
