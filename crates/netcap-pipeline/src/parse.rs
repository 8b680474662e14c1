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
// File created: 2024-11-09
// Last updated: 2024-11-09
//

use etherparse::{LinkSlice, NetSlice, SlicedPacket, TransportSlice};
use netcap_record::{Layer, Packet};

const ETHER_TYPE_ARP: u16 = 0x0806;
const IP_PROTOCOL_ICMPV4: u8 = 1;
const DNS_PORT: u16 = 53;

/// Parse one raw capture buffer into a [`Packet`]. Uses `etherparse` for the
/// link/network/transport layers it understands without copying the payload;
/// ARP, ICMPv4, and DNS are read directly off the remaining bytes since they
/// sit above what `etherparse`'s slicer decodes. A buffer `etherparse` can't
/// make sense of at all becomes a single opaque [`Layer::Payload`] rather
/// than an error — a malformed frame is dropped by the registry as an
/// unknown layer, not a reason to abort the run.
pub fn parse_packet(timestamp_unix_nanos: i64, wire_len: u32, captured_len: u32, data: &[u8]) -> Packet {
    let layers = match SlicedPacket::from_ethernet(data) {
        Ok(sliced) => build_layers(&sliced),
        Err(_) => vec![Layer::Payload(data.to_vec())],
    };
    Packet::new(timestamp_unix_nanos, wire_len, captured_len, layers)
}

fn build_layers(sliced: &SlicedPacket) -> Vec<Layer> {
    let mut layers = Vec::with_capacity(4);
    let mut ether_type: Option<u16> = None;

    if let Some(LinkSlice::Ethernet2(eth)) = &sliced.link {
        let et: u16 = eth.ether_type().into();
        ether_type = Some(et);
        layers.push(Layer::Ethernet {
            src_mac: eth.source(),
            dst_mac: eth.destination(),
            ether_type: et,
        });
    }

    let mut ip_protocol: Option<u8> = None;
    match &sliced.net {
        Some(NetSlice::Ipv4(ipv4)) => {
            let header = ipv4.header();
            let protocol: u8 = header.protocol().into();
            ip_protocol = Some(protocol);
            layers.push(Layer::Ipv4 {
                src: header.source(),
                dst: header.destination(),
                protocol,
                ttl: header.ttl(),
            });
        }
        Some(NetSlice::Ipv6(ipv6)) => {
            let header = ipv6.header();
            let next_header: u8 = header.next_header().into();
            ip_protocol = Some(next_header);
            layers.push(Layer::Ipv6 {
                src: header.source(),
                dst: header.destination(),
                next_header,
                hop_limit: header.hop_limit(),
            });
        }
        None => {}
    }

    let mut udp_ports: Option<(u16, u16)> = None;
    match &sliced.transport {
        Some(TransportSlice::Tcp(tcp)) => {
            layers.push(Layer::Tcp {
                src_port: tcp.source_port(),
                dst_port: tcp.destination_port(),
                sequence_number: tcp.sequence_number(),
                acknowledgment_number: tcp.acknowledgment_number(),
                syn: tcp.syn(),
                ack: tcp.ack(),
                fin: tcp.fin(),
                rst: tcp.rst(),
                window_size: tcp.window_size(),
            });
        }
        Some(TransportSlice::Udp(udp)) => {
            let src_port = udp.source_port();
            let dst_port = udp.destination_port();
            udp_ports = Some((src_port, dst_port));
            layers.push(Layer::Udp {
                src_port,
                dst_port,
                length: udp.length(),
            });
        }
        _ => {}
    }

    let payload: &[u8] = match &sliced.transport {
        Some(TransportSlice::Tcp(tcp)) => tcp.payload(),
        Some(TransportSlice::Udp(udp)) => udp.payload(),
        _ => match sliced.ip_payload() {
            Some(ip_payload) => ip_payload.payload,
            None => sliced.ether_payload().map(|p| p.payload).unwrap_or(&[]),
        },
    };
    if sliced.net.is_none() && ether_type == Some(ETHER_TYPE_ARP) {
        if let Some(arp) = parse_arp(payload) {
            layers.push(arp);
        }
    } else if ip_protocol == Some(IP_PROTOCOL_ICMPV4) {
        if let Some(icmp) = parse_icmpv4(payload) {
            layers.push(icmp);
        }
    } else if let Some((src_port, dst_port)) = udp_ports {
        if src_port == DNS_PORT || dst_port == DNS_PORT {
            if let Some(dns) = parse_dns(payload) {
                layers.push(dns);
            }
        }
    }

    layers
}

fn parse_arp(bytes: &[u8]) -> Option<Layer> {
    if bytes.len() < 28 {
        return None;
    }
    let hardware_type = u16::from_be_bytes([bytes[0], bytes[1]]);
    let protocol_type = u16::from_be_bytes([bytes[2], bytes[3]]);
    if hardware_type != 1 || protocol_type != 0x0800 || bytes[4] != 6 || bytes[5] != 4 {
        return None;
    }
    let operation = u16::from_be_bytes([bytes[6], bytes[7]]);
    let mut sender_mac = [0u8; 6];
    sender_mac.copy_from_slice(&bytes[8..14]);
    let mut sender_ip = [0u8; 4];
    sender_ip.copy_from_slice(&bytes[14..18]);
    let mut target_mac = [0u8; 6];
    target_mac.copy_from_slice(&bytes[18..24]);
    let mut target_ip = [0u8; 4];
    target_ip.copy_from_slice(&bytes[24..28]);
    Some(Layer::Arp {
        sender_mac,
        sender_ip,
        target_mac,
        target_ip,
        operation,
    })
}

fn parse_icmpv4(bytes: &[u8]) -> Option<Layer> {
    if bytes.len() < 2 {
        return None;
    }
    Some(Layer::Icmpv4 {
        icmp_type: bytes[0],
        icmp_code: bytes[1],
    })
}

fn parse_dns(bytes: &[u8]) -> Option<Layer> {
    if bytes.len() < 12 {
        return None;
    }
    let transaction_id = u16::from_be_bytes([bytes[0], bytes[1]]);
    let flags = u16::from_be_bytes([bytes[2], bytes[3]]);
    let is_response = flags & 0x8000 != 0;
    let question_count = u16::from_be_bytes([bytes[4], bytes[5]]);
    let answer_count = u16::from_be_bytes([bytes[6], bytes[7]]);

    let mut offset = 12usize;
    let mut queries = Vec::new();
    for _ in 0..question_count {
        match read_dns_name(bytes, offset) {
            Some((name, next_offset)) if bytes.len() >= next_offset + 4 => {
                queries.push(name);
                offset = next_offset + 4;
            }
            _ => break,
        }
    }

    Some(Layer::Dns {
        transaction_id,
        is_response,
        question_count,
        answer_count,
        queries,
    })
}

/// Reads one question-section name starting at `start`. Bails out (returning
/// `None`) on a compression pointer rather than following it — compression
/// only ever appears past the first question in practice, and a caller that
/// hits one simply stops collecting further query names for this packet.
fn read_dns_name(bytes: &[u8], start: usize) -> Option<(String, usize)> {
    let mut labels = Vec::new();
    let mut offset = start;
    loop {
        let len = *bytes.get(offset)? as usize;
        if len == 0 {
            offset += 1;
            break;
        }
        if len & 0xc0 == 0xc0 {
            return None;
        }
        offset += 1;
        let label = bytes.get(offset..offset + len)?;
        labels.push(String::from_utf8_lossy(label).to_string());
        offset += len;
    }
    Some((labels.join("."), offset))
}

#[cfg(test)]
mod tests_parse {
    use super::*;
    use netcap_record::LayerType;

    fn ethernet_header(dst: [u8; 6], src: [u8; 6], ether_type: u16) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(14);
        bytes.extend_from_slice(&dst);
        bytes.extend_from_slice(&src);
        bytes.extend_from_slice(&ether_type.to_be_bytes());
        bytes
    }

    #[test]
    fn test_parse_arp_packet() {
        let mut bytes = ethernet_header([0xff; 6], [1; 6], ETHER_TYPE_ARP);
        bytes.extend_from_slice(&1u16.to_be_bytes()); // hardware type: ethernet
        bytes.extend_from_slice(&0x0800u16.to_be_bytes()); // protocol type: ipv4
        bytes.push(6);
        bytes.push(4);
        bytes.extend_from_slice(&1u16.to_be_bytes()); // operation: request
        bytes.extend_from_slice(&[1; 6]);
        bytes.extend_from_slice(&[10, 0, 0, 1]);
        bytes.extend_from_slice(&[0; 6]);
        bytes.extend_from_slice(&[10, 0, 0, 2]);

        let packet = parse_packet(1_000, bytes.len() as u32, bytes.len() as u32, &bytes);
        assert!(packet.layer(LayerType::Ethernet).is_some());
        assert!(matches!(packet.layer(LayerType::Arp), Some(Layer::Arp { operation: 1, .. })));
    }

    #[test]
    fn test_parse_unrecognizable_bytes_falls_back_to_payload() {
        let bytes = vec![0u8; 3];
        let packet = parse_packet(1_000, 3, 3, &bytes);
        assert_eq!(1, packet.layers.len());
        assert!(matches!(packet.layers[0], Layer::Payload(_)));
    }

    #[test]
    fn test_read_dns_name_stops_on_compression_pointer() {
        let bytes = [0xc0, 0x0c];
        assert!(read_dns_name(&bytes, 0).is_none());
    }

    #[test]
    fn test_read_dns_name_joins_labels() {
        let mut bytes = Vec::new();
        bytes.push(3);
        bytes.extend_from_slice(b"www");
        bytes.push(7);
        bytes.extend_from_slice(b"example");
        bytes.push(3);
        bytes.extend_from_slice(b"com");
        bytes.push(0);

        let (name, offset) = read_dns_name(&bytes, 0).unwrap();
        assert_eq!("www.example.com", name);
        assert_eq!(bytes.len(), offset);
    }
}
