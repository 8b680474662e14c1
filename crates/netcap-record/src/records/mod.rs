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

pub mod arp;
pub mod dns;
pub mod ethernet;
pub mod icmpv4;
pub mod ipv4;
pub mod ipv6;
pub mod tcp;
pub mod tcp_connection;
pub mod udp;

pub use arp::ArpRecord;
pub use dns::DnsRecord;
pub use ethernet::EthernetRecord;
pub use icmpv4::Icmpv4Record;
pub use ipv4::Ipv4Record;
pub use ipv6::Ipv6Record;
pub use tcp::TcpRecord;
pub use tcp_connection::TcpConnectionRecord;
pub use udp::UdpRecord;

use crate::audit::AuditRecord;
use netcap_common::error::{Result, SetupError};

/// Reconstruct a previously-encoded record from its `record_type` tag and
/// the raw protobuf bytes stored after the length-delimited frame prefix.
/// The tag is the same string each record's `record_type()` returns, read
/// back from the file's [`crate::header::RecordHeader`].
pub fn decode_record(record_type: &str, bytes: &[u8]) -> Result<Box<dyn AuditRecord>> {
    match record_type {
        "Ethernet" => Ok(Box::new(EthernetRecord::decode(bytes)?)),
        "Arp" => Ok(Box::new(ArpRecord::decode(bytes)?)),
        "IPv4" => Ok(Box::new(Ipv4Record::decode(bytes)?)),
        "IPv6" => Ok(Box::new(Ipv6Record::decode(bytes)?)),
        "Tcp" => Ok(Box::new(TcpRecord::decode(bytes)?)),
        "Udp" => Ok(Box::new(UdpRecord::decode(bytes)?)),
        "Icmpv4" => Ok(Box::new(Icmpv4Record::decode(bytes)?)),
        "Dns" => Ok(Box::new(DnsRecord::decode(bytes)?)),
        "TcpConnection" => Ok(Box::new(TcpConnectionRecord::decode(bytes)?)),
        other => Err(Box::new(SetupError::new(format!("unrecognized record type '{other}'")))),
    }
}

pub(crate) fn format_mac(bytes: [u8; 6]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}

pub(crate) fn format_ipv4(bytes: [u8; 4]) -> String {
    format!("{}.{}.{}.{}", bytes[0], bytes[1], bytes[2], bytes[3])
}

pub(crate) fn format_ipv6(bytes: [u8; 16]) -> String {
    std::net::Ipv6Addr::from(bytes).to_string()
}

#[cfg(test)]
mod tests_format_helpers {
    use super::*;

    #[test]
    fn test_format_mac() {
        assert_eq!(
            "00:11:22:33:44:55",
            format_mac([0x00, 0x11, 0x22, 0x33, 0x44, 0x55])
        );
    }

    #[test]
    fn test_format_ipv4() {
        assert_eq!("192.168.1.1", format_ipv4([192, 168, 1, 1]));
    }
}

#[cfg(test)]
mod tests_decode_record {
    use super::*;
    use crate::packet::Layer;

    #[test]
    fn test_decode_record_round_trips_ethernet() {
        let layer = Layer::Ethernet { src_mac: [0, 1, 2, 3, 4, 5], dst_mac: [6, 7, 8, 9, 10, 11], ether_type: 0x0800 };
        let original = EthernetRecord::from_layer(1_000, &layer).unwrap();
        let bytes = original.encode_typed();

        let decoded = decode_record(original.record_type(), &bytes).unwrap();
        assert_eq!("Ethernet", decoded.record_type());
        assert_eq!(original.csv_row(), decoded.csv_row());
    }

    #[test]
    fn test_decode_record_round_trips_tcp_connection() {
        let original = TcpConnectionRecord::new(
            "10.0.0.1:51234".to_string(),
            "10.0.0.2:443".to_string(),
            1_000,
            5_000,
            120,
            480,
            4,
            "FIN",
        );
        let bytes = original.encode_typed();

        let decoded = decode_record("TcpConnection", &bytes).unwrap();
        assert_eq!(original.csv_row(), decoded.csv_row());
    }

    #[test]
    fn test_decode_record_rejects_unknown_type() {
        assert!(decode_record("NotARealType", &[]).is_err());
    }
}
