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

use std::fs::File;
use std::io::Read as _;
use std::path::Path;

use netcap_common::error::{Result, SetupError};
use netcap_common::time::now_unix_nanos;
use pcap::{Active, Capture, Offline};

const PCAP_MAGIC_LE: [u8; 4] = [0xd4, 0xc3, 0xb2, 0xa1];
const PCAP_MAGIC_BE: [u8; 4] = [0xa1, 0xb2, 0xc3, 0xd4];
const PCAPNG_MAGIC: [u8; 4] = [0x0a, 0x0d, 0x0d, 0x0a];

/// One packet lifted off a source, still in raw wire form.
pub struct RawPacket {
    pub timestamp_unix_nanos: i64,
    pub wire_len: u32,
    pub captured_len: u32,
    pub data: Vec<u8>,
}

/// Either an offline capture file or a live interface, behind one interface
/// so the pipeline's reader loop never has to know which it has.
pub trait PacketSource: Send {
    fn next_packet(&mut self) -> Result<Option<RawPacket>>;
    fn describe(&self) -> &str;
}

/// `true` when the first four bytes of `path` match a pcap or pcapng magic
/// number. A non-existent or unreadable path is treated as "not a capture
/// file" — the caller falls back to live-interface resolution, so the error
/// surfaces as a clearer `SourceUnavailable` from `pcap` itself.
fn looks_like_capture_file(path: &Path) -> bool {
    let mut header = [0u8; 4];
    match File::open(path).and_then(|mut f| f.read_exact(&mut header)) {
        Ok(()) => header == PCAP_MAGIC_LE || header == PCAP_MAGIC_BE || header == PCAPNG_MAGIC,
        Err(_) => false,
    }
}

pub struct OfflineSource {
    name: String,
    capture: Capture<Offline>,
}

impl PacketSource for OfflineSource {
    fn next_packet(&mut self) -> Result<Option<RawPacket>> {
        match self.capture.next_packet() {
            Ok(packet) => Ok(Some(RawPacket {
                timestamp_unix_nanos: packet.header.ts.tv_sec * 1_000_000_000
                    + packet.header.ts.tv_usec * 1_000,
                wire_len: packet.header.len,
                captured_len: packet.header.caplen,
                data: packet.data.to_vec(),
            })),
            Err(pcap::Error::NoMorePackets) => Ok(None),
            Err(err) => Err(Box::new(SetupError::new(format!("offline capture read failed: {err}")))),
        }
    }

    fn describe(&self) -> &str {
        &self.name
    }
}

pub struct LiveSource {
    name: String,
    capture: Capture<Active>,
}

impl PacketSource for LiveSource {
    fn next_packet(&mut self) -> Result<Option<RawPacket>> {
        match self.capture.next_packet() {
            Ok(packet) => Ok(Some(RawPacket {
                timestamp_unix_nanos: now_unix_nanos(),
                wire_len: packet.header.len,
                captured_len: packet.header.caplen,
                data: packet.data.to_vec(),
            })),
            Err(pcap::Error::TimeoutExpired) => Ok(None),
            Err(err) => Err(Box::new(SetupError::new(format!("live capture read failed: {err}")))),
        }
    }

    fn describe(&self) -> &str {
        &self.name
    }
}

/// Resolve `source` (an offline file path or a live interface name) into a
/// [`PacketSource`], distinguishing the two by file-magic sniffing rather
/// than extension, then compile and attach `bpf` if one was given.
pub fn resolve(source: &str, bpf: Option<&str>) -> Result<Box<dyn PacketSource>> {
    let path = Path::new(source);
    if path.is_file() && looks_like_capture_file(path) {
        let mut capture = Capture::from_file(path)
            .map_err(|e| Box::new(SetupError::new(format!("failed to open capture file '{source}': {e}"))))?;
        if let Some(filter) = bpf {
            capture
                .filter(filter, true)
                .map_err(|e| Box::new(SetupError::new(format!("invalid BPF filter '{filter}': {e}"))))?;
        }
        return Ok(Box::new(OfflineSource {
            name: source.to_string(),
            capture,
        }));
    }

    let device = Capture::from_device(source)
        .map_err(|e| Box::new(SetupError::new(format!("unknown interface '{source}': {e}"))))?;
    let mut capture = device
        .promisc(true)
        .snaplen(65535)
        .timeout(1000)
        .open()
        .map_err(|e| Box::new(SetupError::new(format!("failed to open interface '{source}': {e}"))))?;
    if let Some(filter) = bpf {
        capture
            .filter(filter, true)
            .map_err(|e| Box::new(SetupError::new(format!("invalid BPF filter '{filter}': {e}"))))?;
    }
    Ok(Box::new(LiveSource {
        name: source.to_string(),
        capture,
    }))
}

#[cfg(test)]
mod tests_source {
    use super::*;
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    #[test]
    fn test_looks_like_capture_file_detects_pcap_magic() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&PCAP_MAGIC_LE).unwrap();
        assert!(looks_like_capture_file(file.path()));
    }

    #[test]
    fn test_looks_like_capture_file_detects_pcapng_magic() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&PCAPNG_MAGIC).unwrap();
        assert!(looks_like_capture_file(file.path()));
    }

    #[test]
    fn test_looks_like_capture_file_rejects_arbitrary_bytes() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"not a capture file").unwrap();
        assert!(!looks_like_capture_file(file.path()));
    }

    #[test]
    fn test_resolve_rejects_unknown_interface() {
        assert!(resolve("definitely-not-a-real-interface-xyz", None).is_err());
    }
}
