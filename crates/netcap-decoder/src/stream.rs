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
use std::sync::Mutex;

use indexmap::IndexMap;
use netcap_common::error::{Result, SchemaViolationError};
use netcap_metrics::MetricsContext;
use netcap_record::records::TcpConnectionRecord;
use netcap_record::{AuditRecord, FlowKey, Layer, PacketContext};
use netcap_writer::RecordWriter;

/// Reassembly progress for one in-flight flow, keyed by [`FlowKey`] in the
/// owning [`TcpConnectionDecoder`].
struct StreamState {
    client_endpoint: String,
    src_endpoint: String,
    dst_endpoint: String,
    first_timestamp_unix_nanos: i64,
    last_timestamp_unix_nanos: i64,
    bytes_client_to_server: u64,
    bytes_server_to_client: u64,
    packet_count: u32,
}

impl StreamState {
    fn observe(&mut self, ctx: &PacketContext) {
        self.last_timestamp_unix_nanos = ctx.timestamp_unix_nanos;
        self.packet_count += 1;
        if ctx.src() == self.client_endpoint {
            self.bytes_client_to_server += ctx.wire_len as u64;
        } else {
            self.bytes_server_to_client += ctx.wire_len as u64;
        }
    }

    fn into_record(self, terminated_by: &'static str) -> TcpConnectionRecord {
        TcpConnectionRecord::new(
            self.src_endpoint,
            self.dst_endpoint,
            self.first_timestamp_unix_nanos,
            self.last_timestamp_unix_nanos,
            self.bytes_client_to_server,
            self.bytes_server_to_client,
            self.packet_count,
            terminated_by,
        )
    }
}

/// Contract shared by every stateful, flow-keyed decoder. `update` is called
/// once per packet on the matching layer; `sweep_idle` is called
/// opportunistically so stale flows are purged without a dedicated timer
/// thread; `destroy` flushes any still-open flows before closing the writer.
pub trait StreamDecoder: Send + Sync {
    fn update(&self, ctx: Arc<PacketContext>, layer: &Layer) -> Result<()>;
    fn sweep_idle(&self, now_unix_nanos: i64) -> Result<()>;
    fn destroy(&self) -> Result<(String, u64)>;
}

/// Reassembles TCP segments into one [`TcpConnectionRecord`] per
/// conversation, emitted on FIN/RST, on idle timeout, or (for whatever is
/// still open) at shutdown.
pub struct TcpConnectionDecoder {
    states: Mutex<IndexMap<FlowKey, StreamState>>,
    writer: Mutex<RecordWriter>,
    max_open_flows: usize,
    idle_timeout_nanos: i64,
    export: bool,
    metrics: MetricsContext,
}

impl TcpConnectionDecoder {
    pub fn new(writer: RecordWriter, max_open_flows: usize, idle_timeout_nanos: i64, export: bool, metrics: MetricsContext) -> Self {
        Self {
            states: Mutex::new(IndexMap::new()),
            writer: Mutex::new(writer),
            max_open_flows,
            idle_timeout_nanos,
            export,
            metrics,
        }
    }

    pub fn write_header(&self, source: &str, tool_version: &str) -> Result<()> {
        self.writer.lock().unwrap().write_header("TcpConnection", source, tool_version)
    }

    fn emit(&self, state: StreamState, terminated_by: &'static str) -> Result<()> {
        let record = state.into_record(terminated_by);

        if record.csv_header().len() != record.csv_row().len() {
            return Err(Box::new(SchemaViolationError::new(format!(
                "TcpConnection record declared {} csv columns but {} row values",
                record.csv_header().len(),
                record.csv_row().len(),
            ))));
        }

        if self.export {
            record.increment_metrics(&self.metrics);
        }
        self.writer.lock().unwrap().write_record(&record)
    }

    fn evict_idle_locked(&self, states: &mut IndexMap<FlowKey, StreamState>, now_unix_nanos: i64) -> Vec<StreamState> {
        let idle_keys: Vec<FlowKey> = states
            .iter()
            .filter(|(_, state)| now_unix_nanos - state.last_timestamp_unix_nanos > self.idle_timeout_nanos)
            .map(|(key, _)| key.clone())
            .collect();

        idle_keys
            .into_iter()
            .filter_map(|key| states.shift_remove(&key))
            .collect()
    }
}

impl StreamDecoder for TcpConnectionDecoder {
    fn update(&self, ctx: Arc<PacketContext>, layer: &Layer) -> Result<()> {
        let (fin, rst) = match layer {
            Layer::Tcp { fin, rst, .. } => (*fin, *rst),
            _ => return Ok(()),
        };
        let flow_key = match &ctx.flow_key {
            Some(key) => key.clone(),
            None => return Ok(()),
        };

        let mut finished: Vec<(StreamState, &'static str)> = Vec::new();

        {
            let mut states = self.states.lock().unwrap();
            finished.extend(
                self.evict_idle_locked(&mut states, ctx.timestamp_unix_nanos)
                    .into_iter()
                    .map(|state| (state, "IdleTimeout")),
            );

            if !states.contains_key(&flow_key) && states.len() >= self.max_open_flows {
                if let Some((_, evicted)) = states.shift_remove_index(0) {
                    finished.push((evicted, "Evicted"));
                }
            }

            let state = states.entry(flow_key.clone()).or_insert_with(|| StreamState {
                client_endpoint: ctx.src(),
                src_endpoint: ctx.src(),
                dst_endpoint: ctx.dst(),
                first_timestamp_unix_nanos: ctx.timestamp_unix_nanos,
                last_timestamp_unix_nanos: ctx.timestamp_unix_nanos,
                bytes_client_to_server: 0,
                bytes_server_to_client: 0,
                packet_count: 0,
            });
            state.observe(&ctx);

            if fin || rst {
                if let Some(closed) = states.shift_remove(&flow_key) {
                    finished.push((closed, if fin { "FIN" } else { "RST" }));
                }
            }
        }

        for (state, label) in finished {
            self.emit(state, label)?;
        }
        Ok(())
    }

    fn sweep_idle(&self, now_unix_nanos: i64) -> Result<()> {
        let terminated = {
            let mut states = self.states.lock().unwrap();
            self.evict_idle_locked(&mut states, now_unix_nanos)
        };
        for state in terminated {
            self.emit(state, "IdleTimeout")?;
        }
        Ok(())
    }

    fn destroy(&self) -> Result<(String, u64)> {
        let remaining: Vec<StreamState> = {
            let mut states = self.states.lock().unwrap();
            states.drain(..).map(|(_, state)| state).collect()
        };
        for state in remaining {
            self.emit(state, "Unterminated")?;
        }
        self.writer.lock().unwrap().close()
    }
}

#[cfg(test)]
mod tests_stream {
    use super::*;
    use netcap_record::Packet;
    use netcap_writer::{RecordWriterBuilder, RecordWriterProperties};
    use tempfile::tempdir;

    fn tcp_ctx(src_port: u16, dst_port: u16, timestamp: i64, fin: bool, rst: bool) -> (Arc<PacketContext>, Layer) {
        let layer = Layer::Tcp {
            src_port,
            dst_port,
            sequence_number: 0,
            acknowledgment_number: 0,
            syn: false,
            ack: true,
            fin,
            rst,
            window_size: 65535,
        };
        let packet = Packet::new(
            timestamp,
            64,
            64,
            vec![
                Layer::Ipv4 {
                    src: [10, 0, 0, 1],
                    dst: [10, 0, 0, 2],
                    protocol: 6,
                    ttl: 64,
                },
                layer.clone(),
            ],
        );
        (Arc::new(PacketContext::from_packet(&packet)), layer)
    }

    fn decoder(dir: &std::path::Path, max_open_flows: usize, idle_timeout_nanos: i64) -> TcpConnectionDecoder {
        let properties = RecordWriterProperties::builder()
            .with_name("TcpConnection")
            .with_out_dir(dir.to_path_buf())
            .build();
        let writer = RecordWriterBuilder::default().with_properties(properties).build();
        TcpConnectionDecoder::new(writer, max_open_flows, idle_timeout_nanos, false, MetricsContext::noop())
    }

    #[test]
    fn test_fin_emits_exactly_one_record() {
        let dir = tempdir().unwrap();
        let decoder = decoder(dir.path(), 16, 1_000_000_000);
        decoder.write_header("eth0", "0.1.0").unwrap();

        let (ctx1, layer1) = tcp_ctx(51234, 443, 1_000, false, false);
        decoder.update(ctx1, &layer1).unwrap();
        let (ctx2, layer2) = tcp_ctx(443, 51234, 2_000, true, false);
        decoder.update(ctx2, &layer2).unwrap();

        let (_, bytes) = decoder.destroy().unwrap();
        assert!(bytes > 0);
    }

    #[test]
    fn test_idle_timeout_evicts_stale_flow() {
        let dir = tempdir().unwrap();
        let decoder = decoder(dir.path(), 16, 500);
        decoder.write_header("eth0", "0.1.0").unwrap();

        let (ctx1, layer1) = tcp_ctx(51234, 443, 1_000, false, false);
        decoder.update(ctx1, &layer1).unwrap();
        decoder.sweep_idle(10_000).unwrap();

        let (name, bytes) = decoder.destroy().unwrap();
        assert_eq!("TcpConnection.bin", name);
        assert!(bytes > 0);
    }

    #[test]
    fn test_max_open_flows_evicts_oldest() {
        let dir = tempdir().unwrap();
        let decoder = decoder(dir.path(), 1, 1_000_000_000);
        decoder.write_header("eth0", "0.1.0").unwrap();

        let (ctx1, layer1) = tcp_ctx(1, 443, 1_000, false, false);
        decoder.update(ctx1, &layer1).unwrap();
        let (ctx2, layer2) = tcp_ctx(2, 443, 2_000, false, false);
        decoder.update(ctx2, &layer2).unwrap();

        let (_, bytes) = decoder.destroy().unwrap();
        assert!(bytes > 0);
    }

    #[test]
    fn test_unterminated_flow_is_flushed_on_destroy() {
        let dir = tempdir().unwrap();
        let decoder = decoder(dir.path(), 16, 1_000_000_000);
        decoder.write_header("eth0", "0.1.0").unwrap();

        let (ctx1, layer1) = tcp_ctx(51234, 443, 1_000, false, false);
        decoder.update(ctx1, &layer1).unwrap();

        let (_, bytes) = decoder.destroy().unwrap();
        assert!(bytes > 0);
    }
}
