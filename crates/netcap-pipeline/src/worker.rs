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

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Sender};
use log::error;
use netcap_common::error::SchemaViolationError;
use netcap_decoder::DecoderRegistry;
use netcap_record::{Packet, PacketContext};

/// One packet plus the context built for it, handed from the reader to a
/// worker. `ctx` is `None` when the packet carried no addressable endpoint
/// (e.g. a bare link-layer frame), matching what [`DecoderRegistry::dispatch`]
/// already treats as "no context to attach".
struct WorkItem {
    ctx: Option<Arc<PacketContext>>,
    packet: Packet,
}

/// A fixed pool of worker threads, each fed by its own bounded channel.
/// Dedicated per-worker channels (rather than one shared queue) are what
/// make flow pinning meaningful: routing every packet of a flow to the same
/// channel guarantees that decoder sees them in submission order, which a
/// shared multi-consumer queue cannot promise once more than one worker is
/// free to pick up the next item.
pub struct WorkerPool {
    senders: Vec<Sender<WorkItem>>,
    handles: Vec<JoinHandle<()>>,
    round_robin: AtomicUsize,
}

impl WorkerPool {
    /// `schema_violation` is flipped, and every worker stops dispatching
    /// further packets, the moment any decoder hands back a
    /// [`SchemaViolationError`] — that kind is fatal for the run (§7), unlike
    /// a `WriterIoError`, which only poisons the one writer that raised it
    /// and is tallied in `writer_io_errors` for the run to continue past.
    pub fn spawn(
        n_workers: usize,
        capacity_per_worker: usize,
        registry: Arc<DecoderRegistry>,
        cancel: Arc<AtomicBool>,
        writer_io_errors: Arc<AtomicU64>,
        schema_violation: Arc<AtomicBool>,
    ) -> Self {
        let n_workers = n_workers.max(1);
        let mut senders = Vec::with_capacity(n_workers);
        let mut handles = Vec::with_capacity(n_workers);

        for _ in 0..n_workers {
            let (tx, rx) = bounded::<WorkItem>(capacity_per_worker);
            let registry = registry.clone();
            let cancel = cancel.clone();
            let writer_io_errors = writer_io_errors.clone();
            let schema_violation = schema_violation.clone();

            let handle = thread::spawn(move || {
                while let Ok(item) = rx.recv() {
                    if cancel.load(Ordering::SeqCst) {
                        continue;
                    }
                    if let Err(err) = registry.dispatch(item.ctx, &item.packet) {
                        if err.downcast_ref::<SchemaViolationError>().is_some() {
                            error!("fatal schema violation, aborting run: {err}");
                            schema_violation.store(true, Ordering::SeqCst);
                            cancel.store(true, Ordering::SeqCst);
                        } else {
                            writer_io_errors.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                }
            });

            senders.push(tx);
            handles.push(handle);
        }

        Self {
            senders,
            handles,
            round_robin: AtomicUsize::new(0),
        }
    }

    /// Route one packet to the worker responsible for its flow, or to the
    /// next worker in round-robin order when the packet carries no flow key
    /// (layer decoders are stateless and tolerate any ordering). Blocks the
    /// caller when that worker's queue is full — the reader-stalls
    /// backpressure policy.
    pub fn dispatch(&self, ctx: Option<Arc<PacketContext>>, packet: Packet) {
        let n = self.senders.len();
        let index = match ctx.as_ref().and_then(|c| c.flow_key.as_ref()) {
            Some(flow_key) => (flow_key.worker_hash() as usize) % n,
            None => self.round_robin.fetch_add(1, Ordering::SeqCst) % n,
        };
        let _ = self.senders[index].send(WorkItem { ctx, packet });
    }

    /// Drop every sender, which unblocks each worker's `recv` loop once its
    /// queue drains, then join every thread. This is the drain barrier
    /// `Collector::shutdown` waits on before closing writers.
    pub fn drain(self) {
        drop(self.senders);
        for handle in self.handles {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests_worker {
    use super::*;
    use netcap_decoder::{DecoderRegistry, LayerDecoder};
    use netcap_record::packet::{Layer, LayerType};
    use netcap_record::{AuditRecord, PacketContext};
    use netcap_writer::{RecordWriterBuilder, RecordWriterProperties};
    use tempfile::tempdir;

    fn sample_packet() -> Packet {
        Packet {
            timestamp_unix_nanos: 1,
            wire_len: 14,
            captured_len: 14,
            layers: vec![Layer::Ethernet { src_mac: [0; 6], dst_mac: [1; 6], ether_type: 0x0806 }],
        }
    }

    #[test]
    fn test_dispatch_and_drain_does_not_panic_with_no_matching_decoder() {
        let registry = Arc::new(DecoderRegistry::builder().build());
        let cancel = Arc::new(AtomicBool::new(false));
        let writer_io_errors = Arc::new(AtomicU64::new(0));
        let schema_violation = Arc::new(AtomicBool::new(false));
        let pool = WorkerPool::spawn(2, 8, registry.clone(), cancel, writer_io_errors.clone(), schema_violation.clone());

        for _ in 0..4 {
            pool.dispatch(None, sample_packet());
        }
        pool.drain();

        assert_eq!(0, writer_io_errors.load(Ordering::SeqCst));
        assert!(!schema_violation.load(Ordering::SeqCst));
        assert_eq!(4, registry.unknown_layer_count());
    }

    #[test]
    fn test_dispatch_honors_cancel_flag() {
        let registry = Arc::new(DecoderRegistry::builder().build());
        let cancel = Arc::new(AtomicBool::new(true));
        let writer_io_errors = Arc::new(AtomicU64::new(0));
        let schema_violation = Arc::new(AtomicBool::new(false));
        let pool = WorkerPool::spawn(1, 8, registry.clone(), cancel, writer_io_errors.clone(), schema_violation.clone());

        pool.dispatch(None, sample_packet());
        pool.drain();

        assert_eq!(0, registry.unknown_layer_count());
    }

    /// A deliberately broken `AuditRecord` whose `csv_row` doesn't match the
    /// column count its own `csv_header` declares, standing in for a decoder
    /// registered with the wrong handler.
    struct MalformedRecord {
        ctx: Option<Arc<PacketContext>>,
    }

    impl AuditRecord for MalformedRecord {
        fn record_type(&self) -> &'static str {
            "Malformed"
        }

        fn timestamp_unix_nanos(&self) -> i64 {
            0
        }

        fn attach_context(&mut self, ctx: Arc<PacketContext>) {
            self.ctx = Some(ctx);
        }

        fn context(&self) -> Option<&Arc<PacketContext>> {
            self.ctx.as_ref()
        }

        fn csv_header(&self) -> &'static [&'static str] {
            &["a", "b"]
        }

        fn csv_row(&self) -> Vec<String> {
            vec!["only_one".to_string()]
        }

        fn encode_typed(&self) -> Vec<u8> {
            Vec::new()
        }

        fn ml_row(&self, _encoder: &netcap_metrics::ValueEncoder) -> Vec<f64> {
            Vec::new()
        }
    }

    #[test]
    fn test_dispatch_sets_schema_violation_and_stops_the_run_on_a_malformed_record() {
        let dir = tempdir().unwrap();
        let properties = RecordWriterProperties::builder()
            .with_name("Malformed")
            .with_out_dir(dir.path().to_path_buf())
            .build();
        let writer = RecordWriterBuilder::default().with_properties(properties).build();
        let decoder = LayerDecoder::builder()
            .with_name("Malformed")
            .with_layer_type(LayerType::Ethernet)
            .with_record_type("Malformed")
            .with_handler(Box::new(|_ts, _layer| Some(Box::new(MalformedRecord { ctx: None }) as Box<dyn AuditRecord>)))
            .with_export(false)
            .with_writer(writer)
            .build();
        decoder.write_header("eth0", "0.1.0").unwrap();

        let registry = Arc::new(DecoderRegistry::builder().with_layer_decoders(vec![decoder]).build());
        let cancel = Arc::new(AtomicBool::new(false));
        let writer_io_errors = Arc::new(AtomicU64::new(0));
        let schema_violation = Arc::new(AtomicBool::new(false));
        let pool = WorkerPool::spawn(1, 8, registry.clone(), cancel.clone(), writer_io_errors.clone(), schema_violation.clone());

        pool.dispatch(None, sample_packet());
        pool.drain();

        assert!(schema_violation.load(Ordering::SeqCst));
        assert!(cancel.load(Ordering::SeqCst));
        assert_eq!(0, writer_io_errors.load(Ordering::SeqCst));
    }
}
