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

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::error;
use netcap_common::error::Result;
use netcap_metrics::MetricsContext;
use netcap_record::{LayerType, Packet, PacketContext};

use crate::layer::LayerDecoder;
use crate::stream::StreamDecoder;

/// Holds every active decoder, dispatches each packet's layer stack to the
/// decoders registered for each layer type, and isolates a panicking
/// decoder from the rest of the run rather than bringing the whole capture
/// down.
pub struct DecoderRegistry {
    layer_decoders: HashMap<LayerType, Vec<Arc<LayerDecoder>>>,
    stream_decoders: HashMap<LayerType, Vec<Arc<dyn StreamDecoder>>>,
    unknown_layers: AtomicU64,
    metrics: MetricsContext,
}

impl DecoderRegistry {
    pub fn builder() -> DecoderRegistryBuilder {
        DecoderRegistryBuilder::default()
    }

    pub fn unknown_layer_count(&self) -> u64 {
        self.unknown_layers.load(Ordering::SeqCst)
    }

    pub fn layer_decoders(&self) -> impl Iterator<Item = &Arc<LayerDecoder>> {
        self.layer_decoders.values().flatten()
    }

    pub fn stream_decoders(&self) -> impl Iterator<Item = &Arc<dyn StreamDecoder>> {
        self.stream_decoders.values().flatten()
    }

    /// Run every decoder matching the packet's layer stack. A layer with no
    /// registered decoder (because it was excluded, or because no decoder
    /// for it exists) is counted and dropped, not treated as an error.
    pub fn dispatch(&self, ctx: Option<Arc<PacketContext>>, packet: &Packet) -> Result<()> {
        for layer in &packet.layers {
            let layer_type = layer.layer_type();
            let mut matched = false;

            if let Some(decoders) = self.layer_decoders.get(&layer_type) {
                matched = true;
                for decoder in decoders {
                    if decoder.is_disabled() {
                        continue;
                    }
                    let ctx = ctx.clone();
                    let result = catch_unwind(AssertUnwindSafe(|| decoder.decode(ctx, packet.timestamp_unix_nanos, layer)));
                    match result {
                        Ok(inner) => inner?,
                        Err(_) => {
                            error!(
                                "decoder '{}' panicked on a {:?} layer of packet at {}, disabling it for the rest of the run",
                                decoder.name(),
                                layer_type,
                                packet.timestamp_unix_nanos,
                            );
                            decoder.mark_disabled();
                            self.metrics.increment_error("DecoderHandler");
                        }
                    }
                }
            }

            if let Some(streams) = self.stream_decoders.get(&layer_type) {
                matched = true;
                if let Some(ctx) = &ctx {
                    for stream in streams {
                        let ctx = ctx.clone();
                        let result = catch_unwind(AssertUnwindSafe(|| stream.update(ctx, layer)));
                        match result {
                            Ok(inner) => inner?,
                            Err(_) => {
                                error!(
                                    "stream decoder panicked on a {:?} layer of packet at {}",
                                    layer_type, packet.timestamp_unix_nanos,
                                );
                                self.metrics.increment_error("DecoderHandler");
                            }
                        }
                    }
                }
            }

            if !matched {
                self.unknown_layers.fetch_add(1, Ordering::SeqCst);
            }
        }
        Ok(())
    }

    /// Sweep every stream decoder's idle flows, for periodic calls from the
    /// pipeline's progress tick rather than relying solely on per-packet
    /// eviction.
    pub fn sweep_idle(&self, now_unix_nanos: i64) -> Result<()> {
        for stream in self.stream_decoders() {
            stream.sweep_idle(now_unix_nanos)?;
        }
        Ok(())
    }

    /// Close every writer this registry owns. Returns one `(name, result)`
    /// pair per decoder so the caller can tally failures by kind without
    /// one writer's error aborting the rest of the drain.
    pub fn shutdown(&self) -> Vec<(&'static str, Result<(String, u64)>)> {
        let mut results = Vec::new();
        for decoder in self.layer_decoders() {
            results.push((decoder.name(), decoder.destroy()));
        }
        for stream in self.stream_decoders() {
            results.push(("TcpConnection", stream.destroy()));
        }
        results
    }
}

#[derive(Default)]
pub struct DecoderRegistryBuilder {
    layer_decoders: Vec<LayerDecoder>,
    stream_decoders: Vec<(LayerType, Arc<dyn StreamDecoder>)>,
    metrics: Option<MetricsContext>,
}

impl DecoderRegistryBuilder {
    pub fn with_layer_decoders(mut self, decoders: Vec<LayerDecoder>) -> Self {
        self.layer_decoders = decoders;
        self
    }

    pub fn with_stream_decoder(mut self, layer_type: LayerType, decoder: Arc<dyn StreamDecoder>) -> Self {
        self.stream_decoders.push((layer_type, decoder));
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsContext) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(self) -> DecoderRegistry {
        let mut layer_decoders: HashMap<LayerType, Vec<Arc<LayerDecoder>>> = HashMap::new();
        for decoder in self.layer_decoders {
            layer_decoders.entry(decoder.layer_type()).or_default().push(Arc::new(decoder));
        }

        let mut stream_decoders: HashMap<LayerType, Vec<Arc<dyn StreamDecoder>>> = HashMap::new();
        for (layer_type, decoder) in self.stream_decoders {
            stream_decoders.entry(layer_type).or_default().push(decoder);
        }

        DecoderRegistry {
            layer_decoders,
            stream_decoders,
            unknown_layers: AtomicU64::new(0),
            metrics: self.metrics.unwrap_or_else(MetricsContext::noop),
        }
    }
}

#[cfg(test)]
mod tests_registry {
    use super::*;
    use netcap_record::records::EthernetRecord;
    use netcap_record::{AuditRecord, Layer};
    use netcap_writer::{RecordWriterBuilder, RecordWriterProperties};
    use tempfile::tempdir;

    fn ethernet_decoder(dir: &std::path::Path) -> LayerDecoder {
        let properties = RecordWriterProperties::builder()
            .with_name("Ethernet")
            .with_out_dir(dir.to_path_buf())
            .build();
        let writer = RecordWriterBuilder::default().with_properties(properties).build();

        LayerDecoder::builder()
            .with_name("Ethernet")
            .with_layer_type(LayerType::Ethernet)
            .with_record_type("Ethernet")
            .with_handler(Box::new(|ts, layer| {
                EthernetRecord::from_layer(ts, layer).map(|r| Box::new(r) as Box<dyn AuditRecord>)
            }))
            .with_writer(writer)
            .with_export(false)
            .build()
    }

    fn ethernet_packet() -> Packet {
        Packet::new(
            1_000,
            14,
            14,
            vec![Layer::Ethernet {
                src_mac: [0; 6],
                dst_mac: [1; 6],
                ether_type: 0x0800,
            }],
        )
    }

    #[test]
    fn test_dispatch_routes_matching_layer_to_decoder() {
        let dir = tempdir().unwrap();
        let decoder = ethernet_decoder(dir.path());
        decoder.write_header("eth0", "0.1.0").unwrap();
        let registry = DecoderRegistry::builder().with_layer_decoders(vec![decoder]).build();

        let packet = ethernet_packet();
        registry.dispatch(None, &packet).unwrap();
        assert_eq!(0, registry.unknown_layer_count());

        for (_, result) in registry.shutdown() {
            let (_, bytes) = result.unwrap();
            assert!(bytes > 0);
        }
    }

    #[test]
    fn test_dispatch_counts_unmatched_layer() {
        let registry = DecoderRegistry::builder().build();
        let packet = ethernet_packet();
        registry.dispatch(None, &packet).unwrap();
        assert_eq!(1, registry.unknown_layer_count());
    }
}
