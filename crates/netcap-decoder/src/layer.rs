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

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::sync::Mutex;

use crossbeam_channel::Receiver;
use netcap_common::error::{Result, SchemaViolationError, SetupError};
use netcap_metrics::MetricsContext;
use netcap_record::{AuditRecord, Layer, LayerType, PacketContext};
use netcap_writer::RecordWriter;

/// A parsed layer turned into zero or one [`AuditRecord`]. Returns `None`
/// when the layer does not carry enough information to build a record (a
/// malformed or truncated field), which the registry treats as a silent
/// skip, not an error.
pub type DecodeHandler = dyn Fn(i64, &Layer) -> Option<Box<dyn AuditRecord>> + Send + Sync;

/// A stateless, fire-once-per-matching-layer decoder: Ethernet, ARP, IPv4,
/// IPv6, TCP, UDP, ICMPv4, and DNS are all layer decoders. One instance owns
/// one [`RecordWriter`] for the lifetime of a run.
pub struct LayerDecoder {
    name: &'static str,
    layer_type: LayerType,
    record_type: &'static str,
    description: &'static str,
    handler: Box<DecodeHandler>,
    writer: Mutex<RecordWriter>,
    export: bool,
    metrics: MetricsContext,
    disabled: AtomicBool,
    channel: Option<Receiver<Vec<u8>>>,
}

impl LayerDecoder {
    pub fn builder() -> LayerDecoderBuilder {
        LayerDecoderBuilder::default()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn layer_type(&self) -> LayerType {
        self.layer_type
    }

    pub fn record_type(&self) -> &'static str {
        self.record_type
    }

    pub fn description(&self) -> &'static str {
        self.description
    }

    /// `true` once a panic inside this decoder's handler has been caught by
    /// the registry. A disabled decoder silently no-ops on every further
    /// `decode` call for the rest of the run.
    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::SeqCst)
    }

    pub fn mark_disabled(&self) {
        self.disabled.store(true, Ordering::SeqCst);
    }

    pub fn write_header(&self, source: &str, tool_version: &str) -> Result<()> {
        self.writer
            .lock()
            .unwrap()
            .write_header(self.record_type, source, tool_version)
    }

    /// Run the handler for one matching layer, attach context if present,
    /// write the resulting record, and export metrics when enabled.
    pub fn decode(&self, ctx: Option<Arc<PacketContext>>, timestamp_unix_nanos: i64, layer: &Layer) -> Result<()> {
        if self.is_disabled() {
            return Ok(());
        }

        let mut record = match (self.handler)(timestamp_unix_nanos, layer) {
            Some(record) => record,
            None => return Ok(()),
        };

        if let Some(ctx) = ctx {
            record.attach_context(ctx);
        }

        if record.csv_header().len() != record.csv_row().len() {
            return Err(Box::new(SchemaViolationError::new(format!(
                "decoder '{}' produced a record declaring {} csv columns but {} row values",
                self.name,
                record.csv_header().len(),
                record.csv_row().len(),
            ))));
        }

        if self.export {
            record.increment_metrics(&self.metrics);
        }

        self.writer.lock().unwrap().write_record(record.as_ref())
    }

    /// The reader end of this decoder's writer fan-out channel, if one was
    /// wired up at construction.
    pub fn channel(&self) -> Option<Receiver<Vec<u8>>> {
        self.channel.clone()
    }

    pub fn destroy(&self) -> Result<(String, u64)> {
        self.writer.lock().unwrap().close()
    }
}

#[derive(Default)]
pub struct LayerDecoderBuilder {
    name: Option<&'static str>,
    layer_type: Option<LayerType>,
    record_type: Option<&'static str>,
    description: Option<&'static str>,
    handler: Option<Box<DecodeHandler>>,
    writer: Option<RecordWriter>,
    export: Option<bool>,
    metrics: Option<MetricsContext>,
    channel: Option<Receiver<Vec<u8>>>,
}

impl LayerDecoderBuilder {
    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = Some(name);
        self
    }

    pub fn with_layer_type(mut self, layer_type: LayerType) -> Self {
        self.layer_type = Some(layer_type);
        self
    }

    pub fn with_record_type(mut self, record_type: &'static str) -> Self {
        self.record_type = Some(record_type);
        self
    }

    pub fn with_description(mut self, description: &'static str) -> Self {
        self.description = Some(description);
        self
    }

    pub fn with_handler(mut self, handler: Box<DecodeHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn with_writer(mut self, writer: RecordWriter) -> Self {
        self.writer = Some(writer);
        self
    }

    pub fn with_export(mut self, export: bool) -> Self {
        self.export = Some(export);
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsContext) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_channel(mut self, channel: Receiver<Vec<u8>>) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn try_build(self) -> Result<LayerDecoder> {
        Ok(LayerDecoder {
            name: self
                .name
                .ok_or_else(|| Box::new(SetupError::new("required field 'name' was not provided")))?,
            layer_type: self
                .layer_type
                .ok_or_else(|| Box::new(SetupError::new("required field 'layer_type' was not provided")))?,
            record_type: self
                .record_type
                .ok_or_else(|| Box::new(SetupError::new("required field 'record_type' was not provided")))?,
            description: self.description.unwrap_or(""),
            handler: self
                .handler
                .ok_or_else(|| Box::new(SetupError::new("required field 'handler' was not provided")))?,
            writer: Mutex::new(
                self.writer
                    .ok_or_else(|| Box::new(SetupError::new("required field 'writer' was not provided")))?,
            ),
            export: self.export.unwrap_or(true),
            metrics: self.metrics.unwrap_or_else(MetricsContext::noop),
            disabled: AtomicBool::new(false),
            channel: self.channel,
        })
    }

    pub fn build(self) -> LayerDecoder {
        self.try_build().unwrap()
    }
}

#[cfg(test)]
mod tests_layer {
    use super::*;
    use netcap_writer::{Framing, RecordWriterBuilder, RecordWriterProperties};
    use tempfile::tempdir;

    fn ethernet_decoder(dir: &std::path::Path) -> LayerDecoder {
        let properties = RecordWriterProperties::builder()
            .with_name("Ethernet")
            .with_out_dir(dir.to_path_buf())
            .with_framing(Framing::TypedBinary)
            .build();
        let writer = RecordWriterBuilder::default().with_properties(properties).build();

        LayerDecoder::builder()
            .with_name("Ethernet")
            .with_layer_type(LayerType::Ethernet)
            .with_record_type("Ethernet")
            .with_description("link layer frames")
            .with_handler(Box::new(|ts, layer| {
                netcap_record::records::EthernetRecord::from_layer(ts, layer).map(|r| Box::new(r) as Box<dyn AuditRecord>)
            }))
            .with_writer(writer)
            .with_export(false)
            .build()
    }

    #[test]
    fn test_decode_writes_matching_layer() {
        let dir = tempdir().unwrap();
        let decoder = ethernet_decoder(dir.path());
        decoder.write_header("eth0", "0.1.0").unwrap();

        let layer = Layer::Ethernet {
            src_mac: [0; 6],
            dst_mac: [1; 6],
            ether_type: 0x0800,
        };
        decoder.decode(None, 1_000, &layer).unwrap();
        let (name, bytes) = decoder.destroy().unwrap();
        assert_eq!("Ethernet.bin", name);
        assert!(bytes > 0);
    }

    #[test]
    fn test_decode_ignores_non_matching_layer() {
        let dir = tempdir().unwrap();
        let decoder = ethernet_decoder(dir.path());
        decoder.write_header("eth0", "0.1.0").unwrap();

        let layer = Layer::Udp {
            src_port: 1,
            dst_port: 2,
            length: 8,
        };
        decoder.decode(None, 1_000, &layer).unwrap();
        let (_, bytes) = decoder.destroy().unwrap();
        assert_eq!(0, bytes);
    }

    #[test]
    fn test_disabled_decoder_skips_decode() {
        let dir = tempdir().unwrap();
        let decoder = ethernet_decoder(dir.path());
        decoder.write_header("eth0", "0.1.0").unwrap();
        decoder.mark_disabled();

        let layer = Layer::Ethernet {
            src_mac: [0; 6],
            dst_mac: [1; 6],
            ether_type: 0x0800,
        };
        decoder.decode(None, 1_000, &layer).unwrap();
        let (_, bytes) = decoder.destroy().unwrap();
        assert_eq!(0, bytes);
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

    fn malformed_decoder(dir: &std::path::Path) -> LayerDecoder {
        let properties = RecordWriterProperties::builder()
            .with_name("Malformed")
            .with_out_dir(dir.to_path_buf())
            .with_framing(Framing::TypedBinary)
            .build();
        let writer = RecordWriterBuilder::default().with_properties(properties).build();

        LayerDecoder::builder()
            .with_name("Malformed")
            .with_layer_type(LayerType::Ethernet)
            .with_record_type("Malformed")
            .with_handler(Box::new(|_ts, _layer| Some(Box::new(MalformedRecord { ctx: None }) as Box<dyn AuditRecord>)))
            .with_writer(writer)
            .with_export(false)
            .build()
    }

    #[test]
    fn test_decode_returns_schema_violation_for_mismatched_record() {
        let dir = tempdir().unwrap();
        let decoder = malformed_decoder(dir.path());
        decoder.write_header("eth0", "0.1.0").unwrap();

        let layer = Layer::Ethernet {
            src_mac: [0; 6],
            dst_mac: [1; 6],
            ether_type: 0x0800,
        };
        let err = decoder.decode(None, 1_000, &layer).unwrap_err();
        assert!(err.downcast_ref::<SchemaViolationError>().is_some());
    }
}
