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

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::Receiver;
use log::{error, info};

use netcap_common::error::{Result, SchemaViolationError, SetupError};
use netcap_common::thread::{estimate_best_thread_channel_capacity, get_available_threads};
use netcap_decoder::{
    build_layer_decoder, build_tcp_connection_decoder, select_decoder_names, DecoderRegistry, StreamDecoder,
    DEFAULT_DECODER_NAMES, DEFAULT_IDLE_TIMEOUT_NANOS, DEFAULT_MAX_OPEN_FLOWS,
};
use netcap_metrics::{MetricsContext, MetricsSink};
use netcap_record::LayerType;
use netcap_writer::{Framing, RecordWriterBuilder, RecordWriterProperties};

use crate::parse::parse_packet;
use crate::progress::ProgressReporter;
use crate::source::{self, PacketSource};
use crate::worker::WorkerPool;

/// Recognized configuration for one capture run. See `SPEC_FULL.md` §6 for
/// the full option catalogue this mirrors.
pub struct CollectorConfig {
    source: String,
    bpf: Option<String>,
    include_decoders: Vec<String>,
    exclude_decoders: Vec<String>,
    out_dir: PathBuf,
    compression: bool,
    csv: bool,
    buffered: bool,
    mem_buffer_bytes: Option<usize>,
    include_payloads: bool,
    quiet: bool,
    write_chan: bool,
    workers: usize,
    export: bool,
    max_open_flows: usize,
    idle_timeout_nanos: i64,
    tool_version: String,
}

impl CollectorConfig {
    pub fn builder() -> CollectorConfigBuilder {
        CollectorConfigBuilder::default()
    }
}

pub struct CollectorConfigBuilder {
    source: Option<String>,
    bpf: Option<String>,
    include_decoders: Vec<String>,
    exclude_decoders: Vec<String>,
    out_dir: Option<PathBuf>,
    compression: bool,
    csv: bool,
    buffered: bool,
    mem_buffer_bytes: Option<usize>,
    include_payloads: bool,
    quiet: bool,
    write_chan: bool,
    workers: Option<usize>,
    export: bool,
    max_open_flows: usize,
    idle_timeout_nanos: i64,
    tool_version: Option<String>,
}

impl Default for CollectorConfigBuilder {
    fn default() -> Self {
        Self {
            source: None,
            bpf: None,
            include_decoders: Vec::new(),
            exclude_decoders: Vec::new(),
            out_dir: None,
            compression: false,
            csv: false,
            buffered: true,
            mem_buffer_bytes: None,
            include_payloads: false,
            quiet: false,
            write_chan: false,
            workers: None,
            export: false,
            max_open_flows: DEFAULT_MAX_OPEN_FLOWS,
            idle_timeout_nanos: DEFAULT_IDLE_TIMEOUT_NANOS,
            tool_version: None,
        }
    }
}

impl CollectorConfigBuilder {
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_bpf(mut self, bpf: impl Into<String>) -> Self {
        self.bpf = Some(bpf.into());
        self
    }

    pub fn with_include_decoders(mut self, names: Vec<String>) -> Self {
        self.include_decoders = names;
        self
    }

    pub fn with_exclude_decoders(mut self, names: Vec<String>) -> Self {
        self.exclude_decoders = names;
        self
    }

    pub fn with_out_dir(mut self, out_dir: PathBuf) -> Self {
        self.out_dir = Some(out_dir);
        self
    }

    pub fn with_compression(mut self, compression: bool) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_csv(mut self, csv: bool) -> Self {
        self.csv = csv;
        self
    }

    pub fn with_buffered(mut self, buffered: bool) -> Self {
        self.buffered = buffered;
        self
    }

    pub fn with_mem_buffer_bytes(mut self, bytes: usize) -> Self {
        self.mem_buffer_bytes = Some(bytes);
        self
    }

    pub fn with_include_payloads(mut self, include_payloads: bool) -> Self {
        self.include_payloads = include_payloads;
        self
    }

    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn with_write_chan(mut self, write_chan: bool) -> Self {
        self.write_chan = write_chan;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn with_export(mut self, export: bool) -> Self {
        self.export = export;
        self
    }

    pub fn with_max_open_flows(mut self, max_open_flows: usize) -> Self {
        self.max_open_flows = max_open_flows;
        self
    }

    pub fn with_idle_timeout_nanos(mut self, idle_timeout_nanos: i64) -> Self {
        self.idle_timeout_nanos = idle_timeout_nanos;
        self
    }

    pub fn with_tool_version(mut self, tool_version: impl Into<String>) -> Self {
        self.tool_version = Some(tool_version.into());
        self
    }

    pub fn try_build(self) -> Result<CollectorConfig> {
        let source = self
            .source
            .ok_or_else(|| Box::new(SetupError::new("required field 'source' was not provided")))?;
        let out_dir = self
            .out_dir
            .ok_or_else(|| Box::new(SetupError::new("required field 'out_dir' was not provided")))?;

        if !self.include_decoders.is_empty() && self.include_decoders == self.exclude_decoders {
            return Err(Box::new(SetupError::new(
                "include and exclude decoder lists are identical, nothing would be enabled",
            )));
        }

        Ok(CollectorConfig {
            source,
            bpf: self.bpf,
            include_decoders: self.include_decoders,
            exclude_decoders: self.exclude_decoders,
            out_dir,
            compression: self.compression,
            csv: self.csv,
            buffered: self.buffered,
            mem_buffer_bytes: self.mem_buffer_bytes,
            include_payloads: self.include_payloads,
            quiet: self.quiet,
            write_chan: self.write_chan,
            workers: get_available_threads(self.workers.unwrap_or_else(num_cpus::get)),
            export: self.export,
            max_open_flows: self.max_open_flows,
            idle_timeout_nanos: self.idle_timeout_nanos,
            tool_version: self.tool_version.unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
        })
    }
}

/// Tallies panics the registry isolates, read back by the Collector for its
/// shutdown summary. Kept separate from the per-record `metrics` context
/// (Prometheus or noop) handed to each decoder, so enabling `--export`
/// doesn't change what ends up in this count.
#[derive(Default)]
struct ErrorTally {
    decoder_handler: AtomicU64,
}

impl MetricsSink for ErrorTally {
    fn increment_record(&self, _record_type: &str) {}

    fn increment_error(&self, kind: &str) {
        if kind == "DecoderHandler" {
            self.decoder_handler.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Final tallies reported once a run has drained, per §7/§8's shutdown
/// summary and "exactly one WriterIO kind" testable property.
#[derive(Debug)]
pub struct RunSummary {
    pub packets_processed: u64,
    pub unknown_layers: u64,
    pub writer_io_errors: u64,
    pub decoder_handler_errors: u64,
    pub writer_results: Vec<(&'static str, Result<(String, u64)>)>,
}

/// Owns the source, registry, worker pool, and writers for one capture run.
pub struct Collector {
    config: CollectorConfig,
    registry: Arc<DecoderRegistry>,
    source: Option<Box<dyn PacketSource>>,
    cancel: Arc<AtomicBool>,
    packet_count: Arc<AtomicU64>,
    writer_io_errors: Arc<AtomicU64>,
    schema_violation: Arc<AtomicBool>,
    decoder_handler_tally: Arc<ErrorTally>,
    writer_channels: HashMap<String, Receiver<Vec<u8>>>,
}

impl Collector {
    /// Resolve the source, select and open every enabled decoder's writer,
    /// and build the registry. Any failure here is fatal-before-run
    /// (`InvalidConfig` or `SourceUnavailable`) — nothing has started.
    pub fn init(config: CollectorConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.out_dir).map_err(|e| {
            Box::new(SetupError::new(format!(
                "failed to create output directory {}: {e}",
                config.out_dir.display()
            )))
        })?;

        let include: Vec<&str> = config.include_decoders.iter().map(String::as_str).collect();
        let exclude: Vec<&str> = config.exclude_decoders.iter().map(String::as_str).collect();
        let selected = select_decoder_names(DEFAULT_DECODER_NAMES, &include, &exclude)?;

        let metrics = if config.export {
            MetricsContext::with_prometheus().map(|(ctx, _handle)| ctx)?
        } else {
            MetricsContext::noop()
        };

        let framing = if config.csv { Framing::Csv } else { Framing::TypedBinary };
        let mem_buf_bytes = if config.buffered { config.mem_buffer_bytes } else { Some(1) };

        let mut layer_decoders = Vec::new();
        let mut tcp_connection_decoder: Option<Arc<dyn StreamDecoder>> = None;
        let mut writer_channels = HashMap::new();

        for name in &selected {
            let mut properties_builder = RecordWriterProperties::builder()
                .with_name(name.clone())
                .with_out_dir(config.out_dir.clone())
                .with_framing(framing)
                .with_compressed(config.compression)
                .with_include_payloads(config.include_payloads);
            if let Some(bytes) = mem_buf_bytes {
                properties_builder = properties_builder.with_mem_buf_bytes(bytes);
            }
            let properties = properties_builder.try_build()?;

            let mut writer_builder = RecordWriterBuilder::default().with_properties(properties);
            if config.write_chan {
                let (tx, rx) = crossbeam_channel::unbounded();
                writer_builder = writer_builder.with_share_channel(tx);
                writer_channels.insert(name.clone(), rx);
            }
            let writer = writer_builder.try_build()?;

            if name == "TcpConnection" {
                let decoder = build_tcp_connection_decoder(
                    writer,
                    config.max_open_flows,
                    config.idle_timeout_nanos,
                    config.export,
                    metrics.clone(),
                );
                decoder.write_header(&config.source, &config.tool_version)?;
                tcp_connection_decoder = Some(Arc::new(decoder));
            } else {
                let decoder = build_layer_decoder(name, writer, config.export, metrics.clone())?;
                decoder.write_header(&config.source, &config.tool_version)?;
                layer_decoders.push(decoder);
            }
        }

        let tally = Arc::new(ErrorTally::default());
        let mut registry_builder = DecoderRegistry::builder()
            .with_layer_decoders(layer_decoders)
            .with_metrics(MetricsContext::new(tally.clone()));
        if let Some(stream_decoder) = tcp_connection_decoder {
            registry_builder = registry_builder.with_stream_decoder(LayerType::Tcp, stream_decoder);
        }
        let registry = Arc::new(registry_builder.build());

        let source = source::resolve(&config.source, config.bpf.as_deref())?;

        Ok(Self {
            config,
            registry,
            source: Some(source),
            cancel: Arc::new(AtomicBool::new(false)),
            packet_count: Arc::new(AtomicU64::new(0)),
            writer_io_errors: Arc::new(AtomicU64::new(0)),
            schema_violation: Arc::new(AtomicBool::new(false)),
            decoder_handler_tally: tally,
            writer_channels,
        })
    }

    /// A clone of the cancel flag, for a `ctrlc` handler or a test driver to
    /// flip from outside the run loop.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// The fan-out channel for one decoder's output, if `WriteChan` was
    /// enabled for this run.
    pub fn writer_channel(&self, decoder_name: &str) -> Option<&Receiver<Vec<u8>>> {
        self.writer_channels.get(decoder_name)
    }

    pub fn packets_processed(&self) -> u64 {
        self.packet_count.load(Ordering::SeqCst)
    }

    /// Drive packets through the pipeline until the source is exhausted
    /// (offline) or the cancel flag is set (live, or a test driver), then
    /// shut down and return the run's summary. Consumes the source — a
    /// `Collector` runs exactly once.
    pub fn run(&mut self) -> Result<RunSummary> {
        let mut source = self
            .source
            .take()
            .ok_or_else(|| Box::new(SetupError::new("collector has already been run")))?;

        let capacity = estimate_best_thread_channel_capacity(self.config.workers);
        let pool = WorkerPool::spawn(
            self.config.workers,
            capacity,
            self.registry.clone(),
            self.cancel.clone(),
            self.writer_io_errors.clone(),
            self.schema_violation.clone(),
        );
        let reporter = ProgressReporter::new(self.config.quiet);

        loop {
            if self.cancel.load(Ordering::SeqCst) {
                break;
            }
            match source.next_packet()? {
                Some(raw) => {
                    let packet = parse_packet(raw.timestamp_unix_nanos, raw.wire_len, raw.captured_len, &raw.data);
                    let ctx = netcap_record::PacketContext::from_packet(&packet);
                    let ctx = if ctx.src_endpoint.is_some() || ctx.flow_key.is_some() {
                        Some(Arc::new(ctx))
                    } else {
                        None
                    };

                    let count = self.packet_count.fetch_add(1, Ordering::SeqCst) + 1;
                    reporter.maybe_log(count);

                    pool.dispatch(ctx, packet);
                }
                None => break,
            }
        }

        pool.drain();
        let summary = self.shutdown();

        if self.schema_violation.load(Ordering::SeqCst) {
            return Err(Box::new(SchemaViolationError::new(
                "a decoder produced a record that failed its own declared schema; run aborted, see the log for which one",
            )));
        }

        Ok(summary)
    }

    /// Close every writer and collect the final summary. Safe to call more
    /// than once — each underlying writer's `close` is itself idempotent, so
    /// repeated calls report identical final sizes.
    pub fn shutdown(&self) -> RunSummary {
        let writer_results = self.registry.shutdown();
        let summary = RunSummary {
            packets_processed: self.packet_count.load(Ordering::SeqCst),
            unknown_layers: self.registry.unknown_layer_count(),
            writer_io_errors: self.writer_io_errors.load(Ordering::SeqCst),
            decoder_handler_errors: self.decoder_handler_tally.decoder_handler.load(Ordering::SeqCst),
            writer_results,
        };

        for (name, result) in &summary.writer_results {
            match result {
                Ok((file_name, bytes)) => info!("closed writer '{name}': {file_name} ({bytes} bytes)"),
                Err(err) => error!("writer '{name}' failed to close cleanly: {err}"),
            }
        }
        info!(
            "capture summary: {} packets, {} unknown layers, {} writer I/O errors, {} decoder handler errors",
            summary.packets_processed, summary.unknown_layers, summary.writer_io_errors, summary.decoder_handler_errors,
        );

        summary
    }
}

#[cfg(test)]
mod tests_collector {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_rejects_missing_source() {
        let result = CollectorConfig::builder()
            .with_out_dir(PathBuf::from("/tmp"))
            .try_build();
        assert!(result.is_err());
    }

    #[test]
    fn test_config_rejects_identical_include_and_exclude() {
        let result = CollectorConfig::builder()
            .with_source("eth0")
            .with_out_dir(PathBuf::from("/tmp"))
            .with_include_decoders(vec!["Arp".to_string()])
            .with_exclude_decoders(vec!["Arp".to_string()])
            .try_build();
        assert!(result.is_err());
    }

    #[test]
    fn test_init_rejects_unknown_decoder_name() {
        let dir = tempdir().unwrap();
        let config = CollectorConfig::builder()
            .with_source("definitely-not-a-real-interface-xyz")
            .with_out_dir(dir.path().to_path_buf())
            .with_include_decoders(vec!["NotARealDecoder".to_string()])
            .try_build()
            .unwrap();
        assert!(Collector::init(config).is_err());
    }

    #[test]
    fn test_init_rejects_unreachable_source() {
        let dir = tempdir().unwrap();
        let config = CollectorConfig::builder()
            .with_source("definitely-not-a-real-interface-xyz")
            .with_out_dir(dir.path().to_path_buf())
            .try_build()
            .unwrap();
        assert!(Collector::init(config).is_err());
    }
}
