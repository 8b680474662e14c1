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

use log::warn;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use netcap_common::error::Result;

/// Where [`MetricsContext`] increments land. The default implementation
/// forwards to the global `metrics` recorder; tests swap in a sink that
/// just counts calls, so decoder unit tests never need a live exporter.
pub trait MetricsSink: Send + Sync {
    fn increment_record(&self, record_type: &str);
    fn increment_error(&self, kind: &str);
}

/// Forwards increments to whichever recorder `metrics::set_global_recorder`
/// installed — here always the one `MetricsContext::with_prometheus` set up.
struct PrometheusSink;

impl MetricsSink for PrometheusSink {
    fn increment_record(&self, record_type: &str) {
        metrics::counter!("netcap_records_total", "record_type" => record_type.to_string())
            .increment(1);
    }

    fn increment_error(&self, kind: &str) {
        metrics::counter!("netcap_errors_total", "kind" => kind.to_string()).increment(1);
    }
}

/// Discards every increment. Used by tests and by any caller that wants
/// [`crate::ValueEncoder`]-adjacent bookkeeping without paying for an
/// exporter.
struct NoopSink;

impl MetricsSink for NoopSink {
    fn increment_record(&self, _record_type: &str) {}
    fn increment_error(&self, _kind: &str) {}
}

/// Handed to decoders at construction instead of reaching for a process-wide
/// singleton. A convenience process-wide default exists
/// ([`MetricsContext::with_prometheus`]) but every call site takes a
/// `MetricsContext` value rather than assuming one is globally available, so
/// tests can swap in [`MetricsContext::noop`] freely.
#[derive(Clone)]
pub struct MetricsContext {
    sink: Arc<dyn MetricsSink>,
}

impl MetricsContext {
    pub fn new(sink: Arc<dyn MetricsSink>) -> Self {
        Self { sink }
    }

    /// A context that silently drops every increment, for tests and for
    /// `dump`/`export`/`util` subcommands that never run the collector.
    pub fn noop() -> Self {
        Self::new(Arc::new(NoopSink))
    }

    /// Installs a global Prometheus recorder and returns a context backed by
    /// it, plus the handle used to render `/metrics`-style text output.
    pub fn with_prometheus() -> Result<(Self, PrometheusHandle)> {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        if let Err(err) = metrics::set_global_recorder(recorder) {
            warn!("a metrics recorder was already installed, reusing it: {err}");
        }
        Ok((Self::new(Arc::new(PrometheusSink)), handle))
    }

    pub fn increment_record(&self, record_type: &str) {
        self.sink.increment_record(record_type);
    }

    pub fn increment_error(&self, kind: &str) {
        self.sink.increment_error(kind);
    }
}

#[cfg(test)]
mod tests_context {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSink {
        records: AtomicUsize,
        errors: AtomicUsize,
    }

    impl MetricsSink for CountingSink {
        fn increment_record(&self, _record_type: &str) {
            self.records.fetch_add(1, Ordering::SeqCst);
        }

        fn increment_error(&self, _kind: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_metrics_context_forwards_to_sink() {
        let sink = Arc::new(CountingSink {
            records: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
        });
        let ctx = MetricsContext::new(sink.clone());
        ctx.increment_record("Tcp");
        ctx.increment_record("Udp");
        ctx.increment_error("WriterIO");
        assert_eq!(2, sink.records.load(Ordering::SeqCst));
        assert_eq!(1, sink.errors.load(Ordering::SeqCst));
    }

    #[test]
    fn test_noop_context_does_not_panic() {
        let ctx = MetricsContext::noop();
        ctx.increment_record("Tcp");
        ctx.increment_error("WriterIO");
    }
}
