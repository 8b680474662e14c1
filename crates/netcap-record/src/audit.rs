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

use netcap_metrics::{MetricsContext, ValueEncoder};

use crate::packet::PacketContext;

/// The capability every decoded observation provides, regardless of which
/// protocol produced it. Modeled as an object-safe trait rather than an
/// enum: a closed set of concrete record structs (one per supported
/// protocol, registered in `netcap_decoder::builtin`) implement it, so
/// adding a protocol never forces an existing match arm to grow.
pub trait AuditRecord: Send {
    /// The tag used in headers, metrics, and file naming. Stable across the
    /// record's lifetime; equal to the decoder's `recordType`.
    fn record_type(&self) -> &'static str;

    /// First timestamp associated with this observation, in nanoseconds.
    fn timestamp_unix_nanos(&self) -> i64;

    /// Attach the packet context this record was produced from. Called at
    /// most once, by the layer or stream decoder that built the record,
    /// before it is handed to the writer.
    fn attach_context(&mut self, ctx: Arc<PacketContext>);

    /// The context attached by `attach_context`, if any.
    fn context(&self) -> Option<&Arc<PacketContext>>;

    /// Source endpoint string (e.g. `"10.0.0.1:51234"`), empty if this
    /// record never had a context attached.
    fn src(&self) -> String {
        self.context().map(|ctx| ctx.src()).unwrap_or_default()
    }

    /// Destination endpoint string, empty if no context was attached.
    fn dst(&self) -> String {
        self.context().map(|ctx| ctx.dst()).unwrap_or_default()
    }

    /// Column names for the CSV framing, in the order `csv_row` emits them.
    fn csv_header(&self) -> &'static [&'static str];

    /// One CSV row's worth of field values, same order as `csv_header`.
    /// Timestamp columns are nanoseconds; callers that need millisecond
    /// precision (the `dump`/`export` JSON-adjacent paths) convert
    /// separately rather than asking this method for a different unit.
    fn csv_row(&self) -> Vec<String>;

    /// Encode the concrete protobuf message for this record (not including
    /// the length-delimited framing prefix, which the writer applies).
    fn encode_typed(&self) -> Vec<u8>;

    /// Increment this record's metrics against the given context.
    fn increment_metrics(&self, metrics: &MetricsContext) {
        metrics.increment_record(self.record_type());
    }

    /// Encode this record's numeric-ready feature row using the given
    /// value encoder.
    fn ml_row(&self, encoder: &ValueEncoder) -> Vec<f64>;

    /// A JSON rendering of this record for the `dump` diagnostic path.
    /// Built generically from `csv_header`/`csv_row` so new protocols never
    /// need their own JSON code. Any field whose name ends in `_nanos` is
    /// rendered in milliseconds under a `_millis` key instead — typed-binary
    /// stays nanosecond-precision, JSON export stays millisecond-precision,
    /// and the two units never mix in one artifact.
    fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert("record_type".to_string(), serde_json::Value::String(self.record_type().to_string()));
        for (key, value) in self.csv_header().iter().zip(self.csv_row()) {
            if let Some(stem) = key.strip_suffix("_nanos") {
                if let Ok(nanos) = value.parse::<i64>() {
                    map.insert(format!("{stem}_millis"), serde_json::json!(nanos / 1_000_000));
                    continue;
                }
            }
            map.insert((*key).to_string(), serde_json::Value::String(value));
        }
        serde_json::Value::Object(map)
    }
}
