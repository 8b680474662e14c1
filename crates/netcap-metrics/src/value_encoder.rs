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
use std::sync::RwLock;

/// Per-field encoding state: a categorical dictionary assigning a stable
/// small integer to each distinct string value first seen, and a running
/// min/max pair used to normalize numeric values into `[0, 1]`.
#[derive(Debug, Default)]
struct FieldDict {
    categories: HashMap<String, u32>,
    numeric_min: f64,
    numeric_max: f64,
    numeric_seen: bool,
}

impl FieldDict {
    fn encode_category(&mut self, value: &str) -> u32 {
        if let Some(id) = self.categories.get(value) {
            return *id;
        }
        let id = self.categories.len() as u32;
        self.categories.insert(value.to_string(), id);
        id
    }

    fn observe_numeric(&mut self, value: f64) -> f64 {
        if !self.numeric_seen {
            self.numeric_min = value;
            self.numeric_max = value;
            self.numeric_seen = true;
        } else {
            if value < self.numeric_min {
                self.numeric_min = value;
            }
            if value > self.numeric_max {
                self.numeric_max = value;
            }
        }
        self.normalize(value)
    }

    fn normalize(&self, value: f64) -> f64 {
        let span = self.numeric_max - self.numeric_min;
        if span <= f64::EPSILON {
            return 0.0;
        }
        (value - self.numeric_min) / span
    }
}

/// Assigns stable small integers to categorical field values and normalizes
/// numeric field values to `[0, 1]`, for the machine-learning export row an
/// [`crate::AuditRecord`][audit-record] produces.
///
/// Encodings are deterministic within a single run (the same string always
/// maps to the same integer once assigned) but are not guaranteed stable
/// across runs: dictionary order depends on first-seen order.
///
/// [audit-record]: ../netcap_record/trait.AuditRecord.html
#[derive(Debug, Default)]
pub struct ValueEncoder {
    fields: RwLock<HashMap<String, FieldDict>>,
}

impl ValueEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode a categorical string field value, assigning a new id on first sight.
    pub fn encode_string(&self, field: &str, value: &str) -> u32 {
        let mut fields = self.fields.write().expect("value encoder lock poisoned");
        fields.entry(field.to_string()).or_default().encode_category(value)
    }

    /// Encode a signed 32-bit numeric field value, normalized against the
    /// min/max observed so far for that field.
    pub fn encode_i32(&self, field: &str, value: i32) -> f64 {
        self.encode_numeric(field, value as f64)
    }

    /// Encode a signed 64-bit numeric field value, normalized against the
    /// min/max observed so far for that field.
    pub fn encode_i64(&self, field: &str, value: i64) -> f64 {
        self.encode_numeric(field, value as f64)
    }

    fn encode_numeric(&self, field: &str, value: f64) -> f64 {
        let mut fields = self.fields.write().expect("value encoder lock poisoned");
        fields.entry(field.to_string()).or_default().observe_numeric(value)
    }
}

#[cfg(test)]
mod tests_value_encoder {
    use super::*;

    #[test]
    fn test_encode_string_assigns_stable_ids() {
        let encoder = ValueEncoder::new();
        assert_eq!(0, encoder.encode_string("proto", "tcp"));
        assert_eq!(1, encoder.encode_string("proto", "udp"));
        assert_eq!(0, encoder.encode_string("proto", "tcp"));
    }

    #[test]
    fn test_encode_string_is_independent_per_field() {
        let encoder = ValueEncoder::new();
        assert_eq!(0, encoder.encode_string("proto", "tcp"));
        assert_eq!(0, encoder.encode_string("flag", "tcp"));
    }

    #[test]
    fn test_encode_numeric_normalizes_to_unit_interval() {
        let encoder = ValueEncoder::new();
        assert_eq!(0.0, encoder.encode_i64("ttl", 10));
        assert_eq!(1.0, encoder.encode_i64("ttl", 20));
        assert_eq!(0.5, encoder.encode_i64("ttl", 15));
    }

    #[test]
    fn test_encode_numeric_single_value_normalizes_to_zero() {
        let encoder = ValueEncoder::new();
        assert_eq!(0.0, encoder.encode_i32("window", 65535));
    }
}
