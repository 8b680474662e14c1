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

use std::time::{SystemTime, UNIX_EPOCH};

/// Number of nanoseconds in one millisecond, used to convert the typed-binary
/// nanosecond timestamps into the millisecond precision the JSON/CSV export
/// paths use. Keeping the two units on separate paths (never mixed in one
/// artifact) is a hard requirement, see DESIGN NOTES in SPEC_FULL.md.
pub static NANOS_PER_MILLI: i64 = 1_000_000;

/// Convert a nanosecond-precision unix timestamp to millisecond precision,
/// used exclusively by the JSON/CSV export paths.
pub fn nanos_to_millis(nanos: i64) -> i64 {
    nanos / NANOS_PER_MILLI
}

/// Get the current wall-clock time as a nanosecond-precision unix timestamp.
///
/// # Panics
/// If the system clock is set to a time before the unix epoch.
pub fn now_unix_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the unix epoch")
        .as_nanos() as i64
}

#[cfg(test)]
mod tests_time {
    use super::*;

    #[test]
    fn test_nanos_to_millis() {
        assert_eq!(1, nanos_to_millis(1_000_000));
        assert_eq!(1500, nanos_to_millis(1_500_000_000));
    }

    #[test]
    fn test_now_unix_nanos_is_positive_and_monotonic_enough() {
        let first = now_unix_nanos();
        let second = now_unix_nanos();
        assert!(first > 0);
        assert!(second >= first);
    }
}
