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

use std::time::Instant;

use log::info;
use netcap_common::PROGRESS_INTERVAL;

/// Logs elapsed time and packet count every [`PROGRESS_INTERVAL`] packets.
/// Silenced entirely in quiet mode.
pub struct ProgressReporter {
    quiet: bool,
    started_at: Instant,
}

impl ProgressReporter {
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            started_at: Instant::now(),
        }
    }

    /// `count` is the packet count *after* incrementing for the packet that
    /// just completed parsing, i.e. 1-based.
    pub fn maybe_log(&self, count: u64) {
        if self.quiet || count == 0 || count % PROGRESS_INTERVAL != 0 {
            return;
        }
        info!(
            "processed {} packets ({:.2}s elapsed)",
            count,
            self.started_at.elapsed().as_secs_f64()
        );
    }
}

#[cfg(test)]
mod tests_progress {
    use super::*;

    #[test]
    fn test_maybe_log_does_not_panic_on_boundary_or_off_boundary_counts() {
        let reporter = ProgressReporter::new(false);
        reporter.maybe_log(PROGRESS_INTERVAL);
        reporter.maybe_log(PROGRESS_INTERVAL + 1);
        reporter.maybe_log(0);
    }

    #[test]
    fn test_quiet_reporter_is_silent() {
        let reporter = ProgressReporter::new(true);
        reporter.maybe_log(PROGRESS_INTERVAL);
    }
}
