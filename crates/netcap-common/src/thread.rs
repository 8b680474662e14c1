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
// File created: 2024-05-07
// Last updated: 2024-11-02
//

use log::warn;

/// Clamp a requested worker count to the number of logical cores actually
/// available, warning the user when the request had to be lowered.
pub fn get_available_threads(n_wanted_threads: usize) -> usize {
    let n_available_threads: usize = num_cpus::get();

    if n_wanted_threads > n_available_threads {
        warn!(
            "You requested to use {} threads, but your CPU only has {} logical cores.",
            n_wanted_threads,
            n_available_threads,
        );
        warn!(
            "Will instead use all of the systems available logical cores ({} threads).",
            n_available_threads,
        );
        return n_available_threads;
    }
    n_wanted_threads
}

/// Size the bounded channel that sits between the packet reader and the
/// worker pool. A channel that is too small stalls the reader on every
/// send; one that is too large lets an unbounded number of undecoded
/// packets pile up in memory ahead of a slow decoder. Scaling linearly
/// with worker count gives each worker a small private backlog without
/// removing backpressure entirely.
pub fn estimate_best_thread_channel_capacity(n_workers: usize) -> usize {
    const PER_WORKER_SLOTS: usize = 64;
    const MIN_CAPACITY: usize = 128;

    (n_workers * PER_WORKER_SLOTS).max(MIN_CAPACITY)
}

#[cfg(test)]
mod tests_thread {
    use super::*;

    #[test]
    fn test_estimate_best_thread_channel_capacity_scales_with_workers() {
        assert_eq!(128, estimate_best_thread_channel_capacity(1));
        assert_eq!(256, estimate_best_thread_channel_capacity(4));
        assert_eq!(640, estimate_best_thread_channel_capacity(10));
    }

    #[test]
    fn test_estimate_best_thread_channel_capacity_has_a_floor() {
        assert_eq!(128, estimate_best_thread_channel_capacity(0));
    }

    #[test]
    fn test_get_available_threads_passes_through_a_sane_request() {
        assert_eq!(1, get_available_threads(1));
    }

    #[test]
    fn test_get_available_threads_clamps_to_logical_cores() {
        let available = num_cpus::get();
        assert_eq!(available, get_available_threads(available + 1000));
    }
}
