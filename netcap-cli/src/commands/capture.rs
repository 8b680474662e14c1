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

use std::sync::atomic::Ordering;

use log::{error, info};
use netcap_pipeline::Collector;

use crate::cli::CaptureArgs;
use crate::config::build_collector_config;

/// Run the pipeline end to end. Returns non-zero only for a fatal-before- or
/// fatal-during-run failure (`InvalidConfig`/`SourceUnavailable`/
/// `SchemaViolation`); a `RunSummary` with nonzero writer or decoder error
/// tallies is still exit code 0 — those faults were isolated and logged.
pub fn run(args: CaptureArgs) -> i32 {
    let config = match build_collector_config(&args) {
        Ok(config) => config,
        Err(err) => {
            error!("invalid configuration: {err}");
            return 1;
        }
    };

    let mut collector = match Collector::init(config) {
        Ok(collector) => collector,
        Err(err) => {
            error!("failed to start capture: {err}");
            return 1;
        }
    };

    let cancel = collector.cancel_handle();
    if ctrlc::set_handler(move || cancel.store(true, Ordering::SeqCst)).is_err() {
        error!("failed to install Ctrl-C handler, continuing without one");
    }

    match collector.run() {
        Ok(summary) => {
            info!("capture finished: {} packets processed", summary.packets_processed);
            0
        }
        Err(err) => {
            error!("capture failed: {err}");
            1
        }
    }
}

#[cfg(test)]
mod tests_capture {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_unknown_include_decoder_fails_before_any_file_is_written() {
        let dir = tempdir().unwrap();
        let args = CaptureArgs {
            source: "definitely-not-a-real-interface-xyz".to_string(),
            bpf: None,
            include_decoders: vec!["NotARealDecoder".to_string()],
            exclude_decoders: Vec::new(),
            out: Some(dir.path().to_path_buf()),
            compression: false,
            csv: false,
            no_buffer: false,
            mem_buffer_size: None,
            include_payloads: false,
            quiet: true,
            write_chan: false,
            workers: None,
            export: false,
        };

        assert_eq!(1, run(args));
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }
}
