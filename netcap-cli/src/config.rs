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

use std::env;
use std::path::PathBuf;

use netcap_common::error::{Result, SetupError};
use netcap_pipeline::CollectorConfig;

use crate::cli::CaptureArgs;

/// Bridge parsed `capture` flags into a `CollectorConfig`, applying the
/// `NETCAP_OUT` environment fallback when `--out` was not passed.
pub fn build_collector_config(args: &CaptureArgs) -> Result<CollectorConfig> {
    let out_dir = args
        .out
        .clone()
        .or_else(|| env::var("NETCAP_OUT").ok().map(PathBuf::from))
        .ok_or_else(|| Box::new(SetupError::new("no output directory given; pass --out or set NETCAP_OUT")))?;

    let mut builder = CollectorConfig::builder()
        .with_source(args.source.clone())
        .with_out_dir(out_dir)
        .with_include_decoders(args.include_decoders.clone())
        .with_exclude_decoders(args.exclude_decoders.clone())
        .with_compression(args.compression)
        .with_csv(args.csv)
        .with_buffered(!args.no_buffer)
        .with_include_payloads(args.include_payloads)
        .with_quiet(args.quiet)
        .with_write_chan(args.write_chan)
        .with_export(args.export)
        .with_tool_version(env!("CARGO_PKG_VERSION"));

    if let Some(bpf) = &args.bpf {
        builder = builder.with_bpf(bpf.clone());
    }
    if let Some(bytes) = args.mem_buffer_size {
        builder = builder.with_mem_buffer_bytes(bytes);
    }
    if let Some(workers) = args.workers {
        builder = builder.with_workers(workers);
    }

    builder.try_build()
}

#[cfg(test)]
mod tests_config {
    use super::*;
    use std::path::PathBuf;

    fn base_args() -> CaptureArgs {
        CaptureArgs {
            source: "eth0".to_string(),
            bpf: None,
            include_decoders: Vec::new(),
            exclude_decoders: Vec::new(),
            out: Some(PathBuf::from("/tmp/netcap-test-out")),
            compression: false,
            csv: false,
            no_buffer: false,
            mem_buffer_size: None,
            include_payloads: false,
            quiet: false,
            write_chan: false,
            workers: None,
            export: false,
        }
    }

    #[test]
    fn test_builds_config_from_explicit_out_dir() {
        let args = base_args();
        assert!(build_collector_config(&args).is_ok());
    }

    #[test]
    fn test_rejects_missing_out_dir_and_env() {
        std::env::remove_var("NETCAP_OUT");
        let mut args = base_args();
        args.out = None;
        assert!(build_collector_config(&args).is_err());
    }
}
