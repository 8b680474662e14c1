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

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "netcap", version, about = "Capture, decode, and export network traffic records.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the capture-and-decode pipeline against a live interface or an offline file.
    Capture(CaptureArgs),
    /// Print every record in a previously written typed-binary file as one JSON line each.
    Dump(DumpArgs),
    /// Re-emit a previously written typed-binary file as CSV.
    Export(ExportArgs),
    /// Maintenance helpers that don't run the collector.
    Util(UtilArgs),
}

#[derive(Args, Debug)]
pub struct CaptureArgs {
    /// Interface name or path to a pcap/pcapng file; the two are told apart by file magic.
    #[arg(short = 's', long = "source", required = true)]
    pub source: String,

    /// BPF filter expression applied to the source.
    #[arg(short = 'b', long = "bpf")]
    pub bpf: Option<String>,

    /// Comma-separated decoder names to enable; defaults to every built-in decoder.
    #[arg(long = "include", value_delimiter = ',')]
    pub include_decoders: Vec<String>,

    /// Comma-separated decoder names to disable.
    #[arg(long = "exclude", value_delimiter = ',')]
    pub exclude_decoders: Vec<String>,

    /// Output directory for record files. Falls back to `NETCAP_OUT` when omitted.
    #[arg(short = 'o', long = "out")]
    pub out: Option<PathBuf>,

    /// Gzip-compress every writer's output file.
    #[arg(long = "compress")]
    pub compression: bool,

    /// Use CSV framing instead of typed-binary.
    #[arg(long = "csv")]
    pub csv: bool,

    /// Disable writer buffering (flush every record immediately).
    #[arg(long = "no-buffer")]
    pub no_buffer: bool,

    /// In-memory buffer size per writer, in bytes.
    #[arg(long = "mem-buffer-size")]
    pub mem_buffer_size: Option<usize>,

    /// Include raw payload bytes in written records.
    #[arg(long = "include-payloads")]
    pub include_payloads: bool,

    /// Suppress stdout progress logging.
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,

    /// Fan out each writer's framed bytes onto an in-process channel as well as the file.
    #[arg(long = "write-chan")]
    pub write_chan: bool,

    /// Concurrent worker count. Defaults to the number of logical CPUs.
    #[arg(short = 'w', long = "workers")]
    pub workers: Option<usize>,

    /// Enable per-record Prometheus metric increments.
    #[arg(long = "export")]
    pub export: bool,
}

#[derive(Args, Debug)]
pub struct DumpArgs {
    /// Path to a typed-binary `.bin[.gz]` file.
    pub path: PathBuf,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Path to a typed-binary `.bin[.gz]` file.
    pub path: PathBuf,

    /// Where to write the CSV output. Defaults to stdout.
    #[arg(short = 'o', long = "out")]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct UtilArgs {
    #[command(subcommand)]
    pub command: UtilCommand,
}

#[derive(Subcommand, Debug)]
pub enum UtilCommand {
    /// Print the default decoder names the registry would select.
    ListDecoders,
    /// Header-first framing check of a typed-binary file.
    Verify { path: PathBuf },
}

#[cfg(test)]
mod tests_cli {
    use super::*;

    #[test]
    fn test_parses_capture_with_required_source() {
        let cli = Cli::try_parse_from(["netcap", "capture", "--source", "eth0"]).unwrap();
        match cli.command {
            Command::Capture(args) => assert_eq!("eth0", args.source),
            _ => panic!("expected Capture"),
        }
    }

    #[test]
    fn test_capture_requires_source() {
        assert!(Cli::try_parse_from(["netcap", "capture"]).is_err());
    }

    #[test]
    fn test_include_decoders_splits_on_comma() {
        let cli = Cli::try_parse_from(["netcap", "capture", "-s", "eth0", "--include", "Arp,Dns"]).unwrap();
        match cli.command {
            Command::Capture(args) => assert_eq!(vec!["Arp".to_string(), "Dns".to_string()], args.include_decoders),
            _ => panic!("expected Capture"),
        }
    }

    #[test]
    fn test_parses_util_verify() {
        let cli = Cli::try_parse_from(["netcap", "util", "verify", "out/Tcp.bin"]).unwrap();
        match cli.command {
            Command::Util(args) => match args.command {
                UtilCommand::Verify { path } => assert_eq!(PathBuf::from("out/Tcp.bin"), path),
                _ => panic!("expected Verify"),
            },
            _ => panic!("expected Util"),
        }
    }
}
