//! Command-line interface definitions.
//!
//! A single command: `portscout <TARGET> [OPTIONS]`. Flags left unset fall
//! back to the settings file, then to built-in defaults.

mod scan;

use crate::scanner::ProtocolSelection;
use clap::Parser;
use std::path::PathBuf;

/// portscout - a concurrent TCP/UDP port scanner.
///
/// Probes every requested port over TCP connect and/or UDP, grabs banners
/// from open services and identifies them.
#[derive(Parser, Debug)]
#[command(name = "portscout")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "A concurrent TCP/UDP port scanner", long_about = None)]
#[command(after_help = "Examples:
  portscout 192.168.1.1
  portscout example.com -p 22,80,443 --output-json results.json
  portscout 10.0.0.1 -p 1-65535 -t 1000 --stealth --output-csv scan.csv
  portscout 192.168.1.1 --both -p 53,123,161")]
pub struct Cli {
    /// Target to scan (IP address or hostname)
    #[arg(value_name = "TARGET")]
    pub target: String,

    /// Ports to scan (e.g., "80", "80,443", "1-1000", "22,80,443,8000-9000")
    #[arg(short, long, default_value = "1-1024")]
    pub ports: String,

    /// Protocols to scan
    #[arg(long, value_enum, conflicts_with_all = ["udp", "both"])]
    pub protocol: Option<ProtocolSelection>,

    /// Scan UDP instead of TCP
    #[arg(long, conflicts_with = "both")]
    pub udp: bool,

    /// Scan both TCP and UDP
    #[arg(long)]
    pub both: bool,

    /// Maximum number of probes in flight
    #[arg(short = 't', long = "threads", value_name = "N")]
    pub threads: Option<usize>,

    /// Probe timeout in seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<f64>,

    /// TCP banner read timeout in milliseconds
    #[arg(long, value_name = "MS")]
    pub banner_timeout: Option<u64>,

    /// Datagrams sent per UDP port before reporting OPEN|FILTERED
    #[arg(long, value_name = "N")]
    pub udp_retries: Option<u32>,

    /// Maximum probes started per second (0 = unlimited)
    #[arg(long = "rate", value_name = "PPS")]
    pub rate_limit: Option<u32>,

    /// Add a random 100-500ms delay before each TCP connect
    #[arg(long)]
    pub stealth: bool,

    /// Also show closed, filtered and failed ports
    #[arg(short, long)]
    pub verbose: bool,

    /// Print nothing to the terminal (log and export files are still written)
    #[arg(long)]
    pub silent: bool,

    /// Disable the progress bar
    #[arg(long)]
    pub no_progress: bool,

    /// Log file path (default: <log-dir>/scan_YYYYmmdd_HHMMSS.log)
    #[arg(long, value_name = "PATH")]
    pub log: Option<PathBuf>,

    /// Directory for the default log file
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Write results to a CSV file
    #[arg(long, value_name = "PATH")]
    pub output_csv: Option<PathBuf>,

    /// Write results to a JSON file
    #[arg(long, value_name = "PATH")]
    pub output_json: Option<PathBuf>,

    /// Path to a settings file
    #[arg(long, value_name = "PATH", env = "PORTSCOUT_CONFIG")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Protocol selection from the shorthands, the explicit flag or the
    /// configured default, in that order.
    pub fn protocols(&self, default: ProtocolSelection) -> ProtocolSelection {
        if self.both {
            ProtocolSelection::Both
        } else if self.udp {
            ProtocolSelection::Udp
        } else {
            self.protocol.unwrap_or(default)
        }
    }
}
