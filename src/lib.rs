//! # portscout - A Concurrent TCP/UDP Port Scanner
//!
//! portscout probes one host over TCP connect and/or UDP, grabs banners from
//! the services that answer and identifies them by banner signature and
//! well-known port.
//!
//! ## Features
//!
//! - **TCP and UDP**: connect probes with banner grabbing, protocol-specific
//!   UDP payloads with `OPEN|FILTERED` for silent ports
//! - **Bounded Concurrency**: a fixed pool of in-flight probes, admitted in
//!   port order, with optional rate limiting
//! - **Stealth Mode**: a random 100-500ms delay before each TCP connect
//! - **Service Identification**: banner regexes first, then port tables
//! - **Pluggable Sinks**: terminal, log file, CSV, JSON, or a channel to
//!   another thread
//! - **Cancellation**: stop admitting work and keep everything gathered so far
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use portscout::scanner::{ProtocolSelection, ScanCoordinator, ScanJobConfig};
//! use portscout::sink::ConsoleSink;
//! use portscout::types::{resolve_target, PortSet};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let target = resolve_target("127.0.0.1").await?;
//! let job = ScanJobConfig::new(PortSet::resolve("22,80,443")?)
//!     .with_protocols(ProtocolSelection::Both);
//!
//! let session = ScanCoordinator::new(target, job)
//!     .with_sink(ConsoleSink::new())
//!     .run()
//!     .await?;
//!
//! println!("{} open ports", session.open_count());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`types`] - Port sets and scan targets
//! - [`scanner`] - Probes, the scan session and the coordinator
//! - [`services`] - Banner signatures and port-to-service tables
//! - [`banner`] - Banner reading and cleanup
//! - [`sink`] - Where results go
//! - [`output`] - Rendering shared by the sinks
//! - [`config`] - Settings file
//! - [`error`] - Error types

pub mod banner;
pub mod cli;
pub mod config;
pub mod error;
pub mod output;
pub mod scanner;
pub mod services;
pub mod sink;
pub mod types;

// Re-export commonly used types
pub use error::{ScanError, SinkError};
pub use scanner::{
    PortStatus, ProbeResult, Protocol, ProtocolSelection, ScanCoordinator, ScanJobConfig,
    ScanSession, SessionState,
};
pub use sink::ResultSink;
pub use types::{Port, PortSet, ScanTarget};
