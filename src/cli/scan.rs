//! Scan command implementation.
//!
//! Turns parsed arguments into a scan job, wires up the sinks and runs the
//! coordinator until it completes or the user interrupts it.

use super::Cli;
use crate::config::AppSettings;
use crate::output;
use crate::scanner::{ScanCoordinator, ScanJobConfig, SessionState};
use crate::sink::{default_log_path, ConsoleSink, CsvSink, JsonSink, LogFileSink, ResultSink};
use crate::types::{resolve_target, PortSet, ScanTarget};
use anyhow::{bail, Context, Result};
use std::time::Duration;
use tracing::{info, warn};

impl Cli {
    /// Run the scan described by these arguments.
    ///
    /// Errors are fatal and happen before any probe is sent. A run that the
    /// user interrupts still returns its final state.
    pub async fn execute(&self) -> Result<SessionState> {
        let settings = self.load_settings()?;

        let ports = PortSet::resolve(&self.ports)
            .with_context(|| format!("invalid port specification '{}'", self.ports))?;
        let target = resolve_target(&self.target)
            .await
            .with_context(|| format!("could not resolve target '{}'", self.target))?;

        let job = self.job_config(&settings, ports)?;

        if !self.silent {
            output::print_scan_header(
                &target,
                job.protocols,
                job.ports.len(),
                job.concurrency,
                job.stealth,
            );
        }

        let mut coordinator = ScanCoordinator::new(target.clone(), job);
        for sink in self.build_sinks(&settings, &target) {
            coordinator.add_sink(sink);
        }

        let cancel = coordinator.cancel_token();
        let interrupt = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("interrupt received, stopping scan");
                    cancel.cancel();
                }
            }
        });

        let result = coordinator.run().await;
        interrupt.abort();
        let session = result.context("scan failed")?;

        if session.is_cancelled() && !self.silent {
            output::print_warning("Scan interrupted by user");
        }

        Ok(session.state())
    }

    fn load_settings(&self) -> Result<AppSettings> {
        match &self.config {
            Some(path) => AppSettings::load_from(path)
                .with_context(|| format!("failed to load settings from {}", path.display())),
            None => AppSettings::load().context("failed to load settings"),
        }
    }

    /// Merge command-line flags over the settings file.
    fn job_config(&self, settings: &AppSettings, ports: PortSet) -> Result<ScanJobConfig> {
        let timeout = match self.timeout {
            Some(secs) => match Duration::try_from_secs_f64(secs) {
                Ok(timeout) if !timeout.is_zero() => timeout,
                _ => bail!("timeout must be a positive number of seconds, got {}", secs),
            },
            None => settings.timeout(),
        };

        let concurrency = self.threads.unwrap_or(settings.concurrency);
        if concurrency == 0 {
            bail!("thread count must be at least 1");
        }

        let job = ScanJobConfig::new(ports)
            .with_protocols(self.protocols(settings.protocol))
            .with_concurrency(concurrency)
            .with_timeout(timeout)
            .with_banner_timeout(
                self.banner_timeout
                    .map(Duration::from_millis)
                    .unwrap_or_else(|| settings.banner_timeout()),
            )
            .with_udp_attempts(self.udp_retries.unwrap_or(settings.udp_retries))
            .with_rate_limit(self.rate_limit.unwrap_or(settings.rate_limit))
            .with_stealth(self.stealth);
        job.validate()?;
        Ok(job)
    }

    /// Open every requested sink. A file that cannot be created is reported
    /// and left out; the scan still runs.
    fn build_sinks(&self, settings: &AppSettings, target: &ScanTarget) -> Vec<Box<dyn ResultSink>> {
        let mut sinks: Vec<Box<dyn ResultSink>> = vec![Box::new(
            ConsoleSink::new()
                .verbose(self.verbose)
                .silent(self.silent)
                .with_progress(!self.no_progress),
        )];

        let log_path = self.log.clone().unwrap_or_else(|| {
            default_log_path(self.log_dir.as_ref().unwrap_or(&settings.log_dir))
        });
        match LogFileSink::create(&log_path) {
            Ok(sink) => sinks.push(Box::new(sink.verbose(self.verbose))),
            Err(e) => self.sink_unavailable("log file", &log_path, e),
        }

        if let Some(path) = &self.output_csv {
            match CsvSink::create(path, target) {
                Ok(sink) => sinks.push(Box::new(sink)),
                Err(e) => self.sink_unavailable("CSV output", path, e),
            }
        }

        if let Some(path) = &self.output_json {
            match JsonSink::create(path) {
                Ok(sink) => sinks.push(Box::new(sink)),
                Err(e) => self.sink_unavailable("JSON output", path, e),
            }
        }

        sinks
    }

    fn sink_unavailable(&self, what: &str, path: &std::path::Path, error: impl std::fmt::Display) {
        warn!(path = %path.display(), error = %error, "could not open {}", what);
        if !self.silent {
            output::print_warning(&format!(
                "Could not open {} {}: {}",
                what,
                path.display(),
                error
            ));
        }
    }
}
