//! Terminal output: live result lines, a progress bar and the summary.

use super::ResultSink;
use crate::error::SinkError;
use crate::output::{format_result_line, render_summary};
use crate::scanner::{PortStatus, ProbeResult, ScanProgress, ScanSession};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};

/// Prints results to stdout as they complete.
///
/// Open and open-or-filtered ports are always shown; closed, filtered and
/// failed ports only when verbose. A silent sink prints nothing at all.
#[derive(Default)]
pub struct ConsoleSink {
    verbose: bool,
    silent: bool,
    show_progress: bool,
    progress: Option<ProgressBar>,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self {
            show_progress: true,
            ..Self::default()
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    fn print_line(&self, line: String) {
        match &self.progress {
            Some(pb) => pb.println(line),
            None => println!("{}", line),
        }
    }
}

impl ResultSink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    fn on_start(&mut self, session: &ScanSession) -> Result<(), SinkError> {
        if self.silent || !self.show_progress {
            return Ok(());
        }

        let pb = ProgressBar::new(session.total_tasks() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        self.progress = Some(pb);
        Ok(())
    }

    fn on_result(&mut self, result: &ProbeResult) -> Result<(), SinkError> {
        if self.silent || !(self.verbose || result.is_interesting()) {
            return Ok(());
        }

        let line = format_result_line(result);
        let line = match result.status {
            PortStatus::Open | PortStatus::OpenOrFiltered => style(line).green().to_string(),
            PortStatus::Error => style(line).magenta().to_string(),
            PortStatus::Closed | PortStatus::Filtered => style(line).dim().to_string(),
        };
        self.print_line(line);
        Ok(())
    }

    fn on_progress(&mut self, progress: ScanProgress) -> Result<(), SinkError> {
        if let Some(pb) = &self.progress {
            pb.set_position(progress.completed as u64);
            pb.set_message(format!("{} open", progress.open));
        }
        Ok(())
    }

    fn on_complete(&mut self, session: &ScanSession) -> Result<(), SinkError> {
        if let Some(pb) = self.progress.take() {
            pb.finish_and_clear();
        }
        if self.silent {
            return Ok(());
        }

        let stdout = io::stdout();
        let mut out = stdout.lock();
        render_summary(&mut out, session, self.verbose)?;
        out.flush()?;
        Ok(())
    }
}
