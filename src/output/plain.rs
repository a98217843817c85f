//! Plain text output formatting.
//!
//! Produces human-readable output with colors and formatting.

use crate::banner::first_line;
use crate::scanner::{PortStatus, ProbeResult, ProtocolSelection, ScanSession};
use crate::types::ScanTarget;
use console::{style, Style};
use std::io::{self, Write};

/// Longest banner excerpt shown on a result line.
const BANNER_EXCERPT: usize = 50;

const RULE: &str = "═══════════════════════════════════════════════════════════════";
const THIN_RULE: &str = "───────────────────────────────────────────────────────────────";

fn status_style(status: PortStatus) -> Style {
    match status {
        PortStatus::Open | PortStatus::OpenOrFiltered => Style::new().green().bold(),
        PortStatus::Closed => Style::new().red(),
        PortStatus::Filtered => Style::new().yellow(),
        PortStatus::Error => Style::new().magenta(),
    }
}

/// One line describing a result, e.g.
/// `Port 22/TCP: OPEN | Service: SSH (OpenSSH 8.9) | Banner: SSH-2.0-OpenSSH_8.9`.
pub fn format_result_line(result: &ProbeResult) -> String {
    let mut line = format!(
        "Port {}/{}: {}",
        result.port, result.protocol, result.status
    );

    if result.is_interesting() {
        let service = result.service_label();
        if !service.is_empty() {
            line.push_str(" | Service: ");
            line.push_str(&service);
        }
        if let Some(banner) = result.banner.as_deref() {
            line.push_str(" | Banner: ");
            line.push_str(&truncate_string(first_line(banner), BANNER_EXCERPT));
        }
    } else if let Some(error) = result.error.as_deref() {
        line.push_str(" (");
        line.push_str(error);
        line.push(')');
    }

    line
}

/// Write the end-of-scan summary.
///
/// Only open and open-or-filtered ports are listed unless `verbose` is set.
pub fn render_summary<W: Write>(out: &mut W, session: &ScanSession, verbose: bool) -> io::Result<()> {
    let target = session.target();

    writeln!(out)?;
    writeln!(out, "{}", style(RULE).cyan())?;
    writeln!(
        out,
        "                    {} Scan Results",
        style("portscout").cyan().bold()
    )?;
    writeln!(out, "{}", style(RULE).cyan())?;
    writeln!(out)?;

    writeln!(out, "  {} {}", style("Target:").bold(), target.original)?;
    writeln!(out, "  {} {}", style("IP Address:").bold(), target.ip)?;
    writeln!(out, "  {} {}", style("Protocols:").bold(), session.protocols())?;
    writeln!(out)?;

    let elapsed = session.elapsed().unwrap_or_default();
    writeln!(
        out,
        "  {} {} of {} probes completed in {:.2}s",
        style("Statistics:").bold(),
        session.results().len(),
        session.total_tasks(),
        elapsed.as_secs_f64()
    )?;
    writeln!(
        out,
        "               {} open, {} open|filtered, {} closed, {} filtered, {} errors",
        style(session.open_count()).green().bold(),
        style(session.count_status(PortStatus::OpenOrFiltered)).green(),
        style(session.count_status(PortStatus::Closed)).red(),
        style(session.count_status(PortStatus::Filtered)).yellow(),
        style(session.count_status(PortStatus::Error)).magenta()
    )?;
    writeln!(out)?;

    let shown: Vec<&ProbeResult> = session
        .sorted_results()
        .into_iter()
        .filter(|r| verbose || r.is_interesting())
        .collect();

    if shown.is_empty() {
        writeln!(out, "  {}", style("No ports to display.").dim())?;
    } else {
        writeln!(out, "  {}", style(THIN_RULE).dim())?;
        writeln!(
            out,
            "  {:>10}  {:^14}  {:<22}  {}",
            style("PORT").bold(),
            style("STATE").bold(),
            style("SERVICE").bold(),
            style("BANNER").bold()
        )?;
        writeln!(out, "  {}", style(THIN_RULE).dim())?;

        for result in shown {
            let banner = result
                .banner
                .as_deref()
                .map(|b| truncate_string(first_line(b), 35))
                .unwrap_or_default();

            writeln!(
                out,
                "  {:>10}  {:^14}  {:<22}  {}",
                format!("{}/{}", result.port, result.protocol),
                status_style(result.status).apply_to(result.status.as_str()),
                result.service_label(),
                style(banner).dim()
            )?;
        }

        writeln!(out, "  {}", style(THIN_RULE).dim())?;
    }

    writeln!(out)?;
    let open = session.open_ports();
    if open.is_empty() {
        writeln!(out, "  {} None", style("Open ports found:").bold())?;
    } else {
        writeln!(out, "  {} {}", style("Open ports found:").bold(), open.join(", "))?;
    }

    if session.is_cancelled() {
        writeln!(
            out,
            "  {}",
            style("Scan interrupted by user; results above are partial.").yellow()
        )?;
    }

    writeln!(out)?;
    writeln!(out, "{}", style(RULE).cyan())?;
    writeln!(out)?;

    Ok(())
}

/// Print a scan header before scanning begins.
pub fn print_scan_header(
    target: &ScanTarget,
    protocols: ProtocolSelection,
    ports: usize,
    concurrency: usize,
    stealth: bool,
) {
    println!();
    println!(
        "{} {} v{}",
        style("Starting").cyan(),
        style("portscout").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{} Protocols: {}", style("•").dim(), style(protocols).yellow());
    println!(
        "{} Target: {} ({})",
        style("•").dim(),
        style(&target.original).white().bold(),
        target.ip
    );
    println!(
        "{} Scanning {} ports with {} workers...",
        style("•").dim(),
        style(ports).white().bold(),
        concurrency
    );
    if stealth {
        println!("{} Stealth mode: {}", style("•").dim(), style("enabled").yellow());
    }
    println!();
}

/// Print an error message.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", style("Error:").red().bold(), msg);
}

/// Print a warning message.
pub fn print_warning(msg: &str) {
    eprintln!("{} {}", style("Warning:").yellow().bold(), msg);
}

/// Truncate to at most `max_chars` characters, adding an ellipsis if cut.
pub fn truncate_string(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
