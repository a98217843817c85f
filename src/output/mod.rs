//! Output formatting module.
//!
//! Rendering helpers shared by the result sinks: the terminal summary and
//! per-result lines, the CSV row layout and the JSON report document.

mod csv_format;
mod json_format;
mod plain;

pub use csv_format::{csv_record, CSV_HEADER};
pub use json_format::{write_json, JsonReport, JsonResult, ScanMetadata};
pub use plain::{
    format_result_line, print_error, print_scan_header, print_warning, render_summary,
    truncate_string,
};
