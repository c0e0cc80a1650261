//! CLI output formatting for preflight and pipeline results.
//!
//! # Output Format
//!
//! ## Check
//!
//! ```text
//! Accepted
//!     Format: PNG
//!     Size: 1024x768
//!     Mode: RGB
//! ```
//!
//! ```text
//! Rejected
//!     Reason: Image size invalid or exceeds configured maximum
//! ```
//!
//! ## Process
//!
//! ```text
//! Processed
//!     Input: PNG 1024x768 RGB
//!     Output: PNG 512x384 RGB
//! ```
//!
//! ```text
//! Failed (server)
//!     Reason: timeout
//! ```
//!
//! ## Response document
//!
//! `process --json` prints the document an upload endpoint would return:
//!
//! ```text
//! {"status":"ok","meta":{...},"processed":{...}}             200
//! {"error":"invalid image","reason":"..."}                  400
//! {"error":"processing_failed","reason":"..."}              500
//! ```
//!
//! # Architecture
//!
//! Each result has a `format_*` function (returns `Vec<String>` or a JSON
//! value) for testability and a `print_*` wrapper that writes to stdout.
//! Format functions are pure: no I/O, no side effects.

use crate::pipeline::{FailureClass, PipelineError, PipelineReport};
use crate::preflight::PreflightResult;
use serde_json::{Value, json};

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn class_label(class: FailureClass) -> &'static str {
    match class {
        FailureClass::Client => "client",
        FailureClass::Server => "server",
    }
}

// ============================================================================
// Check
// ============================================================================

/// Format a preflight result as display lines.
pub fn format_check_result(result: &PreflightResult) -> Vec<String> {
    match result {
        PreflightResult::Accepted(meta) => vec![
            "Accepted".to_string(),
            format!("{}Format: {}", indent(1), meta.format()),
            format!("{}Size: {}", indent(1), meta.size()),
            format!("{}Mode: {}", indent(1), meta.color_mode()),
        ],
        PreflightResult::Rejected(reason) => vec![
            "Rejected".to_string(),
            format!("{}Reason: {}", indent(1), reason),
        ],
    }
}

pub fn print_check_result(result: &PreflightResult) {
    for line in format_check_result(result) {
        println!("{}", line);
    }
}

// ============================================================================
// Process
// ============================================================================

/// Format a pipeline result as display lines.
pub fn format_process_result(result: &Result<PipelineReport, PipelineError>) -> Vec<String> {
    match result {
        Ok(report) => vec![
            "Processed".to_string(),
            format!(
                "{}Input: {} {} {}",
                indent(1),
                report.meta.format(),
                report.meta.size(),
                report.meta.color_mode()
            ),
            format!(
                "{}Output: {} {} {}",
                indent(1),
                report.processed.format,
                report.processed.size,
                report.processed.mode
            ),
        ],
        Err(err) => vec![
            format!("Failed ({})", class_label(err.class())),
            format!("{}Reason: {}", indent(1), err.reason()),
        ],
    }
}

pub fn print_process_result(result: &Result<PipelineReport, PipelineError>) {
    for line in format_process_result(result) {
        println!("{}", line);
    }
}

// ============================================================================
// Response document
// ============================================================================

/// Build the JSON response document for a pipeline result.
pub fn response_json(result: &Result<PipelineReport, PipelineError>) -> Value {
    match result {
        Ok(report) => json!({
            "status": "ok",
            "meta": report.meta,
            "processed": report.processed,
        }),
        Err(err) => {
            let error = match err.class() {
                FailureClass::Client => "invalid image",
                FailureClass::Server => "processing_failed",
            };
            json!({ "error": error, "reason": err.reason() })
        }
    }
}

/// HTTP-style status that accompanies [`response_json`].
pub fn response_status(result: &Result<PipelineReport, PipelineError>) -> u16 {
    match result {
        Ok(_) => 200,
        Err(err) => match err.class() {
            FailureClass::Client => 400,
            FailureClass::Server => 500,
        },
    }
}

pub fn print_response_json(result: &Result<PipelineReport, PipelineError>) {
    println!("{}", response_json(result));
}
