//! Wire contract between the isolation boundary and the worker.
//!
//! The worker receives exactly one argument (the staged payload path) and a
//! whitelisted environment. It answers with one JSON document on stdout and
//! an exit status:
//!
//! | Exit | stdout |
//! |---|---|
//! | 0 | `{"format": "PNG", "size": [w, h], "mode": "RGB"}` |
//! | 1 | nothing; usage text on stderr |
//! | 2 | `{"error": "unrecognized_image"}` |
//! | 3 | `{"error": "processing_failed", "detail": "..."}` |
//!
//! Callers must treat any non-zero status as failure. stderr is a diagnostic
//! only and is never parsed as structured data.

use crate::types::ProcessedResult;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pixel ceiling the worker enforces on its own.
pub const ENV_MAX_PIXELS: &str = "PIXELGATE_MAX_PIXELS";
/// Longest edge of the derived artifact.
pub const ENV_MAX_DIMENSION: &str = "PIXELGATE_MAX_DIMENSION";
/// `tracing` filter for the worker's stderr logging.
pub const ENV_LOG: &str = "PIXELGATE_LOG";

/// Upper bound on failure detail surfaced to callers, in characters.
pub const DETAIL_LIMIT: usize = 400;

pub const USAGE: &str = "Usage: pixelgate-worker <path>";

/// Distinguished worker exit statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    Success,
    Usage,
    Unrecognized,
    ProcessingFailed,
}

impl WorkerExit {
    pub fn code(self) -> i32 {
        match self {
            WorkerExit::Success => 0,
            WorkerExit::Usage => 1,
            WorkerExit::Unrecognized => 2,
            WorkerExit::ProcessingFailed => 3,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(WorkerExit::Success),
            1 => Some(WorkerExit::Usage),
            2 => Some(WorkerExit::Unrecognized),
            3 => Some(WorkerExit::ProcessingFailed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerErrorKind {
    UnrecognizedImage,
    ProcessingFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerError {
    pub error: WorkerErrorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// The single document a worker prints on stdout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkerDocument {
    Success(ProcessedResult),
    Failure(WorkerError),
}

impl WorkerDocument {
    pub fn unrecognized() -> Self {
        WorkerDocument::Failure(WorkerError {
            error: WorkerErrorKind::UnrecognizedImage,
            detail: None,
        })
    }

    pub fn processing_failed(detail: impl Into<String>) -> Self {
        WorkerDocument::Failure(WorkerError {
            error: WorkerErrorKind::ProcessingFailed,
            detail: Some(truncate_detail(&detail.into(), DETAIL_LIMIT)),
        })
    }

    /// The exit status that accompanies this document.
    pub fn exit(&self) -> WorkerExit {
        match self {
            WorkerDocument::Success(_) => WorkerExit::Success,
            WorkerDocument::Failure(WorkerError {
                error: WorkerErrorKind::UnrecognizedImage,
                ..
            }) => WorkerExit::Unrecognized,
            WorkerDocument::Failure(_) => WorkerExit::ProcessingFailed,
        }
    }

    /// Single-line JSON encoding.
    pub fn to_line(&self) -> String {
        // Only strings, integers and enums: serialization cannot fail.
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"error":"processing_failed","detail":"unserializable result"}"#.to_string()
        })
    }
}

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("worker produced no output")]
    Empty,
    #[error("worker output is not a valid result document: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("worker printed more than one document")]
    TrailingOutput,
}

/// Parse worker stdout into exactly one [`WorkerDocument`].
pub fn parse_document(stdout: &str) -> Result<WorkerDocument, ProtocolError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Err(ProtocolError::Empty);
    }
    let mut stream = serde_json::Deserializer::from_str(trimmed).into_iter::<WorkerDocument>();
    let document = match stream.next() {
        Some(result) => result?,
        None => return Err(ProtocolError::Empty),
    };
    if stream.next().is_some() {
        return Err(ProtocolError::TrailingOutput);
    }
    Ok(document)
}

/// Trim and cap `text` at `limit` characters (not bytes).
pub fn truncate_detail(text: &str, limit: usize) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(limit) {
        Some((cut, _)) => trimmed[..cut].to_string(),
        None => trimmed.to_string(),
    }
}
