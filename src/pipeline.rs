//! End-to-end ingestion: preflight in process, then processing in the worker.
//!
//! Bytes that fail preflight never reach the isolation boundary, so a
//! rejected upload costs no process spawn and no disk write.

use crate::config::GateConfig;
use crate::imaging::{ImageBackend, RustBackend};
use crate::isolation::{IsolationBoundary, WorkerOutcome};
use crate::preflight::{PreflightChecker, RejectReason};
use crate::types::{ImageMetadata, ProcessedResult};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Who is at fault for a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The input is bad. Retrying the same bytes will not help.
    Client,
    /// The input may be fine; processing it failed on our side.
    Server,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("{0}")]
    Rejected(RejectReason),
    #[error("worker did not recognize the image")]
    UnrecognizedInput,
    #[error("processing failed: {0}")]
    ProcessingFailed(String),
    #[error("worker timed out")]
    TimedOut,
    #[error("worker could not be launched: {0}")]
    LaunchFailed(String),
}

impl PipelineError {
    pub fn class(&self) -> FailureClass {
        match self {
            PipelineError::Rejected(_) | PipelineError::UnrecognizedInput => FailureClass::Client,
            PipelineError::ProcessingFailed(_)
            | PipelineError::TimedOut
            | PipelineError::LaunchFailed(_) => FailureClass::Server,
        }
    }

    /// Reason string for a response body.
    pub fn reason(&self) -> String {
        match self {
            PipelineError::Rejected(reason) => reason.message().to_string(),
            PipelineError::UnrecognizedInput => RejectReason::UnrecognizedFormat.message().to_string(),
            PipelineError::ProcessingFailed(detail) => detail.clone(),
            PipelineError::TimedOut => "timeout".to_string(),
            PipelineError::LaunchFailed(detail) => detail.clone(),
        }
    }
}

/// What a successful request returns: the verified input metadata and the
/// description of the derived artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    pub meta: ImageMetadata,
    pub processed: ProcessedResult,
}

/// Preflight plus isolation, configured once and shared across requests.
pub struct Pipeline<B: ImageBackend = RustBackend> {
    checker: PreflightChecker<B>,
    boundary: IsolationBoundary,
    timeout: Duration,
}

impl Pipeline<RustBackend> {
    pub fn from_config(config: &GateConfig) -> Self {
        Self::new(
            PreflightChecker::new(&config.preflight),
            IsolationBoundary::new(config),
            config.worker.timeout(),
        )
    }
}

impl<B: ImageBackend> Pipeline<B> {
    pub fn new(checker: PreflightChecker<B>, boundary: IsolationBoundary, timeout: Duration) -> Self {
        Self {
            checker,
            boundary,
            timeout,
        }
    }

    pub fn checker(&self) -> &PreflightChecker<B> {
        &self.checker
    }

    /// Gate `bytes`, then derive a thumbnail in an isolated worker.
    pub fn run(&self, bytes: &[u8]) -> Result<PipelineReport, PipelineError> {
        let meta = self
            .checker
            .check(bytes)
            .into_result()
            .map_err(PipelineError::Rejected)?;
        tracing::debug!(format = meta.format(), size = %meta.size(), "preflight accepted");

        match self.boundary.execute(bytes, self.timeout) {
            WorkerOutcome::Success(processed) => {
                tracing::debug!(size = %processed.size, "worker succeeded");
                Ok(PipelineReport { meta, processed })
            }
            WorkerOutcome::UnrecognizedInput => Err(PipelineError::UnrecognizedInput),
            WorkerOutcome::ProcessingFailed(detail) => Err(PipelineError::ProcessingFailed(detail)),
            WorkerOutcome::TimedOut => Err(PipelineError::TimedOut),
            WorkerOutcome::LaunchFailed(detail) => Err(PipelineError::LaunchFailed(detail)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PreflightConfig;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::isolation::WorkerCommand;
    use crate::test_helpers::{noise_bytes, png_with_declared_size};
    use tempfile::TempDir;

    fn missing_worker(staging: &TempDir) -> IsolationBoundary {
        IsolationBoundary::with_worker(WorkerCommand::new("/nonexistent/pixelgate-worker"))
            .staging_dir(staging.path())
    }

    #[test]
    fn rejected_input_never_reaches_worker() {
        let staging = TempDir::new().unwrap();
        // Reaching the boundary would surface as LaunchFailed.
        let pipeline = Pipeline::new(
            PreflightChecker::new(&PreflightConfig::default()),
            missing_worker(&staging),
            Duration::from_secs(1),
        );

        let err = pipeline.run(&noise_bytes(1024)).unwrap_err();
        assert_eq!(err, PipelineError::Rejected(RejectReason::UnrecognizedFormat));
        assert_eq!(err.class(), FailureClass::Client);

        let err = pipeline.run(&png_with_declared_size(10_000, 6_000)).unwrap_err();
        assert_eq!(err, PipelineError::Rejected(RejectReason::SizeExceeded));
    }

    #[test]
    fn accepted_input_reaches_boundary() {
        let staging = TempDir::new().unwrap();
        let pipeline = Pipeline::new(
            PreflightChecker::with_backend(
                MockBackend::with_header(64, 64),
                &PreflightConfig::default(),
            ),
            missing_worker(&staging),
            Duration::from_secs(1),
        );

        let err = pipeline.run(b"bytes").unwrap_err();
        assert_eq!(err, PipelineError::LaunchFailed("worker not found".into()));
        assert_eq!(err.class(), FailureClass::Server);
        assert_eq!(
            pipeline.checker().backend().get_operations(),
            vec![RecordedOp::Sniff, RecordedOp::Verify, RecordedOp::ReadHeader]
        );
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn logged_at(level: tracing::Level) -> String {
        let staging = TempDir::new().unwrap();
        let pipeline = Pipeline::new(
            PreflightChecker::with_backend(
                MockBackend::with_header(64, 64),
                &PreflightConfig::default(),
            ),
            missing_worker(&staging),
            Duration::from_secs(1),
        );
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            let _ = pipeline.run(b"bytes");
        });
        let bytes = captured.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn per_request_events_are_debug_level() {
        assert!(!logged_at(tracing::Level::INFO).contains("preflight accepted"));
        assert!(logged_at(tracing::Level::DEBUG).contains("preflight accepted"));
    }

    #[test]
    fn error_classes() {
        assert_eq!(
            PipelineError::Rejected(RejectReason::VerificationFailed).class(),
            FailureClass::Client
        );
        assert_eq!(
            PipelineError::UnrecognizedInput.class(),
            FailureClass::Client
        );
        for err in [
            PipelineError::ProcessingFailed("x".into()),
            PipelineError::TimedOut,
            PipelineError::LaunchFailed("x".into()),
        ] {
            assert_eq!(err.class(), FailureClass::Server, "{err}");
        }
    }

    #[test]
    fn reasons_for_clients() {
        assert_eq!(
            PipelineError::Rejected(RejectReason::VerificationFailed).reason(),
            "Image verification failed"
        );
        assert_eq!(PipelineError::TimedOut.reason(), "timeout");
        assert_eq!(
            PipelineError::ProcessingFailed("decode failed".into()).reason(),
            "decode failed"
        );
    }
}
