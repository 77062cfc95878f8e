//! Logging and tracing collaborators.
//!
//! Both are injected into the [`Migrator`](crate::Migrator) at construction.
//! The defaults forward to the `tracing` crate under the
//! [`TRACING_TARGET`] target; neither has any effect on control flow.

use std::fmt;

use tracing::field::Empty;

use crate::migration::MigrationMode;

/// Tracing target used by the engine.
pub const TRACING_TARGET: &str = "seqmig::migrate";

/// Receives progress messages before and after each migration.
pub trait Logger: Send + Sync {
    /// Log one progress message.
    fn log(&self, message: &str);
}

impl<F> Logger for F
where
    F: Fn(&str) + Send + Sync,
{
    fn log(&self, message: &str) {
        self(message)
    }
}

/// Default logger, emitting `tracing` info events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, message: &str) {
        tracing::info!(target: TRACING_TARGET, "{}", message);
    }
}

/// Outcome recorded on a span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpanStatus {
    /// Success, with an optional description.
    Ok(Option<String>),
    /// Failure, with the error message.
    Error(String),
}

impl SpanStatus {
    /// Successful status without a description.
    pub fn ok() -> Self {
        Self::Ok(None)
    }

    /// Failed status carrying the display form of an error.
    pub fn error(err: &impl fmt::Display) -> Self {
        Self::Error(err.to_string())
    }

    /// Check if the status is an error.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Ok(_) => "OK",
            Self::Error(_) => "ERROR",
        }
    }

    fn message(&self) -> Option<&str> {
        match self {
            Self::Ok(msg) => msg.as_deref(),
            Self::Error(msg) => Some(msg),
        }
    }
}

/// Attributes of a single migration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationSpanAttributes<'a> {
    /// Execution mode.
    pub mode: MigrationMode,
    /// Migration name.
    pub name: &'a str,
    /// Position in the configured sequence.
    pub position: usize,
}

/// A started span.
pub trait SpanHandle: Send + Sync {
    /// Record the applied count read at the start of the run.
    fn record_applied(&self, applied: usize);

    /// Identifier used to correlate child spans with this one, if any.
    fn span_id(&self) -> Option<u64> {
        None
    }

    /// The `tracing` span to instrument work with, if any.
    fn tracing_span(&self) -> tracing::Span {
        tracing::Span::none()
    }

    /// Set the final status and end the span.
    fn finish(self: Box<Self>, status: SpanStatus);
}

/// Creates spans for migration runs.
pub trait Tracer: Send + Sync {
    /// Start the root span of one `migrate` call.
    fn start_run(&self) -> Box<dyn SpanHandle>;

    /// Start a child span for one migration attempt.
    fn start_migration(
        &self,
        parent: &dyn SpanHandle,
        attributes: MigrationSpanAttributes<'_>,
    ) -> Box<dyn SpanHandle>;
}

/// Default tracer, emitting `tracing` spans.
///
/// The root span is named `migrate` with an `applied` field; children are
/// named `migration` with `mode`, `migration` and `position` fields. Status
/// is recorded in the `otel.status_code` and `otel.status_message` fields so
/// that an OpenTelemetry layer picks it up.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTracer;

impl Tracer for TracingTracer {
    fn start_run(&self) -> Box<dyn SpanHandle> {
        let span = tracing::info_span!(
            target: TRACING_TARGET,
            "migrate",
            applied = Empty,
            otel.status_code = Empty,
            otel.status_message = Empty,
        );
        Box::new(TracingSpan { span })
    }

    fn start_migration(
        &self,
        parent: &dyn SpanHandle,
        attributes: MigrationSpanAttributes<'_>,
    ) -> Box<dyn SpanHandle> {
        let parent = parent.tracing_span();
        let span = tracing::info_span!(
            target: TRACING_TARGET,
            parent: &parent,
            "migration",
            mode = attributes.mode.as_tag(),
            migration = attributes.name,
            position = attributes.position,
            otel.status_code = Empty,
            otel.status_message = Empty,
        );
        Box::new(TracingSpan { span })
    }
}

struct TracingSpan {
    span: tracing::Span,
}

impl SpanHandle for TracingSpan {
    fn record_applied(&self, applied: usize) {
        self.span.record("applied", applied);
    }

    fn span_id(&self) -> Option<u64> {
        self.span.id().map(|id| id.into_u64())
    }

    fn tracing_span(&self) -> tracing::Span {
        self.span.clone()
    }

    fn finish(self: Box<Self>, status: SpanStatus) {
        self.span.record("otel.status_code", status.code());
        if let Some(message) = status.message() {
            self.span.record("otel.status_message", message);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn test_closure_logger() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&lines);
        let logger = move |msg: &str| sink.lock().unwrap().push(msg.to_string());

        logger.log("applying migration named 'm0'...");
        assert_eq!(
            lines.lock().unwrap().as_slice(),
            ["applying migration named 'm0'...".to_string()]
        );
    }

    #[test]
    fn test_span_status() {
        assert!(!SpanStatus::ok().is_error());
        let status = SpanStatus::error(&"boom");
        assert!(status.is_error());
        assert_eq!(status.code(), "ERROR");
        assert_eq!(status.message(), Some("boom"));
    }

    #[test]
    fn test_tracing_tracer_without_subscriber() {
        let tracer = TracingTracer;
        let run = tracer.start_run();
        run.record_applied(2);
        let child = tracer.start_migration(
            run.as_ref(),
            MigrationSpanAttributes {
                mode: MigrationMode::Direct,
                name: "m2",
                position: 2,
            },
        );
        child.finish(SpanStatus::ok());
        run.finish(SpanStatus::Ok(Some("migrations applied successfully".into())));
    }
}
