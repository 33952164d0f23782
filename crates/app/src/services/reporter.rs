//! Structured error channel with a single reporter task.
//!
//! Every component holds a cheap [`ErrorSink`] handle and reports failures
//! at the smallest meaningful boundary (per room, per device, per phase).
//! One [`ErrorReporter`] task consumes the channel, logs each report, drops
//! repeats of the same phase and severity, and mirrors a "last error /
//! phase" flag outward so dashboards can show a stale/error indicator.
//! Being the only writer, it needs no locking.

use std::collections::HashSet;

use tokio::sync::mpsc;

use calor_domain::error::{ErrorReport, Phase, Severity};
use calor_domain::time::now;

use crate::ports::{ErrorFlag, RemoteSync};

/// Cloneable handle for submitting error reports.
#[derive(Debug, Clone)]
pub struct ErrorSink {
    tx: mpsc::UnboundedSender<ErrorReport>,
}

impl ErrorSink {
    /// Submit a report. Never blocks; reports sent after the reporter shut
    /// down are dropped.
    pub fn report(&self, phase: Phase, severity: Severity, message: impl Into<String>) {
        let _ = self.tx.send(ErrorReport {
            phase,
            severity,
            message: message.into(),
            at: now(),
        });
    }

    /// A sink whose reports go nowhere, for tests and tools.
    #[must_use]
    pub fn disconnected() -> Self {
        let (tx, _rx) = mpsc::unbounded_channel();
        Self { tx }
    }
}

/// The single consumer of the error channel.
pub struct ErrorReporter<R> {
    rx: mpsc::UnboundedReceiver<ErrorReport>,
    remote: R,
    seen: HashSet<(Phase, Severity)>,
}

impl<R: RemoteSync> ErrorReporter<R> {
    /// Create a connected sink/reporter pair.
    #[must_use]
    pub fn channel(remote: R) -> (ErrorSink, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            ErrorSink { tx },
            Self {
                rx,
                remote,
                seen: HashSet::new(),
            },
        )
    }

    /// Consume reports until every sink is dropped.
    pub async fn run(mut self) {
        while let Some(report) = self.rx.recv().await {
            self.handle(report).await;
        }
    }

    async fn handle(&mut self, report: ErrorReport) {
        match report.severity {
            Severity::High => {
                tracing::error!(phase = %report.phase, message = %report.message, "control failure");
            }
            Severity::Moderate => {
                tracing::warn!(phase = %report.phase, message = %report.message, "degraded operation");
            }
            Severity::Low => {
                tracing::info!(phase = %report.phase, message = %report.message, "recoverable hiccup");
            }
        }

        // A repeat of the same phase and severity carries no new signal for
        // the remote flag; the log line above already happened.
        if !self.seen.insert((report.phase, report.severity)) {
            return;
        }

        let flag = ErrorFlag::raised(report.phase, report.at);
        if let Err(err) = self.remote.push_error(&flag).await {
            tracing::warn!(error = %err, "failed to mirror error flag to remote");
        }
    }
}
