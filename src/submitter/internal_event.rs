use std::time::Duration;

use http::StatusCode;
use metrics::{counter, gauge, histogram};
use tracing;

/// Per-request lifecycle, as reported in logs.
///
/// Only `Admitted -> InFlight` consumes quota.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmissionState {
    Queued,
    Admitted,
    InFlight,
    Completed,
    Failed,
    Cancelled,
}

impl SubmissionState {
    pub const fn as_str(self) -> &'static str {
        match self {
            SubmissionState::Queued => "queued",
            SubmissionState::Admitted => "admitted",
            SubmissionState::InFlight => "in_flight",
            SubmissionState::Completed => "completed",
            SubmissionState::Failed => "failed",
            SubmissionState::Cancelled => "cancelled",
        }
    }
}

pub(crate) struct SubmissionQueued {
    pub id: u64,
}

impl SubmissionQueued {
    pub(crate) fn emit(self) {
        tracing::debug!(
            target: "crpt_api::submitter",
            submission = self.id,
            state = SubmissionState::Queued.as_str(),
            "Submission queued"
        );
    }
}

pub(crate) struct SubmissionAdmitted {
    pub id: u64,
    pub waited: Duration,
}

impl SubmissionAdmitted {
    pub(crate) fn emit(self) {
        // Histogram, as each admission wait is its own sample.
        histogram!("crpt_api_admission_wait_seconds").record(self.waited);
        gauge!("crpt_api_in_flight").increment(1.0);
        tracing::debug!(
            target: "crpt_api::submitter",
            submission = self.id,
            state = SubmissionState::Admitted.as_str(),
            waited_ms = self.waited.as_millis(),
            "Submission admitted"
        );
    }
}

pub(crate) struct SubmissionFinished {
    pub id: u64,
    pub state: SubmissionState,
    pub error: Option<String>,
}

impl SubmissionFinished {
    pub(crate) fn emit(self) {
        counter!("crpt_api_submissions_total", "outcome" => self.state.as_str()).increment(1);
        match self.error {
            None => tracing::debug!(
                target: "crpt_api::submitter",
                submission = self.id,
                state = self.state.as_str(),
                "Submission finished"
            ),
            Some(error) => tracing::warn!(
                target: "crpt_api::submitter",
                submission = self.id,
                state = self.state.as_str(),
                %error,
                "Submission failed"
            ),
        }
    }
}

/// The spawned exchange is gone, whether it finished, panicked or was aborted.
pub(crate) struct SubmissionReleased {
    pub id: u64,
}

impl SubmissionReleased {
    pub(crate) fn emit(self) {
        gauge!("crpt_api_in_flight").decrement(1.0);
        tracing::trace!(
            target: "crpt_api::submitter",
            submission = self.id,
            "Worker released"
        );
    }
}

/// Why a submission left before it was dispatched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum AbandonReason {
    Cancelled,
    TimedOut,
    ShutDown,
}

impl AbandonReason {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            AbandonReason::Cancelled => "cancelled",
            AbandonReason::TimedOut => "timeout",
            AbandonReason::ShutDown => "shut_down",
        }
    }
}

/// A submission ended before it was dispatched; no quota was used.
pub(crate) struct SubmissionAbandoned {
    pub id: u64,
    pub reason: AbandonReason,
}

impl SubmissionAbandoned {
    pub(crate) fn emit(self) {
        counter!("crpt_api_submissions_total", "outcome" => self.reason.as_str()).increment(1);
        tracing::debug!(
            target: "crpt_api::submitter",
            submission = self.id,
            state = SubmissionState::Cancelled.as_str(),
            reason = self.reason.as_str(),
            "Submission abandoned before dispatch"
        );
    }
}

pub(crate) struct GatewayResponded<'a> {
    pub path: &'a str,
    pub status: StatusCode,
    pub body_len: usize,
    pub elapsed: Duration,
}

impl GatewayResponded<'_> {
    pub(crate) fn emit(self) {
        histogram!("crpt_api_gateway_latency_seconds").record(self.elapsed);
        tracing::debug!(
            target: "crpt_api::gateway",
            method = "POST",
            path = self.path,
            status = self.status.as_u16(),
            body_len = self.body_len,
            elapsed_ms = self.elapsed.as_millis(),
            "Response received"
        );
    }
}

pub(crate) struct ShutdownStarted {
    pub in_flight: usize,
    pub drain: Duration,
}

impl ShutdownStarted {
    pub(crate) fn emit(self) {
        tracing::info!(
            target: "crpt_api::submitter",
            in_flight = self.in_flight,
            drain_ms = self.drain.as_millis(),
            "Shutting down submitter"
        );
    }
}
