// Instance Agent - Reconciliation Results
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Result types for one reconciliation request.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status code reported on success.
pub const STATUS_OK: u16 = 0;

/// Status code reported on any failure.
pub const STATUS_FAILED: u16 = 500;

/// Status of a single reconciliation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// Step completed successfully.
    Success,
    /// Step failed but the failure was tolerated.
    Warning,
    /// Step failed.
    Error,
    /// Step was skipped.
    Skipped,
}

impl StepStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success | Self::Warning)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Skipped => "skipped",
        }
    }
}

/// Record of one step (a render, a commit, an external command).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    /// What was done (`"render"`, `"/sbin/ifup eth0"`, ...).
    pub step: String,
    /// Outcome.
    pub status: StepStatus,
    /// Human-readable message.
    pub message: String,
    /// Timestamp when the step finished.
    pub finished_at: DateTime<Utc>,
}

impl StepRecord {
    pub fn new(step: impl Into<String>, status: StepStatus, message: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            status,
            message: message.into(),
            finished_at: Utc::now(),
        }
    }
}

/// Overall result of a reconciliation, reported back to the control plane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileResult {
    /// Request id, also attached to every log line of the request.
    pub request_id: Uuid,
    /// `0` on success, `500` on failure.
    pub status: u16,
    /// Empty on success, otherwise the failure description.
    pub message: String,
    /// Individual steps, in execution order.
    pub steps: Vec<StepRecord>,
    /// Files whose content was replaced.
    pub written: Vec<PathBuf>,
    /// Files renamed aside.
    pub retired: Vec<PathBuf>,
    /// Total duration in milliseconds.
    pub total_duration_ms: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl ReconcileResult {
    /// Create a new, still-running result.
    pub fn new(request_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            request_id,
            status: STATUS_OK,
            message: String::new(),
            steps: Vec::new(),
            written: Vec::new(),
            retired: Vec::new(),
            total_duration_ms: 0,
            started_at: now,
            completed_at: now,
        }
    }

    /// Record a step.
    pub fn record(&mut self, step: impl Into<String>, status: StepStatus, message: impl Into<String>) {
        self.steps.push(StepRecord::new(step, status, message));
    }

    /// Finish successfully.
    pub fn succeed(mut self) -> Self {
        self.status = STATUS_OK;
        self.message.clear();
        self.finish()
    }

    /// Finish with a failure message.
    pub fn fail(mut self, message: impl Into<String>) -> Self {
        self.status = STATUS_FAILED;
        self.message = message.into();
        self.finish()
    }

    fn finish(mut self) -> Self {
        self.completed_at = Utc::now();
        self.total_duration_ms = (self.completed_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64;
        self
    }

    /// The `(status_code, message)` pair for the transport.
    pub fn pair(&self) -> (u16, &str) {
        (self.status, &self.message)
    }

    pub fn is_success(&self) -> bool {
        self.status == STATUS_OK
    }

    /// Count failed steps.
    pub fn error_count(&self) -> usize {
        self.steps.iter().filter(|s| s.status.is_error()).count()
    }
}
