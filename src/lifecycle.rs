//! Per-job state machine.
//!
//! ```text
//! RECEIVED → NEGOTIATED → PRIMED → EXECUTED → CLEANED_UP
//!     ↓           ↓          ↓
//!  REJECTED   CLEANED_UP  CLEANED_UP
//! ```
//!
//! Once a job reaches `Primed` the only way out is through `CleanedUp`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{Error, JobId, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Received,
    /// Negotiation failed; the engine was never involved.
    Rejected,
    Negotiated,
    Primed,
    Executed,
    CleanedUp,
}

impl JobState {
    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Received => "received",
            JobState::Rejected => "rejected",
            JobState::Negotiated => "negotiated",
            JobState::Primed => "primed",
            JobState::Executed => "executed",
            JobState::CleanedUp => "cleaned_up",
        }
    }

    pub fn can_transition_to(self, to: JobState) -> bool {
        match (self, to) {
            (JobState::Received, JobState::Negotiated) => true,
            (JobState::Received, JobState::Rejected) => true,
            (JobState::Negotiated, JobState::Primed) => true,
            // Priming failed part way; release whatever it took.
            (JobState::Negotiated, JobState::CleanedUp) => true,
            (JobState::Primed, JobState::Executed) => true,
            (JobState::Primed, JobState::CleanedUp) => true,
            (JobState::Executed, JobState::CleanedUp) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks one job through [`JobState`], logging every transition.
#[derive(Debug, Clone)]
pub struct JobLifecycle {
    job_id: JobId,
    state: JobState,
}

impl JobLifecycle {
    pub fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            state: JobState::Received,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn transition(&mut self, to: JobState) -> Result<()> {
        if !self.state.can_transition_to(to) {
            return Err(Error::internal(format!(
                "job {} cannot move from {} to {}",
                self.job_id, self.state, to
            )));
        }

        tracing::debug!(
            job_id = %self.job_id,
            from = %self.state,
            to = %to,
            "job_state_transition"
        );
        self.state = to;
        Ok(())
    }
}
