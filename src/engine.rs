//! Execution engine collaborator.
//!
//! The engine owns sandboxing, process supervision and I/O capture, and
//! enforces the limits carried by the job. The gateway drives it through
//! three steps: `prime` acquires resources, `execute` runs the job, and
//! `cleanup` releases whatever `prime` acquired.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::job::Job;
use crate::types::{Error, Result};

/// Outcome of one stage.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StageResult {
    pub stdout: String,
    pub stderr: String,
    /// Interleaved stdout and stderr.
    pub output: String,
    pub code: Option<i32>,
    pub signal: Option<String>,
}

/// What the engine produced. A failed compile leaves `run` empty.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub compile: Option<StageResult>,
    pub run: Option<StageResult>,
}

/// Client-facing result, always carrying a run stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResponse {
    pub compile: Option<StageResult>,
    pub run: StageResult,
}

impl ExecutionResult {
    /// Fill a missing run stage with a copy of the compile stage.
    pub fn into_response(self) -> Result<JobResponse> {
        match (self.compile, self.run) {
            (compile, Some(run)) => Ok(JobResponse { compile, run }),
            (Some(compile), None) => Ok(JobResponse {
                run: compile.clone(),
                compile: Some(compile),
            }),
            (None, None) => Err(Error::execution("engine returned no stage results")),
        }
    }
}

/// Sandboxed execution backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Engine: Send + Sync {
    async fn prime(&self, job: &Job) -> Result<()>;

    async fn execute(&self, job: &Job) -> Result<ExecutionResult>;

    async fn cleanup(&self, job: &Job) -> Result<()>;
}
