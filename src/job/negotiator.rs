//! Job negotiation: reconcile a caller's request with the runtime's ceilings.
//!
//! Checks run in a fixed order and the first failure is the only one
//! reported. Negotiation reads the registry and writes nothing.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use super::{JobFile, JobRequest, JobSpecification};
use crate::runtime::{Runtime, RuntimeRegistry, Stage, StageLimits};
use crate::types::Error;

/// Runtimes of this language accept files in any encoding.
const RAW_FILE_LANGUAGE: &str = "file";

/// Resource family negotiated per stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitFamily {
    MemoryLimit,
    Timeout,
}

/// A negotiable limit: one family for one stage, e.g. `run_timeout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Constraint {
    pub stage: Stage,
    pub family: LimitFamily,
}

impl Constraint {
    pub const COMPILE_MEMORY_LIMIT: Constraint = Constraint::new(Stage::Compile, LimitFamily::MemoryLimit);
    pub const RUN_MEMORY_LIMIT: Constraint = Constraint::new(Stage::Run, LimitFamily::MemoryLimit);
    pub const COMPILE_TIMEOUT: Constraint = Constraint::new(Stage::Compile, LimitFamily::Timeout);
    pub const RUN_TIMEOUT: Constraint = Constraint::new(Stage::Run, LimitFamily::Timeout);

    /// Check order.
    pub const ALL: [Constraint; 4] = [
        Constraint::COMPILE_MEMORY_LIMIT,
        Constraint::RUN_MEMORY_LIMIT,
        Constraint::COMPILE_TIMEOUT,
        Constraint::RUN_TIMEOUT,
    ];

    pub const fn new(stage: Stage, family: LimitFamily) -> Self {
        Self { stage, family }
    }

    pub fn name(self) -> &'static str {
        match (self.stage, self.family) {
            (Stage::Compile, LimitFamily::MemoryLimit) => "compile_memory_limit",
            (Stage::Run, LimitFamily::MemoryLimit) => "run_memory_limit",
            (Stage::Compile, LimitFamily::Timeout) => "compile_timeout",
            (Stage::Run, LimitFamily::Timeout) => "run_timeout",
        }
    }

    /// Value the caller asked for. Zero counts as not asked.
    fn requested(self, request: &JobRequest) -> Option<i64> {
        let value = match (self.stage, self.family) {
            (Stage::Compile, LimitFamily::MemoryLimit) => request.compile_memory_limit,
            (Stage::Run, LimitFamily::MemoryLimit) => request.run_memory_limit,
            (Stage::Compile, LimitFamily::Timeout) => request.compile_timeout,
            (Stage::Run, LimitFamily::Timeout) => request.run_timeout,
        };
        value.filter(|v| *v != 0)
    }

    /// The runtime's configured value, which is both default and ceiling.
    fn configured(self, runtime: &Runtime) -> i64 {
        match self.family {
            LimitFamily::MemoryLimit => runtime.memory_limits.get(self.stage),
            LimitFamily::Timeout => runtime.timeouts.get(self.stage),
        }
    }

    fn check(self, request: &JobRequest, runtime: &Runtime) -> Result<(), NegotiationError> {
        let Some(requested) = self.requested(request) else {
            return Ok(());
        };

        let ceiling = self.configured(runtime);
        if ceiling > 0 && requested > ceiling {
            return Err(NegotiationError::ExceedsCeiling {
                constraint: self,
                ceiling,
            });
        }
        if requested < 0 {
            return Err(NegotiationError::Negative { constraint: self });
        }
        Ok(())
    }

    fn effective(self, request: &JobRequest, runtime: &Runtime) -> i64 {
        self.requested(request)
            .unwrap_or_else(|| self.configured(runtime))
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a request was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NegotiationError {
    #[error("language is required as a string")]
    MissingLanguage,

    #[error("version is required as a string")]
    MissingVersion,

    #[error("files is required as an array")]
    MissingFiles,

    #[error("files[{index}].content is required as a string")]
    MissingFileContent { index: usize },

    #[error("{language}-{version} runtime is unknown")]
    UnknownRuntime { language: String, version: String },

    #[error("files must include at least one utf8 encoded file")]
    NoUtf8File,

    #[error("{constraint} cannot exceed the configured limit of {ceiling}")]
    ExceedsCeiling { constraint: Constraint, ceiling: i64 },

    #[error("{constraint} must be non-negative")]
    Negative { constraint: Constraint },
}

impl From<NegotiationError> for Error {
    fn from(err: NegotiationError) -> Self {
        Error::validation(err.to_string())
    }
}

fn required(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// Turns [`JobRequest`]s into [`JobSpecification`]s.
#[derive(Clone)]
pub struct JobNegotiator {
    registry: Arc<dyn RuntimeRegistry>,
}

impl fmt::Debug for JobNegotiator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobNegotiator").finish_non_exhaustive()
    }
}

impl JobNegotiator {
    pub fn new(registry: Arc<dyn RuntimeRegistry>) -> Self {
        Self { registry }
    }

    pub async fn negotiate(
        &self,
        request: JobRequest,
    ) -> Result<JobSpecification, NegotiationError> {
        let language = required(&request.language).ok_or(NegotiationError::MissingLanguage)?;
        let version = required(&request.version).ok_or(NegotiationError::MissingVersion)?;
        let requested_files = request
            .files
            .as_ref()
            .ok_or(NegotiationError::MissingFiles)?;

        let files = requested_files
            .iter()
            .enumerate()
            .map(|(index, file)| -> Result<JobFile, NegotiationError> {
                let content = file
                    .content
                    .clone()
                    .ok_or(NegotiationError::MissingFileContent { index })?;
                Ok(JobFile {
                    name: file.name.clone(),
                    content,
                    encoding: file.encoding.clone(),
                })
            })
            .collect::<Result<Vec<_>, NegotiationError>>()?;

        let runtime = self
            .registry
            .resolve(language, version)
            .await
            .ok_or_else(|| NegotiationError::UnknownRuntime {
                language: language.to_string(),
                version: version.to_string(),
            })?;

        if runtime.language != RAW_FILE_LANGUAGE && !files.iter().any(JobFile::is_utf8) {
            return Err(NegotiationError::NoUtf8File);
        }

        for constraint in Constraint::ALL {
            constraint.check(&request, &runtime)?;
        }

        let timeouts = StageLimits {
            compile: Constraint::COMPILE_TIMEOUT.effective(&request, &runtime),
            run: Constraint::RUN_TIMEOUT.effective(&request, &runtime),
        };
        let memory_limits = StageLimits {
            compile: Constraint::COMPILE_MEMORY_LIMIT.effective(&request, &runtime),
            run: Constraint::RUN_MEMORY_LIMIT.effective(&request, &runtime),
        };

        Ok(JobSpecification {
            runtime,
            args: request.args.unwrap_or_default(),
            stdin: request.stdin.unwrap_or_default(),
            files,
            timeouts,
            memory_limits,
        })
    }
}
