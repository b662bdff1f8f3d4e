//! Job requests and negotiated job specifications.

pub mod negotiator;

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::runtime::{Runtime, StageLimits};
use crate::types::{Error, JobId, Result};

pub use negotiator::{Constraint, JobNegotiator, NegotiationError};

/// A file as supplied by the caller, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFileRequest {
    pub name: Option<String>,
    pub content: Option<String>,
    pub encoding: Option<String>,
}

/// Caller-supplied execution request, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    pub language: Option<String>,
    pub version: Option<String>,
    pub args: Option<Vec<String>>,
    pub stdin: Option<String>,
    pub files: Option<Vec<JobFileRequest>>,
    pub compile_timeout: Option<i64>,
    pub run_timeout: Option<i64>,
    pub compile_memory_limit: Option<i64>,
    pub run_memory_limit: Option<i64>,
}

/// A validated source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFile {
    pub name: Option<String>,
    pub content: String,
    pub encoding: Option<String>,
}

impl JobFile {
    /// Absent encoding means UTF-8.
    pub fn is_utf8(&self) -> bool {
        matches!(self.encoding.as_deref(), None | Some("utf8"))
    }

    /// Raw bytes of the file, decoded according to its encoding.
    pub fn decode_content(&self) -> Result<Vec<u8>> {
        match self.encoding.as_deref() {
            None | Some("utf8") => Ok(self.content.clone().into_bytes()),
            Some("base64") => base64::engine::general_purpose::STANDARD
                .decode(&self.content)
                .map_err(|e| Error::validation(format!("invalid base64 content: {}", e))),
            Some(other) => Err(Error::validation(format!(
                "unsupported file encoding: {}",
                other
            ))),
        }
    }
}

/// Fully negotiated description of a job, ready for the engine.
///
/// A limit the caller supplied is non-negative and never above the runtime's
/// ceiling where that ceiling is positive. A limit inherited from the runtime
/// may be `<= 0`, which means "no ceiling".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpecification {
    pub runtime: Arc<Runtime>,
    pub args: Vec<String>,
    pub stdin: String,
    pub files: Vec<JobFile>,
    pub timeouts: StageLimits,
    pub memory_limits: StageLimits,
}

/// A job as handed to the engine: a specification plus its identity.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub spec: JobSpecification,
}

impl Job {
    pub fn new(spec: JobSpecification) -> Self {
        Self {
            id: JobId::new(),
            spec,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(content: &str, encoding: Option<&str>) -> JobFile {
        JobFile {
            name: None,
            content: content.to_string(),
            encoding: encoding.map(str::to_string),
        }
    }

    #[test]
    fn test_utf8_detection() {
        assert!(file("x", None).is_utf8());
        assert!(file("x", Some("utf8")).is_utf8());
        assert!(!file("eA==", Some("base64")).is_utf8());
    }

    #[test]
    fn test_decode_content() {
        assert_eq!(file("print(1)", None).decode_content().unwrap(), b"print(1)");
        assert_eq!(
            file("aGVsbG8=", Some("base64")).decode_content().unwrap(),
            b"hello"
        );
        assert!(file("***", Some("base64")).decode_content().is_err());
        assert!(file("00ff", Some("hex")).decode_content().is_err());
    }
}
