//! Proto ↔ Domain conversions.
//!
//! Inbound messages become loosely-typed domain requests that the negotiator
//! validates; outbound conversions are infallible.

use crate::engine::{JobResponse, StageResult};
use crate::job::{JobFileRequest, JobRequest};
use crate::packages::{PackageAction, PackageListing};
use crate::proto;
use crate::runtime::Runtime;

// =============================================================================
// Inbound
// =============================================================================

impl From<proto::File> for JobFileRequest {
    fn from(file: proto::File) -> Self {
        Self {
            name: file.name,
            content: file.content,
            encoding: file.encoding,
        }
    }
}

/// proto3 strings are never absent; an empty one is passed through and
/// rejected by the negotiator as missing.
impl From<proto::ExecuteRequest> for JobRequest {
    fn from(req: proto::ExecuteRequest) -> Self {
        Self {
            language: Some(req.language),
            version: Some(req.version),
            args: Some(req.args),
            stdin: Some(req.stdin),
            files: Some(req.files.into_iter().map(JobFileRequest::from).collect()),
            compile_timeout: req.compile_timeout,
            run_timeout: req.run_timeout,
            compile_memory_limit: req.compile_memory_limit,
            run_memory_limit: req.run_memory_limit,
        }
    }
}

// =============================================================================
// Outbound
// =============================================================================

impl From<StageResult> for proto::StageResult {
    fn from(stage: StageResult) -> Self {
        Self {
            stdout: stage.stdout,
            stderr: stage.stderr,
            output: stage.output,
            code: stage.code,
            signal: stage.signal,
        }
    }
}

impl From<JobResponse> for proto::ExecuteResponse {
    fn from(response: JobResponse) -> Self {
        Self {
            compile: response.compile.map(proto::StageResult::from),
            run: Some(response.run.into()),
        }
    }
}

impl From<&Runtime> for proto::RuntimeInfo {
    fn from(runtime: &Runtime) -> Self {
        Self {
            language: runtime.language.clone(),
            version: runtime.version.clone(),
            aliases: runtime.aliases.clone(),
            engine: runtime.engine.clone(),
        }
    }
}

impl From<PackageListing> for proto::PackageInfo {
    fn from(listing: PackageListing) -> Self {
        Self {
            language: listing.language,
            language_version: listing.version,
            installed: listing.installed,
        }
    }
}

impl From<PackageAction> for proto::PackageResponse {
    fn from(action: PackageAction) -> Self {
        Self {
            language: action.language,
            version: action.version,
        }
    }
}
