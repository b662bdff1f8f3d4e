//! Job orchestration.
//!
//! Drives a job through negotiation and the engine's prime/execute/cleanup
//! steps, and fronts the runtime registry and package index.
//!
//! Once priming has started, `cleanup` is called exactly once on every path.
//! Outcome when things go wrong:
//!
//! | execution | cleanup | reported                        |
//! |-----------|---------|---------------------------------|
//! | ok        | ok      | result                          |
//! | ok        | failed  | result (cleanup failure logged) |
//! | failed    | ok      | execution error                 |
//! | failed    | failed  | cleanup error                   |

use std::fmt;
use std::sync::Arc;
use tracing::Instrument;

use crate::engine::{Engine, JobResponse};
use crate::job::{Job, JobNegotiator, JobRequest};
use crate::lifecycle::{JobLifecycle, JobState};
use crate::packages::{Package, PackageAction, PackageIndex, PackageListing};
use crate::runtime::{Runtime, RuntimeRegistry};
use crate::types::{Error, JobId, Result};

/// Failures from package collaborators reach the client with their message intact.
fn collaborator_failure(err: Error) -> Error {
    match err {
        Error::NotFound(_) | Error::Validation(_) | Error::Internal(_) => err,
        other => Error::internal(other.to_string()),
    }
}

#[derive(Clone)]
pub struct JobOrchestrator {
    negotiator: JobNegotiator,
    registry: Arc<dyn RuntimeRegistry>,
    engine: Arc<dyn Engine>,
    packages: Arc<dyn PackageIndex>,
}

impl fmt::Debug for JobOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobOrchestrator")
            .field("negotiator", &self.negotiator)
            .finish_non_exhaustive()
    }
}

impl JobOrchestrator {
    pub fn new(
        registry: Arc<dyn RuntimeRegistry>,
        engine: Arc<dyn Engine>,
        packages: Arc<dyn PackageIndex>,
    ) -> Self {
        Self {
            negotiator: JobNegotiator::new(registry.clone()),
            registry,
            engine,
            packages,
        }
    }

    /// Negotiate, prime, execute and clean up a single job.
    pub async fn execute(&self, request: JobRequest) -> Result<JobResponse> {
        let job_id = JobId::new();
        let mut lifecycle = JobLifecycle::new(job_id.clone());

        let spec = match self.negotiator.negotiate(request).await {
            Ok(spec) => spec,
            Err(err) => {
                tracing::debug!(job_id = %job_id, reason = %err, "job_rejected");
                lifecycle.transition(JobState::Rejected)?;
                return Err(err.into());
            }
        };
        lifecycle.transition(JobState::Negotiated)?;

        let job = Job { id: job_id, spec };
        tracing::info!(
            job_id = %job.id,
            language = %job.spec.runtime.language,
            version = %job.spec.runtime.version,
            "job_accepted"
        );

        // The engine steps run on their own task so a dropped request cannot
        // skip cleanup once priming has started.
        let engine = self.engine.clone();
        let task = tokio::spawn(
            async move { Self::run_primed(engine.as_ref(), job, lifecycle).await }
                .in_current_span(),
        );
        task.await.map_err(|err| {
            tracing::error!(error = %err, "job_task_failed");
            Error::internal(format!("job task failed: {}", err))
        })?
    }

    /// Prime and execute, then clean up exactly once whatever happened.
    async fn run_primed(
        engine: &dyn Engine,
        job: Job,
        mut lifecycle: JobLifecycle,
    ) -> Result<JobResponse> {
        let outcome = Self::prime_and_execute(engine, &job, &mut lifecycle).await;
        let cleanup = engine.cleanup(&job).await;
        lifecycle.transition(JobState::CleanedUp)?;

        match (outcome, cleanup) {
            (Ok(response), Ok(())) => {
                tracing::info!(job_id = %job.id, state = %lifecycle.state(), "job_completed");
                Ok(response)
            }
            (Ok(response), Err(err)) => {
                tracing::error!(job_id = %job.id, error = %err, "job_cleanup_failed");
                Ok(response)
            }
            (Err(err), Ok(())) => Err(err),
            (Err(_), Err(err)) => {
                tracing::error!(job_id = %job.id, error = %err, "job_cleanup_failed");
                Err(Error::cleanup(err.to_string()))
            }
        }
    }

    async fn prime_and_execute(
        engine: &dyn Engine,
        job: &Job,
        lifecycle: &mut JobLifecycle,
    ) -> Result<JobResponse> {
        let failed = |stage: &'static str| {
            let job_id = job.id.clone();
            move |err: Error| {
                tracing::error!(job_id = %job_id, stage, error = %err, "job_execution_failed");
                match err {
                    Error::Execution(_) => err,
                    other => Error::execution(other.to_string()),
                }
            }
        };

        engine.prime(job).await.map_err(failed("prime"))?;
        lifecycle.transition(JobState::Primed)?;

        let result = engine.execute(job).await.map_err(failed("execute"))?;
        lifecycle.transition(JobState::Executed)?;

        result.into_response().map_err(failed("execute"))
    }

    pub async fn list_runtimes(&self) -> Vec<Arc<Runtime>> {
        self.registry.list().await
    }

    pub async fn list_packages(&self) -> Result<Vec<PackageListing>> {
        self.packages.list().await.map_err(|err| {
            tracing::error!(error = %err, "package_list_failed");
            collaborator_failure(err)
        })
    }

    pub async fn install(&self, language: &str, version: &str) -> Result<PackageAction> {
        tracing::info!(language, version, "package_install_requested");
        let package = self.find_package(language, version).await?;

        let action = package.install().await.map_err(|err| {
            tracing::error!(language, version, error = %err, "package_install_failed");
            collaborator_failure(err)
        })?;
        tracing::info!(language, version, "package_installed");
        Ok(action)
    }

    pub async fn uninstall(&self, language: &str, version: &str) -> Result<PackageAction> {
        tracing::info!(language, version, "package_uninstall_requested");
        let package = self.find_package(language, version).await?;

        let action = package.uninstall().await.map_err(|err| {
            tracing::error!(language, version, error = %err, "package_uninstall_failed");
            collaborator_failure(err)
        })?;
        tracing::info!(language, version, "package_uninstalled");
        Ok(action)
    }

    async fn find_package(
        &self,
        language: &str,
        version: &str,
    ) -> Result<Arc<dyn Package>> {
        self.packages
            .find(language, version)
            .await
            .map_err(collaborator_failure)?
            .ok_or_else(|| {
                Error::not_found(format!(
                    "Requested package {}-{} does not exist",
                    language, version
                ))
            })
    }
}
