//! ExecuteCodeService - job execution, runtime listing and package management.

use tonic::{Request, Response, Status};

use crate::job::JobRequest;
use crate::orchestrator::JobOrchestrator;

// Import generated proto types
use crate::proto::execute_code_service_server::ExecuteCodeService as ExecuteCodeServiceTrait;
use crate::proto::{
    ExecuteRequest, ExecuteResponse, ListPackagesRequest, ListPackagesResponse,
    ListRuntimesRequest, ListRuntimesResponse, PackageInfo, PackageRequest, PackageResponse,
    RuntimeInfo,
};

/// ExecuteCodeService implementation wrapping the [`JobOrchestrator`].
#[derive(Debug, Clone)]
pub struct ExecuteCodeService {
    orchestrator: JobOrchestrator,
}

impl ExecuteCodeService {
    pub fn new(orchestrator: JobOrchestrator) -> Self {
        Self { orchestrator }
    }
}

#[tonic::async_trait]
impl ExecuteCodeServiceTrait for ExecuteCodeService {
    async fn execute(
        &self,
        request: Request<ExecuteRequest>,
    ) -> Result<Response<ExecuteResponse>, Status> {
        let job = JobRequest::from(request.into_inner());
        let response = self.orchestrator.execute(job).await?;
        Ok(Response::new(response.into()))
    }

    async fn list_runtimes(
        &self,
        _request: Request<ListRuntimesRequest>,
    ) -> Result<Response<ListRuntimesResponse>, Status> {
        let runtimes = self
            .orchestrator
            .list_runtimes()
            .await
            .iter()
            .map(|runtime| RuntimeInfo::from(&**runtime))
            .collect();
        Ok(Response::new(ListRuntimesResponse { runtimes }))
    }

    async fn list_packages(
        &self,
        _request: Request<ListPackagesRequest>,
    ) -> Result<Response<ListPackagesResponse>, Status> {
        let packages = self
            .orchestrator
            .list_packages()
            .await?
            .into_iter()
            .map(PackageInfo::from)
            .collect();
        Ok(Response::new(ListPackagesResponse { packages }))
    }

    async fn install_package(
        &self,
        request: Request<PackageRequest>,
    ) -> Result<Response<PackageResponse>, Status> {
        let req = request.into_inner();
        let action = self.orchestrator.install(&req.language, &req.version).await?;
        Ok(Response::new(action.into()))
    }

    async fn uninstall_package(
        &self,
        request: Request<PackageRequest>,
    ) -> Result<Response<PackageResponse>, Status> {
        let req = request.into_inner();
        let action = self
            .orchestrator
            .uninstall(&req.language, &req.version)
            .await?;
        Ok(Response::new(action.into()))
    }
}
