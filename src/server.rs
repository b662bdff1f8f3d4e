//! gRPC server wiring.

use std::future::Future;
use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tokio_stream::wrappers::TcpListenerStream;
use tonic::service::interceptor::InterceptedService;
use tonic::transport::Server;

use crate::auth::Authenticator;
use crate::config::Config;
use crate::grpc::ExecuteCodeService;
use crate::orchestrator::JobOrchestrator;
use crate::proto::execute_code_service_server::ExecuteCodeServiceServer;
use crate::types::Result;

pub type AuthenticatedService =
    InterceptedService<ExecuteCodeServiceServer<ExecuteCodeService>, Authenticator>;

/// The execute service behind the bearer-token check.
pub fn build_service(config: &Config, orchestrator: JobOrchestrator) -> AuthenticatedService {
    ExecuteCodeServiceServer::with_interceptor(
        ExecuteCodeService::new(orchestrator),
        Authenticator::new(config.authentication()),
    )
}

/// Bind `bind_address` and serve until SIGTERM or SIGINT.
pub async fn serve(config: &Config, orchestrator: JobOrchestrator) -> Result<()> {
    let listener = TcpListener::bind(config.bind_address()).await?;
    serve_with_listener(config, orchestrator, listener, shutdown_signal()).await
}

/// Serve on an already-bound listener until `shutdown` resolves.
pub async fn serve_with_listener<F>(
    config: &Config,
    orchestrator: JobOrchestrator,
    listener: TcpListener,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send,
{
    let address = listener.local_addr()?;
    tracing::info!(%address, "api_listening");

    Server::builder()
        .add_service(build_service(config, orchestrator))
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
        .await?;

    tracing::info!("api_stopped");
    Ok(())
}

async fn shutdown_signal() {
    let (mut sigterm, mut sigint) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
        (Err(err), _) | (_, Err(err)) => {
            tracing::error!(error = %err, "signal_handler_failed");
            std::future::pending::<()>().await;
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => tracing::info!("received SIGTERM"),
        _ = sigint.recv() => tracing::info!("received SIGINT"),
    }
}
