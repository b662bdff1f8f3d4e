//! gRPC Integration Tests
//!
//! Boots the real service on an ephemeral port and drives it through the
//! generated client.

use async_trait::async_trait;
use piston_gateway::config::Config;
use piston_gateway::engine::{Engine, ExecutionResult, StageResult};
use piston_gateway::job::Job;
use piston_gateway::orchestrator::JobOrchestrator;
use piston_gateway::packages::{Package, PackageAction, PackageIndex, PackageListing};
use piston_gateway::proto::execute_code_service_client::ExecuteCodeServiceClient;
use piston_gateway::proto::{
    ExecuteRequest, File, ListPackagesRequest, ListRuntimesRequest, PackageRequest,
};
use piston_gateway::runtime::{InMemoryRuntimeRegistry, RuntimeManifest};
use piston_gateway::server;
use piston_gateway::{Error, Result};
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tonic::transport::Channel;
use tonic::{Code, Request};

// =============================================================================
// Test Helpers
// =============================================================================

const TOKEN: &str = "integration-token";

/// Echoes the first file back as stdout; compiled languages fail to compile
/// when the source contains `syntax error`.
#[derive(Debug, Default)]
struct EchoEngine {
    primed: AtomicUsize,
    cleaned: AtomicUsize,
}

#[async_trait]
impl Engine for EchoEngine {
    async fn prime(&self, _job: &Job) -> Result<()> {
        self.primed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn execute(&self, job: &Job) -> Result<ExecutionResult> {
        let source = job.spec.files[0].decode_content()?;
        let source = String::from_utf8_lossy(&source).into_owned();

        if job.spec.runtime.language == "rust" {
            let failed = source.contains("syntax error");
            let compile = StageResult {
                stderr: if failed { source.clone() } else { String::new() },
                output: if failed { source.clone() } else { String::new() },
                code: Some(if failed { 1 } else { 0 }),
                ..Default::default()
            };
            let run = (!failed).then(|| StageResult {
                stdout: source,
                code: Some(0),
                ..Default::default()
            });
            return Ok(ExecutionResult {
                compile: Some(compile),
                run,
            });
        }

        Ok(ExecutionResult {
            compile: None,
            run: Some(StageResult {
                stdout: source.clone(),
                output: source,
                code: Some(0),
                ..Default::default()
            }),
        })
    }

    async fn cleanup(&self, _job: &Job) -> Result<()> {
        self.cleaned.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug)]
struct StaticPackage {
    language: String,
    version: String,
}

#[async_trait]
impl Package for StaticPackage {
    fn language(&self) -> &str {
        &self.language
    }

    fn version(&self) -> &str {
        &self.version
    }

    async fn install(&self) -> Result<PackageAction> {
        Ok(PackageAction {
            language: self.language.clone(),
            version: self.version.clone(),
        })
    }

    async fn uninstall(&self) -> Result<PackageAction> {
        Err(Error::internal(format!(
            "{}-{} is not installed",
            self.language, self.version
        )))
    }
}

#[derive(Debug)]
struct StaticIndex;

#[async_trait]
impl PackageIndex for StaticIndex {
    async fn list(&self) -> Result<Vec<PackageListing>> {
        Ok(vec![PackageListing {
            language: "go".to_string(),
            version: "1.16.2".to_string(),
            installed: false,
        }])
    }

    async fn find(&self, language: &str, version: &str) -> Result<Option<Arc<dyn Package>>> {
        if language == "go" && version == "1.16.2" {
            return Ok(Some(Arc::new(StaticPackage {
                language: language.to_string(),
                version: version.to_string(),
            })));
        }
        Ok(None)
    }
}

struct TestServer {
    addr: SocketAddr,
    engine: Arc<EchoEngine>,
    shutdown: Option<oneshot::Sender<()>>,
    _data_dir: TempDir,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

fn manifest(language: &str, version: &str, aliases: &[&str]) -> RuntimeManifest {
    RuntimeManifest {
        language: language.to_string(),
        version: version.to_string(),
        aliases: aliases.iter().map(|a| a.to_string()).collect(),
        engine: None,
        limit_overrides: BTreeMap::new(),
    }
}

async fn start_server() -> TestServer {
    let data_dir = TempDir::new().unwrap();
    let data_path = data_dir.path().display().to_string();
    let config = Config::from_lookup(move |key: &str| match key {
        "PISTON_DATA_DIRECTORY" => Some(data_path.clone()),
        "PISTON_AUTHENTICATION" => Some(TOKEN.to_string()),
        "PISTON_LIMIT_OVERRIDES" => Some(r#"{"rust": {"compile_timeout": 20000}}"#.to_string()),
        _ => None,
    })
    .unwrap();

    let registry = Arc::new(InMemoryRuntimeRegistry::default());
    registry
        .register(manifest("python", "3.10.0", &["py"]), &config)
        .await;
    registry.register(manifest("rust", "1.68.2", &["rs"]), &config).await;
    registry.register(manifest("file", "0.0.1", &[]), &config).await;

    let engine = Arc::new(EchoEngine::default());
    let orchestrator = JobOrchestrator::new(registry, engine.clone(), Arc::new(StaticIndex));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        server::serve_with_listener(&config, orchestrator, listener, async {
            let _ = rx.await;
        })
        .await
        .unwrap();
    });

    TestServer {
        addr,
        engine,
        shutdown: Some(tx),
        _data_dir: data_dir,
    }
}

async fn channel(addr: SocketAddr) -> Channel {
    Channel::from_shared(format!("http://{}", addr))
        .unwrap()
        .connect()
        .await
        .unwrap()
}

fn authorized<T>(message: T) -> Request<T> {
    let mut request = Request::new(message);
    request.metadata_mut().insert(
        "authorization",
        format!("Bearer {}", TOKEN).parse().unwrap(),
    );
    request
}

fn python_request(source: &str) -> ExecuteRequest {
    ExecuteRequest {
        language: "py".to_string(),
        version: "3".to_string(),
        files: vec![File {
            name: Some("main.py".to_string()),
            content: Some(source.to_string()),
            encoding: None,
        }],
        ..Default::default()
    }
}

// =============================================================================
// Execute
// =============================================================================

#[tokio::test]
async fn test_execute_round_trip() {
    let server = start_server().await;
    let mut client = ExecuteCodeServiceClient::new(channel(server.addr).await);

    let response = client
        .execute(authorized(python_request("hello")))
        .await
        .unwrap()
        .into_inner();

    assert!(response.compile.is_none());
    assert_eq!(response.run.unwrap().stdout, "hello");
    assert_eq!(server.engine.primed.load(Ordering::SeqCst), 1);
    assert_eq!(server.engine.cleaned.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_compile_mirrors_into_run() {
    let server = start_server().await;
    let mut client = ExecuteCodeServiceClient::new(channel(server.addr).await);

    let mut request = python_request("syntax error");
    request.language = "rust".to_string();
    request.version = "*".to_string();

    let response = client.execute(authorized(request)).await.unwrap().into_inner();
    assert_eq!(response.compile, response.run);
    assert_eq!(response.run.unwrap().code, Some(1));
}

#[tokio::test]
async fn test_limit_above_ceiling_is_invalid_argument() {
    let server = start_server().await;
    let mut client = ExecuteCodeServiceClient::new(channel(server.addr).await);

    let mut request = python_request("hello");
    request.run_timeout = Some(3_001);

    let status = client.execute(authorized(request)).await.unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);
    assert_eq!(
        status.message(),
        "run_timeout cannot exceed the configured limit of 3000"
    );
    assert_eq!(server.engine.primed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_override_raises_ceiling_for_language() {
    let server = start_server().await;
    let mut client = ExecuteCodeServiceClient::new(channel(server.addr).await);

    let mut request = python_request("fn main() {}");
    request.language = "rs".to_string();
    request.version = "1".to_string();
    request.compile_timeout = Some(15_000);

    let response = client.execute(authorized(request)).await.unwrap().into_inner();
    assert_eq!(response.run.unwrap().stdout, "fn main() {}");
}

#[tokio::test]
async fn test_unknown_runtime_is_invalid_argument() {
    let server = start_server().await;
    let mut client = ExecuteCodeServiceClient::new(channel(server.addr).await);

    let mut request = python_request("x");
    request.language = "cobol".to_string();
    request.version = "85".to_string();

    let status = client.execute(authorized(request)).await.unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);
    assert_eq!(status.message(), "cobol-85 runtime is unknown");
}

#[tokio::test]
async fn test_base64_only_files_rejected_except_for_file_runtime() {
    let server = start_server().await;
    let mut client = ExecuteCodeServiceClient::new(channel(server.addr).await);

    let mut request = python_request("aGVsbG8=");
    request.files[0].encoding = Some("base64".to_string());
    let status = client.execute(authorized(request.clone())).await.unwrap_err();
    assert_eq!(
        status.message(),
        "files must include at least one utf8 encoded file"
    );

    request.language = "file".to_string();
    request.version = "*".to_string();
    let response = client.execute(authorized(request)).await.unwrap().into_inner();
    assert_eq!(response.run.unwrap().stdout, "hello");
}

// =============================================================================
// Authentication
// =============================================================================

#[tokio::test]
async fn test_requests_without_token_are_rejected() {
    let server = start_server().await;
    let mut client = ExecuteCodeServiceClient::new(channel(server.addr).await);

    let status = client
        .list_runtimes(Request::new(ListRuntimesRequest {}))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Unauthenticated);
    assert_eq!(status.message(), "Unauthorized");

    let mut request = Request::new(ListRuntimesRequest {});
    request
        .metadata_mut()
        .insert("authorization", "Token nope".parse().unwrap());
    let status = client.list_runtimes(request).await.unwrap_err();
    assert_eq!(
        status.message(),
        "Unauthorized Authentication header format is Bearer <token>"
    );
}

// =============================================================================
// Runtimes and packages
// =============================================================================

#[tokio::test]
async fn test_list_runtimes() {
    let server = start_server().await;
    let mut client = ExecuteCodeServiceClient::new(channel(server.addr).await);

    let mut runtimes = client
        .list_runtimes(authorized(ListRuntimesRequest {}))
        .await
        .unwrap()
        .into_inner()
        .runtimes;
    runtimes.sort_by(|a, b| a.language.cmp(&b.language));

    let languages: Vec<_> = runtimes.iter().map(|r| r.language.as_str()).collect();
    assert_eq!(languages, vec!["file", "python", "rust"]);
    assert_eq!(runtimes[1].aliases, vec!["py"]);
}

#[tokio::test]
async fn test_package_operations() {
    let server = start_server().await;
    let mut client = ExecuteCodeServiceClient::new(channel(server.addr).await);

    let packages = client
        .list_packages(authorized(ListPackagesRequest {}))
        .await
        .unwrap()
        .into_inner()
        .packages;
    assert_eq!(packages.len(), 1);
    assert_eq!(packages[0].language_version, "1.16.2");

    let installed = client
        .install_package(authorized(PackageRequest {
            language: "go".to_string(),
            version: "1.16.2".to_string(),
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(installed.language, "go");

    let status = client
        .install_package(authorized(PackageRequest {
            language: "go".to_string(),
            version: "0.0.0".to_string(),
        }))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::NotFound);
    assert_eq!(
        status.message(),
        "Requested package go-0.0.0 does not exist"
    );

    let status = client
        .uninstall_package(authorized(PackageRequest {
            language: "go".to_string(),
            version: "1.16.2".to_string(),
        }))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Internal);
    assert_eq!(status.message(), "go-1.16.2 is not installed");
}
