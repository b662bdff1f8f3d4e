//! Runtime descriptors and the registry that resolves them.
//!
//! A [`Runtime`] is an installed language/version with its configured
//! per-stage ceilings. Ceilings `<= 0` mean "no enforced ceiling".

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::{Config, LimitKey};

/// Execution stage of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Compile,
    Run,
}

impl Stage {
    pub const ALL: [Stage; 2] = [Stage::Compile, Stage::Run];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Compile => "compile",
            Stage::Run => "run",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One value per stage, e.g. timeouts or memory limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StageLimits {
    pub compile: i64,
    pub run: i64,
}

impl StageLimits {
    pub fn get(&self, stage: Stage) -> i64 {
        match stage {
            Stage::Compile => self.compile,
            Stage::Run => self.run,
        }
    }
}

/// An installed language runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Runtime {
    pub language: String,
    pub version: String,
    pub aliases: Vec<String>,
    /// Name of the underlying toolchain (e.g. `node` for `javascript`).
    pub engine: String,
    /// Milliseconds.
    pub timeouts: StageLimits,
    /// Bytes.
    pub memory_limits: StageLimits,
    pub max_process_count: i64,
    pub max_open_files: i64,
    pub max_file_size: i64,
    pub output_max_size: i64,
}

impl Runtime {
    /// Build a runtime from its package manifest, applying configured limits.
    pub fn from_manifest(manifest: RuntimeManifest, config: &Config) -> Self {
        let limit = |key: LimitKey| {
            config.effective_limit(
                &manifest.language,
                key,
                manifest.limit_overrides.get(&key).copied(),
            )
        };

        let timeouts = StageLimits {
            compile: limit(LimitKey::CompileTimeout),
            run: limit(LimitKey::RunTimeout),
        };
        let memory_limits = StageLimits {
            compile: limit(LimitKey::CompileMemoryLimit),
            run: limit(LimitKey::RunMemoryLimit),
        };
        let max_process_count = limit(LimitKey::MaxProcessCount);
        let max_open_files = limit(LimitKey::MaxOpenFiles);
        let max_file_size = limit(LimitKey::MaxFileSize);
        let output_max_size = limit(LimitKey::OutputMaxSize);

        Self {
            engine: manifest.engine.unwrap_or_else(|| manifest.language.clone()),
            language: manifest.language,
            version: manifest.version,
            aliases: manifest.aliases,
            timeouts,
            memory_limits,
            max_process_count,
            max_open_files,
            max_file_size,
            output_max_size,
        }
    }

    /// Whether `language` names this runtime directly or through an alias.
    pub fn answers_to(&self, language: &str) -> bool {
        self.language == language || self.aliases.iter().any(|a| a == language)
    }
}

/// Package-provided description of a runtime (`pkg-info.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeManifest {
    pub language: String,
    pub version: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default, alias = "provides", alias = "runtime")]
    pub engine: Option<String>,
    #[serde(default)]
    pub limit_overrides: BTreeMap<LimitKey, i64>,
}

/// Resolves language/version pairs to installed runtimes.
#[async_trait]
pub trait RuntimeRegistry: Send + Sync {
    /// Latest runtime matching `language` (or an alias) and `version`.
    async fn resolve(&self, language: &str, version: &str) -> Option<Arc<Runtime>>;

    /// Every installed runtime.
    async fn list(&self) -> Vec<Arc<Runtime>>;
}

/// `*` matches anything; otherwise an exact match or a dotted prefix
/// (`3` and `3.10` both match `3.10.0`).
pub fn version_matches(installed: &str, requested: &str) -> bool {
    if requested == "*" || installed == requested {
        return true;
    }
    installed
        .strip_prefix(requested)
        .is_some_and(|rest| rest.starts_with('.'))
}

/// Orders versions by their numeric dot-separated components.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    fn components(v: &str) -> Vec<u64> {
        v.split('.').map(|part| part.parse().unwrap_or(0)).collect()
    }
    components(a).cmp(&components(b))
}

/// Registry backed by an in-process list of runtimes.
#[derive(Debug, Default)]
pub struct InMemoryRuntimeRegistry {
    runtimes: RwLock<Vec<Arc<Runtime>>>,
}

impl InMemoryRuntimeRegistry {
    pub fn new(runtimes: Vec<Runtime>) -> Self {
        Self {
            runtimes: RwLock::new(runtimes.into_iter().map(Arc::new).collect()),
        }
    }

    /// Add a runtime from its manifest, replacing any with the same language and version.
    pub async fn register(&self, manifest: RuntimeManifest, config: &Config) -> Arc<Runtime> {
        let runtime = Arc::new(Runtime::from_manifest(manifest, config));
        let mut runtimes = self.runtimes.write().await;
        runtimes.retain(|r| !(r.language == runtime.language && r.version == runtime.version));
        runtimes.push(runtime.clone());

        tracing::debug!(
            language = %runtime.language,
            version = %runtime.version,
            "runtime_registered"
        );
        runtime
    }

    /// Remove a runtime. Returns whether one was removed.
    pub async fn unregister(&self, language: &str, version: &str) -> bool {
        let mut runtimes = self.runtimes.write().await;
        let before = runtimes.len();
        runtimes.retain(|r| !(r.language == language && r.version == version));
        before != runtimes.len()
    }
}

#[async_trait]
impl RuntimeRegistry for InMemoryRuntimeRegistry {
    async fn resolve(&self, language: &str, version: &str) -> Option<Arc<Runtime>> {
        let runtimes = self.runtimes.read().await;
        runtimes
            .iter()
            .filter(|r| r.answers_to(language) && version_matches(&r.version, version))
            .max_by(|a, b| compare_versions(&a.version, &b.version))
            .cloned()
    }

    async fn list(&self) -> Vec<Arc<Runtime>> {
        self.runtimes.read().await.clone()
    }
}
