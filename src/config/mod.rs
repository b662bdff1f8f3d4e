//! Process configuration.
//!
//! Each option in [`options::SCHEMA`] is read from `PISTON_<NAME>`. Absent
//! variables take the declared default; present ones go through the option's
//! parser. Both are then checked by the option's validators, and the first
//! failure aborts loading. The resulting [`Config`] has no mutation API and is
//! shared behind an `Arc` for the lifetime of the process.

pub mod options;
pub mod overrides;

use std::path::{Path, PathBuf};
use thiserror::Error;

pub use options::{LogLevel, OptionDescriptor, OptionSpec, OptionValue, ENV_PREFIX, SCHEMA};
pub use overrides::{LimitKey, LimitOverrides, OverrideError};

/// A configuration option failed to parse or validate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Config option {option} failed validation: {reason}")]
pub struct ConfigError {
    pub option: &'static str,
    pub reason: String,
}

/// Resolved, immutable process configuration.
#[derive(Debug)]
pub struct Config {
    log_level: LogLevel,
    authentication: String,
    bind_address: String,
    data_directory: PathBuf,
    runner_uid_min: i64,
    runner_uid_max: i64,
    runner_gid_min: i64,
    runner_gid_max: i64,
    disable_networking: bool,
    output_max_size: i64,
    max_process_count: i64,
    max_open_files: i64,
    max_file_size: i64,
    compile_timeout: i64,
    run_timeout: i64,
    compile_memory_limit: i64,
    run_memory_limit: i64,
    repo_url: String,
    max_concurrent_jobs: i64,
    limit_overrides: LimitOverrides,
}

fn resolve<T, F>(spec: &OptionSpec<T>, lookup: &F) -> Result<T, ConfigError>
where
    T: OptionValue,
    F: Fn(&str) -> Option<String>,
{
    let fail = |reason: String| ConfigError {
        option: spec.name,
        reason,
    };

    let (value, raw) = match lookup(spec.env_key().as_str()) {
        None => {
            let value = spec.default_value();
            let raw = value.render();
            (value, raw)
        }
        Some(raw) => (spec.parse(&raw).map_err(fail)?, raw),
    };

    spec.validate(&value, &raw).map_err(fail)?;
    Ok(value)
}

impl Config {
    /// Resolve every option through `lookup`, which maps an env key to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            log_level: resolve(&options::LOG_LEVEL, &lookup)?,
            authentication: resolve(&options::AUTHENTICATION, &lookup)?,
            bind_address: resolve(&options::BIND_ADDRESS, &lookup)?,
            data_directory: resolve(&options::DATA_DIRECTORY, &lookup)?,
            runner_uid_min: resolve(&options::RUNNER_UID_MIN, &lookup)?,
            runner_uid_max: resolve(&options::RUNNER_UID_MAX, &lookup)?,
            runner_gid_min: resolve(&options::RUNNER_GID_MIN, &lookup)?,
            runner_gid_max: resolve(&options::RUNNER_GID_MAX, &lookup)?,
            disable_networking: resolve(&options::DISABLE_NETWORKING, &lookup)?,
            output_max_size: resolve(&options::OUTPUT_MAX_SIZE, &lookup)?,
            max_process_count: resolve(&options::MAX_PROCESS_COUNT, &lookup)?,
            max_open_files: resolve(&options::MAX_OPEN_FILES, &lookup)?,
            max_file_size: resolve(&options::MAX_FILE_SIZE, &lookup)?,
            compile_timeout: resolve(&options::COMPILE_TIMEOUT, &lookup)?,
            run_timeout: resolve(&options::RUN_TIMEOUT, &lookup)?,
            compile_memory_limit: resolve(&options::COMPILE_MEMORY_LIMIT, &lookup)?,
            run_memory_limit: resolve(&options::RUN_MEMORY_LIMIT, &lookup)?,
            repo_url: resolve(&options::REPO_URL, &lookup)?,
            max_concurrent_jobs: resolve(&options::MAX_CONCURRENT_JOBS, &lookup)?,
            limit_overrides: resolve(&options::LIMIT_OVERRIDES, &lookup)?,
        })
    }

    /// Resolve from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve from the process environment, exiting with status 1 on failure.
    pub fn from_env_or_exit() -> Self {
        tracing::info!("loading configuration from environment");

        match Self::from_env() {
            Ok(config) => {
                tracing::info!("configuration successfully loaded");
                for (name, value) in config.entries() {
                    tracing::debug!(option = name, value = %value, "config_option");
                }
                config
            }
            Err(err) => {
                tracing::error!(option = err.option, reason = %err.reason, "config option failed validation");
                std::process::exit(1);
            }
        }
    }

    pub fn log_level(&self) -> LogLevel {
        self.log_level
    }

    pub fn authentication(&self) -> &str {
        &self.authentication
    }

    pub fn bind_address(&self) -> &str {
        &self.bind_address
    }

    pub fn data_directory(&self) -> &Path {
        &self.data_directory
    }

    pub fn runner_uid_range(&self) -> (i64, i64) {
        (self.runner_uid_min, self.runner_uid_max)
    }

    pub fn runner_gid_range(&self) -> (i64, i64) {
        (self.runner_gid_min, self.runner_gid_max)
    }

    pub fn disable_networking(&self) -> bool {
        self.disable_networking
    }

    pub fn repo_url(&self) -> &str {
        &self.repo_url
    }

    pub fn max_concurrent_jobs(&self) -> i64 {
        self.max_concurrent_jobs
    }

    pub fn limit_overrides(&self) -> &LimitOverrides {
        &self.limit_overrides
    }

    /// Global value of an overridable limit.
    pub fn global_limit(&self, key: LimitKey) -> i64 {
        match key {
            LimitKey::MaxProcessCount => self.max_process_count,
            LimitKey::MaxOpenFiles => self.max_open_files,
            LimitKey::MaxFileSize => self.max_file_size,
            LimitKey::CompileMemoryLimit => self.compile_memory_limit,
            LimitKey::RunMemoryLimit => self.run_memory_limit,
            LimitKey::CompileTimeout => self.compile_timeout,
            LimitKey::RunTimeout => self.run_timeout,
            LimitKey::OutputMaxSize => self.output_max_size,
        }
    }

    /// Limit for a language: configured override, then the package's own
    /// value, then the global option.
    pub fn effective_limit(&self, language: &str, key: LimitKey, package_value: Option<i64>) -> i64 {
        self.limit_overrides
            .get(language, key)
            .or(package_value)
            .unwrap_or_else(|| self.global_limit(key))
    }

    /// `(option, rendered value)` pairs with the authentication token redacted.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        let mut entries = vec![
            (options::LOG_LEVEL.name, self.log_level.render()),
            (options::AUTHENTICATION.name, "<redacted>".to_string()),
            (options::BIND_ADDRESS.name, self.bind_address.clone()),
            (options::DATA_DIRECTORY.name, self.data_directory.render()),
            (options::RUNNER_UID_MIN.name, self.runner_uid_min.render()),
            (options::RUNNER_UID_MAX.name, self.runner_uid_max.render()),
            (options::RUNNER_GID_MIN.name, self.runner_gid_min.render()),
            (options::RUNNER_GID_MAX.name, self.runner_gid_max.render()),
            (options::DISABLE_NETWORKING.name, self.disable_networking.render()),
        ];
        entries.extend(
            LimitKey::ALL
                .into_iter()
                .map(|key| (key.as_str(), self.global_limit(key).render())),
        );
        entries.extend([
            (options::REPO_URL.name, self.repo_url.clone()),
            (options::MAX_CONCURRENT_JOBS.name, self.max_concurrent_jobs.render()),
            (options::LIMIT_OVERRIDES.name, self.limit_overrides.render()),
        ]);
        entries
    }
}
