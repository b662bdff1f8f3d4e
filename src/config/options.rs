//! Option schema.
//!
//! Every configuration option is a static [`OptionSpec`] record holding its
//! default, a parser for raw environment strings, and an ordered validator
//! chain. [`SCHEMA`] enumerates all of them for documentation and logging.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::overrides::LimitOverrides;

/// Prefix prepended to the upper-cased option name to form its env key.
pub const ENV_PREFIX: &str = "PISTON_";

/// Outcome of a single validator: `Ok(())` or the failure reason.
pub type Validation = std::result::Result<(), String>;

/// Converts a raw environment string into the option's typed value.
pub type Parser<T> = fn(&str) -> std::result::Result<T, String>;

/// Checks a typed value; the raw string is passed so messages can quote it.
pub type Validator<T> = fn(&T, &str) -> Validation;

/// Typed values that can be rendered back to text for validators and logs.
pub trait OptionValue {
    fn render(&self) -> String;
}

impl OptionValue for i64 {
    fn render(&self) -> String {
        self.to_string()
    }
}

impl OptionValue for bool {
    fn render(&self) -> String {
        self.to_string()
    }
}

impl OptionValue for String {
    fn render(&self) -> String {
        self.clone()
    }
}

impl OptionValue for PathBuf {
    fn render(&self) -> String {
        self.display().to_string()
    }
}

/// A single declared configuration option.
pub struct OptionSpec<T: 'static> {
    pub name: &'static str,
    pub description: &'static str,
    pub default: fn() -> T,
    pub parser: Parser<T>,
    pub validators: &'static [Validator<T>],
}

impl<T> OptionSpec<T> {
    /// Environment variable this option is read from.
    pub fn env_key(&self) -> String {
        format!("{}{}", ENV_PREFIX, self.name.to_uppercase())
    }

    pub fn default_value(&self) -> T {
        (self.default)()
    }

    pub fn parse(&self, raw: &str) -> std::result::Result<T, String> {
        (self.parser)(raw)
    }

    /// Run validators in declared order, stopping at the first failure.
    pub fn validate(&self, value: &T, raw: &str) -> Validation {
        for validator in self.validators {
            validator(value, raw)?;
        }
        Ok(())
    }
}

impl<T> fmt::Debug for OptionSpec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionSpec")
            .field("name", &self.name)
            .field("validators", &self.validators.len())
            .finish()
    }
}

/// Type-erased view of an option, used to enumerate the schema.
pub trait OptionDescriptor: Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn env_key(&self) -> String;
    fn rendered_default(&self) -> String;
}

impl<T: OptionValue> OptionDescriptor for OptionSpec<T> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn description(&self) -> &'static str {
        self.description
    }

    fn env_key(&self) -> String {
        OptionSpec::env_key(self)
    }

    fn rendered_default(&self) -> String {
        self.default_value().render()
    }
}

// =============================================================================
// Log level
// =============================================================================

/// Verbosity accepted by the `log_level` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    None,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::None => "NONE",
        }
    }

    /// `EnvFilter` directive for this level.
    pub fn directive(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::None => "off",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            "NONE" => Ok(LogLevel::None),
            other => Err(format!("Log level {} does not exist", other)),
        }
    }
}

impl OptionValue for LogLevel {
    fn render(&self) -> String {
        self.as_str().to_string()
    }
}

// =============================================================================
// Parsers
// =============================================================================

fn parse_string(raw: &str) -> Result<String, String> {
    Ok(raw.to_string())
}

fn parse_path(raw: &str) -> Result<PathBuf, String> {
    Ok(PathBuf::from(raw))
}

/// Integer parser shared by every numeric option and by limit overrides.
pub fn parse_int(raw: &str) -> Result<i64, String> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| format!("{} is not a number", raw))
}

fn parse_bool(raw: &str) -> Result<bool, String> {
    Ok(raw == "true")
}

fn parse_log_level(raw: &str) -> Result<LogLevel, String> {
    raw.parse()
}

fn parse_overrides(raw: &str) -> Result<LimitOverrides, String> {
    LimitOverrides::parse(raw).map_err(|e| e.to_string())
}

// =============================================================================
// Validators
// =============================================================================

fn directory_exists(path: &PathBuf, raw: &str) -> Validation {
    if path.is_dir() {
        Ok(())
    } else {
        Err(format!("Directory {} does not exist", raw))
    }
}

fn non_negative(value: &i64, raw: &str) -> Validation {
    if *value < 0 {
        Err(format!("{} cannot be negative", raw))
    } else {
        Ok(())
    }
}

fn positive(value: &i64, raw: &str) -> Validation {
    if *value <= 0 {
        Err(format!("{} must be greater than zero", raw))
    } else {
        Ok(())
    }
}

fn overrides_valid(overrides: &LimitOverrides, _raw: &str) -> Validation {
    overrides.validate().map_err(|e| e.to_string())
}

// =============================================================================
// Options
// =============================================================================

pub static LOG_LEVEL: OptionSpec<LogLevel> = OptionSpec {
    name: "log_level",
    description: "Level of data to log",
    default: || LogLevel::Info,
    parser: parse_log_level,
    validators: &[],
};

pub static AUTHENTICATION: OptionSpec<String> = OptionSpec {
    name: "authentication",
    description: "Token to use for authentication",
    default: || "piston".to_string(),
    parser: parse_string,
    validators: &[],
};

pub static BIND_ADDRESS: OptionSpec<String> = OptionSpec {
    name: "bind_address",
    description: "Address to bind the gRPC API on",
    default: || "0.0.0.0:2000".to_string(),
    parser: parse_string,
    validators: &[],
};

pub static DATA_DIRECTORY: OptionSpec<PathBuf> = OptionSpec {
    name: "data_directory",
    description: "Absolute path to store all piston related data at",
    default: || PathBuf::from("/piston"),
    parser: parse_path,
    validators: &[directory_exists],
};

pub static RUNNER_UID_MIN: OptionSpec<i64> = OptionSpec {
    name: "runner_uid_min",
    description: "Minimum uid to use for runner",
    default: || 1001,
    parser: parse_int,
    validators: &[],
};

pub static RUNNER_UID_MAX: OptionSpec<i64> = OptionSpec {
    name: "runner_uid_max",
    description: "Maximum uid to use for runner",
    default: || 1500,
    parser: parse_int,
    validators: &[],
};

pub static RUNNER_GID_MIN: OptionSpec<i64> = OptionSpec {
    name: "runner_gid_min",
    description: "Minimum gid to use for runner",
    default: || 1001,
    parser: parse_int,
    validators: &[],
};

pub static RUNNER_GID_MAX: OptionSpec<i64> = OptionSpec {
    name: "runner_gid_max",
    description: "Maximum gid to use for runner",
    default: || 1500,
    parser: parse_int,
    validators: &[],
};

pub static DISABLE_NETWORKING: OptionSpec<bool> = OptionSpec {
    name: "disable_networking",
    description: "Set to true to disable networking",
    default: || true,
    parser: parse_bool,
    validators: &[],
};

pub static OUTPUT_MAX_SIZE: OptionSpec<i64> = OptionSpec {
    name: "output_max_size",
    description: "Max size of each stdio buffer",
    default: || 1024,
    parser: parse_int,
    validators: &[non_negative],
};

pub static MAX_PROCESS_COUNT: OptionSpec<i64> = OptionSpec {
    name: "max_process_count",
    description: "Max number of processes per job",
    default: || 64,
    parser: parse_int,
    validators: &[non_negative],
};

pub static MAX_OPEN_FILES: OptionSpec<i64> = OptionSpec {
    name: "max_open_files",
    description: "Max number of open files per job",
    default: || 2048,
    parser: parse_int,
    validators: &[non_negative],
};

pub static MAX_FILE_SIZE: OptionSpec<i64> = OptionSpec {
    name: "max_file_size",
    description: "Max file size in bytes for a file",
    default: || 10_000_000,
    parser: parse_int,
    validators: &[non_negative],
};

pub static COMPILE_TIMEOUT: OptionSpec<i64> = OptionSpec {
    name: "compile_timeout",
    description: "Max time allowed for compile stage in milliseconds",
    default: || 10_000,
    parser: parse_int,
    validators: &[],
};

pub static RUN_TIMEOUT: OptionSpec<i64> = OptionSpec {
    name: "run_timeout",
    description: "Max time allowed for run stage in milliseconds",
    default: || 3_000,
    parser: parse_int,
    validators: &[],
};

pub static COMPILE_MEMORY_LIMIT: OptionSpec<i64> = OptionSpec {
    name: "compile_memory_limit",
    description: "Max memory usage for compile stage in bytes (set to -1 for no limit)",
    default: || -1,
    parser: parse_int,
    validators: &[],
};

pub static RUN_MEMORY_LIMIT: OptionSpec<i64> = OptionSpec {
    name: "run_memory_limit",
    description: "Max memory usage for run stage in bytes (set to -1 for no limit)",
    default: || -1,
    parser: parse_int,
    validators: &[],
};

pub static REPO_URL: OptionSpec<String> = OptionSpec {
    name: "repo_url",
    description: "URL of repo index",
    default: || "https://github.com/engineer-man/piston/releases/download/pkgs/index".to_string(),
    parser: parse_string,
    validators: &[],
};

pub static MAX_CONCURRENT_JOBS: OptionSpec<i64> = OptionSpec {
    name: "max_concurrent_jobs",
    description: "Maximum number of concurrent jobs to run at one time",
    default: || 64,
    parser: parse_int,
    validators: &[positive],
};

pub static LIMIT_OVERRIDES: OptionSpec<LimitOverrides> = OptionSpec {
    name: "limit_overrides",
    description: "Per-language exceptions in JSON format for each of: max_process_count, \
                  max_open_files, max_file_size, compile_memory_limit, run_memory_limit, \
                  compile_timeout, run_timeout, output_max_size",
    default: LimitOverrides::default,
    parser: parse_overrides,
    validators: &[overrides_valid],
};

/// Every declared option, in resolution order.
pub static SCHEMA: [&'static dyn OptionDescriptor; 20] = [
    &LOG_LEVEL,
    &AUTHENTICATION,
    &BIND_ADDRESS,
    &DATA_DIRECTORY,
    &RUNNER_UID_MIN,
    &RUNNER_UID_MAX,
    &RUNNER_GID_MIN,
    &RUNNER_GID_MAX,
    &DISABLE_NETWORKING,
    &OUTPUT_MAX_SIZE,
    &MAX_PROCESS_COUNT,
    &MAX_OPEN_FILES,
    &MAX_FILE_SIZE,
    &COMPILE_TIMEOUT,
    &RUN_TIMEOUT,
    &COMPILE_MEMORY_LIMIT,
    &RUN_MEMORY_LIMIT,
    &REPO_URL,
    &MAX_CONCURRENT_JOBS,
    &LIMIT_OVERRIDES,
];
