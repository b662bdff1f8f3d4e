//! Per-language limit overrides.
//!
//! `PISTON_LIMIT_OVERRIDES` holds a JSON object mapping a language to a set
//! of limit values, e.g. `{"java": {"max_process_count": 128}}`. Keys are
//! restricted to [`LimitKey`]; every value goes through the parser and
//! validators of the global option with the same name.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use super::options::{self, OptionSpec, OptionValue};

/// The closed set of limits that may be overridden per language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitKey {
    MaxProcessCount,
    MaxOpenFiles,
    MaxFileSize,
    CompileMemoryLimit,
    RunMemoryLimit,
    CompileTimeout,
    RunTimeout,
    OutputMaxSize,
}

impl LimitKey {
    pub const ALL: [LimitKey; 8] = [
        LimitKey::MaxProcessCount,
        LimitKey::MaxOpenFiles,
        LimitKey::MaxFileSize,
        LimitKey::CompileMemoryLimit,
        LimitKey::RunMemoryLimit,
        LimitKey::CompileTimeout,
        LimitKey::RunTimeout,
        LimitKey::OutputMaxSize,
    ];

    pub fn as_str(self) -> &'static str {
        self.option().name
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.as_str() == name)
    }

    /// The global option whose parser and validators this key reuses.
    pub fn option(self) -> &'static OptionSpec<i64> {
        match self {
            LimitKey::MaxProcessCount => &options::MAX_PROCESS_COUNT,
            LimitKey::MaxOpenFiles => &options::MAX_OPEN_FILES,
            LimitKey::MaxFileSize => &options::MAX_FILE_SIZE,
            LimitKey::CompileMemoryLimit => &options::COMPILE_MEMORY_LIMIT,
            LimitKey::RunMemoryLimit => &options::RUN_MEMORY_LIMIT,
            LimitKey::CompileTimeout => &options::COMPILE_TIMEOUT,
            LimitKey::RunTimeout => &options::RUN_TIMEOUT,
            LimitKey::OutputMaxSize => &options::OUTPUT_MAX_SIZE,
        }
    }
}

impl fmt::Display for LimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reasons an override document is rejected. Any of them rejects the whole document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OverrideError {
    #[error("Failed to parse the overrides\n{raw}")]
    Malformed { raw: String },

    #[error("Failed to parse the overrides\nunknown limit {key} for {language}")]
    UnknownKey { language: String, key: String },

    #[error("In overridden option {key} for {language}, {reason}")]
    InvalidValue {
        language: String,
        key: LimitKey,
        reason: String,
    },
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) if !n.is_i64() && !n.is_u64() => match n.as_f64() {
            Some(f) if f.is_finite() && f.abs() < i64::MAX as f64 => (f.trunc() as i64).to_string(),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

/// Validated mapping of language -> limit -> value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LimitOverrides(BTreeMap<String, BTreeMap<LimitKey, i64>>);

impl LimitOverrides {
    /// Parse the raw JSON document.
    ///
    /// Values may be JSON numbers or numeric strings; they are handed to the
    /// base option's parser in their textual form. Fractional numbers are
    /// truncated toward zero first, so `5000.0` and `5000.7` both mean `5000`.
    pub fn parse(raw: &str) -> Result<Self, OverrideError> {
        let malformed = || OverrideError::Malformed {
            raw: raw.to_string(),
        };

        let document: Value = serde_json::from_str(raw).map_err(|_| malformed())?;
        let languages = document.as_object().ok_or_else(malformed)?;

        let mut parsed = BTreeMap::new();
        for (language, limits) in languages {
            let limits = limits.as_object().ok_or_else(malformed)?;
            let mut entry = BTreeMap::new();

            for (name, raw_value) in limits {
                let key = LimitKey::from_name(name).ok_or_else(|| OverrideError::UnknownKey {
                    language: language.clone(),
                    key: name.clone(),
                })?;
                let text = value_text(raw_value);
                let value =
                    key.option()
                        .parse(&text)
                        .map_err(|reason| OverrideError::InvalidValue {
                            language: language.clone(),
                            key,
                            reason,
                        })?;
                entry.insert(key, value);
            }

            parsed.insert(language.clone(), entry);
        }

        Ok(Self(parsed))
    }

    /// Re-run every value through its base option's validator chain.
    pub fn validate(&self) -> Result<(), OverrideError> {
        for (language, limits) in &self.0 {
            for (key, value) in limits {
                key.option()
                    .validate(value, &value.render())
                    .map_err(|reason| OverrideError::InvalidValue {
                        language: language.clone(),
                        key: *key,
                        reason,
                    })?;
            }
        }
        Ok(())
    }

    /// Override for `key` in `language`, if one was configured.
    pub fn get(&self, language: &str, key: LimitKey) -> Option<i64> {
        self.0.get(language).and_then(|limits| limits.get(&key)).copied()
    }

    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl OptionValue for LimitOverrides {
    fn render(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_numbers_and_numeric_strings() {
        let overrides =
            LimitOverrides::parse(r#"{"java": {"max_process_count": 128, "run_timeout": "5000"}}"#)
                .unwrap();

        assert_eq!(overrides.get("java", LimitKey::MaxProcessCount), Some(128));
        assert_eq!(overrides.get("java", LimitKey::RunTimeout), Some(5000));
        assert_eq!(overrides.get("java", LimitKey::CompileTimeout), None);
        assert_eq!(overrides.get("python", LimitKey::RunTimeout), None);
    }

    #[test]
    fn test_fractional_numbers_are_truncated() {
        let overrides = LimitOverrides::parse(
            r#"{"java": {"run_timeout": 5000.0, "compile_timeout": 7500.9, "max_open_files": -2.5}}"#,
        )
        .unwrap();

        assert_eq!(overrides.get("java", LimitKey::RunTimeout), Some(5000));
        assert_eq!(overrides.get("java", LimitKey::CompileTimeout), Some(7500));
        assert_eq!(overrides.get("java", LimitKey::MaxOpenFiles), Some(-2));
        assert!(overrides.validate().is_err());
    }

    #[test]
    fn test_empty_document_is_empty_table() {
        let overrides = LimitOverrides::parse("{}").unwrap();
        assert!(overrides.is_empty());
        assert_eq!(overrides, LimitOverrides::default());
    }

    #[test]
    fn test_malformed_json_rejected() {
        let err = LimitOverrides::parse("{not json").unwrap_err();
        assert_eq!(
            err,
            OverrideError::Malformed {
                raw: "{not json".to_string()
            }
        );
        assert!(err.to_string().starts_with("Failed to parse the overrides"));
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(matches!(
            LimitOverrides::parse("[1, 2]"),
            Err(OverrideError::Malformed { .. })
        ));
        assert!(matches!(
            LimitOverrides::parse(r#"{"java": 5}"#),
            Err(OverrideError::Malformed { .. })
        ));
    }

    #[test]
    fn test_unknown_key_fails_whole_document() {
        let err = LimitOverrides::parse(
            r#"{"java": {"max_process_count": 128}, "python": {"max_cpu": 2}}"#,
        )
        .unwrap_err();

        assert_eq!(
            err,
            OverrideError::UnknownKey {
                language: "python".to_string(),
                key: "max_cpu".to_string(),
            }
        );
    }

    #[test]
    fn test_unparseable_value_names_language_and_key() {
        let err = LimitOverrides::parse(r#"{"rust": {"compile_timeout": "soon"}}"#).unwrap_err();
        assert_eq!(
            err.to_string(),
            "In overridden option compile_timeout for rust, soon is not a number"
        );
    }

    #[test]
    fn test_validate_applies_base_option_validators() {
        let overrides = LimitOverrides::parse(r#"{"go": {"max_open_files": -5}}"#).unwrap();
        let err = overrides.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "In overridden option max_open_files for go, -5 cannot be negative"
        );
    }

    #[test]
    fn test_negative_memory_override_is_valid() {
        let overrides = LimitOverrides::parse(r#"{"go": {"run_memory_limit": -1}}"#).unwrap();
        assert!(overrides.validate().is_ok());
    }

    #[test]
    fn test_limit_key_names_round_trip_through_options() {
        for key in LimitKey::ALL {
            assert_eq!(LimitKey::from_name(key.as_str()), Some(key));
        }
        assert_eq!(LimitKey::from_name("max_concurrent_jobs"), None);
    }

    #[test]
    fn test_render_is_json() {
        let overrides = LimitOverrides::parse(r#"{"c": {"output_max_size": 4096}}"#).unwrap();
        assert_eq!(overrides.render(), r#"{"c":{"output_max_size":4096}}"#);
    }
}
