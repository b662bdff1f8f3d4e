//! Package index collaborator.
//!
//! Index download, checksum verification and extraction live behind these
//! traits; the gateway only lists packages and triggers install/uninstall.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::types::Result;

/// A package as listed by the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageListing {
    pub language: String,
    pub version: String,
    pub installed: bool,
}

/// Result of a successful install or uninstall.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageAction {
    pub language: String,
    pub version: String,
}

/// A single installable package.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Package: Send + Sync {
    fn language(&self) -> &str;

    fn version(&self) -> &str;

    async fn install(&self) -> Result<PackageAction>;

    async fn uninstall(&self) -> Result<PackageAction>;
}

/// Source of known packages.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PackageIndex: Send + Sync {
    async fn list(&self) -> Result<Vec<PackageListing>>;

    /// Package matching `language` and `version`, or `None` if the index has none.
    async fn find(&self, language: &str, version: &str) -> Result<Option<Arc<dyn Package>>>;
}
