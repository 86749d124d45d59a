// Package handle and package source contracts

use crate::config::Credentials;
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Everything a package source needs to construct a handle
#[derive(Debug, Clone)]
pub struct PackageRequest {
    /// Dependency name as written in the manifest
    pub name: String,
    /// Raw version constraint from the manifest
    pub version_spec: String,
    /// Root directory the package's contents will live under
    pub directory: PathBuf,
    pub credentials: Option<Credentials>,
}

impl PackageRequest {
    pub fn new(name: &str, version_spec: &str, directory: &Path) -> Self {
        Self {
            name: name.to_string(),
            version_spec: version_spec.to_string(),
            directory: directory.to_path_buf(),
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }
}

/// One dependency edge at one version constraint.
///
/// A fresh handle is created for every edge in the manifest graph.
/// `resolve` fills in the concrete reference; `slug` is only stable after it
/// has succeeded.
#[async_trait]
pub trait Package: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn version_spec(&self) -> &str;

    /// Concrete version or commit, `None` until resolved
    fn resolved_ref(&self) -> Option<&str>;

    /// Root directory the package is installed under
    fn directory(&self) -> &Path;

    /// Match the version spec to a concrete reference
    async fn resolve(&mut self) -> anyhow::Result<()>;

    /// Read a file (the manifest) from the resolved package
    async fn read_manifest(&self, filename: &str) -> anyhow::Result<String>;

    /// Materialize the package contents at `target_path()`
    async fn fetch(&self) -> anyhow::Result<()>;

    /// `name@ref`, falling back to the version spec before resolution
    fn slug(&self) -> String {
        slug(self.name(), self.resolved_ref().unwrap_or(self.version_spec()))
    }

    /// Install path relative to the dependency directory
    fn install_path(&self) -> String {
        install_path(&self.slug())
    }

    fn target_path(&self) -> PathBuf {
        self.directory().join(self.install_path())
    }
}

/// Shared handle after resolution
pub type PackageRef = Arc<dyn Package>;

/// Constructs package handles. Implementations own the transport
/// (filesystem, git, registry); the installer only sees this trait.
pub trait PackageSource: Send + Sync {
    fn create(&self, request: PackageRequest) -> Box<dyn Package>;
}

/// Canonical slug for a resolved package
pub fn slug(name: &str, reference: &str) -> String {
    format!("{}@{}", name, reference)
}

/// Directory name for a slug, with path separators flattened
pub fn install_path(slug: &str) -> String {
    slug.replace(['/', '\\'], "-")
}
