// Filesystem-backed package source

use crate::package::{Package, PackageRequest, PackageSource};
use crate::version;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};

/// A directory of packages laid out as `<root>/<name>/<version>/...`.
///
/// Every version directory holds the package contents, including its
/// manifest. Names may contain `/` (`component/emitter`).
#[derive(Debug, Clone)]
pub struct LocalRegistry {
    root: PathBuf,
}

impl LocalRegistry {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one version of a package
    pub fn package_dir(&self, name: &str, version: &str) -> PathBuf {
        self.root.join(name).join(version)
    }
}

impl PackageSource for LocalRegistry {
    fn create(&self, request: PackageRequest) -> Box<dyn Package> {
        Box::new(RegistryPackage {
            registry: self.clone(),
            name: request.name,
            spec: request.version_spec,
            reference: None,
            directory: request.directory,
        })
    }
}

/// Package handle served from a `LocalRegistry`
#[derive(Debug)]
pub struct RegistryPackage {
    registry: LocalRegistry,
    name: String,
    spec: String,
    reference: Option<String>,
    directory: PathBuf,
}

impl RegistryPackage {
    fn source_dir(&self) -> Result<PathBuf> {
        match &self.reference {
            Some(reference) => Ok(self.registry.package_dir(&self.name, reference)),
            None => bail!("{} has not been resolved", self.slug()),
        }
    }
}

#[async_trait]
impl Package for RegistryPackage {
    fn name(&self) -> &str {
        &self.name
    }

    fn version_spec(&self) -> &str {
        &self.spec
    }

    fn resolved_ref(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    fn directory(&self) -> &Path {
        &self.directory
    }

    async fn resolve(&mut self) -> Result<()> {
        let versions_dir = self.registry.root.join(&self.name);
        let mut entries = tokio::fs::read_dir(&versions_dir)
            .await
            .with_context(|| format!("Package not found: {}", self.name))?;

        let mut versions = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                versions.push(entry.file_name().to_string_lossy().to_string());
            }
        }

        match version::select(&self.spec, &versions) {
            Some(reference) => {
                self.reference = Some(reference);
                Ok(())
            }
            None => bail!(
                "No version of {} matches {} (available: {})",
                self.name,
                self.spec,
                versions.join(", ")
            ),
        }
    }

    async fn read_manifest(&self, filename: &str) -> Result<String> {
        let path = self.source_dir()?.join(filename);
        tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))
    }

    async fn fetch(&self) -> Result<()> {
        let src = self.source_dir()?;
        let dst = self.target_path();
        tokio::task::spawn_blocking(move || copy_dir(&src, &dst, &[])).await?
    }
}

/// Copy a directory tree, overwriting existing files. Entries named in
/// `skip` are left out at every level.
pub(crate) fn copy_dir(src: &Path, dst: &Path, skip: &[&str]) -> Result<()> {
    fs::create_dir_all(dst)
        .with_context(|| format!("Failed to create directory: {}", dst.display()))?;

    let mut entries: Vec<_> = fs::read_dir(src)
        .with_context(|| format!("Failed to read directory: {}", src.display()))?
        .collect::<Result<Vec<_>, _>>()?;

    entries.sort_by_key(|e| e.path());

    for entry in entries {
        if skip.iter().any(|s| entry.file_name() == *s) {
            continue;
        }

        let path = entry.path();
        let target = dst.join(entry.file_name());
        if path.is_dir() {
            copy_dir(&path, &target, skip)?;
        } else {
            fs::copy(&path, &target)
                .with_context(|| format!("Failed to copy {}", path.display()))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn publish(root: &Path, name: &str, version: &str, manifest: &str) {
        let dir = root.join(name).join(version);
        fs::create_dir_all(dir.join("lib")).unwrap();
        fs::write(dir.join("component.json"), manifest).unwrap();
        fs::write(dir.join("lib").join("index.js"), "module.exports = 1;").unwrap();
    }

    #[tokio::test]
    async fn test_resolve_read_fetch() {
        let registry_dir = tempfile::tempdir().unwrap();
        let install_dir = tempfile::tempdir().unwrap();
        publish(registry_dir.path(), "component/emitter", "1.0.0", "{}");
        publish(registry_dir.path(), "component/emitter", "1.1.0", r#"{"main":"lib/index.js"}"#);

        let registry = LocalRegistry::new(registry_dir.path());
        let mut pkg = registry.create(PackageRequest::new(
            "component/emitter",
            "^1.0.0",
            install_dir.path(),
        ));

        pkg.resolve().await.unwrap();
        assert_eq!(pkg.slug(), "component/emitter@1.1.0");

        let manifest = pkg.read_manifest("component.json").await.unwrap();
        assert!(manifest.contains("lib/index.js"));

        pkg.fetch().await.unwrap();
        let installed = install_dir.path().join("component-emitter@1.1.0");
        assert!(installed.join("component.json").exists());
        assert!(installed.join("lib").join("index.js").exists());
    }

    #[tokio::test]
    async fn test_unknown_package() {
        let registry_dir = tempfile::tempdir().unwrap();
        let registry = LocalRegistry::new(registry_dir.path());
        let mut pkg = registry.create(PackageRequest::new("missing", "1.0.0", Path::new("c")));

        let err = pkg.resolve().await.unwrap_err();
        assert!(err.to_string().contains("Package not found: missing"));
    }

    #[tokio::test]
    async fn test_no_matching_version() {
        let registry_dir = tempfile::tempdir().unwrap();
        publish(registry_dir.path(), "a", "1.0.0", "{}");

        let registry = LocalRegistry::new(registry_dir.path());
        let mut pkg = registry.create(PackageRequest::new("a", "2.0.0", Path::new("c")));

        let err = pkg.resolve().await.unwrap_err();
        assert!(err.to_string().contains("available: 1.0.0"));
    }

    #[tokio::test]
    async fn test_read_before_resolve_fails() {
        let registry = LocalRegistry::new("/nonexistent");
        let pkg = registry.create(PackageRequest::new("a", "1.0.0", Path::new("c")));
        assert!(pkg.read_manifest("component.json").await.is_err());
    }
}
