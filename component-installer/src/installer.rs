// Installer: resolve the tree, fetch every unique package, persist mapping.json

use crate::config::InstallerConfig;
use crate::error::{InstallError, Result};
use crate::manifest::Manifest;
use crate::mapping::Mapping;
use crate::package::{install_path, PackageRef, PackageSource};
use crate::parallel::parallel;
use crate::resolver::Resolver;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Outcome of a successful installation run
#[derive(Debug, Clone, Default)]
pub struct Installation {
    /// Every unique package in the tree, sorted by slug
    pub packages: Vec<String>,
    /// Packages whose content was fetched in this run
    pub fetched: Vec<String>,
    /// Packages left alone because their target path already existed
    pub skipped: Vec<String>,
    /// The document written to `mapping.json`
    pub mapping: Mapping,
}

/// Drives one project's installation
pub struct Installer {
    config: InstallerConfig,
    source: Arc<dyn PackageSource>,
    local: Manifest,
}

impl Installer {
    /// Load the root manifest from `config.manifest_path()`.
    ///
    /// A missing manifest means no dependencies; an unreadable or malformed
    /// one is a read error for the root.
    pub fn new(config: InstallerConfig, source: Arc<dyn PackageSource>) -> Result<Self> {
        let local = Manifest::from_file_or_default(config.manifest_path()).map_err(|source| {
            InstallError::Read {
                slug: crate::mapping::ROOT.to_string(),
                source,
            }
        })?;

        Ok(Self::with_manifest(config, source, local))
    }

    /// Use an already parsed root manifest
    pub fn with_manifest(
        config: InstallerConfig,
        source: Arc<dyn PackageSource>,
        local: Manifest,
    ) -> Self {
        Self {
            config,
            source,
            local,
        }
    }

    pub fn config(&self) -> &InstallerConfig {
        &self.config
    }

    /// The root manifest
    pub fn manifest(&self) -> &Manifest {
        &self.local
    }

    /// Install every package reachable from the root manifest.
    ///
    /// Any resolution, read or fetch failure aborts the run before
    /// `mapping.json` is written, so an on-disk mapping always describes a
    /// fully fetched tree. Each call starts with a fresh cache and mapping.
    pub async fn install(&self) -> Result<Installation> {
        let resolver = Arc::new(Resolver::new(self.source.clone(), &self.config));
        let pkgs = resolver.resolve_root(self.local.clone()).await?;

        let (to_fetch, skipped) = self.partition_existing(pkgs.clone()).await;

        for pkg in &skipped {
            log::debug!("skipping: {} (already installed)", pkg.slug());
        }

        for pkg in &to_fetch {
            log::debug!("fetching: {}", pkg.slug());
        }

        let fetches: Vec<_> = to_fetch.iter().cloned().map(fetch).collect();
        parallel(fetches, self.config.limit()).await?;

        for pkg in &to_fetch {
            log::debug!("fetched: {}", pkg.slug());
        }

        let mapping = resolver.mapping().to_mapping();
        let path = self.config.mapping_path();
        mapping
            .to_file(&path)
            .await
            .map_err(|source| InstallError::Persist {
                path: path.clone(),
                source,
            })?;

        log::info!(
            "installed {} packages ({} fetched, {} skipped) into {}",
            pkgs.len(),
            to_fetch.len(),
            skipped.len(),
            self.config.install_dir().display()
        );

        Ok(Installation {
            packages: slugs(&pkgs),
            fetched: slugs(&to_fetch),
            skipped: slugs(&skipped),
            mapping,
        })
    }

    /// Entry file of an installed package: its manifest's `main`, or the
    /// default entry when the manifest is missing or unreadable
    pub fn entry(&self, slug: &str) -> PathBuf {
        let root = self.config.install_dir().join(install_path(slug));
        let manifest = Manifest::from_file(root.join(&self.config.manifest)).unwrap_or_else(|err| {
            log::debug!("using default entry for {}: {:#}", slug, err);
            Manifest::default()
        });

        root.join(manifest.main())
    }

    /// Split packages into (fetch, skip) under the skip-existing policy
    async fn partition_existing(&self, pkgs: Vec<PackageRef>) -> (Vec<PackageRef>, Vec<PackageRef>) {
        if !self.config.skip_existing {
            return (pkgs, Vec::new());
        }

        let mut to_fetch = Vec::new();
        let mut skipped = Vec::new();
        for pkg in pkgs {
            if target_exists(&pkg.target_path()).await {
                skipped.push(pkg);
            } else {
                to_fetch.push(pkg);
            }
        }

        (to_fetch, skipped)
    }
}

/// Whether an install target is present. A path that cannot be checked is
/// logged and fetched again.
async fn target_exists(path: &Path) -> bool {
    match tokio::fs::try_exists(path).await {
        Ok(exists) => exists,
        Err(err) => {
            log::warn!("cannot check {}: {}; fetching", path.display(), err);
            false
        }
    }
}

async fn fetch(pkg: PackageRef) -> Result<()> {
    pkg.fetch().await.map_err(|source| InstallError::Fetch {
        slug: pkg.slug(),
        source,
    })
}

fn slugs(pkgs: &[PackageRef]) -> Vec<String> {
    pkgs.iter().map(|pkg| pkg.slug()).collect()
}
