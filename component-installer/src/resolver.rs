// Dependency resolver: recursive, deduplicating expansion of the manifest graph

use crate::cache::ResolutionCache;
use crate::config::{Credentials, InstallerConfig};
use crate::error::{InstallError, Result};
use crate::manifest::Manifest;
use crate::mapping::{MappingRecorder, ROOT};
use crate::package::{Package, PackageRef, PackageRequest, PackageSource};
use crate::parallel::parallel;
use futures::future::{BoxFuture, FutureExt};
use std::path::PathBuf;
use std::sync::Arc;

/// Expands manifests into a deduplicated package set for one installation run.
///
/// The cache and mapping recorder are shared by every recursive expansion
/// and live as long as the resolver.
pub struct Resolver {
    source: Arc<dyn PackageSource>,
    directory: PathBuf,
    manifest: String,
    concurrency: usize,
    development: bool,
    credentials: Option<Credentials>,
    cache: ResolutionCache,
    mapping: MappingRecorder,
}

impl Resolver {
    pub fn new(source: Arc<dyn PackageSource>, config: &InstallerConfig) -> Self {
        Self {
            source,
            directory: config.install_dir(),
            manifest: config.manifest.clone(),
            concurrency: config.limit(),
            development: config.development,
            credentials: config.credentials.clone(),
            cache: ResolutionCache::new(),
            mapping: MappingRecorder::new(),
        }
    }

    pub fn cache(&self) -> &ResolutionCache {
        &self.cache
    }

    pub fn mapping(&self) -> &MappingRecorder {
        &self.mapping
    }

    /// Expand the root manifest and return every unique package in the tree
    pub async fn resolve_root(self: &Arc<Self>, manifest: Manifest) -> Result<Vec<PackageRef>> {
        self.clone().expand(manifest, ROOT.to_string(), true).await
    }

    /// Expand one manifest node and, recursively, every newly seen dependency.
    ///
    /// `parent` is the node's key in the mapping. The return value is the
    /// content of the shared cache once this subtree is done; only the
    /// outermost call's value is the complete package list.
    pub fn expand(
        self: Arc<Self>,
        manifest: Manifest,
        parent: String,
        is_root: bool,
    ) -> BoxFuture<'static, Result<Vec<PackageRef>>> {
        async move {
            let deps = manifest.dependencies_to_expand(is_root && self.development);

            if deps.is_empty() {
                self.mapping.record(&parent, Vec::new());
                return Ok(self.cache.packages());
            }

            let pkgs: Vec<Box<dyn Package>> = deps
                .iter()
                .map(|(name, spec)| {
                    let request = PackageRequest::new(name, spec, &self.directory)
                        .with_credentials(self.credentials.clone());
                    self.source.create(request)
                })
                .collect();

            for pkg in &pkgs {
                log::debug!("resolving: {}", pkg.slug());
            }

            let ops: Vec<_> = pkgs.into_iter().map(resolve).collect();
            let pkgs: Vec<PackageRef> = parallel(ops, self.concurrency)
                .await?
                .into_iter()
                .map(PackageRef::from)
                .collect();

            for pkg in &pkgs {
                log::debug!("resolved to: {}", pkg.slug());
            }

            // Every edge is recorded, including edges to packages seen elsewhere
            self.mapping
                .record(&parent, pkgs.iter().map(|pkg| pkg.slug()).collect());

            let fresh: Vec<PackageRef> = pkgs
                .into_iter()
                .filter(|pkg| {
                    let (_, present) = self.cache.get_or_insert(&pkg.slug(), pkg.clone());
                    if present {
                        log::debug!("already resolved: {}", pkg.slug());
                    }
                    !present
                })
                .collect();

            // Parents are keyed by install path, so it must be unique per slug
            for pkg in &fresh {
                let slug = pkg.slug();
                if let Err(other) = self.cache.claim_path(&slug) {
                    return Err(InstallError::Conflict {
                        path: pkg.install_path(),
                        slug,
                        other,
                    });
                }
            }

            let reads: Vec<_> = fresh
                .into_iter()
                .map(|pkg| read(pkg, self.manifest.clone()))
                .collect();
            let children = parallel(reads, self.concurrency).await?;

            let recursions: Vec<_> = children
                .into_iter()
                .map(|(pkg, child)| self.clone().expand(child, pkg.install_path(), false))
                .collect();
            parallel(recursions, self.concurrency).await?;

            Ok(self.cache.packages())
        }
        .boxed()
    }
}

async fn resolve(mut pkg: Box<dyn Package>) -> Result<Box<dyn Package>> {
    match pkg.resolve().await {
        Ok(()) => Ok(pkg),
        Err(source) => Err(InstallError::Resolution {
            name: pkg.name().to_string(),
            spec: pkg.version_spec().to_string(),
            source,
        }),
    }
}

async fn read(pkg: PackageRef, filename: String) -> Result<(PackageRef, Manifest)> {
    let parsed = match pkg.read_manifest(&filename).await {
        Ok(text) => Manifest::from_str(&text),
        Err(err) => Err(err),
    };

    match parsed {
        Ok(manifest) => Ok((pkg, manifest)),
        Err(source) => Err(InstallError::Read {
            slug: pkg.slug(),
            source,
        }),
    }
}
