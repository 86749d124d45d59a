// Resolution cache: slug -> canonical package handle, one per installation run

use crate::package::{install_path, PackageRef};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// Deduplication authority for one installation run.
///
/// A slug is inserted at most once. Its presence means the package's
/// subtree has been, or is being, expanded by whoever inserted it.
/// Install paths are tracked too: two slugs that flatten to the same
/// directory cannot both be installed.
#[derive(Clone, Default)]
pub struct ResolutionCache {
    packages: Arc<DashMap<String, PackageRef>>,
    paths: Arc<DashMap<String, String>>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `package` under `slug` unless the slug is already cached.
    ///
    /// Returns the canonical handle and whether the slug was already present.
    /// The check and the insert happen under one shard lock, so exactly one
    /// caller wins per slug.
    pub fn get_or_insert(&self, slug: &str, package: PackageRef) -> (PackageRef, bool) {
        match self.packages.entry(slug.to_string()) {
            Entry::Occupied(entry) => (entry.get().clone(), true),
            Entry::Vacant(entry) => {
                entry.insert(package.clone());
                (package, false)
            }
        }
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.packages.contains_key(slug)
    }

    /// Reserve the install path of `slug`.
    ///
    /// Fails with the slug already holding the path when a different slug
    /// flattens to the same directory (`a/b@1` and `a-b@1`).
    pub fn claim_path(&self, slug: &str) -> std::result::Result<(), String> {
        match self.paths.entry(install_path(slug)) {
            Entry::Occupied(entry) if entry.get() != slug => Err(entry.get().clone()),
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(entry) => {
                entry.insert(slug.to_string());
                Ok(())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Every canonical package, sorted by slug
    pub fn packages(&self) -> Vec<PackageRef> {
        let mut packages: Vec<(String, PackageRef)> = self
            .packages
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        packages.sort_by(|a, b| a.0.cmp(&b.0));
        packages.into_iter().map(|(_, pkg)| pkg).collect()
    }
}
