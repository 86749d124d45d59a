// component-installer - dependency tree resolution and installation
//
// Walks component.json manifests recursively, deduplicates packages by slug,
// fetches each unique package once and records the tree in mapping.json.

pub mod cache;
pub mod config;
pub mod error;
pub mod git;
pub mod installer;
pub mod manifest;
pub mod mapping;
pub mod package;
pub mod parallel;
pub mod registry;
pub mod resolver;
pub mod version;

pub use cache::ResolutionCache;
pub use config::{Credentials, InstallerConfig};
pub use error::{InstallError, Result};
pub use git::GitSource;
pub use installer::{Installation, Installer};
pub use manifest::Manifest;
pub use mapping::{Mapping, MappingRecorder, ROOT};
pub use package::{Package, PackageRef, PackageRequest, PackageSource};
pub use parallel::parallel;
pub use registry::LocalRegistry;
pub use resolver::Resolver;

/// Installer version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
