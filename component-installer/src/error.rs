// Installer error kinds

use std::path::PathBuf;
use thiserror::Error;

/// Result type used throughout the installer
pub type Result<T, E = InstallError> = std::result::Result<T, E>;

/// Errors surfaced by an installation run.
///
/// Collaborator failures (`Package::resolve`, `read_manifest`, `fetch`) arrive
/// as `anyhow::Error` and are kept as the source of the matching variant.
#[derive(Debug, Error)]
pub enum InstallError {
    /// A version spec could not be matched to a concrete reference
    #[error("Failed to resolve {name}@{spec}")]
    Resolution {
        name: String,
        spec: String,
        #[source]
        source: anyhow::Error,
    },

    /// A manifest could not be read or parsed
    #[error("Failed to read manifest of {slug}")]
    Read {
        slug: String,
        #[source]
        source: anyhow::Error,
    },

    /// Package content could not be materialized on disk
    #[error("Failed to fetch {slug}")]
    Fetch {
        slug: String,
        #[source]
        source: anyhow::Error,
    },

    /// Two different packages flatten to the same install path
    #[error("{slug} conflicts with {other}: both install into {path}")]
    Conflict {
        slug: String,
        other: String,
        path: String,
    },

    /// The mapping document could not be written
    #[error("Failed to write {}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// A worker task panicked or was cancelled
    #[error("Installer task failed")]
    Task(#[from] tokio::task::JoinError),
}

impl InstallError {
    /// Slug or name of the package the error belongs to, if any
    pub fn package(&self) -> Option<&str> {
        match self {
            InstallError::Resolution { name, .. } => Some(name),
            InstallError::Read { slug, .. }
            | InstallError::Fetch { slug, .. }
            | InstallError::Conflict { slug, .. } => Some(slug),
            InstallError::Persist { .. } | InstallError::Task(_) => None,
        }
    }
}
