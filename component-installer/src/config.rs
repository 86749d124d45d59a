// Installer configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Default dependency output directory
pub const DEFAULT_DIRECTORY: &str = "components";

/// Default manifest filename
pub const DEFAULT_MANIFEST: &str = "component.json";

/// Default number of in-flight operations per batch
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Name of the persisted tree-shape document
pub const MAPPING_FILE: &str = "mapping.json";

/// Credentials handed to every package source request
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub user: String,
    pub token: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            token: token.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Configuration consumed by one installation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallerConfig {
    /// Project root holding the root manifest
    #[serde(default = "default_cwd")]
    pub cwd: PathBuf,

    /// Dependency output directory, relative to `cwd`
    #[serde(default = "default_directory")]
    pub directory: PathBuf,

    /// Manifest filename, used for the root and for every package
    #[serde(default = "default_manifest")]
    pub manifest: String,

    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Include the root manifest's `development` dependencies
    #[serde(default)]
    pub development: bool,

    /// Do not fetch packages whose target path already exists
    #[serde(default, rename = "skipExisting")]
    pub skip_existing: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
}

fn default_cwd() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn default_directory() -> PathBuf {
    PathBuf::from(DEFAULT_DIRECTORY)
}

fn default_manifest() -> String {
    DEFAULT_MANIFEST.to_string()
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

impl InstallerConfig {
    /// Configuration rooted at `cwd` with every other field defaulted
    pub fn new<P: AsRef<Path>>(cwd: P) -> Self {
        Self {
            cwd: cwd.as_ref().to_path_buf(),
            directory: default_directory(),
            manifest: default_manifest(),
            concurrency: DEFAULT_CONCURRENCY,
            development: false,
            skip_existing: false,
            credentials: None,
        }
    }

    /// Set the directory packages are written to
    pub fn directory<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.directory = normalize(dir.as_ref());
        self
    }

    /// Set the manifest filename
    pub fn manifest(mut self, manifest: impl Into<String>) -> Self {
        self.manifest = manifest.into();
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.concurrency = n;
        self
    }

    pub fn development(mut self, dev: bool) -> Self {
        self.development = dev;
        self
    }

    pub fn skip_existing(mut self, skip: bool) -> Self {
        self.skip_existing = skip;
        self
    }

    /// Authenticate package sources with `user` / `token`
    pub fn auth(mut self, user: impl Into<String>, token: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::new(user, token));
        self
    }

    /// Absolute dependency output directory
    pub fn install_dir(&self) -> PathBuf {
        self.cwd.join(&self.directory)
    }

    /// Path of the root manifest
    pub fn manifest_path(&self) -> PathBuf {
        self.cwd.join(&self.manifest)
    }

    /// Path the mapping document is persisted to
    pub fn mapping_path(&self) -> PathBuf {
        self.install_dir().join(MAPPING_FILE)
    }

    /// Concurrency limit, never below one
    pub fn limit(&self) -> usize {
        self.concurrency.max(1)
    }
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self::new(default_cwd())
    }
}

/// Drop `.` components so `./components` and `components` compare equal
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, std::path::Component::CurDir))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = InstallerConfig::new("/project");
        assert_eq!(config.install_dir(), PathBuf::from("/project/components"));
        assert_eq!(config.manifest_path(), PathBuf::from("/project/component.json"));
        assert_eq!(
            config.mapping_path(),
            PathBuf::from("/project/components/mapping.json")
        );
        assert_eq!(config.limit(), 10);
        assert!(!config.development);
        assert!(config.credentials.is_none());
    }

    #[test]
    fn test_builder_chain() {
        let config = InstallerConfig::new("/project")
            .directory("./deps")
            .manifest("package.json")
            .concurrency(0)
            .development(true)
            .auth("octocat", "secret");

        assert_eq!(config.directory, PathBuf::from("deps"));
        assert_eq!(config.manifest_path(), PathBuf::from("/project/package.json"));
        assert_eq!(config.limit(), 1);
        assert!(config.development);
        assert_eq!(config.credentials, Some(Credentials::new("octocat", "secret")));
    }

    #[test]
    fn test_credentials_debug_is_redacted() {
        let printed = format!("{:?}", Credentials::new("octocat", "secret"));
        assert!(printed.contains("octocat"));
        assert!(!printed.contains("secret"));
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: InstallerConfig =
            serde_json::from_str(r#"{ "cwd": "/app", "development": true }"#).unwrap();
        assert_eq!(config.cwd, PathBuf::from("/app"));
        assert_eq!(config.directory, PathBuf::from("components"));
        assert_eq!(config.manifest, "component.json");
        assert_eq!(config.concurrency, 10);
        assert!(config.development);
        assert!(!config.skip_existing);
    }
}
