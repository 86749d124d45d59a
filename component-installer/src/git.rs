// Git-backed package source

use crate::config::Credentials;
use crate::package::{Package, PackageRequest, PackageSource};
use crate::registry::copy_dir;
use crate::version;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::process::Command;

/// Resolves and fetches packages straight from their git remotes.
///
/// Checkouts are shallow clones kept under `checkouts`, keyed by slug and
/// resolved commit, and shared between `read_manifest` and `fetch`. A
/// branch that has moved resolves to a new commit and gets a fresh clone.
#[derive(Debug, Clone)]
pub struct GitSource {
    checkouts: PathBuf,
}

impl GitSource {
    pub fn new<P: AsRef<Path>>(checkouts: P) -> Self {
        Self {
            checkouts: checkouts.as_ref().to_path_buf(),
        }
    }
}

impl PackageSource for GitSource {
    fn create(&self, request: PackageRequest) -> Box<dyn Package> {
        Box::new(GitPackage {
            url: remote_url(&request.name, None),
            credentials: request.credentials,
            name: request.name,
            spec: request.version_spec,
            reference: None,
            commit: None,
            directory: request.directory,
            checkouts: self.checkouts.clone(),
        })
    }
}

/// Package handle backed by a git remote
#[derive(Debug)]
pub struct GitPackage {
    name: String,
    spec: String,
    reference: Option<String>,
    commit: Option<String>,
    directory: PathBuf,
    url: String,
    credentials: Option<Credentials>,
    checkouts: PathBuf,
}

impl GitPackage {
    /// Remote URL with credentials filled in
    fn remote(&self) -> String {
        match &self.credentials {
            Some(creds) => with_credentials(&self.url, creds),
            None => self.url.clone(),
        }
    }

    /// Clone the resolved commit once, return the checkout path.
    ///
    /// The clone lands in a staging directory and is renamed into place
    /// only after HEAD is verified, so an existing checkout is complete.
    async fn checkout(&self) -> Result<PathBuf> {
        let (Some(reference), Some(commit)) = (self.reference.as_deref(), self.commit.as_deref())
        else {
            bail!("{} has not been resolved", self.slug());
        };

        let key = format!("{}-{}", self.install_path(), commit);
        let path = self.checkouts.join(&key);
        if path.exists() {
            return Ok(path);
        }

        tokio::fs::create_dir_all(&self.checkouts)
            .await
            .with_context(|| format!("Failed to create {}", self.checkouts.display()))?;

        let staging = self.checkouts.join(format!(".{}.{}.partial", key, staging_id()));
        let cloned = self.clone_into(reference, commit, &staging).await;
        if let Err(err) = cloned {
            let _ = tokio::fs::remove_dir_all(&staging).await;
            return Err(err);
        }

        if let Err(err) = tokio::fs::rename(&staging, &path).await {
            let _ = tokio::fs::remove_dir_all(&staging).await;
            // Another handle for the same commit finished first
            if !path.exists() {
                return Err(err)
                    .with_context(|| format!("Failed to move checkout to {}", path.display()));
            }
        }

        Ok(path)
    }

    async fn clone_into(&self, reference: &str, commit: &str, staging: &Path) -> Result<()> {
        let staging_arg = staging.to_string_lossy().to_string();
        let remote = self.remote();
        git(&[
            "clone",
            "--quiet",
            "--depth",
            "1",
            "--branch",
            reference,
            &remote,
            &staging_arg,
        ])
        .await
        .with_context(|| format!("Failed to clone {}", self.slug()))?;

        let head = git(&["-C", &staging_arg, "rev-parse", "HEAD"]).await?;
        if head.trim() != commit {
            bail!(
                "{} moved from {} to {} while cloning",
                reference,
                commit,
                head.trim()
            );
        }

        Ok(())
    }
}

/// Unique suffix for staging directories within this process
fn staging_id() -> String {
    static NEXT: AtomicU64 = AtomicU64::new(0);
    format!("{}-{}", std::process::id(), NEXT.fetch_add(1, Ordering::Relaxed))
}

#[async_trait]
impl Package for GitPackage {
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
        let remote = self.remote();
        let output = git(&["ls-remote", "--tags", "--heads", &remote])
            .await
            .with_context(|| format!("Failed to list refs of {}", self.name))?;

        let refs = parse_refs(&output);
        let names: Vec<&str> = refs.iter().map(|(name, _)| name.as_str()).collect();
        let Some(reference) = version::select(&self.spec, &names) else {
            bail!("No tag or branch of {} matches {}", self.name, self.spec);
        };

        let commit = refs
            .iter()
            .find(|(name, _)| *name == reference)
            .map(|(_, commit)| commit.clone());

        log::debug!("{}@{} is {}", self.name, reference, commit.as_deref().unwrap_or("?"));
        self.reference = Some(reference);
        self.commit = commit;
        Ok(())
    }

    async fn read_manifest(&self, filename: &str) -> Result<String> {
        let path = self.checkout().await?.join(filename);
        tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))
    }

    async fn fetch(&self) -> Result<()> {
        let src = self.checkout().await?;
        let dst = self.target_path();
        tokio::task::spawn_blocking(move || copy_dir(&src, &dst, &[".git"])).await?
    }
}

/// Run git, returning stdout
async fn git(args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .await
        .context("Failed to execute git")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git {} failed: {}", args.first().unwrap_or(&""), stderr.trim());
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// (name, commit) pairs from `git ls-remote --tags --heads` output.
/// An annotated tag maps to the commit it points at.
fn parse_refs(output: &str) -> Vec<(String, String)> {
    let mut refs: Vec<(String, String)> = Vec::new();

    for line in output.lines() {
        let mut fields = line.split_whitespace();
        let (Some(commit), Some(name)) = (fields.next(), fields.next()) else {
            continue;
        };
        let Some(name) = name
            .strip_prefix("refs/tags/")
            .or_else(|| name.strip_prefix("refs/heads/"))
        else {
            continue;
        };

        match name.strip_suffix("^{}") {
            Some(tag) => match refs.iter_mut().find(|(n, _)| n == tag) {
                Some(entry) => entry.1 = commit.to_string(),
                None => refs.push((tag.to_string(), commit.to_string())),
            },
            None => refs.push((name.to_string(), commit.to_string())),
        }
    }

    refs
}

/// Convert a package name to an https remote, with credentials if given
///
/// - `github.com/user/repo`, `github:user/repo`, `user/repo` -> GitHub
/// - `gitlab:company/repo` -> GitLab
/// - `bitbucket:team/proj` -> Bitbucket
/// - full `http(s)://` and `file://` URLs are kept
pub fn remote_url(name: &str, credentials: Option<&Credentials>) -> String {
    let url = if ["http://", "https://", "file://"]
        .iter()
        .any(|scheme| name.starts_with(scheme))
    {
        name.to_string()
    } else if let Some(path) = name.strip_prefix("gitlab:") {
        format!("https://gitlab.com/{}.git", path)
    } else if let Some(path) = name.strip_prefix("bitbucket:") {
        format!("https://bitbucket.org/{}.git", path)
    } else {
        let path = name
            .strip_prefix("github.com/")
            .or_else(|| name.strip_prefix("github:"))
            .unwrap_or(name);
        format!("https://github.com/{}.git", path)
    };

    match credentials {
        Some(creds) => with_credentials(&url, creds),
        None => url,
    }
}

fn with_credentials(url: &str, creds: &Credentials) -> String {
    match url.split_once("://") {
        Some((scheme, rest)) if scheme.starts_with("http") && !rest.contains('@') => {
            format!("{}://{}:{}@{}", scheme, creds.user, creds.token, rest)
        }
        _ => url.to_string(),
    }
}
