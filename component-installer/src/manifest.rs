// Manifest parser - component.json

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Entry file used when a manifest has no `main`
pub const DEFAULT_MAIN: &str = "index.js";

/// Dependency name -> version spec (exact version, range, tag or branch)
pub type Dependencies = BTreeMap<String, String>;

/// Manifest structure (component.json)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub dependencies: Dependencies,

    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub development: Dependencies,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,
}

/// `null` reads the same as an absent field
fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Dependencies, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Dependencies>::deserialize(deserializer)?.unwrap_or_default())
}

impl Manifest {
    /// Parse a manifest from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.as_ref().display()))?;

        Self::from_str(&content)
            .with_context(|| format!("Invalid manifest {}", path.as_ref().display()))
    }

    /// Parse a manifest from file, treating a missing file as an empty manifest
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if !path.as_ref().exists() {
            log::debug!("no manifest at {}, assuming no dependencies", path.as_ref().display());
            return Ok(Self::default());
        }

        Self::from_file(path)
    }

    /// Parse a manifest from string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Failed to parse manifest JSON")
    }

    /// Dependencies to expand for this node.
    ///
    /// With `include_development`, `development` entries are merged over
    /// `dependencies`; on a name collision the development spec wins.
    pub fn dependencies_to_expand(&self, include_development: bool) -> Dependencies {
        if include_development {
            merge([&self.dependencies, &self.development])
        } else {
            self.dependencies.clone()
        }
    }

    /// Entry file, relative to the package root
    pub fn main(&self) -> &str {
        self.main.as_deref().unwrap_or(DEFAULT_MAIN)
    }
}

/// Shallow merge, later maps overwrite earlier ones
pub fn merge<'a, I>(maps: I) -> Dependencies
where
    I: IntoIterator<Item = &'a Dependencies>,
{
    maps.into_iter().fold(Dependencies::new(), |mut ret, map| {
        ret.extend(map.iter().map(|(k, v)| (k.clone(), v.clone())));
        ret
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_component_manifest() {
        let json = r#"{
            "name": "app",
            "dependencies": {
                "component/emitter": "1.1.2",
                "component/domify": "*"
            },
            "development": {
                "component/assert": "0.4.0"
            },
            "scripts": ["index.js"]
        }"#;

        let manifest = Manifest::from_str(json).unwrap();
        assert_eq!(manifest.name.as_deref(), Some("app"));
        assert_eq!(manifest.dependencies.len(), 2);
        assert_eq!(manifest.development["component/assert"], "0.4.0");
        assert_eq!(manifest.main(), "index.js");
    }

    #[test]
    fn test_missing_dependencies_is_empty() {
        let manifest = Manifest::from_str("{}").unwrap();
        assert!(manifest.dependencies.is_empty());
        assert!(manifest.dependencies_to_expand(true).is_empty());
    }

    #[test]
    fn test_null_dependencies_is_empty() {
        let manifest =
            Manifest::from_str(r#"{"dependencies": null, "development": null}"#).unwrap();
        assert!(manifest.dependencies.is_empty());
        assert!(manifest.development.is_empty());
        assert!(manifest.dependencies_to_expand(true).is_empty());
    }

    #[test]
    fn test_development_merge() {
        let manifest =
            Manifest::from_str(r#"{"dependencies":{"a":"1.0"},"development":{"b":"2.0"}}"#)
                .unwrap();

        let with_dev = manifest.dependencies_to_expand(true);
        assert_eq!(with_dev.keys().collect::<Vec<_>>(), vec!["a", "b"]);

        let without_dev = manifest.dependencies_to_expand(false);
        assert_eq!(without_dev.keys().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn test_development_overwrites_base_entry() {
        let manifest =
            Manifest::from_str(r#"{"dependencies":{"a":"1.0"},"development":{"a":"2.0"}}"#)
                .unwrap();

        assert_eq!(manifest.dependencies_to_expand(true)["a"], "2.0");
        assert_eq!(manifest.dependencies_to_expand(false)["a"], "1.0");
    }

    #[test]
    fn test_malformed_manifest() {
        assert!(Manifest::from_str("{ \"dependencies\": ").is_err());
        assert!(Manifest::from_str(r#"{"dependencies": ["a"]}"#).is_err());
    }

    #[test]
    fn test_custom_main() {
        let manifest = Manifest::from_str(r#"{"main": "lib/emitter.js"}"#).unwrap();
        assert_eq!(manifest.main(), "lib/emitter.js");
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = Manifest::from_file_or_default(dir.path().join("component.json")).unwrap();
        assert_eq!(manifest, Manifest::default());
    }
}
