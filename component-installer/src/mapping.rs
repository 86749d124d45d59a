// Mapping recorder: parent node -> ordered direct dependency slugs (mapping.json)

use anyhow::Context;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Parent identifier of the root manifest
pub const ROOT: &str = ".";

/// Tree-shape document as persisted to `mapping.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mapping(pub BTreeMap<String, Vec<String>>);

impl Mapping {
    pub fn get(&self, parent: &str) -> Option<&[String]> {
        self.0.get(parent).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Load a previously persisted mapping
    pub async fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.as_ref().display()))?;

        serde_json::from_str(&content).context("Failed to parse mapping JSON")
    }

    /// Write the mapping as pretty-printed JSON, creating parent directories
    pub async fn to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize mapping")?;

        if let Some(parent) = path.as_ref().parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        tokio::fs::write(&path, content)
            .await
            .with_context(|| format!("Failed to write {}", path.as_ref().display()))?;

        Ok(())
    }
}

/// Accumulates one entry per expanded manifest node.
///
/// Safe to share across concurrent expansions; writes to distinct parents
/// never contend on the same shard entry.
#[derive(Clone, Default)]
pub struct MappingRecorder {
    entries: Arc<DashMap<String, Vec<String>>>,
}

impl MappingRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the direct dependency slugs of `parent`, in edge order.
    /// A second write for the same parent replaces the first.
    pub fn record(&self, parent: &str, slugs: Vec<String>) {
        if let Some(previous) = self.entries.insert(parent.to_string(), slugs) {
            log::debug!("mapping for {} rewritten ({} edges before)", parent, previous.len());
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot the recorded entries as a document with sorted keys
    pub fn to_mapping(&self) -> Mapping {
        Mapping(
            self.entries
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().clone()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_keeps_duplicate_edges() {
        let recorder = MappingRecorder::new();
        recorder.record(ROOT, vec!["a@1.0.0".to_string(), "b@1.0.0".to_string()]);
        recorder.record("a@1.0.0", vec!["c@1.0.0".to_string()]);
        recorder.record("b@1.0.0", vec!["c@1.0.0".to_string()]);

        let mapping = recorder.to_mapping();
        assert_eq!(mapping.len(), 3);
        assert_eq!(mapping.get("a@1.0.0"), mapping.get("b@1.0.0"));
        assert_eq!(mapping.get(ROOT).map(|s| s.len()), Some(2));
    }

    #[test]
    fn test_serializes_as_plain_object() {
        let recorder = MappingRecorder::new();
        recorder.record(ROOT, Vec::new());

        let json = serde_json::to_string(&recorder.to_mapping()).unwrap();
        assert_eq!(json, r#"{".":[]}"#);
    }

    #[tokio::test]
    async fn test_persist_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("components").join("mapping.json");

        let recorder = MappingRecorder::new();
        recorder.record(ROOT, vec!["a@1.0.0".to_string()]);
        recorder.record("a@1.0.0", Vec::new());

        let mapping = recorder.to_mapping();
        mapping.to_file(&path).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\n  \".\": [\n    \"a@1.0.0\"\n  ]"));
        assert_eq!(Mapping::from_file(&path).await.unwrap(), mapping);
    }
}
