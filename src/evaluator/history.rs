// src/evaluator/history.rs — Prompt version history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

use crate::core::state;

/// SHA-256 of the prompt text, hex-encoded.
pub fn prompt_version(prompt: &str) -> String {
    hex::encode(Sha256::digest(prompt.as_bytes()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptVersion {
    pub version: String,
    pub prompt_path: String,
    pub report_path: String,
    pub pass_rate: f64,
    pub accepted: bool,
    pub recorded_at: DateTime<Utc>,
}

/// Every evaluated prompt version, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptHistory {
    #[serde(default)]
    pub versions: Vec<PromptVersion>,
}

impl PromptHistory {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        state::read_json_or_default(path)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        state::write_json_atomic(path, self)
    }

    pub fn record(&mut self, entry: PromptVersion) {
        self.versions.push(entry);
    }

    /// The most recently recorded version that passed its quality gate.
    pub fn latest_accepted(&self) -> Option<&PromptVersion> {
        self.versions.iter().rev().find(|v| v.accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(version: &str, accepted: bool) -> PromptVersion {
        PromptVersion {
            version: version.into(),
            prompt_path: "p.md".into(),
            report_path: format!("{version}.report.json"),
            pass_rate: if accepted { 0.9 } else { 0.2 },
            accepted,
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn test_prompt_version_is_sha256() {
        assert_eq!(
            prompt_version(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_ne!(prompt_version("a"), prompt_version("b"));
    }

    #[test]
    fn test_latest_accepted_skips_rejected() {
        let mut h = PromptHistory::default();
        h.record(entry("v1", true));
        h.record(entry("v2", true));
        h.record(entry("v3", false));
        assert_eq!(h.latest_accepted().unwrap().version, "v2");
    }

    #[test]
    fn test_none_accepted() {
        let mut h = PromptHistory::default();
        h.record(entry("v1", false));
        assert!(h.latest_accepted().is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.json");
        assert!(PromptHistory::load(&path).unwrap().versions.is_empty());

        let mut h = PromptHistory::default();
        h.record(entry("v1", true));
        h.save(&path).unwrap();
        assert_eq!(PromptHistory::load(&path).unwrap(), h);
    }
}
