// src/campaign/manifest.rs — Campaign manifest (read-only input)

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use super::registry::Registry;
use crate::infra::errors::ForgeError;
use crate::planner::domains::resolve_domain;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeEntry {
    pub target_id: String,
    #[serde(alias = "track")]
    pub track_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignManifest {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub scope: Vec<ScopeEntry>,
}

impl CampaignManifest {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|_| ForgeError::MissingFile {
            path: path.to_path_buf(),
        })?;
        let manifest = serde_json::from_str(&content)
            .map_err(|e| ForgeError::config(format!("{}: {e}", path.display())))?;
        Ok(manifest)
    }

    /// Check the manifest against the registry before any work starts.
    /// Returns every problem found.
    pub fn problems(&self, registry: &Registry) -> Vec<String> {
        let mut problems = Vec::new();
        if self.id.trim().is_empty() {
            problems.push("manifest id is empty".to_string());
        }
        if self.scope.is_empty() {
            problems.push("manifest scope is empty".to_string());
        }

        let mut seen = HashSet::new();
        for entry in &self.scope {
            if !seen.insert(entry.target_id.as_str()) {
                problems.push(format!("target '{}' listed more than once", entry.target_id));
            }
            if registry.track(&entry.track_id).is_none() {
                problems.push(format!(
                    "target '{}' uses unknown track '{}'",
                    entry.target_id, entry.track_id
                ));
            }
            if let Err(e) = resolve_domain(&entry.target_id) {
                problems.push(e.to_string());
            }
        }
        problems
    }

    pub fn validate(&self, registry: &Registry) -> Result<(), ForgeError> {
        let problems = self.problems(registry);
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ForgeError::config(problems.join("; ")))
        }
    }
}
