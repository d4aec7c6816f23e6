// src/planner/signals.rs — Signal group catalog (static domain knowledge)

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::infra::config::PlannerConfig;
use crate::infra::errors::ForgeError;
use crate::infra::paths::{self, SIGNALS_SUFFIX};

/// Whether a signal is a fact to find or a hard-negative exclusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Fact,
    Exclusion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: String,
    pub description: String,
    #[serde(default = "default_kind")]
    pub kind: SignalKind,
}

fn default_kind() -> SignalKind {
    SignalKind::Fact
}

/// A named cluster of checkable facts a grader looks for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalGroup {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub signals: Vec<Signal>,
}

impl SignalGroup {
    pub fn facts(&self) -> impl Iterator<Item = &Signal> {
        self.signals.iter().filter(|s| s.kind == SignalKind::Fact)
    }

    pub fn exclusions(&self) -> impl Iterator<Item = &Signal> {
        self.signals
            .iter()
            .filter(|s| s.kind == SignalKind::Exclusion)
    }

    pub fn has_signals(&self) -> bool {
        !self.signals.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignalCatalog {
    #[serde(default)]
    pub target_id: Option<String>,
    #[serde(default)]
    pub groups: Vec<SignalGroup>,
}

impl SignalCatalog {
    /// Catalog location for `target_id`: the explicit path when given, else
    /// `{signals_dir}/{TARGET}.signals.json`.
    pub fn resolve_path(config: &PlannerConfig, target_id: &str, explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        let dir = config
            .signals_dir
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(paths::signals_dir);
        dir.join(format!("{}{SIGNALS_SUFFIX}", paths::file_stem_for(target_id)))
    }

    /// Load a catalog file. A missing file yields an empty catalog so the
    /// planner can take its legacy fallback path.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::warn!("Signal catalog {} not found", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let catalog: SignalCatalog = serde_json::from_str(&content)
            .map_err(|e| ForgeError::config(format!("{}: {e}", path.display())))?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn validate(&self) -> Result<(), ForgeError> {
        let mut seen = HashSet::new();
        for group in &self.groups {
            if group.id.trim().is_empty() {
                return Err(ForgeError::config("signal group with empty id"));
            }
            if !seen.insert(group.id.as_str()) {
                return Err(ForgeError::config(format!(
                    "duplicate signal group '{}'",
                    group.id
                )));
            }
        }
        Ok(())
    }

    /// Groups that can actually seed scenarios.
    pub fn usable_groups(&self) -> Vec<SignalGroup> {
        self.groups
            .iter()
            .filter(|g| g.has_signals())
            .cloned()
            .collect()
    }
}
