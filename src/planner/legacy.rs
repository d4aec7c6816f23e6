// src/planner/legacy.rs — Legacy planning-input format used for fallback plans

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::domains::DomainInfo;
use crate::infra::errors::ForgeError;

/// The older single-metric planning input. When no signal groups exist for
/// a target, a small generic scenario set is derived from one of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyPlanningInput {
    pub planning_id: String,
    pub concern: String,
    pub intent: String,
    #[serde(default)]
    pub target_population: Option<String>,
    #[serde(default)]
    pub specific_requirements: Vec<String>,
}

impl LegacyPlanningInput {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|_| ForgeError::MissingFile {
            path: path.to_path_buf(),
        })?;
        let input = serde_json::from_str(&content)
            .map_err(|e| ForgeError::config(format!("{}: {e}", path.display())))?;
        Ok(input)
    }

    /// The default input synthesized for a metric when nothing else is available.
    pub fn default_for(target_id: &str, domain: &DomainInfo, date_stamp: &str) -> Self {
        let sanitized = target_id.replace('.', "_").to_uppercase();
        Self {
            planning_id: format!("bulk-{}-{date_stamp}", sanitized.to_lowercase()),
            concern: target_id.to_string(),
            intent: format!("Automated abstraction for USNWR metric {target_id}"),
            target_population: Some("Pediatric patients".into()),
            specific_requirements: vec![format!(
                "USNWR {} quality metric reporting",
                domain.name
            )],
        }
    }

    /// Requirements to rotate through; never empty.
    pub fn requirements(&self) -> Vec<String> {
        let reqs: Vec<String> = self
            .specific_requirements
            .iter()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect();
        if reqs.is_empty() {
            vec![self.concern.clone()]
        } else {
            reqs
        }
    }
}
