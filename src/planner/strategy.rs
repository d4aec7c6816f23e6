// src/planner/strategy.rs — Batch strategy derivation and the strategy registry

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::core::state;
use crate::core::types::BatchPlan;
use crate::infra::errors::ForgeError;

/// One generation sub-batch: 1-based index plus the scenarios it covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSpec {
    pub index: u32,
    pub scenario_ids: Vec<String>,
}

/// How a plan's scenarios are split into generation sub-batches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchStrategy {
    pub target_id: String,
    pub plan_path: String,
    pub batch_size: usize,
    pub batches: Vec<BatchSpec>,
    pub derived_at: DateTime<Utc>,
}

impl BatchStrategy {
    pub fn batch(&self, index: u32) -> Option<&BatchSpec> {
        self.batches.iter().find(|b| b.index == index)
    }

    pub fn scenario_count(&self) -> usize {
        self.batches.iter().map(|b| b.scenario_ids.len()).sum()
    }
}

/// Chunk the plan's scenarios, in plan order, into batches of `batch_size`.
pub fn derive_strategy(
    plan: &BatchPlan,
    plan_path: &Path,
    batch_size: usize,
) -> Result<BatchStrategy, ForgeError> {
    if batch_size == 0 {
        return Err(ForgeError::config("batch size must be > 0"));
    }

    let batches = plan
        .scenarios
        .chunks(batch_size)
        .enumerate()
        .map(|(i, chunk)| BatchSpec {
            index: i as u32 + 1,
            scenario_ids: chunk.iter().map(|s| s.id.clone()).collect(),
        })
        .collect();

    Ok(BatchStrategy {
        target_id: plan.target_id.clone(),
        plan_path: plan_path.display().to_string(),
        batch_size,
        batches,
        derived_at: Utc::now(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyEntry {
    pub strategy_path: String,
    pub plan_path: String,
    pub batch_count: usize,
    pub recorded_at: DateTime<Utc>,
}

/// Latest strategy per target. Read-modify-written wholesale; concurrent
/// writers against the same file are not handled.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyRegistry {
    #[serde(default)]
    pub targets: BTreeMap<String, StrategyEntry>,
    #[serde(skip)]
    path: PathBuf,
}

impl StrategyRegistry {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut registry: StrategyRegistry = state::read_json_or_default(path)?;
        registry.path = path.to_path_buf();
        Ok(registry)
    }

    pub fn record(&mut self, strategy: &BatchStrategy, strategy_path: &Path) {
        self.targets.insert(
            strategy.target_id.clone(),
            StrategyEntry {
                strategy_path: strategy_path.display().to_string(),
                plan_path: strategy.plan_path.clone(),
                batch_count: strategy.batches.len(),
                recorded_at: Utc::now(),
            },
        );
    }

    pub fn get(&self, target_id: &str) -> Option<&StrategyEntry> {
        self.targets.get(target_id)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        state::write_json_atomic(&self.path, self)
    }
}
