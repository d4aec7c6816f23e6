// src/curator/mod.rs — Golden-set curation
//
// Mines a full-pool evaluation report for its hardest failures and selects a
// small, archetype-diverse subset as the next evaluation level.

pub mod pool;

use chrono::Utc;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::Path;

use crate::core::state;
use crate::core::types::*;
use crate::infra::config::CurationConfig;
use crate::infra::errors::ForgeError;
use pool::CasePool;

#[derive(Debug, Clone, PartialEq)]
pub enum CurationOutcome {
    Curated(GoldenSet),
    /// The whole pool passed; the current level is mastered.
    ReadyForNextLevel { level: u32 },
}

/// A failing result paired with the archetype of its source case.
#[derive(Debug, Clone)]
pub struct FailureCandidate {
    pub test_id: String,
    pub archetype: String,
    pub weakest_recall: f64,
    pub rubric: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub test_ids: Vec<String>,
    pub backfilled: usize,
}

/// Hardest first: weakest recall ascending (no recall counts as 0.0), then
/// rubric score ascending, then test id.
pub fn hardest_first(a: &FailureCandidate, b: &FailureCandidate) -> Ordering {
    a.weakest_recall
        .total_cmp(&b.weakest_recall)
        .then(a.rubric.total_cmp(&b.rubric))
        .then_with(|| a.test_id.cmp(&b.test_id))
}

/// Diversity pass capped per archetype, then hardest-first backfill ignoring
/// the archetype cap, never exceeding `max_cases`.
pub fn select(mut candidates: Vec<FailureCandidate>, max_cases: usize, per_archetype_cap: usize) -> Selection {
    candidates.sort_by(hardest_first);

    let mut taken = vec![false; candidates.len()];
    let mut per_archetype: BTreeMap<&str, usize> = BTreeMap::new();
    let mut selection = Selection::default();

    for (i, c) in candidates.iter().enumerate() {
        if selection.test_ids.len() >= max_cases {
            break;
        }
        let count = per_archetype.entry(c.archetype.as_str()).or_insert(0);
        if *count < per_archetype_cap {
            *count += 1;
            taken[i] = true;
            selection.test_ids.push(c.test_id.clone());
        }
    }

    for (i, c) in candidates.iter().enumerate() {
        if selection.test_ids.len() >= max_cases {
            break;
        }
        if !taken[i] {
            selection.test_ids.push(c.test_id.clone());
            selection.backfilled += 1;
        }
    }

    selection
}

pub struct GoldenSetCurator {
    config: CurationConfig,
}

impl GoldenSetCurator {
    pub fn new(config: CurationConfig) -> Self {
        Self { config }
    }

    /// Build the next golden level from `report`'s failures. Selected cases
    /// are copied from `pool` unchanged; an id missing from the pool is an
    /// error.
    pub fn curate(
        &self,
        report: &EvalReport,
        report_path: &str,
        pool: &CasePool,
        previous_level: u32,
    ) -> anyhow::Result<CurationOutcome> {
        let failures: Vec<&EvalResult> = report
            .results
            .iter()
            .filter(|r| r.label == Label::Fail)
            .collect();

        if failures.is_empty() {
            tracing::info!(
                "No failures in {} case(s); level {} is ready for the next level",
                report.results.len(),
                previous_level
            );
            return Ok(CurationOutcome::ReadyForNextLevel {
                level: previous_level,
            });
        }

        let mut candidates = Vec::with_capacity(failures.len());
        for r in &failures {
            let case = pool.get(&r.test_id).ok_or_else(|| {
                ForgeError::config(format!("test id '{}' not found in case pool", r.test_id))
            })?;
            candidates.push(FailureCandidate {
                test_id: r.test_id.clone(),
                archetype: case.metadata.archetype.clone(),
                weakest_recall: r.weakest_recall().unwrap_or(0.0),
                rubric: r.scores.get(CRITERION_RUBRIC).copied().unwrap_or(0.0),
            });
        }

        let selection = select(candidates, self.config.max_cases, self.config.per_archetype_cap);

        let mut test_cases = Vec::with_capacity(selection.test_ids.len());
        let mut archetype_counts: BTreeMap<String, usize> = BTreeMap::new();
        for id in &selection.test_ids {
            if let Some(case) = pool.get(id) {
                *archetype_counts
                    .entry(case.metadata.archetype.clone())
                    .or_insert(0) += 1;
                test_cases.push(case.clone());
            }
        }

        if selection.backfilled > 0 {
            tracing::info!(
                "Backfilled {} case(s) beyond the per-archetype cap",
                selection.backfilled
            );
        }

        Ok(CurationOutcome::Curated(GoldenSet {
            level: previous_level + 1,
            scenario_count: test_cases.len(),
            test_cases,
            batch_plan: GoldenDescriptor {
                source_report: report_path.to_string(),
                prompt_version: report.metadata.prompt_version.clone(),
                failures_considered: failures.len(),
                archetype_counts,
                backfilled: selection.backfilled,
                curated_at: Utc::now(),
            },
        }))
    }
}

/// Level of the golden set at `path`; 0 when none has been written yet.
pub fn previous_level(path: &Path) -> anyhow::Result<u32> {
    if !path.exists() {
        return Ok(0);
    }
    let golden: GoldenSet = state::read_json(path)?;
    Ok(golden.level)
}

/// Rewrite the golden set file wholesale.
pub fn write_golden(path: &Path, golden: &GoldenSet) -> anyhow::Result<()> {
    state::write_json_atomic(path, golden)
}
