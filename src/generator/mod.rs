// src/generator/mod.rs — Case generator
//
// Expands plan scenarios into concrete test cases with one model call per
// sub-batch. The model output is untrusted: ids, target, batch index, seed
// and timestamps are always re-stamped here.

pub mod prompt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::state;
use crate::core::types::*;
use crate::infra::config::{GenerationConfig, ModelConfig};
use crate::infra::errors::ForgeError;
use crate::infra::paths;
use crate::planner::strategy::BatchStrategy;
use crate::provider::json::parse_model_json;
use crate::provider::{ChatRequest, Message, ModelProvider};

pub const GENERATOR_VERSION: &str = concat!("caseforge-", env!("CARGO_PKG_VERSION"));

/// Typed shape of the generation response.
#[derive(Debug, Deserialize)]
struct GenerationResponse {
    test_cases: Vec<GeneratedCase>,
}

#[derive(Debug, Deserialize)]
struct GeneratedCase {
    #[serde(default)]
    scenario_ref: Option<String>,
    narrative: String,
    #[serde(default)]
    must_find: Vec<String>,
    #[serde(default)]
    title: Option<String>,
}

/// One generated sub-batch.
#[derive(Debug, Clone)]
pub struct CaseBatch {
    pub target_id: String,
    pub batch_index: u32,
    pub seed: Option<u64>,
    pub cases: Vec<TestCase>,
    pub dropped_must_find: usize,
}

/// Sidecar written next to every batch file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchMeta {
    pub target_id: String,
    pub batch_index: u32,
    pub seed: Option<u64>,
    pub case_count: usize,
    pub scenario_refs: Vec<String>,
    pub model: String,
    pub generator_version: String,
    pub dropped_must_find: usize,
    pub generated_at: chrono::DateTime<Utc>,
}

/// Outcome of a multi-batch run.
#[derive(Debug, Default)]
pub struct GenerationSummary {
    pub written: Vec<PathBuf>,
    pub failed: Vec<(u32, String)>,
    pub total_cases: usize,
}

pub struct CaseGenerator {
    provider: Arc<dyn ModelProvider>,
    model: ModelConfig,
    config: GenerationConfig,
    required_fields: Vec<String>,
    on_progress: Option<Box<dyn Fn(ProgressEvent) + Send + Sync>>,
}

impl CaseGenerator {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        model: ModelConfig,
        config: GenerationConfig,
        required_fields: Vec<String>,
    ) -> Self {
        Self {
            provider,
            model,
            config,
            required_fields,
            on_progress: None,
        }
    }

    pub fn with_progress(mut self, cb: impl Fn(ProgressEvent) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Box::new(cb));
        self
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(ref cb) = self.on_progress {
            cb(event);
        }
    }

    /// Generate one sub-batch. Any malformed response fails the whole batch.
    pub async fn generate_batch(
        &self,
        plan: &BatchPlan,
        batch_index: u32,
        scenarios: &[ScenarioSpec],
        seed: Option<u64>,
    ) -> Result<CaseBatch, ForgeError> {
        if scenarios.is_empty() {
            return Err(ForgeError::generation(batch_index, "no scenarios in batch"));
        }

        let prompt = prompt::build_prompt(
            &plan.target_id,
            &plan.domain,
            batch_index,
            scenarios,
            seed,
            &self.config,
        )
        .map_err(|e| ForgeError::generation(batch_index, format!("prompt render: {e}")))?;

        tracing::debug!(
            "Requesting {} case(s) for batch {} of {}",
            scenarios.len(),
            batch_index,
            plan.target_id
        );

        let response = self
            .provider
            .chat(ChatRequest {
                model: self.model.id.clone(),
                messages: vec![Message::user(prompt.user)],
                max_tokens: Some(self.model.max_tokens),
                temperature: Some(self.model.temperature),
                system: Some(prompt.system),
            })
            .await
            .map_err(|e| ForgeError::generation(batch_index, e.to_string()))?;

        if response.content.trim().is_empty() {
            return Err(ForgeError::generation(batch_index, "empty response"));
        }

        let parsed: GenerationResponse = parse_model_json(&response.content)
            .map_err(|e| ForgeError::generation(batch_index, e.to_string()))?;
        if parsed.test_cases.is_empty() {
            return Err(ForgeError::generation(batch_index, "response has no test_cases"));
        }

        Ok(self.restamp(plan, batch_index, scenarios, seed, parsed.test_cases))
    }

    /// Rebuild every case around canonical identifiers and plan-side metadata.
    fn restamp(
        &self,
        plan: &BatchPlan,
        batch_index: u32,
        scenarios: &[ScenarioSpec],
        seed: Option<u64>,
        generated: Vec<GeneratedCase>,
    ) -> CaseBatch {
        if generated.len() > scenarios.len() {
            tracing::warn!(
                "Batch {}: model returned {} case(s) for {} scenario(s); extras dropped",
                batch_index,
                generated.len(),
                scenarios.len()
            );
        }

        let generated_at = Utc::now();
        let mut dropped = 0usize;
        let mut cases = Vec::with_capacity(scenarios.len());

        let mut claimed = vec![false; scenarios.len()];
        for (position, raw) in generated.into_iter().take(scenarios.len()).enumerate() {
            let idx =
                claim_scenario(scenarios, &mut claimed, raw.scenario_ref.as_deref(), position);
            if let Some(r) = raw.scenario_ref.as_deref() {
                if scenarios[idx].id != r {
                    tracing::warn!(
                        "Batch {}: case {} echoed unknown or already used scenario {}; assigned {}",
                        batch_index,
                        position + 1,
                        r,
                        scenarios[idx].id
                    );
                }
            }
            let scenario = &scenarios[idx];

            let (must_find, lost) =
                verbatim_must_find(&raw.narrative, raw.must_find, self.config.max_must_find);
            if lost > 0 {
                tracing::warn!(
                    "Batch {}: dropped {} must-find string(s) not found verbatim for {}",
                    batch_index,
                    lost,
                    scenario.id
                );
                dropped += lost;
            }

            cases.push(TestCase {
                test_id: canonical_test_id(&plan.target_id, batch_index, position + 1),
                target_id: plan.target_id.clone(),
                narrative_payload: NarrativePayload {
                    narrative: raw.narrative,
                    title: raw.title,
                },
                expectations: Expectations {
                    must_find,
                    required_fields: self.required_fields.clone(),
                },
                metadata: CaseMetadata {
                    generated_at,
                    batch_index,
                    scenario_ref: scenario.id.clone(),
                    seed,
                    archetype: scenario.archetype.clone(),
                    intent: scenario.intent,
                    generator_version: GENERATOR_VERSION.to_string(),
                },
            });
        }

        CaseBatch {
            target_id: plan.target_id.clone(),
            batch_index,
            seed,
            cases,
            dropped_must_find: dropped,
        }
    }

    /// Write the batch file and its sidecar. Returns the batch file path.
    pub fn write_batch(&self, out_dir: &Path, batch: &CaseBatch) -> anyhow::Result<PathBuf> {
        let cases_path = out_dir.join(paths::batch_file_name(&batch.target_id, batch.batch_index));
        state::write_json_atomic(&cases_path, &batch.cases)?;

        let meta = BatchMeta {
            target_id: batch.target_id.clone(),
            batch_index: batch.batch_index,
            seed: batch.seed,
            case_count: batch.cases.len(),
            scenario_refs: batch
                .cases
                .iter()
                .map(|c| c.metadata.scenario_ref.clone())
                .collect(),
            model: self.model.id.clone(),
            generator_version: GENERATOR_VERSION.to_string(),
            dropped_must_find: batch.dropped_must_find,
            generated_at: Utc::now(),
        };
        let meta_path =
            out_dir.join(paths::batch_meta_file_name(&batch.target_id, batch.batch_index));
        state::write_json_atomic(&meta_path, &meta)?;

        Ok(cases_path)
    }

    /// Generate every batch of `strategy` (or only `only_batch`). A failed batch
    /// is recorded and skipped; written batches stay on disk.
    pub async fn generate_all(
        &self,
        plan: &BatchPlan,
        strategy: &BatchStrategy,
        out_dir: &Path,
        seed: Option<u64>,
        only_batch: Option<u32>,
    ) -> anyhow::Result<GenerationSummary> {
        let mut summary = GenerationSummary::default();

        let batches: Vec<_> = match only_batch {
            Some(n) => vec![strategy
                .batch(n)
                .ok_or_else(|| ForgeError::config(format!("plan has no batch {n}")))?],
            None => strategy.batches.iter().collect(),
        };

        for spec in batches {
            let scenarios: Vec<ScenarioSpec> = spec
                .scenario_ids
                .iter()
                .filter_map(|id| plan.find_scenario(id).cloned())
                .collect();
            if scenarios.len() != spec.scenario_ids.len() {
                return Err(ForgeError::config(format!(
                    "strategy batch {} references scenarios missing from the plan",
                    spec.index
                ))
                .into());
            }

            let batch_seed = seed.map(|s| s.wrapping_add(u64::from(spec.index)));
            match self.generate_batch(plan, spec.index, &scenarios, batch_seed).await {
                Ok(batch) => {
                    let path = self.write_batch(out_dir, &batch)?;
                    tracing::info!("Wrote {} case(s) to {}", batch.cases.len(), path.display());
                    self.emit(ProgressEvent::BatchGenerated {
                        batch_index: spec.index,
                        cases: batch.cases.len(),
                    });
                    summary.total_cases += batch.cases.len();
                    summary.written.push(path);
                }
                Err(e) => {
                    tracing::error!("{}", e);
                    self.emit(ProgressEvent::BatchFailed {
                        batch_index: spec.index,
                        message: e.to_string(),
                    });
                    summary.failed.push((spec.index, e.to_string()));
                }
            }
        }

        Ok(summary)
    }
}

/// Pick the scenario a generated case belongs to. An echoed ref wins only
/// when it names an unclaimed scenario; otherwise the positional scenario is
/// used, or the first unclaimed one if that is taken. `claimed` must be as
/// long as `scenarios` and hold at least one `false`.
fn claim_scenario(
    scenarios: &[ScenarioSpec],
    claimed: &mut [bool],
    requested: Option<&str>,
    position: usize,
) -> usize {
    let echoed = requested.and_then(|r| {
        scenarios
            .iter()
            .position(|s| s.id == r)
            .filter(|&i| !claimed[i])
    });
    let idx = echoed
        .or_else(|| Some(position).filter(|&i| i < claimed.len() && !claimed[i]))
        .or_else(|| claimed.iter().position(|c| !c))
        .unwrap_or(position);
    claimed[idx] = true;
    idx
}

/// Keep must-find strings that occur verbatim in the narrative, deduplicated
/// and truncated to `max`. Returns the kept list and how many were dropped.
pub fn verbatim_must_find(narrative: &str, candidates: Vec<String>, max: usize) -> (Vec<String>, usize) {
    let mut kept: Vec<String> = Vec::new();
    let mut dropped = 0usize;
    for candidate in candidates {
        let c = candidate.trim();
        if c.is_empty() || !narrative.contains(c) {
            dropped += 1;
            continue;
        }
        if !kept.iter().any(|k| k == c) {
            kept.push(c.to_string());
        }
    }
    kept.truncate(max);
    (kept, dropped)
}

/// Read a batch file back as written.
pub fn load_batch(path: &Path) -> anyhow::Result<Vec<TestCase>> {
    state::read_json(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbatim_must_find_filters() {
        let narrative = "Patient returned to OR on day 3 with a positive wound culture.";
        let (kept, dropped) = verbatim_must_find(
            narrative,
            vec![
                "returned to OR".into(),
                "positive wound culture".into(),
                "sepsis".into(),
                " returned to OR ".into(),
                "".into(),
            ],
            5,
        );
        assert_eq!(kept, vec!["returned to OR", "positive wound culture"]);
        assert_eq!(dropped, 2);
    }

    #[test]
    fn test_verbatim_must_find_truncates() {
        let narrative = "a b c d e f g";
        let (kept, dropped) = verbatim_must_find(
            narrative,
            ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect(),
            2,
        );
        assert_eq!(kept, vec!["a", "b"]);
        assert_eq!(dropped, 0);
    }

    #[test]
    fn test_response_shape_rejects_missing_list() {
        let r = parse_model_json::<GenerationResponse>("{\"cases\": []}");
        assert!(r.is_err());
    }

    #[test]
    fn test_response_shape_accepts_minimal_case() {
        let r: GenerationResponse =
            parse_model_json("{\"test_cases\": [{\"narrative\": \"text\"}]}").unwrap();
        assert_eq!(r.test_cases.len(), 1);
        assert!(r.test_cases[0].must_find.is_empty());
    }

    fn scenario(id: &str) -> ScenarioSpec {
        ScenarioSpec {
            id: id.into(),
            description: String::new(),
            archetype: "handoff".into(),
            intent: IntentSlice::Knowledge,
            task: DownstreamTask::EventSummary,
            signal_group: "rhythm".into(),
            perturbations: vec![],
        }
    }

    #[test]
    fn test_duplicate_scenario_ref_is_not_claimed_twice() {
        let scenarios = vec![scenario("S1"), scenario("S2"), scenario("S3")];
        let mut claimed = vec![false; 3];
        assert_eq!(claim_scenario(&scenarios, &mut claimed, Some("S1"), 0), 0);
        assert_eq!(claim_scenario(&scenarios, &mut claimed, Some("S1"), 1), 1);
        assert_eq!(claim_scenario(&scenarios, &mut claimed, Some("nope"), 2), 2);
        assert_eq!(claimed, vec![true, true, true]);
    }

    #[test]
    fn test_taken_position_falls_back_to_first_unclaimed() {
        let scenarios = vec![scenario("S1"), scenario("S2"), scenario("S3")];
        let mut claimed = vec![false; 3];
        assert_eq!(claim_scenario(&scenarios, &mut claimed, Some("S2"), 0), 1);
        assert_eq!(claim_scenario(&scenarios, &mut claimed, None, 1), 0);
        assert_eq!(claim_scenario(&scenarios, &mut claimed, Some("S3"), 2), 2);
    }

    #[test]
    fn test_generator_version_prefix() {
        assert!(GENERATOR_VERSION.starts_with("caseforge-"));
    }
}
