// src/core/types.rs — Core domain types shared across pipeline stages

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ─── Scenarios & plans ──────────────────────────────────────────────────────

/// One of the four fixed scenario categories used to balance coverage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentSlice {
    Knowledge,
    Ambiguity,
    Safety,
    Synthesis,
}

impl IntentSlice {
    pub const ALL: [IntentSlice; 4] = [
        IntentSlice::Knowledge,
        IntentSlice::Ambiguity,
        IntentSlice::Safety,
        IntentSlice::Synthesis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Knowledge => "knowledge",
            Self::Ambiguity => "ambiguity",
            Self::Safety => "safety",
            Self::Synthesis => "synthesis",
        }
    }

    /// Scenarios per (task, slice) when planning from signal groups.
    pub fn target_count(&self) -> usize {
        match self {
            Self::Knowledge => 20,
            Self::Ambiguity => 15,
            Self::Safety => 10,
            Self::Synthesis => 5,
        }
    }

    /// Scenarios per (task, slice) when falling back to a legacy planning input.
    pub fn legacy_target_count(&self) -> usize {
        match self {
            Self::Knowledge => 4,
            Self::Ambiguity => 3,
            Self::Safety => 2,
            Self::Synthesis => 1,
        }
    }
}

impl std::fmt::Display for IntentSlice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Downstream review tasks every plan must cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownstreamTask {
    EventSummary,
    SignalEnrichment,
    ReviewerQuestions,
}

impl DownstreamTask {
    pub const ALL: [DownstreamTask; 3] = [
        DownstreamTask::EventSummary,
        DownstreamTask::SignalEnrichment,
        DownstreamTask::ReviewerQuestions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EventSummary => "event_summary",
            Self::SignalEnrichment => "signal_enrichment",
            Self::ReviewerQuestions => "reviewer_questions",
        }
    }
}

impl std::fmt::Display for DownstreamTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deliberate ambiguity or adversarial modification applied to a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Perturbation {
    Conflict,
    MissingData,
    Distractor,
}

impl Perturbation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Conflict => "conflict",
            Self::MissingData => "missing_data",
            Self::Distractor => "distractor",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSpec {
    pub id: String,
    pub description: String,
    pub archetype: String,
    pub intent: IntentSlice,
    pub task: DownstreamTask,
    pub signal_group: String,
    #[serde(default)]
    pub perturbations: Vec<Perturbation>,
}

impl ScenarioSpec {
    /// A scenario counts toward the doubt ratio iff it carries a perturbation.
    pub fn is_doubt(&self) -> bool {
        !self.perturbations.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageGoals {
    pub min_scenarios: usize,
    pub doubt_ratio: f64,
    pub slice_targets: BTreeMap<IntentSlice, usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanSource {
    SignalGroups,
    LegacyFallback,
}

/// A slice that could not be fully populated within the attempt bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliceShortfall {
    pub task: DownstreamTask,
    pub intent: IntentSlice,
    pub requested: usize,
    pub produced: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchPlan {
    pub target_id: String,
    pub domain: String,
    pub scenarios: Vec<ScenarioSpec>,
    pub coverage_goals: CoverageGoals,
    pub source: PlanSource,
    #[serde(default)]
    pub shortfalls: Vec<SliceShortfall>,
    pub generated_at: DateTime<Utc>,
}

impl BatchPlan {
    pub fn slice_counts(&self) -> BTreeMap<IntentSlice, usize> {
        let mut counts = BTreeMap::new();
        for s in &self.scenarios {
            *counts.entry(s.intent).or_insert(0) += 1;
        }
        counts
    }

    pub fn doubt_count(&self) -> usize {
        self.scenarios.iter().filter(|s| s.is_doubt()).count()
    }

    pub fn realized_doubt_ratio(&self) -> f64 {
        if self.scenarios.is_empty() {
            return 0.0;
        }
        self.doubt_count() as f64 / self.scenarios.len() as f64
    }

    /// Rounding tolerance: one scenario's worth of ratio.
    pub fn doubt_tolerance(&self) -> f64 {
        1.0 / self.scenarios.len().max(1) as f64
    }

    pub fn find_scenario(&self, id: &str) -> Option<&ScenarioSpec> {
        self.scenarios.iter().find(|s| s.id == id)
    }
}

// ─── Test cases ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativePayload {
    pub narrative: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expectations {
    #[serde(default)]
    pub must_find: Vec<String>,
    #[serde(default)]
    pub required_fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseMetadata {
    pub generated_at: DateTime<Utc>,
    pub batch_index: u32,
    pub scenario_ref: String,
    pub seed: Option<u64>,
    pub archetype: String,
    pub intent: IntentSlice,
    pub generator_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub test_id: String,
    pub target_id: String,
    pub narrative_payload: NarrativePayload,
    pub expectations: Expectations,
    pub metadata: CaseMetadata,
}

/// Canonical test identifier: `{target}-BATCH{n}-{ordinal:03}`, ordinal 1-based.
pub fn canonical_test_id(target_id: &str, batch_index: u32, ordinal: usize) -> String {
    format!("{target_id}-BATCH{batch_index}-{ordinal:03}")
}

// ─── Evaluation ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    Pass,
    Fail,
    Ambiguous,
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(match self {
            Label::Pass => "PASS",
            Label::Fail => "FAIL",
            Label::Ambiguous => "AMBIGUOUS",
        })
    }
}

pub const CRITERION_RECALL: &str = "must_find_recall";
pub const CRITERION_FIELDS: &str = "required_fields";
pub const CRITERION_RUBRIC: &str = "rubric_quality";

/// How a criterion participates in grading and curation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CriterionKind {
    Recall,
    Structural,
    Rubric,
}

pub fn criterion_kind(name: &str) -> CriterionKind {
    match name {
        CRITERION_RUBRIC => CriterionKind::Rubric,
        n if n.ends_with("recall") => CriterionKind::Recall,
        _ => CriterionKind::Structural,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GradingDetails {
    #[serde(default)]
    pub missing_substrings: Vec<String>,
    #[serde(default)]
    pub missing_fields: Vec<String>,
    #[serde(default)]
    pub rubric_reasoning: Option<String>,
    #[serde(default)]
    pub low_quality: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalResult {
    pub test_id: String,
    pub target_id: String,
    pub label: Label,
    pub scores: BTreeMap<String, f64>,
    pub grading_details: GradingDetails,
    pub engine_output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EvalResult {
    /// Unweighted mean of all criterion scores (0.0 when none were recorded).
    pub fn composite_score(&self) -> f64 {
        if self.scores.is_empty() {
            return 0.0;
        }
        self.scores.values().sum::<f64>() / self.scores.len() as f64
    }

    /// Weakest recall-type score; `None` when no recall criterion was evaluated.
    pub fn weakest_recall(&self) -> Option<f64> {
        self.scores
            .iter()
            .filter(|(name, _)| criterion_kind(name) == CriterionKind::Recall)
            .map(|(_, s)| *s)
            .reduce(f64::min)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub run_id: String,
    pub target_id: String,
    pub prompt_path: String,
    pub prompt_version: String,
    pub model: String,
    pub judge_model: String,
    pub cases_source: String,
    pub rubric_threshold: f64,
    pub min_pass_rate: f64,
    pub gate_passed: bool,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Graded cases (Pass + Fail). Ambiguous cases are counted separately.
    pub total_cases: usize,
    pub pass_count: usize,
    pub fail_count: usize,
    pub ambiguous_count: usize,
    pub pass_rate: f64,
    pub avg_scores: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalReport {
    pub metadata: ReportMetadata,
    pub summary: ReportSummary,
    pub results: Vec<EvalResult>,
}

// ─── Golden sets ────────────────────────────────────────────────────────────

/// Describes where a golden set came from and how it was assembled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoldenDescriptor {
    pub source_report: String,
    pub prompt_version: String,
    pub failures_considered: usize,
    pub archetype_counts: BTreeMap<String, usize>,
    pub backfilled: usize,
    pub curated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoldenSet {
    pub level: u32,
    pub scenario_count: usize,
    pub test_cases: Vec<TestCase>,
    pub batch_plan: GoldenDescriptor,
}

// ─── Progress ───────────────────────────────────────────────────────────────

/// Progress events emitted by long-running stages.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    BatchGenerated {
        batch_index: u32,
        cases: usize,
    },
    BatchFailed {
        batch_index: u32,
        message: String,
    },
    CaseGraded {
        index: usize,
        total: usize,
        test_id: String,
        label: Label,
        composite: f64,
    },
    FlightStarted {
        target_id: String,
        track_id: String,
        steps: usize,
    },
    StepFinished {
        target_id: String,
        step: String,
        ok: bool,
    },
    FlightFinished {
        target_id: String,
        status: String,
    },
}
