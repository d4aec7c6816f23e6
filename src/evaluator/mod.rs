// src/evaluator/mod.rs — Evaluation runner
//
// For each case: run the engine under test, apply the deterministic checks,
// then grade with an independent rubric call. Failures are recovered per
// case and recorded on the result.

pub mod checks;
pub mod engine;
pub mod history;
pub mod judge;
pub mod parser;
pub mod report;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::core::types::*;
use crate::infra::errors::ForgeError;
use crate::infra::paths::CASES_SUFFIX;
use engine::Engine;
use judge::RubricJudge;

pub struct EvaluationRunner {
    engine: Arc<dyn Engine>,
    judge: RubricJudge,
    rubric_threshold: f64,
    on_progress: Option<Box<dyn Fn(ProgressEvent) + Send + Sync>>,
}

impl EvaluationRunner {
    pub fn new(engine: Arc<dyn Engine>, judge: RubricJudge, rubric_threshold: f64) -> Self {
        Self {
            engine,
            judge,
            rubric_threshold,
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

    /// Evaluate every case sequentially.
    pub async fn run(&self, cases: &[TestCase]) -> Vec<EvalResult> {
        let mut results = Vec::with_capacity(cases.len());
        for (i, case) in cases.iter().enumerate() {
            let result = self.evaluate_case(case).await;
            self.emit(ProgressEvent::CaseGraded {
                index: i + 1,
                total: cases.len(),
                test_id: result.test_id.clone(),
                label: result.label,
                composite: result.composite_score(),
            });
            results.push(result);
        }
        results
    }

    /// Grade one case. Never fails: errors end up on the result.
    pub async fn evaluate_case(&self, case: &TestCase) -> EvalResult {
        let (output, engine_error) = match self.engine.run(case).await {
            Ok(out) => (out, None),
            Err(e) => {
                tracing::warn!("Engine '{}' failed on {}: {}", self.engine.name(), case.test_id, e);
                (String::new(), Some(e))
            }
        };

        let mut scores = BTreeMap::new();
        let mut details = GradingDetails::default();
        let mut deterministic_pass = true;

        let recall = checks::must_find_recall(&output, &case.expectations.must_find);
        if let Some(s) = recall.score {
            scores.insert(CRITERION_RECALL.to_string(), s);
        }
        deterministic_pass &= recall.passed();
        details.missing_substrings = recall.missing;

        let fields = checks::required_fields(&output, &case.expectations.required_fields);
        if let Some(s) = fields.score {
            scores.insert(CRITERION_FIELDS.to_string(), s);
        }
        deterministic_pass &= fields.passed();
        details.missing_fields = fields.missing;

        if let Some(e) = engine_error {
            return EvalResult {
                test_id: case.test_id.clone(),
                target_id: case.target_id.clone(),
                label: Label::Fail,
                scores,
                grading_details: details,
                engine_output: output,
                error: Some(e.to_string()),
            };
        }

        let (label, error) = match self.judge.grade(case, &output).await {
            Ok(grade) => {
                scores.insert(CRITERION_RUBRIC.to_string(), grade.score);
                details.rubric_reasoning = Some(grade.reasoning);
                details.low_quality = grade.low_quality;
                let pass = deterministic_pass && grade.score >= self.rubric_threshold;
                (if pass { Label::Pass } else { Label::Fail }, None)
            }
            Err(e) => {
                tracing::warn!("{}", e);
                (Label::Ambiguous, Some(e.to_string()))
            }
        };

        EvalResult {
            test_id: case.test_id.clone(),
            target_id: case.target_id.clone(),
            label,
            scores,
            grading_details: details,
            engine_output: output,
            error,
        }
    }
}

/// Load every `*.cases.json` file under `dir` for `target_id`, ordered by
/// test id.
pub fn load_cases(dir: &Path, target_id: &str) -> anyhow::Result<Vec<TestCase>> {
    if !dir.is_dir() {
        return Err(ForgeError::MissingFile {
            path: dir.to_path_buf(),
        }
        .into());
    }
    let pattern = dir.join(format!("*{CASES_SUFFIX}"));
    let mut cases = Vec::new();
    for entry in glob::glob(&pattern.to_string_lossy())? {
        let path = entry?;
        let batch: Vec<TestCase> = crate::core::state::read_json(&path)?;
        cases.extend(batch.into_iter().filter(|c| c.target_id == target_id));
    }
    cases.sort_by(|a, b| a.test_id.cmp(&b.test_id));
    Ok(cases)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;

    use crate::provider::{ChatRequest, ChatResponse, ModelProvider, StopReason, TokenUsage};

    struct FixedEngine(Result<String, String>);

    #[async_trait]
    impl Engine for FixedEngine {
        fn name(&self) -> &str {
            "fixed"
        }
        async fn run(&self, _case: &TestCase) -> Result<String, ForgeError> {
            self.0.clone().map_err(ForgeError::config)
        }
    }

    struct JudgeReply(Option<&'static str>);

    #[async_trait]
    impl ModelProvider for JudgeReply {
        fn id(&self) -> &str {
            "judge"
        }
        fn name(&self) -> &str {
            "Judge"
        }
        async fn chat(&self, _r: ChatRequest) -> Result<ChatResponse, ForgeError> {
            match self.0 {
                Some(content) => Ok(ChatResponse {
                    content: content.into(),
                    usage: TokenUsage::default(),
                    stop_reason: StopReason::EndTurn,
                }),
                None => Err(ForgeError::Provider {
                    provider: "judge".into(),
                    message: "unavailable".into(),
                    retriable: true,
                }),
            }
        }
    }

    fn case() -> TestCase {
        TestCase {
            test_id: "I25-BATCH1-001".into(),
            target_id: "I25".into(),
            narrative_payload: NarrativePayload {
                narrative: "Returned to OR on day 3.".into(),
                title: None,
            },
            expectations: Expectations {
                must_find: vec!["returned to OR".into()],
                required_fields: vec!["summary".into()],
            },
            metadata: CaseMetadata {
                generated_at: Utc::now(),
                batch_index: 1,
                scenario_ref: "s".into(),
                seed: None,
                archetype: "process_auditor".into(),
                intent: IntentSlice::Knowledge,
                generator_version: "t".into(),
            },
        }
    }

    fn runner(engine: Result<String, String>, judge: Option<&'static str>) -> EvaluationRunner {
        let judge = RubricJudge::new(Arc::new(JudgeReply(judge)), "judge-model", judge::DEFAULT_RUBRIC);
        EvaluationRunner::new(Arc::new(FixedEngine(engine)), judge, 0.7)
    }

    const GOOD_OUTPUT: &str = "{\"summary\": \"Patient returned to OR\"}";

    #[tokio::test]
    async fn test_pass_requires_all_layers() {
        let r = runner(Ok(GOOD_OUTPUT.into()), Some("{\"score\": 0.9, \"reasoning\": \"ok\"}"))
            .evaluate_case(&case())
            .await;
        assert_eq!(r.label, Label::Pass);
        assert_eq!(r.scores[CRITERION_RECALL], 1.0);
        assert_eq!(r.scores[CRITERION_FIELDS], 1.0);
        assert!(!r.grading_details.low_quality);
    }

    #[tokio::test]
    async fn test_low_rubric_fails() {
        let r = runner(Ok(GOOD_OUTPUT.into()), Some("{\"score\": 0.5}"))
            .evaluate_case(&case())
            .await;
        assert_eq!(r.label, Label::Fail);
        assert!(r.grading_details.low_quality);
    }

    #[tokio::test]
    async fn test_missing_substring_fails() {
        let r = runner(Ok("{\"summary\": \"nothing\"}".into()), Some("{\"score\": 1.0}"))
            .evaluate_case(&case())
            .await;
        assert_eq!(r.label, Label::Fail);
        assert_eq!(r.grading_details.missing_substrings, vec!["returned to OR"]);
    }

    #[tokio::test]
    async fn test_judge_error_is_ambiguous() {
        let r = runner(Ok(GOOD_OUTPUT.into()), None).evaluate_case(&case()).await;
        assert_eq!(r.label, Label::Ambiguous);
        assert!(r.error.unwrap().contains("I25-BATCH1-001"));
        assert!(!r.scores.contains_key(CRITERION_RUBRIC));
    }

    #[tokio::test]
    async fn test_engine_error_is_fail() {
        let r = runner(Err("boom".into()), Some("{\"score\": 1.0}"))
            .evaluate_case(&case())
            .await;
        assert_eq!(r.label, Label::Fail);
        assert!(r.error.unwrap().contains("boom"));
        assert_eq!(r.scores[CRITERION_RECALL], 0.0);
    }
}
