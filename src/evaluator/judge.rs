// src/evaluator/judge.rs — Rubric grading via an independent model call

use std::sync::Arc;

use crate::core::types::TestCase;
use crate::infra::errors::ForgeError;
use crate::provider::{ChatRequest, Message, ModelProvider};

/// Rubric scores below this are flagged low quality.
pub const LOW_QUALITY_THRESHOLD: f64 = 0.7;

pub const DEFAULT_RUBRIC: &str = "\
Score the review artifact from 0.0 to 1.0.
- 1.0: accurate, complete timeline; every relevant clinical signal is cited; \
exclusions and documentation conflicts are called out explicitly.
- 0.7: accurate with minor omissions; no fabricated facts.
- 0.4: notable omissions or an unflagged conflict.
- 0.0: fabricated facts, wrong determination, or unusable output.";

#[derive(Debug, Clone, PartialEq)]
pub struct RubricGrade {
    pub score: f64,
    pub reasoning: String,
    pub low_quality: bool,
}

pub struct RubricJudge {
    provider: Arc<dyn ModelProvider>,
    model: String,
    rubric: String,
}

impl RubricJudge {
    pub fn new(provider: Arc<dyn ModelProvider>, model: impl Into<String>, rubric: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            rubric: rubric.into(),
        }
    }

    /// Grade one engine output. Any call or parse failure is a `Grading` error.
    pub async fn grade(&self, case: &TestCase, output: &str) -> Result<RubricGrade, ForgeError> {
        let prompt = format!(
            "You are grading a clinical quality-review artifact against a rubric.\n\n\
             ## Rubric\n{}\n\n\
             ## Source narrative\n{}\n\n\
             ## Artifact to grade\n{}\n\n\
             Respond with JSON only: {{\"score\": <0.0-1.0>, \"reasoning\": \"<one or two sentences>\"}}",
            self.rubric, case.narrative_payload.narrative, output
        );

        let response = self
            .provider
            .chat(ChatRequest {
                model: self.model.clone(),
                messages: vec![Message::user(prompt)],
                max_tokens: Some(1000),
                temperature: Some(0.1),
                system: None,
            })
            .await
            .map_err(|e| ForgeError::Grading {
                test_id: case.test_id.clone(),
                message: e.to_string(),
            })?;

        let parsed = super::parser::parse_judge_response(&response.content).map_err(|e| {
            ForgeError::Grading {
                test_id: case.test_id.clone(),
                message: e.to_string(),
            }
        })?;

        Ok(RubricGrade {
            low_quality: parsed.score < LOW_QUALITY_THRESHOLD,
            score: parsed.score,
            reasoning: parsed.reasoning,
        })
    }
}
