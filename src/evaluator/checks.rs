// src/evaluator/checks.rs — Deterministic grading checks

use serde_json::Value;

use crate::provider::json::extract_json;

/// Outcome of one deterministic criterion. `score` is `None` when the
/// criterion does not apply to the case (nothing expected).
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    pub score: Option<f64>,
    pub missing: Vec<String>,
}

impl CheckOutcome {
    fn not_applicable() -> Self {
        Self {
            score: None,
            missing: Vec::new(),
        }
    }

    pub fn passed(&self) -> bool {
        self.score.map_or(true, |s| s >= 1.0)
    }
}

/// Fraction of must-find strings present in the output. Matching is exact,
/// the same verbatim rule the generator applies against the narrative.
pub fn must_find_recall(output: &str, must_find: &[String]) -> CheckOutcome {
    if must_find.is_empty() {
        return CheckOutcome::not_applicable();
    }
    let missing: Vec<String> = must_find
        .iter()
        .filter(|m| !output.contains(m.as_str()))
        .cloned()
        .collect();
    let found = must_find.len() - missing.len();
    CheckOutcome {
        score: Some(found as f64 / must_find.len() as f64),
        missing,
    }
}

/// 1.0 when every required field is present and non-null in the output's
/// top-level JSON object, else 0.0. Non-JSON output misses every field.
pub fn required_fields(output: &str, fields: &[String]) -> CheckOutcome {
    if fields.is_empty() {
        return CheckOutcome::not_applicable();
    }
    let parsed: Option<Value> = extract_json(output).and_then(|j| serde_json::from_str(j).ok());
    let object = parsed.as_ref().and_then(Value::as_object);

    let missing: Vec<String> = fields
        .iter()
        .filter(|f| {
            object
                .and_then(|o| o.get(f.as_str()))
                .map_or(true, Value::is_null)
        })
        .cloned()
        .collect();

    CheckOutcome {
        score: Some(if missing.is_empty() { 1.0 } else { 0.0 }),
        missing,
    }
}
