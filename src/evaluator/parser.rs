// src/evaluator/parser.rs — Parse rubric-judge responses into a score

use serde::Deserialize;

use crate::provider::json::parse_model_json;

/// Parsed rubric grade.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedGrade {
    pub score: f64,
    pub reasoning: String,
}

#[derive(Deserialize)]
struct JudgeJson {
    score: f64,
    #[serde(default)]
    reasoning: String,
}

/// Parse a judge response.
///
/// Preferred format is JSON `{"score": 0.8, "reasoning": "..."}`. A line
/// format is also accepted:
/// ```text
/// SCORE: 0.8
/// REASONING: brief justification
/// ```
/// Scores outside 0.0-1.0 are rejected.
pub fn parse_judge_response(response: &str) -> anyhow::Result<ParsedGrade> {
    if let Ok(j) = parse_model_json::<JudgeJson>(response) {
        return check_range(ParsedGrade {
            score: j.score,
            reasoning: j.reasoning.trim().to_string(),
        });
    }

    let mut score = None;
    let mut reasoning = String::new();
    let mut in_reasoning = false;

    for line in response.lines() {
        let trimmed = line.trim();
        if let Some((name, value)) = parse_score_line(trimmed) {
            if name.eq_ignore_ascii_case("score") {
                score = Some(value);
                in_reasoning = false;
                continue;
            }
        }
        if let Some(rest) = strip_prefix_ci(trimmed, "REASONING:") {
            reasoning = rest.trim().to_string();
            in_reasoning = true;
            continue;
        }
        if in_reasoning && !trimmed.is_empty() {
            if !reasoning.is_empty() {
                reasoning.push(' ');
            }
            reasoning.push_str(trimmed);
        }
    }

    let score = score.ok_or_else(|| anyhow::anyhow!("judge response carried no score"))?;
    check_range(ParsedGrade { score, reasoning })
}

fn check_range(grade: ParsedGrade) -> anyhow::Result<ParsedGrade> {
    if !(0.0..=1.0).contains(&grade.score) || grade.score.is_nan() {
        anyhow::bail!("judge score {} outside 0.0-1.0", grade.score);
    }
    Ok(grade)
}

/// Parse a line like "score: 0.85" or "- score: 0.85".
pub(crate) fn parse_score_line(line: &str) -> Option<(String, f64)> {
    let line = line.trim_start_matches('-').trim();
    let (name, score_str) = line.split_once(':')?;
    let score: f64 = score_str.trim().parse().ok()?;
    Some((name.trim().to_string(), score))
}

fn strip_prefix_ci<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let head = line.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &line[prefix.len()..])
}
