// src/cli/evaluate.rs — `caseforge evaluate`

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::progress::terminal_progress;
use crate::core::state;
use crate::core::types::{BatchPlan, ReportMetadata};
use crate::evaluator::engine::PromptEngine;
use crate::evaluator::history::{prompt_version, PromptHistory, PromptVersion};
use crate::evaluator::judge::{RubricJudge, DEFAULT_RUBRIC};
use crate::evaluator::report::{build_report, write_report};
use crate::evaluator::{load_cases, EvaluationRunner};
use crate::infra::config::Config;
use crate::infra::errors::ForgeError;
use crate::infra::paths::{self, REPORT_SUFFIX};

pub const HISTORY_FILE: &str = "prompt_history.json";

pub struct EvaluateArgs<'a> {
    pub plan: &'a Path,
    pub cases: &'a Path,
    pub prompt: &'a Path,
    pub rubric: Option<&'a Path>,
    pub out: Option<&'a Path>,
    pub history: Option<&'a Path>,
}

fn read_text(path: &Path) -> Result<String, ForgeError> {
    std::fs::read_to_string(path).map_err(|_| ForgeError::MissingFile {
        path: path.to_path_buf(),
    })
}

pub async fn run_evaluate(config: &Config, args: EvaluateArgs<'_>) -> anyhow::Result<()> {
    let plan: BatchPlan = state::read_json(args.plan)?;
    let cases = load_cases(args.cases, &plan.target_id)?;
    if cases.is_empty() {
        return Err(ForgeError::config(format!(
            "no cases for {} under {}",
            plan.target_id,
            args.cases.display()
        ))
        .into());
    }

    let prompt = read_text(args.prompt)?;
    let rubric = match args.rubric {
        Some(p) => read_text(p)?,
        None => DEFAULT_RUBRIC.to_string(),
    };

    let out: PathBuf = match args.out {
        Some(p) => p.to_path_buf(),
        None => args
            .plan
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(format!("{}{REPORT_SUFFIX}", paths::file_stem_for(&plan.target_id))),
    };
    let history_path: PathBuf = match args.history {
        Some(p) => p.to_path_buf(),
        None => out.parent().unwrap_or_else(|| Path::new(".")).join(HISTORY_FILE),
    };

    let provider = super::build_provider()?;
    let engine = PromptEngine::new(
        provider.clone(),
        config.model.id.clone(),
        prompt.clone(),
        config.model.max_tokens,
    );
    let judge = RubricJudge::new(provider, config.model.judge_model(), rubric);
    let runner = EvaluationRunner::new(Arc::new(engine), judge, config.evaluation.rubric_threshold)
        .with_progress(terminal_progress());

    tracing::info!("Evaluating {} case(s) for {}", cases.len(), plan.target_id);
    let results = runner.run(&cases).await;

    let version = prompt_version(&prompt);
    let metadata = ReportMetadata {
        run_id: uuid::Uuid::new_v4().to_string(),
        target_id: plan.target_id.clone(),
        prompt_path: args.prompt.display().to_string(),
        prompt_version: version.clone(),
        model: config.model.id.clone(),
        judge_model: config.model.judge_model().to_string(),
        cases_source: args.cases.display().to_string(),
        rubric_threshold: config.evaluation.rubric_threshold,
        min_pass_rate: config.evaluation.min_pass_rate,
        gate_passed: false,
        generated_at: Utc::now(),
    };
    let report = build_report(metadata, results);
    let (json_path, csv_path) = write_report(&out, &report)?;

    let mut history = PromptHistory::load(&history_path)?;
    history.record(PromptVersion {
        version,
        prompt_path: args.prompt.display().to_string(),
        report_path: json_path.display().to_string(),
        pass_rate: report.summary.pass_rate,
        accepted: report.metadata.gate_passed,
        recorded_at: Utc::now(),
    });
    history.save(&history_path)?;

    let s = &report.summary;
    println!(
        "[evaluate] {}: {} pass, {} fail, {} ambiguous; pass rate {:.1}% (gate {:.0}%: {})",
        plan.target_id,
        s.pass_count,
        s.fail_count,
        s.ambiguous_count,
        s.pass_rate * 100.0,
        config.evaluation.min_pass_rate * 100.0,
        if report.metadata.gate_passed { "passed" } else { "not met" }
    );
    for (criterion, avg) in &s.avg_scores {
        println!("[evaluate]   {criterion}: {avg:.2}");
    }
    println!("[evaluate] wrote {} and {}", json_path.display(), csv_path.display());
    Ok(())
}
