// src/cli/generate.rs — `caseforge generate`

use std::path::Path;

use super::progress::terminal_progress;
use crate::core::state;
use crate::core::types::BatchPlan;
use crate::generator::CaseGenerator;
use crate::infra::config::Config;
use crate::infra::paths::{self, PLAN_SUFFIX, STRATEGY_SUFFIX};
use crate::planner::strategy::{derive_strategy, BatchStrategy};

pub async fn run_generate(
    config: &Config,
    plan_path: &Path,
    batch: Option<u32>,
    seed: Option<u64>,
    out_dir: Option<&Path>,
) -> anyhow::Result<()> {
    let plan: BatchPlan = state::read_json(plan_path)?;

    let strategy_path = paths::sibling_with_suffix(plan_path, PLAN_SUFFIX, STRATEGY_SUFFIX);
    let strategy: BatchStrategy = if strategy_path.exists() {
        state::read_json(&strategy_path)?
    } else {
        tracing::info!("No strategy beside {}; deriving one", plan_path.display());
        derive_strategy(&plan, plan_path, config.generation.batch_size)?
    };

    let out_dir = out_dir
        .map(Path::to_path_buf)
        .or_else(|| plan_path.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| ".".into());

    let provider = super::build_provider()?;
    let generator = CaseGenerator::new(
        provider,
        config.model.clone(),
        config.generation.clone(),
        config.evaluation.required_fields.clone(),
    )
    .with_progress(terminal_progress());

    let summary = generator
        .generate_all(&plan, &strategy, &out_dir, seed, batch)
        .await?;

    println!(
        "[generate] {} case(s) in {} batch file(s), {} batch(es) failed",
        summary.total_cases,
        summary.written.len(),
        summary.failed.len()
    );
    if summary.written.is_empty() && !summary.failed.is_empty() {
        anyhow::bail!("every batch failed for {}", plan.target_id);
    }
    Ok(())
}
