// src/cli/plan.rs — `caseforge plan`

use std::path::Path;

use crate::core::state;
use crate::infra::config::Config;
use crate::infra::paths::{self, PLAN_SUFFIX, STRATEGY_SUFFIX};
use crate::planner::legacy::LegacyPlanningInput;
use crate::planner::signals::SignalCatalog;
use crate::planner::strategy::{derive_strategy, StrategyRegistry};
use crate::planner::ScenarioMatrixPlanner;

pub fn run_plan(
    config: &Config,
    metric: &str,
    out: &Path,
    signals: Option<&Path>,
    legacy: Option<&Path>,
) -> anyhow::Result<()> {
    let signals_path = SignalCatalog::resolve_path(&config.planner, metric, signals);
    tracing::info!("Signal catalog: {}", signals_path.display());
    let catalog = SignalCatalog::load(&signals_path)?;
    let legacy = legacy.map(LegacyPlanningInput::load).transpose()?;

    let planner = ScenarioMatrixPlanner::new(config.planner.clone());
    let plan = planner.plan(metric, &catalog.usable_groups(), legacy.as_ref())?;
    state::write_json_atomic(out, &plan)?;

    let strategy = derive_strategy(&plan, out, config.generation.batch_size)?;
    let strategy_path = paths::sibling_with_suffix(out, PLAN_SUFFIX, STRATEGY_SUFFIX);
    state::write_json_atomic(&strategy_path, &strategy)?;

    let plan_dir = out.parent().unwrap_or_else(|| Path::new("."));
    let mut registry = StrategyRegistry::load(&paths::strategy_registry_path(plan_dir))?;
    registry.record(&strategy, &strategy_path);
    registry.save()?;

    println!(
        "[plan] {} ({}): {} scenario(s), doubt ratio {:.2}, {} batch(es)",
        plan.target_id,
        plan.domain,
        plan.scenarios.len(),
        plan.realized_doubt_ratio(),
        strategy.batches.len()
    );
    for s in &plan.shortfalls {
        println!(
            "[plan]   shortfall {}/{}: {}/{}",
            s.task, s.intent, s.produced, s.requested
        );
    }
    println!("[plan] wrote {}", out.display());
    Ok(())
}
