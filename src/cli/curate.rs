// src/cli/curate.rs — `caseforge curate-golden`

use std::path::{Path, PathBuf};

use crate::curator::pool::CasePool;
use crate::curator::{previous_level, write_golden, CurationOutcome, GoldenSetCurator};
use crate::evaluator::history::PromptHistory;
use crate::evaluator::report::load_report;
use crate::infra::config::Config;
use crate::infra::errors::ForgeError;
use crate::infra::paths::{self, GOLDEN_SUFFIX};

pub fn run_curate(
    config: &Config,
    history_path: &Path,
    pool_dir: &Path,
    out: Option<&Path>,
) -> anyhow::Result<()> {
    if !history_path.exists() {
        return Err(ForgeError::MissingFile {
            path: history_path.to_path_buf(),
        }
        .into());
    }
    let history = PromptHistory::load(history_path)?;
    let accepted = history.latest_accepted().ok_or_else(|| {
        ForgeError::config(format!(
            "{} has no accepted prompt version",
            history_path.display()
        ))
    })?;
    tracing::info!(
        "Curating from prompt version {} ({})",
        crate::util::truncate_str(&accepted.version, 12),
        accepted.report_path
    );

    let report = load_report(Path::new(&accepted.report_path))?;
    let pool = CasePool::load(pool_dir)?;
    tracing::info!(
        "Pool: {} case(s) from {} file(s)",
        pool.len(),
        pool.sources().len()
    );

    let out: PathBuf = match out {
        Some(p) => p.to_path_buf(),
        None => pool_dir.join(format!(
            "{}{GOLDEN_SUFFIX}",
            paths::file_stem_for(&report.metadata.target_id)
        )),
    };
    let level = previous_level(&out)?;

    let curator = GoldenSetCurator::new(config.curation.clone());
    match curator.curate(&report, &accepted.report_path, &pool, level)? {
        CurationOutcome::Curated(golden) => {
            write_golden(&out, &golden)?;
            println!(
                "[curate] level {}: {} case(s) from {} failure(s), {} backfilled",
                golden.level,
                golden.scenario_count,
                golden.batch_plan.failures_considered,
                golden.batch_plan.backfilled
            );
            for (archetype, n) in &golden.batch_plan.archetype_counts {
                println!("[curate]   {archetype}: {n}");
            }
            println!("[curate] wrote {}", out.display());
        }
        CurationOutcome::ReadyForNextLevel { level } => {
            println!("[curate] zero failures: level {level} is ready for a harder set");
        }
    }
    Ok(())
}
