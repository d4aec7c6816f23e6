// src/cli/campaign.rs — `caseforge launch`, `board` and `validate`

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::progress::terminal_progress;
use crate::campaign::board::CampaignBoard;
use crate::campaign::flight::FlightStatus;
use crate::campaign::manifest::CampaignManifest;
use crate::campaign::registry::Registry;
use crate::campaign::runner::ProcessRunner;
use crate::campaign::CampaignOrchestrator;
use crate::infra::config::Config;

pub async fn run_launch(
    config: &Config,
    config_path: Option<&Path>,
    manifest_path: &Path,
    registry_path: Option<&Path>,
    out_root: Option<&Path>,
) -> anyhow::Result<()> {
    let registry = Registry::load(registry_path)?;
    let manifest = CampaignManifest::load(manifest_path)?;
    let out_root: PathBuf = out_root
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(&config.campaign.output_root));

    let runner = ProcessRunner::new(config_path.map(Path::to_path_buf));
    let orchestrator = CampaignOrchestrator::new(registry, Arc::new(runner), out_root)
        .with_progress(terminal_progress());

    let board = orchestrator.launch(&manifest).await?;
    print!("{}", board.render());
    println!("[launch] board: {}", board.path().display());

    let failed = board.count(FlightStatus::Failed);
    if failed > 0 {
        anyhow::bail!("{failed} of {} flight(s) failed", board.flights.len());
    }
    Ok(())
}

pub fn run_board(run_dir: &Path) -> anyhow::Result<()> {
    let board = CampaignBoard::load(run_dir)?;
    print!("{}", board.render());
    for flight in &board.flights {
        for (kind, path) in &flight.artifacts {
            println!("  {} {}: {}", flight.target_id, kind, path.display());
        }
    }
    Ok(())
}

pub fn run_validate(manifest_path: &Path, registry_path: Option<&Path>) -> anyhow::Result<()> {
    let registry = Registry::load(registry_path)?;
    let manifest = CampaignManifest::load(manifest_path)?;
    let problems = manifest.problems(&registry);
    if problems.is_empty() {
        println!(
            "[validate] {}: {} scope entr{} OK",
            manifest.id,
            manifest.scope.len(),
            if manifest.scope.len() == 1 { "y" } else { "ies" }
        );
        return Ok(());
    }
    for p in &problems {
        println!("[validate] {p}");
    }
    anyhow::bail!("{} problem(s) in {}", problems.len(), manifest_path.display())
}
