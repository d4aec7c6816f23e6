// src/cli/mod.rs — CLI definition (clap derive)

pub mod campaign;
pub mod curate;
pub mod evaluate;
pub mod generate;
pub mod plan;
pub mod progress;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use crate::infra::config::resolve_api_key;
use crate::infra::errors::ForgeError;
use crate::provider::anthropic::AnthropicProvider;
use crate::provider::ModelProvider;

#[derive(Parser)]
#[command(
    name = "caseforge",
    about = "Plan, generate, evaluate and curate clinical review test cases",
    version
)]
pub struct Cli {
    /// Config file path (default: $CASEFORGE_HOME/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build a coverage-balanced scenario plan for one metric
    Plan {
        /// Metric id, e.g. C41.1a
        #[arg(long)]
        metric: String,
        /// Plan output path (*.plan.json)
        #[arg(long)]
        out: PathBuf,
        /// Signal-group catalog (default: planner.signals_dir/{METRIC}.signals.json)
        #[arg(long)]
        signals: Option<PathBuf>,
        /// Legacy planning input used when no signal groups exist
        #[arg(long)]
        legacy: Option<PathBuf>,
    },
    /// Generate test cases from a plan, one model call per batch
    Generate {
        #[arg(long)]
        plan: PathBuf,
        /// Only generate this batch (1-based)
        #[arg(long)]
        batch: Option<u32>,
        #[arg(long)]
        seed: Option<u64>,
        /// Output directory (default: the plan's directory)
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Run a prompt against generated cases and grade the output
    Evaluate {
        #[arg(long)]
        plan: PathBuf,
        /// Directory holding *.cases.json files
        #[arg(long)]
        cases: PathBuf,
        /// Prompt under evaluation
        #[arg(long)]
        prompt: PathBuf,
        /// Rubric text for the judge (default: built-in rubric)
        #[arg(long)]
        rubric: Option<PathBuf>,
        /// Report output path (*.report.json)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Prompt history file to append to
        #[arg(long)]
        history: Option<PathBuf>,
    },
    /// Mine the latest accepted report's failures into the next golden set
    CurateGolden {
        #[arg(long)]
        history: PathBuf,
        /// Directory holding the full case pool (*.cases.json)
        #[arg(long)]
        pool: PathBuf,
        /// Golden set path (*.golden.json)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Run a campaign manifest
    Launch {
        #[arg(long)]
        manifest: PathBuf,
        /// Track/job registry (TOML)
        #[arg(long)]
        registry: Option<PathBuf>,
        /// Root for run directories (default: campaign.output_root)
        #[arg(long)]
        out_root: Option<PathBuf>,
    },
    /// Show the board of a campaign run
    Board {
        /// Run directory containing board.json
        #[arg(long)]
        run: PathBuf,
    },
    /// Check a manifest against the registry without running anything
    Validate {
        #[arg(long)]
        manifest: PathBuf,
        #[arg(long)]
        registry: Option<PathBuf>,
    },
}

/// Build the model provider. A missing credential is fatal.
pub fn build_provider() -> anyhow::Result<Arc<dyn ModelProvider>> {
    let key = resolve_api_key(|k| std::env::var(k).ok())?;
    Ok(Arc::new(AnthropicProvider::new(key)))
}

/// Process exit status for a failed command: 2 when the run was refused
/// before any work (see `ForgeError::is_fatal`), 1 otherwise.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    let fatal = err
        .chain()
        .filter_map(|e| e.downcast_ref::<ForgeError>())
        .any(ForgeError::is_fatal);
    if fatal {
        2
    } else {
        1
    }
}
