// src/main.rs — caseforge entry point

use clap::Parser;

use caseforge::cli::evaluate::EvaluateArgs;
use caseforge::cli::{Cli, Commands};
use caseforge::infra::config::Config;
use caseforge::infra::logger;

#[tokio::main]
async fn main() {
    // Initialize logging (respects RUST_LOG)
    logger::init_logging("info");

    if let Err(e) = run().await {
        eprintln!("error: {e:#}");
        std::process::exit(caseforge::cli::exit_code(&e));
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load config (falls back to defaults if no config.toml)
    let config = match cli.config.as_deref() {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::Plan {
            metric,
            out,
            signals,
            legacy,
        } => caseforge::cli::plan::run_plan(
            &config,
            &metric,
            &out,
            signals.as_deref(),
            legacy.as_deref(),
        ),
        Commands::Generate {
            plan,
            batch,
            seed,
            out_dir,
        } => {
            caseforge::cli::generate::run_generate(&config, &plan, batch, seed, out_dir.as_deref())
                .await
        }
        Commands::Evaluate {
            plan,
            cases,
            prompt,
            rubric,
            out,
            history,
        } => {
            caseforge::cli::evaluate::run_evaluate(
                &config,
                EvaluateArgs {
                    plan: &plan,
                    cases: &cases,
                    prompt: &prompt,
                    rubric: rubric.as_deref(),
                    out: out.as_deref(),
                    history: history.as_deref(),
                },
            )
            .await
        }
        Commands::CurateGolden { history, pool, out } => {
            caseforge::cli::curate::run_curate(&config, &history, &pool, out.as_deref())
        }
        Commands::Launch {
            manifest,
            registry,
            out_root,
        } => {
            caseforge::cli::campaign::run_launch(
                &config,
                cli.config.as_deref(),
                &manifest,
                registry.as_deref(),
                out_root.as_deref(),
            )
            .await
        }
        Commands::Board { run } => caseforge::cli::campaign::run_board(&run),
        Commands::Validate { manifest, registry } => {
            caseforge::cli::campaign::run_validate(&manifest, registry.as_deref())
        }
    }
}
