// src/campaign/mod.rs — Campaign orchestrator
//
// Runs each manifest scope entry ("flight") through its track, one step at
// a time, forwarding produced artifacts by kind. A failed step fails only
// its own flight; siblings still run. The board is rewritten after every
// transition.

pub mod artifacts;
pub mod board;
pub mod flight;
pub mod manifest;
pub mod registry;
pub mod runner;

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::types::ProgressEvent;
use crate::infra::errors::ForgeError;
use crate::infra::paths;
use artifacts::ArtifactKind;
use board::CampaignBoard;
use flight::{FlightContext, FlightStatus, StepRecord};
use manifest::CampaignManifest;
use registry::{render_output, Registry, StepArg, StepVar, Track, TrackStep};
use runner::{JobInvocation, JobRunner};

pub struct CampaignOrchestrator {
    registry: Registry,
    runner: Arc<dyn JobRunner>,
    output_root: PathBuf,
    on_progress: Option<Box<dyn Fn(ProgressEvent) + Send + Sync>>,
}

impl CampaignOrchestrator {
    pub fn new(registry: Registry, runner: Arc<dyn JobRunner>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            runner,
            output_root: output_root.into(),
            on_progress: None,
        }
    }

    pub fn with_progress(mut self, cb: impl Fn(ProgressEvent) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Box::new(cb));
        self
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(ref cb) = self.on_progress {
            cb(event);
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Run every flight of `manifest` sequentially and return the final board.
    /// Manifest problems abort before anything is written.
    pub async fn launch(&self, manifest: &CampaignManifest) -> anyhow::Result<CampaignBoard> {
        manifest.validate(&self.registry)?;

        let run_id = format!(
            "{}-{}",
            slug::slugify(&manifest.id),
            Utc::now().format("%Y%m%d-%H%M%S")
        );
        let run_dir = self.output_root.join(&run_id);
        std::fs::create_dir_all(&run_dir)?;

        let now = Utc::now();
        let mut board = CampaignBoard {
            campaign_id: manifest.id.clone(),
            title: manifest.title.clone(),
            run_id: run_id.clone(),
            run_dir: run_dir.clone(),
            started_at: now,
            updated_at: now,
            flights: manifest
                .scope
                .iter()
                .map(|e| FlightContext::new(&run_id, &e.target_id, &e.track_id))
                .collect(),
        };
        board.save()?;
        tracing::info!(
            "Launching campaign {} ({} flight(s)) in {}",
            manifest.id,
            board.flights.len(),
            run_dir.display()
        );

        for idx in 0..board.flights.len() {
            self.run_flight(&mut board, idx).await?;
        }

        tracing::info!(
            "Campaign {} finished: {} completed, {} failed",
            manifest.id,
            board.count(FlightStatus::Completed),
            board.count(FlightStatus::Failed)
        );
        Ok(board)
    }

    /// Drive one flight to a terminal state. Setup and step problems fail
    /// the flight; board writes after launch only warn.
    async fn run_flight(&self, board: &mut CampaignBoard, idx: usize) -> anyhow::Result<()> {
        let (target_id, track_id) = {
            let f = &board.flights[idx];
            (f.target_id.clone(), f.track_id.clone())
        };
        board.flights[idx].transition(FlightStatus::Running)?;
        save_board(board);

        let outcome = match self.prepare_flight(&board.run_dir, &target_id, &track_id) {
            Ok((track, flight_dir)) => {
                self.emit(ProgressEvent::FlightStarted {
                    target_id: target_id.clone(),
                    track_id: track.id.clone(),
                    steps: track.steps.len(),
                });
                self.run_steps(board, idx, track, &flight_dir).await
            }
            Err(e) => Err(e),
        };

        let flight = &mut board.flights[idx];
        match outcome {
            Ok(()) => flight.transition(FlightStatus::Completed)?,
            Err(e) => {
                tracing::error!("Flight {} failed: {}", target_id, e);
                flight.fail(e.to_string())?;
            }
        }
        let status = flight.status;
        save_board(board);
        self.emit(ProgressEvent::FlightFinished {
            target_id,
            status: status.to_string(),
        });
        Ok(())
    }

    /// Resolve the flight's track and create its working directory.
    fn prepare_flight(
        &self,
        run_dir: &Path,
        target_id: &str,
        track_id: &str,
    ) -> Result<(&Track, PathBuf), ForgeError> {
        let setup_error = |message: String| ForgeError::StepExecution {
            target_id: target_id.to_string(),
            step: "setup".into(),
            message,
        };
        let track = self
            .registry
            .track(track_id)
            .ok_or_else(|| setup_error(format!("unknown track '{track_id}'")))?;
        let flight_dir = run_dir.join(paths::file_stem_for(target_id));
        std::fs::create_dir_all(&flight_dir).map_err(|e| {
            setup_error(format!("cannot create {}: {e}", flight_dir.display()))
        })?;
        Ok((track, flight_dir))
    }

    /// Execute the track's steps in order, stopping at the first failure.
    async fn run_steps(
        &self,
        board: &mut CampaignBoard,
        idx: usize,
        track: &Track,
        flight_dir: &Path,
    ) -> Result<(), ForgeError> {
        for (step_index, step) in track.steps.iter().enumerate() {
            board.flights[idx].current_step_index = step_index;
            let result = self
                .run_step(&board.flights[idx], step_index, step, flight_dir)
                .await;

            let (record, produced, failure) = match result {
                Ok(r) => r,
                Err(e) => {
                    let record = StepRecord {
                        step: step.name.clone(),
                        job_id: step.job_id.clone(),
                        command: Vec::new(),
                        exit_code: None,
                        output: None,
                        ok: false,
                        message: Some(e.to_string()),
                        started_at: Utc::now(),
                        finished_at: Utc::now(),
                    };
                    (record, None, Some(e))
                }
            };

            let ok = record.ok;
            let flight = &mut board.flights[idx];
            flight.record_step(record)?;
            if let Some((kind, path)) = produced {
                flight.record_artifact(kind, path);
            }
            save_board(board);
            self.emit(ProgressEvent::StepFinished {
                target_id: board.flights[idx].target_id.clone(),
                step: step.name.clone(),
                ok,
            });

            if let Some(e) = failure {
                return Err(e);
            }
        }
        Ok(())
    }

    /// Run one step. Returns its record, the artifact it produced (if any)
    /// and the failure that ends the flight (if any).
    async fn run_step(
        &self,
        flight: &FlightContext,
        step_index: usize,
        step: &TrackStep,
        flight_dir: &Path,
    ) -> Result<(StepRecord, Option<(ArtifactKind, PathBuf)>, Option<ForgeError>), ForgeError> {
        let step_error = |message: String| ForgeError::StepExecution {
            target_id: flight.target_id.clone(),
            step: step.name.clone(),
            message,
        };

        let job = self
            .registry
            .job(&step.job_id)
            .ok_or_else(|| step_error(format!("unknown job '{}'", step.job_id)))?;

        let output = match &step.output_artifact_template {
            Some(t) => Some(flight_dir.join(render_output(t, &flight.target_id, &flight.run_id)?)),
            None => None,
        };
        if let Some(parent) = output.as_deref().and_then(Path::parent) {
            std::fs::create_dir_all(parent)?;
        }

        let run_dir = flight_dir.parent().unwrap_or(flight_dir);
        let mut args = Vec::new();
        for arg in job.default_args.iter().chain(&step.static_args) {
            args.push(resolve_arg(arg, flight, output.as_deref(), run_dir).map_err(step_error)?);
        }

        let log_stem = format!("{:02}_{}", step_index + 1, slug::slugify(&step.name));
        let invocation = JobInvocation {
            target_id: flight.target_id.clone(),
            step: step.name.clone(),
            program: job.command.clone(),
            args,
            stdout_log: flight_dir.join("logs").join(format!("{log_stem}.stdout.log")),
            stderr_log: flight_dir.join("logs").join(format!("{log_stem}.stderr.log")),
        };

        tracing::info!("[{}] step {} ({})", flight.target_id, step.name, job.id);
        let started_at = Utc::now();
        let outcome = self.runner.run(&invocation).await;
        let finished_at = Utc::now();

        let mut record = StepRecord {
            step: step.name.clone(),
            job_id: job.id.clone(),
            command: invocation.command_line(),
            exit_code: None,
            output: output.clone(),
            ok: false,
            message: None,
            started_at,
            finished_at,
        };

        let outcome = match outcome {
            Ok(o) => o,
            Err(e) => {
                record.message = Some(e.to_string());
                return Ok((record, None, Some(e)));
            }
        };
        record.exit_code = outcome.exit_code;

        if !outcome.success {
            let message = match outcome.exit_code {
                Some(code) => format!("exited with status {code}"),
                None => "terminated by signal".to_string(),
            };
            record.message = Some(message.clone());
            return Ok((record, None, Some(step_error(message))));
        }

        let produced = match output {
            None => None,
            Some(path) => {
                if !path.exists() {
                    let message = format!("declared output {} is missing", path.display());
                    record.message = Some(message.clone());
                    return Ok((record, None, Some(step_error(message))));
                }
                let kind = ArtifactKind::classify(&path).ok_or_else(|| {
                    step_error(format!("cannot classify output {}", path.display()))
                })?;
                Some((kind, path))
            }
        };

        record.ok = true;
        Ok((record, produced, None))
    }
}

/// Persist the board mid-run. A failed write is not a flight failure.
fn save_board(board: &mut CampaignBoard) {
    if let Err(e) = board.save() {
        tracing::warn!("Could not update board: {}", e);
    }
}

/// Resolve one typed argument against the flight's state.
fn resolve_arg(
    arg: &StepArg,
    flight: &FlightContext,
    output: Option<&Path>,
    run_dir: &Path,
) -> Result<String, String> {
    let artifact = |kind: &ArtifactKind| {
        flight
            .artifacts
            .get(kind)
            .cloned()
            .ok_or_else(|| format!("no {kind} artifact available"))
    };
    let declared_output = || output.ok_or_else(|| "step declares no output".to_string());

    let value = match arg {
        StepArg::Literal(s) => return Ok(s.clone()),
        StepArg::Artifact { artifact: kind } => artifact(kind)?,
        StepArg::ArtifactDir { artifact_dir: kind } => {
            let path = artifact(kind)?;
            path.parent().map(Path::to_path_buf).unwrap_or(path)
        }
        StepArg::Var { var } => match var {
            StepVar::Target => return Ok(flight.target_id.clone()),
            StepVar::RunDir => run_dir.to_path_buf(),
            StepVar::Output => declared_output()?.to_path_buf(),
            StepVar::OutputDir => {
                let out = declared_output()?;
                out.parent().unwrap_or(out).to_path_buf()
            }
        },
    };
    Ok(value.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flight_with_plan() -> FlightContext {
        let mut f = FlightContext::new("r1", "I25", "full");
        f.record_artifact(ArtifactKind::Plan, PathBuf::from("/runs/r1/I25/I25.plan.json"));
        f
    }

    #[test]
    fn test_resolve_typed_args() {
        let f = flight_with_plan();
        let out = Path::new("/runs/r1/I25/cases/I25_batch_1.cases.json");
        let run = Path::new("/runs/r1");
        let r = |a: StepArg| resolve_arg(&a, &f, Some(out), run).unwrap();

        assert_eq!(r(StepArg::Literal("--plan".into())), "--plan");
        assert_eq!(
            r(StepArg::Artifact {
                artifact: ArtifactKind::Plan
            }),
            "/runs/r1/I25/I25.plan.json"
        );
        assert_eq!(
            r(StepArg::ArtifactDir {
                artifact_dir: ArtifactKind::Plan
            }),
            "/runs/r1/I25"
        );
        assert_eq!(r(StepArg::Var { var: StepVar::OutputDir }), "/runs/r1/I25/cases");
        assert_eq!(r(StepArg::Var { var: StepVar::Target }), "I25");
        assert_eq!(r(StepArg::Var { var: StepVar::RunDir }), "/runs/r1");
    }

    #[test]
    fn test_missing_artifact_is_error() {
        let f = FlightContext::new("r1", "I25", "full");
        let err = resolve_arg(
            &StepArg::Artifact {
                artifact: ArtifactKind::EvalReport,
            },
            &f,
            None,
            Path::new("/runs"),
        )
        .unwrap_err();
        assert!(err.contains("eval_report"));
    }

    #[test]
    fn test_output_var_without_output() {
        let f = FlightContext::new("r1", "I25", "full");
        assert!(resolve_arg(&StepArg::Var { var: StepVar::Output }, &f, None, Path::new("/")).is_err());
    }
}
