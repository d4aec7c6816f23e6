// src/campaign/runner.rs — External job execution

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;

use crate::infra::errors::ForgeError;

/// Jobs whose command is this name run the current executable.
pub const SELF_COMMAND: &str = env!("CARGO_PKG_NAME");

#[derive(Debug, Clone)]
pub struct JobInvocation {
    pub target_id: String,
    pub step: String,
    pub program: String,
    pub args: Vec<String>,
    pub stdout_log: PathBuf,
    pub stderr_log: PathBuf,
}

impl JobInvocation {
    pub fn command_line(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JobOutcome {
    pub exit_code: Option<i32>,
    pub success: bool,
}

/// Runs one step to completion. The call blocks the flight until exit.
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(&self, invocation: &JobInvocation) -> Result<JobOutcome, ForgeError>;
}

/// Spawns the job as a child process and captures its output to log files.
pub struct ProcessRunner {
    config_path: Option<PathBuf>,
}

impl ProcessRunner {
    pub fn new(config_path: Option<PathBuf>) -> Self {
        Self { config_path }
    }

    fn resolve(&self, invocation: &JobInvocation) -> Result<(PathBuf, Vec<String>), ForgeError> {
        if invocation.program != SELF_COMMAND {
            return Ok((PathBuf::from(&invocation.program), invocation.args.clone()));
        }
        let exe = std::env::current_exe()?;
        let mut args = Vec::new();
        if let Some(cfg) = &self.config_path {
            args.push("--config".to_string());
            args.push(cfg.display().to_string());
        }
        args.extend(invocation.args.iter().cloned());
        Ok((exe, args))
    }
}

#[async_trait]
impl JobRunner for ProcessRunner {
    async fn run(&self, invocation: &JobInvocation) -> Result<JobOutcome, ForgeError> {
        let (program, args) = self.resolve(invocation)?;
        tracing::debug!("Running {} {:?}", program.display(), args);

        let output = Command::new(&program)
            .args(&args)
            .output()
            .await
            .map_err(|e| ForgeError::StepExecution {
                target_id: invocation.target_id.clone(),
                step: invocation.step.clone(),
                message: format!("failed to start {}: {e}", program.display()),
            })?;

        if let Some(parent) = invocation.stdout_log.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&invocation.stdout_log, &output.stdout)?;
        std::fs::write(&invocation.stderr_log, &output.stderr)?;

        Ok(JobOutcome {
            exit_code: output.status.code(),
            success: output.status.success(),
        })
    }
}
