// src/campaign/flight.rs — Per-target flight state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::artifacts::ArtifactKind;
use crate::infra::errors::ForgeError;

/// PENDING → RUNNING → (COMPLETED | FAILED). Terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlightStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl FlightStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn can_transition_to(&self, next: FlightStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
        )
    }
}

impl std::fmt::Display for FlightStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// What happened when a step ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: String,
    pub job_id: String,
    pub command: Vec<String>,
    pub exit_code: Option<i32>,
    pub output: Option<PathBuf>,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightContext {
    pub run_id: String,
    pub target_id: String,
    pub track_id: String,
    pub status: FlightStatus,
    pub current_step_index: usize,
    pub artifacts: BTreeMap<ArtifactKind, PathBuf>,
    pub history: Vec<StepRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FlightContext {
    pub fn new(run_id: &str, target_id: &str, track_id: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            target_id: target_id.to_string(),
            track_id: track_id.to_string(),
            status: FlightStatus::Pending,
            current_step_index: 0,
            artifacts: BTreeMap::new(),
            history: Vec::new(),
            error: None,
        }
    }

    pub fn transition(&mut self, next: FlightStatus) -> Result<(), ForgeError> {
        if !self.status.can_transition_to(next) {
            return Err(ForgeError::InvalidTransition {
                target_id: self.target_id.clone(),
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        tracing::debug!("Flight {}: {} -> {}", self.target_id, self.status, next);
        self.status = next;
        Ok(())
    }

    /// Record a finished step. Only a RUNNING flight accepts steps.
    pub fn record_step(&mut self, record: StepRecord) -> Result<(), ForgeError> {
        if self.status != FlightStatus::Running {
            return Err(ForgeError::InvalidTransition {
                target_id: self.target_id.clone(),
                from: self.status.to_string(),
                to: format!("step '{}'", record.step),
            });
        }
        self.history.push(record);
        Ok(())
    }

    /// Make an artifact available to later steps. Re-producing a kind
    /// replaces the earlier path.
    pub fn record_artifact(&mut self, kind: ArtifactKind, path: PathBuf) {
        if let Some(prev) = self.artifacts.insert(kind, path) {
            tracing::debug!("Flight {}: {} replaced {}", self.target_id, kind, prev.display());
        }
    }

    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), ForgeError> {
        self.transition(FlightStatus::Failed)?;
        self.error = Some(message.into());
        Ok(())
    }
}
