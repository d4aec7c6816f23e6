// src/campaign/board.rs — Campaign status board (board.json)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::flight::{FlightContext, FlightStatus};
use crate::core::state;

pub const BOARD_FILE: &str = "board.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignBoard {
    pub campaign_id: String,
    pub title: String,
    pub run_id: String,
    pub run_dir: PathBuf,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub flights: Vec<FlightContext>,
}

impl CampaignBoard {
    pub fn path(&self) -> PathBuf {
        self.run_dir.join(BOARD_FILE)
    }

    /// Atomically rewrite board.json.
    pub fn save(&mut self) -> anyhow::Result<()> {
        self.updated_at = Utc::now();
        state::write_json_atomic(&self.path(), self)
    }

    /// Load `board.json` from a run directory.
    pub fn load(run_dir: &Path) -> anyhow::Result<Self> {
        state::read_json(&run_dir.join(BOARD_FILE))
    }

    pub fn count(&self, status: FlightStatus) -> usize {
        self.flights.iter().filter(|f| f.status == status).count()
    }

    pub fn flight(&self, target_id: &str) -> Option<&FlightContext> {
        self.flights.iter().find(|f| f.target_id == target_id)
    }

    /// Plain-text table for the terminal.
    pub fn render(&self) -> String {
        let mut out = format!(
            "{}: {} (run {})\n",
            self.campaign_id, self.title, self.run_id
        );
        let width = self
            .flights
            .iter()
            .map(|f| f.target_id.len())
            .max()
            .unwrap_or(6)
            .max(6);
        out.push_str(&format!("{:<width$}  {:<12} {:<10} STEPS  NOTE\n", "TARGET", "TRACK", "STATUS"));
        for f in &self.flights {
            let note = f
                .error
                .as_deref()
                .map(|e| crate::util::ellipsize(e, 60))
                .unwrap_or_default();
            out.push_str(&format!(
                "{:<width$}  {:<12} {:<10} {:>5}  {}\n",
                f.target_id,
                f.track_id,
                f.status,
                f.history.len(),
                note
            ));
        }
        out.push_str(&format!(
            "{} completed, {} failed, {} pending\n",
            self.count(FlightStatus::Completed),
            self.count(FlightStatus::Failed),
            self.count(FlightStatus::Pending) + self.count(FlightStatus::Running)
        ));
        out
    }
}
