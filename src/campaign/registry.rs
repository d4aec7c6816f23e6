// src/campaign/registry.rs — Track/Job registry (static, validated configuration)

use minijinja::{context, Environment, UndefinedBehavior};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use super::artifacts::ArtifactKind;
use crate::infra::errors::ForgeError;
use crate::infra::paths;

/// Built-in registry: jobs call this binary's own sub-commands.
pub const DEFAULT_REGISTRY: &str = r#"
[[jobs]]
id = "plan"
command = "caseforge"
default_args = ["plan", "--metric", { var = "target" }, "--out", { var = "output" }]

[[jobs]]
id = "generate"
command = "caseforge"
default_args = ["generate", "--plan", { artifact = "plan" }, "--out-dir", { var = "output_dir" }]

[[jobs]]
id = "evaluate"
command = "caseforge"
default_args = [
    "evaluate",
    "--plan", { artifact = "plan" },
    "--cases", { artifact_dir = "test_cases" },
    "--out", { var = "output" },
]

[[tracks]]
id = "plan_only"
version = 1

[[tracks.steps]]
name = "plan"
job_id = "plan"
output_artifact_template = "{{ target_stem }}.plan.json"

[[tracks]]
id = "cases"
version = 1

[[tracks.steps]]
name = "plan"
job_id = "plan"
output_artifact_template = "{{ target_stem }}.plan.json"

[[tracks.steps]]
name = "generate"
job_id = "generate"
output_artifact_template = "cases/{{ target_stem }}_batch_1.cases.json"

[[tracks]]
id = "full"
version = 1

[[tracks.steps]]
name = "plan"
job_id = "plan"
output_artifact_template = "{{ target_stem }}.plan.json"

[[tracks.steps]]
name = "generate"
job_id = "generate"
output_artifact_template = "cases/{{ target_stem }}_batch_1.cases.json"

[[tracks.steps]]
name = "evaluate"
job_id = "evaluate"
static_args = ["--prompt", "prompts/review_prompt.md"]
output_artifact_template = "{{ target_stem }}.report.json"
"#;

/// Per-flight values a step argument can refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepVar {
    /// The step's declared output path.
    Output,
    /// Directory containing the step's declared output.
    OutputDir,
    Target,
    RunDir,
}

/// One argument of a job invocation. Plain strings are literals; tables
/// reference artifacts or flight variables and are resolved at run time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepArg {
    Literal(String),
    Artifact { artifact: ArtifactKind },
    ArtifactDir { artifact_dir: ArtifactKind },
    Var { var: StepVar },
}

impl StepArg {
    /// Artifact kind this argument consumes, if any.
    pub fn consumes(&self) -> Option<ArtifactKind> {
        match self {
            StepArg::Artifact { artifact } => Some(*artifact),
            StepArg::ArtifactDir { artifact_dir } => Some(*artifact_dir),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub command: String,
    #[serde(default)]
    pub default_args: Vec<StepArg>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackStep {
    pub name: String,
    pub job_id: String,
    #[serde(default)]
    pub static_args: Vec<StepArg>,
    #[serde(default)]
    pub output_artifact_template: Option<String>,
}

impl TrackStep {
    /// Kind of artifact this step produces, judged by its template suffix.
    pub fn produces(&self) -> Option<ArtifactKind> {
        self.output_artifact_template
            .as_deref()
            .and_then(ArtifactKind::from_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    #[serde(default = "default_version")]
    pub version: u32,
    pub steps: Vec<TrackStep>,
}

fn default_version() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    jobs: Vec<Job>,
    #[serde(default)]
    tracks: Vec<Track>,
}

/// Read-only lookup of jobs and tracks. Built once at startup and passed
/// to the orchestrator explicitly.
#[derive(Debug, Clone)]
pub struct Registry {
    jobs: BTreeMap<String, Job>,
    tracks: BTreeMap<String, Track>,
}

impl Registry {
    pub fn builtin() -> Result<Self, ForgeError> {
        Self::from_toml_str(DEFAULT_REGISTRY)
    }

    /// Explicit path, else `$CASEFORGE_HOME/registry.toml` if present, else
    /// the built-in registry.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default = paths::registry_file_path();
                if !default.exists() {
                    return Ok(Self::builtin()?);
                }
                default
            }
        };
        let content = std::fs::read_to_string(&path)
            .map_err(|_| ForgeError::MissingFile { path: path.clone() })?;
        Self::from_toml_str(&content)
            .map_err(|e| ForgeError::config(format!("{}: {e}", path.display())).into())
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ForgeError> {
        let file: RegistryFile =
            toml::from_str(content).map_err(|e| ForgeError::config(e.to_string()))?;

        let mut jobs = BTreeMap::new();
        for job in file.jobs {
            if job.command.trim().is_empty() {
                return Err(ForgeError::config(format!("job '{}' has no command", job.id)));
            }
            if let Some(dup) = jobs.insert(job.id.clone(), job) {
                return Err(ForgeError::config(format!("duplicate job id '{}'", dup.id)));
            }
        }

        let mut tracks = BTreeMap::new();
        for track in file.tracks {
            if let Some(dup) = tracks.insert(track.id.clone(), track) {
                return Err(ForgeError::config(format!("duplicate track id '{}'", dup.id)));
            }
        }

        let registry = Self { jobs, tracks };
        for track in registry.tracks.values() {
            registry.validate_track(track)?;
        }
        Ok(registry)
    }

    /// Load-time checks: jobs exist, every consumed artifact is produced by
    /// an earlier step, output templates render and carry a known suffix.
    fn validate_track(&self, track: &Track) -> Result<(), ForgeError> {
        if track.steps.is_empty() {
            return Err(ForgeError::config(format!("track '{}' has no steps", track.id)));
        }

        let mut produced: HashSet<ArtifactKind> = HashSet::new();
        let mut names = HashSet::new();
        for step in &track.steps {
            let at = format!("track '{}' step '{}'", track.id, step.name);
            if !names.insert(step.name.as_str()) {
                return Err(ForgeError::config(format!("{at}: duplicate step name")));
            }
            let job = self
                .jobs
                .get(&step.job_id)
                .ok_or_else(|| ForgeError::config(format!("{at}: unknown job '{}'", step.job_id)))?;

            for arg in job.default_args.iter().chain(&step.static_args) {
                if let Some(kind) = arg.consumes() {
                    if !produced.contains(&kind) {
                        return Err(ForgeError::config(format!(
                            "{at}: needs a {kind} artifact that no earlier step produces"
                        )));
                    }
                }
                if matches!(arg, StepArg::Var { var: StepVar::Output | StepVar::OutputDir })
                    && step.output_artifact_template.is_none()
                {
                    return Err(ForgeError::config(format!(
                        "{at}: refers to its output but declares no output template"
                    )));
                }
            }

            if let Some(template) = &step.output_artifact_template {
                render_output(template, "VALIDATE", "validate")
                    .map_err(|e| ForgeError::config(format!("{at}: {e}")))?;
                let kind = step.produces().ok_or_else(|| {
                    ForgeError::config(format!(
                        "{at}: output '{template}' has no known artifact suffix"
                    ))
                })?;
                produced.insert(kind);
            }
        }
        Ok(())
    }

    pub fn track(&self, id: &str) -> Option<&Track> {
        self.tracks.get(id)
    }

    pub fn job(&self, id: &str) -> Option<&Job> {
        self.jobs.get(id)
    }

    pub fn track_ids(&self) -> impl Iterator<Item = &str> {
        self.tracks.keys().map(String::as_str)
    }
}

/// Render an output template. Available variables: `target_id`,
/// `target_stem` (file-name-safe id) and `run_id`.
pub fn render_output(template: &str, target_id: &str, run_id: &str) -> Result<String, ForgeError> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    let rendered = env
        .render_str(
            template,
            context! {
                target_id => target_id,
                target_stem => paths::file_stem_for(target_id),
                run_id => run_id,
            },
        )
        .map_err(|e| ForgeError::config(format!("output template '{template}': {e}")))?;
    if rendered.trim().is_empty() {
        return Err(ForgeError::config(format!("output template '{template}' renders empty")));
    }
    Ok(rendered)
}
