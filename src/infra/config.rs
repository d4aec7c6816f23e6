// src/infra/config.rs — Configuration loading (TOML + environment overrides)

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::infra::errors::ForgeError;
use crate::infra::paths;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub evaluation: EvaluationConfig,

    #[serde(default)]
    pub planner: PlannerConfig,

    #[serde(default)]
    pub curation: CurationConfig,

    #[serde(default)]
    pub campaign: CampaignConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub id: String,
    /// Model used for rubric grading; defaults to `id`.
    pub judge_id: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            id: "claude-sonnet-4-20250514".into(),
            judge_id: None,
            max_tokens: 8192,
            temperature: 0.7,
        }
    }
}

impl ModelConfig {
    pub fn judge_model(&self) -> &str {
        self.judge_id.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub min_words: u32,
    pub max_words: u32,
    pub max_must_find: usize,
    pub batch_size: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            min_words: 120,
            max_words: 350,
            max_must_find: 5,
            batch_size: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    pub rubric_threshold: f64,
    pub min_pass_rate: f64,
    pub required_fields: Vec<String>,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            rubric_threshold: 0.7,
            min_pass_rate: 0.8,
            required_fields: vec!["summary".into(), "signals".into()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub doubt_ratio: f64,
    pub min_scenarios: usize,
    pub max_attempt_factor: usize,
    /// Directory of `{TARGET}.signals.json` catalogs; defaults to
    /// `$CASEFORGE_HOME/signals`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signals_dir: Option<String>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            doubt_ratio: 0.3,
            min_scenarios: 10,
            max_attempt_factor: 3,
            signals_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CurationConfig {
    pub max_cases: usize,
    pub per_archetype_cap: usize,
}

impl Default for CurationConfig {
    fn default() -> Self {
        Self {
            max_cases: 12,
            per_archetype_cap: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CampaignConfig {
    pub output_root: String,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            output_root: "campaigns".into(),
        }
    }
}

impl Config {
    /// Load config from file (falling back to defaults), then apply environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let path = paths::config_file_path();
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|_| ForgeError::MissingFile {
            path: path.to_path_buf(),
        })?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| ForgeError::config(format!("{}: {e}", path.display())))?;
        Ok(config)
    }

    /// Load from an explicit path and apply environment overrides.
    pub fn load_with_env(path: &Path) -> anyhow::Result<Self> {
        let mut config = Self::load_from(path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `CASEFORGE_*` overrides. `lookup` abstracts the environment for tests.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(v) = lookup("CASEFORGE_MODEL") {
            self.model.id = v;
        }
        if let Some(v) = lookup("CASEFORGE_JUDGE_MODEL") {
            self.model.judge_id = Some(v);
        }
        if let Some(v) = lookup("CASEFORGE_MAX_TOKENS") {
            self.model.max_tokens = parse_env("CASEFORGE_MAX_TOKENS", &v)?;
        }
        if let Some(v) = lookup("CASEFORGE_TEMPERATURE") {
            self.model.temperature = parse_env("CASEFORGE_TEMPERATURE", &v)?;
        }
        if let Some(v) = lookup("CASEFORGE_MIN_WORDS") {
            self.generation.min_words = parse_env("CASEFORGE_MIN_WORDS", &v)?;
        }
        if let Some(v) = lookup("CASEFORGE_MAX_WORDS") {
            self.generation.max_words = parse_env("CASEFORGE_MAX_WORDS", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ForgeError> {
        if self.generation.min_words > self.generation.max_words {
            return Err(ForgeError::config(format!(
                "generation.min_words ({}) exceeds generation.max_words ({})",
                self.generation.min_words, self.generation.max_words
            )));
        }
        if self.generation.batch_size == 0 {
            return Err(ForgeError::config("generation.batch_size must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.planner.doubt_ratio) {
            return Err(ForgeError::config("planner.doubt_ratio must be within 0.0-1.0"));
        }
        if !(0.0..=1.0).contains(&self.evaluation.rubric_threshold) {
            return Err(ForgeError::config(
                "evaluation.rubric_threshold must be within 0.0-1.0",
            ));
        }
        if self.curation.per_archetype_cap == 0 || self.curation.max_cases == 0 {
            return Err(ForgeError::config("curation caps must be > 0"));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ForgeError> {
    value
        .trim()
        .parse()
        .map_err(|_| ForgeError::config(format!("{key}: invalid value '{value}'")))
}

/// Resolve the model API credential: env var first, then the saved key file.
/// A missing credential is fatal; there is no silent mock fallback.
pub fn resolve_api_key(lookup: impl Fn(&str) -> Option<String>) -> Result<String, ForgeError> {
    if let Some(key) = lookup("ANTHROPIC_API_KEY").filter(|k| !k.trim().is_empty()) {
        return Ok(key.trim().to_string());
    }
    let key_path = paths::credentials_dir().join("anthropic.key");
    match std::fs::read_to_string(&key_path) {
        Ok(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(ForgeError::MissingCredential(paths::credentials_dir())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_reasonable() {
        let c = Config::default();
        assert_eq!(c.model.max_tokens, 8192);
        assert_eq!(c.generation.max_must_find, 5);
        assert!((c.evaluation.rubric_threshold - 0.7).abs() < 1e-9);
        assert_eq!(c.curation.max_cases, 12);
        assert_eq!(c.curation.per_archetype_cap, 3);
        assert!((c.planner.doubt_ratio - 0.3).abs() < 1e-9);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_judge_model_defaults_to_model() {
        let mut m = ModelConfig::default();
        assert_eq!(m.judge_model(), m.id);
        m.judge_id = Some("claude-opus-4-20250514".into());
        assert_eq!(m.judge_model(), "claude-opus-4-20250514");
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.generation.batch_size, 5);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config: Config = toml::from_str("[evaluation]\nmin_pass_rate = 0.5\n").unwrap();
        assert!((config.evaluation.min_pass_rate - 0.5).abs() < 1e-9);
        assert!((config.evaluation.rubric_threshold - 0.7).abs() < 1e-9);
        assert_eq!(config.evaluation.required_fields, vec!["summary", "signals"]);

        let config: Config = toml::from_str("[model]\njudge_id = \"judge\"\n").unwrap();
        assert_eq!(config.model.max_tokens, 8192);
        assert_eq!(config.model.judge_model(), "judge");
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[model]
id = "claude-haiku-3-5-20241022"
max_tokens = 2048
temperature = 0.2

[generation]
min_words = 80
max_words = 200
max_must_find = 3
batch_size = 4

[evaluation]
rubric_threshold = 0.75
min_pass_rate = 0.9
required_fields = ["summary"]

[curation]
max_cases = 8
per_archetype_cap = 2
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.model.id, "claude-haiku-3-5-20241022");
        assert_eq!(config.model.max_tokens, 2048);
        assert_eq!(config.generation.batch_size, 4);
        assert_eq!(config.evaluation.required_fields, vec!["summary"]);
        assert_eq!(config.curation.per_archetype_cap, 2);
        assert_eq!(config.planner.min_scenarios, 10);
    }

    #[test]
    fn test_env_overrides() {
        let mut c = Config::default();
        c.apply_env(env(&[
            ("CASEFORGE_MODEL", "claude-opus-4-20250514"),
            ("CASEFORGE_MAX_TOKENS", "1024"),
            ("CASEFORGE_TEMPERATURE", "0.1"),
            ("CASEFORGE_MIN_WORDS", "50"),
            ("CASEFORGE_MAX_WORDS", "90"),
        ]))
        .unwrap();
        assert_eq!(c.model.id, "claude-opus-4-20250514");
        assert_eq!(c.model.max_tokens, 1024);
        assert!((c.model.temperature - 0.1).abs() < 1e-6);
        assert_eq!(c.generation.min_words, 50);
        assert_eq!(c.generation.max_words, 90);
    }

    #[test]
    fn test_env_override_invalid_number() {
        let mut c = Config::default();
        let err = c
            .apply_env(env(&[("CASEFORGE_MAX_TOKENS", "lots")]))
            .unwrap_err();
        assert!(err.to_string().contains("CASEFORGE_MAX_TOKENS"));
    }

    #[test]
    fn test_validate_word_bounds() {
        let mut c = Config::default();
        c.generation.min_words = 500;
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_resolve_api_key_from_env() {
        let key = resolve_api_key(env(&[("ANTHROPIC_API_KEY", " sk-test \n")])).unwrap();
        assert_eq!(key, "sk-test");
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = Config::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = Config::default();
        let serialized = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(deserialized.model.id, config.model.id);
        assert_eq!(deserialized.curation.max_cases, config.curation.max_cases);
    }
}
