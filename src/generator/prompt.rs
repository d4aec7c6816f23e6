// src/generator/prompt.rs — Prompt templates for case generation

use minijinja::{context, Environment};
use serde::Serialize;

use crate::core::types::ScenarioSpec;
use crate::infra::config::GenerationConfig;

const SYSTEM_TEMPLATE: &str = "\
You write synthetic clinical case narratives used to test a quality-review assistant.
Domain: {{ domain }}. Metric: {{ target_id }}.

For every scenario you are given:
1. Write one realistic clinical narrative of {{ min_words }}-{{ max_words }} words consistent with the scenario.
2. Copy at most {{ max_must_find }} short phrases VERBATIM from that narrative that a reviewer must find.
3. Echo the scenario's id unchanged as `scenario_ref`.

Do not include real patient identifiers. Respond with JSON only, no commentary:
{\"test_cases\": [{\"scenario_ref\": \"...\", \"title\": \"...\", \"narrative\": \"...\", \"must_find\": [\"...\"]}]}";

const USER_TEMPLATE: &str = "\
Batch {{ batch_index }}{% if seed is not none %} (variation seed {{ seed }}){% endif %}.
Write exactly {{ scenarios | length }} case(s), one per scenario:
{% for s in scenarios %}
- id: {{ s.id }}
  task: {{ s.task }}
  intent: {{ s.intent }}
  review lens: {{ s.archetype }}
  {%- if s.perturbations %}
  perturbations: {{ s.perturbations | join(\", \") }}
  {%- endif %}
  scenario: {{ s.description }}
{% endfor %}";

#[derive(Serialize)]
struct ScenarioView<'a> {
    id: &'a str,
    task: &'a str,
    intent: &'a str,
    archetype: &'a str,
    perturbations: Vec<&'static str>,
    description: &'a str,
}

pub struct GenerationPrompt {
    pub system: String,
    pub user: String,
}

/// Render the system/user prompt pair for one sub-batch.
pub fn build_prompt(
    target_id: &str,
    domain: &str,
    batch_index: u32,
    scenarios: &[ScenarioSpec],
    seed: Option<u64>,
    config: &GenerationConfig,
) -> anyhow::Result<GenerationPrompt> {
    let mut env = Environment::new();
    env.add_template("system", SYSTEM_TEMPLATE)?;
    env.add_template("user", USER_TEMPLATE)?;

    let views: Vec<ScenarioView<'_>> = scenarios
        .iter()
        .map(|s| ScenarioView {
            id: &s.id,
            task: s.task.as_str(),
            intent: s.intent.as_str(),
            archetype: &s.archetype,
            perturbations: s.perturbations.iter().map(|p| p.as_str()).collect(),
            description: &s.description,
        })
        .collect();

    let system = env.get_template("system")?.render(context! {
        domain => domain,
        target_id => target_id,
        min_words => config.min_words,
        max_words => config.max_words,
        max_must_find => config.max_must_find,
    })?;
    let user = env.get_template("user")?.render(context! {
        batch_index => batch_index,
        seed => seed,
        scenarios => views,
    })?;

    Ok(GenerationPrompt { system, user })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{DownstreamTask, IntentSlice, Perturbation};

    fn scenario(id: &str, perturbations: Vec<Perturbation>) -> ScenarioSpec {
        ScenarioSpec {
            id: id.into(),
            description: "wound culture documented".into(),
            archetype: "documentation_sleuth".into(),
            intent: IntentSlice::Ambiguity,
            task: DownstreamTask::EventSummary,
            signal_group: "ssi".into(),
            perturbations,
        }
    }

    #[test]
    fn test_system_prompt_carries_bounds() {
        let p = build_prompt(
            "I25",
            "Orthopedics",
            1,
            &[scenario("a", vec![])],
            None,
            &GenerationConfig::default(),
        )
        .unwrap();
        assert!(p.system.contains("120-350 words"));
        assert!(p.system.contains("at most 5"));
        assert!(p.system.contains("Orthopedics"));
    }

    #[test]
    fn test_user_prompt_lists_scenarios() {
        let p = build_prompt(
            "I25",
            "Orthopedics",
            3,
            &[
                scenario("s-1", vec![Perturbation::Conflict]),
                scenario("s-2", vec![]),
            ],
            Some(42),
            &GenerationConfig::default(),
        )
        .unwrap();
        assert!(p.user.contains("Batch 3 (variation seed 42)"));
        assert!(p.user.contains("exactly 2 case(s)"));
        assert!(p.user.contains("id: s-1"));
        assert!(p.user.contains("perturbations: conflict"));
        assert!(p.user.contains("review lens: documentation_sleuth"));
    }

    #[test]
    fn test_user_prompt_without_seed() {
        let p = build_prompt(
            "I25",
            "Orthopedics",
            1,
            &[scenario("s-1", vec![])],
            None,
            &GenerationConfig::default(),
        )
        .unwrap();
        assert!(!p.user.contains("variation seed"));
        assert!(!p.user.contains("perturbations:"));
    }
}
