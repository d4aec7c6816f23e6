// src/planner/mod.rs — Scenario matrix planner
//
// Derives a coverage-balanced BatchPlan from signal groups: every downstream
// task × intent slice, round-robin over groups, with a bounded number of
// attempts per slice. Falls back to a legacy planning input when no usable
// signal groups exist.

pub mod domains;
pub mod legacy;
pub mod signals;
pub mod strategy;

use chrono::Utc;
use std::collections::BTreeMap;

use crate::core::types::*;
use crate::infra::config::PlannerConfig;
use crate::infra::errors::ForgeError;
use domains::resolve_domain;
use legacy::LegacyPlanningInput;
use signals::{Signal, SignalGroup};

/// Review lenses rotated across scenarios for diversity accounting.
pub const REVIEW_ARCHETYPES: [&str; 5] = [
    "process_auditor",
    "preventability_detective",
    "documentation_sleuth",
    "exclusion_hunter",
    "timeline_reconstructor",
];

/// Order in which non-ambiguity slices receive distractors when topping up
/// the doubt ratio.
const DISTRACTOR_ORDER: [IntentSlice; 3] = [
    IntentSlice::Safety,
    IntentSlice::Synthesis,
    IntentSlice::Knowledge,
];

pub struct ScenarioMatrixPlanner {
    config: PlannerConfig,
    stamp: String,
}

impl ScenarioMatrixPlanner {
    pub fn new(config: PlannerConfig) -> Self {
        Self {
            config,
            stamp: Utc::now().format("%Y%m%d%H%M%S").to_string(),
        }
    }

    /// Override the id suffix (tests and reproducible re-plans).
    pub fn with_stamp(mut self, stamp: impl Into<String>) -> Self {
        self.stamp = stamp.into();
        self
    }

    /// Build a plan for `target_id`. Empty `groups` takes the legacy fallback.
    pub fn plan(
        &self,
        target_id: &str,
        groups: &[SignalGroup],
        legacy: Option<&LegacyPlanningInput>,
    ) -> anyhow::Result<BatchPlan> {
        let domain = resolve_domain(target_id)?;
        let usable: Vec<&SignalGroup> = groups.iter().filter(|g| g.has_signals()).collect();

        let (mut scenarios, shortfalls, source, per_task) = if usable.is_empty() {
            tracing::warn!(
                "No usable signal groups for {}; falling back to legacy plan",
                target_id
            );
            let date = self.stamp.get(..8).unwrap_or(self.stamp.as_str()).to_string();
            let input = legacy
                .cloned()
                .unwrap_or_else(|| LegacyPlanningInput::default_for(target_id, domain, &date));
            (
                self.legacy_scenarios(&input),
                Vec::new(),
                PlanSource::LegacyFallback,
                IntentSlice::legacy_target_count as fn(&IntentSlice) -> usize,
            )
        } else {
            let (scenarios, shortfalls) = self.matrix_scenarios(&usable);
            (
                scenarios,
                shortfalls,
                PlanSource::SignalGroups,
                IntentSlice::target_count as fn(&IntentSlice) -> usize,
            )
        };

        let doubt_goal = self.balance_doubt(&mut scenarios);

        let slice_targets: BTreeMap<IntentSlice, usize> = IntentSlice::ALL
            .iter()
            .map(|s| (*s, per_task(s) * DownstreamTask::ALL.len()))
            .collect();

        let plan = BatchPlan {
            target_id: target_id.to_string(),
            domain: domain.name.to_string(),
            scenarios,
            coverage_goals: CoverageGoals {
                min_scenarios: self.config.min_scenarios,
                doubt_ratio: doubt_goal,
                slice_targets,
            },
            source,
            shortfalls,
            generated_at: Utc::now(),
        };

        validate_plan(&plan)?;
        tracing::info!(
            "Planned {} scenario(s) for {} ({}), doubt ratio {:.2}",
            plan.scenarios.len(),
            plan.target_id,
            plan.domain,
            plan.realized_doubt_ratio()
        );
        Ok(plan)
    }

    /// Round-robin over groups for every (task, slice) until the slice target
    /// is met or the attempt bound is exhausted.
    fn matrix_scenarios(&self, groups: &[&SignalGroup]) -> (Vec<ScenarioSpec>, Vec<SliceShortfall>) {
        let mut scenarios = Vec::new();
        let mut shortfalls = Vec::new();

        for task in DownstreamTask::ALL {
            for intent in IntentSlice::ALL {
                let target = intent.target_count();
                let max_attempts = target * self.config.max_attempt_factor.max(1);
                let mut produced = 0usize;
                let mut attempts = 0usize;

                while produced < target && attempts < max_attempts {
                    let group_idx = attempts % groups.len();
                    attempts += 1;

                    let ordinal = produced + 1;
                    let archetype = REVIEW_ARCHETYPES[scenarios.len() % REVIEW_ARCHETYPES.len()];
                    if let Some(spec) =
                        self.matrix_scenario(task, intent, groups, group_idx, ordinal, archetype)
                    {
                        scenarios.push(spec);
                        produced += 1;
                    }
                }

                if produced < target {
                    tracing::warn!(
                        "Slice {}/{} under-populated: {}/{} after {} attempts",
                        task,
                        intent,
                        produced,
                        target,
                        attempts
                    );
                    shortfalls.push(SliceShortfall {
                        task,
                        intent,
                        requested: target,
                        produced,
                    });
                }
            }
        }

        (scenarios, shortfalls)
    }

    /// One scenario for a (task, slice, group) slot, or `None` when the group
    /// cannot seed this slice.
    fn matrix_scenario(
        &self,
        task: DownstreamTask,
        intent: IntentSlice,
        groups: &[&SignalGroup],
        group_idx: usize,
        ordinal: usize,
        archetype: &str,
    ) -> Option<ScenarioSpec> {
        let group = groups[group_idx];

        let description = match intent {
            IntentSlice::Knowledge => {
                let signal = pick(group.facts(), ordinal).or_else(|| pick(group.signals.iter(), ordinal))?;
                format!(
                    "{}: the record clearly documents {} ({}); the output must recall it verbatim.",
                    task, signal.description, group.name
                )
            }
            IntentSlice::Ambiguity => {
                let signal = pick(group.signals.iter(), ordinal)?;
                format!(
                    "{}: documentation about {} ({}) is contradictory or incomplete; the output must surface the doubt.",
                    task, signal.description, group.name
                )
            }
            IntentSlice::Safety => {
                let exclusion = pick(group.exclusions(), ordinal)?;
                format!(
                    "{}: hard negative, {} is present ({}); the case must not be flagged.",
                    task, exclusion.description, group.name
                )
            }
            IntentSlice::Synthesis => {
                if groups.len() < 2 {
                    return None;
                }
                let partner = groups[(group_idx + 1) % groups.len()];
                let a = pick(group.signals.iter(), ordinal)?;
                let b = pick(partner.signals.iter(), ordinal)?;
                format!(
                    "{}: linking {} ({}) with {} ({}) across separate notes is required.",
                    task, a.description, group.name, b.description, partner.name
                )
            }
        };

        Some(ScenarioSpec {
            id: self.scenario_id(task, intent, &group.id, ordinal),
            description,
            archetype: archetype.to_string(),
            intent,
            task,
            signal_group: group.id.clone(),
            perturbations: forced_perturbations(intent, ordinal),
        })
    }

    /// Generic scenarios derived from a legacy planning input.
    fn legacy_scenarios(&self, input: &LegacyPlanningInput) -> Vec<ScenarioSpec> {
        let requirements = input.requirements();
        let population = input
            .target_population
            .as_deref()
            .unwrap_or("the target population");
        let mut scenarios = Vec::new();

        for task in DownstreamTask::ALL {
            for intent in IntentSlice::ALL {
                for ordinal in 1..=intent.legacy_target_count() {
                    let requirement = &requirements[(ordinal - 1) % requirements.len()];
                    let lens = match intent {
                        IntentSlice::Knowledge => "straightforward documentation of",
                        IntentSlice::Ambiguity => "conflicting documentation of",
                        IntentSlice::Safety => "a near-miss that should not count toward",
                        IntentSlice::Synthesis => "evidence spread across notes for",
                    };
                    let archetype = REVIEW_ARCHETYPES[scenarios.len() % REVIEW_ARCHETYPES.len()];
                    scenarios.push(ScenarioSpec {
                        id: self.scenario_id(task, intent, "legacy", ordinal),
                        description: format!(
                            "{}: {} {} in {} ({}).",
                            task, lens, requirement, population, input.concern
                        ),
                        archetype: archetype.to_string(),
                        intent,
                        task,
                        signal_group: "legacy".into(),
                        perturbations: forced_perturbations(intent, ordinal),
                    });
                }
            }
        }
        scenarios
    }

    /// Top up doubt-tagged scenarios with distractors until the configured
    /// ratio is met. Returns the goal the plan can honestly claim.
    fn balance_doubt(&self, scenarios: &mut [ScenarioSpec]) -> f64 {
        let total = scenarios.len();
        if total == 0 {
            return self.config.doubt_ratio;
        }
        let target = (self.config.doubt_ratio * total as f64).round() as usize;
        let mut current = scenarios.iter().filter(|s| s.is_doubt()).count();

        'outer: for slice in DISTRACTOR_ORDER {
            for s in scenarios.iter_mut().filter(|s| s.intent == slice) {
                if current >= target {
                    break 'outer;
                }
                if !s.is_doubt() {
                    s.perturbations.push(Perturbation::Distractor);
                    current += 1;
                }
            }
        }

        let realized = current as f64 / total as f64;
        if (realized - self.config.doubt_ratio).abs() > 1.0 / total as f64 {
            tracing::warn!(
                "Configured doubt ratio {:.2} unattainable; plan records {:.2}",
                self.config.doubt_ratio,
                realized
            );
            realized
        } else {
            self.config.doubt_ratio
        }
    }

    fn scenario_id(&self, task: DownstreamTask, intent: IntentSlice, group: &str, ordinal: usize) -> String {
        format!(
            "{}-{}-{}-{:03}-{}",
            task,
            intent,
            slug::slugify(group),
            ordinal,
            self.stamp
        )
    }
}

/// Rotate through a signal iterator by ordinal.
fn pick<'a>(signals: impl Iterator<Item = &'a Signal>, ordinal: usize) -> Option<&'a Signal> {
    let all: Vec<&Signal> = signals.collect();
    if all.is_empty() {
        return None;
    }
    Some(all[(ordinal - 1) % all.len()])
}

/// Ambiguity scenarios are always doubt-tagged.
fn forced_perturbations(intent: IntentSlice, ordinal: usize) -> Vec<Perturbation> {
    match intent {
        IntentSlice::Ambiguity if ordinal % 2 == 1 => vec![Perturbation::Conflict],
        IntentSlice::Ambiguity => vec![Perturbation::MissingData],
        _ => Vec::new(),
    }
}

/// Check the plan invariants: minimum size, slice accounting, doubt tolerance.
pub fn validate_plan(plan: &BatchPlan) -> Result<(), ForgeError> {
    let total = plan.scenarios.len();
    if total < plan.coverage_goals.min_scenarios {
        return Err(ForgeError::config(format!(
            "plan for {} has {} scenario(s), below the minimum of {}",
            plan.target_id, total, plan.coverage_goals.min_scenarios
        )));
    }

    let counted: usize = plan.slice_counts().values().sum();
    if counted != total {
        return Err(ForgeError::config(format!(
            "slice counts ({counted}) do not add up to scenario count ({total})"
        )));
    }

    let drift = (plan.realized_doubt_ratio() - plan.coverage_goals.doubt_ratio).abs();
    if drift > plan.doubt_tolerance() + f64::EPSILON {
        return Err(ForgeError::config(format!(
            "doubt ratio {:.3} outside tolerance of goal {:.3}",
            plan.realized_doubt_ratio(),
            plan.coverage_goals.doubt_ratio
        )));
    }

    let mut ids = std::collections::HashSet::new();
    if let Some(dup) = plan.scenarios.iter().find(|s| !ids.insert(s.id.as_str())) {
        return Err(ForgeError::config(format!("duplicate scenario id '{}'", dup.id)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use signals::SignalKind;

    fn signal(id: &str, kind: SignalKind) -> Signal {
        Signal {
            id: id.into(),
            description: format!("{id} documented"),
            kind,
        }
    }

    fn group(id: &str, signals: Vec<Signal>) -> SignalGroup {
        SignalGroup {
            id: id.into(),
            name: id.to_uppercase(),
            signals,
        }
    }

    fn planner() -> ScenarioMatrixPlanner {
        ScenarioMatrixPlanner::new(PlannerConfig::default()).with_stamp("20261019120000")
    }

    fn full_groups() -> Vec<SignalGroup> {
        vec![
            group(
                "ssi",
                vec![
                    signal("wound_culture", SignalKind::Fact),
                    signal("superficial_only", SignalKind::Exclusion),
                ],
            ),
            group("readmission", vec![signal("return_30d", SignalKind::Fact)]),
        ]
    }

    #[test]
    fn test_full_matrix_counts() {
        let plan = planner().plan("I25", &full_groups(), None).unwrap();
        assert_eq!(plan.source, PlanSource::SignalGroups);
        assert_eq!(plan.scenarios.len(), 150);
        let counts = plan.slice_counts();
        assert_eq!(counts[&IntentSlice::Knowledge], 60);
        assert_eq!(counts[&IntentSlice::Ambiguity], 45);
        assert_eq!(counts[&IntentSlice::Safety], 30);
        assert_eq!(counts[&IntentSlice::Synthesis], 15);
        assert!(plan.shortfalls.is_empty());
        assert_eq!(plan.domain, "Orthopedics");
    }

    #[test]
    fn test_ambiguity_always_doubt() {
        let plan = planner().plan("I25", &full_groups(), None).unwrap();
        assert!(plan
            .scenarios
            .iter()
            .filter(|s| s.intent == IntentSlice::Ambiguity)
            .all(|s| s.is_doubt()));
    }

    #[test]
    fn test_doubt_ratio_within_tolerance() {
        let plan = planner().plan("I25", &full_groups(), None).unwrap();
        let drift = (plan.realized_doubt_ratio() - plan.coverage_goals.doubt_ratio).abs();
        assert!(drift <= plan.doubt_tolerance());
    }

    #[test]
    fn test_higher_doubt_ratio_adds_distractors() {
        let config = PlannerConfig {
            doubt_ratio: 0.5,
            ..Default::default()
        };
        let plan = ScenarioMatrixPlanner::new(config)
            .with_stamp("s")
            .plan("I25", &full_groups(), None)
            .unwrap();
        assert_eq!(plan.doubt_count(), 75);
        assert!(plan
            .scenarios
            .iter()
            .any(|s| s.perturbations.contains(&Perturbation::Distractor)));
        // Safety is topped up first
        assert!(plan
            .scenarios
            .iter()
            .filter(|s| s.intent == IntentSlice::Safety)
            .all(|s| s.is_doubt()));
    }

    #[test]
    fn test_low_doubt_goal_records_forced_share() {
        let config = PlannerConfig {
            doubt_ratio: 0.0,
            ..Default::default()
        };
        let plan = ScenarioMatrixPlanner::new(config)
            .with_stamp("s")
            .plan("I25", &full_groups(), None)
            .unwrap();
        assert!((plan.coverage_goals.doubt_ratio - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_missing_exclusions_reported_as_shortfall() {
        let groups = vec![
            group("a", vec![signal("x", SignalKind::Fact)]),
            group("b", vec![signal("y", SignalKind::Fact)]),
        ];
        let plan = planner().plan("E1", &groups, None).unwrap();
        let safety: Vec<_> = plan
            .shortfalls
            .iter()
            .filter(|s| s.intent == IntentSlice::Safety)
            .collect();
        assert_eq!(safety.len(), 3);
        assert!(safety.iter().all(|s| s.produced == 0 && s.requested == 10));
        assert_eq!(plan.scenarios.len(), 120);
    }

    #[test]
    fn test_single_group_cannot_synthesize() {
        let groups = vec![group(
            "solo",
            vec![
                signal("x", SignalKind::Fact),
                signal("no", SignalKind::Exclusion),
            ],
        )];
        let plan = planner().plan("C41.1a", &groups, None).unwrap();
        assert_eq!(plan.slice_counts().get(&IntentSlice::Synthesis), None);
        assert_eq!(plan.shortfalls.len(), 3);
    }

    #[test]
    fn test_empty_groups_fall_back_to_legacy() {
        let plan = planner().plan("C41.1a", &[], None).unwrap();
        assert_eq!(plan.source, PlanSource::LegacyFallback);
        assert_eq!(plan.scenarios.len(), 30);
        assert!(plan.scenarios.len() >= plan.coverage_goals.min_scenarios);
        assert!(plan.scenarios[0]
            .description
            .contains("USNWR Endocrinology quality metric reporting"));
    }

    #[test]
    fn test_groups_without_signals_fall_back() {
        let plan = planner()
            .plan("C41.1a", &[group("hollow", vec![])], None)
            .unwrap();
        assert_eq!(plan.source, PlanSource::LegacyFallback);
    }

    #[test]
    fn test_scenario_ids_deterministic_and_unique() {
        let a = planner().plan("I25", &full_groups(), None).unwrap();
        let b = planner().plan("I25", &full_groups(), None).unwrap();
        let ids_a: Vec<_> = a.scenarios.iter().map(|s| s.id.clone()).collect();
        let ids_b: Vec<_> = b.scenarios.iter().map(|s| s.id.clone()).collect();
        assert_eq!(ids_a, ids_b);
        assert_eq!(ids_a[0], "event_summary-knowledge-ssi-001-20261019120000");
        let unique: std::collections::HashSet<_> = ids_a.iter().collect();
        assert_eq!(unique.len(), ids_a.len());
    }

    #[test]
    fn test_unmapped_target_rejected() {
        assert!(planner().plan("Z1", &full_groups(), None).is_err());
    }

    #[test]
    fn test_below_minimum_rejected() {
        let config = PlannerConfig {
            min_scenarios: 500,
            ..Default::default()
        };
        let result = ScenarioMatrixPlanner::new(config).plan("I25", &full_groups(), None);
        assert!(result.is_err());
    }

    #[test]
    fn test_archetypes_rotate() {
        let plan = planner().plan("I25", &full_groups(), None).unwrap();
        let distinct: std::collections::HashSet<_> =
            plan.scenarios.iter().map(|s| s.archetype.as_str()).collect();
        assert_eq!(distinct.len(), REVIEW_ARCHETYPES.len());
    }
}
