// tests/curator_test.rs — Integration test: golden-set curation from a report and case pool

use std::collections::BTreeMap;

use chrono::Utc;
use pretty_assertions::assert_eq;

use caseforge::core::state;
use caseforge::core::types::*;
use caseforge::curator::pool::CasePool;
use caseforge::curator::{previous_level, write_golden, CurationOutcome, GoldenSetCurator};
use caseforge::infra::config::CurationConfig;

fn case(ordinal: usize, archetype: &str) -> TestCase {
    TestCase {
        test_id: canonical_test_id("H12", 1, ordinal),
        target_id: "H12".into(),
        narrative_payload: NarrativePayload {
            narrative: format!("Narrative {ordinal}"),
            title: Some(format!("Case {ordinal}")),
        },
        expectations: Expectations {
            must_find: vec![format!("Narrative {ordinal}")],
            required_fields: vec!["summary".into()],
        },
        metadata: CaseMetadata {
            generated_at: Utc::now(),
            batch_index: 1,
            scenario_ref: format!("event_summary-knowledge-g-{ordinal:03}-20261019090000"),
            seed: Some(4),
            archetype: archetype.into(),
            intent: IntentSlice::Knowledge,
            generator_version: "test".into(),
        },
    }
}

fn result(test_id: &str, label: Label, recall: f64, rubric: f64) -> EvalResult {
    let mut scores = BTreeMap::new();
    scores.insert(CRITERION_RECALL.to_string(), recall);
    scores.insert(CRITERION_RUBRIC.to_string(), rubric);
    EvalResult {
        test_id: test_id.into(),
        target_id: "H12".into(),
        label,
        scores,
        grading_details: GradingDetails::default(),
        engine_output: String::new(),
        error: None,
    }
}

fn report(results: Vec<EvalResult>) -> EvalReport {
    EvalReport {
        metadata: ReportMetadata {
            run_id: "run-7".into(),
            target_id: "H12".into(),
            prompt_path: "prompts/review.md".into(),
            prompt_version: "abc123".into(),
            model: "m".into(),
            judge_model: "j".into(),
            cases_source: "cases".into(),
            rubric_threshold: 0.7,
            min_pass_rate: 0.8,
            gate_passed: true,
            generated_at: Utc::now(),
        },
        summary: ReportSummary::default(),
        results,
    }
}

fn pool_dir(cases: &[TestCase]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    state::write_json_atomic(&dir.path().join("H12_batch_1.cases.json"), &cases.to_vec()).unwrap();
    dir
}

#[test]
fn test_small_failure_set_is_taken_whole() {
    // Five failures across two archetypes (3 + 2): all five are selected.
    let cases: Vec<TestCase> = (1..=8)
        .map(|i| case(i, if i <= 4 { "handoff_gap" } else { "lab_trend" }))
        .collect();
    let dir = pool_dir(&cases);
    let pool = CasePool::load(dir.path()).unwrap();

    let results = vec![
        result("H12-BATCH1-001", Label::Fail, 0.5, 0.8),
        result("H12-BATCH1-002", Label::Fail, 0.0, 0.9),
        result("H12-BATCH1-003", Label::Fail, 0.2, 0.4),
        result("H12-BATCH1-004", Label::Pass, 1.0, 0.9),
        result("H12-BATCH1-005", Label::Fail, 0.0, 0.3),
        result("H12-BATCH1-006", Label::Fail, 0.75, 0.6),
        result("H12-BATCH1-007", Label::Ambiguous, 1.0, 0.0),
        result("H12-BATCH1-008", Label::Pass, 1.0, 1.0),
    ];

    let outcome = GoldenSetCurator::new(CurationConfig::default())
        .curate(&report(results), "H12.report.json", &pool, 0)
        .unwrap();
    let CurationOutcome::Curated(golden) = outcome else {
        panic!("expected a curated set");
    };

    assert_eq!(golden.level, 1);
    assert_eq!(golden.scenario_count, 5);
    let ids: Vec<&str> = golden.test_cases.iter().map(|c| c.test_id.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            "H12-BATCH1-005",
            "H12-BATCH1-002",
            "H12-BATCH1-003",
            "H12-BATCH1-001",
            "H12-BATCH1-006",
        ]
    );
    assert_eq!(golden.batch_plan.failures_considered, 5);
    assert_eq!(golden.batch_plan.backfilled, 0);
    assert_eq!(golden.batch_plan.archetype_counts["handoff_gap"], 3);
    assert_eq!(golden.batch_plan.archetype_counts["lab_trend"], 2);
    assert_eq!(golden.batch_plan.prompt_version, "abc123");

    // Copied from the pool unchanged.
    for c in &golden.test_cases {
        assert_eq!(Some(c), pool.get(&c.test_id));
    }
}

#[test]
fn test_cap_and_backfill_bound_the_set() {
    // Twenty failures of one archetype and two of another.
    let cases: Vec<TestCase> = (1..=22)
        .map(|i| case(i, if i <= 20 { "handoff_gap" } else { "lab_trend" }))
        .collect();
    let dir = pool_dir(&cases);
    let pool = CasePool::load(dir.path()).unwrap();

    let results = cases
        .iter()
        .enumerate()
        .map(|(i, c)| result(&c.test_id, Label::Fail, i as f64 / 100.0, 0.5))
        .collect();

    let outcome = GoldenSetCurator::new(CurationConfig::default())
        .curate(&report(results), "H12.report.json", &pool, 2)
        .unwrap();
    let CurationOutcome::Curated(golden) = outcome else {
        panic!("expected a curated set");
    };

    assert_eq!(golden.level, 3);
    assert_eq!(golden.test_cases.len(), 12);
    assert_eq!(golden.batch_plan.archetype_counts["lab_trend"], 2);
    assert_eq!(golden.batch_plan.archetype_counts["handoff_gap"], 10);
    // 3 handoff + 2 lab in the diversity pass; the rest backfilled.
    assert_eq!(golden.batch_plan.backfilled, 7);
}

#[test]
fn test_zero_failures_is_ready_for_next_level() {
    let cases = vec![case(1, "handoff_gap"), case(2, "lab_trend")];
    let pool = CasePool::from_cases(cases.clone());
    let results = vec![
        result("H12-BATCH1-001", Label::Pass, 1.0, 0.9),
        result("H12-BATCH1-002", Label::Ambiguous, 1.0, 0.0),
    ];

    let outcome = GoldenSetCurator::new(CurationConfig::default())
        .curate(&report(results), "H12.report.json", &pool, 4)
        .unwrap();
    assert_eq!(outcome, CurationOutcome::ReadyForNextLevel { level: 4 });
}

#[test]
fn test_failure_missing_from_pool_is_an_error() {
    let pool = CasePool::from_cases(vec![case(1, "handoff_gap")]);
    let results = vec![result("H12-BATCH9-001", Label::Fail, 0.0, 0.1)];
    let err = GoldenSetCurator::new(CurationConfig::default())
        .curate(&report(results), "H12.report.json", &pool, 0)
        .unwrap_err();
    assert!(err.to_string().contains("H12-BATCH9-001"));
}

#[test]
fn test_levels_advance_across_writes() {
    let dir = tempfile::tempdir().unwrap();
    let golden_path = dir.path().join("H12.golden.json");
    assert_eq!(previous_level(&golden_path).unwrap(), 0);

    let pool = CasePool::from_cases(vec![case(1, "handoff_gap")]);
    let curator = GoldenSetCurator::new(CurationConfig::default());
    for expected in 1..=2 {
        let level = previous_level(&golden_path).unwrap();
        let results = vec![result("H12-BATCH1-001", Label::Fail, 0.0, 0.2)];
        match curator
            .curate(&report(results), "H12.report.json", &pool, level)
            .unwrap()
        {
            CurationOutcome::Curated(golden) => write_golden(&golden_path, &golden).unwrap(),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(previous_level(&golden_path).unwrap(), expected);
    }
}
