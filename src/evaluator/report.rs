// src/evaluator/report.rs — Report aggregation and the JSON/CSV artifact pair

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::core::state;
use crate::core::types::*;
use crate::infra::paths::{sibling_with_suffix, DIGEST_SUFFIX, REPORT_SUFFIX};

/// Reduce results to summary statistics.
///
/// Only Pass/Fail results are graded; Ambiguous ones are counted separately
/// and excluded from `total_cases`, `pass_rate` and `avg_scores`.
pub fn summarize(results: &[EvalResult]) -> ReportSummary {
    let pass_count = results.iter().filter(|r| r.label == Label::Pass).count();
    let fail_count = results.iter().filter(|r| r.label == Label::Fail).count();
    let ambiguous_count = results.len() - pass_count - fail_count;
    let total_cases = pass_count + fail_count;

    let pass_rate = if total_cases == 0 {
        0.0
    } else {
        pass_count as f64 / total_cases as f64
    };

    let mut sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for r in results.iter().filter(|r| r.label != Label::Ambiguous) {
        for (criterion, score) in &r.scores {
            let entry = sums.entry(criterion.clone()).or_insert((0.0, 0));
            entry.0 += score;
            entry.1 += 1;
        }
    }
    let avg_scores = sums
        .into_iter()
        .map(|(c, (sum, n))| (c, sum / n as f64))
        .collect();

    ReportSummary {
        total_cases,
        pass_count,
        fail_count,
        ambiguous_count,
        pass_rate,
        avg_scores,
    }
}

/// Assemble a report, deciding the quality gate from the summary.
pub fn build_report(mut metadata: ReportMetadata, results: Vec<EvalResult>) -> EvalReport {
    let summary = summarize(&results);
    metadata.gate_passed = summary.pass_rate >= metadata.min_pass_rate;
    EvalReport {
        metadata,
        summary,
        results,
    }
}

/// Tabular digest: one row per result for quick diffing across runs.
pub fn digest_csv(report: &EvalReport) -> String {
    let mut out = String::from("test_id,target_id,label,composite_score\n");
    for r in &report.results {
        out.push_str(&format!(
            "{},{},{},{:.4}\n",
            csv_field(&r.test_id),
            csv_field(&r.target_id),
            r.label,
            r.composite_score()
        ));
    }
    out
}

/// RFC 4180 quoting: wrap in quotes when the field holds a delimiter,
/// quote or line break, doubling embedded quotes.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Write `*.report.json` and the sibling `*.digest.csv`. Returns both paths.
pub fn write_report(path: &Path, report: &EvalReport) -> anyhow::Result<(PathBuf, PathBuf)> {
    state::write_json_atomic(path, report)?;
    let digest_path = sibling_with_suffix(path, REPORT_SUFFIX, DIGEST_SUFFIX);
    state::write_atomic(&digest_path, digest_csv(report).as_bytes())?;
    Ok((path.to_path_buf(), digest_path))
}

pub fn load_report(path: &Path) -> anyhow::Result<EvalReport> {
    state::read_json(path)
}
