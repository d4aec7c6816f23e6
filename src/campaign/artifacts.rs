// src/campaign/artifacts.rs — Artifact kinds recognized by filename suffix

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::infra::paths::{CASES_SUFFIX, PLAN_SUFFIX, REPORT_SUFFIX, STRATEGY_SUFFIX};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Plan,
    Strategy,
    TestCases,
    EvalReport,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 4] = [
        ArtifactKind::Plan,
        ArtifactKind::Strategy,
        ArtifactKind::TestCases,
        ArtifactKind::EvalReport,
    ];

    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Plan => PLAN_SUFFIX,
            Self::Strategy => STRATEGY_SUFFIX,
            Self::TestCases => CASES_SUFFIX,
            Self::EvalReport => REPORT_SUFFIX,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::Strategy => "strategy",
            Self::TestCases => "test_cases",
            Self::EvalReport => "eval_report",
        }
    }

    /// Classify a file name (or template) by its suffix.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| name.ends_with(k.suffix()))
    }

    pub fn classify(path: &Path) -> Option<Self> {
        path.file_name()
            .and_then(|n| n.to_str())
            .and_then(Self::from_name)
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_suffixes() {
        assert_eq!(ArtifactKind::classify(Path::new("out/I25.plan.json")), Some(ArtifactKind::Plan));
        assert_eq!(
            ArtifactKind::classify(Path::new("I25.strategy.json")),
            Some(ArtifactKind::Strategy)
        );
        assert_eq!(
            ArtifactKind::classify(Path::new("cases/I25_batch_1.cases.json")),
            Some(ArtifactKind::TestCases)
        );
        assert_eq!(
            ArtifactKind::classify(Path::new("I25.report.json")),
            Some(ArtifactKind::EvalReport)
        );
    }

    #[test]
    fn test_classify_unknown() {
        assert_eq!(ArtifactKind::classify(Path::new("I25.json")), None);
        assert_eq!(ArtifactKind::classify(Path::new("I25.digest.csv")), None);
    }

    #[test]
    fn test_kind_serde() {
        let k: ArtifactKind = serde_json::from_str("\"test_cases\"").unwrap();
        assert_eq!(k, ArtifactKind::TestCases);
        assert_eq!(k.to_string(), "test_cases");
    }
}
