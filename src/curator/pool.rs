// src/curator/pool.rs — Index of generated cases for re-hydration

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::core::state;
use crate::core::types::TestCase;
use crate::infra::errors::ForgeError;
use crate::infra::paths::CASES_SUFFIX;

/// Every case found in a directory of batch files, keyed by test id.
/// Cases are kept exactly as deserialized from disk.
#[derive(Debug, Default)]
pub struct CasePool {
    cases: HashMap<String, TestCase>,
    sources: Vec<PathBuf>,
}

impl CasePool {
    pub fn load(dir: &Path) -> anyhow::Result<Self> {
        if !dir.is_dir() {
            return Err(ForgeError::MissingFile {
                path: dir.to_path_buf(),
            }
            .into());
        }

        let mut pool = CasePool::default();
        let pattern = dir.join(format!("*{CASES_SUFFIX}"));
        for entry in glob::glob(&pattern.to_string_lossy())? {
            let path = entry?;
            let batch: Vec<TestCase> = state::read_json(&path)?;
            tracing::debug!("Indexed {} case(s) from {}", batch.len(), path.display());
            for case in batch {
                pool.insert(case);
            }
            pool.sources.push(path);
        }
        Ok(pool)
    }

    pub fn from_cases(cases: impl IntoIterator<Item = TestCase>) -> Self {
        let mut pool = CasePool::default();
        for case in cases {
            pool.insert(case);
        }
        pool
    }

    fn insert(&mut self, case: TestCase) {
        if self.cases.contains_key(&case.test_id) {
            tracing::warn!("Duplicate test id {} in pool; keeping first", case.test_id);
            return;
        }
        self.cases.insert(case.test_id.clone(), case);
    }

    pub fn get(&self, test_id: &str) -> Option<&TestCase> {
        self.cases.get(test_id)
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }
}
