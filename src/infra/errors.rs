// src/infra/errors.rs — Error types for caseforge

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForgeError {
    // Configuration errors (fatal, nothing has been written yet)
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("No API credential found. Set ANTHROPIC_API_KEY or save one under {0}")]
    MissingCredential(PathBuf),

    #[error("Required file not found: {}", path.display())]
    MissingFile { path: PathBuf },

    // Unit-of-work errors (recovered at the enclosing batch/case/flight)
    #[error("Generation failed for batch {batch_index}: {message}")]
    Generation { batch_index: u32, message: String },

    #[error("Step '{step}' failed for target '{target_id}': {message}")]
    StepExecution {
        target_id: String,
        step: String,
        message: String,
    },

    #[error("Grading failed for '{test_id}': {message}")]
    Grading { test_id: String, message: String },

    #[error("Invalid flight transition for '{target_id}': {from} -> {to}")]
    InvalidTransition {
        target_id: String,
        from: String,
        to: String,
    },

    // Provider errors
    #[error("Provider '{provider}' error: {message}")]
    Provider {
        provider: String,
        message: String,
        retriable: bool,
    },

    #[error("Rate limited by '{provider}', retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    // Infra
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ForgeError {
    /// Configuration problems abort the process before any work is done.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ForgeError::Configuration(_)
                | ForgeError::MissingCredential(_)
                | ForgeError::MissingFile { .. }
        )
    }

    pub fn config(message: impl Into<String>) -> Self {
        ForgeError::Configuration(message.into())
    }

    pub fn generation(batch_index: u32, message: impl Into<String>) -> Self {
        ForgeError::Generation {
            batch_index,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(ForgeError::config("bad").is_fatal());
        assert!(ForgeError::MissingCredential(PathBuf::from("/tmp")).is_fatal());
        assert!(ForgeError::MissingFile {
            path: PathBuf::from("plan.json")
        }
        .is_fatal());
        assert!(!ForgeError::generation(1, "empty").is_fatal());
        assert!(!ForgeError::Grading {
            test_id: "t".into(),
            message: "timeout".into()
        }
        .is_fatal());
    }

    #[test]
    fn test_display_messages() {
        let e = ForgeError::generation(3, "missing test_cases");
        assert_eq!(
            e.to_string(),
            "Generation failed for batch 3: missing test_cases"
        );

        let e = ForgeError::StepExecution {
            target_id: "I25".into(),
            step: "evaluate".into(),
            message: "exit status 2".into(),
        };
        assert!(e.to_string().contains("'evaluate'"));
        assert!(e.to_string().contains("'I25'"));
    }
}
