// src/evaluator/engine.rs — The system under test

use async_trait::async_trait;
use std::sync::Arc;

use crate::core::types::TestCase;
use crate::infra::errors::ForgeError;
use crate::provider::{ChatRequest, Message, ModelProvider};

/// Anything that turns a case narrative into a review artifact.
#[async_trait]
pub trait Engine: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, case: &TestCase) -> Result<String, ForgeError>;
}

/// Runs the prompt under evaluation: prompt text as the system prompt, the
/// case narrative as the user message.
pub struct PromptEngine {
    provider: Arc<dyn ModelProvider>,
    model: String,
    prompt: String,
    max_tokens: u32,
}

impl PromptEngine {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        model: impl Into<String>,
        prompt: impl Into<String>,
        max_tokens: u32,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            prompt: prompt.into(),
            max_tokens,
        }
    }
}

#[async_trait]
impl Engine for PromptEngine {
    fn name(&self) -> &str {
        "prompt"
    }

    async fn run(&self, case: &TestCase) -> Result<String, ForgeError> {
        let mut user = String::new();
        if let Some(title) = &case.narrative_payload.title {
            user.push_str(&format!("# {title}\n\n"));
        }
        user.push_str(&case.narrative_payload.narrative);

        let response = self
            .provider
            .chat(ChatRequest {
                model: self.model.clone(),
                messages: vec![Message::user(user)],
                max_tokens: Some(self.max_tokens),
                // Deterministic output for grading
                temperature: Some(0.0),
                system: Some(self.prompt.clone()),
            })
            .await?;

        if response.content.trim().is_empty() {
            return Err(ForgeError::Provider {
                provider: self.provider.id().to_string(),
                message: format!("empty engine output for {}", case.test_id),
                retriable: false,
            });
        }
        Ok(response.content)
    }
}
