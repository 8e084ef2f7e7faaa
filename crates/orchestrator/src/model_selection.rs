//! Model catalog: client-facing model ids mapped to backends.
//!
//! The catalog is built once at startup. Each [`ModelDescriptor`] carries the
//! brain to call, the backend model name, and whether `<think>` extraction
//! applies. Reasoning descriptors wrap their brain in
//! [`ExtractReasoning`] when they are built, so the step loop never branches
//! on the model id.

use std::sync::Arc;

use brain_core::{Brain, ExtractReasoning};
use indexmap::IndexMap;
use serde::Serialize;

use crate::entitlements::Entitlements;

/// Model id selected when a client does not choose one.
pub const DEFAULT_CHAT_MODEL: &str = "chat-model";

/// Same backend as [`DEFAULT_CHAT_MODEL`] with reasoning extraction.
pub const REASONING_CHAT_MODEL: &str = "chat-model-reasoning";

/// Public description of a model, as listed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub reasoning: bool,
}

/// One selectable chat model.
#[derive(Clone)]
pub struct ModelDescriptor {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Model name sent to the backend.
    pub backend_model: String,
    pub reasoning: bool,
    brain: Arc<dyn Brain>,
}

impl ModelDescriptor {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        brain: Arc<dyn Brain>,
        backend_model: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            backend_model: backend_model.into(),
            reasoning: false,
            brain,
        }
    }

    /// Route output through `<think>` extraction.
    pub fn with_reasoning(mut self) -> Self {
        if !self.reasoning {
            self.brain = Arc::new(ExtractReasoning::new(self.brain));
            self.reasoning = true;
        }
        self
    }

    pub fn brain(&self) -> &Arc<dyn Brain> {
        &self.brain
    }

    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            reasoning: self.reasoning,
        }
    }
}

impl std::fmt::Debug for ModelDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelDescriptor")
            .field("id", &self.id)
            .field("backend", &self.brain.name())
            .field("backend_model", &self.backend_model)
            .field("reasoning", &self.reasoning)
            .finish()
    }
}

/// The lightweight model used to summarize a first message into a title.
#[derive(Clone)]
pub struct TitleModel {
    pub brain: Arc<dyn Brain>,
    pub backend_model: String,
}

/// Every chat model the service can serve, keyed by id.
#[derive(Clone, Default)]
pub struct ModelCatalog {
    models: IndexMap<String, ModelDescriptor>,
    title: Option<TitleModel>,
}

impl ModelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard catalog: `chat-model`, `chat-model-reasoning` and a title
    /// model, all served by one backend.
    pub fn standard(
        brain: Arc<dyn Brain>,
        chat_model: impl Into<String>,
        title_model: impl Into<String>,
    ) -> Self {
        let chat_model = chat_model.into();
        Self::new()
            .with_model(ModelDescriptor::new(
                DEFAULT_CHAT_MODEL,
                "Mistral Large",
                format!("Flagship general model ({}) for high-quality chat.", chat_model),
                brain.clone(),
                chat_model.clone(),
            ))
            .with_model(
                ModelDescriptor::new(
                    REASONING_CHAT_MODEL,
                    "Mistral Large (Reasoning)",
                    "Same model with <think> tag extraction for step-by-step reasoning display.",
                    brain.clone(),
                    chat_model,
                )
                .with_reasoning(),
            )
            .with_title_model(brain, title_model)
    }

    pub fn with_model(mut self, descriptor: ModelDescriptor) -> Self {
        self.models.insert(descriptor.id.clone(), descriptor);
        self
    }

    pub fn with_title_model(mut self, brain: Arc<dyn Brain>, backend_model: impl Into<String>) -> Self {
        self.title = Some(TitleModel {
            brain,
            backend_model: backend_model.into(),
        });
        self
    }

    pub fn get(&self, id: &str) -> Option<&ModelDescriptor> {
        self.models.get(id)
    }

    pub fn title_model(&self) -> Option<&TitleModel> {
        self.title.as_ref()
    }

    /// Models the given entitlements may select, in catalog order.
    pub fn available(&self, entitlements: &Entitlements) -> Vec<ModelInfo> {
        self.models
            .values()
            .filter(|descriptor| entitlements.allows_model(&descriptor.id))
            .map(ModelDescriptor::info)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entitlements::UserType;
    use brain_core::{ChatMessage, CompletionRequest};
    use mock_brain::ScriptedBrain;

    #[test]
    fn test_standard_catalog() {
        let brain: Arc<dyn Brain> = Arc::new(ScriptedBrain::new());
        let catalog = ModelCatalog::standard(brain, "mistral-large-latest", "mistral-small-latest");

        assert_eq!(catalog.len(), 2);
        let chat = catalog.get(DEFAULT_CHAT_MODEL).unwrap();
        assert!(!chat.reasoning);
        assert_eq!(chat.backend_model, "mistral-large-latest");

        let reasoning = catalog.get(REASONING_CHAT_MODEL).unwrap();
        assert!(reasoning.reasoning);
        assert_eq!(reasoning.brain().name(), "ScriptedBrain+reasoning");

        assert_eq!(
            catalog.title_model().unwrap().backend_model,
            "mistral-small-latest"
        );
        assert!(catalog.get("title-model").is_none());
    }

    #[test]
    fn test_available_respects_entitlements() {
        let brain: Arc<dyn Brain> = Arc::new(ScriptedBrain::new());
        let catalog = ModelCatalog::standard(brain.clone(), "large", "small").with_model(
            ModelDescriptor::new("experimental", "Experimental", "Not for everyone", brain, "x"),
        );

        let ids: Vec<String> = catalog
            .available(&Entitlements::for_user_type(UserType::Regular))
            .into_iter()
            .map(|info| info.id)
            .collect();
        assert_eq!(ids, vec!["chat-model", "chat-model-reasoning"]);
    }

    #[tokio::test]
    async fn test_reasoning_descriptor_splits_think_tags() {
        let brain: Arc<dyn Brain> =
            Arc::new(ScriptedBrain::new().then_text("<think>Paris is in France</think>It is sunny."));
        let descriptor = ModelDescriptor::new("r", "R", "", brain, "large").with_reasoning();

        let completion = descriptor
            .brain()
            .complete(CompletionRequest::new("large", vec![ChatMessage::user("u1", "hi")]))
            .await
            .unwrap();
        assert_eq!(completion.reasoning, "Paris is in France");
        assert_eq!(completion.text, "It is sunny.");
    }
}
