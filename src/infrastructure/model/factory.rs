//! Provider factory - creates the configured model backend.
//!
//! Mirrors the deployment switch of the original service: `azure-openai`
//! or `ollama`, decided once at startup.

use super::clients::{AzureOpenAIClient, OllamaClient};
use super::traits::ModelProvider;
use super::types::{CompletionOutcome, CompletionRequest, ModelError};
use crate::config::ModelConfig;
use async_trait::async_trait;

/// The configured completion backend.
#[derive(Clone)]
pub enum ModelBackend {
    AzureOpenAI(AzureOpenAIClient),
    Ollama(OllamaClient),
}

impl ModelBackend {
    pub fn from_config(config: &ModelConfig) -> Result<Self, ModelError> {
        match config.provider.to_lowercase().as_str() {
            "azure-openai" | "azureopenai" => {
                Ok(Self::AzureOpenAI(AzureOpenAIClient::from_config(config)))
            }
            "ollama" => Ok(Self::Ollama(OllamaClient::from_config(config))),
            other => Err(ModelError::UnsupportedProvider { kind: other.into() }),
        }
    }
}

#[async_trait]
impl ModelProvider for ModelBackend {
    fn id(&self) -> &str {
        match self {
            ModelBackend::AzureOpenAI(client) => client.id(),
            ModelBackend::Ollama(client) => client.id(),
        }
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionOutcome, ModelError> {
        match self {
            ModelBackend::AzureOpenAI(client) => client.complete(request).await,
            ModelBackend::Ollama(client) => client.complete(request).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(provider: &str) -> ModelConfig {
        ModelConfig {
            provider: provider.into(),
            endpoint: "http://127.0.0.1:11434".into(),
            api_key: None,
            model: "llama3".into(),
            api_version: "2024-10-21".into(),
        }
    }

    #[test]
    fn selects_backend_by_provider_kind() {
        assert!(matches!(
            ModelBackend::from_config(&config("ollama")),
            Ok(ModelBackend::Ollama(_))
        ));
        assert!(matches!(
            ModelBackend::from_config(&config("AzureOpenAI")),
            Ok(ModelBackend::AzureOpenAI(_))
        ));
        assert!(matches!(
            ModelBackend::from_config(&config("gemini")),
            Err(ModelError::UnsupportedProvider { .. })
        ));
    }
}
