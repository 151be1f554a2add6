use crate::domain::types::{ChatMessage, ToolCall};
use serde_json::Value;
use thiserror::Error;

/// Callable operation exposed to the model: a name plus an object schema
/// over its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
    /// Request strict schema adherence for this tool's arguments.
    pub strict: bool,
}

/// Schema constraint for the model's final answer.
#[derive(Debug, Clone)]
pub struct ResponseFormat {
    pub name: String,
    pub schema: Value,
}

/// One completion call: the conversation so far, the tools the model may
/// select automatically, and an optional output-schema constraint.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolDeclaration>,
    pub response_format: Option<ResponseFormat>,
}

/// What the model decided to do with one completion call.
#[derive(Debug, Clone)]
pub enum CompletionOutcome {
    /// A final free-form (or schema-constrained) answer.
    Message(String),
    /// Tool invocations to execute before the conversation continues.
    ToolCalls(Vec<ToolCall>),
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("provider '{provider}' requires an API key")]
    MissingApiKey { provider: String },
    #[error("network error calling provider '{provider}': {source}")]
    Network {
        provider: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("provider '{provider}' returned invalid response: {reason}")]
    InvalidResponse { provider: String, reason: String },
    #[error("unsupported model provider kind '{kind}'")]
    UnsupportedProvider { kind: String },
}

impl ModelError {
    pub fn missing_api_key(provider: impl Into<String>) -> Self {
        Self::MissingApiKey {
            provider: provider.into(),
        }
    }

    pub fn network(provider: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            provider: provider.into(),
            source,
        }
    }

    pub fn invalid_response(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            provider: provider.into(),
            reason: reason.into(),
        }
    }
}
