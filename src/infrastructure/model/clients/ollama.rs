//! Ollama chat client. Structured output is requested through the `format`
//! field; tool-call ids are synthesized locally because the wire carries
//! none.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use super::base::HttpClientBase;
use crate::config::ModelConfig;
use crate::domain::types::ToolCall;
use crate::infrastructure::model::adapter::MessageAdapter;
use crate::infrastructure::model::traits::ModelProvider;
use crate::infrastructure::model::types::{CompletionOutcome, CompletionRequest, ModelError};

#[derive(Clone)]
pub struct OllamaClient {
    base: HttpClientBase,
    model: String,
}

impl OllamaClient {
    pub fn from_config(config: &ModelConfig) -> Self {
        Self {
            base: HttpClientBase::new(config.provider.clone(), config.endpoint.clone(), None),
            model: config.model.clone(),
        }
    }
}

#[async_trait]
impl ModelProvider for OllamaClient {
    fn id(&self) -> &str {
        &self.base.id
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionOutcome, ModelError> {
        let url = self.base.build_url("/api/chat");

        let tools = MessageAdapter::to_openai_tools(&request.tools);
        let payload = OllamaChatRequest {
            model: self.model.clone(),
            messages: MessageAdapter::to_ollama_format(&request.messages),
            stream: false,
            tools: if tools.is_empty() { None } else { Some(tools) },
            format: request
                .response_format
                .as_ref()
                .map(|format| format.schema.clone()),
        };

        info!(
            provider = self.base.id.as_str(),
            model = self.model.as_str(),
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending request to Ollama"
        );

        let response: OllamaChatResponse = self.base.post_no_auth(&url, &payload).await?;
        debug!("Received response from Ollama");

        let message = response
            .message
            .ok_or_else(|| ModelError::invalid_response(&self.base.id, "missing message"))?;

        if let Some(calls) = message.tool_calls.filter(|calls| !calls.is_empty()) {
            let parsed = calls
                .into_iter()
                .map(|call| ToolCall {
                    id: Uuid::new_v4().to_string(),
                    name: call.function.name,
                    arguments: call.function.arguments,
                })
                .collect();
            return Ok(CompletionOutcome::ToolCalls(parsed));
        }

        Ok(CompletionOutcome::Message(message.content.unwrap_or_default()))
    }
}

#[derive(Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<Value>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<Value>,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaMessage>,
}

#[derive(Deserialize)]
struct OllamaMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OllamaToolCall>>,
}

#[derive(Deserialize)]
struct OllamaToolCall {
    function: OllamaFunction,
}

#[derive(Deserialize)]
struct OllamaFunction {
    name: String,
    arguments: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::ChatMessage;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> OllamaClient {
        OllamaClient::from_config(&ModelConfig {
            provider: "ollama".into(),
            endpoint: server.uri(),
            api_key: None,
            model: "llama3".into(),
            api_version: String::new(),
        })
    }

    #[tokio::test]
    async fn synthesizes_ids_for_tool_calls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": {
                    "content": "",
                    "tool_calls": [{
                        "function": {
                            "name": "me_calendarView",
                            "arguments": { "startDateTime": "2026-08-23T00:00:00" }
                        }
                    }]
                }
            })))
            .mount(&server)
            .await;

        let outcome = client_for(&server)
            .complete(CompletionRequest {
                messages: vec![ChatMessage::user("hello")],
                tools: Vec::new(),
                response_format: None,
            })
            .await
            .expect("complete");

        match outcome {
            CompletionOutcome::ToolCalls(calls) => {
                assert_eq!(calls.len(), 1);
                assert!(!calls[0].id.is_empty());
                assert_eq!(calls[0].arguments["startDateTime"], "2026-08-23T00:00:00");
            }
            other => panic!("expected tool calls, got {other:?}"),
        }
    }
}
