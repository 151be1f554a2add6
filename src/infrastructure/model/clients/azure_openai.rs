//! Azure OpenAI chat-completions client with automatic tool selection and
//! schema-constrained output.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::base::HttpClientBase;
use crate::config::ModelConfig;
use crate::domain::types::ToolCall;
use crate::infrastructure::model::adapter::MessageAdapter;
use crate::infrastructure::model::traits::ModelProvider;
use crate::infrastructure::model::types::{
    CompletionOutcome, CompletionRequest, ModelError,
};

#[derive(Clone)]
pub struct AzureOpenAIClient {
    base: HttpClientBase,
    deployment: String,
    api_version: String,
}

impl AzureOpenAIClient {
    pub fn from_config(config: &ModelConfig) -> Self {
        Self {
            base: HttpClientBase::new(
                config.provider.clone(),
                config.endpoint.clone(),
                config.api_key.clone(),
            ),
            deployment: config.model.clone(),
            api_version: config.api_version.clone(),
        }
    }
}

#[async_trait]
impl ModelProvider for AzureOpenAIClient {
    fn id(&self) -> &str {
        &self.base.id
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionOutcome, ModelError> {
        let url = format!(
            "{}?api-version={}",
            self.base.build_url(&format!(
                "openai/deployments/{}/chat/completions",
                self.deployment
            )),
            self.api_version
        );

        let tools = MessageAdapter::to_openai_tools(&request.tools);
        let payload = AzureChatRequest {
            messages: MessageAdapter::to_openai_format(&request.messages),
            tools: if tools.is_empty() { None } else { Some(tools) },
            tool_choice: if request.tools.is_empty() {
                None
            } else {
                Some("auto".to_string())
            },
            response_format: request.response_format.as_ref().map(|format| {
                serde_json::json!({
                    "type": "json_schema",
                    "json_schema": {
                        "name": format.name.clone(),
                        "schema": format.schema.clone(),
                        "strict": true,
                    }
                })
            }),
        };

        info!(
            provider = self.base.id.as_str(),
            deployment = self.deployment.as_str(),
            messages = request.messages.len(),
            tools = request.tools.len(),
            structured = request.response_format.is_some(),
            "Sending request to Azure OpenAI"
        );

        let response: AzureChatResponse = self.base.post_with_api_key(&url, &payload).await?;
        debug!("Received response from Azure OpenAI");

        let message = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .ok_or_else(|| ModelError::invalid_response(&self.base.id, "missing message"))?;

        if let Some(calls) = message.tool_calls.filter(|calls| !calls.is_empty()) {
            let mut parsed = Vec::with_capacity(calls.len());
            for call in calls {
                let arguments: Value =
                    serde_json::from_str(&call.function.arguments).map_err(|_| {
                        ModelError::invalid_response(
                            &self.base.id,
                            "tool call arguments are not valid JSON",
                        )
                    })?;
                parsed.push(ToolCall {
                    id: call.id,
                    name: call.function.name,
                    arguments,
                });
            }
            return Ok(CompletionOutcome::ToolCalls(parsed));
        }

        let content = message
            .content
            .ok_or_else(|| ModelError::invalid_response(&self.base.id, "missing content"))?;
        Ok(CompletionOutcome::Message(content))
    }
}

#[derive(Serialize)]
struct AzureChatRequest {
    messages: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Deserialize)]
struct AzureChatResponse {
    choices: Vec<AzureChoice>,
}

#[derive(Deserialize)]
struct AzureChoice {
    message: Option<AzureMessage>,
}

#[derive(Deserialize)]
struct AzureMessage {
    content: Option<String>,
    tool_calls: Option<Vec<AzureToolCall>>,
}

#[derive(Deserialize)]
struct AzureToolCall {
    id: String,
    function: AzureFunction,
}

#[derive(Deserialize)]
struct AzureFunction {
    name: String,
    arguments: String,
}
