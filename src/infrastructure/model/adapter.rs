//! Message adapters - convert conversation turns to provider wire formats.

use crate::domain::types::{ChatMessage, MessageRole};
use crate::infrastructure::model::types::ToolDeclaration;
use serde_json::{json, Value};

pub struct MessageAdapter;

impl MessageAdapter {
    /// OpenAI-style messages: assistant tool calls carry stringified
    /// arguments, tool results reference their call id.
    pub fn to_openai_format(messages: &[ChatMessage]) -> Vec<Value> {
        messages
            .iter()
            .map(|message| match message.role {
                MessageRole::Assistant if !message.tool_calls.is_empty() => json!({
                    "role": "assistant",
                    "content": message.content.clone(),
                    "tool_calls": message
                        .tool_calls
                        .iter()
                        .map(|call| json!({
                            "id": call.id.clone(),
                            "type": "function",
                            "function": {
                                "name": call.name.clone(),
                                "arguments": call.arguments.to_string(),
                            }
                        }))
                        .collect::<Vec<_>>(),
                }),
                MessageRole::Tool => json!({
                    "role": "tool",
                    "tool_call_id": message.tool_call_id.clone().unwrap_or_default(),
                    "content": message.content.clone(),
                }),
                role => json!({
                    "role": role.as_str(),
                    "content": message.content.clone(),
                }),
            })
            .collect()
    }

    /// Ollama messages: same roles, but tool-call arguments stay JSON
    /// objects and tool results carry no call id.
    pub fn to_ollama_format(messages: &[ChatMessage]) -> Vec<Value> {
        messages
            .iter()
            .map(|message| match message.role {
                MessageRole::Assistant if !message.tool_calls.is_empty() => json!({
                    "role": "assistant",
                    "content": message.content.clone(),
                    "tool_calls": message
                        .tool_calls
                        .iter()
                        .map(|call| json!({
                            "function": {
                                "name": call.name.clone(),
                                "arguments": call.arguments.clone(),
                            }
                        }))
                        .collect::<Vec<_>>(),
                }),
                role => json!({
                    "role": role.as_str(),
                    "content": message.content.clone(),
                }),
            })
            .collect()
    }

    /// OpenAI-style tool declarations.
    pub fn to_openai_tools(tools: &[ToolDeclaration]) -> Vec<Value> {
        tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name.clone(),
                        "description": tool.description.clone(),
                        "parameters": tool.parameters.clone(),
                        "strict": tool.strict,
                    }
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::ToolCall;

    #[test]
    fn assistant_tool_calls_serialize_arguments_as_string() {
        let message = ChatMessage::assistant_tool_calls(vec![ToolCall {
            id: "call-1".into(),
            name: "me_calendarView".into(),
            arguments: json!({ "startDateTime": "x" }),
        }]);
        let wire = MessageAdapter::to_openai_format(&[message]);
        let arguments = wire[0]["tool_calls"][0]["function"]["arguments"]
            .as_str()
            .expect("stringified arguments");
        assert!(arguments.contains("startDateTime"));
    }

    #[test]
    fn tool_results_reference_their_call_id() {
        let message = ChatMessage::tool_result("call-1", "{}");
        let wire = MessageAdapter::to_openai_format(&[message]);
        assert_eq!(wire[0]["role"], "tool");
        assert_eq!(wire[0]["tool_call_id"], "call-1");
    }

    #[test]
    fn ollama_tool_calls_keep_object_arguments() {
        let message = ChatMessage::assistant_tool_calls(vec![ToolCall {
            id: "call-1".into(),
            name: "me_calendarView".into(),
            arguments: json!({ "a": 1 }),
        }]);
        let wire = MessageAdapter::to_ollama_format(&[message]);
        assert_eq!(wire[0]["tool_calls"][0]["function"]["arguments"]["a"], 1);
    }
}
