use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        }
    }
}

/// A tool invocation proposed by the model during the automatic
/// tool-selection loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    /// Tool invocations attached to an assistant turn. Empty for plain text.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Identifier of the call a tool turn answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant_tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: String::new(),
            tool_calls: calls,
            tool_call_id: None,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.into()),
        }
    }
}

/// Per-request conversation state: the turns exchanged so far plus the
/// arguments bound into the prompt templates. Built fresh for every
/// request and never shared.
#[derive(Debug, Clone)]
pub struct ConversationContext {
    pub messages: Vec<ChatMessage>,
    pub today: String,
    pub user_language: String,
}

impl ConversationContext {
    pub fn new(today: impl Into<String>, user_language: impl Into<String>) -> Self {
        Self {
            messages: Vec::new(),
            today: today.into(),
            user_language: user_language.into(),
        }
    }
}

/// A single meeting entry of the daily briefing.
///
/// Start and end times are kept as the ISO-8601 strings the model emits;
/// for that format lexicographic order equals chronological order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
    pub title: String,
    pub start_time: String,
    pub end_time: String,
    /// "First Last" per attendee.
    pub attendees: Vec<String>,
    pub summary: String,
    pub preparation_recommendation: String,
}

/// Terminal output of the orchestrator: the day's meetings ordered by
/// start time ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DayPlanResult {
    pub meetings: Vec<Meeting>,
}

impl DayPlanResult {
    /// JSON Schema handed to the model as the phase-2 response format.
    pub fn response_schema() -> Value {
        let schema = schemars::schema_for!(DayPlanResult);
        serde_json::to_value(schema).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_schema_declares_meeting_fields() {
        let schema = DayPlanResult::response_schema();
        let meeting = &schema["definitions"]["Meeting"]["properties"];
        for field in [
            "title",
            "startTime",
            "endTime",
            "attendees",
            "summary",
            "preparationRecommendation",
        ] {
            assert!(
                !meeting[field].is_null(),
                "schema is missing the {field} property"
            );
        }
    }

    #[test]
    fn day_plan_round_trips_camel_case_keys() {
        let raw = r#"{
            "meetings": [{
                "title": "Standup",
                "startTime": "2026-08-23T09:00:00",
                "endTime": "2026-08-23T09:15:00",
                "attendees": ["Ada Lovelace"],
                "summary": "Daily sync",
                "preparationRecommendation": "Review the board"
            }]
        }"#;
        let plan: DayPlanResult = serde_json::from_str(raw).expect("deserialize");
        assert_eq!(plan.meetings[0].title, "Standup");
        let value = serde_json::to_value(&plan).expect("serialize");
        assert_eq!(value["meetings"][0]["startTime"], "2026-08-23T09:00:00");
        assert!(value["meetings"][0].get("start_time").is_none());
    }
}
