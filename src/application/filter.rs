//! Post-invocation shaping of tool results.
//!
//! API operation responses carry the schema the response was validated
//! against. Feeding that blob back to the model wastes context on every
//! subsequent turn, so the filter clears it before the result re-enters the
//! conversation. It runs on every completed invocation, successful or not,
//! and never alters the invocation outcome itself.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// Response-type tag for results produced by manifest-declared HTTP
/// operations.
pub const API_OPERATION_RESPONSE: &str = "api_operation_response";

/// Raw value returned by one external operation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolInvocationResult {
    pub tool: String,
    pub success: bool,
    pub output: Value,
    /// Declared type of the response payload.
    pub response_type: String,
    /// Schema the response was expected to conform to; cleared by the
    /// filter before the result is reused.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_schema: Option<Value>,
}

impl ToolInvocationResult {
    pub fn is_api_operation_response(&self) -> bool {
        self.response_type == API_OPERATION_RESPONSE
    }
}

/// Strips echoed-back schema metadata from completed tool invocations.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultFilter;

impl ResultFilter {
    pub fn apply(&self, mut result: ToolInvocationResult) -> ToolInvocationResult {
        if result.is_api_operation_response() && result.expected_schema.is_some() {
            debug!(tool = %result.tool, "Clearing expected schema from tool result");
            result.expected_schema = None;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn api_result(expected_schema: Option<Value>) -> ToolInvocationResult {
        ToolInvocationResult {
            tool: "me_calendarView".into(),
            success: true,
            output: json!({ "value": [] }),
            response_type: API_OPERATION_RESPONSE.into(),
            expected_schema,
        }
    }

    #[test]
    fn clears_expected_schema_on_api_operation_responses() {
        let filter = ResultFilter;
        let input = api_result(Some(json!({ "type": "object" })));
        let filtered = filter.apply(input.clone());

        assert!(filtered.expected_schema.is_none());
        assert_eq!(filtered.tool, input.tool);
        assert_eq!(filtered.success, input.success);
        assert_eq!(filtered.output, input.output);
        assert_eq!(filtered.response_type, input.response_type);
    }

    #[test]
    fn runs_on_failed_invocations_too() {
        let filter = ResultFilter;
        let mut input = api_result(Some(json!({ "type": "object" })));
        input.success = false;
        let filtered = filter.apply(input);

        assert!(!filtered.success, "invocation outcome must not change");
        assert!(filtered.expected_schema.is_none());
    }

    #[test]
    fn leaves_other_response_types_alone() {
        let filter = ResultFilter;
        let input = ToolInvocationResult {
            tool: "local".into(),
            success: true,
            output: json!("ok"),
            response_type: "plain_text".into(),
            expected_schema: Some(json!({ "type": "string" })),
        };
        let filtered = filter.apply(input.clone());
        assert_eq!(filtered, input);
    }
}
