//! Two-phase prompt orchestration.
//!
//! Phase 1 lets the model reason freely over the registered tool set:
//! it may call any tool, in any order, until it produces a prose report.
//! Phase 2 re-submits that report under a strict output schema and
//! deserializes the answer into a `DayPlanResult`. Both phases share one
//! bounded interaction loop so a model that never stops calling tools
//! fails the request instead of spinning.

use crate::application::filter::ResultFilter;
use crate::application::plugins::ToolSet;
use crate::domain::types::{ChatMessage, ConversationContext, DayPlanResult};
use crate::infrastructure::model::types::{
    CompletionOutcome, CompletionRequest, ModelError, ResponseFormat,
};
use crate::infrastructure::model::ModelProvider;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_TOOL_STEPS: usize = 16;

const PHASE_ONE_TEMPLATE: &str = "You are a helpful Day Planner Agent, responsible for \
retrieving all of today's ({today}) calendar meetings and generating a detailed report. \
The report should include key details about each meeting and guidance on how to best \
prepare for it. You must follow exactly the following steps:\n\
**Step 1**: Get all of today's calendar meetings.\n\
**Step 2**: For every meeting extract and generate the following:\n\
- Meeting Title\n\
- Start Time\n\
- End Time\n\
- Attendees: first and last name of every attendee, comma separated \
(e.g. <firstName1 lastName1>, <firstName2 lastName2>)\n\
- Meeting Summary: based on the meeting title and meeting body. This property must be \
written in the user's language {user_language}\n\
- Preparation Recommendation: a thorough and detailed recommendation on how to \
effectively prepare for this meeting. This property must be written in the user's \
language {user_language}";

const PHASE_TWO_INSTRUCTION: &str = "You must **always order by meeting start time**, ascending. ";

const RESPONSE_SCHEMA_NAME: &str = "day_plan_result";

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("model exceeded the maximum of {limit} tool interactions")]
    ToolStepsExceeded { limit: usize },
    #[error("structured output is not a valid day plan: {source}")]
    MalformedResult {
        #[source]
        source: serde_json::Error,
    },
    #[error("request cancelled")]
    Cancelled,
}

/// Drives the fixed two-phase prompt sequence against a tool set.
pub struct PromptOrchestrator<P> {
    provider: Arc<P>,
    filter: ResultFilter,
    max_tool_steps: usize,
}

impl<P: ModelProvider> PromptOrchestrator<P> {
    pub fn new(provider: Arc<P>) -> Self {
        Self {
            provider,
            filter: ResultFilter,
            max_tool_steps: DEFAULT_MAX_TOOL_STEPS,
        }
    }

    pub fn with_max_tool_steps(mut self, max_tool_steps: usize) -> Self {
        self.max_tool_steps = max_tool_steps;
        self
    }

    /// Run both phases and return the validated day plan. Any failure in
    /// either phase propagates; no partial result is synthesized.
    pub async fn run(
        &self,
        context: ConversationContext,
        tools: &ToolSet,
        cancel: &CancellationToken,
    ) -> Result<DayPlanResult, OrchestratorError> {
        let prompt = PHASE_ONE_TEMPLATE
            .replace("{today}", &context.today)
            .replace("{user_language}", &context.user_language);

        let mut messages = context.messages;
        messages.push(ChatMessage::user(prompt));

        info!(tools = tools.len(), "Starting phase 1 (free-form reasoning)");
        let report = self.drive(&mut messages, tools, None, cancel).await?;

        info!("Starting phase 2 (structured extraction)");
        let mut messages = vec![ChatMessage::user(format!(
            "{PHASE_TWO_INSTRUCTION}{report}"
        ))];
        let format = ResponseFormat {
            name: RESPONSE_SCHEMA_NAME.into(),
            schema: DayPlanResult::response_schema(),
        };
        let raw = self
            .drive(&mut messages, tools, Some(format), cancel)
            .await?;

        let mut plan: DayPlanResult =
            serde_json::from_str(&raw).map_err(|source| OrchestratorError::MalformedResult { source })?;

        // The ordering instruction is kept, but the invariant no longer
        // depends on the model honoring it.
        plan.meetings
            .sort_by(|a, b| a.start_time.cmp(&b.start_time));

        info!(meetings = plan.meetings.len(), "Day plan assembled");
        Ok(plan)
    }

    /// One bounded automatic tool-selection loop: the model proposes tool
    /// calls, each is executed and filtered, results re-enter the context,
    /// until the model answers with text or the step ceiling is hit.
    async fn drive(
        &self,
        messages: &mut Vec<ChatMessage>,
        tools: &ToolSet,
        response_format: Option<ResponseFormat>,
        cancel: &CancellationToken,
    ) -> Result<String, OrchestratorError> {
        let declarations = tools.declarations();
        let mut remaining = self.max_tool_steps;

        loop {
            let request = CompletionRequest {
                messages: messages.clone(),
                tools: declarations.clone(),
                response_format: response_format.clone(),
            };

            debug!(remaining, "Submitting completion request");
            let outcome = tokio::select! {
                _ = cancel.cancelled() => return Err(OrchestratorError::Cancelled),
                result = self.provider.complete(request) => result?,
            };

            match outcome {
                CompletionOutcome::Message(text) => return Ok(text),
                CompletionOutcome::ToolCalls(calls) => {
                    // Every tool-call turn consumes a step, even one proposing
                    // zero calls, so the loop terminates for any model output.
                    if remaining == 0 {
                        warn!(limit = self.max_tool_steps, "Tool interaction ceiling hit");
                        return Err(OrchestratorError::ToolStepsExceeded {
                            limit: self.max_tool_steps,
                        });
                    }
                    remaining -= 1;

                    messages.push(ChatMessage::assistant_tool_calls(calls.clone()));
                    for call in calls {
                        info!(tool = %call.name, "Executing model-selected tool");
                        let result = tools.invoke(&call.name, &call.arguments, cancel).await;
                        let filtered = self.filter.apply(result);
                        let content =
                            serde_json::to_string(&filtered).unwrap_or_else(|_| "{}".to_string());
                        messages.push(ChatMessage::tool_result(call.id, content));
                    }
                }
            }
        }
    }
}
