//! Request-scoped briefing pipeline.
//!
//! One call, one pipeline run: exchange the inbound credential, load the
//! plugin manifests fresh, then hand everything to the orchestrator. Nothing
//! is cached between requests, so a manifest edit on disk takes effect on
//! the next call.

use crate::application::auth::{AccessCredential, TokenExchanger};
use crate::application::orchestrator::{OrchestratorError, PromptOrchestrator};
use crate::application::plugins::{load_all, AuthenticatedCaller, PluginError, SanitizeTarget};
use crate::application::schema::SchemaDenylist;
use crate::config::AppConfig;
use crate::domain::types::{ConversationContext, DayPlanResult};
use crate::infrastructure::model::ModelProvider;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Error)]
pub enum BriefingError {
    #[error(transparent)]
    Plugins(#[from] PluginError),
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
}

/// Front door of the day-planner pipeline.
pub struct BriefingService<P> {
    provider: Arc<P>,
    exchanger: TokenExchanger,
    http: reqwest::Client,
    root: PathBuf,
    sanitize: SanitizeTarget,
    denylist: SchemaDenylist,
    max_tool_steps: usize,
}

impl<P: ModelProvider> BriefingService<P> {
    pub fn new(config: &AppConfig, provider: Arc<P>) -> Self {
        let http = reqwest::Client::new();
        Self {
            provider,
            exchanger: TokenExchanger::new(http.clone(), Arc::new(config.identity.clone())),
            http,
            root: config.root.clone(),
            sanitize: config.sanitize.clone(),
            denylist: SchemaDenylist::graph_mail_defaults(),
            max_tool_steps: config.max_tool_steps,
        }
    }

    /// Produce today's briefing for the user behind `credential`, in
    /// `language`. All-or-nothing: a broken manifest or an orchestration
    /// failure fails the whole request.
    pub async fn briefing(
        &self,
        credential: AccessCredential,
        language: impl Into<String>,
        cancel: &CancellationToken,
    ) -> Result<DayPlanResult, BriefingError> {
        let today = chrono::Local::now().format("%Y-%m-%d").to_string();
        let language = language.into();
        info!(%today, %language, "Starting briefing run");

        let caller = AuthenticatedCaller::new(self.exchanger.clone(), credential);
        let tools = load_all(
            &self.root,
            caller,
            self.http.clone(),
            &self.sanitize,
            &self.denylist,
        )
        .await?;

        let orchestrator =
            PromptOrchestrator::new(self.provider.clone()).with_max_tool_steps(self.max_tool_steps);
        let plan = orchestrator
            .run(ConversationContext::new(today, language), &tools, cancel)
            .await?;

        Ok(plan)
    }
}
