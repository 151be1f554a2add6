use super::types::{CompletionOutcome, CompletionRequest, ModelError};
use async_trait::async_trait;

/// Black-box completion capability: takes a conversation plus tool
/// declarations and execution options, returns either text or a request to
/// invoke tools.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    fn id(&self) -> &str;

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionOutcome, ModelError>;
}
