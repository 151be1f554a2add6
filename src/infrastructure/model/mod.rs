//! Model infrastructure.
//!
//! - `types` - completion request/outcome and error types
//! - `traits` - the `ModelProvider` seam the orchestrator drives
//! - `adapter` - message format adapters per wire protocol
//! - `factory` - provider construction from configuration
//! - `clients` - Azure OpenAI and Ollama chat clients

pub mod adapter;
pub mod clients;
pub mod factory;
pub mod traits;
pub mod types;

pub use factory::ModelBackend;
pub use traits::ModelProvider;
pub use types::{CompletionOutcome, CompletionRequest, ModelError, ResponseFormat, ToolDeclaration};
